//! Init command - writes a sample configuration file.

use anyhow::{bail, Context, Result};
use std::fs;

use crate::cli::args::InitArgs;
use crate::config::SAMPLE_CONFIG;

pub fn run_init(args: InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        bail!(
            "{} already exists, pass --force to overwrite",
            args.path.display()
        );
    }
    if let Some(parent) = args.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    fs::write(&args.path, SAMPLE_CONFIG)
        .with_context(|| format!("failed to write {}", args.path.display()))?;
    println!("wrote {}", args.path.display());
    Ok(())
}
