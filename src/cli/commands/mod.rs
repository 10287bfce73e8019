//! CLI command implementations.

mod gate;
mod init;
mod node;

pub use gate::run_gate;
pub use init::run_init;
pub use node::run_node;
