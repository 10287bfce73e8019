use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

fn default_worker_pool_size() -> usize {
    256
}

fn default_compress_threshold() -> usize {
    256
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval_secs() -> u64 {
    3
}

fn default_max_retries() -> u32 {
    10
}

fn default_develop_max_retries() -> u32 {
    1000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_retries() -> u32 {
    3
}

fn default_backup_latency_ms() -> u64 {
    100
}

/// Top-level configuration shared by the gate and node binaries.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Development mode: serial-friendly debugging, huge heartbeat grace.
    #[serde(default)]
    pub develop: bool,
    pub node: NodeIdentity,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub rpc: RpcClientConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
}

/// Identity of this process in the server-id space. The routing group is
/// derived from the id (`id / 1000 + 1`), so gateways live in 1..=999 and
/// backend shards in the ranges their protocols map to.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeIdentity {
    pub id: u32,
    pub name: String,
    pub version: u32,
    /// RPC listen address of this process (node Dispatch / gate Receive).
    pub rpc_listen: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    /// Client-facing TCP listen address.
    pub listen: String,
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:7100".to_string(),
            worker_pool_size: default_worker_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_true")]
    pub compress: bool,
    /// Bodies at or above this length are compressed.
    #[serde(default = "default_compress_threshold")]
    pub compress_threshold: usize,
    #[serde(default)]
    pub encrypt: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            compress: true,
            compress_threshold: default_compress_threshold(),
            encrypt: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub interval_secs: u64,
    /// Consecutive missed checks before the connection is closed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Grace budget used instead of `max_retries` in development mode.
    #[serde(default = "default_develop_max_retries")]
    pub develop_max_retries: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_heartbeat_interval_secs(),
            max_retries: default_max_retries(),
            develop_max_retries: default_develop_max_retries(),
        }
    }
}

impl HeartbeatConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn effective_max_retries(&self, develop: bool) -> u32 {
        if develop {
            self.develop_max_retries
        } else {
            self.max_retries
        }
    }
}

/// Retry/failover behavior of the RPC client. The router never retries;
/// this is the only retry layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailMode {
    /// One attempt; surface the first error.
    Failfast,
    /// Retry up to `retries` times, waiting `backup_latency_ms` between
    /// attempts.
    Failover,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcClientConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_fail_mode")]
    pub fail_mode: FailMode,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backup_latency_ms")]
    pub backup_latency_ms: u64,
}

fn default_fail_mode() -> FailMode {
    FailMode::Failfast
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            fail_mode: default_fail_mode(),
            retries: default_retries(),
            backup_latency_ms: default_backup_latency_ms(),
        }
    }
}

/// Static replica topology. Stands in for the service registry: the whole
/// set is handed to the selector at once, never patched incrementally.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologyConfig {
    #[serde(default)]
    pub replicas: Vec<ReplicaEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicaEntry {
    pub address: String,
    pub id: u32,
    pub version: u32,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&data)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.id == 0 {
            bail!("node.id must be nonzero");
        }
        if self.node.name.is_empty() {
            bail!("node.name must not be empty");
        }
        if self.gate.worker_pool_size == 0 {
            bail!("gate.worker_pool_size must be at least 1");
        }
        if self.heartbeat.interval_secs == 0 {
            bail!("heartbeat.interval_secs must be at least 1");
        }
        if self.heartbeat.max_retries == 0 {
            bail!("heartbeat.max_retries must be at least 1");
        }
        for replica in &self.topology.replicas {
            if replica.id == 0 {
                bail!("topology replica {} has id 0", replica.address);
            }
        }
        Ok(())
    }
}

/// Sample configuration written by `shardgate init`.
pub const SAMPLE_CONFIG: &str = r#"develop = false

[node]
id = 1
name = "gate-1"
version = 1
rpc_listen = "127.0.0.1:7101"

[gate]
listen = "0.0.0.0:7100"
worker_pool_size = 256

[codec]
compress = true
compress_threshold = 256
encrypt = false

[heartbeat]
interval_secs = 3
max_retries = 10
develop_max_retries = 1000

[rpc]
connect_timeout_ms = 3000
fail_mode = "failfast"
retries = 3
backup_latency_ms = 100

[[topology.replicas]]
address = "127.0.0.1:7201"
id = 1001
version = 1
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_parses_and_validates() {
        let config: Config = toml::from_str(SAMPLE_CONFIG).unwrap();
        config.validate().unwrap();
        assert_eq!(config.node.id, 1);
        assert_eq!(config.rpc.fail_mode, FailMode::Failfast);
        assert_eq!(config.topology.replicas.len(), 1);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let doc = r#"
[node]
id = 7
name = "node-7"
version = 2
rpc_listen = "127.0.0.1:0"
"#;
        let config: Config = toml::from_str(doc).unwrap();
        config.validate().unwrap();
        assert!(config.codec.compress);
        assert_eq!(config.codec.compress_threshold, 256);
        assert_eq!(config.heartbeat.interval_secs, 3);
        assert_eq!(config.heartbeat.effective_max_retries(false), 10);
        assert_eq!(config.heartbeat.effective_max_retries(true), 1000);
    }

    #[test]
    fn zero_worker_pool_rejected() {
        let doc = r#"
[node]
id = 7
name = "node-7"
version = 2
rpc_listen = "127.0.0.1:0"

[gate]
listen = "0.0.0.0:7100"
worker_pool_size = 0
"#;
        let config: Config = toml::from_str(doc).unwrap();
        assert!(config.validate().is_err());
    }
}
