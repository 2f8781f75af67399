//! Contains the startup configuration of a peer.
//!
//! The configuration is loaded exactly once, from the YAML file named as the
//! only command line argument. There is deliberately no reload mechanism: the
//! peer set of a cluster is fixed for the lifetime of a process, as moving
//! keys between peers at runtime would invalidate the consistent placement
//! every peer has already computed.
//!
//! # Example
//! ```yaml
//! # The port of the optional frontend endpoint (GET /api?key=...). If
//! # absent, only the peer protocol is served.
//! apiPort: 9999
//! # The port under which this peer serves its partition.
//! peerPort: 8001
//! # All peers of the cluster. The own base url may be omitted - it is added
//! # automatically.
//! peer:
//!     - http://localhost:8001
//!     - http://localhost:8002
//!     - http://localhost:8003
//! # Optional byte budget per group, supporting the usual suffixes
//! # (k, m, g, t). Defaults to 2k.
//! cacheBytes: 1m
//! ```
use anyhow::Context;
use serde::Deserialize;

use crate::fmt::parse_size;

/// The byte budget used when the config does not specify one.
const DEFAULT_CACHE_BYTES: usize = 2 << 10;

/// The deserialized startup configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// The port of the optional frontend endpoint.
    #[serde(default)]
    pub api_port: Option<u16>,

    /// The port under which this peer serves its partition.
    pub peer_port: u16,

    /// The base urls of all peers of the cluster.
    #[serde(default)]
    pub peer: Vec<String>,

    /// The byte budget per group ("64k", "1m", ...).
    #[serde(default)]
    cache_bytes: Option<String>,
}

impl Config {
    /// Loads the configuration from the given YAML file.
    pub async fn load(path: &str) -> anyhow::Result<Config> {
        log::info!("Loading config file {}...", path);

        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Cannot load config file {}", path))?;

        let config: Config = serde_yaml::from_str(data.as_str())
            .with_context(|| format!("Cannot parse config file {}", path))?;
        let _ = config.cache_bytes()?;

        Ok(config)
    }

    /// Returns the base url under which this peer is reachable.
    pub fn self_url(&self) -> String {
        format!("http://localhost:{}", self.peer_port)
    }

    /// Returns the configured peers, guaranteed to include this peer itself.
    pub fn effective_peers(&self) -> Vec<String> {
        let self_url = self.self_url();
        let mut peers = self.peer.clone();
        if !peers.contains(&self_url) {
            peers.push(self_url);
        }

        peers
    }

    /// Returns the byte budget to apply per group.
    pub fn cache_bytes(&self) -> anyhow::Result<usize> {
        match &self.cache_bytes {
            Some(size) => parse_size(size),
            None => Ok(DEFAULT_CACHE_BYTES),
        }
    }
}
