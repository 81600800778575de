use draftview_engine::RemovedFieldPolicy;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_NAME: &str = "draftview.config.json";

/// Draftview server configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Directory of stored documents, laid out as `{webspace}/{locale}/{id}.json`
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// JSON file holding the structure definitions
    #[serde(default = "default_structure_file")]
    pub structure_file: PathBuf,

    /// Persist drafts under this directory instead of in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub removed_fields: RemovedFieldPolicy,

    /// Outbound queue length per connection
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// `tracing` filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9876))
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_structure_file() -> PathBuf {
    PathBuf::from("structures.json")
}

fn default_channel_capacity() -> usize {
    100
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load config from a file. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: ServerConfig = serde_json::from_str(&content)?;

        // relative paths are relative to the config file
        if let Some(base) = path.parent() {
            config.content_dir = base.join(&config.content_dir);
            config.structure_file = base.join(&config.structure_file);
            config.cache_dir = config.cache_dir.map(|dir| base.join(dir));
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            content_dir: default_content_dir(),
            structure_file: default_structure_file(),
            cache_dir: None,
            removed_fields: RemovedFieldPolicy::default(),
            channel_capacity: default_channel_capacity(),
            log_filter: default_log_filter(),
        }
    }
}
