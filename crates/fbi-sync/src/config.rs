//! Configuration handling for fbi-sync.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use fbi_core::{ExtractOptions, DEFAULT_MAX_CONTENT_BYTES};
use fbi_index::{PathFilterConfig, ThoroughConfig};
use fbi_store::{ElasticsearchConfig, DEFAULT_API_KEY_HEADER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Update handler configuration
    #[serde(default)]
    pub indexer: IndexerConfig,

    /// Index connection
    #[serde(default)]
    pub elasticsearch: ElasticsearchSettings,

    /// Owner/group name sources
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Spot prefixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spots: Vec<SpotEntry>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which update handler processes events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    #[default]
    Thorough,
    Fast,
}

/// Update handler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub handler: HandlerKind,

    /// Minimum seconds between mapping refreshes
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default)]
    pub calculate_checksum: bool,

    /// Extractor scan depth
    #[serde(default = "default_scan_level")]
    pub scan_level: u8,

    /// Files larger than this are indexed without content metadata
    #[serde(default = "default_max_content_bytes")]
    pub max_content_bytes: u64,

    /// How long to wait for a deposited file (ms)
    #[serde(default = "default_file_wait_timeout_ms")]
    pub file_wait_timeout_ms: u64,

    #[serde(default = "default_file_poll_interval_ms")]
    pub file_poll_interval_ms: u64,

    /// Bound on each owner/group lookup (ms)
    #[serde(default = "default_resolver_timeout_ms")]
    pub resolver_timeout_ms: u64,

    /// File of `name path` spot lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spots_file: Option<PathBuf>,

    #[serde(default)]
    pub path_filter: PathFilterConfig,
}

fn default_refresh_interval() -> u64 {
    30
}

fn default_scan_level() -> u8 {
    2
}

fn default_max_content_bytes() -> u64 {
    DEFAULT_MAX_CONTENT_BYTES
}

fn default_file_wait_timeout_ms() -> u64 {
    10_000
}

fn default_file_poll_interval_ms() -> u64 {
    500
}

fn default_resolver_timeout_ms() -> u64 {
    2_000
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            handler: HandlerKind::default(),
            refresh_interval: default_refresh_interval(),
            calculate_checksum: false,
            scan_level: default_scan_level(),
            max_content_bytes: default_max_content_bytes(),
            file_wait_timeout_ms: default_file_wait_timeout_ms(),
            file_poll_interval_ms: default_file_poll_interval_ms(),
            resolver_timeout_ms: default_resolver_timeout_ms(),
            spots_file: None,
            path_filter: PathFilterConfig::default(),
        }
    }
}

impl IndexerConfig {
    /// Settings for the thorough handler.
    pub fn thorough(&self) -> ThoroughConfig {
        ThoroughConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval),
            extract: ExtractOptions {
                scan_level: self.scan_level,
                calculate_checksum: self.calculate_checksum,
                max_content_bytes: self.max_content_bytes,
            },
            file_wait_timeout: Duration::from_millis(self.file_wait_timeout_ms),
            file_poll_interval: Duration::from_millis(self.file_poll_interval_ms),
            resolver_timeout: Duration::from_millis(self.resolver_timeout_ms),
        }
    }
}

/// Elasticsearch connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchSettings {
    #[serde(default = "default_es_url")]
    pub url: String,

    #[serde(default = "default_es_index")]
    pub index: String,

    /// API key, empty for none
    #[serde(default)]
    pub api_key: String,

    /// Header carrying the API key (`Authorization` uses the `ApiKey` scheme)
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Request timeout (seconds)
    #[serde(default = "default_es_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_es_index() -> String {
    "fbi".to_string()
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_es_timeout_secs() -> u64 {
    30
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: default_es_url(),
            index: default_es_index(),
            api_key: String::new(),
            api_key_header: default_api_key_header(),
            timeout_secs: default_es_timeout_secs(),
        }
    }
}

impl ElasticsearchSettings {
    pub fn client_config(&self) -> ElasticsearchConfig {
        ElasticsearchConfig {
            url: self.url.clone(),
            index: self.index.clone(),
            api_key: Some(self.api_key.clone()).filter(|k| !k.is_empty()),
            api_key_header: self.api_key_header.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Files used to resolve numeric owners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_passwd_file")]
    pub passwd_file: PathBuf,

    #[serde(default = "default_group_file")]
    pub group_file: PathBuf,
}

fn default_passwd_file() -> PathBuf {
    PathBuf::from("/etc/passwd")
}

fn default_group_file() -> PathBuf {
    PathBuf::from("/etc/group")
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            passwd_file: default_passwd_file(),
            group_file: default_group_file(),
        }
    }
}

/// One spot prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotEntry {
    pub path: String,
    pub name: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load from the default location. A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load from `path`, or from the default location when `None`.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let Some(path) = path.or_else(Self::config_path) else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::read(&path)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Default config file path.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Annotated sample configuration.
    pub fn sample_toml() -> &'static str {
        SAMPLE_CONFIG
    }
}

/// Get the XDG config directory for fbi-sync.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("FBI_SYNC_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "fbi-sync").map(|dirs| dirs.config_dir().to_path_buf())
}

const SAMPLE_CONFIG: &str = r#"# fbi-sync configuration

[indexer]
# "thorough" scans each file; "fast" indexes from the message alone
handler = "thorough"
# Seconds between index mapping refreshes
refresh_interval = 30
calculate_checksum = false
scan_level = 2
# Larger files are indexed without phenomena or spatial extent
max_content_bytes = 67108864
file_wait_timeout_ms = 10000
file_poll_interval_ms = 500
resolver_timeout_ms = 2000
# spots_file = "/etc/fbi/spots.txt"

[indexer.path_filter]
include = []
exclude = ["**/.*", "**/*.tmp"]

[elasticsearch]
url = "http://localhost:9200"
index = "fbi"
api_key = ""
api_key_header = "x-api-key"
timeout_secs = 30

[identity]
passwd_file = "/etc/passwd"
group_file = "/etc/group"

# [[spots]]
# path = "/badc/cmip6"
# name = "spot-1234-cmip6"

[logging]
level = "info"
"#;
