//! Configuration file parser for `unifeed.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which serves the CURA deployment (four collection feeds merged
//! into the "CURA" channel). The value is built once at startup and shared
//! read-only by every request; nothing mutates it afterwards.
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source feed URLs, in the order their items are concatenated before
    /// sorting (which decides ties between identical timestamps).
    pub sources: Vec<String>,

    /// Maximum number of items in the merged document.
    pub max_items: usize,

    /// Per-source fetch timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Timeout for each image HEAD probe, in milliseconds.
    pub probe_timeout_ms: u64,

    /// Allow image probes against localhost and private address ranges.
    pub probe_private_hosts: bool,

    /// User-Agent sent with feed fetches and image probes.
    pub user_agent: String,

    pub server: ServerConfig,
    pub channel: ChannelConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Route the merged feed is served on.
    pub path: String,
}

/// Fixed channel-level metadata of the merged feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: String,
    pub link: String,
    pub description: String,
    pub generator: String,
    /// Channel `<image>` URL.
    pub image: Option<String>,
    /// Emitted as `atom:icon`.
    pub favicon: Option<String>,
    /// Public URL of the merged feed itself (`atom:link rel="self"`).
    pub self_url: Option<String>,
}

/// Switches for the optional per-item element groups.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderConfig {
    pub dublin_core: bool,
    pub enclosure: bool,
    pub media: bool,
    pub content_encoded: bool,
    /// Prefix the `content:encoded` body with an `<img>` of the item image.
    pub inline_image: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: vec![
                "https://curaforthegamer.com/play/rss.xml".to_string(),
                "https://curaforthegamer.com/optimize/rss.xml".to_string(),
                "https://curaforthegamer.com/gear/rss.xml".to_string(),
                "https://curaforthegamer.com/beyond/rss.xml".to_string(),
            ],
            max_items: 50,
            fetch_timeout_secs: 30,
            probe_timeout_ms: 2500,
            probe_private_hosts: false,
            user_agent: concat!("unifeed/", env!("CARGO_PKG_VERSION")).to_string(),
            server: ServerConfig::default(),
            channel: ChannelConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: "/rss".to_string(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title: "CURA".to_string(),
            link: "https://curaforthegamer.com/".to_string(),
            description: "Curating for gamers. The useful, the interesting, the worthwhile."
                .to_string(),
            generator: "CURA unified feed".to_string(),
            image: None,
            favicon: None,
            self_url: None,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dublin_core: true,
            enclosure: true,
            media: true,
            content_encoded: true,
            inline_image: true,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "sources",
        "max_items",
        "fetch_timeout_secs",
        "probe_timeout_ms",
        "probe_private_hosts",
        "user_agent",
        "server",
        "channel",
        "render",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    /// - Unparsable source URL or zero limits → `Err`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for source in &self.sources {
            url::Url::parse(source).map_err(|e| ConfigError::InvalidSource {
                url: source.clone(),
                reason: e.to_string(),
            })?;
        }
        if self.max_items == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_items",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.probe_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "probe_timeout_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.server.path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "server.path",
                reason: "must start with '/'".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

// ============================================================================
// Tests
// ============================================================================
