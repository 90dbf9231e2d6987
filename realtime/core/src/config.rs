//! Client Configuration
//!
//! Centralized configuration for the realtime layer, loadable from a TOML
//! file at `~/.config/platewire/realtime.toml` with environment-variable and
//! programmatic overrides.
//!
//! # Configuration Priority
//!
//! Values are resolved with the following priority (highest first):
//! 1. Programmatic builder overrides
//! 2. Environment variables (`PLATEWIRE_API_URL`, `PLATEWIRE_CHANNEL_URL`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! api_base_url = "https://api.platewire.app/v1"
//! channel_url = "wss://api.platewire.app/v1/chat"
//! request_timeout_secs = 30
//! poll_interval_ms = 2000
//! poll_max_attempts = 30
//! typing_quiet_window_secs = 3
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file name within the XDG config directory
pub const CONFIG_FILENAME: &str = "realtime.toml";

/// Application directory name under the XDG config directory
pub const CONFIG_DIR_NAME: &str = "platewire";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file
    #[error("failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse the TOML contents
    #[error("failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Resolved configuration for the realtime layer
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// Base URL of the platform REST API
    pub api_base_url: String,
    /// Path (relative to `api_base_url`) of the assistant SSE endpoint
    pub assistant_stream_path: String,
    /// WebSocket URL of the duplex chat channel, if one is deployed
    pub channel_url: Option<String>,
    /// Timeout applied to plain request/response calls
    pub request_timeout: Duration,
    /// Delay between generation-job status fetches
    pub poll_interval: Duration,
    /// Status fetches allowed before a generation job times out
    pub poll_max_attempts: u32,
    /// Quiet window after the last keystroke before "stopped typing" relays,
    /// and the trust window for inbound typing reports
    pub typing_quiet_window: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/api".to_string(),
            assistant_stream_path: "/assistant/stream".to_string(),
            channel_url: None,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(2000),
            poll_max_attempts: 30,
            typing_quiet_window: Duration::from_secs(3),
        }
    }
}

impl RealtimeConfig {
    /// Create a config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from environment variables, falling back to defaults
    ///
    /// Reads `PLATEWIRE_API_URL` and `PLATEWIRE_CHANNEL_URL`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PLATEWIRE_API_URL") {
            config.api_base_url = url;
        }
        if let Ok(url) = std::env::var("PLATEWIRE_CHANNEL_URL") {
            config.channel_url = Some(url);
        }
        config
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the chat channel URL
    #[must_use]
    pub fn with_channel_url(mut self, url: impl Into<String>) -> Self {
        self.channel_url = Some(url.into());
        self
    }

    /// Set the generation poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the generation poll attempt budget
    #[must_use]
    pub fn with_poll_max_attempts(mut self, attempts: u32) -> Self {
        self.poll_max_attempts = attempts;
        self
    }

    /// Set the typing quiet window
    #[must_use]
    pub fn with_typing_quiet_window(mut self, window: Duration) -> Self {
        self.typing_quiet_window = window;
        self
    }

    /// Full URL of the assistant SSE endpoint
    #[must_use]
    pub fn assistant_stream_url(&self) -> String {
        format!(
            "{}{}",
            self.api_base_url.trim_end_matches('/'),
            self.assistant_stream_path
        )
    }
}

/// Raw TOML shape of the configuration file
///
/// All fields are optional; absent fields keep their resolved defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeToml {
    /// Base URL of the platform REST API
    pub api_base_url: Option<String>,
    /// Path of the assistant SSE endpoint
    pub assistant_stream_path: Option<String>,
    /// WebSocket URL of the duplex chat channel
    pub channel_url: Option<String>,
    /// Request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Poll interval in milliseconds
    pub poll_interval_ms: Option<u64>,
    /// Poll attempt budget
    pub poll_max_attempts: Option<u32>,
    /// Typing quiet window in seconds
    pub typing_quiet_window_secs: Option<u64>,
}

impl RealtimeToml {
    /// Apply the file values on top of `config`
    pub fn apply(&self, config: &mut RealtimeConfig) {
        if let Some(ref url) = self.api_base_url {
            config.api_base_url = url.clone();
        }
        if let Some(ref path) = self.assistant_stream_path {
            config.assistant_stream_path = path.clone();
        }
        if let Some(ref url) = self.channel_url {
            config.channel_url = Some(url.clone());
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = self.poll_max_attempts {
            config.poll_max_attempts = attempts;
        }
        if let Some(secs) = self.typing_quiet_window_secs {
            config.typing_quiet_window = Duration::from_secs(secs);
        }
    }
}

/// Default config file path under the XDG config directory
///
/// Returns `None` when no config directory is available on this platform.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME))
}

/// Load configuration from the default path, then environment
///
/// A missing file is not an error; defaults apply.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<RealtimeConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from an explicit path, then environment
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<RealtimeConfig, ConfigError> {
    let mut config = RealtimeConfig::from_env();

    let Some(path) = path else {
        return Ok(config);
    };
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No realtime config file, using defaults");
        return Ok(config);
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
        path: path.clone(),
        source,
    })?;
    let file: RealtimeToml = toml::from_str(&contents)?;
    file.apply(&mut config);

    tracing::debug!(path = %path.display(), "Loaded realtime config file");
    Ok(config)
}
