//! Monitor configuration file support.
//!
//! Configuration is read from a TOML file (`monitor.toml`) whose sections map
//! onto the monitor's components. Every field has a default, so an empty
//! file (or no file at all) yields a working configuration pointed at the
//! public P2P quake feed.
//!
//! ```toml
//! [feed]
//! url = "wss://api.p2pquake.net/v2/ws"
//! reconnect_delay_ms = 3000
//!
//! [geocode]
//! api_key = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ErrorContext, MonitorError, MonitorResult};

/// Complete monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub feed: FeedSettings,
    #[serde(default)]
    pub history: HistorySettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub effects: EffectSettings,
    #[serde(default)]
    pub geocode: GeocodeSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

/// Live feed subscription settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSettings {
    #[serde(default = "default_feed_url")]
    pub url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Age window of the live history buffer, in calendar days.
    #[serde(default = "default_live_window_days")]
    pub live_window_days: u32,
    /// Count cap of the live history buffer.
    #[serde(default = "default_live_max_entries")]
    pub live_max_entries: usize,
}

/// Startup history snapshot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySettings {
    #[serde(default = "default_history_url")]
    pub url: String,
    /// Number of records requested from the history endpoint.
    #[serde(default = "default_history_limit")]
    pub limit: u32,
    /// Age window applied to the snapshot, in calendar days.
    #[serde(default = "default_history_window_days")]
    pub window_days: u32,
    /// Maximum number of snapshot reports merged into the buffer.
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Display controller settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    /// How long a selected history entry stays pinned, in ticks.
    #[serde(default = "default_pin_seconds")]
    pub pin_seconds: u32,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Number of entries shown in the recent list.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

/// One-shot side effect settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    #[serde(default = "default_true")]
    pub announce: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
    /// Pause between the notification cue and the spoken announcement.
    #[serde(default = "default_speech_delay_ms")]
    pub speech_delay_ms: u64,
    #[serde(default = "default_tts_url")]
    pub tts_url: String,
    #[serde(default = "default_speaker")]
    pub speaker: u32,
    /// Program invoked with the path of each synthesized announcement.
    #[serde(default)]
    pub player_command: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Geocoding settings for regional intensity markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeSettings {
    /// OpenCage API key. Without it no uncached markers are resolved.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_geocode_url")]
    pub url: String,
    /// Spacing between successive outbound lookups.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_cache_ttl_days")]
    pub cache_ttl_days: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Persisted state location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

/// HTTP surface settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_feed_url() -> String {
    "wss://api.p2pquake.net/v2/ws".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_live_window_days() -> u32 {
    2
}

fn default_live_max_entries() -> usize {
    30
}

fn default_history_url() -> String {
    "https://api.p2pquake.net/v2/history".to_string()
}

fn default_history_limit() -> u32 {
    100
}

fn default_history_window_days() -> u32 {
    15
}

fn default_history_max_entries() -> usize {
    15
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_pin_seconds() -> u32 {
    15
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_recent_limit() -> usize {
    30
}

fn default_true() -> bool {
    true
}

fn default_speech_delay_ms() -> u64 {
    1500
}

fn default_tts_url() -> String {
    "https://api.tts.quest/v3/voicevox/synthesis".to_string()
}

fn default_speaker() -> u32 {
    21
}

fn default_geocode_url() -> String {
    "https://api.opencagedata.com/geocode/v1/json".to_string()
}

fn default_pacing_ms() -> u64 {
    1100
}

fn default_cache_ttl_days() -> u32 {
    7
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".eqo")
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            live_window_days: default_live_window_days(),
            live_max_entries: default_live_max_entries(),
        }
    }
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            url: default_history_url(),
            limit: default_history_limit(),
            window_days: default_history_window_days(),
            max_entries: default_history_max_entries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            pin_seconds: default_pin_seconds(),
            tick_ms: default_tick_ms(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            announce: true,
            sound: true,
            speech_delay_ms: default_speech_delay_ms(),
            tts_url: default_tts_url(),
            speaker: default_speaker(),
            player_command: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for GeocodeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            url: default_geocode_url(),
            pacing_ms: default_pacing_ms(),
            cache_ttl_days: default_cache_ttl_days(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl FeedSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl DisplaySettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl EffectSettings {
    pub fn speech_delay(&self) -> Duration {
        Duration::from_millis(self.speech_delay_ms)
    }
}

impl GeocodeSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    /// The API key, if one is configured and looks usable.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !key.contains("..."))
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(MonitorConfig)` if successful
    /// * `Err(MonitorError)` if the file cannot be read, parsed or validated
    pub fn from_file<P: AsRef<Path>>(path: P) -> MonitorResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            MonitorError::Configuration {
                message: format!("Failed to read config file: {}", e),
                context: ErrorContext::new("load_config").with_entity_id(path.display()),
            }
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> MonitorResult<Self> {
        let config: MonitorConfig = toml::from_str(content).map_err(|e| {
            MonitorError::configuration(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `monitor.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> MonitorResult<Self> {
        let search_paths = [
            PathBuf::from("monitor.toml"),
            PathBuf::from("backend/monitor.toml"),
            PathBuf::from("../monitor.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(MonitorError::configuration(
            "No monitor.toml found in standard locations",
        ))
    }

    /// Load the effective configuration: the default file if present,
    /// built-in defaults otherwise, then environment overrides.
    ///
    /// A config file that exists but is broken is still an error.
    pub fn load() -> MonitorResult<Self> {
        let mut config = match Self::from_default_location() {
            Ok(config) => config,
            Err(MonitorError::Configuration { message, .. })
                if message.starts_with("No monitor.toml") =>
            {
                log::info!("No monitor.toml found, using built-in defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// # Environment Variables
    /// - `EQO_FEED_URL`: live feed endpoint
    /// - `EQO_HISTORY_URL`: history snapshot endpoint
    /// - `EQO_STATE_DIR`: directory for persisted markers and geocode cache
    /// - `OPENCAGE_API_KEY`: geocoding credential
    /// - `HOST` / `PORT`: HTTP bind address
    pub fn apply_env_overrides(&mut self) -> MonitorResult<()> {
        if let Ok(url) = env::var("EQO_FEED_URL") {
            self.feed.url = url;
        }
        if let Ok(url) = env::var("EQO_HISTORY_URL") {
            self.history.url = url;
        }
        if let Ok(dir) = env::var("EQO_STATE_DIR") {
            self.storage.state_dir = PathBuf::from(dir);
        }
        if let Ok(key) = env::var("OPENCAGE_API_KEY") {
            self.geocode.api_key = Some(key);
        }
        if let Ok(host) = env::var("HOST") {
            self.http.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.http.port = port
                .parse()
                .map_err(|_| MonitorError::configuration("PORT must be a valid port number"))?;
        }
        self.validate()
    }

    /// Reject settings that would break the buffer or timer invariants.
    pub fn validate(&self) -> MonitorResult<()> {
        let checks = [
            (self.feed.reconnect_delay_ms == 0, "feed.reconnect_delay_ms must be > 0"),
            (self.feed.live_window_days == 0, "feed.live_window_days must be > 0"),
            (self.feed.live_max_entries == 0, "feed.live_max_entries must be > 0"),
            (self.history.limit == 0, "history.limit must be > 0"),
            (self.history.max_entries == 0, "history.max_entries must be > 0"),
            (self.display.pin_seconds == 0, "display.pin_seconds must be > 0"),
            (self.display.tick_ms == 0, "display.tick_ms must be > 0"),
            (self.geocode.cache_ttl_days == 0, "geocode.cache_ttl_days must be > 0"),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(MonitorError::configuration(*message)),
            None => Ok(()),
        }
    }
}
