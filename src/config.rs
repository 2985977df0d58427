use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if (value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\''))
            {
                value = &value[1..value.len() - 1];
            }

            // Only set if not already set (env vars take precedence)
            if std::env::var(key).is_err() {
                // SAFETY: We're single-threaded at this point (called before any async runtime)
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

/// Staleness interval after which a silent shade is forcibly refreshed.
/// The vendor app only offers these four settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceUpdateInterval {
    H1,
    H6,
    H12,
    H24,
}

impl ForceUpdateInterval {
    pub fn from_hours(hours: u64) -> Option<Self> {
        match hours {
            1 => Some(Self::H1),
            6 => Some(Self::H6),
            12 => Some(Self::H12),
            24 => Some(Self::H24),
            _ => None,
        }
    }

    pub fn hours(self) -> u64 {
        match self {
            Self::H1 => 1,
            Self::H6 => 6,
            Self::H12 => 12,
            Self::H24 => 24,
        }
    }

    pub fn as_duration(self) -> Duration {
        Duration::from_secs(self.hours() * 3600)
    }
}

/// Debug verbosity. Also shortens the heartbeat cadence so staleness
/// behavior can be observed without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugLevel {
    Off,
    Debug,
    Trace,
}

impl DebugLevel {
    pub fn log_filter(self) -> &'static str {
        match self {
            Self::Off => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn heartbeat(self) -> Duration {
        match self {
            Self::Off => Duration::from_secs(20),
            Self::Debug | Self::Trace => Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IP address of the vendor WiFi bridge.
    pub bridge_address: String,
    /// API key from the vendor app (settings > about).
    pub api_key: String,
    pub force_update_interval: ForceUpdateInterval,
    pub debug_level: DebugLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_address: "10.0.0.30".to_string(),
            api_key: String::new(),
            force_update_interval: ForceUpdateInterval::H24,
            debug_level: DebugLevel::Off,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("SHADE_BRIDGE_ADDRESS") {
            config.bridge_address = address;
        }
        if let Ok(key) = std::env::var("SHADE_BRIDGE_API_KEY") {
            config.api_key = key;
        }
        if let Ok(hours) = std::env::var("FORCE_UPDATE_INTERVAL_HOURS")
            && let Ok(h) = hours.parse::<u64>()
            && let Some(interval) = ForceUpdateInterval::from_hours(h)
        {
            config.force_update_interval = interval;
        }
        if let Ok(level) = std::env::var("SHADE_BRIDGE_DEBUG") {
            config.debug_level = match level.to_lowercase().as_str() {
                "trace" => DebugLevel::Trace,
                "debug" | "1" | "true" => DebugLevel::Debug,
                _ => DebugLevel::Off,
            };
        }

        config
    }

    /// Heartbeat cadence; shortened while debugging.
    pub fn heartbeat(&self) -> Duration {
        self.debug_level.heartbeat()
    }
}
