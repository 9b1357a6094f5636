use crate::error::ConfigError;
use crate::zcl::ReportPreset;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

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

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: called from the synchronous part of main, before the runtime
            // or any other thread has been started
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            pairs.push((key, value));
        }
    }
    pairs
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reporting: ReportingConfig,
    pub setup: SetupConfig,
}

/// Interval values behind each [`ReportPreset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub min_interval: u16,
    pub max_interval: u16,
    pub reportable_change: u32,
    pub asap_min_interval: u16,
    pub immediate_min_interval: u16,
    pub battery_save_min_interval: u16,
    pub battery_save_max_interval: u16,
}

/// Concrete reporting bounds for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportInterval {
    pub min_interval: u16,
    pub max_interval: u16,
    pub reportable_change: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Whether channel initialization may answer reads from the attribute cache
    pub initialize_from_cache: bool,
    /// How many channels of one endpoint run their lifecycle at the same time
    pub max_concurrent_channels: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            min_interval: 30,
            max_interval: 900,
            reportable_change: 1,
            asap_min_interval: 1,
            immediate_min_interval: 0,
            battery_save_min_interval: 3600,
            battery_save_max_interval: 10800,
        }
    }
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            initialize_from_cache: true,
            max_concurrent_channels: 4,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reporting: ReportingConfig::default(),
            setup: SetupConfig::default(),
        }
    }
}

impl ReportingConfig {
    pub fn interval(&self, preset: ReportPreset) -> ReportInterval {
        let (min_interval, max_interval) = match preset {
            ReportPreset::Default => (self.min_interval, self.max_interval),
            ReportPreset::Asap => (self.asap_min_interval, self.max_interval),
            ReportPreset::Immediate => (self.immediate_min_interval, self.max_interval),
            ReportPreset::BatterySave => (
                self.battery_save_min_interval,
                self.battery_save_max_interval,
            ),
        };
        ReportInterval {
            min_interval,
            max_interval,
            reportable_change: self.reportable_change,
        }
    }
}

impl Config {
    /// Default location of the JSON config file.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ZIGBEE_CHANNELS_CONFIG") {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("zigbee-channels").join("config.json"))
    }

    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Defaults, then the config file if one exists, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("REPORT_MIN_INTERVAL")
            && let Ok(v) = v.parse()
        {
            self.reporting.min_interval = v;
        }
        if let Ok(v) = std::env::var("REPORT_MAX_INTERVAL")
            && let Ok(v) = v.parse()
        {
            self.reporting.max_interval = v;
        }
        if let Ok(v) = std::env::var("REPORT_CHANGE")
            && let Ok(v) = v.parse()
        {
            self.reporting.reportable_change = v;
        }
        if let Ok(v) = std::env::var("INITIALIZE_FROM_CACHE")
            && let Ok(v) = v.parse()
        {
            self.setup.initialize_from_cache = v;
        }
        if let Ok(v) = std::env::var("MAX_CONCURRENT_CHANNELS")
            && let Ok(v) = v.parse()
        {
            self.setup.max_concurrent_channels = v;
        }
    }
}
