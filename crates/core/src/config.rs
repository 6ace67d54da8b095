use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::output::DEFAULT_GPIO_ROOT;
use crate::supervisor::SupervisorConfig;

/// Configuration manager for lumen settings
/// Settings are stored in config.json in the working directory by default; a
/// missing file is created with defaults on first load
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputBackend {
    /// Linux sysfs GPIO driving a relay board
    Gpio,
    /// In-memory outputs, for rehearsing without hardware
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioBackend {
    /// External player process (`audio_command`)
    Process,
    /// In-process playback; needs the `rodio` feature
    Rodio,
    /// Lights only
    None,
}

/// Inclusive wall-clock window, e.g. 01:30 to 18:00. Wraps past midnight
/// when `end` is before `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Output settings
    pub output_backend: OutputBackend,
    pub active_low: bool,
    pub gpio_root: PathBuf,

    // Engine settings
    pub quantum_us: u64,

    // Audio settings
    pub audio_backend: AudioBackend,
    pub audio_command: String,
    pub audio_args: Vec<String>,
    pub terminate_grace_ms: u64,
    pub audio_poll_ms: u64,

    // Loop settings
    pub repeat: bool,
    pub pre_roll_ms: u64,
    pub interlude_on_secs: u64,
    pub interlude_off_secs: u64,
    pub daytime: Option<TimeWindow>,
    pub daytime_check_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Output defaults
            output_backend: OutputBackend::Gpio,
            active_low: true,
            gpio_root: PathBuf::from(DEFAULT_GPIO_ROOT),

            // Engine defaults
            quantum_us: 1000,

            // Audio defaults
            audio_backend: AudioBackend::Process,
            audio_command: "aplay".to_string(),
            audio_args: Vec::new(),
            terminate_grace_ms: 1000,
            audio_poll_ms: 20,

            // Loop defaults
            repeat: true,
            pre_roll_ms: 1000,
            interlude_on_secs: 0,
            interlude_off_secs: 0,
            daytime: None,
            daytime_check_secs: 60,
        }
    }
}

impl Settings {
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            quantum: Duration::from_micros(self.quantum_us),
            terminate_grace: Duration::from_millis(self.terminate_grace_ms),
            audio_poll: Duration::from_millis(self.audio_poll_ms),
        }
    }
}

/// Allowed ranges for the numeric settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub quantum_us: ConfigOption<u64>,
    pub terminate_grace_ms: ConfigOption<u64>,
    pub audio_poll_ms: ConfigOption<u64>,
    pub daytime_check_secs: ConfigOption<u64>,
    pub pre_roll_ms: ConfigOption<u64>,
    pub interlude_on_secs: ConfigOption<u64>,
    pub interlude_off_secs: ConfigOption<u64>,
}

/// Configuration option with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: Settings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'config.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("config.json"));

        Self {
            config_path,
            settings: Settings::default(),
        }
    }

    /// Load settings from configuration file
    /// Writes a default file if none exists yet
    pub fn load(&mut self) -> Result<Settings, ConfigError> {
        if !self.config_path.exists() {
            log::info!(
                "No config at {}, writing defaults",
                self.config_path.display()
            );
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        // Validate version compatibility
        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        // Ensure config directory exists (if config is in a subdirectory)
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at: now.clone(),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Update settings and save to file
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
        self.settings = settings;
        self.save()
    }

    /// Get current settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        ConfigSchema {
            quantum_us: ConfigOption {
                default: 1000,
                valid_range: Some((100, 10_000)),
                description: "Cue wait granularity in microseconds".to_string(),
            },
            terminate_grace_ms: ConfigOption {
                default: 1000,
                valid_range: Some((100, 10_000)),
                description: "Time a stopped audio player gets before it is killed".to_string(),
            },
            audio_poll_ms: ConfigOption {
                default: 20,
                valid_range: Some((1, 1000)),
                description: "Interval for checking whether the track has ended".to_string(),
            },
            daytime_check_secs: ConfigOption {
                default: 60,
                valid_range: Some((1, 3600)),
                description: "How often daytime mode re-checks the clock".to_string(),
            },
            pre_roll_ms: ConfigOption {
                default: 1000,
                valid_range: Some((0, 600_000)),
                description: "All lights off before each cycle".to_string(),
            },
            interlude_on_secs: ConfigOption {
                default: 0,
                valid_range: Some((0, 86_400)),
                description: "All lights on after a completed cycle".to_string(),
            },
            interlude_off_secs: ConfigOption {
                default: 0,
                valid_range: Some((0, 86_400)),
                description: "All lights off after the on interlude".to_string(),
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &Settings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        let ranged = [
            ("quantum_us", settings.quantum_us, &schema.quantum_us),
            (
                "terminate_grace_ms",
                settings.terminate_grace_ms,
                &schema.terminate_grace_ms,
            ),
            ("audio_poll_ms", settings.audio_poll_ms, &schema.audio_poll_ms),
            (
                "daytime_check_secs",
                settings.daytime_check_secs,
                &schema.daytime_check_secs,
            ),
            ("pre_roll_ms", settings.pre_roll_ms, &schema.pre_roll_ms),
            (
                "interlude_on_secs",
                settings.interlude_on_secs,
                &schema.interlude_on_secs,
            ),
            (
                "interlude_off_secs",
                settings.interlude_off_secs,
                &schema.interlude_off_secs,
            ),
        ];
        for (name, value, option) in ranged {
            if let Some((min, max)) = option.valid_range {
                if value < min || value > max {
                    errors.push(format!("{} must be between {} and {}", name, min, max));
                }
            }
        }

        if settings.audio_backend == AudioBackend::Process && settings.audio_command.is_empty() {
            errors.push("audio_command must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Reset settings to defaults
    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        self.save()
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String),
    WriteError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Failed to write config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "Failed to serialize config: {}", msg),
            ConfigError::ValidationError(errors) => {
                write!(f, "Config validation errors: {}", errors.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {}
