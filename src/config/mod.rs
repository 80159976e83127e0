use crate::error::{LogTeeError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Validated runtime settings consumed by the pipeline and rotation engine
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// File the input stream is copied into
    pub output_path: PathBuf,

    /// Control file watched for rotation requests
    #[serde(default)]
    pub trigger_path: Option<PathBuf>,

    /// Maximum number of archives to keep (0 = keep none)
    #[serde(default)]
    pub max_files: Option<u64>,

    /// Maximum archive age in days (0 = prune everything)
    #[serde(default)]
    pub max_age_days: Option<u64>,

    /// Truncate the output file on startup instead of appending
    #[serde(default)]
    pub truncate_on_start: bool,

    /// Seconds between trigger-file and size checks
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: f64,

    /// Gzip archives instead of copying them
    #[serde(default)]
    pub compress: bool,

    /// Shell command run before archiving, given the output path
    #[serde(default)]
    pub pre_script: Option<String>,

    /// Shell command run after archiving, given the new archive path
    #[serde(default)]
    pub post_script: Option<String>,

    /// Seconds between unconditional timed rotations
    #[serde(default)]
    pub timer_interval_secs: Option<f64>,

    /// Output file size that triggers a rotation
    #[serde(default)]
    pub size_threshold_bytes: Option<u64>,

    /// File the activity log is appended to; activity logging is off without it
    #[serde(default)]
    pub activity_path: Option<PathBuf>,
}

// Default value functions for serde
fn default_scan_interval() -> f64 {
    1.0
}

impl Settings {
    /// Load settings from a file (supports TOML and JSON)
    pub fn from_file(path: &Path) -> Result<Settings> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LogTeeError::ConfigError(format!("Failed to read config file: {}", e)))?;

        // Determine format based on file extension
        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");

        let settings: Settings = match extension {
            "toml" => toml::from_str(&contents)
                .map_err(|e| LogTeeError::InvalidConfig(format!("Failed to parse TOML: {}", e)))?,
            "json" => serde_json::from_str(&contents)
                .map_err(|e| LogTeeError::InvalidConfig(format!("Failed to parse JSON: {}", e)))?,
            _ => {
                return Err(LogTeeError::InvalidConfig(format!(
                    "Unsupported file format: {}. Use .toml or .json",
                    extension
                )))
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.output_path.as_os_str().is_empty() {
            return Err(LogTeeError::ConfigError(
                "output_path must not be empty".to_string(),
            ));
        }

        if self.scan_interval_secs <= 0.0 {
            return Err(LogTeeError::ConfigError(
                "scan_interval_secs must be positive".to_string(),
            ));
        }

        if let Some(interval) = self.timer_interval_secs {
            if interval <= 0.0 {
                return Err(LogTeeError::ConfigError(
                    "timer_interval_secs must be positive".to_string(),
                ));
            }
        }

        if let Some(threshold) = self.size_threshold_bytes {
            if threshold == 0 {
                return Err(LogTeeError::ConfigError(
                    "size_threshold_bytes must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Interval between trigger-file and size checks
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs_f64(self.scan_interval_secs)
    }

    /// Interval between unconditional timed rotations, if configured
    pub fn timer_interval(&self) -> Option<Duration> {
        self.timer_interval_secs.map(Duration::from_secs_f64)
    }
}

/// Immutable rotation parameters, snapshotted once at startup
#[derive(Debug, Clone)]
pub struct RotateConfig {
    pub max_files: Option<u64>,
    pub max_age_days: Option<u64>,
    pub scan_interval: Duration,
    pub compress: bool,
    pub pre_script: Option<String>,
    pub post_script: Option<String>,
}

impl From<&Settings> for RotateConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_files: settings.max_files,
            max_age_days: settings.max_age_days,
            scan_interval: settings.scan_interval(),
            compress: settings.compress,
            pre_script: settings.pre_script.clone(),
            post_script: settings.post_script.clone(),
        }
    }
}
