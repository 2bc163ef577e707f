//! Configuration loader for the `audible-uv-meter` device service.
//!
//! All settings live in one strongly typed [`Config`], read once at startup
//! from a TOML file whose path comes from `UV_METER_CONFIG` (default
//! `config.toml`). A missing file means device defaults. A malformed file or
//! an invalid value is a startup error, so nothing downstream has to
//! second-guess a setting.
//!
use std::{env, fs, io, path::Path};

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::Deserialize;

use crate::models::RiskTier;

/// Read an environment variable, falling back to a default.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

/// Parse an optional integer environment variable.
macro_rules! parse_env_u64 {
    ($var_name:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
    };
}

pub const CONFIG_PATH_VAR: &str = "UV_METER_CONFIG";
pub const TICK_OVERRIDE_VAR: &str = "UV_METER_TICK_MS";

/// Strongly typed application configuration.
///
/// Immutable after loading; components receive the section they need.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    // ---
    pub ui: UiConfig,
    pub data_logging: DataLoggingConfig,
    pub alert: AlertConfig,
    pub risk_info_text: RiskInfoTextConfig,
    pub risk_info_audio: RiskInfoAudioConfig,
    pub sensor: SensorConfig,
    pub location: LocationConfig,
}

/// Background image lookup: `<prefix><color><suffix>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub image_filename_prefix: String,
    pub image_filename_suffix: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            image_filename_prefix: "img/background_".into(),
            image_filename_suffix: ".jpg".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataLoggingConfig {
    pub enabled: bool,
    /// Seconds between log rows.
    pub data_log_interval: u64,
    pub data_log_filename_prefix: String,
    /// Stamp rows with the host clock when the location peripheral has no time.
    pub system_time_fallback: bool,
}

impl Default for DataLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            data_log_interval: 60,
            data_log_filename_prefix: "uv_meter_data.".into(),
            system_time_fallback: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertConfig {
    pub enabled: bool,
    /// UV index at or above which the alert sounds.
    pub alert_uv_index: f64,
    /// Seconds between repeated alerts.
    pub alert_interval: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            alert_uv_index: 7.0,
            alert_interval: 60,
        }
    }
}

const NO_PROTECTION: &str = "NO PROTECTION REQUIRED - You can safely enjoy being outside!";
const PROTECTION: &str = "PROTECTION REQUIRED - Seek shade during midday hours! \
Slip on a shirt, slop on sunscreen and slap on hat!";
const EXTRA_PROTECTION: &str = "EXTRA PROTECTION - Avoid being outside during midday hours! \
Make sure you seek shade! Shirt, sunscreen and hat are a must!";

/// Advisory text shown under the risk tier.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskInfoTextConfig {
    pub enabled: bool,
    pub low: String,
    pub moderate: String,
    pub high: String,
    pub very_high: String,
    pub extreme: String,
}

impl Default for RiskInfoTextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            low: NO_PROTECTION.into(),
            moderate: PROTECTION.into(),
            high: PROTECTION.into(),
            very_high: EXTRA_PROTECTION.into(),
            extreme: EXTRA_PROTECTION.into(),
        }
    }
}

impl RiskInfoTextConfig {
    pub fn text_for(&self, tier: RiskTier) -> &str {
        // ---
        match tier {
            RiskTier::Low => &self.low,
            RiskTier::Moderate => &self.moderate,
            RiskTier::High => &self.high,
            RiskTier::VeryHigh => &self.very_high,
            RiskTier::Extreme => &self.extreme,
        }
    }
}

/// Per-tier clip lookup: `<prefix><tier_name><suffix>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskInfoAudioConfig {
    pub enabled: bool,
    pub audio_filename_prefix: String,
    pub audio_filename_suffix: String,
}

impl Default for RiskInfoAudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            audio_filename_prefix: "audio/UV_risk_level_".into(),
            audio_filename_suffix: ".wav".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// File holding the raw ADC value (sysfs IIO style).
    pub adc_path: String,
    /// Multiplier from raw value to millivolts.
    pub scale: f64,
    pub tick_interval_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            adc_path: "/sys/bus/iio/devices/iio:device0/in_voltage0_raw".into(),
            scale: 1.0,
            tick_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocationConfig {
    pub enabled: bool,
    /// Device paths probed are this prefix followed by a letter.
    pub device_prefix: String,
    pub response_timeout_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            device_prefix: "/dev/tty".into(),
            response_timeout_ms: 2000,
        }
    }
}

/// Load configuration from the file named by `UV_METER_CONFIG`.
///
/// Optional:
/// - `UV_METER_CONFIG` – TOML settings file (default: `config.toml`)
/// - `UV_METER_TICK_MS` – overrides `sensor.tick_interval_ms`
///
/// Returns an error if the file is unreadable, malformed or invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let path = env_or!(CONFIG_PATH_VAR, "config.toml");
    let mut cfg = load_from_file(Path::new(&path))?;

    if let Some(tick) = parse_env_u64!(TICK_OVERRIDE_VAR) {
        cfg.sensor.tick_interval_ms = tick;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Parse a settings file; a missing file yields the defaults.
pub fn load_from_file(path: &Path) -> Result<Config> {
    // ---
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(
                "No config file found at {} - using default configuration",
                path.display()
            );
            return Ok(Config::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read config {}", path.display()))
        }
    };

    let cfg: Config = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    /// Reject settings that would only fail later at first use.
    pub fn validate(&self) -> Result<()> {
        // ---
        ensure!(
            self.sensor.tick_interval_ms > 0,
            "sensor.tick_interval_ms must be positive"
        );
        ensure!(
            self.sensor.scale.is_finite() && self.sensor.scale > 0.0,
            "sensor.scale must be a positive number"
        );
        ensure!(
            self.data_logging.data_log_interval > 0,
            "data_logging.data_log_interval must be positive"
        );
        ensure!(
            !self.data_logging.data_log_filename_prefix.is_empty(),
            "data_logging.data_log_filename_prefix must not be empty"
        );
        ensure!(
            self.alert.alert_interval > 0,
            "alert.alert_interval must be positive"
        );
        if !self.alert.alert_uv_index.is_finite() || self.alert.alert_uv_index < 0.0 {
            bail!("alert.alert_uv_index must be a non-negative number");
        }
        ensure!(
            self.location.response_timeout_ms > 0,
            "location.response_timeout_ms must be positive"
        );
        Ok(())
    }

    /// Seconds between GPS fixes: half the data-log interval, at least one.
    pub fn gps_period_secs(&self) -> u64 {
        (self.data_logging.data_log_interval / 2).max(1)
    }

    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!(
            "  ui              : images {}<color>{}",
            self.ui.image_filename_prefix,
            self.ui.image_filename_suffix
        );
        tracing::info!(
            "  data_logging    : enabled={} interval={}s prefix={} system_time_fallback={}",
            self.data_logging.enabled,
            self.data_logging.data_log_interval,
            self.data_logging.data_log_filename_prefix,
            self.data_logging.system_time_fallback
        );
        tracing::info!(
            "  alert           : enabled={} uv_index>={} interval={}s",
            self.alert.enabled,
            self.alert.alert_uv_index,
            self.alert.alert_interval
        );
        tracing::info!("  risk_info_text  : enabled={}", self.risk_info_text.enabled);
        tracing::info!(
            "  risk_info_audio : enabled={} clips {}<tier>{}",
            self.risk_info_audio.enabled,
            self.risk_info_audio.audio_filename_prefix,
            self.risk_info_audio.audio_filename_suffix
        );
        tracing::info!(
            "  sensor          : {} x{} every {}ms",
            self.sensor.adc_path,
            self.sensor.scale,
            self.sensor.tick_interval_ms
        );
        tracing::info!(
            "  location        : enabled={} devices {}* timeout={}ms",
            self.location.enabled,
            self.location.device_prefix,
            self.location.response_timeout_ms
        );
    }
}
