//! Sensor input and display output of the meter.
//!
//! The notifier only sees the [`SensorSource`] and [`DisplaySink`] traits.
//! The implementations here target a headless Linux board: the ADC is read
//! from a sysfs file and the "screen" is the log.
use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::config::UiConfig;

// ---

/// Source of analog sensor readings.
pub trait SensorSource {
    /// Current sensor output in millivolts. Always yields a value.
    fn read_millivolts(&mut self) -> f64;
}

/// Target of the four display commands.
pub trait DisplaySink {
    fn set_index_text(&mut self, text: &str);
    /// Tint the background for a tier color. Missing images fail silently.
    fn set_background(&mut self, color: &str);
    fn set_risk_text(&mut self, text: &str);
    fn set_advisory_text(&mut self, text: &str);
}

/// ADC exposed as a file holding the raw conversion value.
pub struct AdcFileSensor {
    // ---
    path: PathBuf,
    scale: f64,
    last_good: f64,
}

impl AdcFileSensor {
    pub fn new(path: impl Into<PathBuf>, scale: f64) -> Self {
        Self {
            path: path.into(),
            scale,
            last_good: 0.0,
        }
    }
}

impl SensorSource for AdcFileSensor {
    fn read_millivolts(&mut self) -> f64 {
        // ---
        let raw = fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|s| s.trim().parse::<f64>().map_err(|e| e.to_string()));

        match raw {
            Ok(value) => {
                self.last_good = value * self.scale;
            }
            Err(e) => warn!(
                "Sensor: read of {} failed ({}), reusing {} mV",
                self.path.display(),
                e,
                self.last_good
            ),
        }
        self.last_good
    }
}

/// Display rendered as log lines.
///
/// Background images are resolved against the UI settings; once an image is
/// missing the display keeps a neutral gray tint for the rest of the run.
pub struct ConsoleDisplay {
    // ---
    ui: UiConfig,
    images_available: bool,
}

impl ConsoleDisplay {
    pub fn new(ui: UiConfig) -> Self {
        Self {
            ui,
            images_available: true,
        }
    }

    pub fn image_path(&self, color: &str) -> String {
        format!(
            "{}{}{}",
            self.ui.image_filename_prefix, color, self.ui.image_filename_suffix
        )
    }

    pub fn images_available(&self) -> bool {
        self.images_available
    }
}

impl DisplaySink for ConsoleDisplay {
    fn set_index_text(&mut self, text: &str) {
        info!("Display: UV index {}", text);
    }

    fn set_background(&mut self, color: &str) {
        // ---
        if !self.images_available {
            return;
        }
        let image = self.image_path(color);
        if Path::new(&image).is_file() {
            info!("Display: background {}", image);
        } else {
            warn!("Display: image {} missing, using gray background", image);
            self.images_available = false;
        }
    }

    fn set_risk_text(&mut self, text: &str) {
        info!("Display: risk level {}", text);
    }

    fn set_advisory_text(&mut self, text: &str) {
        info!("Display: {}", text);
    }
}
