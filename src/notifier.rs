//! The per-tick control loop of the meter.
//!
//! Each tick reads the sensor, classifies the reading and then fans out:
//! - the index display is refreshed every tick
//! - background, risk text and advisory only change when the tier changes
//! - a pending manual request plays the tier clip or the melody
//! - data logging and the threshold alert each run at most once per interval
//!
//! All mutable loop state lives in [`NotifierState`], owned by the
//! [`Notifier`]. The manual request is the only value shared with another
//! execution context and goes through [`ManualTrigger`].
use std::{
    future::Future,
    time::{Duration, Instant},
};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, debug_span, info, warn};

use crate::audio::{round_index, AlertPlayer};
use crate::classifier::classify;
use crate::config::{AlertConfig, Config, DataLoggingConfig, RiskInfoTextConfig};
use crate::devices::{DisplaySink, SensorSource};
use crate::location::LocationTimeSource;
use crate::models::{Classification, LogRecord, Reading, RiskTier};
use crate::recorder::{Appended, Recorder};
use crate::trigger::ManualTrigger;

// ---

/// Minimum spacing between runs of a side effect.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last_fired: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_fired: None,
        }
    }

    /// True if the action never ran or ran at least `interval` ago.
    pub fn ready(&self, now: Instant) -> bool {
        self.last_fired
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }
}

/// Everything the loop remembers between ticks.
#[derive(Debug, Clone)]
pub struct NotifierState {
    // ---
    pub previous_tier: Option<RiskTier>,
    pub log_throttle: Throttle,
    pub alert_throttle: Throttle,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    // ---
    pub classification: Classification,
    pub tier_changed: bool,
    pub manual_audio: bool,
    /// A log attempt was made (throttle fired).
    pub logged: bool,
    /// The attempt produced a row on disk.
    pub log_written: bool,
    pub alerted: bool,
}

pub struct Notifier {
    // ---
    sensor: Box<dyn SensorSource>,
    display: Box<dyn DisplaySink>,
    player: AlertPlayer,
    recorder: Recorder,
    location: LocationTimeSource,
    trigger: ManualTrigger,
    data_logging: DataLoggingConfig,
    alert: AlertConfig,
    risk_text: RiskInfoTextConfig,
    state: NotifierState,
}

impl Notifier {
    pub fn new(
        config: &Config,
        sensor: Box<dyn SensorSource>,
        display: Box<dyn DisplaySink>,
        player: AlertPlayer,
        location: LocationTimeSource,
        trigger: ManualTrigger,
    ) -> Self {
        // ---
        let state = NotifierState {
            previous_tier: None,
            log_throttle: Throttle::new(Duration::from_secs(config.data_logging.data_log_interval)),
            alert_throttle: Throttle::new(Duration::from_secs(config.alert.alert_interval)),
        };

        Self {
            sensor,
            display,
            player,
            recorder: Recorder::new(config.data_logging.data_log_filename_prefix.clone()),
            location,
            trigger,
            data_logging: config.data_logging.clone(),
            alert: config.alert.clone(),
            risk_text: config.risk_info_text.clone(),
            state,
        }
    }

    pub fn state(&self) -> &NotifierState {
        &self.state
    }

    /// Handle that interrupt or signal handlers use to request audio.
    pub fn trigger(&self) -> ManualTrigger {
        self.trigger.clone()
    }

    /// Run one iteration of the loop at monotonic time `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        // ---
        let reading = Reading {
            millivolts: self.sensor.read_millivolts(),
        };
        let c = classify(reading);
        debug!(
            "Sensor {} mV - UV index {:.2} - UV level {:.2} - risk {}",
            reading.millivolts, c.uv_index, c.uv_level, c.risk_tier
        );

        // Display
        self.display.set_index_text(&format!("{:.2}", c.uv_index));
        let tier_changed = self.state.previous_tier != Some(c.risk_tier);
        if tier_changed {
            self.show_tier(c.risk_tier);
        }

        // Manual audio
        let manual_audio = self.trigger.take();
        if manual_audio {
            debug!("Audio: manual request");
            self.player.play_on_request(c.risk_tier, c.uv_index);
        }

        // Data logging
        let mut logged = false;
        let mut log_written = false;
        if self.data_logging.enabled && self.state.log_throttle.ready(now) {
            logged = true;
            log_written = self.log_measurement(&c);
            // Advance even on failure so a broken disk is not retried every tick
            self.state.log_throttle.mark(now);
        }

        // Threshold alert
        let alerted = self.alert.enabled
            && c.uv_index >= self.alert.alert_uv_index
            && self.state.alert_throttle.ready(now);
        if alerted {
            info!(
                "Alert: UV index {:.2} >= {}",
                c.uv_index, self.alert.alert_uv_index
            );
            self.player.play_melody(round_index(c.uv_index));
            self.state.alert_throttle.mark(now);
        }

        self.state.previous_tier = Some(c.risk_tier);

        TickReport {
            classification: c,
            tier_changed,
            manual_audio,
            logged,
            log_written,
            alerted,
        }
    }

    fn show_tier(&mut self, tier: RiskTier) {
        // ---
        self.display.set_background(tier.color());
        self.display.set_risk_text(tier.name());
        if self.risk_text.enabled {
            self.display.set_advisory_text(self.risk_text.text_for(tier));
        }
    }

    /// Write one data-log row. Returns whether a row reached the file.
    fn log_measurement(&mut self, c: &Classification) -> bool {
        // ---
        let mut location = self.location.fetch();
        if location.timestamp_utc.is_none() && self.data_logging.system_time_fallback {
            location.timestamp_utc = Some(Utc::now());
        }

        let record = LogRecord::from_measurement(c, &location);
        match self.recorder.append(&record) {
            Ok(Appended::Written(path)) => {
                debug!("Data log: row written to {}", path.display());
                true
            }
            Ok(Appended::Skipped) => {
                debug!("Data log: no time available, row dropped");
                false
            }
            Err(e) => {
                warn!("Data log: {}, row dropped", e);
                false
            }
        }
    }
}

/// Tick `notifier` every `period` until `shutdown` resolves.
///
/// Ticks never overlap; a slow tick delays the next one instead of bunching
/// them up. Returns the number of ticks run.
pub async fn run<F>(mut notifier: Notifier, period: Duration, shutdown: F) -> u64
where
    F: Future<Output = ()>,
{
    // ---
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut ticks = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                let _span = debug_span!("tick", n = ticks).entered();
                let report = notifier.tick(Instant::now());
                debug!(
                    "Tick {}: tier={} changed={} audio={} logged={} alerted={}",
                    ticks,
                    report.classification.risk_tier,
                    report.tier_changed,
                    report.manual_audio,
                    report.logged,
                    report.alerted
                );
            }
            _ = &mut shutdown => {
                info!("Notifier loop shutting down after {} ticks", ticks);
                break;
            }
        }
    }
    ticks
}
