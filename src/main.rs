//! Application entry point for the `audible-uv-meter` device service.
//!
//! This binary orchestrates the full startup sequence for the meter,
//! including:
//! - Loading configuration from the TOML settings file (`.env` honored)
//! - Initializing structured logging/tracing
//! - Opening the audio output, falling back to a silent one
//! - Probing for the location peripheral when data logging is enabled
//! - Hooking `SIGUSR1` up as the "play audio now" button
//! - Running the notifier loop until Ctrl-C
//!
//! # Environment Variables
//! - `UV_METER_CONFIG` (optional) – settings file (default: `config.toml`)
//! - `UV_METER_TICK_MS` (optional) – overrides the tick period
//! - `UV_METER_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `UV_METER_SPAN_EVENTS` (optional) – span event mode for tracing
use std::{env, time::Duration};

use anyhow::Result;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use audible_uv_meter::{
    audio::{AlertPlayer, ClipSink, SilentOutput, Speaker, ToneSink},
    config,
    devices::{AdcFileSensor, ConsoleDisplay},
    location::LocationTimeSource,
    notifier::{self, Notifier},
    trigger::ManualTrigger,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let (tones, clips): (Box<dyn ToneSink>, Box<dyn ClipSink>) = match Speaker::open() {
        Ok(speaker) => (Box::new(speaker.clone()), Box::new(speaker)),
        Err(e) => {
            tracing::warn!("{} - audio output disabled", e);
            (Box::new(SilentOutput), Box::new(SilentOutput))
        }
    };
    let player = AlertPlayer::new(tones, clips, cfg.risk_info_audio.clone());

    let location = if cfg.data_logging.enabled && cfg.location.enabled {
        LocationTimeSource::connect(
            &cfg.location.device_prefix,
            Duration::from_millis(cfg.location.response_timeout_ms),
            cfg.gps_period_secs(),
        )
    } else {
        LocationTimeSource::Disconnected
    };

    let trigger = ManualTrigger::new();
    spawn_button_listener(trigger.clone());

    let notifier = Notifier::new(
        &cfg,
        Box::new(AdcFileSensor::new(&cfg.sensor.adc_path, cfg.sensor.scale)),
        Box::new(ConsoleDisplay::new(cfg.ui.clone())),
        player,
        location,
        trigger,
    );

    let period = Duration::from_millis(cfg.sensor.tick_interval_ms);
    tracing::info!("Sampling every {:?}", period);

    notifier::run(notifier, period, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    Ok(())
}

// ---

/// Fire `trigger` on every `SIGUSR1`, the headless stand-in for a button.
#[cfg(unix)]
fn spawn_button_listener(trigger: ManualTrigger) {
    // ---
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::user_defined1()) {
        Ok(mut stream) => {
            tokio::spawn(async move {
                while stream.recv().await.is_some() {
                    tracing::info!("Button pressed (SIGUSR1)");
                    trigger.fire();
                }
            });
        }
        Err(e) => tracing::warn!("Manual audio trigger unavailable: {}", e),
    }
}

#[cfg(not(unix))]
fn spawn_button_listener(_trigger: ManualTrigger) {
    tracing::warn!("Manual audio trigger needs SIGUSR1 and is unavailable on this platform");
}

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `UV_METER_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `UV_METER_LOG_LEVEL` env var
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("UV_METER_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to UV_METER_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("UV_METER_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},symphonia=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
