//! Audible UV index meter.
//!
//! Samples an analog UV sensor, derives the UV index and risk tier, keeps a
//! display up to date, sounds alerts and optionally logs readings with time
//! and location to dated CSV files.
//!
//! The binary in `main.rs` wires the real devices together; everything here
//! works against traits so it can run against fakes.

pub mod audio;
pub mod classifier;
pub mod config;
pub mod devices;
pub mod location;
pub mod models;
pub mod notifier;
pub mod recorder;
pub mod trigger;

pub use config::Config;
pub use models::{Classification, LocationTimeRecord, LogRecord, Reading, RiskTier};
pub use notifier::{run, Notifier, TickReport};
