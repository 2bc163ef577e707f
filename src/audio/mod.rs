//! Audible feedback: buzzer melodies and per-tier voice clips.
//!
//! The melody encodes the rounded UV index as a sequence of tones: one base
//! tone, then one tone per index step. Steps 1-5 use tone A, 6-10 tone B and
//! 11 and above tone C (next octave). A UV index of 4 plays `C F F F F`,
//! 6.7 rounds to 7 and plays `C F F F F F A A`.
//!
//! Output devices sit behind [`ToneSink`] and [`ClipSink`]. Missing
//! resources never surface as errors to the caller.
use std::{io, path::Path, time::Duration};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RiskInfoAudioConfig;
use crate::models::RiskTier;

mod speaker;

pub use speaker::{SilentOutput, Speaker};

// ---

/// Length of every melody tone: a quarter note at 160 bpm.
pub const TONE_DURATION: Duration = Duration::from_millis(375);

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio output unavailable: {0}")]
    Unavailable(String),

    #[error("cannot decode audio: {0}")]
    Decode(String),

    #[error("audio I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Buzzer pitches used by the melody.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// C5, always first.
    Base,
    /// F5, index steps 1-5.
    A,
    /// A5, index steps 6-10.
    B,
    /// C6, index steps 11+.
    C,
}

impl Tone {
    pub fn frequency_hz(self) -> f32 {
        // ---
        match self {
            Tone::Base => 523.0,
            Tone::A => 698.0,
            Tone::B => 880.0,
            Tone::C => 1046.0,
        }
    }
}

/// Anything that can sound a single tone and block until it is done.
pub trait ToneSink {
    fn play_tone(&mut self, tone: Tone, duration: Duration);
}

/// Anything that can play an audio file to completion.
pub trait ClipSink {
    /// Blocks until playback finishes. A missing file is `io::ErrorKind::NotFound`.
    fn play_file(&mut self, path: &Path) -> Result<(), AudioError>;
}

/// Tone sequence for a rounded UV index.
pub fn melody(uv_index_rounded: u32) -> Vec<Tone> {
    // ---
    let mut tones = Vec::with_capacity(uv_index_rounded as usize + 1);
    tones.push(Tone::Base);
    tones.extend((0..uv_index_rounded).map(|i| match i {
        0..=4 => Tone::A,
        5..=9 => Tone::B,
        _ => Tone::C,
    }));
    tones
}

/// Round a UV index for the melody, halves to even.
///
/// Negative and NaN values play only the base tone.
pub fn round_index(uv_index: f64) -> u32 {
    // ---
    if uv_index.is_finite() && uv_index > 0.0 {
        uv_index.round_ties_even() as u32
    } else {
        0
    }
}

/// Renders UV feedback on the buzzer or as a recorded clip.
pub struct AlertPlayer {
    // ---
    tones: Box<dyn ToneSink>,
    clips: Box<dyn ClipSink>,
    clip_config: RiskInfoAudioConfig,
}

impl AlertPlayer {
    pub fn new(
        tones: Box<dyn ToneSink>,
        clips: Box<dyn ClipSink>,
        clip_config: RiskInfoAudioConfig,
    ) -> Self {
        Self {
            tones,
            clips,
            clip_config,
        }
    }

    pub fn clips_enabled(&self) -> bool {
        self.clip_config.enabled
    }

    /// Play the base tone followed by one tone per index step.
    pub fn play_melody(&mut self, uv_index_rounded: u32) {
        // ---
        debug!("Buzzer: melody for UV index {}", uv_index_rounded);
        for tone in melody(uv_index_rounded) {
            self.tones.play_tone(tone, TONE_DURATION);
        }
    }

    /// Clip path for a tier: `<prefix><tier name with underscores><suffix>`.
    pub fn clip_path(&self, tier: RiskTier) -> String {
        // ---
        format!(
            "{}{}{}",
            self.clip_config.audio_filename_prefix,
            tier.name().replace(' ', "_"),
            self.clip_config.audio_filename_suffix
        )
    }

    /// Play the recorded clip for `tier`, blocking until it ends.
    ///
    /// No-op when clips are disabled or the file does not exist.
    pub fn play_clip(&mut self, tier: RiskTier) {
        // ---
        if !self.clip_config.enabled {
            return;
        }
        let path = self.clip_path(tier);
        debug!("Audio: playing '{}'", path);

        match self.clips.play_file(Path::new(&path)) {
            Ok(()) => debug!("Audio: '{}' completed", path),
            Err(AudioError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Audio: '{}' not found, skipped", path)
            }
            Err(e) => warn!("Audio: playing '{}' failed: {}", path, e),
        }
    }

    /// Manual request: the tier clip when clips are enabled, the melody otherwise.
    pub fn play_on_request(&mut self, tier: RiskTier, uv_index: f64) {
        // ---
        if self.clip_config.enabled {
            self.play_clip(tier);
        } else {
            self.play_melody(round_index(uv_index));
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::{cell::RefCell, path::PathBuf, rc::Rc};

    #[derive(Clone, Default)]
    struct Recording {
        tones: Rc<RefCell<Vec<Tone>>>,
        clips: Rc<RefCell<Vec<PathBuf>>>,
    }

    struct FakeBuzzer(Recording);

    impl ToneSink for FakeBuzzer {
        fn play_tone(&mut self, tone: Tone, _duration: Duration) {
            self.0.tones.borrow_mut().push(tone);
        }
    }

    struct FakeClips {
        recording: Recording,
        missing: bool,
    }

    impl ClipSink for FakeClips {
        fn play_file(&mut self, path: &Path) -> Result<(), AudioError> {
            if self.missing {
                return Err(io::Error::from(io::ErrorKind::NotFound).into());
            }
            self.recording.clips.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }

    fn create_test_player(enabled: bool, missing: bool) -> (AlertPlayer, Recording) {
        // ---
        let recording = Recording::default();
        let config = RiskInfoAudioConfig {
            enabled,
            audio_filename_prefix: "audio/UV_risk_level_".to_string(),
            audio_filename_suffix: ".wav".to_string(),
        };
        let player = AlertPlayer::new(
            Box::new(FakeBuzzer(recording.clone())),
            Box::new(FakeClips {
                recording: recording.clone(),
                missing,
            }),
            config,
        );
        (player, recording)
    }

    fn count(tones: &[Tone], tone: Tone) -> usize {
        tones.iter().filter(|&&t| t == tone).count()
    }

    #[test]
    fn test_melody_low_range() {
        // ---
        let tones = melody(4);
        assert_eq!(tones[0], Tone::Base);
        assert_eq!(count(&tones, Tone::A), 4);
        assert_eq!(count(&tones, Tone::B), 0);
        assert_eq!(count(&tones, Tone::C), 0);
    }

    #[test]
    fn test_melody_mid_range() {
        // ---
        let tones = melody(7);
        assert_eq!(tones.len(), 8);
        assert_eq!(count(&tones, Tone::A), 5);
        assert_eq!(count(&tones, Tone::B), 2);
        assert_eq!(&tones[6..], &[Tone::B, Tone::B]);
    }

    #[test]
    fn test_melody_top_range() {
        // ---
        let tones = melody(11);
        assert_eq!(tones[0], Tone::Base);
        assert_eq!(count(&tones, Tone::A), 5);
        assert_eq!(count(&tones, Tone::B), 5);
        assert_eq!(count(&tones, Tone::C), 1);
        assert_eq!(tones.last(), Some(&Tone::C));
    }

    #[test]
    fn test_melody_zero_is_base_only() {
        // ---
        assert_eq!(melody(0), vec![Tone::Base]);
    }

    #[test]
    fn test_round_index() {
        // ---
        assert_eq!(round_index(6.7), 7);
        assert_eq!(round_index(4.4), 4);
        assert_eq!(round_index(6.5), 6);
        assert_eq!(round_index(7.5), 8);
        assert_eq!(round_index(0.5), 0);
        assert_eq!(round_index(-1.0), 0);
        assert_eq!(round_index(f64::NAN), 0);
    }

    #[test]
    fn test_play_melody_drives_buzzer() {
        // ---
        let (mut player, recording) = create_test_player(false, false);
        player.play_melody(3);
        assert_eq!(
            *recording.tones.borrow(),
            vec![Tone::Base, Tone::A, Tone::A, Tone::A]
        );
    }

    #[test]
    fn test_clip_path_replaces_spaces() {
        // ---
        let (player, _) = create_test_player(true, false);
        assert_eq!(
            player.clip_path(RiskTier::VeryHigh),
            "audio/UV_risk_level_very_high.wav"
        );
    }

    #[test]
    fn test_clip_disabled_is_noop() {
        // ---
        let (mut player, recording) = create_test_player(false, false);
        player.play_clip(RiskTier::High);
        assert!(recording.clips.borrow().is_empty());
    }

    #[test]
    fn test_missing_clip_is_silent() {
        // ---
        let (mut player, recording) = create_test_player(true, true);
        player.play_clip(RiskTier::Extreme);
        assert!(recording.clips.borrow().is_empty());
        assert!(recording.tones.borrow().is_empty());
    }

    #[test]
    fn test_request_prefers_clip_when_enabled() {
        // ---
        let (mut player, recording) = create_test_player(true, false);
        player.play_on_request(RiskTier::Moderate, 3.2);
        assert_eq!(
            *recording.clips.borrow(),
            vec![PathBuf::from("audio/UV_risk_level_moderate.wav")]
        );
        assert!(recording.tones.borrow().is_empty());

        let (mut player, recording) = create_test_player(false, false);
        player.play_on_request(RiskTier::Moderate, 3.2);
        assert_eq!(recording.tones.borrow().len(), 4);
    }
}
