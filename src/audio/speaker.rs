//! rodio backed audio output, plus a silent stand-in for headless devices.
use std::{fs::File, io::BufReader, path::Path, rc::Rc, time::Duration};

use rodio::{source::SineWave, Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, warn};

use super::{AudioError, ClipSink, Tone, ToneSink};

// ---

/// Default audio output device. Clones share the same output stream.
#[derive(Clone)]
pub struct Speaker {
    // The stream must outlive every sink created from the handle
    _stream: Rc<OutputStream>,
    handle: OutputStreamHandle,
}

impl Speaker {
    pub fn open() -> Result<Self, AudioError> {
        // ---
        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AudioError::Unavailable(e.to_string()))?;
        Ok(Self {
            _stream: Rc::new(stream),
            handle,
        })
    }

    fn sink(&self) -> Result<Sink, AudioError> {
        Sink::try_new(&self.handle).map_err(|e| AudioError::Unavailable(e.to_string()))
    }
}

impl ToneSink for Speaker {
    fn play_tone(&mut self, tone: Tone, duration: Duration) {
        // ---
        match self.sink() {
            Ok(sink) => {
                sink.append(
                    SineWave::new(tone.frequency_hz())
                        .take_duration(duration)
                        .amplify(0.20),
                );
                sink.sleep_until_end();
            }
            Err(e) => warn!("Buzzer: {}", e),
        }
    }
}

impl ClipSink for Speaker {
    fn play_file(&mut self, path: &Path) -> Result<(), AudioError> {
        // ---
        let file = File::open(path)?;
        let source =
            Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode(e.to_string()))?;
        let sink = self.sink()?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// Output used when no audio device is present: logs instead of sounding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentOutput;

impl ToneSink for SilentOutput {
    fn play_tone(&mut self, tone: Tone, _duration: Duration) {
        debug!("Buzzer (silent): {:?} {} Hz", tone, tone.frequency_hz());
    }
}

impl ClipSink for SilentOutput {
    fn play_file(&mut self, path: &Path) -> Result<(), AudioError> {
        // ---
        // Still report missing files the same way a real device would
        File::open(path)?;
        debug!("Audio (silent): {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::io;

    #[test]
    fn test_silent_output_reports_missing_clip() {
        // ---
        let mut out = SilentOutput;
        let err = out.play_file(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn test_silent_output_accepts_existing_clip() {
        // ---
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut out = SilentOutput;
        assert!(out.play_file(file.path()).is_ok());
        out.play_tone(Tone::Base, Duration::from_millis(1));
    }
}
