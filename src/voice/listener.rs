//! Phrase capture with an adaptive energy threshold
//!
//! A listen cycle calibrates against ambient noise, waits for the energy of
//! the input to cross the threshold, then records until the speaker pauses or
//! the phrase limit is reached. While nobody is talking the threshold keeps
//! drifting toward the room's noise floor.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;

use super::capture::AudioCapture;
use super::stt::RecognitionError;
use crate::Result;
use crate::client::Listen;
use crate::config::ListenConfig;

/// Samples per analysis chunk
pub const CHUNK_SAMPLES: usize = 1024;

/// Starting threshold, on the 16-bit RMS scale
const INITIAL_THRESHOLD: f32 = 300.0;

/// Per-second damping of the adaptive threshold
const DAMPING: f32 = 0.15;

/// Threshold target as a multiple of ambient energy
const TARGET_RATIO: f32 = 1.5;

/// Trailing non-speech that ends a phrase
const PAUSE_SECS: f32 = 0.8;

/// Phrases with less speech than this are discarded
const MIN_PHRASE_SECS: f32 = 0.3;

/// Non-speech kept on either side of a phrase
const LEAD_IN_SECS: f32 = 0.5;

/// How often the microphone buffer is drained
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// RMS energy of a chunk on the 16-bit sample scale
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn chunk_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt() * 32768.0
}

/// Energy level above which a chunk counts as speech
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyThreshold {
    level: f32,
    dynamic: bool,
}

impl Default for EnergyThreshold {
    fn default() -> Self {
        Self::new(INITIAL_THRESHOLD, true)
    }
}

impl EnergyThreshold {
    #[must_use]
    pub const fn new(level: f32, dynamic: bool) -> Self {
        Self { level, dynamic }
    }

    #[must_use]
    pub const fn level(&self) -> f32 {
        self.level
    }

    #[must_use]
    pub fn is_speech(&self, energy: f32) -> bool {
        energy > self.level
    }

    /// Move the level toward `energy * 1.5`, weighted by the chunk length
    pub fn calibrate(&mut self, energy: f32, chunk_secs: f32) {
        let damping = DAMPING.powf(chunk_secs);
        let target = energy * TARGET_RATIO;
        self.level = self.level.mul_add(damping, target * (1.0 - damping));
    }

    /// Adapt to background noise, when dynamic adjustment is enabled
    fn track(&mut self, energy: f32, chunk_secs: f32) {
        if self.dynamic {
            self.calibrate(energy, chunk_secs);
        }
    }
}

/// Where a listen cycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Measuring ambient noise
    Calibrating,
    /// Waiting for speech to start
    Waiting,
    /// Recording a phrase
    Capturing,
}

/// Result of feeding one chunk to the detector
#[derive(Debug, PartialEq)]
pub enum PhraseEvent {
    /// Keep feeding chunks
    Pending,
    /// A phrase was captured
    Complete(Vec<f32>),
    /// Nobody spoke before the start timeout
    TimedOut,
}

/// Chunk-driven phrase detector
///
/// Time is measured in samples fed, so behaviour is independent of how
/// quickly the audio arrives.
pub struct PhraseDetector {
    threshold: EnergyThreshold,
    sample_rate: u32,
    state: ListenerState,
    calibration_samples: usize,
    start_timeout_samples: usize,
    phrase_limit_samples: usize,
    calibrated: usize,
    elapsed: usize,
    phrase_start: usize,
    frames: VecDeque<Vec<f32>>,
    pause_chunks: usize,
    phrase_chunks: usize,
}

impl PhraseDetector {
    /// Create a detector with the default threshold
    #[must_use]
    pub fn new(windows: ListenConfig, sample_rate: u32) -> Self {
        Self::with_threshold(windows, sample_rate, EnergyThreshold::default())
    }

    #[must_use]
    pub fn with_threshold(
        windows: ListenConfig,
        sample_rate: u32,
        threshold: EnergyThreshold,
    ) -> Self {
        let to_samples = |d: Duration| duration_samples(d, sample_rate);

        Self {
            threshold,
            sample_rate,
            state: ListenerState::Calibrating,
            calibration_samples: to_samples(windows.calibration),
            start_timeout_samples: to_samples(windows.start_timeout),
            phrase_limit_samples: to_samples(windows.phrase_limit),
            calibrated: 0,
            elapsed: 0,
            phrase_start: 0,
            frames: VecDeque::new(),
            pause_chunks: 0,
            phrase_chunks: 0,
        }
    }

    #[must_use]
    pub const fn state(&self) -> ListenerState {
        self.state
    }

    #[must_use]
    pub const fn threshold(&self) -> EnergyThreshold {
        self.threshold
    }

    /// Feed the next chunk of captured audio
    pub fn push(&mut self, chunk: &[f32]) -> PhraseEvent {
        let energy = chunk_energy(chunk);
        #[allow(clippy::cast_precision_loss)]
        let chunk_secs = chunk.len() as f32 / self.sample_rate as f32;

        if self.state == ListenerState::Calibrating {
            if self.calibrated + chunk.len() <= self.calibration_samples {
                self.calibrated += chunk.len();
                self.threshold.calibrate(energy, chunk_secs);
                return PhraseEvent::Pending;
            }

            tracing::debug!(threshold = self.threshold.level(), "ambient noise calibrated");
            self.state = ListenerState::Waiting;
        }

        self.elapsed += chunk.len();

        match self.state {
            ListenerState::Calibrating => PhraseEvent::Pending,
            ListenerState::Waiting => {
                if self.elapsed > self.start_timeout_samples {
                    tracing::trace!(elapsed = self.elapsed, "no speech before timeout");
                    return PhraseEvent::TimedOut;
                }

                self.frames.push_back(chunk.to_vec());
                if self.frames.len() > self.lead_in_chunks() {
                    self.frames.pop_front();
                }

                if self.threshold.is_speech(energy) {
                    tracing::trace!(energy, "speech started");
                    self.state = ListenerState::Capturing;
                    self.phrase_start = self.elapsed;
                    self.pause_chunks = 0;
                    self.phrase_chunks = 0;
                } else {
                    self.threshold.track(energy, chunk_secs);
                }

                PhraseEvent::Pending
            }
            ListenerState::Capturing => {
                if self.elapsed - self.phrase_start > self.phrase_limit_samples {
                    tracing::trace!("phrase limit reached");
                    return self.finish_phrase();
                }

                self.frames.push_back(chunk.to_vec());
                self.phrase_chunks += 1;

                if self.threshold.is_speech(energy) {
                    self.pause_chunks = 0;
                } else {
                    self.pause_chunks += 1;
                }

                if self.pause_chunks > self.pause_limit_chunks() {
                    return self.finish_phrase();
                }

                PhraseEvent::Pending
            }
        }
    }

    /// Close the current phrase, discarding it if it was too short
    fn finish_phrase(&mut self) -> PhraseEvent {
        let speech_chunks = self.phrase_chunks.saturating_sub(self.pause_chunks);

        if speech_chunks < self.min_phrase_chunks() {
            tracing::trace!(speech_chunks, "phrase too short, waiting again");
            self.frames.clear();
            self.state = ListenerState::Waiting;
            return PhraseEvent::Pending;
        }

        let excess = self.pause_chunks.saturating_sub(self.lead_in_chunks());
        for _ in 0..excess {
            self.frames.pop_back();
        }

        let phrase: Vec<f32> = self.frames.drain(..).flatten().collect();
        tracing::debug!(samples = phrase.len(), "phrase captured");
        PhraseEvent::Complete(phrase)
    }

    fn pause_limit_chunks(&self) -> usize {
        chunks_for(PAUSE_SECS, self.sample_rate)
    }

    fn min_phrase_chunks(&self) -> usize {
        chunks_for(MIN_PHRASE_SECS, self.sample_rate)
    }

    fn lead_in_chunks(&self) -> usize {
        chunks_for(LEAD_IN_SECS, self.sample_rate)
    }
}

/// Whole chunks needed to cover `secs` of audio
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn chunks_for(secs: f32, sample_rate: u32) -> usize {
    (secs * sample_rate as f32 / CHUNK_SAMPLES as f32).ceil() as usize
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn duration_samples(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * f64::from(sample_rate)) as usize
}

/// The default microphone, opened fresh for every listen cycle
pub struct Microphone {
    windows: ListenConfig,
}

impl Microphone {
    #[must_use]
    pub const fn new(windows: ListenConfig) -> Self {
        Self { windows }
    }
}

#[async_trait(?Send)]
impl Listen for Microphone {
    async fn listen(&mut self) -> Result<Vec<f32>> {
        let capture = AudioCapture::open()?;

        let mut detector = PhraseDetector::new(self.windows, capture.sample_rate());
        let mut pending: Vec<f32> = Vec::new();
        let mut announced = false;

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            pending.extend(capture.drain());

            let mut consumed = 0;
            while pending.len() - consumed >= CHUNK_SAMPLES {
                let chunk = &pending[consumed..consumed + CHUNK_SAMPLES];
                consumed += CHUNK_SAMPLES;

                match detector.push(chunk) {
                    PhraseEvent::Pending => {}
                    PhraseEvent::Complete(phrase) => return Ok(phrase),
                    PhraseEvent::TimedOut => return Err(RecognitionError::WaitTimeout.into()),
                }

                if !announced && detector.state() != ListenerState::Calibrating {
                    announced = true;
                    tracing::info!(
                        ambient_threshold = detector.threshold().level(),
                        "speak clearly..."
                    );
                }
            }
            pending.drain(..consumed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_scale() {
        assert!(chunk_energy(&[0.0; 64]) < f32::EPSILON);
        assert!(chunk_energy(&[]) < f32::EPSILON);

        let loud = chunk_energy(&[0.5; 64]);
        assert!((loud - 16384.0).abs() < 1.0);
    }

    #[test]
    fn test_calibration_tracks_ambient() {
        let mut threshold = EnergyThreshold::default();
        for _ in 0..200 {
            threshold.calibrate(1000.0, 0.064);
        }
        assert!((threshold.level() - 1500.0).abs() < 1.0);
    }

    #[test]
    fn test_static_threshold_does_not_track() {
        let mut threshold = EnergyThreshold::new(300.0, false);
        threshold.track(5000.0, 1.0);
        assert!((threshold.level() - 300.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_chunk_counts() {
        assert_eq!(chunks_for(PAUSE_SECS, 16000), 13);
        assert_eq!(chunks_for(MIN_PHRASE_SECS, 16000), 5);
        assert_eq!(chunks_for(LEAD_IN_SECS, 16000), 8);
    }
}
