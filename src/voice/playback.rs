//! Audio playback to speakers

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches Google and OpenAI MP3 output)
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// How often playback completion is checked
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Plays audio to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device or no 24kHz config is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supports = |channels: u16| {
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
        };

        let supported_config = supports(1)
            .or_else(|| supports(2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio output initialized"
        );

        Ok(Self { device, config })
    }

    /// Play mono samples at [`PLAYBACK_SAMPLE_RATE`], blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails
    pub fn play(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();
        let finished = Arc::new(AtomicBool::new(false));
        let finished_flag = Arc::clone(&finished);
        let mut position = 0usize;

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(position).copied().unwrap_or(0.0);
                        frame.fill(sample);
                        position = (position + 1).min(samples.len());
                    }
                    if position >= samples.len() {
                        finished_flag.store(true, Ordering::Release);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Acquire) && Instant::now() < deadline {
            std::thread::sleep(POLL_INTERVAL);
        }

        // Let the device drain its last buffer
        std::thread::sleep(POLL_INTERVAL);

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }

    /// Decode and play MP3 bytes, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub fn play_mp3(&self, mp3_data: &[u8]) -> Result<()> {
        let (samples, sample_rate) = decode_mp3(mp3_data)?;
        let samples = if sample_rate == PLAYBACK_SAMPLE_RATE {
            samples
        } else {
            resample(&samples, sample_rate, PLAYBACK_SAMPLE_RATE)?
        };
        self.play(samples)
    }
}

/// Speaker whose output device is opened on first use
#[derive(Default)]
pub struct Speaker {
    output: Option<AudioPlayback>,
}

impl Speaker {
    #[must_use]
    pub const fn new() -> Self {
        Self { output: None }
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.output.is_some()
    }

    fn output(&mut self) -> Result<&AudioPlayback> {
        if self.output.is_none() {
            self.output = Some(AudioPlayback::new()?);
        }
        self.output
            .as_ref()
            .ok_or_else(|| Error::Audio("audio output unavailable".to_string()))
    }

    /// Play an MP3 file, blocking until done
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, decoded, or played
    pub fn play_file(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read(path)?;
        self.output()?.play_mp3(&data)
    }

    /// Play raw samples at [`PLAYBACK_SAMPLE_RATE`]
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened or fails
    pub fn play_samples(&mut self, samples: Vec<f32>) -> Result<()> {
        self.output()?.play(samples)
    }
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
///
/// Concatenated MP3 streams decode as one.
///
/// # Errors
///
/// Returns error if the data is not valid MP3
#[allow(clippy::cast_sign_loss)]
pub fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = PLAYBACK_SAMPLE_RATE;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate))
}

/// Resample mono audio with rubato
///
/// The final partial chunk is zero-padded and the output trimmed to the
/// expected length.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    const CHUNK_SIZE: usize = 1024;

    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, CHUNK_SIZE, 2, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let expected = (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).ceil() as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_SIZE);

    for chunk in samples.chunks(CHUNK_SIZE) {
        let mut input: Vec<f64> = chunk.iter().map(|&s| f64::from(s)).collect();
        input.resize(CHUNK_SIZE, 0.0);

        let result = resampler
            .process(&[input], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend(result[0].iter().map(|&s| s as f32));
    }

    output.truncate(expected);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_empty_input() {
        let (samples, _) = decode_mp3(b"").unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn test_resample_length() {
        let input = vec![0.25f32; 16000];
        let output = resample(&input, 16000, 24000).unwrap();
        assert_eq!(output.len(), 24000);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 24000, 24000).unwrap(), input);
    }

    #[test]
    fn test_speaker_starts_uninitialized() {
        assert!(!Speaker::new().is_initialized());
    }
}
