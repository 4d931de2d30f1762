//! Microphone input
//!
//! The default input device is opened at 16kHz. A mono config is preferred;
//! when the device only offers more channels, frames are averaged down to
//! mono as they arrive so the phrase detector always sees one channel.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// A running microphone stream
///
/// Capture starts on [`AudioCapture::open`] and stops when the value is
/// dropped. Samples accumulate until [`AudioCapture::drain`] is called.
pub struct AudioCapture {
    _stream: Stream,
    captured: Arc<Mutex<Vec<f32>>>,
    channels: u16,
}

impl AudioCapture {
    /// Open the default input device and start capturing
    ///
    /// # Errors
    ///
    /// Returns error if there is no input device, no config supports 16kHz,
    /// or the stream cannot be started
    pub fn open() -> Result<Self> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;
        let config = speech_config(&device)?;
        let channels = config.channels;

        let captured = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        append_mono(&mut buf, data, channels);
                    }
                },
                |err| tracing::error!(error = %err, "microphone stream error"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            channels,
            sample_rate = SAMPLE_RATE,
            "microphone listening"
        );

        Ok(Self {
            _stream: stream,
            captured,
            channels,
        })
    }

    /// Take the mono samples captured since the last drain
    #[must_use]
    pub fn drain(&self) -> Vec<f32> {
        self.captured
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Channel count the device delivers before downmixing
    #[must_use]
    pub const fn channels(&self) -> u16 {
        self.channels
    }
}

/// Pick the 16kHz input config with the fewest channels, f32 first
fn speech_config(device: &Device) -> Result<StreamConfig> {
    let rate = SampleRate(SAMPLE_RATE);
    let mut candidates: Vec<SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .collect();
    candidates.sort_by_key(|c| (c.sample_format() != SampleFormat::F32, c.channels()));

    candidates
        .into_iter()
        .next()
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio("no 16kHz input config found".to_string()))
}

/// Append interleaved frames to `out` as mono by averaging each frame
///
/// A trailing partial frame is dropped.
pub fn append_mono(out: &mut Vec<f32>, interleaved: &[f32], channels: u16) {
    let width = usize::from(channels.max(1));
    if width == 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    #[allow(clippy::cast_precision_loss)]
    let scale = 1.0 / width as f32;
    out.extend(
        interleaved
            .chunks_exact(width)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Encode f32 samples as 16-bit PCM mono WAV for STT uploads
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
