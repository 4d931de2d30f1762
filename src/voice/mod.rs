//! Voice processing module
//!
//! Handles microphone capture, phrase detection, speech recognition,
//! speech synthesis and playback.

mod capture;
mod listener;
mod output;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, append_mono, samples_to_wav};
pub use listener::{
    CHUNK_SAMPLES, EnergyThreshold, ListenerState, Microphone, PhraseDetector, PhraseEvent,
    chunk_energy,
};
pub use output::{VoiceOutput, play_then_discard};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, Speaker, decode_mp3, resample};
pub use stt::{RecognitionError, SpeechToText, SttProvider};
pub use tts::{TextToSpeech, TtsProvider, write_speech_file};
