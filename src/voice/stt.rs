//! Speech-to-text (STT) processing

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use super::capture::{SAMPLE_RATE, samples_to_wav};
use crate::client::Transcribe;
use crate::config::SttConfig;
use crate::{Error, Result};

/// Why a listen/transcribe step produced no usable input
///
/// None of these are fatal; the voice loop logs them and listens again.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecognitionError {
    /// Nobody spoke before the start timeout
    #[error("no speech detected")]
    WaitTimeout,

    /// Audio was captured but nothing intelligible came back
    #[error("speech was not understood")]
    Unintelligible,

    /// The recognition service could not be reached or rejected the request
    #[error("recognition request failed: {0}")]
    Request(String),
}

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SttProvider {
    /// Any OpenAI-compatible `/audio/transcriptions` endpoint (Groq by default)
    Whisper,
    Deepgram,
}

impl SttProvider {
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Whisper => "whisper-large-v3",
            Self::Deepgram => "nova-2",
        }
    }
}

impl fmt::Display for SttProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Whisper => "whisper",
            Self::Deepgram => "deepgram",
        })
    }
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whisper" | "groq" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a transcriber from client configuration
    #[must_use]
    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::from(config.api_key.expose_secret().to_owned()),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            provider: config.provider,
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns [`RecognitionError::Request`] if the service fails and
    /// [`RecognitionError::Unintelligible`] if it hears nothing
    pub async fn transcribe_wav(&self, audio: &[u8]) -> Result<String> {
        let transcript = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await,
        }
        .map_err(|e| RecognitionError::Request(e.to_string()))?;

        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(RecognitionError::Unintelligible.into());
        }

        tracing::info!(transcript, "transcription complete");
        Ok(transcript.to_string())
    }

    /// Transcribe using an OpenAI-compatible endpoint
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("response_format", "json");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;

        Ok(result
            .results
            .channels
            .into_iter()
            .next()
            .and_then(|c| c.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .unwrap_or_default())
    }
}

#[async_trait(?Send)]
impl Transcribe for SpeechToText {
    async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        if samples.is_empty() {
            return Err(RecognitionError::Unintelligible.into());
        }

        let wav = samples_to_wav(samples, SAMPLE_RATE)?;
        self.transcribe_wav(&wav).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        assert_eq!("whisper".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!(" Groq ".parse::<SttProvider>().unwrap(), SttProvider::Whisper);
        assert_eq!("DEEPGRAM".parse::<SttProvider>().unwrap(), SttProvider::Deepgram);
        assert!("google".parse::<SttProvider>().is_err());
        assert_eq!(SttProvider::Deepgram.to_string(), "deepgram");
    }

    #[test]
    fn test_deepgram_response_shape() {
        let json = r#"{"results":{"channels":[{"alternatives":[{"transcript":"hello there"}]}]}}"#;
        let parsed: DeepgramResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.results.channels[0].alternatives[0].transcript, "hello there");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_request_error() {
        let stt = SpeechToText::from_config(&SttConfig {
            provider: SttProvider::Whisper,
            model: "whisper-large-v3".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: SecretString::from("k".to_string()),
        });

        let err = stt.transcribe(&[0.1; 160]).await.unwrap_err();
        assert!(matches!(err, Error::Recognition(RecognitionError::Request(_))));
    }

    #[tokio::test]
    async fn test_empty_audio_is_unintelligible() {
        let stt = SpeechToText::from_config(&SttConfig {
            provider: SttProvider::Whisper,
            model: "whisper-large-v3".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: SecretString::from("k".to_string()),
        });

        let err = stt.transcribe(&[]).await.unwrap_err();
        assert!(matches!(err, Error::Recognition(RecognitionError::Unintelligible)));
    }
}
