//! Text-to-speech (TTS) processing

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use tempfile::NamedTempFile;

use crate::config::TtsConfig;
use crate::{Error, Result};

/// Longest text the Google translate voice accepts per request
const GOOGLE_MAX_CHARS: usize = 100;

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    /// Google Translate's public voice; no key needed
    Google,
    OpenAI,
    ElevenLabs,
}

impl TtsProvider {
    #[must_use]
    pub const fn requires_key(self) -> bool {
        !matches!(self, Self::Google)
    }

    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::Google | Self::OpenAI => "alloy",
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }

    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Google => "translate",
            Self::OpenAI => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }
}

impl fmt::Display for TtsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Google => "google",
            Self::OpenAI => "openai",
            Self::ElevenLabs => "elevenlabs",
        })
    }
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    voice: String,
    lang: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a synthesizer from client configuration
    #[must_use]
    pub fn from_config(config: &TtsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config
                .api_key
                .as_ref()
                .map(|k| SecretString::from(k.expose_secret().to_owned())),
            voice: config.voice.clone(),
            lang: config.lang.clone(),
            speed: config.speed,
            model: config.model.clone(),
            provider: config.provider,
        }
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the text is blank or synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Tts("no text to speak".to_string()));
        }

        tracing::debug!(provider = %self.provider, chars = text.len(), "synthesizing speech");

        match self.provider {
            TtsProvider::Google => self.synthesize_google(text).await,
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    /// Synthesize text into a fresh `response_*.mp3` file under `dir`
    ///
    /// The file is deleted when the returned handle is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or the file write fails
    pub async fn synthesize_to_file(&self, text: &str, dir: &Path) -> Result<NamedTempFile> {
        let audio = self.synthesize(text).await?;
        write_speech_file(&audio, dir)
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_ref()
            .map(|k| k.expose_secret())
            .ok_or_else(|| Error::Config(format!("{} TTS requires an API key", self.provider)))
    }

    /// Synthesize using the Google translate voice, one request per chunk
    async fn synthesize_google(&self, text: &str) -> Result<Vec<u8>> {
        let chunks = split_for_google(text);
        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let url = format!(
                "https://translate.google.com/translate_tts?ie=UTF-8&client=tw-ob&tl={}&total={total}&idx={idx}&textlen={}&q={}",
                urlencoding::encode(&self.lang),
                chunk.chars().count(),
                urlencoding::encode(chunk),
            );

            let response = self
                .client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0")
                .header("Referer", "https://translate.google.com/")
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::Tts(format!("Google TTS error {status} on part {idx}")));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        Ok(audio)
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", self.voice);

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key()?)
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Write MP3 bytes to a uniquely named `response_*.mp3` file under `dir`
///
/// # Errors
///
/// Returns error if the file cannot be created or written
pub fn write_speech_file(audio: &[u8], dir: &Path) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("response_")
        .suffix(".mp3")
        .tempfile_in(dir)?;
    file.write_all(audio)?;
    file.flush()?;

    tracing::trace!(path = %file.path().display(), bytes = audio.len(), "speech file written");
    Ok(file)
}

/// Split text into pieces of at most 100 characters on word boundaries
///
/// Words longer than the limit are cut at character boundaries.
fn split_for_google(text: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;

        while word.chars().count() > GOOGLE_MAX_CHARS {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(GOOGLE_MAX_CHARS)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }

        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if needed > GOOGLE_MAX_CHARS {
            chunks.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
