//! Configuration management for the relay and the voice client
//!
//! Every value resolves as env > TOML file > default. Both loaders take the
//! environment as a lookup function so tests never touch process state.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::voice::{SttProvider, TtsProvider};
use crate::{Error, Result};

pub use file::VoicebotConfigFile;

/// Environment variable holding the model-provider API key
pub const API_KEY_VAR: &str = "GROQ_API_KEY";

/// Default chat-completion model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Default OpenAI-compatible base URL for chat and transcription
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default relay chat route used by the voice client
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:8000/chat";

/// Environment lookup used by the loaders
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Relay service configuration
#[derive(Debug)]
pub struct RelayConfig {
    /// Model-provider API key (required)
    pub api_key: SecretString,

    /// Chat-completion model identifier
    pub model: String,

    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Optional directory with a browser front end
    pub static_dir: Option<PathBuf>,
}

/// Voice client configuration
#[derive(Debug)]
pub struct ClientConfig {
    /// Full URL of the relay's chat route
    pub relay_url: Url,

    /// Directory for temporary speech files
    pub audio_dir: PathBuf,

    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub listen: ListenConfig,
}

/// Speech-to-text configuration
#[derive(Debug)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub model: String,
    pub base_url: String,
    pub api_key: SecretString,
}

/// Text-to-speech configuration
#[derive(Debug)]
pub struct TtsConfig {
    pub provider: TtsProvider,

    /// Voice identifier (OpenAI voice name or ElevenLabs voice ID)
    pub voice: String,

    /// Language code for the Google voice
    pub lang: String,

    pub model: String,

    /// Speed multiplier (OpenAI only)
    pub speed: f32,

    /// Not needed for the Google voice
    pub api_key: Option<SecretString>,
}

/// Microphone listening windows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListenConfig {
    /// Ambient audio used to calibrate the energy threshold
    pub calibration: Duration,

    /// How long to wait for speech to start
    pub start_timeout: Duration,

    /// Maximum captured phrase length
    pub phrase_limit: Duration,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            calibration: Duration::from_secs(1),
            start_timeout: Duration::from_secs(10),
            phrase_limit: Duration::from_secs(7),
        }
    }
}

/// Read a process environment variable
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Look up a variable, treating empty values as unset
fn lookup(env: EnvLookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

impl RelayConfig {
    /// Load relay configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or a value is invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(&process_env, &file::load_config_file())
    }

    /// Resolve relay configuration from explicit sources
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or a value is invalid
    pub fn from_sources(env: EnvLookup<'_>, fc: &VoicebotConfigFile) -> Result<Self> {
        let api_key = lookup(env, API_KEY_VAR)
            .or_else(|| fc.api_keys.groq.clone())
            .ok_or_else(|| {
                Error::Config(format!("{API_KEY_VAR} missing! Check your .env file."))
            })?;

        let port = match lookup(env, "VOICEBOT_PORT").or_else(|| lookup(env, "PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.relay.port.unwrap_or(8000),
        };

        Ok(Self {
            api_key: SecretString::from(api_key),
            model: lookup(env, "VOICEBOT_MODEL")
                .or_else(|| fc.relay.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup(env, "VOICEBOT_LLM_BASE_URL")
                .or_else(|| fc.relay.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            host: lookup(env, "VOICEBOT_HOST")
                .or_else(|| fc.relay.host.clone())
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            static_dir: lookup(env, "VOICEBOT_STATIC_DIR")
                .map(PathBuf::from)
                .or_else(|| fc.relay.static_dir.clone()),
        })
    }

    /// Socket address string to bind
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ClientConfig {
    /// Load client configuration from the process environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a provider name, URL, or key is missing or invalid
    pub fn load() -> Result<Self> {
        Self::from_sources(&process_env, &file::load_config_file())
    }

    /// Resolve client configuration from explicit sources
    ///
    /// # Errors
    ///
    /// Returns error if a provider name, URL, or key is missing or invalid
    pub fn from_sources(env: EnvLookup<'_>, fc: &VoicebotConfigFile) -> Result<Self> {
        let raw_url = lookup(env, "VOICEBOT_RELAY_URL")
            .or_else(|| fc.client.relay_url.clone())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let relay_url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("invalid relay URL {raw_url}: {e}")))?;

        let audio_dir = lookup(env, "VOICEBOT_AUDIO_DIR")
            .map(PathBuf::from)
            .or_else(|| fc.client.audio_dir.clone())
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            relay_url,
            audio_dir,
            stt: Self::stt_config(env, fc)?,
            tts: Self::tts_config(env, fc)?,
            listen: Self::listen_config(fc)?,
        })
    }

    fn stt_config(env: EnvLookup<'_>, fc: &VoicebotConfigFile) -> Result<SttConfig> {
        let provider: SttProvider = lookup(env, "VOICEBOT_STT_PROVIDER")
            .or_else(|| fc.client.stt.provider.clone())
            .map_or(Ok(SttProvider::Whisper), |name| name.parse())?;

        let api_key = lookup(env, "VOICEBOT_STT_API_KEY")
            .or_else(|| fc.api_keys.stt.clone())
            .or_else(|| match provider {
                SttProvider::Whisper => {
                    lookup(env, API_KEY_VAR).or_else(|| fc.api_keys.groq.clone())
                }
                SttProvider::Deepgram => None,
            })
            .ok_or_else(|| {
                Error::Config(format!(
                    "{provider} speech recognition needs VOICEBOT_STT_API_KEY or {API_KEY_VAR}"
                ))
            })?;

        Ok(SttConfig {
            provider,
            model: lookup(env, "VOICEBOT_STT_MODEL")
                .or_else(|| fc.client.stt.model.clone())
                .unwrap_or_else(|| provider.default_model().to_string()),
            base_url: lookup(env, "VOICEBOT_STT_BASE_URL")
                .or_else(|| fc.client.stt.base_url.clone())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: SecretString::from(api_key),
        })
    }

    fn tts_config(env: EnvLookup<'_>, fc: &VoicebotConfigFile) -> Result<TtsConfig> {
        let provider: TtsProvider = lookup(env, "VOICEBOT_TTS_PROVIDER")
            .or_else(|| fc.client.tts.provider.clone())
            .map_or(Ok(TtsProvider::Google), |name| name.parse())?;

        let api_key = lookup(env, "VOICEBOT_TTS_API_KEY").or_else(|| fc.api_keys.tts.clone());
        if provider.requires_key() && api_key.is_none() {
            return Err(Error::Config(format!(
                "{provider} speech synthesis needs VOICEBOT_TTS_API_KEY"
            )));
        }

        let speed = fc.client.tts.speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "TTS speed must be between 0.25 and 4.0, got {speed}"
            )));
        }

        Ok(TtsConfig {
            provider,
            voice: lookup(env, "VOICEBOT_TTS_VOICE")
                .or_else(|| fc.client.tts.voice.clone())
                .unwrap_or_else(|| provider.default_voice().to_string()),
            lang: lookup(env, "VOICEBOT_TTS_LANG")
                .or_else(|| fc.client.tts.lang.clone())
                .unwrap_or_else(|| "en".to_string()),
            model: fc
                .client
                .tts
                .model
                .clone()
                .unwrap_or_else(|| provider.default_model().to_string()),
            speed,
            api_key: api_key.map(SecretString::from),
        })
    }

    fn listen_config(fc: &VoicebotConfigFile) -> Result<ListenConfig> {
        let defaults = ListenConfig::default();
        let listen = &fc.client.listen;

        Ok(ListenConfig {
            calibration: seconds(listen.calibrate_secs, defaults.calibration)?,
            start_timeout: seconds(listen.start_timeout_secs, defaults.start_timeout)?,
            phrase_limit: seconds(listen.phrase_limit_secs, defaults.phrase_limit)?,
        })
    }
}

impl TtsConfig {
    /// Load only the speech-synthesis settings
    ///
    /// # Errors
    ///
    /// Returns error if the provider name is unknown or its key is missing
    pub fn load() -> Result<Self> {
        ClientConfig::tts_config(&process_env, &file::load_config_file())
    }
}

/// Convert an optional seconds value into a duration
fn seconds(value: Option<f32>, default: Duration) -> Result<Duration> {
    value.map_or(Ok(default), |secs| {
        Duration::try_from_secs_f32(secs)
            .map_err(|e| Error::Config(format!("invalid duration {secs}s: {e}")))
    })
}
