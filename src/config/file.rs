//! TOML configuration file loading
//!
//! Supports `~/.config/voicebot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoicebotConfigFile {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Relay service configuration
    #[serde(default)]
    pub relay: RelayFileConfig,

    /// Voice client configuration
    #[serde(default)]
    pub client: ClientFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub groq: Option<String>,
    pub stt: Option<String>,
    pub tts: Option<String>,
}

/// Relay service configuration
#[derive(Debug, Default, Deserialize)]
pub struct RelayFileConfig {
    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// Address to bind
    pub host: Option<String>,

    /// Port to listen on
    pub port: Option<u16>,

    /// Directory with a browser front end to serve
    pub static_dir: Option<PathBuf>,
}

/// Voice client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Full URL of the relay's chat route
    pub relay_url: Option<String>,

    /// Directory for temporary speech files
    pub audio_dir: Option<PathBuf>,

    #[serde(default)]
    pub stt: SttFileConfig,

    #[serde(default)]
    pub tts: TtsFileConfig,

    #[serde(default)]
    pub listen: ListenFileConfig,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// "google", "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub voice: Option<String>,
    pub lang: Option<String>,
    pub model: Option<String>,
    pub speed: Option<f32>,
}

/// Microphone listening windows, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct ListenFileConfig {
    pub calibrate_secs: Option<f32>,
    pub start_timeout_secs: Option<f32>,
    pub phrase_limit_secs: Option<f32>,
}

/// Default config file path: `~/.config/voicebot/config.toml`
#[must_use]
pub fn config_file_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".config/voicebot/config.toml"),
        |d| d.config_dir().join("voicebot").join("config.toml"),
    )
}

/// Load the config file from its default location
///
/// A missing or unparsable file yields the empty overlay; parse errors are
/// logged so a typo does not silently change behaviour.
#[must_use]
pub fn load_config_file() -> VoicebotConfigFile {
    load_config_file_from(&config_file_path())
}

/// Load a config file from an explicit path
#[must_use]
pub fn load_config_file_from(path: &Path) -> VoicebotConfigFile {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return VoicebotConfigFile::default();
    };

    match toml::from_str(&contents) {
        Ok(fc) => {
            tracing::debug!(path = %path.display(), "loaded config file");
            fc
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config file, ignoring");
            VoicebotConfigFile::default()
        }
    }
}
