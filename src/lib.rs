//! Persona Voicebot - a spoken chatbot that answers in one fixed persona
//!
//! Two processes cooperate over HTTP:
//! - the relay, which wraps a hosted chat model behind `POST /chat`
//! - the voice client, which listens on the microphone, asks the relay and
//!   speaks the reply
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌─────────────────────────────┐
//! │         Voice client         │  HTTP  │            Relay            │
//! │ Mic → STT → exit? → ask ─────┼───────►│ persona prompt + message    │
//! │ Speaker ◄── TTS ◄── reply ◄──┼────────┤ → chat model → {response}   │
//! └──────────────────────────────┘        └─────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod llm;
pub mod persona;
pub mod voice;

pub use api::{ChatOutcome, RelayServer, RelayState};
pub use client::{RelayClient, Stopped, VoiceClient, is_exit_command};
pub use config::{ClientConfig, RelayConfig};
pub use error::{Error, Result};
pub use llm::{ChatModel, GroqClient};
pub use persona::{ChatMessage, PERSONA_PROMPT, persona_messages};
