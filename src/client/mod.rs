//! Voice client: listen, transcribe, ask the relay, speak the reply
//!
//! The loop is strictly sequential and owns all of its collaborators. Each
//! step sits behind a trait so the loop can run without audio hardware.

mod relay;

use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

pub use relay::RelayClient;

/// Pause between printing a reply and speaking it
pub const SPEAK_PAUSE: Duration = Duration::from_millis(300);

/// Captures one spoken phrase
#[async_trait(?Send)]
pub trait Listen {
    /// Block until a phrase is captured
    ///
    /// Returns [`Error::Recognition`] when nobody spoke in time.
    async fn listen(&mut self) -> Result<Vec<f32>>;
}

/// Turns captured audio into text
#[async_trait(?Send)]
pub trait Transcribe {
    async fn transcribe(&self, samples: &[f32]) -> Result<String>;
}

/// Sends a message to the relay
#[async_trait(?Send)]
pub trait Relay {
    /// Always yields text to speak, falling back to an error message
    async fn ask(&self, message: &str) -> String;
}

/// Speaks text aloud
#[async_trait(?Send)]
pub trait Speak {
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Why the loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    /// The user said "exit"
    ExitCommand,
    /// The cancellation token fired
    Cancelled,
}

/// Whether a transcript is the exit command
///
/// Case-insensitive, ignoring surrounding whitespace and the trailing
/// punctuation recognizers tend to add.
///
/// Deliberately looser than an exact lowercase match: cloud recognizers
/// return "Exit." for a spoken "exit", and that must still stop the loop.
/// "exit" inside a longer sentence is relayed like any other message.
#[must_use]
pub fn is_exit_command(text: &str) -> bool {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .eq_ignore_ascii_case("exit")
}

/// The voice conversation loop
pub struct VoiceClient<L, T, R, S> {
    ears: L,
    stt: T,
    relay: R,
    mouth: S,
    pause: Duration,
}

impl<L, T, R, S> VoiceClient<L, T, R, S>
where
    L: Listen,
    T: Transcribe,
    R: Relay,
    S: Speak,
{
    #[must_use]
    pub const fn new(ears: L, stt: T, relay: R, mouth: S) -> Self {
        Self {
            ears,
            stt,
            relay,
            mouth,
            pause: SPEAK_PAUSE,
        }
    }

    /// Override the pause before speaking
    #[must_use]
    pub const fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    /// Run until the user says "exit" or `cancel` fires
    ///
    /// Recognition failures and speech failures are logged and the loop
    /// listens again.
    ///
    /// # Errors
    ///
    /// Returns error if the microphone itself fails
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<Stopped> {
        tracing::info!("voice client ready, say \"exit\" to quit");

        loop {
            if cancel.is_cancelled() {
                return Ok(Stopped::Cancelled);
            }

            let heard = tokio::select! {
                () = cancel.cancelled() => return Ok(Stopped::Cancelled),
                heard = self.hear() => heard,
            };

            let text = match heard {
                Ok(text) => text,
                Err(Error::Recognition(reason)) => {
                    tracing::info!(%reason, "nothing to send, listening again");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if text.trim().is_empty() {
                continue;
            }

            println!("You said: {text}");

            if is_exit_command(&text) {
                println!("Goodbye!");
                tracing::info!("exit command received");
                return Ok(Stopped::ExitCommand);
            }

            let reply = self.relay.ask(&text).await;
            println!("Bot: {reply}");

            tokio::time::sleep(self.pause).await;

            if let Err(e) = self.mouth.speak(&reply).await {
                tracing::warn!(error = %e, "failed to speak reply");
            }
        }
    }

    async fn hear(&mut self) -> Result<String> {
        let samples = self.ears.listen().await?;
        self.stt.transcribe(&samples).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_variants() {
        assert!(is_exit_command("exit"));
        assert!(is_exit_command("Exit"));
        assert!(is_exit_command("EXIT"));
        assert!(is_exit_command("  Exit. "));
        assert!(is_exit_command("exit!"));
    }

    #[test]
    fn test_non_exit_phrases() {
        assert!(!is_exit_command("exit now"));
        assert!(!is_exit_command("please exit"));
        assert!(!is_exit_command("exits"));
        assert!(!is_exit_command(""));
    }
}
