//! Speaking replies: synthesize to a temporary file, play it, delete it

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;

use super::playback::Speaker;
use super::tts::TextToSpeech;
use crate::Result;
use crate::client::Speak;

/// Play a speech file, then delete it whether or not playback succeeded
///
/// Deletion failures are ignored.
///
/// # Errors
///
/// Returns the playback error, after the file is gone
pub fn play_then_discard<F>(file: NamedTempFile, play: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let result = play(file.path());

    if let Err(e) = file.close() {
        tracing::trace!(error = %e, "speech file cleanup failed");
    }

    result
}

/// Synthesizes replies and plays them through the default speaker
pub struct VoiceOutput {
    tts: TextToSpeech,
    speaker: Speaker,
    audio_dir: PathBuf,
}

impl VoiceOutput {
    #[must_use]
    pub const fn new(tts: TextToSpeech, audio_dir: PathBuf) -> Self {
        Self {
            tts,
            speaker: Speaker::new(),
            audio_dir,
        }
    }
}

#[async_trait(?Send)]
impl Speak for VoiceOutput {
    async fn speak(&mut self, text: &str) -> Result<()> {
        let file = self.tts.synthesize_to_file(text, &self.audio_dir).await?;
        tracing::debug!(path = %file.path().display(), "playing reply");

        let speaker = &mut self.speaker;
        tokio::task::block_in_place(|| play_then_discard(file, |path| speaker.play_file(path)))
    }
}
