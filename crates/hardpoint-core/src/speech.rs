//! Speech collaborator boundary. Both directions are async and fallible,
//! and the core never retries.

/// Errors returned by a speech collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    /// Speech-to-text failed.
    #[error("transcription failed: {reason}")]
    Transcription {
        /// Human-readable reason.
        reason: String,
    },

    /// Text-to-speech failed.
    #[error("synthesis failed: {reason}")]
    Synthesis {
        /// Human-readable reason.
        reason: String,
    },
}

/// Speech-to-text and text-to-speech.
#[async_trait::async_trait]
pub trait SpeechClient: Send + Sync {
    /// Transcribe a raw audio buffer. `hints` are the words the caller
    /// listens for; recognizers should favour them.
    async fn transcribe(&self, audio: &[u8], hints: &[&str]) -> Result<String, SpeechError>;

    /// Synthesize audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError>;
}
