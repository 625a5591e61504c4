// Transcription stage
//
// - TranscriptionBackend: one audio file in, text (+ optional confidence and
//   word timings) out
// - whisper_cpp: whisper.cpp command line backend
// - session_transcriber: segment a whole soundtrack, transcribe and profile
//   each chunk, write the session metadata
//
// A new backend only needs to implement TranscriptionBackend and be added
// to TranscriberImplementation.

pub mod session_transcriber;
pub mod whisper_cpp;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::TranscriberConfig;
use crate::error::Result;
use crate::session::WordTimestamp;

pub use session_transcriber::{SessionOutput, SessionTranscriber};
pub use whisper_cpp::WhisperCppTranscriber;

/// Result of transcribing one chunk. Timings are relative to the chunk start.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChunkTranscription {
    pub text: String,
    pub confidence: Option<f64>,
    pub word_timestamps: Option<Vec<WordTimestamp>>,
    pub language: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<ChunkTranscription>;
}

#[derive(Debug, Clone)]
pub enum TranscriberImplementation {
    WhisperCpp,
}

pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(
        implementation: TranscriberImplementation,
        config: TranscriberConfig,
    ) -> Arc<dyn TranscriptionBackend> {
        match implementation {
            TranscriberImplementation::WhisperCpp => Arc::new(WhisperCppTranscriber::new(config)),
        }
    }

    pub fn create_default(config: TranscriberConfig) -> Arc<dyn TranscriptionBackend> {
        Self::create_transcriber(TranscriberImplementation::WhisperCpp, config)
    }
}
