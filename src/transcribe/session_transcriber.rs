use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::audio::AudioClip;
use crate::config::Config;
use crate::error::{DubError, Result};
use crate::segmenter::{AudioChunk, SilenceAwareSegmenter};
use crate::session::{SessionMetadata, TranscriptSegment, WordTimestamp};
use crate::speaker::SpeakerDetector;
use crate::subtitle::{self, SubtitleCue};
use super::TranscriptionBackend;

pub const METADATA_FILE: &str = "session_metadata.json";
pub const TRANSCRIPT_FILE: &str = "full_transcript.srt";

/// Where a transcription session landed on disk
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub metadata: SessionMetadata,
    pub metadata_path: PathBuf,
    pub transcript_path: PathBuf,
}

impl SessionOutput {
    pub fn metadata_path(session_dir: &Path) -> PathBuf {
        session_dir.join("metadata").join(METADATA_FILE)
    }

    pub fn transcript_path(session_dir: &Path) -> PathBuf {
        session_dir.join("transcripts").join(TRANSCRIPT_FILE)
    }
}

/// Turns a whole soundtrack into timed, speaker-annotated transcript segments
pub struct SessionTranscriber {
    segmenter: SilenceAwareSegmenter,
    backend: Arc<dyn TranscriptionBackend>,
    detector: Arc<dyn SpeakerDetector>,
    min_segment_ms: u64,
}

impl SessionTranscriber {
    pub fn new(
        config: &Config,
        backend: Arc<dyn TranscriptionBackend>,
        detector: Arc<dyn SpeakerDetector>,
    ) -> Self {
        Self {
            segmenter: SilenceAwareSegmenter::new(config.segmenter.clone()),
            backend,
            detector,
            min_segment_ms: config.segmenter.min_segment_ms,
        }
    }

    pub async fn transcribe_file(&self, audio_path: &Path, session_dir: &Path) -> Result<SessionOutput> {
        info!("Starting audio processing: {}", audio_path.display());
        let clip = AudioClip::read_wav(audio_path)?;
        self.transcribe_clip(&clip, Some(audio_path.display().to_string()), session_dir)
            .await
    }

    /// Segment, transcribe and profile `clip`, then write the session
    /// metadata and the full transcript under `session_dir`
    pub async fn transcribe_clip(
        &self,
        clip: &AudioClip,
        input_file: Option<String>,
        session_dir: &Path,
    ) -> Result<SessionOutput> {
        let chunks = self.segmenter.split(clip);
        let scratch = tempfile::tempdir()?;

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({eta})")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut segments = Vec::new();
        for chunk in &chunks {
            pb.inc(1);
            if chunk.duration_ms() < self.min_segment_ms {
                debug!("Skipping {}ms chunk at {}ms", chunk.duration_ms(), chunk.start_ms);
                continue;
            }
            match self.process_chunk(chunk, scratch.path()).await {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!(
                    "Chunk {} [{}ms-{}ms] not transcribed: {}",
                    chunk.index,
                    chunk.start_ms,
                    chunk.end_ms(),
                    e
                ),
            }
        }
        pb.finish_and_clear();

        if segments.is_empty() {
            return Err(DubError::NoUsableOutput(format!(
                "none of {} audio chunks could be transcribed",
                chunks.len()
            )));
        }

        let metadata = SessionMetadata::new(SessionMetadata::generate_session_id(), input_file, segments);

        let metadata_path = SessionOutput::metadata_path(session_dir);
        let transcript_path = SessionOutput::transcript_path(session_dir);
        if let Some(parent) = metadata_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        metadata.write_to_file(&metadata_path).await?;

        let cues: Vec<SubtitleCue> = metadata.segments.iter().map(SubtitleCue::from).collect();
        subtitle::write_srt(&cues, &transcript_path).await?;

        info!("Processing completed. {} segments processed.", metadata.total_segments);
        Ok(SessionOutput {
            metadata,
            metadata_path,
            transcript_path,
        })
    }

    async fn process_chunk(&self, chunk: &AudioChunk, scratch: &Path) -> Result<TranscriptSegment> {
        let chunk_path = scratch.join(format!("chunk_{:04}.wav", chunk.index));
        chunk.clip.write_wav(&chunk_path)?;

        let transcription = self.backend.transcribe(&chunk_path).await;
        let _ = fs::remove_file(&chunk_path).await;
        let transcription = transcription?;

        let speaker = self.detector.detect(&chunk.clip);
        let start_time = chunk.start_ms as f64 / 1000.0;
        let duration = chunk.clip.duration_secs();

        let words = transcription.word_timestamps.map(|words| {
            words
                .into_iter()
                .map(|w| WordTimestamp {
                    word: w.word,
                    start: w.start + start_time,
                    end: w.end + start_time,
                })
                .collect()
        });

        Ok(TranscriptSegment {
            segment_id: chunk.index,
            start_time,
            end_time: start_time + duration,
            duration,
            text: transcription.text.trim().to_string(),
            speaker_profile: speaker,
            confidence: transcription.confidence.unwrap_or(1.0),
            words,
        })
    }
}
