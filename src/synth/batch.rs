use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{DubError, Result};
use crate::matcher::SegmentMatcher;
use crate::session::TranscriptSegment;
use crate::subtitle::SubtitleCue;
use super::{AudioSegmentResult, DurationMatchedSynthesizer};

pub const SEGMENTS_INFO_FILE: &str = "segments_info.json";

/// Listing of the synthesized segments of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentsInfo {
    pub processing_date: DateTime<Utc>,
    pub total_segments: usize,
    #[serde(default)]
    pub failed_segments: usize,
    pub segments: Vec<AudioSegmentResult>,
}

impl SegmentsInfo {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentFailure {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Ordered by `start_time`
    pub results: Vec<AudioSegmentResult>,
    pub failures: Vec<SegmentFailure>,
    pub info_path: PathBuf,
}

/// Voices a whole subtitle file. Cues are independent, so up to
/// `concurrency` of them are synthesized at once; completion order does not
/// matter because the results are re-sorted by start time.
pub struct BatchSynthesizer {
    synthesizer: Arc<DurationMatchedSynthesizer>,
    matcher: Arc<SegmentMatcher>,
    concurrency: usize,
}

impl BatchSynthesizer {
    pub fn new(synthesizer: Arc<DurationMatchedSynthesizer>, matcher: Arc<SegmentMatcher>) -> Self {
        let concurrency = synthesizer.config().concurrency;
        Self {
            synthesizer,
            matcher,
            concurrency,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn segment_path(output_dir: &Path, index: usize) -> PathBuf {
        output_dir.join(format!("segment_{:04}.wav", index))
    }

    pub async fn run(
        &self,
        cues: &[SubtitleCue],
        segments: &[TranscriptSegment],
        output_dir: &Path,
    ) -> Result<BatchReport> {
        fs::create_dir_all(output_dir).await?;
        info!(
            "Synthesizing {} cues into {} ({} at a time)",
            cues.len(),
            output_dir.display(),
            self.concurrency.max(1)
        );

        let pb = ProgressBar::new(cues.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({eta})")
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let outcomes: Vec<(&SubtitleCue, Result<AudioSegmentResult>)> = stream::iter(cues)
            .map(|cue| {
                let pb = &pb;
                async move {
                    let speaker = self.matcher.match_cue(cue, segments).speaker;
                    let path = Self::segment_path(output_dir, cue.index);
                    let result = self.synthesizer.synthesize_cue(cue, &speaker, &path).await;
                    pb.inc(1);
                    (cue, result)
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;
        pb.finish_and_clear();

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (cue, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(
                        "Segment {} [{:.3}s-{:.3}s] skipped: {}",
                        cue.index, cue.start_time, cue.end_time, e
                    );
                    failures.push(SegmentFailure {
                        index: cue.index,
                        start_time: cue.start_time,
                        end_time: cue.end_time,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if results.is_empty() {
            return Err(DubError::NoUsableOutput(format!(
                "none of {} cues could be synthesized",
                cues.len()
            )));
        }

        results.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        failures.sort_by_key(|f| f.index);

        let info = SegmentsInfo {
            processing_date: Utc::now(),
            total_segments: results.len(),
            failed_segments: failures.len(),
            segments: results.clone(),
        };
        let info_path = output_dir.join(SEGMENTS_INFO_FILE);
        info.write_to_file(&info_path).await?;

        info!(
            "Synthesized {}/{} segments ({} failed)",
            results.len(),
            cues.len(),
            failures.len()
        );

        Ok(BatchReport {
            results,
            failures,
            info_path,
        })
    }
}
