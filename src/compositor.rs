use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::AudioClip;
use crate::error::Result;
use crate::synth::AudioSegmentResult;

#[derive(Debug, Clone, PartialEq)]
pub struct CompositeReport {
    pub output_path: PathBuf,
    pub duration: f64,
    pub placed: usize,
    /// Segment indices whose audio could not be read
    pub skipped: Vec<usize>,
}

/// Lays synthesized segments onto one silent track of the full video length
pub struct TimelineCompositor {
    sample_rate: u32,
}

impl TimelineCompositor {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Build the combined track in memory. Segments are placed at
    /// `start_time * 1000` ms; audio running past the track end is cut.
    pub fn compose(&self, segments: &[AudioSegmentResult], total_duration: f64) -> (AudioClip, Vec<usize>) {
        let total_ms = (total_duration.max(0.0) * 1000.0).round() as u64;
        let mut track = AudioClip::silent(total_ms, self.sample_rate);
        let mut skipped = Vec::new();

        let mut ordered: Vec<&AudioSegmentResult> = segments.iter().collect();
        ordered.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

        for segment in ordered {
            let clip = match AudioClip::read_wav(&segment.file_path) {
                Ok(clip) => clip,
                Err(e) => {
                    warn!(
                        "Segment {} [{:.3}s-{:.3}s] not placed: {}",
                        segment.index, segment.start_time, segment.end_time, e
                    );
                    skipped.push(segment.index);
                    continue;
                }
            };
            let position_ms = (segment.start_time.max(0.0) * 1000.0) as u64;
            track.overlay(&clip, position_ms);
        }

        (track, skipped)
    }

    /// Compose and export the track once to `output_path`
    pub fn compose_to_file(
        &self,
        segments: &[AudioSegmentResult],
        total_duration: f64,
        output_path: &Path,
    ) -> Result<CompositeReport> {
        info!(
            "Compositing {} segments onto a {:.3}s track",
            segments.len(),
            total_duration
        );
        let (track, skipped) = self.compose(segments, total_duration);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        track.write_wav(output_path)?;

        let report = CompositeReport {
            output_path: output_path.to_path_buf(),
            duration: track.duration_secs(),
            placed: segments.len() - skipped.len(),
            skipped,
        };
        info!(
            "Combined track written to {} ({} placed, {} skipped)",
            output_path.display(),
            report.placed,
            report.skipped.len()
        );
        Ok(report)
    }
}
