use tracing::{info, warn};

use crate::audio::{silence, AudioClip};
use crate::config::SegmenterConfig;

/// A contiguous piece of the source stream and where it starts on the timeline
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub index: usize,
    pub start_ms: u64,
    pub clip: AudioClip,
}

impl AudioChunk {
    pub fn duration_ms(&self) -> u64 {
        self.clip.duration_ms()
    }

    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms()
    }
}

/// Splits a continuous stream into speech chunks on detected silence.
///
/// Never returns an empty list: when detection finds nothing the stream is cut
/// into fixed windows, and when every chunk is too short to keep the whole
/// stream comes back as one chunk.
pub struct SilenceAwareSegmenter {
    config: SegmenterConfig,
}

impl SilenceAwareSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn split(&self, audio: &AudioClip) -> Vec<AudioChunk> {
        let cfg = &self.config;
        info!("Splitting audio of length {}ms", audio.duration_ms());

        let normalized = audio.normalize_peak(cfg.normalize_headroom_db);

        let mut ranges = silence::split_on_silence(
            &normalized,
            cfg.min_silence_len_ms,
            cfg.silence_thresh_db,
            cfg.keep_silence_ms,
        );

        if ranges.is_empty() {
            warn!(
                "No speech detected between silences, splitting into fixed {}ms windows",
                cfg.fallback_window_ms
            );
            ranges = fixed_windows(normalized.duration_ms(), cfg.fallback_window_ms);
        }

        info!("Split audio into {} chunks", ranges.len());

        let kept: Vec<(u64, u64)> = ranges
            .into_iter()
            .filter(|(start, end)| end.saturating_sub(*start) >= cfg.min_chunk_ms)
            .collect();

        if kept.is_empty() {
            warn!("No chunk survived the {}ms noise filter, using the whole stream", cfg.min_chunk_ms);
            return vec![AudioChunk {
                index: 0,
                start_ms: 0,
                clip: normalized,
            }];
        }

        info!("Final chunk count: {}", kept.len());
        kept.into_iter()
            .enumerate()
            .map(|(index, (start, end))| AudioChunk {
                index,
                start_ms: start,
                clip: normalized.slice_ms(start, end),
            })
            .collect()
    }
}

fn fixed_windows(total_ms: u64, window_ms: u64) -> Vec<(u64, u64)> {
    if window_ms == 0 {
        return vec![(0, total_ms)];
    }
    (0..total_ms)
        .step_by(window_ms as usize)
        .map(|start| (start, (start + window_ms).min(total_ms)))
        .collect()
}
