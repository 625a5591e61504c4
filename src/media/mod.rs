// Media backend
//
// - commands: ffmpeg/ffprobe command builders and subtitle style presets
// - processor: the ffmpeg-backed MediaProcessorTrait implementation

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::{MediaConfig, MixMode};
use crate::error::Result;

/// Operations the pipeline needs from the video/audio backend. Any non-zero
/// backend exit surfaces as `DubError::BackendInvocation`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Container duration in seconds
    async fn probe_duration(&self, media_path: &Path) -> Result<f64>;

    /// Extract mono PCM audio at `sample_rate`
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path, sample_rate: u32) -> Result<()>;

    /// Render subtitles into the picture using the configured style preset
    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_path: &Path) -> Result<()>;

    /// Combine the video stream with a new soundtrack
    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, mix: MixMode, output_path: &Path) -> Result<()>;

    fn check_availability(&self) -> Result<()>;
}

pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
