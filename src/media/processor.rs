use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::config::{MediaConfig, MixMode};
use crate::error::{DubError, Result};
use super::{MediaCommandBuilder, MediaProcessorTrait, SubtitleStyle};

/// ffmpeg/ffprobe backed media processor
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
        }
    }

    fn ensure_exists(path: &Path) -> Result<()> {
        if path.exists() {
            Ok(())
        } else {
            Err(DubError::FileNotFound(path.display().to_string()))
        }
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_duration(&self, media_path: &Path) -> Result<f64> {
        Self::ensure_exists(media_path)?;

        let stdout = self.command_builder.probe_duration(media_path).capture().await?;
        let duration: f64 = stdout.trim().parse().map_err(|_| {
            DubError::BackendInvocation(format!(
                "Unexpected duration '{}' for {}",
                stdout.trim(),
                media_path.display()
            ))
        })?;

        debug!("{} lasts {:.3}s", media_path.display(), duration);
        Ok(duration)
    }

    async fn extract_audio(&self, video_path: &Path, audio_path: &Path, sample_rate: u32) -> Result<()> {
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());
        Self::ensure_exists(video_path)?;
        Self::ensure_parent(audio_path).await?;

        self.command_builder
            .extract_audio(video_path, audio_path, sample_rate)
            .execute()
            .await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn burn_subtitles(&self, video_path: &Path, subtitle_path: &Path, output_path: &Path) -> Result<()> {
        info!(
            "Burning subtitles from {} into {} -> {}",
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );
        Self::ensure_exists(video_path)?;
        Self::ensure_exists(subtitle_path)?;
        Self::ensure_parent(output_path).await?;

        let style = SubtitleStyle::preset(self.config.subtitle_style);
        self.command_builder
            .burn_subtitles(video_path, subtitle_path, output_path, &style)
            .execute()
            .await?;

        info!("Subtitle burn-in completed");
        Ok(())
    }

    async fn mux_audio(&self, video_path: &Path, audio_path: &Path, mix: MixMode, output_path: &Path) -> Result<()> {
        info!(
            "Muxing {} onto {} ({:?}) -> {}",
            audio_path.display(),
            video_path.display(),
            mix,
            output_path.display()
        );
        Self::ensure_exists(video_path)?;
        Self::ensure_exists(audio_path)?;
        Self::ensure_parent(output_path).await?;

        self.command_builder
            .mux_audio(video_path, audio_path, output_path, mix, &self.config)
            .execute()
            .await?;

        info!("Dubbed video written: {}", output_path.display());
        Ok(())
    }

    fn check_availability(&self) -> Result<()> {
        for binary in [&self.config.binary_path, &self.config.probe_path] {
            let output = Command::new(binary)
                .arg("-version")
                .output()
                .map_err(|e| DubError::BackendInvocation(format!("{} not found: {}", binary, e)))?;

            if !output.status.success() {
                return Err(DubError::BackendInvocation(format!("{} version check failed", binary)));
            }
        }
        info!("Media processor is available");
        Ok(())
    }
}
