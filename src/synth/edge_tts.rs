use async_trait::async_trait;
use std::process::Command;
use tracing::{debug, info};

use crate::config::{MediaConfig, SynthesisConfig};
use crate::error::{DubError, Result};
use crate::media::{MediaCommand, MediaCommandBuilder};
use super::{SpeechBackend, SynthesisRequest};

/// Speech backend driving the `edge-tts` command line tool. The tool writes
/// mp3, which is decoded to mono WAV through ffmpeg.
pub struct EdgeTtsBackend {
    binary_path: String,
    sample_rate: u32,
    media: MediaCommandBuilder,
}

impl EdgeTtsBackend {
    pub fn new(synthesis: &SynthesisConfig, media: &MediaConfig) -> Self {
        Self {
            binary_path: synthesis.binary_path.clone(),
            sample_rate: synthesis.sample_rate,
            media: MediaCommandBuilder::new(&media.binary_path, &media.probe_path),
        }
    }

    pub fn check_availability(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("--help")
            .output()
            .map_err(|e| DubError::BackendInvocation(format!("{} not found: {}", self.binary_path, e)))?;

        if output.status.success() {
            info!("edge-tts is available");
            Ok(())
        } else {
            Err(DubError::BackendInvocation(format!("{} --help failed", self.binary_path)))
        }
    }

    /// Arguments use `--flag=value` so negative deltas are not read as options
    pub fn command(&self, request: &SynthesisRequest, media_path: &std::path::Path) -> MediaCommand {
        MediaCommand::new(&self.binary_path, format!("Speech synthesis ({})", request.voice_id))
            .arg(format!("--voice={}", request.voice_id))
            .arg(format!("--text={}", request.text))
            .arg(format!("--pitch={}", request.pitch_arg()))
            .arg(format!("--rate={}", request.rate_arg()))
            .arg(format!("--volume={}", request.volume_arg()))
            .arg(format!("--write-media={}", media_path.display()))
    }
}

#[async_trait]
impl SpeechBackend for EdgeTtsBackend {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let scratch = tempfile::tempdir()?;
        let media_path = scratch.path().join("speech.mp3");
        let wav_path = scratch.path().join("speech.wav");

        debug!(
            "edge-tts: voice={} pitch={} rate={} volume={}",
            request.voice_id,
            request.pitch_arg(),
            request.rate_arg(),
            request.volume_arg()
        );
        self.command(request, &media_path)
            .execute()
            .await
            .map_err(|e| DubError::SynthesisFailure(e.to_string()))?;

        self.media
            .transcode_to_wav(&media_path, &wav_path, self.sample_rate)
            .execute()
            .await?;

        Ok(tokio::fs::read(&wav_path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::synth::VoiceControls;
    use std::path::Path;

    #[test]
    fn test_command_line() {
        let config = Config::default();
        let backend = EdgeTtsBackend::new(&config.synthesis, &config.media);
        let request = SynthesisRequest::new(
            "-- Salam",
            "az-AZ-BanuNeural",
            VoiceControls { pitch_delta: -5, rate_delta: 10, volume_delta: 0 },
        );

        let cmd = backend.command(&request, Path::new("/tmp/x.mp3"));
        assert_eq!(cmd.binary_path, "edge-tts");
        assert_eq!(
            cmd.args,
            vec![
                "--voice=az-AZ-BanuNeural",
                "--text=-- Salam",
                "--pitch=-5Hz",
                "--rate=+10%",
                "--volume=+0%",
                "--write-media=/tmp/x.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_fails_synthesis() {
        let mut config = Config::default();
        config.synthesis.binary_path = "/nonexistent/edge-tts".to_string();
        let backend = EdgeTtsBackend::new(&config.synthesis, &config.media);
        let request = SynthesisRequest::new("Salam", "az-AZ-BabekNeural", VoiceControls::neutral());

        assert!(matches!(
            backend.synthesize(&request).await,
            Err(DubError::SynthesisFailure(_))
        ));
        assert!(backend.check_availability().is_err());
    }
}
