use std::path::Path;
use tokio::process::Command;
use tracing::debug;

use crate::config::{MediaConfig, MixMode, SubtitleStylePreset};
use crate::error::{DubError, Result};

/// One external media tool invocation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    pub fn filter_complex<S: Into<String>>(self, graph: S) -> Self {
        self.arg("-filter_complex").arg(graph)
    }

    pub fn map<S: Into<String>>(self, stream: S) -> Self {
        self.arg("-map").arg(stream)
    }

    /// Video and audio encoding settings from the media config
    pub fn encoding(self, config: &MediaConfig) -> Self {
        self.video_codec(&config.video_codec)
            .arg("-preset")
            .arg(&config.preset)
            .arg("-crf")
            .arg(config.crf.to_string())
            .audio_codec(&config.audio_codec)
            .arg("-b:a")
            .arg(&config.audio_bitrate)
    }

    /// Run to completion. A non-zero exit is a hard failure.
    pub async fn execute(&self) -> Result<()> {
        self.capture().await.map(|_| ())
    }

    /// Run to completion and return stdout
    pub async fn capture(&self) -> Result<String> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| {
                DubError::BackendInvocation(format!("Failed to execute {}: {}", self.binary_path, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DubError::BackendInvocation(format!(
                "{} failed ({}): {}",
                self.description,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// ASS style overrides applied when burning subtitles
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleStyle {
    pub font: String,
    pub font_size: u32,
    pub outline_width: u32,
    /// Numpad-style position, 2 is bottom centre
    pub alignment: u8,
    pub margin_v: u32,
    pub margin_h: u32,
}

impl SubtitleStyle {
    pub fn preset(preset: SubtitleStylePreset) -> Self {
        let (font_size, margin_v) = match preset {
            SubtitleStylePreset::Default => (24, 10),
            SubtitleStylePreset::Modern => (28, 20),
            SubtitleStylePreset::Classic => (26, 20),
        };
        Self {
            font: "Arial".to_string(),
            font_size,
            outline_width: 1,
            alignment: 2,
            margin_v,
            margin_h: 10,
        }
    }

    /// `force_style` value for the ffmpeg `subtitles` filter. White text,
    /// black outline, no shadow.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,\
             Outline={},Shadow=0,Bold=0,Italic=0,Alignment={},MarginV={},MarginL={},MarginR={}",
            self.font,
            self.font_size,
            self.outline_width,
            self.alignment,
            self.margin_v,
            self.margin_h,
            self.margin_h
        )
    }
}

/// Escape a path for use inside a filtergraph argument
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Builds the ffmpeg/ffprobe invocations the pipeline needs
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    pub fn probe_duration<P: AsRef<Path>>(&self, media_path: P) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Duration probe")
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .output(media_path)
    }

    /// Mono PCM at `sample_rate`, the transcriber's input format
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P, sample_rate: u32) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Audio extraction")
            .overwrite()
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(audio_path)
    }

    /// Decode any audio container (e.g. synthesized mp3) to mono WAV
    pub fn transcode_to_wav<P: AsRef<Path>>(&self, input: P, output: P, sample_rate: u32) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "WAV transcode")
            .overwrite()
            .arg("-loglevel")
            .arg("error")
            .input(input)
            .audio_codec("pcm_s16le")
            .audio_sample_rate(sample_rate)
            .audio_channels(1)
            .output(output)
    }

    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        style: &SubtitleStyle,
    ) -> MediaCommand {
        let filter = format!(
            "subtitles='{}':force_style='{}'",
            escape_filter_path(subtitle_path.as_ref()),
            style.force_style()
        );
        MediaCommand::new(&self.binary_path, "Subtitle burn-in")
            .overwrite()
            .input(video_path)
            .video_filter(filter)
            .copy_audio()
            .output(output_path)
    }

    /// Put `audio_path` under the video stream of `video_path`, replacing the
    /// original soundtrack or mixing it in attenuated
    pub fn mux_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        output_path: P,
        mix: MixMode,
        config: &MediaConfig,
    ) -> MediaCommand {
        let cmd = MediaCommand::new(&self.binary_path, "Dubbed audio mux")
            .overwrite()
            .input(video_path)
            .input(audio_path);

        let cmd = match mix {
            MixMode::Replace => cmd.map("0:v").map("1:a"),
            MixMode::Mix { original_volume } => cmd
                .filter_complex(format!(
                    "[0:a]volume={}[original];[1:a][original]amix=inputs=2:duration=first[final_audio]",
                    original_volume
                ))
                .map("0:v")
                .map("[final_audio]"),
        };

        cmd.encoding(config).output(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn builder() -> MediaCommandBuilder {
        MediaCommandBuilder::new("ffmpeg", "ffprobe")
    }

    #[test]
    fn test_probe_command() {
        let cmd = builder().probe_duration("in.mp4");
        assert_eq!(cmd.binary_path, "ffprobe");
        assert_eq!(cmd.args.last().unwrap(), "in.mp4");
        assert!(cmd.args.contains(&"format=duration".to_string()));
    }

    #[test]
    fn test_mux_replace_maps_dubbed_audio() {
        let config = Config::default().media;
        let cmd = builder().mux_audio("v.mp4", "a.wav", "out.mp4", MixMode::Replace, &config);
        let joined = cmd.args.join(" ");
        assert!(joined.contains("-map 0:v -map 1:a"));
        assert!(!joined.contains("amix"));
        assert!(joined.contains("-c:v libx264 -preset medium -crf 23 -c:a aac -b:a 192k"));
        assert_eq!(cmd.args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_mux_mix_attenuates_original() {
        let config = Config::default().media;
        let cmd = builder().mux_audio(
            "v.mp4",
            "a.wav",
            "out.mp4",
            MixMode::Mix { original_volume: 0.1 },
            &config,
        );
        let joined = cmd.args.join(" ");
        assert!(joined.contains("[0:a]volume=0.1[original];[1:a][original]amix=inputs=2:duration=first[final_audio]"));
        assert!(joined.contains("-map [final_audio]"));
    }

    #[test]
    fn test_style_presets() {
        let modern = SubtitleStyle::preset(SubtitleStylePreset::Modern);
        assert_eq!(modern.font_size, 28);
        assert!(modern.force_style().contains("MarginV=20"));
        assert_eq!(SubtitleStyle::preset(SubtitleStylePreset::Default).margin_v, 10);
        assert_eq!(SubtitleStyle::preset(SubtitleStylePreset::Classic).font_size, 26);
    }

    #[test]
    fn test_burn_filter_escapes_path() {
        let style = SubtitleStyle::preset(SubtitleStylePreset::Default);
        let cmd = builder().burn_subtitles("v.mp4", "C:/subs/a.srt", "o.mp4", &style);
        let filter = &cmd.args[cmd.args.iter().position(|a| a == "-vf").unwrap() + 1];
        assert!(filter.starts_with("subtitles='C\\:/subs/a.srt'"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_backend_failure() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "test");
        assert!(matches!(cmd.execute().await, Err(DubError::BackendInvocation(_))));
    }
}
