use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{DubError, Result};
use crate::profile::Gender;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub voices: VoiceTable,
    pub profile: ProfileConfig,
    pub segmenter: SegmenterConfig,
    pub synthesis: SynthesisConfig,
    pub transcriber: TranscriberConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    /// Composite even when the cue windows overlap or overrun the video
    #[serde(default)]
    pub ignore_sync_violations: bool,
}

/// Synthesis voice identities keyed by gender, then by language code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceTable {
    pub male: BTreeMap<String, String>,
    pub female: BTreeMap<String, String>,
}

impl VoiceTable {
    /// Look up the voice for a gender and language. Unknown gender uses the male table.
    pub fn voice_for(&self, gender: Gender, language: &str) -> Result<&str> {
        let table = match gender {
            Gender::Female => &self.female,
            Gender::Male | Gender::Unknown => &self.male,
        };
        table
            .get(language)
            .map(String::as_str)
            .ok_or_else(|| {
                DubError::Config(format!(
                    "No {} voice configured for language '{}'",
                    gender.voice_key(),
                    language
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PitchRange {
    pub min: f64,
    pub max: f64,
    /// Reference pitch the synthesis voice speaks at
    pub base: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub male_pitch: PitchRange,
    pub female_pitch: PitchRange,
    /// Below this confidence, gender is re-derived from pitch
    pub gender_confidence_threshold: f64,
    /// Confidence assigned to a pitch-derived gender
    pub fallback_gender_confidence: f64,
    /// Pitch above this (Hz) is classified female
    pub gender_pitch_split: f64,
    /// Output ranges a normalized profile always satisfies
    pub pitch_range: ValueRange,
    pub energy_range: ValueRange,
    pub speech_rate_range: ValueRange,
    /// Values outside these bounds are corrupt telemetry and reset to defaults
    pub pitch_sane: ValueRange,
    pub energy_sane: ValueRange,
    pub speech_rate_sane: ValueRange,
    pub default_energy: f64,
    pub default_speech_rate: f64,
}

impl ProfileConfig {
    pub fn pitch_range_for(&self, gender: Gender) -> PitchRange {
        match gender {
            Gender::Female => self.female_pitch,
            Gender::Male | Gender::Unknown => self.male_pitch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Minimum silence length (ms) that separates two chunks
    pub min_silence_len_ms: u64,
    /// Silence threshold in dBFS
    pub silence_thresh_db: f64,
    /// Silence (ms) kept on each side of a chunk
    pub keep_silence_ms: u64,
    /// Peak headroom (dB) used when normalizing before detection
    pub normalize_headroom_db: f64,
    /// Window length (ms) used when silence detection finds nothing
    pub fallback_window_ms: u64,
    /// Chunks shorter than this (ms) are discarded as noise
    pub min_chunk_ms: u64,
    /// Segments shorter than this (ms) are not transcribed
    pub min_segment_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Path to the edge-tts binary
    pub binary_path: String,
    /// Language code used for voice selection
    pub language: String,
    pub sample_rate: u32,
    /// Silence (ms) added to both ends of every synthesized clip
    pub padding_ms: u64,
    pub target_dbfs: f64,
    /// Allowed difference between produced and target duration (ms)
    pub duration_tolerance_ms: u64,
    pub min_speed_factor: f64,
    pub max_speed_factor: f64,
    /// Source values outside these ranges produce a neutral control delta
    pub pitch_control_range: ValueRange,
    pub rate_control_range: ValueRange,
    pub volume_control_range: ValueRange,
    /// Length of the clip emitted for empty text (ms)
    pub empty_text_silence_ms: u64,
    /// Smallest acceptable output file (bytes)
    pub min_output_bytes: u64,
    /// Number of segments synthesized concurrently
    pub concurrency: usize,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    /// Path to transcriber binary (e.g., whisper-cli)
    pub binary_path: String,
    /// Path to the whisper model file
    pub model: String,
    /// Source language hint, `None` for auto-detect
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Ollama endpoint URL
    pub endpoint: String,
    /// LLM model to use for translation
    pub model: String,
    pub source_language: String,
    pub target_language: String,
    /// Attempts per cue before keeping the original text
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MixMode {
    /// Dubbed track replaces the original audio
    Replace,
    /// Dubbed track is mixed over the attenuated original
    Mix { original_volume: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleStylePreset {
    Default,
    Modern,
    Classic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary
    pub probe_path: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: u32,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub mix: MixMode,
    pub subtitle_style: SubtitleStylePreset,
    /// Cues longer than twice this are split before burn-in
    pub max_chars_per_line: usize,
    pub min_cue_duration: f64,
    pub max_cue_duration: f64,
}

impl Default for Config {
    fn default() -> Self {
        let voices = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(lang, voice)| (lang.to_string(), voice.to_string()))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            voices: VoiceTable {
                male: voices(&[
                    ("az", "az-AZ-BabekNeural"),
                    ("en", "en-US-GuyNeural"),
                    ("tr", "tr-TR-AhmetNeural"),
                ]),
                female: voices(&[
                    ("az", "az-AZ-BanuNeural"),
                    ("en", "en-US-JennyNeural"),
                    ("tr", "tr-TR-EmelNeural"),
                ]),
            },
            profile: ProfileConfig {
                male_pitch: PitchRange { min: 50.0, max: 180.0, base: 120.0 },
                female_pitch: PitchRange { min: 150.0, max: 300.0, base: 210.0 },
                gender_confidence_threshold: 0.7,
                fallback_gender_confidence: 0.8,
                gender_pitch_split: 165.0,
                pitch_range: ValueRange::new(50.0, 300.0),
                energy_range: ValueRange::new(0.5, 2.0),
                speech_rate_range: ValueRange::new(0.8, 1.5),
                pitch_sane: ValueRange::new(f64::MIN_POSITIVE, 300.0),
                energy_sane: ValueRange::new(0.01, 10.0),
                speech_rate_sane: ValueRange::new(f64::MIN_POSITIVE, 100.0),
                default_energy: 1.0,
                default_speech_rate: 1.0,
            },
            segmenter: SegmenterConfig {
                min_silence_len_ms: 500,
                silence_thresh_db: -40.0,
                keep_silence_ms: 300,
                normalize_headroom_db: 0.1,
                fallback_window_ms: 30_000,
                min_chunk_ms: 1_000,
                min_segment_ms: 500,
            },
            synthesis: SynthesisConfig {
                binary_path: "edge-tts".to_string(),
                language: "az".to_string(),
                sample_rate: 16_000,
                padding_ms: 200,
                target_dbfs: -20.0,
                duration_tolerance_ms: 100,
                min_speed_factor: 0.5,
                max_speed_factor: 2.0,
                pitch_control_range: ValueRange::new(50.0, 300.0),
                rate_control_range: ValueRange::new(0.5, 2.0),
                volume_control_range: ValueRange::new(0.1, 2.0),
                empty_text_silence_ms: 1_000,
                min_output_bytes: 100,
                concurrency: 1,
                retry: RetryConfig {
                    max_attempts: 2,
                    backoff_ms: 0,
                },
            },
            transcriber: TranscriberConfig {
                binary_path: "whisper-cli".to_string(),
                model: ".dubsync/models/ggml-base.bin".to_string(),
                language: None,
            },
            translate: TranslateConfig {
                endpoint: "http://localhost:11434".to_string(),
                model: "llama3.2:3b".to_string(),
                source_language: "en".to_string(),
                target_language: "az".to_string(),
                max_retries: 3,
                retry_delay_ms: 1_000,
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                probe_path: "ffprobe".to_string(),
                video_codec: "libx264".to_string(),
                preset: "medium".to_string(),
                crf: 23,
                audio_codec: "aac".to_string(),
                audio_bitrate: "192k".to_string(),
                mix: MixMode::Mix { original_volume: 0.1 },
                subtitle_style: SubtitleStylePreset::Modern,
                max_chars_per_line: 42,
                min_cue_duration: 0.833,
                max_cue_duration: 7.0,
            },
            ignore_sync_violations: false,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DubError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| DubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| DubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
