// Duration-matched speech synthesis
//
// - SpeechBackend: text + voice controls in, WAV bytes out
// - DurationMatchedSynthesizer: one cue in, one padded, stretched, loudness
//   normalized WAV file out
// - retry: pluggable retry policy for backend calls
// - edge_tts: edge-tts CLI backend
// - batch: bounded worker pool over a whole subtitle file

pub mod batch;
pub mod edge_tts;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audio::AudioClip;
use crate::config::{Config, ProfileConfig, SynthesisConfig, VoiceTable};
use crate::error::{DubError, Result};
use crate::profile::SpeakerProfile;
use crate::subtitle::SubtitleCue;

pub use batch::{BatchReport, BatchSynthesizer, SegmentsInfo};
pub use edge_tts::EdgeTtsBackend;
pub use retry::{FixedRetryPolicy, RetryPolicy};

/// Relative prosody adjustments passed to the speech backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceControls {
    /// Hz relative to the voice's natural pitch
    pub pitch_delta: i32,
    /// Percent
    pub rate_delta: i32,
    /// Percent
    pub volume_delta: i32,
}

impl VoiceControls {
    pub fn neutral() -> Self {
        Self::default()
    }
}

/// One call to the speech backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub pitch_delta: i32,
    pub rate_delta: i32,
    pub volume_delta: i32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>, controls: VoiceControls) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            pitch_delta: controls.pitch_delta,
            rate_delta: controls.rate_delta,
            volume_delta: controls.volume_delta,
        }
    }

    pub fn controls(&self) -> VoiceControls {
        VoiceControls {
            pitch_delta: self.pitch_delta,
            rate_delta: self.rate_delta,
            volume_delta: self.volume_delta,
        }
    }

    /// e.g. `+12Hz`
    pub fn pitch_arg(&self) -> String {
        format!("{:+}Hz", self.pitch_delta)
    }

    /// e.g. `-20%`
    pub fn rate_arg(&self) -> String {
        format!("{:+}%", self.rate_delta)
    }

    pub fn volume_arg(&self) -> String {
        format!("{:+}%", self.volume_delta)
    }
}

/// Speech synthesis engine. Returns a WAV byte stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}

/// What to do about the gap between the produced and the target duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DurationAdjustment {
    WithinTolerance,
    Stretched { speed_factor: f64 },
    /// Stretching this far would distort the voice; the mismatch is kept
    OutOfBand { speed_factor: f64 },
}

pub fn plan_duration_adjustment(produced: f64, target: f64, config: &SynthesisConfig) -> DurationAdjustment {
    let tolerance = config.duration_tolerance_ms as f64 / 1000.0;
    if (produced - target).abs() <= tolerance {
        return DurationAdjustment::WithinTolerance;
    }
    if target <= 0.0 || !target.is_finite() {
        return DurationAdjustment::OutOfBand { speed_factor: f64::INFINITY };
    }

    let speed_factor = produced / target;
    if speed_factor >= config.min_speed_factor && speed_factor <= config.max_speed_factor {
        DurationAdjustment::Stretched { speed_factor }
    } else {
        DurationAdjustment::OutOfBand { speed_factor }
    }
}

/// A synthesized cue on disk, ready for compositing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegmentResult {
    pub index: usize,
    pub file_path: PathBuf,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub text: String,
    pub speaker_profile: SpeakerProfile,
}

/// Summary of one written clip
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutcome {
    /// Length of the written file in seconds, padding included
    pub duration: f64,
    pub adjustment: DurationAdjustment,
    /// Attempt that produced the audio, 0 when no backend call was made
    pub attempts: u32,
}

/// Synthesizes one line of speech and fits it to the cue's window
pub struct DurationMatchedSynthesizer {
    synthesis: SynthesisConfig,
    voices: VoiceTable,
    profile: ProfileConfig,
    backend: Arc<dyn SpeechBackend>,
    retry: Arc<dyn RetryPolicy>,
}

impl DurationMatchedSynthesizer {
    pub fn new(config: &Config, backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            synthesis: config.synthesis.clone(),
            voices: config.voices.clone(),
            profile: config.profile.clone(),
            backend,
            retry: Arc::new(FixedRetryPolicy::from_config(&config.synthesis.retry)),
        }
    }

    pub fn with_retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.synthesis
    }

    /// Map the profile to backend controls relative to the gender's base pitch.
    /// A source value outside its control range yields a neutral delta.
    pub fn voice_controls(&self, speaker: &SpeakerProfile) -> VoiceControls {
        let cfg = &self.synthesis;
        let base_pitch = self.profile.pitch_range_for(speaker.gender).base;

        let pitch_delta = if cfg.pitch_control_range.contains(speaker.pitch) && base_pitch > 0.0 {
            ((speaker.pitch - base_pitch) / base_pitch * 50.0) as i32
        } else {
            0
        };
        let rate_delta = if cfg.rate_control_range.contains(speaker.speech_rate) {
            ((speaker.speech_rate - 1.0) * 100.0) as i32
        } else {
            0
        };
        let volume_delta = if cfg.volume_control_range.contains(speaker.energy) {
            ((speaker.energy - 1.0) * 100.0) as i32
        } else {
            0
        };

        VoiceControls {
            pitch_delta,
            rate_delta,
            volume_delta,
        }
    }

    pub fn build_request(&self, text: &str, speaker: &SpeakerProfile) -> Result<SynthesisRequest> {
        let voice = self.voices.voice_for(speaker.gender, &self.synthesis.language)?;
        Ok(SynthesisRequest::new(text.trim(), voice, self.voice_controls(speaker)))
    }

    /// Call the backend until it yields decodable audio. The first attempt
    /// carries the full controls; later attempts use the plain gender voice.
    pub async fn synthesize_with_retry(&self, text: &str, speaker: &SpeakerProfile) -> Result<(AudioClip, u32)> {
        let full = self.build_request(text, speaker)?;
        let fallback = SynthesisRequest::new(full.text.clone(), full.voice_id.clone(), VoiceControls::neutral());
        let max_attempts = self.retry.max_attempts().max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let request = if attempt == 1 { &full } else { &fallback };
            if attempt > 1 {
                let delay = self.retry.delay_before(attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                debug!("Retrying synthesis with {} and neutral controls", request.voice_id);
            }

            match self.attempt(request).await {
                Ok(clip) => return Ok((clip, attempt)),
                Err(e) => {
                    warn!("Synthesis attempt {}/{} failed: {}", attempt, max_attempts, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(DubError::SynthesisFailure(format!(
            "giving up after {} attempts: {}",
            max_attempts, last_error
        )))
    }

    async fn attempt(&self, request: &SynthesisRequest) -> Result<AudioClip> {
        let bytes = self.backend.synthesize(request).await?;
        if (bytes.len() as u64) < self.synthesis.min_output_bytes {
            return Err(DubError::SynthesisFailure(format!(
                "backend returned only {} bytes",
                bytes.len()
            )));
        }
        let clip = AudioClip::decode_wav(&bytes)?;
        if clip.is_empty() {
            return Err(DubError::SynthesisFailure("backend returned no samples".to_string()));
        }
        Ok(clip)
    }

    /// Synthesize `text` fitted to `target_duration` seconds and write it to
    /// `output_path` as mono PCM at the configured sample rate
    pub async fn synthesize_to_file(
        &self,
        text: &str,
        speaker: &SpeakerProfile,
        target_duration: f64,
        output_path: &Path,
    ) -> Result<SynthesisOutcome> {
        let cfg = &self.synthesis;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if text.trim().is_empty() {
            debug!("Empty text, writing {} ms of silence to {}", cfg.empty_text_silence_ms, output_path.display());
            let silence = AudioClip::silent(cfg.empty_text_silence_ms, cfg.sample_rate);
            silence.write_wav(output_path)?;
            self.verify_output(output_path).await?;
            return Ok(SynthesisOutcome {
                duration: silence.duration_secs(),
                adjustment: DurationAdjustment::WithinTolerance,
                attempts: 0,
            });
        }

        let (clip, attempts) = self.synthesize_with_retry(text, speaker).await?;
        let mut clip = clip.resample(cfg.sample_rate);

        let produced = clip.duration_secs();
        let adjustment = plan_duration_adjustment(produced, target_duration, cfg);
        match adjustment {
            DurationAdjustment::WithinTolerance => {}
            DurationAdjustment::Stretched { speed_factor } => {
                debug!(
                    "Stretching {:.3}s to {:.3}s (factor {:.3})",
                    produced, target_duration, speed_factor
                );
                clip = clip.change_speed(speed_factor);
            }
            DurationAdjustment::OutOfBand { speed_factor } => {
                warn!(
                    "Synthesized {:.3}s for a {:.3}s window (factor {:.3}), leaving duration uncorrected",
                    produced, target_duration, speed_factor
                );
            }
        }

        let clip = clip
            .padded(cfg.padding_ms)
            .normalize_loudness(cfg.target_dbfs);
        clip.write_wav(output_path)?;
        self.verify_output(output_path).await?;

        Ok(SynthesisOutcome {
            duration: clip.duration_secs(),
            adjustment,
            attempts,
        })
    }

    async fn verify_output(&self, output_path: &Path) -> Result<()> {
        let size = tokio::fs::metadata(output_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size < self.synthesis.min_output_bytes {
            return Err(DubError::SynthesisFailure(format!(
                "{} is missing or too small ({} bytes)",
                output_path.display(),
                size
            )));
        }
        Ok(())
    }

    /// Voice one cue into `output_path`
    pub async fn synthesize_cue(
        &self,
        cue: &SubtitleCue,
        speaker: &SpeakerProfile,
        output_path: &Path,
    ) -> Result<AudioSegmentResult> {
        cue.validate()?;
        let outcome = self
            .synthesize_to_file(&cue.text, speaker, cue.duration, output_path)
            .await?;
        info!(
            "Cue {} [{:.3}-{:.3}] -> {} ({:.3}s)",
            cue.index,
            cue.start_time,
            cue.end_time,
            output_path.display(),
            outcome.duration
        );

        Ok(AudioSegmentResult {
            index: cue.index,
            file_path: output_path.to_path_buf(),
            start_time: cue.start_time,
            end_time: cue.end_time,
            duration: cue.duration,
            text: cue.text.clone(),
            speaker_profile: *speaker,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::tone;
    use crate::profile::Gender;
    use mockall::predicate::always;
    use std::time::Duration;

    pub(crate) fn wav_bytes(ms: u64) -> Vec<u8> {
        tone(ms, 16_000, 220.0, 0.5).encode_wav().unwrap()
    }

    fn synthesizer(backend: MockSpeechBackend) -> DurationMatchedSynthesizer {
        DurationMatchedSynthesizer::new(&Config::default(), Arc::new(backend))
    }

    fn speaker(gender: Gender, pitch: f64, energy: f64, rate: f64) -> SpeakerProfile {
        SpeakerProfile {
            gender,
            gender_confidence: 0.9,
            pitch,
            energy,
            speech_rate: rate,
        }
    }

    #[test]
    fn test_request_arguments() {
        let request = SynthesisRequest::new(
            "Salam",
            "az-AZ-BabekNeural",
            VoiceControls { pitch_delta: 12, rate_delta: -20, volume_delta: 0 },
        );
        assert_eq!(request.pitch_arg(), "+12Hz");
        assert_eq!(request.rate_arg(), "-20%");
        assert_eq!(request.volume_arg(), "+0%");
    }

    #[test]
    fn test_voice_controls_relative_to_gender_base() {
        let synth = synthesizer(MockSpeechBackend::new());

        let male = synth.voice_controls(&speaker(Gender::Male, 150.0, 0.5, 1.25));
        assert_eq!(male, VoiceControls { pitch_delta: 12, rate_delta: 25, volume_delta: -50 });

        let female = synth.voice_controls(&speaker(Gender::Female, 210.0, 1.0, 1.0));
        assert_eq!(female, VoiceControls::neutral());

        let low = synth.voice_controls(&speaker(Gender::Female, 52.5, 1.0, 1.0));
        assert_eq!(low.pitch_delta, -37);
    }

    #[test]
    fn test_out_of_range_source_gives_neutral_delta() {
        let synth = synthesizer(MockSpeechBackend::new());
        let controls = synth.voice_controls(&speaker(Gender::Male, 320.0, 2.5, 2.5));
        assert_eq!(controls, VoiceControls::neutral());
    }

    #[test]
    fn test_duration_plan() {
        let cfg = Config::default().synthesis;
        assert_eq!(plan_duration_adjustment(4.05, 4.0, &cfg), DurationAdjustment::WithinTolerance);

        match plan_duration_adjustment(4.4, 4.0, &cfg) {
            DurationAdjustment::Stretched { speed_factor } => assert!((speed_factor - 1.1).abs() < 1e-9),
            other => panic!("expected stretch, got {:?}", other),
        }
        match plan_duration_adjustment(4.4, 9.0, &cfg) {
            DurationAdjustment::OutOfBand { speed_factor } => assert!(speed_factor < 0.5),
            other => panic!("expected out of band, got {:?}", other),
        }
        assert!(matches!(
            plan_duration_adjustment(1.0, 0.0, &cfg),
            DurationAdjustment::OutOfBand { .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_text_is_one_second_of_silence() {
        let mut backend = MockSpeechBackend::new();
        backend.expect_synthesize().times(0);
        let synth = synthesizer(backend);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("segment_0001.wav");
        let outcome = synth
            .synthesize_to_file("   ", &SpeakerProfile::neutral(), 3.0, &path)
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 0);
        let written = AudioClip::read_wav(&path).unwrap();
        assert_eq!(written.duration_ms(), 1000);
        assert_eq!(written.rms(), 0.0);
    }

    #[tokio::test]
    async fn test_long_clip_is_stretched_to_window() {
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(wav_bytes(4_400)));
        let synth = synthesizer(backend);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let outcome = synth
            .synthesize_to_file("Salam dunya", &SpeakerProfile::neutral(), 4.0, &path)
            .await
            .unwrap();

        assert!(matches!(outcome.adjustment, DurationAdjustment::Stretched { .. }));
        let written = AudioClip::read_wav(&path).unwrap();
        assert_eq!(written.sample_rate(), 16_000);
        // 4.0s of speech plus 200ms padding on each side
        assert!((written.duration_secs() - 4.4).abs() < 0.01);
        assert!((written.dbfs() - -20.0).abs() < 0.5);
    }

    #[tokio::test]
    async fn test_far_off_clip_is_left_unstretched() {
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .times(1)
            .returning(|_| Ok(wav_bytes(4_400)));
        let synth = synthesizer(backend);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let outcome = synth
            .synthesize_to_file("Salam dunya", &SpeakerProfile::neutral(), 9.0, &path)
            .await
            .unwrap();

        assert!(matches!(outcome.adjustment, DurationAdjustment::OutOfBand { .. }));
        let written = AudioClip::read_wav(&path).unwrap();
        assert!((written.duration_secs() - 4.8).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_retry_drops_voice_controls() {
        let mut backend = MockSpeechBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_synthesize()
            .withf(|r: &SynthesisRequest| r.pitch_delta == 12 && r.rate_delta == 25)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(DubError::BackendInvocation("service unavailable".to_string())));
        backend
            .expect_synthesize()
            .withf(|r: &SynthesisRequest| {
                r.controls() == VoiceControls::neutral() && r.voice_id == "az-AZ-BabekNeural"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(wav_bytes(1_000)));
        let synth = synthesizer(backend);

        let (clip, attempts) = synth
            .synthesize_with_retry("Salam", &speaker(Gender::Male, 150.0, 1.0, 1.25))
            .await
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(clip.duration_ms(), 1000);
    }

    #[tokio::test]
    async fn test_tiny_output_counts_as_failure() {
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .with(always())
            .times(2)
            .returning(|_| Ok(vec![0u8; 10]));
        let synth = synthesizer(backend);

        let result = synth.synthesize_with_retry("Salam", &SpeakerProfile::neutral()).await;
        assert!(matches!(result, Err(DubError::SynthesisFailure(_))));
    }

    #[tokio::test]
    async fn test_custom_retry_policy() {
        let mut backend = MockSpeechBackend::new();
        backend
            .expect_synthesize()
            .times(3)
            .returning(|_| Err(DubError::BackendInvocation("down".to_string())));
        let synth = synthesizer(backend)
            .with_retry_policy(Arc::new(FixedRetryPolicy::new(3, Duration::from_millis(1))));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let result = synth
            .synthesize_to_file("Salam", &SpeakerProfile::neutral(), 1.0, &path)
            .await;
        assert!(matches!(result, Err(DubError::SynthesisFailure(_))));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_invalid_cue_window_is_rejected() {
        let mut backend = MockSpeechBackend::new();
        backend.expect_synthesize().times(0);
        let synth = synthesizer(backend);

        let cue = SubtitleCue::new(6, 12.0, 12.0, "x");
        let dir = tempfile::tempdir().unwrap();
        let result = synth
            .synthesize_cue(&cue, &SpeakerProfile::neutral(), &dir.path().join("a.wav"))
            .await;
        assert!(matches!(result, Err(DubError::InvalidCueWindow { index: 6, .. })));
    }
}
