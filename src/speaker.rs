use tracing::debug;

use crate::audio::{rms, AudioClip};
use crate::config::ProfileConfig;
use crate::profile::{Gender, RawSpeakerProfile, VoiceType};

/// Estimates speaker attributes for one chunk of speech
pub trait SpeakerDetector: Send + Sync {
    fn detect(&self, clip: &AudioClip) -> RawSpeakerProfile;
}

const MIN_PITCH_HZ: f64 = 50.0;
const MAX_PITCH_HZ: f64 = 400.0;
const FRAME_SECS: f64 = 0.04;
const HOP_SECS: f64 = 0.02;
/// Upper bound on analysed frames per clip, spread evenly over the clip
const MAX_FRAMES: usize = 64;
/// Frames quieter than this fraction of the loudest frame are skipped
const RELATIVE_ENERGY_GATE: f64 = 0.1;
/// Minimum normalized autocorrelation for a frame to count as voiced
const VOICING_THRESHOLD: f64 = 0.5;

/// Pitch by normalized frame autocorrelation, energy by mean frame RMS and
/// gender by comparing the pitch against a split frequency
pub struct AcousticSpeakerDetector {
    gender_pitch_split: f64,
}

impl AcousticSpeakerDetector {
    pub fn new(gender_pitch_split: f64) -> Self {
        Self { gender_pitch_split }
    }

    pub fn from_config(config: &ProfileConfig) -> Self {
        Self::new(config.gender_pitch_split)
    }

    /// Mean fundamental frequency over voiced frames, `None` when nothing is voiced
    pub fn estimate_pitch(clip: &AudioClip) -> Option<f64> {
        let sample_rate = clip.sample_rate() as f64;
        let frames = frames(clip);
        let loudest = frames.iter().map(|f| rms(f)).fold(0.0, f64::max);
        if loudest <= 0.0 {
            return None;
        }

        let min_lag = (sample_rate / MAX_PITCH_HZ).floor().max(1.0) as usize;
        let max_lag = (sample_rate / MIN_PITCH_HZ).ceil() as usize;

        let pitches: Vec<f64> = frames
            .iter()
            .filter(|frame| rms(frame) >= loudest * RELATIVE_ENERGY_GATE)
            .filter_map(|frame| frame_lag(frame, min_lag, max_lag))
            .map(|lag| sample_rate / lag as f64)
            .collect();

        if pitches.is_empty() {
            None
        } else {
            Some(pitches.iter().sum::<f64>() / pitches.len() as f64)
        }
    }

    pub fn estimate_energy(clip: &AudioClip) -> f64 {
        let frames = frames(clip);
        if frames.is_empty() {
            return clip.rms();
        }
        frames.iter().map(|f| rms(f)).sum::<f64>() / frames.len() as f64
    }
}

impl SpeakerDetector for AcousticSpeakerDetector {
    fn detect(&self, clip: &AudioClip) -> RawSpeakerProfile {
        let energy = Self::estimate_energy(clip);
        let Some(pitch) = Self::estimate_pitch(clip) else {
            debug!("No voiced frames in {:.2}s clip", clip.duration_secs());
            return RawSpeakerProfile {
                gender: Some(Gender::Unknown),
                gender_confidence: Some(0.0),
                pitch: Some(0.0),
                energy: Some(energy),
                speech_rate: None,
                voice_type: None,
            };
        };

        let gender = if pitch > self.gender_pitch_split {
            Gender::Female
        } else {
            Gender::Male
        };
        // Further from the split means more certain, saturating at 1.0
        let distance = (pitch - self.gender_pitch_split).abs() / self.gender_pitch_split;
        let confidence = (0.5 + distance).min(1.0);

        debug!(
            "Detected {} speaker, pitch {:.1} Hz, energy {:.4}, confidence {:.2}",
            gender, pitch, energy, confidence
        );

        RawSpeakerProfile {
            gender: Some(gender),
            gender_confidence: Some(confidence),
            pitch: Some(pitch),
            energy: Some(energy),
            speech_rate: None,
            voice_type: VoiceType::classify(gender, pitch),
        }
    }
}

fn frames(clip: &AudioClip) -> Vec<&[f32]> {
    let sample_rate = clip.sample_rate() as f64;
    let frame_len = (sample_rate * FRAME_SECS) as usize;
    let hop = ((sample_rate * HOP_SECS) as usize).max(1);
    let samples = clip.samples();
    if frame_len == 0 || samples.len() < frame_len {
        return Vec::new();
    }

    let count = (samples.len() - frame_len) / hop + 1;
    let step = count.div_ceil(MAX_FRAMES).max(1);
    (0..count)
        .step_by(step)
        .map(|i| &samples[i * hop..i * hop + frame_len])
        .collect()
}

/// Period in samples of the first strong autocorrelation peak
fn frame_lag(frame: &[f32], min_lag: usize, max_lag: usize) -> Option<usize> {
    let max_lag = max_lag.min(frame.len() / 2);
    if min_lag + 2 > max_lag {
        return None;
    }

    let correlations: Vec<f64> = (min_lag..=max_lag)
        .map(|lag| normalized_autocorrelation(frame, lag))
        .collect();
    let best = correlations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if best < VOICING_THRESHOLD {
        return None;
    }

    // Taking the first peak close to the maximum avoids locking onto a
    // multiple of the true period
    (1..correlations.len() - 1)
        .find(|&i| {
            correlations[i] >= best * 0.9
                && correlations[i] >= correlations[i - 1]
                && correlations[i] >= correlations[i + 1]
        })
        .map(|i| min_lag + i)
}

fn normalized_autocorrelation(frame: &[f32], lag: usize) -> f64 {
    let (mut cross, mut energy_a, mut energy_b) = (0.0f64, 0.0f64, 0.0f64);
    for (a, b) in frame.iter().zip(&frame[lag..]) {
        let (a, b) = (*a as f64, *b as f64);
        cross += a * b;
        energy_a += a * a;
        energy_b += b * b;
    }
    let denom = (energy_a * energy_b).sqrt();
    if denom <= 0.0 { 0.0 } else { cross / denom }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone;

    fn detector() -> AcousticSpeakerDetector {
        AcousticSpeakerDetector::new(165.0)
    }

    #[test]
    fn test_low_voice_is_male() {
        let profile = detector().detect(&tone(1500, 16_000, 110.0, 0.5));
        let pitch = profile.pitch.unwrap();
        assert!((pitch - 110.0).abs() < 3.0, "pitch {}", pitch);
        assert_eq!(profile.gender, Some(Gender::Male));
        assert_eq!(profile.voice_type, Some(VoiceType::Bass));
        assert!(profile.gender_confidence.unwrap() > 0.7);
    }

    #[test]
    fn test_high_voice_is_female() {
        let profile = detector().detect(&tone(1500, 16_000, 220.0, 0.5));
        let pitch = profile.pitch.unwrap();
        assert!((pitch - 220.0).abs() < 4.0, "pitch {}", pitch);
        assert_eq!(profile.gender, Some(Gender::Female));
        assert_eq!(profile.voice_type, Some(VoiceType::MezzoSoprano));
    }

    #[test]
    fn test_energy_tracks_amplitude() {
        let quiet = AcousticSpeakerDetector::estimate_energy(&tone(1000, 16_000, 200.0, 0.1));
        let loud = AcousticSpeakerDetector::estimate_energy(&tone(1000, 16_000, 200.0, 0.5));
        assert!((loud / quiet - 5.0).abs() < 0.1);
    }

    #[test]
    fn test_silence_is_unknown() {
        let profile = detector().detect(&AudioClip::silent(1000, 16_000));
        assert_eq!(profile.gender, Some(Gender::Unknown));
        assert_eq!(profile.gender_confidence, Some(0.0));
        assert_eq!(profile.energy, Some(0.0));
    }

    #[test]
    fn test_too_short_clip_has_no_pitch() {
        assert_eq!(AcousticSpeakerDetector::estimate_pitch(&tone(10, 16_000, 200.0, 0.5)), None);
    }
}
