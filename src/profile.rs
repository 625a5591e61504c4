use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::ProfileConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Gender {
    pub fn voice_key(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.voice_key())
    }
}

/// Vocal register derived from gender and mean pitch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceType {
    Bass,
    Baritone,
    Tenor,
    Contralto,
    MezzoSoprano,
    Soprano,
}

impl VoiceType {
    pub fn classify(gender: Gender, pitch: f64) -> Option<Self> {
        match gender {
            Gender::Male if pitch < 120.0 => Some(Self::Bass),
            Gender::Male if pitch < 150.0 => Some(Self::Baritone),
            Gender::Male => Some(Self::Tenor),
            Gender::Female if pitch < 200.0 => Some(Self::Contralto),
            Gender::Female if pitch < 250.0 => Some(Self::MezzoSoprano),
            Gender::Female => Some(Self::Soprano),
            Gender::Unknown => None,
        }
    }
}

/// Speaker attributes as reported by detection; any field may be missing or garbage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSpeakerProfile {
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub gender_confidence: Option<f64>,
    #[serde(default)]
    pub pitch: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub speech_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_type: Option<VoiceType>,
}

/// Speaker attributes guaranteed to lie inside the synthesis ranges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub gender: Gender,
    pub gender_confidence: f64,
    pub pitch: f64,
    pub energy: f64,
    pub speech_rate: f64,
}

impl SpeakerProfile {
    /// Profile used when a cue has nothing to match against
    pub fn neutral() -> Self {
        Self {
            gender: Gender::Male,
            gender_confidence: 1.0,
            pitch: 120.0,
            energy: 1.0,
            speech_rate: 1.0,
        }
    }
}

impl From<SpeakerProfile> for RawSpeakerProfile {
    fn from(profile: SpeakerProfile) -> Self {
        Self {
            gender: Some(profile.gender),
            gender_confidence: Some(profile.gender_confidence),
            pitch: Some(profile.pitch),
            energy: Some(profile.energy),
            speech_rate: Some(profile.speech_rate),
            voice_type: VoiceType::classify(profile.gender, profile.pitch),
        }
    }
}

/// Repairs raw speaker attributes into a synthesis-safe profile.
///
/// Values beyond their sane physical bounds are treated as corrupt and replaced
/// by the gender default instead of being clamped; plausible values are clamped
/// into the output range.
pub struct SpeakerProfileNormalizer {
    config: ProfileConfig,
}

impl SpeakerProfileNormalizer {
    pub fn new(config: ProfileConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&self, raw: &RawSpeakerProfile) -> SpeakerProfile {
        let cfg = &self.config;

        let mut gender = raw.gender.unwrap_or_default();
        let mut confidence = raw
            .gender_confidence
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(0.0);

        if confidence < cfg.gender_confidence_threshold || gender == Gender::Unknown {
            let pitch = raw.pitch.filter(|p| p.is_finite()).unwrap_or(0.0);
            let derived = if pitch > cfg.gender_pitch_split {
                Gender::Female
            } else {
                Gender::Male
            };
            debug!(
                "Re-deriving gender from pitch {:.1} Hz ({} @ {:.2} -> {})",
                pitch, gender, confidence, derived
            );
            gender = derived;
            confidence = cfg.fallback_gender_confidence;
        }

        let default_pitch = cfg.pitch_range_for(gender).base;
        let pitch = repair(raw.pitch, &cfg.pitch_sane, default_pitch, "pitch");
        let energy = repair(raw.energy, &cfg.energy_sane, cfg.default_energy, "energy");
        let speech_rate = repair(
            raw.speech_rate,
            &cfg.speech_rate_sane,
            cfg.default_speech_rate,
            "speech_rate",
        );

        SpeakerProfile {
            gender,
            gender_confidence: confidence,
            pitch: cfg.pitch_range.clamp(pitch),
            energy: cfg.energy_range.clamp(energy),
            speech_rate: cfg.speech_rate_range.clamp(speech_rate),
        }
    }
}

fn repair(value: Option<f64>, sane: &crate::config::ValueRange, default: f64, field: &str) -> f64 {
    match value {
        Some(v) if v.is_finite() && sane.contains(v) => v,
        Some(v) => {
            debug!("Resetting corrupt {} value {} to default {}", field, v, default);
            default
        }
        None => default,
    }
}
