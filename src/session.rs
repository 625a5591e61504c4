use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{DubError, Result};
use crate::profile::{Gender, RawSpeakerProfile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTimestamp {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// One span of the original audio with its transcript and detected speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub segment_id: usize,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "speaker", default)]
    pub speaker_profile: RawSpeakerProfile,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<WordTimestamp>>,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl Stats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std: variance.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenderDistribution {
    pub counts: BTreeMap<String, usize>,
    pub durations: BTreeMap<String, f64>,
    pub percentages: BTreeMap<String, f64>,
}

/// Aggregate view over a session's speakers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechPatterns {
    pub total_duration: f64,
    pub total_segments: usize,
    pub gender_distribution: GenderDistribution,
    pub segment_statistics: Option<Stats>,
    pub pitch: Option<Stats>,
    pub energy: Option<Stats>,
    pub speech_rate: Option<Stats>,
}

impl SpeechPatterns {
    pub fn analyze(segments: &[TranscriptSegment]) -> Self {
        let mut distribution = GenderDistribution::default();
        for gender in [Gender::Male, Gender::Female, Gender::Unknown] {
            distribution.counts.insert(gender.to_string(), 0);
            distribution.durations.insert(gender.to_string(), 0.0);
        }

        for segment in segments {
            let key = segment.speaker_profile.gender.unwrap_or_default().to_string();
            *distribution.counts.entry(key.clone()).or_default() += 1;
            *distribution.durations.entry(key).or_default() += segment.duration;
        }

        if !segments.is_empty() {
            distribution.percentages = distribution
                .counts
                .iter()
                .map(|(k, &count)| (k.clone(), count as f64 / segments.len() as f64 * 100.0))
                .collect();
        }

        let durations: Vec<f64> = segments.iter().map(|s| s.duration).collect();
        let collect = |f: fn(&RawSpeakerProfile) -> Option<f64>| -> Vec<f64> {
            segments.iter().filter_map(|s| f(&s.speaker_profile)).collect()
        };

        Self {
            total_duration: durations.iter().sum(),
            total_segments: segments.len(),
            gender_distribution: distribution,
            segment_statistics: Stats::from_values(&durations),
            pitch: Stats::from_values(&collect(|p| p.pitch)),
            energy: Stats::from_values(&collect(|p| p.energy)),
            speech_rate: Stats::from_values(&collect(|p| p.speech_rate)),
        }
    }
}

/// Everything the transcription stage learned about one source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<String>,
    #[serde(default)]
    pub total_segments: usize,
    #[serde(default)]
    pub total_duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_patterns: Option<SpeechPatterns>,
    pub segments: Vec<TranscriptSegment>,
}

impl SessionMetadata {
    pub fn new(session_id: String, input_file: Option<String>, segments: Vec<TranscriptSegment>) -> Self {
        let speech_patterns = SpeechPatterns::analyze(&segments);
        Self {
            session_id,
            processed_date: Some(Utc::now()),
            input_file,
            total_segments: segments.len(),
            total_duration: speech_patterns.total_duration,
            speech_patterns: Some(speech_patterns),
            segments,
        }
    }

    /// Session id in `YYYYmmdd_HHMMSS` form
    pub fn generate_session_id() -> String {
        Utc::now().format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let mut metadata: SessionMetadata = serde_json::from_str(content)?;
        for segment in &mut metadata.segments {
            if segment.duration <= 0.0 {
                segment.duration = (segment.end_time - segment.start_time).max(0.0);
            }
        }
        if metadata.total_segments == 0 {
            metadata.total_segments = metadata.segments.len();
        }
        Ok(metadata)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DubError::FileNotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub async fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing session metadata: {}", path.display());
        fs::write(path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const METADATA: &str = r#"{
        "session_id": "20240101_120000",
        "segments": [
            {"segment_id": 0, "start_time": 0.0, "end_time": 4.5,
             "speaker": {"gender": "male", "gender_confidence": 0.92, "pitch": 118.0, "energy": 0.04}},
            {"segment_id": 1, "start_time": 5.0, "end_time": 7.0, "text": "hi",
             "speaker": {"gender": "female", "gender_confidence": 0.4, "pitch": 230.0, "speech_rate": 1.1}}
        ]
    }"#;

    #[test]
    fn test_parse_minimal_metadata() {
        let metadata = SessionMetadata::from_json(METADATA).unwrap();
        assert_eq!(metadata.total_segments, 2);
        assert_eq!(metadata.segments[0].duration, 4.5);
        assert_eq!(metadata.segments[0].text, "");
        assert_eq!(metadata.segments[0].confidence, 1.0);
        assert_eq!(metadata.segments[1].speaker_profile.gender, Some(Gender::Female));
        assert_eq!(metadata.segments[1].speaker_profile.energy, None);
    }

    #[test]
    fn test_speech_patterns() {
        let metadata = SessionMetadata::from_json(METADATA).unwrap();
        let patterns = SpeechPatterns::analyze(&metadata.segments);
        assert_eq!(patterns.total_segments, 2);
        assert!((patterns.total_duration - 6.5).abs() < 1e-9);
        assert_eq!(patterns.gender_distribution.counts["male"], 1);
        assert_eq!(patterns.gender_distribution.counts["unknown"], 0);
        assert!((patterns.gender_distribution.percentages["female"] - 50.0).abs() < 1e-9);
        let pitch = patterns.pitch.unwrap();
        assert_eq!(pitch.min, 118.0);
        assert_eq!(pitch.max, 230.0);
        assert!(patterns.speech_rate.is_some());
    }

    #[test]
    fn test_empty_session_patterns() {
        let patterns = SpeechPatterns::analyze(&[]);
        assert_eq!(patterns.total_segments, 0);
        assert!(patterns.segment_statistics.is_none());
        assert!(patterns.gender_distribution.percentages.is_empty());
    }

    #[tokio::test]
    async fn test_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_metadata.json");

        let parsed = SessionMetadata::from_json(METADATA).unwrap();
        let metadata = SessionMetadata::new("s1".to_string(), Some("movie.mp4".to_string()), parsed.segments);
        metadata.write_to_file(&path).await.unwrap();

        let loaded = SessionMetadata::from_file(&path).await.unwrap();
        assert_eq!(loaded, metadata);
        assert!(loaded.speech_patterns.is_some());
    }

    #[test]
    fn test_session_id_format() {
        let id = SessionMetadata::generate_session_id();
        assert_eq!(id.len(), 15);
        assert_eq!(&id[8..9], "_");
    }
}
