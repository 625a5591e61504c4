use tracing::debug;

use crate::profile::{SpeakerProfile, SpeakerProfileNormalizer};
use crate::session::TranscriptSegment;
use crate::subtitle::SubtitleCue;

/// The transcript segment a cue was matched to, with its normalized speaker
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMatch {
    /// `None` when no segments were available and the neutral profile was used
    pub segment_id: Option<usize>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    /// Sum of absolute start and end differences
    pub distance: f64,
    pub speaker: SpeakerProfile,
}

/// Maps a translated cue onto the closest original transcript segment.
///
/// Matching is greedy nearest-neighbour on `|Δstart| + |Δend|`: a segment may be
/// matched by several cues, and on equal distance the earliest segment in the
/// list wins.
pub struct SegmentMatcher {
    normalizer: SpeakerProfileNormalizer,
}

impl SegmentMatcher {
    pub fn new(normalizer: SpeakerProfileNormalizer) -> Self {
        Self { normalizer }
    }

    /// Closest segment to the cue's window, or `None` for an empty list
    pub fn closest<'a>(cue: &SubtitleCue, segments: &'a [TranscriptSegment]) -> Option<(&'a TranscriptSegment, f64)> {
        let mut best: Option<(&TranscriptSegment, f64)> = None;
        for segment in segments {
            let distance = (segment.start_time - cue.start_time).abs() + (segment.end_time - cue.end_time).abs();
            if !distance.is_finite() {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((segment, distance)),
            }
        }
        best
    }

    pub fn match_cue(&self, cue: &SubtitleCue, segments: &[TranscriptSegment]) -> SegmentMatch {
        match Self::closest(cue, segments) {
            Some((segment, distance)) => {
                debug!(
                    "Cue {} [{:.3}-{:.3}] -> segment {} [{:.3}-{:.3}] (distance {:.3})",
                    cue.index,
                    cue.start_time,
                    cue.end_time,
                    segment.segment_id,
                    segment.start_time,
                    segment.end_time,
                    distance
                );
                SegmentMatch {
                    segment_id: Some(segment.segment_id),
                    start_time: Some(segment.start_time),
                    end_time: Some(segment.end_time),
                    distance,
                    speaker: self.normalizer.normalize(&segment.speaker_profile),
                }
            }
            None => {
                debug!("Cue {} has no candidate segments, using neutral speaker", cue.index);
                SegmentMatch {
                    segment_id: None,
                    start_time: None,
                    end_time: None,
                    distance: 0.0,
                    speaker: SpeakerProfile::neutral(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::profile::{Gender, RawSpeakerProfile};

    fn segment(id: usize, start: f64, end: f64, gender: Gender, pitch: f64) -> TranscriptSegment {
        TranscriptSegment {
            segment_id: id,
            start_time: start,
            end_time: end,
            duration: end - start,
            text: String::new(),
            speaker_profile: RawSpeakerProfile {
                gender: Some(gender),
                gender_confidence: Some(0.9),
                pitch: Some(pitch),
                energy: Some(1.0),
                speech_rate: Some(1.0),
                voice_type: None,
            },
            confidence: 1.0,
            words: None,
        }
    }

    fn matcher() -> SegmentMatcher {
        SegmentMatcher::new(SpeakerProfileNormalizer::new(Config::default().profile))
    }

    #[test]
    fn test_picks_nearest_window() {
        let cue = SubtitleCue::new(1, 10.0, 13.0, "Salam");
        let segments = vec![
            segment(0, 0.0, 5.0, Gender::Male, 110.0),
            segment(1, 9.5, 13.2, Gender::Female, 220.0),
        ];

        let m = matcher().match_cue(&cue, &segments);
        assert_eq!(m.segment_id, Some(1));
        assert!((m.distance - 0.7).abs() < 1e-9);
        assert_eq!(m.speaker.gender, Gender::Female);
        assert_eq!(m.speaker.pitch, 220.0);
    }

    #[test]
    fn test_tie_goes_to_first_segment() {
        let cue = SubtitleCue::new(1, 5.0, 6.0, "x");
        let segments = vec![
            segment(3, 4.0, 6.0, Gender::Male, 120.0),
            segment(4, 5.0, 7.0, Gender::Female, 220.0),
        ];
        assert_eq!(matcher().match_cue(&cue, &segments).segment_id, Some(3));
    }

    #[test]
    fn test_segments_can_be_reused() {
        let segments = vec![segment(0, 0.0, 10.0, Gender::Male, 120.0)];
        let a = matcher().match_cue(&SubtitleCue::new(1, 0.0, 4.0, "a"), &segments);
        let b = matcher().match_cue(&SubtitleCue::new(2, 5.0, 10.0, "b"), &segments);
        assert_eq!(a.segment_id, Some(0));
        assert_eq!(b.segment_id, Some(0));
    }

    #[test]
    fn test_empty_segments_fall_back_to_neutral() {
        let m = matcher().match_cue(&SubtitleCue::new(1, 1.0, 2.0, "x"), &[]);
        assert_eq!(m.segment_id, None);
        assert_eq!(m.speaker, SpeakerProfile::neutral());
        assert_eq!(m.speaker.gender_confidence, 1.0);
    }
}
