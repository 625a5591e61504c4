use std::fmt;
use tracing::warn;

use crate::error::{DubError, Result};
use crate::session::TranscriptSegment;
use crate::subtitle::SubtitleCue;
use crate::synth::AudioSegmentResult;

/// Anything occupying a `[start, end)` window on the track, in seconds
pub trait TimeWindow {
    fn start_time(&self) -> f64;
    fn end_time(&self) -> f64;
}

impl TimeWindow for SubtitleCue {
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.end_time
    }
}

impl TimeWindow for TranscriptSegment {
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.end_time
    }
}

impl TimeWindow for AudioSegmentResult {
    fn start_time(&self) -> f64 {
        self.start_time
    }
    fn end_time(&self) -> f64 {
        self.end_time
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncIssue {
    ExceedsTrack { position: usize, end_time: f64, track_duration: f64 },
    Overlap { first: usize, second: usize },
}

impl fmt::Display for SyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIssue::ExceedsTrack { position, end_time, track_duration } => write!(
                f,
                "segment #{} ends at {:.3}s, past the track duration {:.3}s",
                position, end_time, track_duration
            ),
            SyncIssue::Overlap { first, second } => {
                write!(f, "segments #{} and #{} overlap", first, second)
            }
        }
    }
}

/// Guards compositing: every window must fit inside the track and no two
/// windows may overlap. Pairwise check, fine at subtitle scale.
pub struct SyncValidator;

impl SyncValidator {
    /// First problem found, positions are indices into `segments`
    pub fn find_violation<T: TimeWindow>(segments: &[T], track_duration: f64) -> Option<SyncIssue> {
        for (i, segment) in segments.iter().enumerate() {
            if segment.end_time() > track_duration {
                return Some(SyncIssue::ExceedsTrack {
                    position: i,
                    end_time: segment.end_time(),
                    track_duration,
                });
            }
            for (j, other) in segments.iter().enumerate().skip(i + 1) {
                if segment.start_time() < other.end_time() && segment.end_time() > other.start_time() {
                    return Some(SyncIssue::Overlap { first: i, second: j });
                }
            }
        }
        None
    }

    pub fn validate<T: TimeWindow>(segments: &[T], track_duration: f64) -> bool {
        match Self::find_violation(segments, track_duration) {
            Some(issue) => {
                warn!("Sync validation failed: {}", issue);
                false
            }
            None => true,
        }
    }

    /// `Err(SyncViolation)` on the first problem unless `ignore_violations`
    /// is set, in which case it is only logged
    pub fn guard<T: TimeWindow>(segments: &[T], track_duration: f64, ignore_violations: bool) -> Result<()> {
        match Self::find_violation(segments, track_duration) {
            None => Ok(()),
            Some(issue) if ignore_violations => {
                warn!("Ignoring sync violation: {}", issue);
                Ok(())
            }
            Some(issue) => Err(DubError::SyncViolation(issue.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cues(windows: &[(f64, f64)]) -> Vec<SubtitleCue> {
        windows
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| SubtitleCue::new(i + 1, s, e, ""))
            .collect()
    }

    #[test]
    fn test_disjoint_windows_pass() {
        let set = cues(&[(0.0, 1.0), (1.0, 2.5), (3.0, 4.0), (8.0, 10.0)]);
        assert!(SyncValidator::validate(&set, 10.0));
        assert!(SyncValidator::validate::<SubtitleCue>(&[], 0.0));
    }

    #[test]
    fn test_unordered_windows_pass() {
        let set = cues(&[(8.0, 9.0), (0.0, 1.0), (4.0, 5.0)]);
        assert!(SyncValidator::validate(&set, 9.0));
    }

    #[test]
    fn test_any_overlapping_pair_fails() {
        let base = [(0.0, 1.0), (2.0, 3.0), (4.0, 5.0), (6.0, 7.0)];
        for i in 0..base.len() {
            let mut windows = base.to_vec();
            let (s, e) = base[i];
            windows.push((s + 0.5, e + 0.5));
            let set = cues(&windows);
            assert!(!SyncValidator::validate(&set, 100.0), "overlap with #{}", i);
            assert!(matches!(
                SyncValidator::find_violation(&set, 100.0),
                Some(SyncIssue::Overlap { first, second: 4 }) if first == i
            ));
        }
    }

    #[test]
    fn test_overrunning_track_fails() {
        let set = cues(&[(0.0, 1.0), (9.0, 10.5)]);
        assert!(!SyncValidator::validate(&set, 10.0));
        assert_eq!(
            SyncValidator::find_violation(&set, 10.0),
            Some(SyncIssue::ExceedsTrack { position: 1, end_time: 10.5, track_duration: 10.0 })
        );
    }

    #[test]
    fn test_guard_respects_ignore_flag() {
        let set = cues(&[(0.0, 2.0), (1.5, 3.0)]);
        assert!(matches!(
            SyncValidator::guard(&set, 10.0, false),
            Err(DubError::SyncViolation(msg)) if msg.contains("#0 and #1")
        ));
        assert!(SyncValidator::guard(&set, 10.0, true).is_ok());
        assert!(SyncValidator::guard(&set[..1], 10.0, false).is_ok());
    }

    #[test]
    fn test_contained_window_overlaps() {
        let set = cues(&[(0.0, 10.0), (2.0, 3.0)]);
        assert!(!SyncValidator::validate(&set, 10.0));
    }
}
