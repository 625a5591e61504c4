//! Silence detection over an [`AudioClip`], millisecond resolution.
//!
//! Ranges are half-open `[start_ms, end_ms)` pairs.

use super::{db_to_amplitude, ms_to_samples, AudioClip};

/// Running sum of squared samples so any window's RMS costs O(1)
struct EnergyIndex {
    prefix: Vec<f64>,
    sample_rate: u32,
}

impl EnergyIndex {
    fn new(clip: &AudioClip) -> Self {
        let mut prefix = Vec::with_capacity(clip.samples().len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0f64;
        for &s in clip.samples() {
            acc += (s as f64) * (s as f64);
            prefix.push(acc);
        }
        Self {
            prefix,
            sample_rate: clip.sample_rate(),
        }
    }

    fn rms_ms(&self, start_ms: u64, end_ms: u64) -> f64 {
        let last = self.prefix.len() - 1;
        let start = ms_to_samples(start_ms, self.sample_rate).min(last);
        let end = ms_to_samples(end_ms, self.sample_rate).clamp(start, last);
        if end == start {
            return 0.0;
        }
        let energy = (self.prefix[end] - self.prefix[start]).max(0.0);
        (energy / (end - start) as f64).sqrt()
    }
}

/// Ranges at least `min_silence_len_ms` long whose RMS stays at or below `silence_thresh_db`
pub fn detect_silence(clip: &AudioClip, min_silence_len_ms: u64, silence_thresh_db: f64) -> Vec<(u64, u64)> {
    let seg_len = clip.duration_ms();
    if seg_len < min_silence_len_ms || min_silence_len_ms == 0 {
        return Vec::new();
    }

    let threshold = db_to_amplitude(silence_thresh_db);
    let index = EnergyIndex::new(clip);
    let last_slice_start = seg_len - min_silence_len_ms;

    let mut ranges = Vec::new();
    let mut current: Option<(u64, u64)> = None; // (range start, previous silent window start)

    for i in 0..=last_slice_start {
        if index.rms_ms(i, i + min_silence_len_ms) > threshold {
            continue;
        }
        current = match current {
            None => Some((i, i)),
            Some((range_start, prev)) => {
                let continuous = i == prev + 1;
                let has_gap = i > prev + min_silence_len_ms;
                if !continuous && has_gap {
                    ranges.push((range_start, prev + min_silence_len_ms));
                    Some((i, i))
                } else {
                    Some((range_start, i))
                }
            }
        };
    }

    if let Some((range_start, prev)) = current {
        ranges.push((range_start, prev + min_silence_len_ms));
    }
    ranges
}

/// Complement of [`detect_silence`]
pub fn detect_nonsilent(clip: &AudioClip, min_silence_len_ms: u64, silence_thresh_db: f64) -> Vec<(u64, u64)> {
    let seg_len = clip.duration_ms();
    let silent = detect_silence(clip, min_silence_len_ms, silence_thresh_db);

    if silent.is_empty() {
        return vec![(0, seg_len)];
    }
    if silent[0] == (0, seg_len) {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut prev_end = 0;
    for &(start, end) in &silent {
        ranges.push((prev_end, start));
        prev_end = end;
    }
    if prev_end != seg_len {
        ranges.push((prev_end, seg_len));
    }
    if ranges.first() == Some(&(0, 0)) {
        ranges.remove(0);
    }
    ranges
}

/// Non-silent ranges padded by `keep_silence_ms` on both sides. Where two pads
/// would overlap the boundary is placed at their midpoint.
pub fn split_on_silence(
    clip: &AudioClip,
    min_silence_len_ms: u64,
    silence_thresh_db: f64,
    keep_silence_ms: u64,
) -> Vec<(u64, u64)> {
    let seg_len = clip.duration_ms() as i64;
    let keep = keep_silence_ms as i64;

    let mut ranges: Vec<(i64, i64)> = detect_nonsilent(clip, min_silence_len_ms, silence_thresh_db)
        .into_iter()
        .map(|(start, end)| (start as i64 - keep, end as i64 + keep))
        .collect();

    for i in 1..ranges.len() {
        let last_end = ranges[i - 1].1;
        let next_start = ranges[i].0;
        if next_start < last_end {
            let mid = (last_end + next_start).div_euclid(2);
            ranges[i - 1].1 = mid;
            ranges[i].0 = mid;
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| (start.max(0) as u64, end.min(seg_len).max(0) as u64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone;

    fn speech_gap_speech() -> AudioClip {
        let a = tone(2000, 16000, 220.0, 0.5);
        let gap = AudioClip::silent(2000, 16000);
        let b = tone(2000, 16000, 220.0, 0.5);
        AudioClip::concat(&[&a, &gap, &b], 16000)
    }

    #[test]
    fn test_detect_silence_finds_gap() {
        let ranges = detect_silence(&speech_gap_speech(), 500, -40.0);
        assert_eq!(ranges.len(), 1);
        let (start, end) = ranges[0];
        assert!((1990..=2010).contains(&start), "start {}", start);
        assert!((3990..=4010).contains(&end), "end {}", end);
    }

    #[test]
    fn test_short_clip_has_no_silence() {
        let clip = AudioClip::silent(300, 16000);
        assert!(detect_silence(&clip, 500, -40.0).is_empty());
        assert_eq!(detect_nonsilent(&clip, 500, -40.0), vec![(0, 300)]);
    }

    #[test]
    fn test_all_silent_has_no_nonsilent_range() {
        let clip = AudioClip::silent(3000, 16000);
        assert_eq!(detect_silence(&clip, 500, -40.0), vec![(0, 3000)]);
        assert!(detect_nonsilent(&clip, 500, -40.0).is_empty());
    }

    #[test]
    fn test_loud_clip_is_one_range() {
        let clip = tone(3000, 16000, 180.0, 0.5);
        assert_eq!(detect_nonsilent(&clip, 500, -40.0), vec![(0, 3000)]);
    }

    #[test]
    fn test_split_keeps_padding() {
        let ranges = split_on_silence(&speech_gap_speech(), 500, -40.0, 300);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].0, 0);
        assert!((2290..=2310).contains(&ranges[0].1));
        assert!((3690..=3710).contains(&ranges[1].0));
        assert_eq!(ranges[1].1, 6000);
    }

    #[test]
    fn test_split_pads_meet_at_midpoint() {
        let ranges = split_on_silence(&speech_gap_speech(), 500, -40.0, 1500);
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges[0].1, ranges[1].0);
        assert!((2990..=3010).contains(&ranges[0].1));
    }
}
