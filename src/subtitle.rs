use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

use crate::error::{DubError, Result};
use crate::session::TranscriptSegment;
use crate::timecode;

/// One timed subtitle entry
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// 1-based position in the file
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub text: String,
}

impl SubtitleCue {
    pub fn new(index: usize, start_time: f64, end_time: f64, text: impl Into<String>) -> Self {
        Self {
            index,
            start_time,
            end_time,
            duration: end_time - start_time,
            text: text.into(),
        }
    }

    /// Zero or negative windows cannot be voiced
    pub fn validate(&self) -> Result<()> {
        if self.duration > 0.0 && self.duration.is_finite() {
            Ok(())
        } else {
            Err(DubError::InvalidCueWindow {
                index: self.index,
                start: self.start_time,
                end: self.end_time,
            })
        }
    }
}

impl From<&TranscriptSegment> for SubtitleCue {
    fn from(segment: &TranscriptSegment) -> Self {
        SubtitleCue::new(
            segment.segment_id + 1,
            segment.start_time,
            segment.end_time,
            segment.text.trim(),
        )
    }
}

/// Parse SRT content. Malformed blocks are logged and skipped.
pub fn parse_srt(content: &str) -> Vec<SubtitleCue> {
    let content = content.replace("\r\n", "\n");
    let mut cues = Vec::new();

    for (block_no, block) in content
        .trim()
        .split("\n\n")
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .enumerate()
    {
        match parse_block(block_no + 1, block) {
            Ok(cue) => cues.push(cue),
            Err(e) => warn!("Skipping subtitle block: {}", e),
        }
    }

    cues
}

fn parse_block(block_no: usize, block: &str) -> Result<SubtitleCue> {
    let malformed = |reason: String| DubError::MalformedSubtitleBlock {
        block: block_no,
        reason,
    };

    let mut lines = block.lines();
    let index_line = lines.next().unwrap_or_default().trim();
    let index: usize = index_line
        .parse()
        .map_err(|_| malformed(format!("invalid index '{}'", index_line)))?;

    let timing = lines
        .next()
        .ok_or_else(|| malformed("missing timing line".to_string()))?;
    let (start, end) = timing
        .split_once("-->")
        .ok_or_else(|| malformed(format!("invalid timing line '{}'", timing)))?;
    // Anything after the end timecode (positioning hints) is ignored
    let end = end.split_whitespace().next().unwrap_or_default();

    let start_time = timecode::parse(start).map_err(|e| malformed(e.to_string()))?;
    let end_time = timecode::parse(end).map_err(|e| malformed(e.to_string()))?;

    let text = lines.collect::<Vec<_>>().join("\n");
    Ok(SubtitleCue::new(index, start_time, end_time, text))
}

pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<SubtitleCue>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DubError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path).await?;
    let cues = parse_srt(&content);
    info!("Read {} subtitle cues from {}", cues.len(), path.display());
    Ok(cues)
}

/// Drop blank lines from cue text. A blank line ends an SRT block, so text
/// containing one would lose everything after it on the next read.
pub fn collapse_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render cues as SRT, renumbering from 1
pub fn format_srt(cues: &[SubtitleCue]) -> String {
    let mut srt_content = String::new();

    for (index, cue) in cues.iter().enumerate() {
        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            timecode::format(cue.start_time),
            timecode::format(cue.end_time),
            collapse_blank_lines(cue.text.trim())
        ));
    }

    srt_content
}

pub async fn write_srt<P: AsRef<Path>>(cues: &[SubtitleCue], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(output_path, format_srt(cues)).await?;

    info!("SRT file generated successfully");
    Ok(())
}

/// Greedy word wrap at `max_chars` characters per line
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed <= max_chars || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Split cues too long to read on screen into consecutive two-line parts.
///
/// A cue is split when its text exceeds two full lines. Each part gets an equal
/// share of the window, clamped to `[min_duration, max_duration]`. When the
/// minimum cannot be honoured for every part the window is shared out evenly
/// instead, so parts never run past the original end and never collapse to
/// zero length.
pub fn reflow_for_burn_in(
    cues: &[SubtitleCue],
    max_chars_per_line: usize,
    min_duration: f64,
    max_duration: f64,
) -> Vec<SubtitleCue> {
    let mut output = Vec::new();

    for cue in cues {
        if cue.text.chars().count() <= max_chars_per_line * 2 || cue.duration <= 0.0 {
            output.push(SubtitleCue::new(output.len() + 1, cue.start_time, cue.end_time, cue.text.clone()));
            continue;
        }

        let lines = wrap_text(&cue.text, max_chars_per_line);
        let parts: Vec<String> = lines.chunks(2).map(|pair| pair.join("\n")).collect();
        if parts.is_empty() {
            output.push(SubtitleCue::new(output.len() + 1, cue.start_time, cue.end_time, cue.text.clone()));
            continue;
        }

        let even_share = cue.duration / parts.len() as f64;
        let clamped = even_share.clamp(min_duration, max_duration.max(min_duration));
        let spread_evenly = clamped * parts.len() as f64 > cue.duration;
        let time_per_part = if spread_evenly { even_share } else { clamped };

        let last = parts.len() - 1;
        let mut current_start = cue.start_time;
        for (i, part) in parts.into_iter().enumerate() {
            let part_end = if spread_evenly && i == last {
                cue.end_time
            } else {
                (current_start + time_per_part).min(cue.end_time)
            };
            output.push(SubtitleCue::new(output.len() + 1, current_start, part_end, part));
            current_start = part_end;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:03,500\nHello there\n\n\
                       2\n00:00:04,000 --> 00:00:06,000\nTwo\nlines\n\n\
                       x\n00:00:07,000 --> 00:00:08,000\nbad index\n\n\
                       4\n00:00:09,000 -> 00:00:10,000\nbad arrow\n\n\
                       5\n00:00:11,000 --> 00:00:1x,000\nbad timecode\n\n\
                       6\n00:00:12,000 --> 00:00:12,000 X1:10 X2:20\n\n\n\n\
                       7\n00:00:13,000 --> 00:00:14,250\nLast";

    #[test]
    fn test_parse_skips_malformed_blocks() {
        let cues = parse_srt(SRT);
        let indices: Vec<usize> = cues.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 6, 7]);

        assert_eq!(cues[0].text, "Hello there");
        assert!((cues[0].duration - 2.5).abs() < 1e-9);
        assert_eq!(cues[1].text, "Two\nlines");
        assert_eq!(cues[2].text, "");
        assert!((cues[3].end_time - 14.25).abs() < 1e-9);
    }

    #[test]
    fn test_zero_window_is_reported() {
        let cues = parse_srt(SRT);
        assert!(cues[0].validate().is_ok());
        assert!(matches!(
            cues[2].validate(),
            Err(DubError::InvalidCueWindow { index: 6, .. })
        ));
    }

    #[test]
    fn test_crlf_input() {
        let cues = parse_srt("1\r\n00:00:00,500 --> 00:00:01,000\r\nHi\r\n\r\n");
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Hi");
    }

    #[test]
    fn test_format_renumbers() {
        let cues = vec![
            SubtitleCue::new(7, 1.0, 2.0, "a"),
            SubtitleCue::new(9, 65.123, 66.0, " b "),
        ];
        assert_eq!(
            format_srt(&cues),
            "1\n00:00:01,000 --> 00:00:02,000\na\n\n2\n00:01:05,123 --> 00:01:06,000\nb\n\n"
        );
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.srt");
        let cues = vec![SubtitleCue::new(1, 0.25, 1.75, "Salam")];
        write_srt(&cues, &path).await.unwrap();
        assert_eq!(read_srt(&path).await.unwrap(), cues);
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        assert!(matches!(
            read_srt("/nonexistent/file.srt").await,
            Err(DubError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(wrap_text("aa bb cc", 5), vec!["aa bb", "cc"]);
        assert_eq!(wrap_text("averyveryverylongword x", 5), vec!["averyveryverylongword", "x"]);
        assert!(wrap_text("   ", 5).is_empty());
    }

    #[test]
    fn test_reflow_splits_long_cues() {
        let long = "one two three four five six seven eight nine ten eleven twelve";
        let cues = vec![
            SubtitleCue::new(1, 0.0, 1.0, "short"),
            SubtitleCue::new(2, 10.0, 16.0, long),
        ];
        let out = reflow_for_burn_in(&cues, 10, 0.833, 7.0);

        assert_eq!(out[0].text, "short");
        assert!(out.len() > 2);
        for (i, cue) in out.iter().enumerate() {
            assert_eq!(cue.index, i + 1);
            assert!(cue.text.lines().count() <= 2);
        }
        let tail = &out[1..];
        assert_eq!(tail[0].start_time, 10.0);
        assert!(tail.last().unwrap().end_time <= 16.0);
        for pair in tail.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn test_reflow_short_window_keeps_every_part_visible() {
        let long = "one two three four five six seven eight nine ten eleven twelve";
        let cues = vec![SubtitleCue::new(1, 10.0, 11.0, long)];
        let out = reflow_for_burn_in(&cues, 10, 0.833, 7.0);

        assert!(out.len() > 1);
        for cue in &out {
            assert!(cue.duration > 0.0, "{:?}", cue);
        }
        assert_eq!(out[0].start_time, 10.0);
        assert_eq!(out.last().unwrap().end_time, 11.0);
        let words: Vec<String> = out.iter().flat_map(|c| c.text.split_whitespace().map(String::from)).collect();
        assert_eq!(words.join(" "), long);
    }

    #[test]
    fn test_blank_lines_in_text_survive_round_trip() {
        let cues = vec![
            SubtitleCue::new(1, 1.0, 2.0, "Salam\n\n\ndunya"),
            SubtitleCue::new(2, 3.0, 4.0, "ikinci"),
        ];
        let back = parse_srt(&format_srt(&cues));

        assert_eq!(back.len(), 2);
        assert_eq!(back[0].text, "Salam\ndunya");
        assert_eq!(back[1].text, "ikinci");
        assert_eq!(collapse_blank_lines("a\n   \nb\n"), "a\nb");
    }
}
