//! SRT timecode codec (`HH:MM:SS,mmm`).

use crate::error::{DubError, Result};

/// Parse an SRT timecode into seconds.
///
/// All four fields (hours, minutes, seconds, milliseconds) must be present and
/// purely numeric; anything else is a `MalformedTimecode`.
pub fn parse(text: &str) -> Result<f64> {
    let text = text.trim();
    let malformed = || DubError::MalformedTimecode(text.to_string());

    let (clock, millis) = text.split_once(',').ok_or_else(malformed)?;
    let mut fields = clock.split(':');
    let hours = parse_field(fields.next()).ok_or_else(malformed)?;
    let minutes = parse_field(fields.next()).ok_or_else(malformed)?;
    let seconds = parse_field(fields.next()).ok_or_else(malformed)?;
    if fields.next().is_some() {
        return Err(malformed());
    }
    let millis = parse_field(Some(millis)).ok_or_else(malformed)?;

    let whole_seconds = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .and_then(|hm| hm.checked_add(seconds))
        .ok_or_else(malformed)?;

    Ok(whole_seconds as f64 + millis as f64 / 1000.0)
}

fn parse_field(field: Option<&str>) -> Option<u64> {
    let field = field?;
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Format seconds as an SRT timecode, zero-padded, rounded to the millisecond.
/// Negative input is clamped to zero.
pub fn format(seconds: f64) -> String {
    let total_milliseconds = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    };
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(format(0.0), "00:00:00,000");
        assert_eq!(format(65.123), "00:01:05,123");
        assert_eq!(format(3661.500), "01:01:01,500");
        assert_eq!(format(-3.0), "00:00:00,000");
    }

    #[test]
    fn test_parse() {
        assert!((parse("00:00:02,965").unwrap() - 2.965).abs() < 1e-9);
        assert!((parse("01:00:00,000").unwrap() - 3600.0).abs() < 1e-9);
        assert!((parse(" 00:01:30,500 ").unwrap() - 90.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let cases = [
            "",
            "00:00:02",
            "00:02,965",
            "aa:00:02,965",
            "00:00:02,",
            "00:00:02.965",
            "00:00:00:02,965",
            "-1:00:02,000",
            // numeric but too large for the seconds total
            "9999999999999999999:00:00,000",
            "00:99999999999999999999:00,000",
        ];
        for bad in cases {
            assert!(
                matches!(parse(bad), Err(DubError::MalformedTimecode(_))),
                "expected failure for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_round_trip_within_one_millisecond() {
        let mut t = 0.0;
        while t < 7300.0 {
            let back = parse(&format(t)).unwrap();
            assert!((back - t).abs() <= 0.0005 + 1e-9, "{} -> {}", t, back);
            t += 13.0371;
        }
    }
}
