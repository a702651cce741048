//! LRC synced-lyrics parser
//!
//! Turns an LRC text blob into ascending `(text, timestamp_ms)` pairs. Lines
//! that do not start with `[minutes:seconds.fraction]` are skipped, so header
//! tags (`[ar:...]`, `[offset:...]`) and plain text never produce output. A
//! line may carry several timestamps (`[00:12.00][00:45.10] chorus`); each one
//! yields its own entry.
//!
//! Pure and network-free: callers treat an empty result the same as "no
//! synced lyrics available".

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::LyricLine;

/// Leading run of timestamps followed by the lyric text
static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\[\d+:\d+\.\d+\])+)\s*(.*)$").expect("static LRC line pattern")
});

/// A single `[mm:ss.xx]` tag
static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+):(\d+\.\d+)\]").expect("static LRC timestamp pattern"));

/// Parse LRC text into lyric lines ordered by timestamp
///
/// `timestamp_ms = round((minutes * 60 + seconds) * 1000)`. The sort is
/// stable, so lines sharing a timestamp keep their source order.
pub fn parse_lrc(text: &str) -> Vec<LyricLine> {
    let mut lines: Vec<LyricLine> = text.lines().flat_map(parse_line).collect();
    lines.sort_by_key(|line| line.timestamp_ms);
    lines
}

/// Parse one LRC line; empty when the line is not a timed lyric
fn parse_line(line: &str) -> Vec<LyricLine> {
    let Some(caps) = LINE_PATTERN.captures(line.trim()) else {
        return Vec::new();
    };

    let lyric = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    if lyric.is_empty() {
        return Vec::new();
    }

    let tags = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    TIMESTAMP_PATTERN
        .captures_iter(tags)
        .filter_map(|ts| {
            let minutes: u64 = ts.get(1)?.as_str().parse().ok()?;
            let seconds: f64 = ts.get(2)?.as_str().parse().ok()?;
            Some(LyricLine::new(lyric, to_millis(minutes, seconds)?))
        })
        .collect()
}

fn to_millis(minutes: u64, seconds: f64) -> Option<u64> {
    let ms = ((minutes as f64) * 60.0 + seconds) * 1000.0;
    if !ms.is_finite() || ms < 0.0 || ms > u64::MAX as f64 {
        return None;
    }
    Some(ms.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_line() {
        let lines = parse_lrc("[02:05.30] Hello");
        assert_eq!(lines, vec![LyricLine::new("Hello", 125_300)]);
    }

    #[test]
    fn test_rounds_instead_of_truncating() {
        // 125.3 * 1000 is 125299.99999999999 in f64
        assert_eq!(parse_lrc("[00:00.29] a")[0].timestamp_ms, 290);
        assert_eq!(parse_lrc("[01:00.123] b")[0].timestamp_ms, 60_123);
        assert_eq!(parse_lrc("[00:01.9996] c")[0].timestamp_ms, 2_000);
    }

    #[test]
    fn test_skips_non_matching_lines() {
        let text = "[ar:IU]\n[ti:Blueming]\n[offset:+100]\nplain text\n\n[00:12.50] first\n[bad:00.00] nope";
        let lines = parse_lrc(text);
        assert_eq!(lines, vec![LyricLine::new("first", 12_500)]);
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        assert!(parse_lrc("").is_empty());
        assert!(parse_lrc("just some words\nand more").is_empty());
        assert!(parse_lrc("[00:10] missing fraction").is_empty());
    }

    #[test]
    fn test_blank_lyric_lines_skipped() {
        let lines = parse_lrc("[00:01.00] \n[00:02.00]\n[00:03.00] ♪");
        assert_eq!(lines, vec![LyricLine::new("♪", 3_000)]);
    }

    #[test]
    fn test_crlf_and_unicode() {
        let lines = parse_lrc("[00:01.00] 안녕하세요\r\n[00:02.50] こんにちは\r\n");
        assert_eq!(
            lines,
            vec![
                LyricLine::new("안녕하세요", 1_000),
                LyricLine::new("こんにちは", 2_500),
            ]
        );
    }

    #[test]
    fn test_multiple_timestamps_per_line() {
        let lines = parse_lrc("[00:12.00][00:45.10] chorus\n[00:30.00] verse");
        assert_eq!(
            lines,
            vec![
                LyricLine::new("chorus", 12_000),
                LyricLine::new("verse", 30_000),
                LyricLine::new("chorus", 45_100),
            ]
        );
    }

    #[test]
    fn test_out_of_order_source_is_sorted_and_ties_stable() {
        let text = "[00:05.00] later\n[00:01.00] one\n[00:01.00] two\n[00:03.00] mid";
        let lines = parse_lrc(text);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "mid", "later"]);
        assert!(lines.windows(2).all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
    }

    #[test]
    fn test_deterministic() {
        let text = "[00:03.33] c\n[00:01.11] a\n[00:02.22] b";
        assert_eq!(parse_lrc(text), parse_lrc(text));
    }

    #[test]
    fn test_long_minutes_field() {
        assert_eq!(parse_lrc("[125:00.00] late")[0].timestamp_ms, 7_500_000);
    }
}
