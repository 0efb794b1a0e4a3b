//! Lyric document parsing and indexing.
//!
//! A [`LyricDocument`] is built once per track from whatever raw text the
//! lyric provider returned. Time-tagged (LRC) text becomes an ascending,
//! de-duplicated line table; untagged text becomes a single line; missing
//! text becomes a placeholder line.

use crate::error::{CoreError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Text shown when the provider returned nothing for the current track.
pub const NO_LYRICS_PLACEHOLDER: &str =
    "No lyrics available, you will have to guess for this one :(";

/// A single line of lyrics with its start time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricLine {
    pub start_time: Duration,
    pub text: String,
}

impl LyricLine {
    pub fn new(start_time: Duration, text: impl Into<String>) -> Self {
        Self {
            start_time,
            text: text.into(),
        }
    }
}

/// Parsed lyrics for one track.
///
/// Lines are sorted ascending by `start_time`, start times are unique, and
/// the first line always starts at zero. Documents are never mutated after
/// parsing; a track change builds a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricDocument {
    synced: bool,
    lines: Vec<LyricLine>,
}

impl LyricDocument {
    /// Parse raw provider text into a document.
    ///
    /// `None` yields the "no lyrics" placeholder. Text without a single
    /// recognizable `[mm:ss]`/`[mm:ss.xx]` tag is kept verbatim (trimmed) as
    /// one unsynced line. Otherwise every tagged line becomes an entry, an
    /// empty entry is inserted at zero, and later duplicates of a timestamp
    /// replace earlier ones. Lines whose tag cannot be parsed are dropped.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::placeholder();
        };

        if !contains_sync_tag(raw) {
            return Self::single_line(raw.trim());
        }

        let mut entries = BTreeMap::new();
        entries.insert(Duration::ZERO, String::new());

        for line in raw.trim().lines() {
            let line = line.trim_start();
            if line.is_empty() {
                continue;
            }

            match parse_tagged_line(line) {
                Ok((start_time, text)) => {
                    entries.insert(start_time, text.to_string());
                }
                Err(e) => debug!("Dropping lyric line: {}", e),
            }
        }

        let lines = entries
            .into_iter()
            .map(|(start_time, text)| LyricLine { start_time, text })
            .collect();

        Self {
            synced: true,
            lines,
        }
    }

    /// The document used when no lyrics could be found.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::single_line(NO_LYRICS_PLACEHOLDER)
    }

    fn single_line(text: &str) -> Self {
        Self {
            synced: false,
            lines: vec![LyricLine::new(Duration::ZERO, text)],
        }
    }

    /// Whether the source text carried time tags
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.synced
    }

    /// All lines in ascending start-time order. Never empty.
    #[must_use]
    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    /// Full lyrics as display text.
    ///
    /// Unsynced documents return their single stored text; synced documents
    /// join every line (including the leading empty one) with newlines.
    #[must_use]
    pub fn lyrics_text(&self) -> String {
        if !self.synced {
            return self
                .lines
                .first()
                .map(|line| line.text.clone())
                .unwrap_or_default();
        }

        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for LyricDocument {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl fmt::Display for LyricDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lyrics_text())
    }
}

/// Scan for at least one strict `[m:ss]`, `[mm:ss]` or `[mm:ss.xx]` tag anywhere.
fn contains_sync_tag(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'[')
        .any(|(i, _)| is_sync_tag(&bytes[i + 1..]))
}

/// Check whether `rest` (the bytes after an opening bracket) starts a strict tag
fn is_sync_tag(rest: &[u8]) -> bool {
    let minutes = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if !(1..=2).contains(&minutes) {
        return false;
    }

    let [b':', s1, s2, rest @ ..] = &rest[minutes..] else {
        return false;
    };
    if !(s1.is_ascii_digit() && s2.is_ascii_digit()) {
        return false;
    }

    match rest {
        [b']', ..] => true,
        [b'.', f1, f2, b']', ..] => f1.is_ascii_digit() && f2.is_ascii_digit(),
        _ => false,
    }
}

/// Split `[tag]text` at the first closing bracket and parse the tag
fn parse_tagged_line(line: &str) -> Result<(Duration, &str)> {
    let malformed = |reason: &str| CoreError::LrcParse {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let rest = line
        .strip_prefix('[')
        .ok_or_else(|| malformed("missing leading timestamp tag"))?;
    let (tag, text) = rest
        .split_once(']')
        .ok_or_else(|| malformed("unterminated timestamp tag"))?;
    let start_time =
        parse_timestamp(tag).ok_or_else(|| malformed("timestamp is not minutes:seconds[.fraction]"))?;

    Ok((start_time, text.trim()))
}

/// Parse `minutes:seconds[.fraction]` into a duration.
///
/// Minutes and seconds may have any number of digits; an hours component is
/// rejected. Fractions are kept to millisecond precision.
fn parse_timestamp(tag: &str) -> Option<Duration> {
    let (minutes, seconds) = tag.split_once(':')?;
    let (whole, fraction) = match seconds.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (seconds, None),
    };

    if !is_digits(minutes) || !is_digits(whole) {
        return None;
    }

    let minutes: u64 = minutes.parse().ok()?;
    let whole: u64 = whole.parse().ok()?;
    let millis = match fraction {
        Some(fraction) if is_digits(fraction) => fraction_millis(fraction),
        Some(_) => return None,
        None => 0,
    };

    let secs = minutes.checked_mul(60)?.checked_add(whole)?;
    Some(Duration::from_secs(secs) + Duration::from_millis(millis))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// "5" -> 500, "50" -> 500, "123" -> 123, "1239" -> 123
fn fraction_millis(digits: &str) -> u64 {
    digits
        .bytes()
        .chain(std::iter::repeat(b'0'))
        .take(3)
        .fold(0, |acc, b| acc * 10 + u64::from(b - b'0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(doc: &LyricDocument) -> Vec<Duration> {
        doc.lines().iter().map(|l| l.start_time).collect()
    }

    #[test]
    fn test_parse_synced_scenario() {
        let doc = LyricDocument::parse(Some("[00:01.50]Hello\n[00:05.00]World"));

        assert!(doc.is_synced());
        assert_eq!(
            doc.lines(),
            &[
                LyricLine::new(Duration::ZERO, ""),
                LyricLine::new(Duration::from_millis(1500), "Hello"),
                LyricLine::new(Duration::from_secs(5), "World"),
            ]
        );
    }

    #[test]
    fn test_parse_plain_text_kept_verbatim() {
        let doc = LyricDocument::parse(Some("Just plain text\nno tags here"));

        assert!(!doc.is_synced());
        assert_eq!(doc.lines().len(), 1);
        assert_eq!(doc.lyrics_text(), "Just plain text\nno tags here");
    }

    #[test]
    fn test_parse_plain_text_is_trimmed() {
        let doc = LyricDocument::parse(Some("\n  verse one\nverse two  \n\n"));
        assert_eq!(doc.lyrics_text(), "verse one\nverse two");
    }

    #[test]
    fn test_parse_none_gives_placeholder() {
        let doc = LyricDocument::parse(None);

        assert!(!doc.is_synced());
        assert_eq!(doc.lines().len(), 1);
        assert_eq!(doc.lines()[0].start_time, Duration::ZERO);
        assert_eq!(doc.lines()[0].text, NO_LYRICS_PLACEHOLDER);
        assert_eq!(doc, LyricDocument::placeholder());
    }

    #[test]
    fn test_duplicate_timestamp_last_write_wins() {
        let doc = LyricDocument::parse(Some("[00:02.00]first\n[00:03.00]x\n[00:02.00]second"));

        assert_eq!(doc.lines().len(), 3);
        assert_eq!(doc.lines()[1].text, "second");
    }

    #[test]
    fn test_explicit_zero_line_replaces_synthesized_one() {
        let doc = LyricDocument::parse(Some("[00:00.00]Intro\n[00:04.00]Verse"));

        assert_eq!(doc.lines().len(), 2);
        assert_eq!(doc.lines()[0].text, "Intro");
    }

    #[test]
    fn test_out_of_order_lines_are_sorted() {
        let doc = LyricDocument::parse(Some("[00:09.00]c\n[00:01.00]a\n[00:05.00]b"));

        assert_eq!(
            starts(&doc),
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_secs(5),
                Duration::from_secs(9)
            ]
        );
        assert_eq!(doc.lyrics_text(), "\na\nb\nc");
    }

    #[test]
    fn test_malformed_lines_are_dropped() {
        let input = "[ti:Some Title]\n[00:01.00]kept\nuntagged line\n[00:0x.00]bad\n[00:03.00]also kept\n[00:04.00";
        let doc = LyricDocument::parse(Some(input));

        assert!(doc.is_synced());
        let texts: Vec<_> = doc.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["", "kept", "also kept"]);
    }

    #[test]
    fn test_hours_component_is_dropped() {
        let doc = LyricDocument::parse(Some("[00:01.00]ok\n[01:02:03]too long"));
        assert_eq!(doc.lines().len(), 2);
    }

    #[test]
    fn test_detection_requires_strict_tag() {
        // Single-digit seconds and three-digit minutes are not recognized as sync tags
        for input in ["[1:2]text", "[123:45]text", "[00:12.345]text", "[00:12.]text"] {
            let doc = LyricDocument::parse(Some(input));
            assert!(!doc.is_synced(), "{input} should not be synced");
            assert_eq!(doc.lyrics_text(), input);
        }
    }

    #[test]
    fn test_detection_finds_tag_anywhere() {
        let doc = LyricDocument::parse(Some("header\nsomething [0:07] inside"));
        // Detected as synced, but neither line starts with a valid tag
        assert!(doc.is_synced());
        assert_eq!(doc.lines().len(), 1);
        assert_eq!(doc.lines()[0].text, "");
    }

    #[test]
    fn test_lenient_line_tags_in_synced_document() {
        let doc = LyricDocument::parse(Some("[00:01.00]a\n[0:02.5]b\n[100:00]c\n[00:03.1234]d"));

        assert_eq!(
            starts(&doc),
            vec![
                Duration::ZERO,
                Duration::from_secs(1),
                Duration::from_millis(2500),
                Duration::from_millis(3123),
                Duration::from_secs(6000),
            ]
        );
    }

    #[test]
    fn test_text_split_at_first_closing_bracket() {
        let doc = LyricDocument::parse(Some("[00:01.00]  [Chorus] sing  "));
        assert_eq!(doc.lines()[1].text, "[Chorus] sing");
    }

    #[test]
    fn test_blank_and_indented_lines() {
        let doc = LyricDocument::parse(Some("[00:01.00]a\n\n   [00:02.00]b\r\n[00:03.00]c"));
        let texts: Vec<_> = doc.lines().iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["", "a", "b", "c"]);
    }

    #[test]
    fn test_round_trip_preserves_line_order() {
        let lines = ["Hello", "darkness", "my old", "friend"];
        let raw = lines
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[00:{:02}.00]{text}", i * 3 + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let doc = LyricDocument::parse(Some(&raw));
        let text = doc.lyrics_text();
        let mut out = text.lines();

        assert_eq!(out.next(), Some(""));
        assert_eq!(out.collect::<Vec<_>>(), lines);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = "[00:01.00]one\n[00:02.00]two\n[00:01.00]uno";
        assert_eq!(LyricDocument::parse(Some(raw)), LyricDocument::parse(Some(raw)));
    }

    #[test]
    fn test_cjk_lyrics() {
        let doc = LyricDocument::parse(Some("[00:05.00]你好世界"));
        assert_eq!(doc.lines()[1].text, "你好世界");
    }

    #[test]
    fn test_display_matches_lyrics_text() {
        let doc = LyricDocument::parse(Some("[00:01.00]a\n[00:02.00]b"));
        assert_eq!(doc.to_string(), doc.lyrics_text());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("00:12.34"), Some(Duration::from_millis(12_340)));
        assert_eq!(parse_timestamp("3:05"), Some(Duration::from_secs(185)));
        assert_eq!(parse_timestamp("00:12.5"), Some(Duration::from_millis(12_500)));
        assert_eq!(parse_timestamp("00:12:34"), None);
        assert_eq!(parse_timestamp(" 00:12"), None);
        assert_eq!(parse_timestamp("ar:Artist"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
