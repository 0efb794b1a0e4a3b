//! Time-to-line resolution over a [`LyricDocument`].
//!
//! Every lookup follows the same rule: the active line is the one with the
//! latest start time that is `<=` the queried time. Since every document has
//! a line at zero, a lookup always resolves to some line.

use crate::lyrics::{LyricDocument, LyricLine};
use std::time::Duration;

impl LyricDocument {
    /// Ordinal position (0-based, ascending) of the line active at `time`.
    #[must_use]
    pub fn index_at(&self, time: Duration) -> usize {
        // lines[0] starts at zero, so the partition point is always >= 1
        self.lines()
            .partition_point(|line| line.start_time <= time)
            .saturating_sub(1)
    }

    /// Start time of the line active at `time`.
    #[must_use]
    pub fn nearest_timestamp(&self, time: Duration) -> Duration {
        self.line(self.index_at(time))
            .map_or(Duration::ZERO, |line| line.start_time)
    }

    /// Text of the line active at `time`.
    #[must_use]
    pub fn line_at(&self, time: Duration) -> &str {
        self.line(self.index_at(time))
            .map_or("", |line| line.text.as_str())
    }

    /// Lines around the active one, for scrolling displays.
    #[must_use]
    pub fn visible_lines(&self, time: Duration, before: usize, after: usize) -> &[LyricLine] {
        let lines = self.lines();
        let current = self.index_at(time);

        let start = current.saturating_sub(before);
        let end = current.saturating_add(after).saturating_add(1).min(lines.len());

        &lines[start..end]
    }

    fn line(&self, index: usize) -> Option<&LyricLine> {
        self.lines().get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn scenario() -> LyricDocument {
        LyricDocument::parse(Some("[00:01.50]Hello\n[00:05.00]World"))
    }

    #[test]
    fn test_line_at_scenario() {
        let doc = scenario();

        assert_eq!(doc.line_at(secs(3.0)), "Hello");
        assert_eq!(doc.line_at(secs(10.0)), "World");
        assert_eq!(doc.index_at(Duration::ZERO), 0);
        assert_eq!(doc.line_at(Duration::ZERO), "");
    }

    #[test]
    fn test_exact_timestamp_selects_that_line() {
        let doc = scenario();

        assert_eq!(doc.index_at(secs(1.5)), 1);
        assert_eq!(doc.nearest_timestamp(secs(1.5)), secs(1.5));
        assert_eq!(doc.index_at(secs(1.499)), 0);
    }

    #[test]
    fn test_past_last_line_stays_on_last_line() {
        let doc = scenario();

        assert_eq!(doc.index_at(Duration::from_secs(86_400)), 2);
        assert_eq!(doc.nearest_timestamp(Duration::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_nearest_timestamp_is_monotonic() {
        let doc = LyricDocument::parse(Some(
            "[00:01.00]a\n[00:02.50]b\n[00:02.75]c\n[00:10.00]d\n[01:00.00]e",
        ));

        let mut previous = Duration::ZERO;
        for step in 0..800 {
            let t = Duration::from_millis(step * 100);
            let nearest = doc.nearest_timestamp(t);
            assert!(nearest >= previous, "regressed at {t:?}");
            assert!(nearest <= t);
            previous = nearest;
        }
    }

    #[test]
    fn test_unsynced_document_returns_whole_text() {
        let doc = LyricDocument::parse(Some("Just plain text\nno tags here"));

        for t in [0.0, 1.0, 1000.0] {
            assert_eq!(doc.line_at(secs(t)), "Just plain text\nno tags here");
            assert_eq!(doc.index_at(secs(t)), 0);
        }
    }

    #[test]
    fn test_placeholder_lookup() {
        let doc = LyricDocument::parse(None);
        assert_eq!(doc.line_at(Duration::ZERO), crate::lyrics::NO_LYRICS_PLACEHOLDER);
    }

    #[test]
    fn test_visible_lines() {
        let doc = LyricDocument::parse(Some(
            "[00:05.00]Line 1\n[00:10.00]Line 2\n[00:15.00]Line 3\n[00:20.00]Line 4",
        ));

        let visible: Vec<_> = doc
            .visible_lines(secs(12.0), 1, 1)
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(visible, vec!["Line 1", "Line 2", "Line 3"]);

        // Window is truncated at both ends
        assert_eq!(doc.visible_lines(Duration::ZERO, 3, 1).len(), 2);
        assert_eq!(doc.visible_lines(secs(25.0), 1, 5).len(), 2);
    }
}
