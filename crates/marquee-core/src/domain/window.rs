use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::UtcDateTime;

/// Limit applied by [`QueryWindow::upcoming`].
pub const DEFAULT_LIMIT: usize = 100;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
const ONE_YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Request parameters for a listing fetch.
///
/// `after` is inclusive, `before` is exclusive. A `limit` of zero means the
/// provider default (unbounded as far as the merge layer is concerned).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryWindow {
    pub after: Option<UtcDateTime>,
    pub before: Option<UtcDateTime>,
    pub limit: usize,
    pub anchor: Option<String>,
}

impl QueryWindow {
    /// Unbounded window with the provider default limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start of yesterday through one year out, capped at [`DEFAULT_LIMIT`].
    pub fn upcoming(now: UtcDateTime) -> Self {
        let start_of_today = now.start_of_day();
        Self {
            after: Some(start_of_today.saturating_sub(ONE_DAY)),
            before: Some(start_of_today.saturating_add(ONE_YEAR)),
            limit: DEFAULT_LIMIT,
            anchor: None,
        }
    }

    pub fn after(mut self, after: UtcDateTime) -> Self {
        self.after = Some(after);
        self
    }

    pub fn before(mut self, before: UtcDateTime) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    /// Whether `ts` falls inside `[after, before)`.
    pub fn contains(&self, ts: UtcDateTime) -> bool {
        self.after.map_or(true, |after| ts >= after) && self.before.map_or(true, |before| ts < before)
    }

    /// The emission cap, if any.
    pub fn max_items(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    /// Canonical `after|before|limit|anchor` form used in cache keys.
    pub fn cache_key(&self) -> String {
        let format = |ts: Option<UtcDateTime>| ts.map(UtcDateTime::format_rfc3339).unwrap_or_default();
        format!(
            "{}|{}|{}|{}",
            format(self.after),
            format(self.before),
            self.limit,
            self.anchor.as_deref().unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(input: &str) -> UtcDateTime {
        UtcDateTime::parse(input).expect("valid timestamp")
    }

    #[test]
    fn contains_is_half_open() {
        let window = QueryWindow::new()
            .after(ts("2026-02-20T19:00:00Z"))
            .before(ts("2026-02-20T21:00:00Z"));

        assert!(window.contains(ts("2026-02-20T19:00:00Z")));
        assert!(window.contains(ts("2026-02-20T20:59:59Z")));
        assert!(!window.contains(ts("2026-02-20T21:00:00Z")));
        assert!(!window.contains(ts("2026-02-20T18:59:59Z")));
    }

    #[test]
    fn unbounded_window_contains_everything() {
        assert!(QueryWindow::new().contains(ts("1999-12-31T23:59:59Z")));
    }

    #[test]
    fn cache_key_leaves_absent_fields_empty() {
        assert_eq!(QueryWindow::new().cache_key(), "||0|");

        let window = QueryWindow::new()
            .after(ts("2026-02-20T19:00:00Z"))
            .with_limit(5)
            .with_anchor("page-2");
        assert_eq!(window.cache_key(), "2026-02-20T19:00:00Z||5|page-2");
    }

    #[test]
    fn upcoming_spans_yesterday_through_next_year() {
        let window = QueryWindow::upcoming(ts("2026-02-20T15:30:00Z"));

        assert_eq!(window.after, Some(ts("2026-02-19T00:00:00Z")));
        assert_eq!(window.before, Some(ts("2027-02-20T00:00:00Z")));
        assert_eq!(window.limit, DEFAULT_LIMIT);
        assert_eq!(window.anchor, None);
    }

    #[test]
    fn zero_limit_means_uncapped() {
        assert_eq!(QueryWindow::new().max_items(), None);
        assert_eq!(QueryWindow::new().with_limit(3).max_items(), Some(3));
    }
}
