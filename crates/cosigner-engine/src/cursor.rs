use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Poll position: only outputs updated strictly after `offset` are requested.
///
/// The offset never moves backwards. It lives only in memory, so a restart
/// replays the lookback window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor {
    offset: DateTime<Utc>,
}

impl PollCursor {
    pub fn new(offset: DateTime<Utc>) -> Self {
        Self { offset }
    }

    /// Start `lookback` before `now`, saturating at the earliest representable time
    pub fn with_lookback(now: DateTime<Utc>, lookback: Duration) -> Self {
        let offset = ChronoDuration::from_std(lookback)
            .ok()
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { offset }
    }

    pub fn offset(&self) -> DateTime<Utc> {
        self.offset
    }

    /// Move to `updated_at` if it is later; returns whether the cursor moved
    pub fn advance(&mut self, updated_at: DateTime<Utc>) -> bool {
        if updated_at > self.offset {
            self.offset = updated_at;
            true
        } else {
            false
        }
    }
}
