//! External state for the featured-of-the-day source.

use chrono::NaiveDate;

/// Remembers the last day the featured item was shown.
pub trait FeaturedState: Send + Sync {
    /// The last day the featured item was shown, if ever.
    fn last_shown_on(&self) -> Option<NaiveDate>;

    /// Records that the featured item was shown on `day`.
    fn mark_shown(&self, day: NaiveDate);
}
