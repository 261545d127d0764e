//! Seasonal promotion source.

use super::PrioritySource;
use crate::models::{ContentOrder, ContentQuery, FeedItem, PageResult, SortKey, SourceId};
use crate::storage::RemoteStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A calendar day without a year, written `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Creates a month-day, validating ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the month or day is out of range.
    pub fn new(month: u32, day: u32) -> Result<Self> {
        // 2024 is a leap year, so 02-29 is accepted.
        if NaiveDate::from_ymd_opt(2024, month, day).is_none() {
            return Err(Error::InvalidInput(format!(
                "invalid month-day {month:02}-{day:02}"
            )));
        }
        Ok(Self { month, day })
    }

    /// Returns the month-day of a date.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl TryFrom<String> for MonthDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        let (month, day) = value
            .split_once('-')
            .ok_or_else(|| Error::InvalidInput(format!("expected MM-DD, got '{value}'")))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| Error::InvalidInput(format!("bad month-day '{value}': {e}")))
        };
        Self::new(parse(month)?, parse(day)?)
    }
}

impl From<MonthDay> for String {
    fn from(value: MonthDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// A yearly promotion window. Windows with `start > end` wrap the year end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonWindow {
    /// Season identifier, also the prefix of its epoch.
    pub id: String,
    /// Content tag selecting the season's items.
    pub tag: String,
    /// First day (inclusive).
    pub start: MonthDay,
    /// Last day (inclusive).
    pub end: MonthDay,
}

impl SeasonWindow {
    /// Returns true if `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = MonthDay::of(date);
        if self.wraps() {
            md >= self.start || md <= self.end
        } else {
            md >= self.start && md <= self.end
        }
    }

    fn wraps(&self) -> bool {
        self.start > self.end
    }

    /// Season id plus the year the running window opened in.
    #[must_use]
    pub fn epoch(&self, date: NaiveDate) -> String {
        let year = if self.wraps() && MonthDay::of(date) <= self.end {
            date.year() - 1
        } else {
            date.year()
        };
        format!("{}-{year}", self.id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SeasonCursor {
    epoch: String,
    after: Option<SortKey>,
}

/// Items tagged for the running season, oldest first.
pub struct SeasonalSource {
    windows: Vec<SeasonWindow>,
    remote: Arc<dyn RemoteStore>,
}

impl SeasonalSource {
    /// Creates a seasonal source. The first matching window wins on overlap.
    #[must_use]
    pub fn new(windows: Vec<SeasonWindow>, remote: Arc<dyn RemoteStore>) -> Self {
        Self { windows, remote }
    }

    fn current(&self, now: DateTime<Utc>) -> Option<&SeasonWindow> {
        let today = now.date_naive();
        self.windows.iter().find(|w| w.contains(today))
    }
}

#[async_trait]
impl PrioritySource for SeasonalSource {
    fn id(&self) -> SourceId {
        SourceId::Seasonal
    }

    fn epoch(&self, now: DateTime<Utc>) -> String {
        self.current(now).map_or_else(
            || "off-season".to_string(),
            |w| w.epoch(now.date_naive()),
        )
    }

    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.current(now).is_some()
    }

    async fn fetch(
        &self,
        cursor: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<PageResult> {
        let Some(window) = self.current(now) else {
            return Ok(PageResult::paused(cursor.map(str::to_string)));
        };
        let epoch = window.epoch(now.date_naive());

        // A cursor from another season starts the new one from the top.
        let after = cursor
            .and_then(|c| serde_json::from_str::<SeasonCursor>(c).ok())
            .filter(|c| c.epoch == epoch)
            .and_then(|c| c.after);

        let order = ContentOrder::ChronologicalAsc;
        let query = ContentQuery::new(order, limit)
            .after(after.clone())
            .with_tag(window.tag.clone());
        let content = self.remote.query(&query).await?;

        let has_more = limit > 0 && content.len() == limit;
        let last = content.last().map(|item| order.sort_key(item)).or(after);
        let next = SeasonCursor { epoch, after: last };
        let encoded = serde_json::to_string(&next)
            .map_err(|e| Error::operation("encode_season_cursor", e))?;

        let items = content
            .into_iter()
            .map(|item| FeedItem::new(item, SourceId::Seasonal))
            .collect();
        Ok(PageResult::new(items, Some(encoded), has_more))
    }
}
