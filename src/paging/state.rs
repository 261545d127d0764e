//! Paging metadata published next to the item list.

use serde::Serialize;
use std::fmt;

/// Where the paging state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    /// Nothing loaded yet.
    #[default]
    Idle,
    /// Fetching the first page.
    LoadingFirst,
    /// Fetching a following page.
    LoadingMore,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed; the previous items are still shown.
    Error,
}

impl FeedPhase {
    /// Returns the phase as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::LoadingFirst => "loading_first",
            Self::LoadingMore => "loading_more",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    /// Returns true while a fetch is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::LoadingFirst | Self::LoadingMore)
    }
}

impl fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Secondary reactive stream: cursor, has-more, loading and error flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagingState<C> {
    /// Cursor of the last committed page.
    pub cursor: Option<C>,
    /// Whether `load_more` may fetch.
    pub has_more: bool,
    /// True while a fetch is running.
    pub is_loading: bool,
    /// Message of the last failed fetch, cleared by the next success.
    pub error: Option<String>,
    /// Current phase.
    pub phase: FeedPhase,
}

impl<C> Default for PagingState<C> {
    fn default() -> Self {
        Self {
            cursor: None,
            has_more: true,
            is_loading: false,
            error: None,
            phase: FeedPhase::Idle,
        }
    }
}

impl<C> PagingState<C> {
    pub(crate) fn start(&mut self, phase: FeedPhase) {
        self.phase = phase;
        self.is_loading = true;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.phase = FeedPhase::Error;
        self.is_loading = false;
        self.error = Some(message);
    }
}
