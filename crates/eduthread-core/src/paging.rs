//! Backward history paging state.
//!
//! `HistoryPager` decides whether a page fetch may start. It enforces a single
//! in-flight request and stops paging once a short page reveals the start of
//! the conversation. The fetch itself is performed by the caller.

use crate::error::{CoreError, Result};
use crate::ids::MessageId;

/// Default number of messages per page.
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Parameters of one page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Only messages with IDs strictly below this one. `None` for the newest page.
    pub before: Option<MessageId>,
    /// Maximum number of messages to return.
    pub take: usize,
}

/// Which kind of page a fetch is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Newest page when the view opens.
    Initial,
    /// Older page requested by scrolling near the top.
    Older,
}

/// Tracks paging progress for one conversation.
#[derive(Debug, Clone)]
pub struct HistoryPager {
    page_size: usize,
    in_flight: Option<PageKind>,
    initial_loaded: bool,
    exhausted: bool,
}

impl HistoryPager {
    /// Create a pager with the given page size.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if `page_size` is zero.
    pub fn new(page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(CoreError::InvalidConfig(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            page_size,
            in_flight: None,
            initial_loaded: false,
            exhausted: false,
        })
    }

    /// Configured page size.
    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether a fetch is currently pending.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether the initial page has been received.
    #[must_use]
    pub const fn is_initial_loaded(&self) -> bool {
        self.initial_loaded
    }

    /// Whether the start of the conversation has been reached.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Whether an older page could be requested right now.
    #[must_use]
    pub const fn can_load_older(&self) -> bool {
        self.initial_loaded && !self.exhausted && self.in_flight.is_none()
    }

    /// Start fetching the newest page.
    ///
    /// Returns `None` while another fetch is pending.
    pub fn begin_initial(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() {
            return None;
        }
        self.in_flight = Some(PageKind::Initial);
        Some(PageRequest {
            before: None,
            take: self.page_size,
        })
    }

    /// Start fetching the page before `oldest`.
    ///
    /// Returns `None` if a fetch is pending, the initial page has not arrived,
    /// history is exhausted, or there is no message to page back from.
    pub fn begin_older(&mut self, oldest: Option<MessageId>) -> Option<PageRequest> {
        if !self.can_load_older() {
            return None;
        }
        let before = oldest?;
        self.in_flight = Some(PageKind::Older);
        Some(PageRequest {
            before: Some(before),
            take: self.page_size,
        })
    }

    /// Record a successful fetch of `received` messages.
    ///
    /// A page shorter than the page size ends backward paging.
    pub fn complete(&mut self, kind: PageKind, received: usize) {
        if self.in_flight != Some(kind) {
            return;
        }
        self.in_flight = None;
        if kind == PageKind::Initial {
            self.initial_loaded = true;
        }
        if received < self.page_size {
            self.exhausted = true;
        }
    }

    /// Record a failed fetch. The same fetch may be attempted again.
    pub fn fail(&mut self, kind: PageKind) {
        if self.in_flight == Some(kind) {
            self.in_flight = None;
        }
    }
}
