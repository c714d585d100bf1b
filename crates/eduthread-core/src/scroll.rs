//! Scroll position decisions for the message list.
//!
//! Offsets are measured in rows from the top of the rendered content. The
//! controller looks at the viewport as it was before a store change and the
//! content height after it, and picks one `ScrollAction`.

use crate::config::ViewConfig;
use crate::store::StoreChange;

/// Visible window over the rendered message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Rows scrolled past at the top.
    pub offset: usize,
    /// Rows visible at once.
    pub height: usize,
    /// Total rows of rendered content.
    pub content_height: usize,
}

impl Viewport {
    /// Largest valid offset.
    #[must_use]
    pub const fn max_offset(&self) -> usize {
        self.content_height.saturating_sub(self.height)
    }

    /// Rows between the bottom of the viewport and the end of the content.
    #[must_use]
    pub fn distance_from_bottom(&self) -> usize {
        self.max_offset() - self.offset.min(self.max_offset())
    }

    /// Whether the viewport is within `rows` of the bottom.
    #[must_use]
    pub fn is_near_bottom(&self, rows: usize) -> bool {
        self.distance_from_bottom() <= rows
    }

    /// Whether the viewport is within fewer than `rows` of the top.
    #[must_use]
    pub const fn is_near_top(&self, rows: usize) -> bool {
        self.offset < rows
    }

    /// Same viewport with a different content height, offset clamped.
    #[must_use]
    pub fn with_content_height(self, content_height: usize) -> Self {
        let mut next = Self {
            content_height,
            ..self
        };
        next.offset = next.offset.min(next.max_offset());
        next
    }
}

/// What a store change means for scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// First page rendered.
    InitialPage,
    /// A message arrived at the tail.
    Appended {
        /// Whether the local user wrote it.
        own: bool,
    },
    /// Older history was merged at the head.
    Prepended,
    /// A message was removed.
    Removed,
    /// Content changed in place (read flags, mid-list inserts and merges).
    Updated,
}

impl ChangeKind {
    /// Classify a store change. `own` tells whether the new tail message is
    /// the local user's.
    #[must_use]
    pub const fn from_store(change: StoreChange, own: bool) -> Self {
        match change {
            StoreChange::Reset { .. } => Self::InitialPage,
            StoreChange::Prepended { .. } => Self::Prepended,
            StoreChange::Appended(_)
            | StoreChange::Reconciled {
                new_tail: Some(_), ..
            } => Self::Appended { own },
            StoreChange::Removed(_) => Self::Removed,
            StoreChange::Inserted(_)
            | StoreChange::Merged { .. }
            | StoreChange::MarkedRead(_)
            | StoreChange::Reconciled { new_tail: None, .. } => Self::Updated,
        }
    }
}

/// Scroll behavior to apply after a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    /// Leave the offset where it is.
    Keep,
    /// Move to the bottom without animation.
    JumpToBottom,
    /// Move to the bottom with animation.
    AnimateToBottom,
    /// Move down by this many rows to keep the visible message in place.
    ShiftBy(usize),
}

impl ScrollAction {
    /// Offset to use immediately after the change.
    ///
    /// `AnimateToBottom` keeps the current offset; the caller drives the
    /// animation with [`animate_step`].
    #[must_use]
    pub fn resolve(self, after: Viewport) -> usize {
        match self {
            Self::Keep | Self::AnimateToBottom => after.offset.min(after.max_offset()),
            Self::JumpToBottom => after.max_offset(),
            Self::ShiftBy(rows) => after.offset.saturating_add(rows).min(after.max_offset()),
        }
    }
}

/// Decides the scroll behavior after each store change.
#[derive(Debug, Clone)]
pub struct ScrollController {
    config: ViewConfig,
    initial_done: bool,
}

impl ScrollController {
    /// Create a controller with the given thresholds.
    #[must_use]
    pub const fn new(config: ViewConfig) -> Self {
        Self {
            config,
            initial_done: false,
        }
    }

    /// Whether the initial jump to the bottom already happened.
    #[must_use]
    pub const fn initial_done(&self) -> bool {
        self.initial_done
    }

    /// Forget the initial jump, for a newly opened conversation.
    pub fn reset(&mut self) {
        self.initial_done = false;
    }

    /// Pick the action for `change`, given the viewport before it and the
    /// content height after it.
    pub fn decide(
        &mut self,
        change: ChangeKind,
        before: Viewport,
        content_height_after: usize,
    ) -> ScrollAction {
        match change {
            ChangeKind::InitialPage => {
                if self.initial_done {
                    ScrollAction::Keep
                } else {
                    self.initial_done = true;
                    ScrollAction::JumpToBottom
                }
            }
            ChangeKind::Appended { own } => {
                if own || before.is_near_bottom(self.config.stick_to_bottom_distance) {
                    ScrollAction::AnimateToBottom
                } else {
                    ScrollAction::Keep
                }
            }
            ChangeKind::Prepended => {
                ScrollAction::ShiftBy(content_height_after.saturating_sub(before.content_height))
            }
            ChangeKind::Removed => {
                if before.is_near_bottom(self.config.stick_to_bottom_distance) {
                    ScrollAction::JumpToBottom
                } else {
                    ScrollAction::Keep
                }
            }
            ChangeKind::Updated => ScrollAction::Keep,
        }
    }
}

/// One animation frame towards `target`: covers half the remaining distance,
/// at least one row.
#[must_use]
pub fn animate_step(offset: usize, target: usize) -> usize {
    if offset == target {
        return target;
    }
    let distance = offset.abs_diff(target);
    let step = distance.div_ceil(2).max(1);
    if offset < target {
        offset + step
    } else {
        offset - step
    }
}
