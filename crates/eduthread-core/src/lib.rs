//! Core types and conversation logic for eduthread.
//!
//! This crate holds everything about a teacher/guardian conversation that does
//! not touch the network:
//!
//! - **Identifiers and models**: messages, threads, and the current user
//! - **Message store**: ordered, de-duplicated messages with idempotent merges
//! - **History paging**: single in-flight fetch and end-of-history detection
//! - **Scroll control**: when to follow new messages and how to keep the
//!   visible message anchored while older history is prepended
//!
//! # Example
//!
//! ```
//! use eduthread_core::{MessageStore, ThreadId};
//!
//! let store = MessageStore::new(ThreadId::new(1));
//! assert!(store.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod ids;
pub mod model;
pub mod paging;
pub mod scroll;
pub mod store;

pub use config::ViewConfig;
pub use error::{CoreError, Result};
pub use ids::{GuardianId, IdError, MessageId, TeacherId, ThreadId, UserId};
pub use model::{Companion, CurrentUser, Message, PersonName, Thread, UserRole};
pub use paging::{HistoryPager, PageKind, PageRequest, DEFAULT_PAGE_SIZE};
pub use scroll::{animate_step, ChangeKind, ScrollAction, ScrollController, Viewport};
pub use store::{MessageStore, StoreChange};
