//! Network client and conversation view for eduthread.
//!
//! - [`ApiClient`]: REST calls for messages, threads and the current user,
//!   with message operations behind the [`MessageApi`] trait
//! - [`HubClient`]: push hub subscription with automatic reconnect
//! - [`LiveReceiver`]: typed live events for the open conversation
//! - [`ThreadView`]: the open conversation, driven by [`ViewUpdate`]s
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use eduthread_client::{ApiClient, ClientConfig, MessageApi, ThreadView};
//! use eduthread_core::ThreadId;
//! use tokio::sync::mpsc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let client = ApiClient::new(&config, "token")?;
//! let me = client.current_user().await?;
//!
//! let (tx, mut rx) = mpsc::channel(64);
//! let api: Arc<dyn MessageApi> = Arc::new(client.clone());
//! let mut view = ThreadView::new(api, ThreadId::new(1), me.id, config.page_size, config.view, 1, tx)?;
//! view.load_initial();
//! view.start_live(client.hub());
//!
//! while let Some(update) = rx.recv().await {
//!     view.apply(update);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod hub;
pub mod receiver;
pub mod types;
pub mod view;

pub use api::{ApiClient, MessageApi};
pub use config::ClientConfig;
pub use error::{ClientError, HubError, Result};
pub use hub::{HubClient, HubEvent, HubFrame};
pub use receiver::{LiveEvent, LiveReceiver};
pub use view::{FetchKind, LiveStatus, LoadState, ThreadView, ViewUpdate};
