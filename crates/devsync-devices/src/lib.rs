//! Device engine for devsync.
//!
//! This crate turns the compiled actions of `devsync-core` into live HTTP
//! traffic and keeps the host's view of each property in sync.
//!
//! ## Features
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `http` | ✅ | reqwest-based [`ReqwestTransport`] |
//!
//! ## Architecture
//!
//! - **HttpAccessory**: facade per configured device, owns everything below
//! - **PropertySynchronizer**: cache, polling, debounced writes, echo guard
//! - **ActionDispatcher**: get with inconclusive fallbacks, templated set
//! - **RequestThrottler**: spaces calls by the number already in flight
//! - **HttpTransport**: the network seam, reqwest in production

pub mod accessory;
pub mod dispatch;
pub mod error;
mod permit;
pub mod publisher;
pub mod synchronizer;
pub mod throttler;
pub mod transport;

pub use accessory::{HttpAccessory, NAME_PROPERTY};
pub use dispatch::ActionDispatcher;
pub use error::{SyncError, SyncResult, TransportError};
pub use publisher::{ChannelPublisher, NoopPublisher, StatePublisher, StateUpdate};
pub use synchronizer::{PropertySynchronizer, SyncSettings};
pub use throttler::RequestThrottler;
pub use transport::{BasicAuth, HttpRequest, HttpResponse, HttpTransport};

#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
