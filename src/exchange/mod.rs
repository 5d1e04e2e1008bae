//! # Exchange Module
//!
//! One request/response pair and the dispatch state machine that owns it.
//!
//! ## Lifecycle
//!
//! ```text
//! listener ──ExchangeRequest + ResponseSink──▶ Exchange (SyncActive)
//!     handler runs ─┬─ returns ───────────────────────────▶ complete ▶ Closed
//!                   └─ start_async() ─▶ AsyncContext
//!                         ├─ complete() ───────────────────▶ complete ▶ Closed
//!                         └─ dispatch()/dispatch_to(path) ─▶ pipeline re-runs on
//!                                                            a fresh coroutine
//! ```
//!
//! Completion always runs the same sequence: commit and flush the head, fire
//! `on_error` (when failing) and `on_complete` listeners in registration
//! order, close the sink, mark the exchange `Closed`.
//!
//! Handlers reach the exchange through three capability traits,
//! [`RequestView`], [`ResponseWriter`] and [`AsyncControl`]; bring them into
//! scope with `use brrtcontainer::exchange::prelude::*`.
//!
//! `is_committed()` flips to `true` exactly once. Code on another thread can
//! block on [`Exchange::wait_committed`] instead of polling.

mod async_context;
mod core;
mod facade;
mod request;
mod response;
mod sink;
mod state;

pub use self::core::{Exchange, ExchangeBuilder};
pub use async_context::{AsyncContext, AsyncListener};
pub use facade::{AsyncControl, RequestView, RequestWrapper, ResponseWrapper, ResponseWriter};
pub use request::{ExchangeRequest, DEFAULT_PROTOCOL};
pub use response::{BodyStream, TextWriter};
pub use sink::{CapturedResponse, CapturedSink, ResponseSink, SharedBuffer, StreamSink};
pub use state::DispatchState;

/// The capability traits, for glob import in handlers.
pub mod prelude {
    pub use super::{AsyncControl, RequestView, ResponseWriter};
}
