//! # Dispatcher Module
//!
//! Runs the routing/handler pipeline for an exchange and schedules async
//! re-dispatches onto fresh `may` coroutines.
//!
//! ## Request Flow
//!
//! 1. The container calls [`Dispatcher::service`] on the listener's coroutine
//! 2. The pipeline maps the exchange's current target through the bound
//!    application's handler mappings
//! 3. A routing miss answers 404; a handler error or panic answers 500 when the
//!    response is still uncommitted
//! 4. When the handler returns without calling `start_async`, the exchange is
//!    completed; otherwise it stays open for whoever holds the `AsyncContext`
//!
//! `AsyncContext::dispatch` hands the exchange to [`Dispatcher::schedule`],
//! which spawns one coroutine per dispatch and returns at once. The dispatched
//! pipeline runs the same steps against the dispatch target.
//!
//! ## Performance Considerations
//!
//! - Stack size of dispatch coroutines comes from `BRRTC_STACK_SIZE`
//! - Handler panics are caught per pipeline run; they never unwind into the
//!   listener

mod core;

pub use self::core::Dispatcher;
