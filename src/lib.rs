//! # BRRTContainer
//!
//! **BRRTContainer** is a lightweight, coroutine-powered web application
//! container built on the `may` runtime and `may_minihttp`.
//!
//! ## Overview
//!
//! A container hosts application units, each owning a context path. Every
//! inbound HTTP request becomes an [`Exchange`](exchange::Exchange) that is
//! routed to the unit with the longest matching context path and run through
//! that unit's handler pipeline. Handlers may leave synchronous processing,
//! start an asynchronous context, and later complete the response or
//! re-dispatch the exchange, from any coroutine.
//!
//! Units are backed by abstract resource stores (directories, zip archives,
//! temporary extractions or in-memory trees), and code modules are resolved by
//! name across ordered store roots.
//!
//! ## Architecture
//!
//! - **[`exchange`]** - Request/response handle, commit rules, async dispatch
//!   state machine and [`AsyncContext`](exchange::AsyncContext)
//! - **[`dispatcher`]** - Runs a unit's pipeline inline or on a dispatch coroutine
//! - **[`webapp`]** - Application units, handler mappings, initializers and extensions
//! - **[`container`]** - Deployed unit set and context-path routing
//! - **[`resource`]** - Resource stores (directory, archive, temp dir, memory)
//! - **[`module`]** - Named module resolution over resource stores
//! - **[`server`]** - `may_minihttp` adapter and server handle
//! - **[`config`]**, **[`logging`]**, **[`runtime_config`]** - Configuration and tracing setup
//! - **[`cli`]** - `serve` and `modules` commands
//!
//! ### Async Dispatch Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as server::ContainerService
//!     participant Container
//!     participant Handler
//!     participant Ctx as AsyncContext
//!     participant Disp as Dispatcher
//!
//!     Client->>Server: HTTP request
//!     Server->>Container: service(request, sink)
//!     Container->>Handler: handle(&exchange)
//!     Handler->>Ctx: start_async()
//!     Handler-->>Container: Ok(())
//!     Note over Container: state stays AsyncStarted
//!     Ctx->>Disp: dispatch_to("/next")
//!     Disp->>Handler: handle(&exchange) on a dispatch coroutine
//!     Handler-->>Disp: Ok(())
//!     Note over Disp: no new start_async: commit, fire on_complete, close
//!     Disp-->>Server: closed signal
//!     Server-->>Client: HTTP response
//! ```
//!
//! ### Dispatch States
//!
//! | State | Meaning |
//! |-------|---------|
//! | `SyncActive` | Pipeline running on the inbound or dispatch coroutine |
//! | `AsyncStarted` | A handler called `start_async`; the response stays open |
//! | `AsyncDispatched` | `dispatch` accepted; waiting for the dispatch coroutine |
//! | `AsyncCompleted` | Completion in progress (commit, listeners) |
//! | `Closed` | Response flushed and sink closed |
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtcontainer::container::Container;
//! use brrtcontainer::exchange::prelude::*;
//! use brrtcontainer::exchange::{CapturedSink, Exchange, ExchangeRequest};
//! use brrtcontainer::webapp::WebApplication;
//! use std::fmt::Write;
//!
//! let mut app = WebApplication::new("/shop");
//! app.mount("/hello", |ex: &Exchange| -> anyhow::Result<()> {
//!     ex.set_content_type("text/plain")?;
//!     write!(ex.writer()?, "hello from {}", ex.context_path())?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! let container = Container::default();
//! container.deploy(app).unwrap();
//!
//! let sink = CapturedSink::new();
//! let exchange = container.service(ExchangeRequest::get("/shop/hello"), sink.clone());
//! exchange.wait_closed();
//! assert_eq!(sink.snapshot().body, b"hello from /shop");
//! ```
//!
//! ## Configuration
//!
//! See [`config`] for the container file format, [`logging`] for
//! `BRRTC_LOG_*` and [`runtime_config`] for `BRRTC_STACK_SIZE`.

pub mod cli;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod exchange;
pub mod ids;
pub mod logging;
pub mod module;
pub mod resource;
pub mod runtime_config;
pub mod server;
pub mod webapp;

pub use container::Container;
pub use error::{ContainerError, Result};
pub use exchange::{AsyncContext, AsyncListener, Exchange, ExchangeRequest};
pub use webapp::WebApplication;
