//! # Server Module
//!
//! Listener adapter between `may_minihttp` and the [`Container`](crate::container::Container).
//! Wire parsing stays in `may_minihttp`; this module only converts a parsed
//! request into an [`ExchangeRequest`](crate::exchange::ExchangeRequest) and
//! copies the captured response back.

mod http_server;
mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use service::{to_exchange_request, ContainerService};
