//! Capability interfaces over an exchange.
//!
//! A handler that only reads the request depends on [`RequestView`]; one that
//! writes a response depends on [`ResponseWriter`]; suspend/resume goes through
//! [`AsyncControl`]. [`Exchange`](super::Exchange) implements all three.

use super::async_context::AsyncContext;
use super::core::Exchange;
use super::request::charset_of;
use super::response::{BodyStream, TextWriter};
use crate::error::Result;
use http::Method;

/// Read access to the request side.
pub trait RequestView {
    fn method(&self) -> Method;
    /// Target path exactly as received, including the context path.
    fn request_uri(&self) -> String;
    /// Application-relative path of the current dispatch.
    fn target_path(&self) -> String;
    /// Raw query string; `None` when the request had none.
    fn query_string(&self) -> Option<String>;
    fn protocol(&self) -> String;
    fn context_path(&self) -> String;
    /// First value of a header; names are case-insensitive.
    fn header(&self, name: &str) -> Option<String>;
    /// All values of a header in arrival order.
    fn header_values(&self, name: &str) -> Vec<String>;
    fn header_names(&self) -> Vec<String>;
    fn parameter(&self, name: &str) -> Option<String>;
    fn parameter_values(&self, name: &str) -> Vec<String>;
    fn parameter_names(&self) -> Vec<String>;

    fn content_type(&self) -> Option<String> {
        self.header("content-type")
    }

    fn character_encoding(&self) -> Option<String> {
        self.content_type().and_then(|ct| charset_of(&ct))
    }

    fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    fn is_wrapper(&self) -> bool {
        false
    }
}

/// Write access to the response side.
///
/// Every head mutation fails with `IllegalState` once the response is
/// committed.
pub trait ResponseWriter {
    fn status(&self) -> u16;
    fn set_status(&self, status: u16) -> Result<()>;
    /// Replace all values of a header.
    fn set_header(&self, name: &str, value: &str) -> Result<()>;
    fn add_header(&self, name: &str, value: &str) -> Result<()>;
    fn response_header(&self, name: &str) -> Option<String>;
    fn set_content_type(&self, value: &str) -> Result<()> {
        self.set_header("content-type", value)
    }
    /// Write the status line. Repeating it before the headers are written is
    /// a no-op.
    fn write_status_line(&self) -> Result<()>;
    /// Write the headers (and the status line if pending). Commits.
    fn write_headers(&self) -> Result<()>;
    fn output_stream(&self) -> Result<BodyStream>;
    fn writer(&self) -> Result<TextWriter>;
    fn is_committed(&self) -> bool;

    fn is_wrapper(&self) -> bool {
        false
    }
}

/// Suspend/resume control.
pub trait AsyncControl {
    fn is_async_supported(&self) -> bool;
    fn is_async_started(&self) -> bool;
    /// Suspend the exchange. Returns the active context when already started.
    fn start_async(&self) -> Result<AsyncContext>;
    /// Suspend the exchange with custom request/response objects. When either
    /// is a wrapper, `dispatch()` without a path targets the wrapper's path.
    fn start_async_with(&self, request: &dyn RequestView, response: &dyn ResponseWriter) -> Result<AsyncContext>;
    fn async_context(&self) -> Result<AsyncContext>;
}

/// Delegating request wrapper that may override target and query string.
#[derive(Clone)]
pub struct RequestWrapper {
    exchange: Exchange,
    target: Option<String>,
    query: Option<Option<String>>,
}

impl RequestWrapper {
    pub fn new(exchange: &Exchange) -> Self {
        Self {
            exchange: exchange.clone(),
            target: None,
            query: None,
        }
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = Some(query);
        self
    }

    #[must_use]
    pub fn inner(&self) -> &Exchange {
        &self.exchange
    }
}

impl RequestView for RequestWrapper {
    fn method(&self) -> Method {
        self.exchange.method()
    }
    fn request_uri(&self) -> String {
        self.exchange.request_uri()
    }
    fn target_path(&self) -> String {
        self.target.clone().unwrap_or_else(|| self.exchange.target_path())
    }
    fn query_string(&self) -> Option<String> {
        match &self.query {
            Some(query) => query.clone(),
            None => self.exchange.query_string(),
        }
    }
    fn protocol(&self) -> String {
        self.exchange.protocol()
    }
    fn context_path(&self) -> String {
        RequestView::context_path(&self.exchange)
    }
    fn header(&self, name: &str) -> Option<String> {
        self.exchange.header(name)
    }
    fn header_values(&self, name: &str) -> Vec<String> {
        self.exchange.header_values(name)
    }
    fn header_names(&self) -> Vec<String> {
        self.exchange.header_names()
    }
    fn parameter(&self, name: &str) -> Option<String> {
        self.exchange.parameter(name)
    }
    fn parameter_values(&self, name: &str) -> Vec<String> {
        self.exchange.parameter_values(name)
    }
    fn parameter_names(&self) -> Vec<String> {
        self.exchange.parameter_names()
    }
    fn is_wrapper(&self) -> bool {
        true
    }
}

/// Delegating response wrapper.
#[derive(Clone)]
pub struct ResponseWrapper {
    exchange: Exchange,
}

impl ResponseWrapper {
    pub fn new(exchange: &Exchange) -> Self {
        Self {
            exchange: exchange.clone(),
        }
    }

    #[must_use]
    pub fn inner(&self) -> &Exchange {
        &self.exchange
    }
}

impl ResponseWriter for ResponseWrapper {
    fn status(&self) -> u16 {
        self.exchange.status()
    }
    fn set_status(&self, status: u16) -> Result<()> {
        self.exchange.set_status(status)
    }
    fn set_header(&self, name: &str, value: &str) -> Result<()> {
        self.exchange.set_header(name, value)
    }
    fn add_header(&self, name: &str, value: &str) -> Result<()> {
        self.exchange.add_header(name, value)
    }
    fn response_header(&self, name: &str) -> Option<String> {
        self.exchange.response_header(name)
    }
    fn write_status_line(&self) -> Result<()> {
        self.exchange.write_status_line()
    }
    fn write_headers(&self) -> Result<()> {
        self.exchange.write_headers()
    }
    fn output_stream(&self) -> Result<BodyStream> {
        self.exchange.output_stream()
    }
    fn writer(&self) -> Result<TextWriter> {
        self.exchange.writer()
    }
    fn is_committed(&self) -> bool {
        self.exchange.is_committed()
    }
    fn is_wrapper(&self) -> bool {
        true
    }
}
