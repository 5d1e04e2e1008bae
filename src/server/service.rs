use crate::container::Container;
use crate::exchange::{CapturedResponse, CapturedSink, ExchangeRequest};
use dashmap::DashMap;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use http::{HeaderMap, Method, StatusCode};
use may_minihttp::{HttpService, Request, Response};
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Distinct header lines kept in the interner before falling back to
/// one-off allocations.
const MAX_INTERNED_HEADERS: usize = 4096;

/// Header slots a `may_minihttp` response has room for.
const MAX_RESPONSE_HEADERS: usize = 16;

/// `may_minihttp` adapter: turns each request into an exchange, runs it
/// through the [`Container`] and copies the captured response back.
///
/// The connection coroutine waits for the exchange to close, so a handler
/// that went async holds the connection until its context completes.
///
/// # Memory
///
/// `may_minihttp` only accepts `'static` header lines, so every response
/// header line is leaked. Repeated lines are interned and leak once. Once
/// the interner holds [`MAX_INTERNED_HEADERS`] lines, each further distinct
/// line (per-request `etag`, `location`, `set-cookie` values) leaks on every
/// response. Long-running servers whose handlers emit unbounded distinct
/// header values grow without bound. Responses carry at most
/// [`MAX_RESPONSE_HEADERS`] header lines; extra lines are dropped with a
/// warning.
#[derive(Clone)]
pub struct ContainerService {
    container: Arc<Container>,
    header_lines: Arc<DashMap<String, &'static str>>,
}

impl ContainerService {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            header_lines: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// `may_minihttp` only takes `'static` header lines; identical lines are
    /// leaked once and reused.
    fn header_line(&self, name: &HeaderName, value: &HeaderValue) -> &'static str {
        let line = format!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
        if let Some(interned) = self.header_lines.get(&line) {
            return *interned;
        }
        let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
        if self.header_lines.len() < MAX_INTERNED_HEADERS {
            self.header_lines.insert(line, leaked);
        } else {
            debug!(header = %name, "Header interner full, leaking one-off line");
        }
        leaked
    }

    fn write_response(&self, res: &mut Response, captured: CapturedResponse) {
        let status = captured.status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        res.status_code(
            usize::from(status.as_u16()),
            status.canonical_reason().unwrap_or("Unknown"),
        );
        for line in self.header_lines_for(&captured.headers) {
            res.header(line);
        }
        res.body_vec(captured.body);
    }

    fn header_lines_for(&self, headers: &HeaderMap) -> Vec<&'static str> {
        // may_minihttp frames the body itself
        let framed = || headers.iter().filter(|(name, _)| *name != CONTENT_LENGTH);
        let count = framed().count();
        if count > MAX_RESPONSE_HEADERS {
            warn!(
                headers = count,
                max = MAX_RESPONSE_HEADERS,
                "Too many response headers, dropping the rest"
            );
        }
        framed()
            .take(MAX_RESPONSE_HEADERS)
            .map(|(name, value)| self.header_line(name, value))
            .collect()
    }
}

/// Copy a `may_minihttp` request into an owned [`ExchangeRequest`].
pub fn to_exchange_request(req: Request) -> io::Result<ExchangeRequest> {
    let method = Method::from_bytes(req.method().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let target = req.path().to_string();
    let protocol = format!("HTTP/1.{}", req.version());
    let mut headers = HeaderMap::new();
    for header in req.headers() {
        match (
            HeaderName::from_bytes(header.name.as_bytes()),
            HeaderValue::from_bytes(header.value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %header.name, "Dropping invalid request header"),
        }
    }
    let mut body = Vec::new();
    req.body().read_to_end(&mut body)?;

    let mut request = ExchangeRequest::new(method, &target)
        .protocol(protocol)
        .body(body);
    request.headers = headers;
    Ok(request)
}

impl HttpService for ContainerService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let request = match to_exchange_request(req) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed request");
                res.status_code(400, "Bad Request");
                return Ok(());
            }
        };
        let method = request.method.clone();
        let target = request.target.clone();

        let sink = CapturedSink::new();
        let exchange = self.container.service(request, sink.clone());
        exchange.wait_closed();

        let captured = sink.snapshot();
        info!(
            exchange_id = %exchange.id(),
            method = %method,
            target = %target,
            status = captured.status.map(|s| s.as_u16()),
            body_bytes = captured.body.len(),
            "Request served"
        );
        self.write_response(res, captured);
        Ok(())
    }
}
