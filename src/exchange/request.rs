use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method};
use std::fmt;
use std::io::{self, Cursor, Read};
use tracing::warn;

/// Protocol assumed when a listener does not report one.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// Readable side of the inbound exchange contract: what a listener hands the
/// container for one request.
pub struct ExchangeRequest {
    pub method: Method,
    /// Path part of the request target, percent-encoded as received.
    pub target: String,
    /// Raw query string; `None` when the target carried no `?`.
    pub query: Option<String>,
    pub protocol: String,
    pub headers: HeaderMap,
    pub body: Box<dyn Read + Send>,
}

impl ExchangeRequest {
    /// Build a request from a method and a request target such as
    /// `/test/TestServlet?test=mytest`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            target: if path.is_empty() { "/".to_string() } else { path },
            query,
            protocol: DEFAULT_PROTOCOL.to_string(),
            headers: HeaderMap::new(),
            body: Box::new(io::empty()),
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::GET, target)
    }

    /// Append a header. Names or values that are not valid HTTP are dropped
    /// with a warning.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => warn!(header = %name, "Dropping invalid request header"),
        }
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    #[must_use]
    pub fn body(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.body = Box::new(Cursor::new(bytes.into()));
        self
    }

    #[must_use]
    pub fn body_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.body = Box::new(reader);
        self
    }

    pub(crate) fn is_form_post(&self) -> bool {
        is_form_post(&self.method, &self.headers)
    }
}

impl fmt::Debug for ExchangeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeRequest")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("query", &self.query)
            .field("protocol", &self.protocol)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// `POST` with an `application/x-www-form-urlencoded` body.
pub(crate) fn is_form_post(method: &Method, headers: &HeaderMap) -> bool {
    *method == Method::POST
        && headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| media_type(ct).eq_ignore_ascii_case("application/x-www-form-urlencoded"))
            .unwrap_or(false)
}

/// Split a request target at the first `?`.
pub(crate) fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

/// Media type of a `Content-Type` value, without parameters.
pub(crate) fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

/// `charset` parameter of a `Content-Type` value, unquoted.
pub(crate) fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Decode query string and form body pairs, query first.
pub(crate) fn parse_parameters(query: Option<&str>, form: Option<&[u8]>) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();
    if let Some(body) = form {
        params.extend(
            url::form_urlencoded::parse(body).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
    }
    params
}
