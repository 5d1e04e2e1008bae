use super::core::Exchange;
use super::sink::ResponseSink;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::io::{self, Write};

/// Which body accessor the handler picked first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyMode {
    Unset,
    Stream,
    Writer,
}

/// Mutable response side of an exchange.
///
/// Head writes are idempotent here; the commit rules (what may still change
/// after a commit) are enforced by [`Exchange`].
pub(crate) struct ResponseState {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) status_line_written: bool,
    pub(crate) headers_written: bool,
    pub(crate) body_mode: BodyMode,
    pub(crate) bytes_written: u64,
    pub(crate) closed: bool,
    sink: Box<dyn ResponseSink>,
}

impl ResponseState {
    pub(crate) fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            status_line_written: false,
            headers_written: false,
            body_mode: BodyMode::Unset,
            bytes_written: 0,
            closed: false,
            sink,
        }
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.closed {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "response already closed"))
        } else {
            Ok(())
        }
    }

    pub(crate) fn write_status_line(&mut self, protocol: &str) -> io::Result<()> {
        self.ensure_open()?;
        if !self.status_line_written {
            self.sink.write_status_line(protocol, self.status)?;
            self.status_line_written = true;
        }
        Ok(())
    }

    /// Write status line and headers if still pending. Returns `true` when
    /// this call committed the response.
    pub(crate) fn write_head(&mut self, protocol: &str) -> io::Result<bool> {
        if self.headers_written {
            return Ok(false);
        }
        self.write_status_line(protocol)?;
        self.sink.write_headers(&self.headers)?;
        self.headers_written = true;
        Ok(true)
    }

    pub(crate) fn write_body(&mut self, protocol: &str, bytes: &[u8]) -> io::Result<bool> {
        self.ensure_open()?;
        let committed = self.write_head(protocol)?;
        if !bytes.is_empty() {
            self.sink.write_body(bytes)?;
            self.bytes_written += bytes.len() as u64;
        }
        Ok(committed)
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.sink.flush()
    }

    /// Release the sink. Only the first call reaches it.
    pub(crate) fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.sink.close()
    }
}

/// Binary body writer handed out by `output_stream()`.
///
/// The first write commits the response.
#[derive(Debug)]
pub struct BodyStream {
    exchange: Exchange,
}

impl BodyStream {
    pub(crate) fn new(exchange: Exchange) -> Self {
        Self { exchange }
    }
}

impl Write for BodyStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.exchange.write_body(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.exchange.flush_body()
    }
}

/// Text body writer handed out by `writer()`.
///
/// Encodes with the response charset: ISO-8859-1 (unmappable characters
/// become `?`) or UTF-8 for everything else.
#[derive(Debug)]
pub struct TextWriter {
    exchange: Exchange,
    latin1: bool,
}

impl TextWriter {
    pub(crate) fn new(exchange: Exchange, charset: Option<&str>) -> Self {
        let latin1 = charset
            .map(|c| {
                let c = c.to_ascii_lowercase();
                c == "iso-8859-1" || c == "latin1" || c == "iso_8859_1"
            })
            .unwrap_or(false);
        Self { exchange, latin1 }
    }

    /// Write `text`, surfacing I/O failures that `fmt::Write` would flatten.
    pub fn print(&mut self, text: &str) -> io::Result<()> {
        if self.latin1 {
            let bytes: Vec<u8> = text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect();
            self.exchange.write_body(&bytes)
        } else {
            self.exchange.write_body(text.as_bytes())
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.exchange.flush_body()
    }
}

impl fmt::Write for TextWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.print(s).map_err(|_| fmt::Error)
    }
}
