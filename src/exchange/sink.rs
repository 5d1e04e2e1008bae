//! Response sinks: where an exchange's status line, headers and body bytes go.

use http::{HeaderMap, StatusCode};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

/// Writable side of the inbound exchange contract.
///
/// The exchange guarantees the call order `write_status_line` →
/// `write_headers` → `write_body`* → `flush` → `close`, each head write at most
/// once, and `close` exactly once.
pub trait ResponseSink: Send {
    fn write_status_line(&mut self, protocol: &str, status: StatusCode) -> io::Result<()>;
    fn write_headers(&mut self, headers: &HeaderMap) -> io::Result<()>;
    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Release the underlying connection.
    fn close(&mut self) -> io::Result<()>;
}

type Closer = Box<dyn FnOnce() + Send>;

/// Writes HTTP/1.x framing to any [`Write`].
///
/// An optional closer runs once when the sink is closed; listeners use it to
/// recycle the connection.
pub struct StreamSink<W: Write + Send> {
    out: W,
    closer: Option<Closer>,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(out: W) -> Self {
        Self { out, closer: None }
    }

    #[must_use]
    pub fn with_closer(mut self, closer: impl FnOnce() + Send + 'static) -> Self {
        self.closer = Some(Box::new(closer));
        self
    }
}

impl<W: Write + Send> ResponseSink for StreamSink<W> {
    fn write_status_line(&mut self, protocol: &str, status: StatusCode) -> io::Result<()> {
        write!(
            self.out,
            "{} {} {}\r\n",
            protocol,
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
    }

    fn write_headers(&mut self, headers: &HeaderMap) -> io::Result<()> {
        for (name, value) in headers {
            self.out.write_all(name.as_str().as_bytes())?;
            self.out.write_all(b": ")?;
            self.out.write_all(value.as_bytes())?;
            self.out.write_all(b"\r\n")?;
        }
        self.out.write_all(b"\r\n")
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn close(&mut self) -> io::Result<()> {
        let result = self.out.flush();
        if let Some(closer) = self.closer.take() {
            closer();
        }
        result
    }
}

/// Cloneable in-memory byte buffer implementing [`Write`].
#[derive(Clone, Default, Debug)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Response parts recorded by a [`CapturedSink`].
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    pub protocol: Option<String>,
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub closed: bool,
}

/// Records status, headers and body separately instead of framing them.
///
/// Listener adapters that own HTTP framing themselves (such as
/// `may_minihttp`) rebuild their response from the snapshot.
#[derive(Clone, Default)]
pub struct CapturedSink(Arc<Mutex<CapturedResponse>>);

impl CapturedSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CapturedResponse> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn snapshot(&self) -> CapturedResponse {
        self.lock().clone()
    }
}

impl ResponseSink for CapturedSink {
    fn write_status_line(&mut self, protocol: &str, status: StatusCode) -> io::Result<()> {
        let mut captured = self.lock();
        captured.protocol = Some(protocol.to_string());
        captured.status = Some(status);
        Ok(())
    }

    fn write_headers(&mut self, headers: &HeaderMap) -> io::Result<()> {
        self.lock().headers = headers.clone();
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.lock().body.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;
    use http::HeaderValue;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_stream_sink_framing() {
        let buffer = SharedBuffer::new();
        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        let mut sink = StreamSink::new(buffer.clone()).with_closer(move || flag.store(true, Ordering::SeqCst));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        sink.write_status_line("HTTP/1.1", StatusCode::NOT_FOUND).unwrap();
        sink.write_headers(&headers).unwrap();
        sink.write_body(b"gone").unwrap();
        sink.close().unwrap();

        assert_eq!(
            buffer.to_string_lossy(),
            "HTTP/1.1 404 Not Found\r\ncontent-type: text/plain\r\n\r\ngone"
        );
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_captured_sink_snapshot() {
        let sink = CapturedSink::new();
        let mut writer = sink.clone();
        writer.write_status_line("HTTP/1.1", StatusCode::OK).unwrap();
        writer.write_body(b"abc").unwrap();
        writer.close().unwrap();
        let snap = sink.snapshot();
        assert_eq!(snap.status, Some(StatusCode::OK));
        assert_eq!(snap.body, b"abc");
        assert!(snap.closed);
    }
}
