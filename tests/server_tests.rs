//! End-to-end tests through `may_minihttp` on a loopback socket.

mod common;

use brrtcontainer::exchange::prelude::*;
use brrtcontainer::exchange::Exchange;
use brrtcontainer::server::{ContainerService, HttpServer, ServerHandle};
use brrtcontainer::webapp::WebApplication;
use common::container_with;
use std::fmt::Write as _;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn start(app: WebApplication) -> ServerHandle {
    let container = Arc::new(container_with(app));
    let handle = HttpServer(ContainerService::new(container))
        .start(("127.0.0.1", free_port()))
        .unwrap();
    handle.wait_ready().unwrap();
    handle
}

/// Send one request and read the response head plus `content-length` bytes.
fn send(handle: &ServerHandle, request: &str) -> (String, Vec<u8>) {
    let mut stream = TcpStream::connect(handle.addr()).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request.as_bytes()).unwrap();

    let mut raw = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = stream.read(&mut buf).unwrap();
        assert!(n > 0, "connection closed early");
        raw.extend_from_slice(&buf[..n]);
        let Some(split) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&raw[..split]).to_string();
        let length: usize = head
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0);
        let body = &raw[split + 4..];
        if body.len() >= length {
            return (head, body[..length].to_vec());
        }
    }
}

#[test]
fn test_sync_response_over_http() {
    let mut app = WebApplication::new("/api");
    app.mount("/hello", |ex: &Exchange| -> anyhow::Result<()> {
        ex.set_header("X-Handler", "hello")?;
        write!(ex.writer()?, "hello {}", ex.parameter("name").unwrap_or_default())?;
        Ok(())
    })
    .unwrap();
    let handle = start(app);

    let (head, body) = send(
        &handle,
        "GET /api/hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert!(head.to_ascii_lowercase().contains("x-handler: hello"));
    assert_eq!(body, b"hello world");

    let (head, _) = send(&handle, "GET /elsewhere HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(head.starts_with("HTTP/1.1 404"), "{head}");
    handle.stop();
}

#[test]
fn test_async_completion_holds_connection() {
    let mut app = WebApplication::new("").with_async_supported(true);
    app.mount("/slow", |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = write!(ctx.exchange().writer().unwrap(), "finally");
            ctx.complete().unwrap();
        });
        Ok(())
    })
    .unwrap();
    let handle = start(app);

    let (head, body) = send(&handle, "GET /slow HTTP/1.1\r\nHost: localhost\r\n\r\n");
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    assert_eq!(body, b"finally");
    handle.stop();
}
