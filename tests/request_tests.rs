//! Tests for the request and response views of an exchange
//!
//! Each test deploys a `/test` unit with a `TestServlet` handler that echoes
//! what it sees through the `RequestView` facade.

mod common;

use brrtcontainer::exchange::prelude::*;
use brrtcontainer::exchange::{Exchange, ExchangeRequest, SharedBuffer, StreamSink};
use brrtcontainer::webapp::WebApplication;
use common::{container_with, serve};
use http::Method;
use std::fmt::Write;

fn echo_container() -> brrtcontainer::Container {
    let mut app = WebApplication::new("/test");
    app.add_handler("echo", |ex: &Exchange| -> anyhow::Result<()> {
        let mut out = ex.writer()?;
        writeln!(out, "method={}", ex.method())?;
        writeln!(out, "uri={}", ex.request_uri())?;
        writeln!(out, "context={}", ex.context_path())?;
        writeln!(out, "servlet={}", ex.servlet_path())?;
        writeln!(out, "info={}", ex.path_info().unwrap_or_else(|| "null".into()))?;
        writeln!(out, "query={}", ex.query_string().unwrap_or_else(|| "null".into()))?;
        writeln!(out, "protocol={}", ex.protocol())?;
        writeln!(
            out,
            "encoding={}",
            ex.character_encoding().unwrap_or_else(|| "null".into())
        )?;
        writeln!(
            out,
            "length={}",
            ex.content_length().map_or_else(|| "null".into(), |l| l.to_string())
        )?;
        writeln!(out, "params={}", ex.parameter_names().join(","))?;
        for name in ex.parameter_names() {
            writeln!(out, "param.{}={}", name, ex.parameter_values(&name).join("|"))?;
        }
        Ok(())
    });
    app.add_mapping("echo", "/TestServlet").unwrap();
    app.add_mapping("echo", "/servlet/*").unwrap();
    container_with(app)
}

fn echo(request: ExchangeRequest) -> Vec<(String, String)> {
    let container = echo_container();
    let (_, response) = serve(&container, request);
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    String::from_utf8(response.body)
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn field<'a>(fields: &'a [(String, String)], key: &str) -> &'a str {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or_else(|| panic!("missing field {key}"))
}

#[test]
fn test_context_path_and_request_uri() {
    let fields = echo(ExchangeRequest::get("/test/TestServlet"));
    assert_eq!(field(&fields, "method"), "GET");
    assert_eq!(field(&fields, "uri"), "/test/TestServlet");
    assert_eq!(field(&fields, "context"), "/test");
    assert_eq!(field(&fields, "servlet"), "/TestServlet");
    assert_eq!(field(&fields, "info"), "null");
    assert_eq!(field(&fields, "protocol"), "HTTP/1.1");
}

#[test]
fn test_query_string() {
    let fields = echo(ExchangeRequest::get("/test/TestServlet?test=mytest"));
    assert_eq!(field(&fields, "query"), "test=mytest");
    assert_eq!(field(&fields, "param.test"), "mytest");

    let fields = echo(ExchangeRequest::get("/test/TestServlet"));
    assert_eq!(field(&fields, "query"), "null");
    assert_eq!(field(&fields, "params"), "");
}

#[test]
fn test_path_info_for_prefix_mapping() {
    let fields = echo(ExchangeRequest::get("/test/servlet/a/b"));
    assert_eq!(field(&fields, "servlet"), "/servlet");
    assert_eq!(field(&fields, "info"), "/a/b");
}

#[test]
fn test_character_encoding() {
    let fields = echo(
        ExchangeRequest::get("/test/TestServlet").header("Content-Type", "text/plain; charset=UTF-8"),
    );
    assert_eq!(field(&fields, "encoding"), "UTF-8");

    let fields = echo(
        ExchangeRequest::get("/test/TestServlet")
            .header("Content-Type", "text/plain;charset=\"ISO-8859-1\""),
    );
    assert_eq!(field(&fields, "encoding"), "ISO-8859-1");

    let fields = echo(ExchangeRequest::get("/test/TestServlet").header("Content-Type", "text/plain"));
    assert_eq!(field(&fields, "encoding"), "null");
}

#[test]
fn test_content_length() {
    let fields = echo(
        ExchangeRequest::new(Method::PUT, "/test/TestServlet")
            .header("Content-Length", "11")
            .body("hello world"),
    );
    assert_eq!(field(&fields, "length"), "11");

    let fields = echo(ExchangeRequest::get("/test/TestServlet"));
    assert_eq!(field(&fields, "length"), "null");
}

#[test]
fn test_form_post_parameters_follow_query() {
    let fields = echo(
        ExchangeRequest::new(Method::POST, "/test/TestServlet?a=1")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("a=2&b=hello+world"),
    );
    assert_eq!(field(&fields, "params"), "a,b");
    assert_eq!(field(&fields, "param.a"), "1|2");
    assert_eq!(field(&fields, "param.b"), "hello world");
}

#[test]
fn test_headers_are_case_insensitive() {
    let mut app = WebApplication::new("");
    app.mount("/h", |ex: &Exchange| -> anyhow::Result<()> {
        assert_eq!(ex.header("x-trace"), Some("one".to_string()));
        assert_eq!(ex.header_values("X-TRACE"), vec!["one", "two"]);
        assert!(ex.header_names().contains(&"x-trace".to_string()));
        assert_eq!(ex.header("missing"), None);
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(
        &container,
        ExchangeRequest::get("/h")
            .header("X-Trace", "one")
            .header("x-trace", "two"),
    );
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
}

#[test]
fn test_response_wire_format() {
    let mut app = WebApplication::new("");
    app.mount("/wire", |ex: &Exchange| -> anyhow::Result<()> {
        ex.set_status(201)?;
        ex.set_header("X-Custom", "a")?;
        ex.add_header("X-Custom", "b")?;
        ex.set_content_type("text/plain; charset=ISO-8859-1")?;
        write!(ex.writer()?, "caf\u{e9}")?;
        assert!(ex.is_committed());
        assert!(ex.set_header("X-Late", "nope").is_err());
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let buffer = SharedBuffer::new();
    let exchange = container.service(ExchangeRequest::get("/wire"), StreamSink::new(buffer.clone()));
    exchange.wait_closed();

    let raw = buffer.contents();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
    assert!(text.contains("x-custom: a\r\n"));
    assert!(text.contains("x-custom: b\r\n"));
    assert!(text.contains("content-type: text/plain; charset=ISO-8859-1\r\n"));
    assert!(raw.ends_with(b"\r\n\r\ncaf\xe9"));
}
