//! Tests for the async dispatch state machine
//!
//! # Test Coverage
//!
//! - `start_async` + `dispatch`/`dispatch_to` an unmapped target ends in a 404
//! - The dispatching handler returning does not close the dispatched pipeline
//! - One-shot `dispatch`/`complete` contract on an `AsyncContext`
//! - Listener ordering, `on_error` before `on_complete`, exactly-once firing
//! - Re-entrant `start_async` from a dispatched pipeline
//! - Wrapped request targets for `dispatch()`
//! - Completion from another thread and container-side `force_complete`

mod common;

use brrtcontainer::exchange::prelude::*;
use brrtcontainer::exchange::{
    CapturedSink, DispatchState, Exchange, ExchangeRequest, RequestWrapper, ResponseWrapper,
    SharedBuffer, StreamSink,
};
use brrtcontainer::webapp::WebApplication;
use common::{container_with, entries, new_log, serve, RecordingListener};
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

fn async_app(context: &str) -> WebApplication {
    WebApplication::new(context).with_async_supported(true)
}

#[test]
fn test_dispatch_to_unmapped_target_is_404() {
    let mut app = async_app("/test");
    app.mount("/start", |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        ctx.dispatch_to("/nonexistent")?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let sink = CapturedSink::new();
    let exchange = container.service(ExchangeRequest::get("/test/start"), sink.clone());
    exchange.wait_committed();
    exchange.wait_closed();

    let response = sink.snapshot();
    assert_eq!(response.status.map(|s| s.as_u16()), Some(404));
    assert!(response.closed);
    assert_eq!(exchange.dispatch_count(), 1);
    assert_eq!(exchange.state(), DispatchState::Closed);
}

#[test]
fn test_plain_dispatch_without_handler_is_404() {
    let buffer = SharedBuffer::new();
    let exchange = Exchange::builder(ExchangeRequest::get("/test/anything"))
        .sink(StreamSink::new(buffer.clone()))
        .async_supported(true)
        .build();

    exchange.start_async().unwrap().dispatch().unwrap();
    exchange.wait_committed();
    exchange.wait_closed();

    let wire = buffer.to_string_lossy();
    assert!(wire.starts_with("HTTP/1.1 404"), "{wire}");
    assert_eq!(wire, "HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\n\r\n");
}

#[test]
fn test_dispatcher_return_keeps_dispatched_pipeline_open() {
    let late_write: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&late_write);

    let mut app = async_app("");
    app.mount("/a", |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        ctx.dispatch_to("/b")?;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    })
    .unwrap();
    app.mount("/b", move |ex: &Exchange| -> anyhow::Result<()> {
        let mut out = ex.writer()?;
        write!(out, "B-start")?;
        thread::sleep(Duration::from_millis(300));
        *slot.lock().unwrap() = Some(write!(out, "B-end").is_ok());
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, response) = serve(&container, ExchangeRequest::get("/a"));
    assert_eq!(*late_write.lock().unwrap(), Some(true));
    assert_eq!(response.body, b"B-startB-end");
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    assert_eq!(exchange.dispatch_count(), 1);
}

#[test]
fn test_dispatcher_failure_keeps_dispatched_pipeline_open() {
    let mut app = async_app("");
    app.mount("/a", |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        ctx.dispatch_to("/b")?;
        thread::sleep(Duration::from_millis(50));
        anyhow::bail!("cleanup failed after dispatch")
    })
    .unwrap();
    app.mount("/b", |ex: &Exchange| -> anyhow::Result<()> {
        thread::sleep(Duration::from_millis(150));
        write!(ex.writer()?, "from b")?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(&container, ExchangeRequest::get("/a"));
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    assert_eq!(response.body, b"from b");
}

#[test]
fn test_second_dispatch_is_illegal_state() {
    let second: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&second);

    let mut app = async_app("");
    app.mount("/start", move |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        ctx.dispatch_to("/done")?;
        let err = ctx.dispatch_to("/done").unwrap_err();
        *slot.lock().unwrap() = Some(err.is_illegal_state());
        Ok(())
    })
    .unwrap();
    app.mount("/done", |ex: &Exchange| -> anyhow::Result<()> {
        write!(ex.writer()?, "done")?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, response) = serve(&container, ExchangeRequest::get("/start"));
    assert_eq!(*second.lock().unwrap(), Some(true));
    assert_eq!(response.body, b"done");
    assert_eq!(exchange.dispatch_count(), 1);
}

#[test]
fn test_complete_twice_fires_listeners_once() {
    let log = new_log();
    let second: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&second);
    let listener_log = Arc::clone(&log);

    let mut app = async_app("");
    app.mount("/twice", move |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        ctx.add_listener(RecordingListener::new("a", &listener_log))?;
        ctx.complete()?;
        *slot.lock().unwrap() = Some(ctx.complete().unwrap_err().is_illegal_state());
        assert!(!ctx.is_active());
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(&container, ExchangeRequest::get("/twice"));
    assert_eq!(response.status.map(|s| s.as_u16()), Some(200));
    assert_eq!(*second.lock().unwrap(), Some(true));
    assert_eq!(entries(&log), vec!["a:complete"]);
}

#[test]
fn test_listeners_fire_in_registration_order() {
    let log = new_log();
    let listener_log = Arc::clone(&log);

    let mut app = async_app("");
    app.mount("/ordered", move |ex: &Exchange| -> anyhow::Result<()> {
        ex.add_listener(RecordingListener::new("a", &listener_log))?;
        ex.add_listener(RecordingListener::new("b", &listener_log))?;
        let ctx = ex.start_async()?;
        ctx.complete()?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    serve(&container, ExchangeRequest::get("/ordered"));
    assert_eq!(
        entries(&log),
        vec!["a:start", "b:start", "a:complete", "b:complete"]
    );
}

#[test]
fn test_handler_failure_fires_error_before_complete() {
    let log = new_log();
    let listener_log = Arc::clone(&log);

    let mut app = async_app("");
    app.mount("/fail", move |ex: &Exchange| -> anyhow::Result<()> {
        ex.start_async()?;
        ex.add_listener(RecordingListener::new("a", &listener_log))?;
        ex.add_listener(RecordingListener::new("b", &listener_log))?;
        anyhow::bail!("backend unavailable")
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, response) = serve(&container, ExchangeRequest::get("/fail"));
    assert_eq!(response.status.map(|s| s.as_u16()), Some(500));
    assert_eq!(
        entries(&log),
        vec!["a:error", "b:error", "a:complete", "b:complete"]
    );
    assert!(exchange.add_listener(RecordingListener::new("late", &log)).is_err());
}

#[test]
fn test_panicking_listener_does_not_block_others() {
    let log = new_log();
    let listener_log = Arc::clone(&log);

    let mut app = async_app("");
    app.mount("/panic", move |ex: &Exchange| -> anyhow::Result<()> {
        ex.add_listener(Arc::new(|_: &Exchange| panic!("listener bug")))?;
        ex.add_listener(RecordingListener::new("ok", &listener_log))?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, _) = serve(&container, ExchangeRequest::get("/panic"));
    assert!(exchange.is_closed());
    assert_eq!(entries(&log), vec!["ok:complete"]);
}

#[test]
fn test_restart_async_from_dispatched_pipeline() {
    let first_active: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&first_active);
    let first: Arc<Mutex<Option<brrtcontainer::AsyncContext>>> = Arc::new(Mutex::new(None));
    let first_slot = Arc::clone(&first);

    let mut app = async_app("");
    app.mount("/a", move |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        *first_slot.lock().unwrap() = Some(ctx.clone());
        ctx.dispatch_to("/b")?;
        Ok(())
    })
    .unwrap();
    app.mount("/b", move |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        if let Some(old) = first.lock().unwrap().as_ref() {
            *slot.lock().unwrap() = Some(old.is_active());
        }
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            let _ = write!(ctx.exchange().writer().unwrap(), "late");
            ctx.complete().unwrap();
        });
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, response) = serve(&container, ExchangeRequest::get("/a"));
    assert_eq!(response.body, b"late");
    assert_eq!(*first_active.lock().unwrap(), Some(false));
    assert_eq!(exchange.dispatch_count(), 1);
}

#[test]
fn test_dispatch_uses_wrapped_target() {
    let mut app = async_app("/ctx");
    app.mount("/orig", |ex: &Exchange| -> anyhow::Result<()> {
        let request = RequestWrapper::new(ex)
            .with_target("/wrapped")
            .with_query(Some("mode=wrapped".to_string()));
        let response = ResponseWrapper::new(ex);
        let ctx = ex.start_async_with(&request, &response)?;
        assert!(!ctx.has_original_request_and_response());
        ctx.dispatch()?;
        Ok(())
    })
    .unwrap();
    app.mount("/wrapped", |ex: &Exchange| -> anyhow::Result<()> {
        let mode = ex.parameter("mode").unwrap_or_default();
        write!(ex.writer()?, "{} {}", ex.target_path(), mode)?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(&container, ExchangeRequest::get("/ctx/orig?mode=plain"));
    assert_eq!(response.body, b"/wrapped wrapped");
}

#[test]
fn test_plain_dispatch_reruns_original_target() {
    let runs = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&runs);

    let mut app = async_app("");
    app.mount("/again", move |ex: &Exchange| -> anyhow::Result<()> {
        let mut runs = counter.lock().unwrap();
        *runs += 1;
        if *runs == 1 {
            ex.start_async()?.dispatch()?;
        } else {
            write!(ex.writer()?, "run {} q={}", *runs, ex.query_string().unwrap_or_default())?;
        }
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(&container, ExchangeRequest::get("/again?x=1"));
    assert_eq!(response.body, b"run 2 q=x=1");
}

#[test]
fn test_complete_from_another_thread() {
    let mut app = async_app("");
    app.mount("/worker", |ex: &Exchange| -> anyhow::Result<()> {
        let ctx = ex.start_async()?;
        thread::spawn(move || {
            let exchange = ctx.exchange();
            exchange.set_status(202).unwrap();
            exchange.set_content_type("text/plain").unwrap();
            let _ = write!(exchange.writer().unwrap(), "accepted");
            ctx.complete().unwrap();
        });
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, response) = serve(&container, ExchangeRequest::get("/worker"));
    assert_eq!(response.status.map(|s| s.as_u16()), Some(202));
    assert_eq!(response.body, b"accepted");
    assert_eq!(exchange.bytes_written(), 8);
}

#[test]
fn test_force_complete_releases_abandoned_exchange() {
    let log = new_log();
    let listener_log = Arc::clone(&log);

    let mut app = async_app("");
    app.mount("/abandoned", move |ex: &Exchange| -> anyhow::Result<()> {
        ex.start_async()?;
        ex.add_listener(RecordingListener::new("a", &listener_log))?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let sink = CapturedSink::new();
    let exchange = container.service(ExchangeRequest::get("/abandoned"), sink.clone());
    assert_eq!(exchange.state(), DispatchState::AsyncStarted);
    assert!(!exchange.is_closed());

    exchange.force_complete().unwrap();
    exchange.wait_closed();
    assert!(exchange.force_complete().unwrap_err().is_illegal_state());
    assert!(exchange.async_context().is_err());
    assert_eq!(entries(&log), vec!["a:complete"]);
    assert!(sink.snapshot().closed);
}

#[test]
fn test_start_async_unsupported() {
    let mut app = WebApplication::new("");
    app.mount("/sync", |ex: &Exchange| -> anyhow::Result<()> {
        assert!(!ex.is_async_supported());
        ex.start_async()?;
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (_, response) = serve(&container, ExchangeRequest::get("/sync"));
    assert_eq!(response.status.map(|s| s.as_u16()), Some(500));
}

#[test]
fn test_start_async_twice_returns_same_context() {
    let mut app = async_app("");
    app.mount("/same", |ex: &Exchange| -> anyhow::Result<()> {
        let first = ex.start_async()?;
        let second = ex.start_async()?;
        assert!(first.is_active() && second.is_active());
        second.complete()?;
        assert!(!first.is_active());
        Ok(())
    })
    .unwrap();
    let container = container_with(app);

    let (exchange, _) = serve(&container, ExchangeRequest::get("/same"));
    assert_eq!(exchange.state(), DispatchState::Closed);
}
