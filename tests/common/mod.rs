#![allow(dead_code)]

use brrtcontainer::container::Container;
use brrtcontainer::exchange::{
    AsyncListener, CapturedResponse, CapturedSink, Exchange, ExchangeRequest,
};
use brrtcontainer::webapp::WebApplication;
use brrtcontainer::ContainerError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Deploy `app` into a fresh container.
pub fn container_with(app: WebApplication) -> Container {
    let container = Container::default();
    container.deploy(app).unwrap();
    container
}

/// Run `request` through `container` and wait until the exchange closes.
pub fn serve(container: &Container, request: ExchangeRequest) -> (Exchange, CapturedResponse) {
    let sink = CapturedSink::new();
    let exchange = container.service(request, sink.clone());
    exchange.wait_closed();
    (exchange, sink.snapshot())
}

/// Listener that records every callback as `"<tag>:<event>"`.
pub struct RecordingListener {
    tag: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn new(tag: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            tag: tag.to_string(),
            log: Arc::clone(log),
        })
    }

    fn record(&self, event: &str) {
        self.log.lock().unwrap().push(format!("{}:{}", self.tag, event));
    }
}

impl AsyncListener for RecordingListener {
    fn on_start_async(&self, _exchange: &Exchange) {
        self.record("start");
    }

    fn on_complete(&self, _exchange: &Exchange) {
        self.record("complete");
    }

    fn on_error(&self, _exchange: &Exchange, _error: &ContainerError) {
        self.record("error");
    }
}

pub fn new_log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Write a zip archive at `dir/name` holding `entries`.
pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
    use zip::write::SimpleFileOptions;

    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (entry, data) in entries {
        writer
            .start_file(*entry, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}
