use super::async_context::{AsyncContext, AsyncListener};
use super::facade::{AsyncControl, RequestView, ResponseWriter};
use super::request::{charset_of, is_form_post, parse_parameters, split_target, ExchangeRequest};
use super::response::{BodyMode, BodyStream, ResponseState, TextWriter};
use super::sink::{ResponseSink, StreamSink};
use super::state::{DispatchState, OneShot};
use crate::dispatcher::Dispatcher;
use crate::error::{ContainerError, Result};
use crate::ids::ExchangeId;
use crate::webapp::WebApplication;
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use smallvec::SmallVec;
use std::fmt;
use std::io::{self, Read};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::{debug, error, info, info_span, warn, Span};

type Params = Arc<Vec<(String, String)>>;

/// What triggered a completion attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Completion {
    /// `AsyncContext::complete` of the given generation.
    Context(u64),
    /// `Exchange::force_complete`.
    Forced,
    /// The pipeline run of the given dispatch epoch returned; completes only
    /// a synchronous exchange that was not dispatched since.
    Pipeline(u32),
    /// The handler of the given dispatch epoch failed; the error response was
    /// already prepared.
    Failed(u32),
    /// The sink failed; nothing more is written.
    Aborted,
}

struct DispatchCore {
    state: DispatchState,
    generation: u64,
    context: Option<AsyncContext>,
    listeners: SmallVec<[Arc<dyn AsyncListener>; 4]>,
    target: String,
    query: Option<String>,
    servlet_path: String,
    path_info: Option<String>,
    wrapped_target: Option<(String, Option<String>)>,
    params: Option<Params>,
    dispatches: u32,
}

struct ExchangeInner {
    id: ExchangeId,
    method: Method,
    request_uri: String,
    original_target: String,
    original_query: Option<String>,
    protocol: String,
    headers: HeaderMap,
    body: Mutex<Option<Box<dyn Read + Send>>>,
    form_post: bool,
    form_params: OnceLock<Vec<(String, String)>>,
    context_path: String,
    application: Option<Arc<WebApplication>>,
    dispatcher: Dispatcher,
    async_supported: bool,
    core: Mutex<DispatchCore>,
    response: Mutex<ResponseState>,
    committed: OneShot,
    closed: OneShot,
    span: Span,
}

/// One request/response pair and its dispatch state machine.
///
/// `Exchange` is a cheap handle: clones share the same exchange, which is how
/// an [`AsyncContext`] and the dispatch coroutine reach it. Write access moves
/// with the dispatch state: the handler owns it while `SyncActive`, whoever
/// holds the [`AsyncContext`] while `AsyncStarted`, and the dispatch coroutine
/// after `dispatch`.
#[derive(Clone)]
pub struct Exchange {
    inner: Arc<ExchangeInner>,
}

/// Builder for an [`Exchange`].
pub struct ExchangeBuilder {
    request: ExchangeRequest,
    sink: Option<Box<dyn ResponseSink>>,
    application: Option<Arc<WebApplication>>,
    async_supported: Option<bool>,
    dispatcher: Option<Dispatcher>,
}

impl ExchangeBuilder {
    #[must_use]
    pub fn sink(mut self, sink: impl ResponseSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn boxed_sink(mut self, sink: Box<dyn ResponseSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Bind the exchange to an application unit: routing, context path and
    /// the async default come from it.
    #[must_use]
    pub fn application(mut self, application: Arc<WebApplication>) -> Self {
        self.application = Some(application);
        self
    }

    #[must_use]
    pub fn async_supported(mut self, supported: bool) -> Self {
        self.async_supported = Some(supported);
        self
    }

    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn build(self) -> Exchange {
        let ExchangeRequest {
            method,
            target,
            query,
            protocol,
            headers,
            body,
        } = self.request;
        let form_post = is_form_post(&method, &headers);
        let id = ExchangeId::from_header_or_new(
            headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        );
        let context_path = self
            .application
            .as_ref()
            .map(|app| app.context_path().to_string())
            .unwrap_or_default();
        let original_target = strip_context(&target, &context_path);
        let async_supported = self.async_supported.unwrap_or_else(|| {
            self.application
                .as_ref()
                .map(|app| app.is_async_supported())
                .unwrap_or(false)
        });
        let parent = self
            .application
            .as_ref()
            .map(|app| app.span().clone())
            .unwrap_or_else(Span::current);
        let span = info_span!(
            parent: &parent,
            "exchange",
            exchange_id = %id,
            method = %method,
            target = %target
        );

        Exchange {
            inner: Arc::new(ExchangeInner {
                id,
                method,
                request_uri: target,
                original_target: original_target.clone(),
                original_query: query.clone(),
                protocol,
                headers,
                body: Mutex::new(Some(body)),
                form_post,
                form_params: OnceLock::new(),
                context_path,
                application: self.application,
                dispatcher: self.dispatcher.unwrap_or_default(),
                async_supported,
                core: Mutex::new(DispatchCore {
                    state: DispatchState::SyncActive,
                    generation: 0,
                    context: None,
                    listeners: SmallVec::new(),
                    target: original_target,
                    query,
                    servlet_path: String::new(),
                    path_info: None,
                    wrapped_target: None,
                    params: None,
                    dispatches: 0,
                }),
                response: Mutex::new(ResponseState::new(
                    self.sink
                        .unwrap_or_else(|| Box::new(StreamSink::new(io::sink()))),
                )),
                committed: OneShot::default(),
                closed: OneShot::default(),
                span,
            }),
        }
    }
}

fn strip_context(target: &str, context_path: &str) -> String {
    let rest = if context_path.is_empty() {
        target
    } else {
        target.strip_prefix(context_path).unwrap_or(target)
    };
    if rest.is_empty() {
        "/".to_string()
    } else {
        rest.to_string()
    }
}

fn header_string(value: &HeaderValue) -> String {
    value
        .to_str()
        .map(str::to_string)
        .unwrap_or_else(|_| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

fn committed_error() -> ContainerError {
    ContainerError::illegal_state("response already committed")
}

impl Exchange {
    /// Unbound exchange writing to `sink`.
    pub fn new(request: ExchangeRequest, sink: impl ResponseSink + 'static) -> Self {
        Self::builder(request).sink(sink).build()
    }

    pub fn builder(request: ExchangeRequest) -> ExchangeBuilder {
        ExchangeBuilder {
            request,
            sink: None,
            application: None,
            async_supported: None,
            dispatcher: None,
        }
    }

    fn core(&self) -> MutexGuard<'_, DispatchCore> {
        self.inner.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn response(&self) -> MutexGuard<'_, ResponseState> {
        self.inner.response.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.inner.id
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        self.core().state
    }

    #[must_use]
    pub fn application(&self) -> Option<&Arc<WebApplication>> {
        self.inner.application.as_ref()
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.inner.span
    }

    #[must_use]
    pub fn servlet_path(&self) -> String {
        self.core().servlet_path.clone()
    }

    #[must_use]
    pub fn path_info(&self) -> Option<String> {
        self.core().path_info.clone()
    }

    /// Number of async dispatches this exchange went through.
    #[must_use]
    pub fn dispatch_count(&self) -> u32 {
        self.core().dispatches
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.response().bytes_written
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_fired()
    }

    /// Block until the response is committed. Returns at once afterwards.
    pub fn wait_committed(&self) {
        self.inner.committed.wait();
    }

    /// Block until the exchange reached `Closed`.
    pub fn wait_closed(&self) {
        self.inner.closed.wait();
    }

    /// Read the remaining request body. Empty once consumed, including by
    /// form parameter parsing.
    pub fn read_body(&self) -> io::Result<Vec<u8>> {
        let body = self
            .inner
            .body
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let mut bytes = Vec::new();
        if let Some(mut body) = body {
            body.read_to_end(&mut bytes)?;
        }
        Ok(bytes)
    }

    /// Register a lifecycle listener. Fails once the exchange is terminal.
    pub fn add_listener(&self, listener: Arc<dyn AsyncListener>) -> Result<()> {
        let mut core = self.core();
        if core.state.is_terminal() {
            return Err(ContainerError::illegal_state(
                "cannot add a listener to a completed exchange",
            ));
        }
        core.listeners.push(listener);
        Ok(())
    }

    /// Replace the pending response with an empty error response and commit
    /// it. Fails once the status line is on the wire.
    pub fn send_error(&self, status: u16) -> Result<()> {
        let status = parse_status(status)?;
        let result = {
            let mut resp = self.response();
            if resp.closed || resp.status_line_written {
                return Err(committed_error());
            }
            resp.status = status;
            resp.headers.clear();
            resp.headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
            resp.write_head(&self.inner.protocol)
        };
        self.after_head_write(result)
    }

    /// Terminate the exchange from the container side (timeouts, shutdown).
    ///
    /// Follows the same contract as `AsyncContext::complete`; fails with
    /// `IllegalState` when the exchange is already terminal.
    pub fn force_complete(&self) -> Result<()> {
        self.finalize(Completion::Forced, None)
    }

    pub(crate) fn is_context_current(&self, generation: u64) -> bool {
        let core = self.core();
        core.state == DispatchState::AsyncStarted && core.generation == generation
    }

    pub(crate) fn current_target(&self) -> String {
        self.core().target.clone()
    }

    pub(crate) fn set_mapping(&self, servlet_path: String, path_info: Option<String>) {
        let mut core = self.core();
        core.servlet_path = servlet_path;
        core.path_info = path_info;
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Move a dispatched exchange back to `SyncActive` for the dispatched
    /// pipeline. `false` when it was completed in the meantime.
    pub(crate) fn begin_dispatch(&self) -> bool {
        let mut core = self.core();
        if core.state != DispatchState::AsyncDispatched {
            return false;
        }
        core.state = DispatchState::SyncActive;
        core.servlet_path.clear();
        core.path_info = None;
        true
    }

    pub(crate) fn dispatch_from(&self, generation: u64, path: Option<&str>) -> Result<()> {
        let (target, query) = {
            let mut core = self.core();
            if core.state != DispatchState::AsyncStarted || core.generation != generation {
                return Err(ContainerError::illegal_state(format!(
                    "dispatch() not allowed: async context already {}",
                    match core.state {
                        DispatchState::AsyncDispatched | DispatchState::SyncActive => "dispatched",
                        DispatchState::AsyncCompleted | DispatchState::Closed => "completed",
                        DispatchState::AsyncStarted => "superseded",
                    }
                )));
            }
            let (target, query) = match path {
                Some(path) => {
                    let (target, query) = split_target(path);
                    (target, query.or_else(|| core.query.clone()))
                }
                None => core.wrapped_target.take().unwrap_or_else(|| {
                    (
                        self.inner.original_target.clone(),
                        self.inner.original_query.clone(),
                    )
                }),
            };
            core.state = DispatchState::AsyncDispatched;
            core.context = None;
            core.target = target.clone();
            if core.query != query {
                core.params = None;
            }
            core.query = query.clone();
            core.dispatches += 1;
            (target, query)
        };
        debug!(
            parent: &self.inner.span,
            target = %target,
            query = ?query,
            "Async dispatch scheduled"
        );
        self.inner.dispatcher.schedule(self.clone());
        Ok(())
    }

    fn start_async_inner(&self, wrapped_target: Option<(String, Option<String>)>) -> Result<AsyncContext> {
        if !self.inner.async_supported {
            return Err(ContainerError::illegal_state(
                "asynchronous processing is not supported by this exchange",
            ));
        }
        let wrapped = wrapped_target.is_some();
        let (context, listeners) = {
            let mut core = self.core();
            match core.state {
                DispatchState::SyncActive => {
                    core.generation += 1;
                    let context = AsyncContext::new(self.clone(), core.generation, wrapped);
                    core.state = DispatchState::AsyncStarted;
                    core.context = Some(context.clone());
                    core.wrapped_target = wrapped_target;
                    (context, core.listeners.clone())
                }
                DispatchState::AsyncStarted => {
                    return core.context.clone().ok_or_else(|| {
                        ContainerError::illegal_state("async context missing for a started exchange")
                    });
                }
                DispatchState::AsyncDispatched => {
                    return Err(ContainerError::illegal_state(
                        "start_async() not allowed while a dispatch is pending",
                    ));
                }
                state => {
                    return Err(ContainerError::illegal_state(format!(
                        "start_async() not allowed in state {state:?}"
                    )));
                }
            }
        };
        for listener in &listeners {
            self.notify(|| listener.on_start_async(self));
        }
        debug!(parent: &self.inner.span, wrapped, "Async started");
        Ok(context)
    }

    /// Whether a pipeline run started at dispatch `epoch` still owns the
    /// exchange.
    pub(crate) fn is_pipeline_current(&self, epoch: u32) -> bool {
        self.core().dispatches == epoch
    }

    /// End of the pipeline run started at dispatch `epoch`: complete a
    /// synchronous exchange. A run that dispatched meanwhile handed the
    /// exchange to the dispatched pipeline and leaves it alone.
    pub(crate) fn finish_service(&self, epoch: u32) -> Result<()> {
        self.finalize(Completion::Pipeline(epoch), None)
    }

    /// The handler of the pipeline run started at dispatch `epoch` failed:
    /// answer with the error status if still possible, then terminate the
    /// exchange.
    pub(crate) fn fail(&self, err: ContainerError, epoch: u32) -> Result<()> {
        if !self.is_pipeline_current(epoch) {
            warn!(
                parent: &self.inner.span,
                error = %err,
                "Handler failed after dispatching, dispatched pipeline keeps the exchange"
            );
            return Ok(());
        }
        error!(parent: &self.inner.span, error = %err, "Handler failed");
        if !ResponseWriter::is_committed(self) {
            if let Err(e) = self.send_error(err.status_code()) {
                debug!(parent: &self.inner.span, error = %e, "Could not send error response");
            }
        }
        self.finalize(Completion::Failed(epoch), Some(err))
    }

    pub(crate) fn finalize(&self, how: Completion, cause: Option<ContainerError>) -> Result<()> {
        let listeners = {
            let mut core = self.core();
            let state = core.state;
            let allowed = if state.is_terminal() {
                false
            } else {
                match how {
                    Completion::Context(generation) => {
                        state == DispatchState::AsyncStarted && core.generation == generation
                    }
                    Completion::Pipeline(epoch) => {
                        if state != DispatchState::SyncActive || core.dispatches != epoch {
                            // async work or a later dispatch owns the exchange
                            return Ok(());
                        }
                        true
                    }
                    Completion::Failed(epoch) => core.dispatches == epoch,
                    Completion::Forced | Completion::Aborted => true,
                }
            };
            if !allowed {
                return match how {
                    Completion::Pipeline(_) | Completion::Failed(_) | Completion::Aborted => Ok(()),
                    Completion::Context(_) => Err(ContainerError::illegal_state(format!(
                        "complete() not allowed: exchange is {state:?}"
                    ))),
                    Completion::Forced => Err(ContainerError::illegal_state(
                        "exchange already completed",
                    )),
                };
            }
            core.state = DispatchState::AsyncCompleted;
            core.context = None;
            std::mem::take(&mut core.listeners)
        };

        let mut failure = cause;
        if !matches!(how, Completion::Aborted) {
            if let Err(e) = self.commit_and_flush() {
                error!(parent: &self.inner.span, error = %e, "Failed to flush response");
                failure.get_or_insert(ContainerError::Io(e));
            }
        }
        if let Some(err) = &failure {
            for listener in &listeners {
                self.notify(|| listener.on_error(self, err));
            }
        }
        for listener in &listeners {
            self.notify(|| listener.on_complete(self));
        }

        let (status, bytes) = {
            let mut resp = self.response();
            if let Err(e) = resp.close() {
                warn!(parent: &self.inner.span, error = %e, "Failed to close response sink");
            }
            (resp.status.as_u16(), resp.bytes_written)
        };
        self.core().state = DispatchState::Closed;
        self.inner.committed.fire();
        self.inner.closed.fire();
        info!(
            parent: &self.inner.span,
            status,
            bytes,
            trigger = ?how,
            failed = failure.is_some(),
            "Exchange completed"
        );
        Ok(())
    }

    fn notify(&self, call: impl FnOnce()) {
        if catch_unwind(AssertUnwindSafe(call)).is_err() {
            warn!(parent: &self.inner.span, "Async listener panicked");
        }
    }

    fn commit_and_flush(&self) -> io::Result<()> {
        let committed = {
            let mut resp = self.response();
            if resp.closed {
                return Ok(());
            }
            let committed = resp.write_head(&self.inner.protocol)?;
            resp.flush()?;
            committed
        };
        if committed {
            self.inner.committed.fire();
        }
        Ok(())
    }

    fn after_head_write(&self, result: io::Result<bool>) -> Result<()> {
        match result {
            Ok(committed) => {
                if committed {
                    self.inner.committed.fire();
                }
                Ok(())
            }
            Err(e) => {
                self.io_failure(&e);
                Err(e.into())
            }
        }
    }

    fn io_failure(&self, e: &io::Error) {
        if e.kind() == io::ErrorKind::BrokenPipe && self.response().closed {
            return;
        }
        error!(parent: &self.inner.span, error = %e, "Response I/O failed, closing exchange");
        let cause = ContainerError::Io(io::Error::new(e.kind(), e.to_string()));
        if let Err(err) = self.finalize(Completion::Aborted, Some(cause)) {
            debug!(parent: &self.inner.span, error = %err, "Exchange already terminated");
        }
    }

    pub(crate) fn write_body(&self, bytes: &[u8]) -> io::Result<()> {
        let result = self.response().write_body(&self.inner.protocol, bytes);
        match result {
            Ok(committed) => {
                if committed {
                    self.inner.committed.fire();
                }
                Ok(())
            }
            Err(e) => {
                self.io_failure(&e);
                Err(e)
            }
        }
    }

    pub(crate) fn flush_body(&self) -> io::Result<()> {
        let result = self.response().flush();
        if let Err(e) = &result {
            self.io_failure(e);
        }
        result
    }

    fn form_parameters(&self) -> &[(String, String)] {
        self.inner.form_params.get_or_init(|| {
            if !self.inner.form_post {
                return Vec::new();
            }
            match self.read_body() {
                Ok(body) => parse_parameters(None, Some(&body)),
                Err(e) => {
                    warn!(parent: &self.inner.span, error = %e, "Failed to read form body");
                    Vec::new()
                }
            }
        })
    }

    fn parameters(&self) -> Params {
        let query = {
            let core = self.core();
            if let Some(params) = &core.params {
                return Arc::clone(params);
            }
            core.query.clone()
        };
        let mut params = parse_parameters(query.as_deref(), None);
        params.extend_from_slice(self.form_parameters());
        let params = Arc::new(params);
        let mut core = self.core();
        if core.query == query {
            core.params = Some(Arc::clone(&params));
        }
        params
    }

    fn mutate_headers(&self, name: &str, value: &str, replace: bool) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ContainerError::illegal_state(format!("invalid header name '{name}'")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| ContainerError::illegal_state(format!("invalid value for header '{name}'")))?;
        let mut resp = self.response();
        if resp.headers_written || resp.closed {
            return Err(committed_error());
        }
        if replace {
            resp.headers.insert(name, value);
        } else {
            resp.headers.append(name, value);
        }
        Ok(())
    }

    fn body_access(&self, mode: BodyMode) -> Result<()> {
        if self.state().is_terminal() {
            return Err(ContainerError::illegal_state("exchange already completed"));
        }
        let mut resp = self.response();
        if resp.closed {
            return Err(ContainerError::illegal_state("response already closed"));
        }
        match resp.body_mode {
            BodyMode::Unset if resp.headers_written => Err(committed_error()),
            BodyMode::Unset => {
                resp.body_mode = mode;
                Ok(())
            }
            current if current == mode => Ok(()),
            _ => Err(ContainerError::illegal_state(
                "output_stream() and writer() are mutually exclusive",
            )),
        }
    }
}

fn parse_status(status: u16) -> Result<StatusCode> {
    StatusCode::from_u16(status)
        .map_err(|_| ContainerError::illegal_state(format!("invalid status code {status}")))
}

impl RequestView for Exchange {
    fn method(&self) -> Method {
        self.inner.method.clone()
    }

    fn request_uri(&self) -> String {
        self.inner.request_uri.clone()
    }

    fn target_path(&self) -> String {
        self.current_target()
    }

    fn query_string(&self) -> Option<String> {
        self.core().query.clone()
    }

    fn protocol(&self) -> String {
        self.inner.protocol.clone()
    }

    fn context_path(&self) -> String {
        self.inner.context_path.clone()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.inner.headers.get(name).map(header_string)
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.inner.headers.get_all(name).iter().map(header_string).collect()
    }

    fn header_names(&self) -> Vec<String> {
        self.inner.headers.keys().map(|k| k.as_str().to_string()).collect()
    }

    fn parameter(&self, name: &str) -> Option<String> {
        self.parameters()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    fn parameter_values(&self, name: &str) -> Vec<String> {
        self.parameters()
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .collect()
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (k, _) in self.parameters().iter() {
            if !names.contains(k) {
                names.push(k.clone());
            }
        }
        names
    }
}

impl ResponseWriter for Exchange {
    fn status(&self) -> u16 {
        self.response().status.as_u16()
    }

    fn set_status(&self, status: u16) -> Result<()> {
        let status = parse_status(status)?;
        let mut resp = self.response();
        if resp.status_line_written || resp.closed {
            return Err(committed_error());
        }
        resp.status = status;
        Ok(())
    }

    fn set_header(&self, name: &str, value: &str) -> Result<()> {
        self.mutate_headers(name, value, true)
    }

    fn add_header(&self, name: &str, value: &str) -> Result<()> {
        self.mutate_headers(name, value, false)
    }

    fn response_header(&self, name: &str) -> Option<String> {
        self.response().headers.get(name).map(header_string)
    }

    fn write_status_line(&self) -> Result<()> {
        let result = {
            let mut resp = self.response();
            if resp.headers_written || resp.closed {
                return Err(committed_error());
            }
            resp.write_status_line(&self.inner.protocol)
        };
        result.map_err(|e| {
            self.io_failure(&e);
            e.into()
        })
    }

    fn write_headers(&self) -> Result<()> {
        let result = {
            let mut resp = self.response();
            if resp.headers_written || resp.closed {
                return Err(committed_error());
            }
            resp.write_head(&self.inner.protocol)
        };
        self.after_head_write(result)
    }

    fn output_stream(&self) -> Result<BodyStream> {
        self.body_access(BodyMode::Stream)?;
        Ok(BodyStream::new(self.clone()))
    }

    fn writer(&self) -> Result<TextWriter> {
        self.body_access(BodyMode::Writer)?;
        let charset = self
            .response()
            .headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_of);
        Ok(TextWriter::new(self.clone(), charset.as_deref()))
    }

    fn is_committed(&self) -> bool {
        self.inner.committed.is_fired()
    }
}

impl AsyncControl for Exchange {
    fn is_async_supported(&self) -> bool {
        self.inner.async_supported
    }

    fn is_async_started(&self) -> bool {
        self.core().state == DispatchState::AsyncStarted
    }

    fn start_async(&self) -> Result<AsyncContext> {
        self.start_async_inner(None)
    }

    fn start_async_with(&self, request: &dyn RequestView, response: &dyn ResponseWriter) -> Result<AsyncContext> {
        let wrapped = request.is_wrapper() || response.is_wrapper();
        let target = wrapped.then(|| (request.target_path(), request.query_string()));
        self.start_async_inner(target)
    }

    fn async_context(&self) -> Result<AsyncContext> {
        let core = self.core();
        match (&core.state, &core.context) {
            (DispatchState::AsyncStarted, Some(context)) => Ok(context.clone()),
            _ => Err(ContainerError::illegal_state("async processing was not started")),
        }
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("request_uri", &self.inner.request_uri)
            .field("state", &self.state())
            .field("committed", &self.inner.committed.is_fired())
            .finish()
    }
}
