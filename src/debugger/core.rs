use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::debugger::breakpoint::BreakpointStore;
use crate::debugger::error::{
    DebugError, DebugResult, MSG_BREAKPOINT_FAILED, MSG_CONNECT_FAILED, MSG_CONTINUE_FAILED,
    MSG_INVALID_BREAKPOINT,
};
use crate::debugger::variables::{DisplayUpdate, ResolvedRow};
use crate::platform::callback::{CallbackServer, HitHandler};
use crate::platform::simulator::{Simulator, SimulatorClient};

/// Receives the variable table after every breakpoint hit.
///
/// Called from the callback listener thread, not the thread that issued
/// `continue`.
pub trait DisplayPublisher: Send + Sync {
    fn publish_update(&self, update: DisplayUpdate);
}

/// Receives short user-facing messages
pub trait MessageSink: Send + Sync {
    fn report_message(&self, text: &str);
}

/// What a session hands to its front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Update(DisplayUpdate),
    Message(String),
}

// A closed channel means the front end is gone; publishing is then a no-op.
impl<T> DisplayPublisher for mpsc::Sender<T>
where
    T: From<SessionEvent> + Send,
{
    fn publish_update(&self, update: DisplayUpdate) {
        if self.send(SessionEvent::Update(update).into()).is_err() {
            debug!("Display update dropped, front end closed");
        }
    }
}

impl<T> MessageSink for mpsc::Sender<T>
where
    T: From<SessionEvent> + Send,
{
    fn report_message(&self, text: &str) {
        if self.send(SessionEvent::Message(text.to_string()).into()).is_err() {
            debug!("Message dropped, front end closed: {}", text);
        }
    }
}

/// Connection settings of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Host the simulator listens on
    pub simulator_host: String,
    pub simulator_port: u16,
    /// Interface the callback listener binds to
    pub callback_bind: String,
    /// 0 picks an ephemeral port
    pub callback_port: u16,
    /// Host sent to the simulator in `/connect`
    pub advertise_host: String,
    /// Bound on every outbound request
    pub request_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulator_host: "localhost".to_string(),
            simulator_port: 8888,
            callback_bind: "0.0.0.0".to_string(),
            callback_port: 8889,
            advertise_host: "0.0.0.0".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of the session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub host: String,
    pub port: u16,
    pub callback_port: u16,
    /// Outcome of the last `/connect`
    pub connected: bool,
}

/// State shared between the command path and the callback listener
struct SessionCore {
    store: Arc<BreakpointStore>,
    simulator: Arc<dyn Simulator>,
    publisher: Arc<dyn DisplayPublisher>,
    sink: Arc<dyn MessageSink>,
    active: AtomicBool,
    connected: AtomicBool,
}

impl SessionCore {
    fn resolve(&self, statement_id: i64) -> DisplayUpdate {
        let start = Instant::now();

        let bindings = match self.store.list_variables(statement_id) {
            Ok(bindings) => bindings,
            Err(err) => {
                error!("Reading variables of statement {} failed: {}", statement_id, err);
                Vec::new()
            }
        };

        let rows: Vec<ResolvedRow> = bindings
            .iter()
            .map(|binding| {
                let handle = binding.handle();
                let value = self.simulator.fetch_value(&handle);
                if value.is_error() {
                    debug!("No value for {} ({})", handle, binding.display_name);
                }
                ResolvedRow::new(binding.display_name.clone(), value)
            })
            .collect();

        let location = match self.store.lookup_breakpoint(statement_id) {
            Ok(bp) => bp.location(),
            Err(err) => {
                warn!("{}", err);
                format!("<unknown statement {}>", statement_id)
            }
        };

        let update = DisplayUpdate {
            statement_id,
            location,
            rows,
        };
        debug!(
            "Resolved {} variables at {} in {:.2?} ({} errors)",
            update.rows.len(),
            update.location,
            start.elapsed(),
            update.error_count()
        );
        update
    }

    fn connect(&self, host: &str, port: u16) -> DebugResult<()> {
        let result = self.simulator.connect(host, port);
        self.connected.store(result.is_ok(), Ordering::SeqCst);
        match &result {
            Ok(()) => info!("Connected to simulator, callbacks go to {}:{}", host, port),
            Err(_) => self.sink.report_message(MSG_CONNECT_FAILED),
        }
        result
    }
}

impl HitHandler for SessionCore {
    fn on_hit(&self, statement_id: i64) {
        if !self.active.load(Ordering::SeqCst) {
            debug!("Ignoring hit at statement {} after teardown", statement_id);
            return;
        }

        let update = self.resolve(statement_id);

        if self.active.load(Ordering::SeqCst) {
            self.publisher.publish_update(update);
        }
    }
}

/// A debugging session against one simulator.
///
/// Construction starts the callback listener and then announces it to the
/// simulator; [`DebugSession::stop`] (or drop) shuts the listener down.
pub struct DebugSession {
    core: Arc<SessionCore>,
    server: CallbackServer,
    host: String,
    port: u16,
    advertise_host: String,
}

impl DebugSession {
    /// Start a session talking HTTP to the configured simulator
    pub fn start(
        config: &SessionConfig,
        store: Arc<BreakpointStore>,
        publisher: Arc<dyn DisplayPublisher>,
        sink: Arc<dyn MessageSink>,
    ) -> DebugResult<Self> {
        let simulator = SimulatorClient::new(
            &config.simulator_host,
            config.simulator_port,
            config.request_timeout,
        );
        debug!(
            "Simulator client for {} ({:?} timeout)",
            simulator.base_url(),
            config.request_timeout
        );
        Self::with_simulator(config, store, Arc::new(simulator), publisher, sink)
    }

    /// Start a session over any [`Simulator`] implementation
    pub fn with_simulator(
        config: &SessionConfig,
        store: Arc<BreakpointStore>,
        simulator: Arc<dyn Simulator>,
        publisher: Arc<dyn DisplayPublisher>,
        sink: Arc<dyn MessageSink>,
    ) -> DebugResult<Self> {
        let core = Arc::new(SessionCore {
            store,
            simulator,
            publisher,
            sink,
            active: AtomicBool::new(true),
            connected: AtomicBool::new(false),
        });

        // The listener must be up before the simulator learns its address
        let handler: Arc<dyn HitHandler> = core.clone();
        let server = CallbackServer::start(&config.callback_bind, config.callback_port, handler)?;

        let session = Self {
            core,
            server,
            host: config.simulator_host.clone(),
            port: config.simulator_port,
            advertise_host: config.advertise_host.clone(),
        };

        info!(
            "Debug session started for simulator {}:{}",
            session.host, session.port
        );

        // A failed connect leaves the session usable
        let _ = session.reconnect();

        Ok(session)
    }

    /// Re-announce the callback address to the simulator
    pub fn reconnect(&self) -> DebugResult<()> {
        self.core.connect(&self.advertise_host, self.server.port())
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            host: self.host.clone(),
            port: self.port,
            callback_port: self.server.port(),
            connected: self.core.connected.load(Ordering::SeqCst),
        }
    }

    pub fn is_active(&self) -> bool {
        self.core.active.load(Ordering::SeqCst)
    }

    /// Resolve and publish the variables of a statement
    pub fn on_hit(&self, statement_id: i64) {
        self.core.on_hit(statement_id);
    }

    /// Resolve the variables of a statement without publishing them
    pub fn resolve(&self, statement_id: i64) -> DisplayUpdate {
        self.core.resolve(statement_id)
    }

    /// Arm the breakpoint at `filename:line` on the simulator
    pub fn set_break_point(&self, filename: &str, line: u32) -> DebugResult<i64> {
        if filename.is_empty() {
            self.core.sink.report_message(MSG_BREAKPOINT_FAILED);
            return Err(DebugError::NotFound {
                filename: String::new(),
                line,
            });
        }

        let filename = absolute_path(filename);
        let statement_id = match self.core.store.find_breakpoint_id(&filename, line) {
            Ok(Some(id)) => id,
            Ok(None) => {
                self.core.sink.report_message(MSG_INVALID_BREAKPOINT);
                return Err(DebugError::NotFound { filename, line });
            }
            Err(err) => {
                error!("Breakpoint lookup failed: {}", err);
                self.core.sink.report_message(MSG_INVALID_BREAKPOINT);
                return Err(err);
            }
        };

        if let Err(err) = self.core.simulator.add_breakpoint(statement_id) {
            self.core.sink.report_message(MSG_BREAKPOINT_FAILED);
            return Err(err);
        }

        info!("Breakpoint set at {}:{} (statement {})", filename, line, statement_id);
        Ok(statement_id)
    }

    /// Resume the simulator
    pub fn continue_(&self) -> DebugResult<()> {
        let result = self.core.simulator.continue_execution();
        if result.is_err() {
            self.core.sink.report_message(MSG_CONTINUE_FAILED);
        }
        result
    }

    /// Every file that has at least one breakpoint
    pub fn get_all_files(&self) -> DebugResult<Vec<String>> {
        self.core.store.list_files()
    }

    /// Breakpoint lines of the current buffer, empty without one
    pub fn get_available_breakpoints(&self, current_file: Option<&Path>) -> DebugResult<Vec<u32>> {
        let Some(path) = current_file.and_then(|path| path.to_str()) else {
            return Ok(Vec::new());
        };
        if path.is_empty() {
            return Ok(Vec::new());
        }
        self.core.store.list_breakpoint_lines(&absolute_path(path))
    }

    /// Stop the callback listener; later hits are ignored
    pub fn stop(&mut self) {
        if self.core.active.swap(false, Ordering::SeqCst) {
            info!("Stopping debug session");
        }
        self.server.stop();
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Absolute form of `filename` relative to the working directory
pub fn absolute_path(filename: &str) -> String {
    std::path::absolute(filename)
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|_| filename.to_string())
}
