use std::io::{self, Read};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tiny_http::{Method, Request, Response, Server};

use crate::debugger::error::{DebugError, DebugResult};

/// Path the simulator posts to when execution halts
pub const BREAKPOINT_PATH: &str = "/status/breakpoint";

/// Longest notification body accepted; a statement id needs far less
const MAX_BODY_BYTES: u64 = 64;

/// How long `stop` waits for the listening socket to be closed
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);
const RELEASE_POLL: Duration = Duration::from_millis(10);

/// Receiver of breakpoint hit notifications
pub trait HitHandler: Send + Sync {
    /// Called on the listener thread; the simulator waits for this to return
    fn on_hit(&self, statement_id: i64);
}

impl<F> HitHandler for F
where
    F: Fn(i64) + Send + Sync,
{
    fn on_hit(&self, statement_id: i64) {
        self(statement_id);
    }
}

/// Parse the body of a breakpoint notification
pub fn parse_statement_id(body: &str) -> DebugResult<i64> {
    body.trim()
        .parse::<i64>()
        .map_err(|_| DebugError::Protocol(body.to_string()))
}

/// Embedded HTTP listener for simulator notifications.
///
/// The listener runs on its own thread from `start` until `stop`.
pub struct CallbackServer {
    server: Option<Arc<Server>>,
    addr: SocketAddr,
    worker: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Bind `<bind>:<port>` and start dispatching to `handler`.
    ///
    /// Port 0 picks an ephemeral port, see [`CallbackServer::port`].
    pub fn start(bind: &str, port: u16, handler: Arc<dyn HitHandler>) -> DebugResult<Self> {
        let listen = format!("{}:{}", bind, port);
        let server = Server::http(&listen)
            .map_err(|err| DebugError::Server(format!("bind {}: {}", listen, err)))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| DebugError::Server(format!("{} is not an IP listener", listen)))?;

        let server = Arc::new(server);
        let worker_server = Arc::clone(&server);
        let worker = thread::Builder::new()
            .name("simcat-callback".to_string())
            .spawn(move || serve(&worker_server, handler.as_ref()))
            .map_err(|err| DebugError::Server(format!("spawn listener: {}", err)))?;

        info!("Callback server listening on {}", addr);

        Ok(Self {
            server: Some(server),
            addr,
            worker: Some(worker),
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop accepting notifications.
    ///
    /// Returns once the dispatch thread has exited and the port can be bound
    /// again, or after a bounded wait if something else still holds it.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        if let Some(server) = &self.server {
            server.unblock();
        }
        if worker.join().is_err() {
            warn!("Callback listener thread panicked");
        }
        // tiny_http closes the socket on its own accept thread after the
        // last handle is dropped
        self.server = None;
        if wait_for_release(self.addr) {
            info!("Callback server on {} stopped", self.addr);
        } else {
            warn!("Callback server stopped but {} is still bound", self.addr);
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll until `addr` can be bound again
fn wait_for_release(addr: SocketAddr) -> bool {
    let deadline = Instant::now() + RELEASE_TIMEOUT;
    loop {
        match TcpListener::bind(addr) {
            Ok(_) => return true,
            Err(err) if err.kind() == io::ErrorKind::AddrInUse => {
                if Instant::now() >= deadline {
                    return false;
                }
                thread::sleep(RELEASE_POLL);
            }
            Err(err) => {
                debug!("Cannot probe {}: {}", addr, err);
                return true;
            }
        }
    }
}

fn serve(server: &Server, handler: &dyn HitHandler) {
    for request in server.incoming_requests() {
        handle_request(request, handler);
    }
    debug!("Callback listener loop finished");
}

fn handle_request(mut request: Request, handler: &dyn HitHandler) {
    let path = request.url().split('?').next().unwrap_or_default().to_string();

    if path != BREAKPOINT_PATH {
        debug!("{} {}: no such endpoint", request.method(), path);
        respond(request, "Not Found", 404);
        return;
    }

    if *request.method() != Method::Post {
        respond(request, "Method Not Allowed", 405);
        return;
    }

    let mut body = String::new();
    if let Err(err) = request
        .as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_string(&mut body)
    {
        warn!("Unreadable breakpoint notification: {}", err);
        respond(request, "Bad Request", 400);
        return;
    }
    if body.len() as u64 > MAX_BODY_BYTES {
        warn!("Breakpoint notification longer than {} bytes", MAX_BODY_BYTES);
        respond(request, "Bad Request", 400);
        return;
    }

    match parse_statement_id(&body) {
        Ok(statement_id) => {
            info!("Simulator halted at statement {}", statement_id);
            handler.on_hit(statement_id);
            respond(request, "Okay", 200);
        }
        Err(err) => {
            warn!("{}", err);
            respond(request, "Bad Request", 400);
        }
    }
}

fn respond(request: Request, body: &str, status: u16) {
    if let Err(err) = request.respond(Response::from_string(body).with_status_code(status)) {
        debug!("Failed to answer simulator: {}", err);
    }
}
