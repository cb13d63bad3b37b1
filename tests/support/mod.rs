use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use rusqlite::Connection;
use tempfile::TempDir;
use tiny_http::{Method, Response, Server};

/// A debug database on disk with the standard two tables
pub struct DebugDb {
    _dir: TempDir,
    path: PathBuf,
}

impl DebugDb {
    /// Create a database from `(id, filename, line)` and
    /// `(generator, variable, display, statement)` rows
    pub fn create(breakpoints: &[(i64, &str, u32)], variables: &[(&str, &str, &str, i64)]) -> Self {
        Self::create_with_key("statement_id", breakpoints, variables)
    }

    /// Same as `create` with a custom name for the statement column
    pub fn create_with_key(
        key: &str,
        breakpoints: &[(i64, &str, u32)],
        variables: &[(&str, &str, &str, i64)],
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE breakpoint (id INTEGER PRIMARY KEY, filename TEXT, line_num INTEGER);
             CREATE TABLE variable (generator_handle TEXT, variable_name TEXT, display_name TEXT, {key} INTEGER);"
        ))
        .unwrap();
        for (id, filename, line) in breakpoints {
            conn.execute(
                "INSERT INTO breakpoint (id, filename, line_num) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, filename, line],
            )
            .unwrap();
        }
        for (generator, variable, display, statement) in variables {
            conn.execute(
                &format!(
                    "INSERT INTO variable (generator_handle, variable_name, display_name, {key}) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                rusqlite::params![generator, variable, display, statement],
            )
            .unwrap();
        }
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Simulator stand-in answering the session's HTTP requests
pub struct FakeSimulator {
    server: Arc<Server>,
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
    worker: Option<JoinHandle<()>>,
}

impl FakeSimulator {
    /// Serve `values` on `/value/<handle>`; unknown handles answer 500
    pub fn start(values: &[(&str, &str)]) -> Self {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(handle, value)| (handle.to_string(), value.to_string()))
            .collect();
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let port = server.server_addr().to_ip().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let worker_server = Arc::clone(&server);
        let log = Arc::clone(&requests);
        let worker = thread::spawn(move || {
            for mut request in worker_server.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);
                let url = request.url().to_string();
                let method = request.method().clone();
                log.lock()
                    .unwrap()
                    .push(format!("{} {} {}", method, url, body).trim_end().to_string());

                let response = match (method, url.as_str()) {
                    (Method::Get, path) if path.starts_with("/value/") => {
                        match values.get(&path["/value/".len()..]) {
                            Some(value) => Response::from_string(value.clone()),
                            None => Response::from_string("no such handle").with_status_code(500),
                        }
                    }
                    (Method::Post, "/connect") | (Method::Post, "/continue") => {
                        Response::from_string("")
                    }
                    (Method::Post, path) if path.starts_with("/breakpoint/add/") => {
                        Response::from_string("")
                    }
                    _ => Response::from_string("").with_status_code(404),
                };
                let _ = request.respond(response);
            }
        });

        Self {
            server,
            port,
            requests,
            worker: Some(worker),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `"<METHOD> <url> <body>"` for every request received so far
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeSimulator {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// A local port with nothing listening on it
pub fn dead_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// A peer that completes TCP handshakes but never answers.
///
/// Connections sit in the listen backlog, so requests only end by timing out.
pub struct SilentPeer {
    listener: std::net::TcpListener,
}

impl SilentPeer {
    pub fn start() -> Self {
        Self {
            listener: std::net::TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }
}
