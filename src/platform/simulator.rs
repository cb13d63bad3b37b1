use std::io::Read;
use std::time::Duration;

use log::{debug, warn};

use crate::debugger::error::{DebugError, DebugResult};
use crate::debugger::variables::VariableValue;

/// Upper bound on a `/value` response body
const MAX_VALUE_BYTES: u64 = 1 << 20;

/// Requests understood by the simulator.
///
/// Every call makes exactly one attempt; retrying is left to the user.
#[cfg_attr(test, mockall::automock)]
pub trait Simulator: Send + Sync {
    /// `POST /connect` advertising where breakpoint hits should be sent
    fn connect(&self, host: &str, port: u16) -> DebugResult<()>;

    /// `POST /continue`
    fn continue_execution(&self) -> DebugResult<()>;

    /// `POST /breakpoint/add/<statement_id>`
    fn add_breakpoint(&self, statement_id: i64) -> DebugResult<()>;

    /// `GET /value/<handle>`, never failing: errors become the ERROR marker
    fn fetch_value(&self, handle: &str) -> VariableValue;
}

/// Blocking HTTP client for the simulator
pub struct SimulatorClient {
    agent: ureq::Agent,
    base_url: String,
}

impl SimulatorClient {
    /// Create a client for `http://<host>:<port>` with a bounded per-request timeout
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();

        Self {
            agent,
            base_url: format!("http://{}:{}", host, port),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a POST and require a 200 answer
    fn post(&self, path: &str, body: Option<&str>) -> DebugResult<()> {
        let url = self.url(path);
        debug!("POST {}", url);

        let request = self.agent.post(&url);
        let result = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };

        let outcome = result
            .map_err(|err| request_error(path, err))
            .and_then(|response| expect_ok(path, response.status()));
        if let Err(err) = &outcome {
            warn!("{}", err);
        }
        outcome
    }
}

impl Simulator for SimulatorClient {
    fn connect(&self, host: &str, port: u16) -> DebugResult<()> {
        self.post("/connect", Some(&format!("{}:{}", host, port)))
    }

    fn continue_execution(&self) -> DebugResult<()> {
        self.post("/continue", None)
    }

    fn add_breakpoint(&self, statement_id: i64) -> DebugResult<()> {
        self.post(&format!("/breakpoint/add/{}", statement_id), None)
    }

    fn fetch_value(&self, handle: &str) -> VariableValue {
        let path = format!("/value/{}", handle);
        let url = self.url(&path);
        debug!("GET {}", url);

        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(err) => {
                debug!("{}", request_error(&path, err));
                return VariableValue::Error;
            }
        };

        if let Err(err) = expect_ok(&path, response.status()) {
            debug!("{}", err);
            return VariableValue::Error;
        }

        let mut body = Vec::new();
        match response.into_reader().take(MAX_VALUE_BYTES).read_to_end(&mut body) {
            Ok(_) => VariableValue::Value(String::from_utf8_lossy(&body).into_owned()),
            Err(err) => {
                debug!("reading value of {} failed: {}", handle, err);
                VariableValue::Error
            }
        }
    }
}

fn expect_ok(path: &str, status: u16) -> DebugResult<()> {
    if status == 200 {
        Ok(())
    } else {
        Err(DebugError::connectivity(path, format!("status {}", status)))
    }
}

fn request_error(path: &str, err: ureq::Error) -> DebugError {
    match err {
        ureq::Error::Status(code, _) => DebugError::connectivity(path, format!("status {}", code)),
        ureq::Error::Transport(transport) => DebugError::connectivity(path, transport),
    }
}
