use thiserror::Error;

/// Shown when the simulator does not accept the callback address
pub const MSG_CONNECT_FAILED: &str = "Failed to connect to simulator";
/// Shown when `continue` cannot reach the simulator
pub const MSG_CONTINUE_FAILED: &str = "Unable to connect to the debugger";
/// Shown when a breakpoint cannot be armed on the simulator
pub const MSG_BREAKPOINT_FAILED: &str = "Unable to set a break point";
/// Shown when a file/line pair does not name exactly one breakpoint
pub const MSG_INVALID_BREAKPOINT: &str = "Not a valid breakpoint";

/// Errors produced by the debugger session
#[derive(Debug, Error)]
pub enum DebugError {
    /// The simulator was unreachable or answered with a non-200 status
    #[error("simulator request {request} failed: {reason}")]
    Connectivity { request: String, reason: String },

    /// Zero or several breakpoint rows match a file/line pair
    #[error("no unique breakpoint at {filename}:{line}")]
    NotFound { filename: String, line: u32 },

    /// A breakpoint notification carried a body that is not a statement id
    #[error("malformed breakpoint notification: {0:?}")]
    Protocol(String),

    /// The breakpoint database is missing or cannot be read
    #[error("breakpoint store unavailable: {0}")]
    StoreUnavailable(String),

    /// A statement id has no matching breakpoint row
    #[error("statement {0} has no breakpoint row")]
    Inconsistent(i64),

    #[error("breakpoint store query failed: {0}")]
    Store(#[from] rusqlite::Error),

    /// The callback listener could not be started or stopped
    #[error("callback server: {0}")]
    Server(String),
}

impl DebugError {
    pub(crate) fn connectivity(request: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connectivity {
            request: request.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that leave the session usable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StoreUnavailable(_))
    }
}

/// Result alias used across the session core
pub type DebugResult<T> = std::result::Result<T, DebugError>;
