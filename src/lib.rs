//! SIMCAT - debugger client for remote program simulators
//!
//! This library keeps breakpoint and variable metadata from a read-only
//! debug database, drives the simulator over HTTP, and turns breakpoint
//! hit notifications into tables of variable values. The `simcat` binary
//! wraps it in a small line-oriented console.

pub mod console;
pub mod debugger;
pub mod platform;

/// Re-export key types for easier access in tests
pub use debugger::breakpoint::{Breakpoint, BreakpointStore, VariableBinding};
pub use debugger::core::{
    DebugSession, DisplayPublisher, MessageSink, SessionConfig, SessionEvent, SessionInfo,
};
pub use debugger::error::{DebugError, DebugResult};
pub use debugger::variables::{compose_handle, DisplayUpdate, ResolvedRow, VariableValue};
pub use console::app::Command as AppCommand;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Initialize the logging system; `RUST_LOG` overrides `level`
pub fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("simcat", level)
        .format_timestamp_secs()
        .parse_default_env()
        .init();
}

/// Parse a console command string
pub fn parse_command(cmd_str: &str) -> AppCommand {
    console::app::parse_command(cmd_str)
}
