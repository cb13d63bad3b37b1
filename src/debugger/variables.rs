use std::fmt;

use crate::debugger::breakpoint::VariableBinding;

/// Root scope token of the simulator's handle namespace
pub const ROOT_TOKEN: &str = "TOP";

/// Marker displayed for a value that could not be fetched
pub const ERROR_MARKER: &str = "ERROR";

/// Build the fully-qualified simulator handle of a binding.
///
/// Generator handles that do not start with the root token get `TOP.`
/// prepended before the variable name is appended.
pub fn compose_handle(generator_handle: &str, variable_name: &str) -> String {
    if generator_handle.starts_with(ROOT_TOKEN) {
        format!("{}.{}", generator_handle, variable_name)
    } else {
        format!("{}.{}.{}", ROOT_TOKEN, generator_handle, variable_name)
    }
}

impl VariableBinding {
    /// Fully-qualified handle used in `/value/<handle>`
    pub fn handle(&self) -> String {
        compose_handle(&self.generator_handle, &self.variable_name)
    }
}

/// Value of a watched variable as reported by the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableValue {
    /// Raw response body of `/value/<handle>`
    Value(String),
    /// The simulator could not be reached or refused the request
    Error,
}

impl VariableValue {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Value(value) => value,
            Self::Error => ERROR_MARKER,
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Value(value.to_string())
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the variable table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub display_name: String,
    pub value: VariableValue,
}

impl ResolvedRow {
    pub fn new(display_name: impl Into<String>, value: VariableValue) -> Self {
        Self {
            display_name: display_name.into(),
            value,
        }
    }
}

/// Everything shown after a breakpoint hit.
///
/// Rows and location travel together so a table is never paired with the
/// location of a different hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayUpdate {
    /// Statement the simulator halted at
    pub statement_id: i64,
    /// `<basename>:<line>`
    pub location: String,
    pub rows: Vec<ResolvedRow>,
}

impl DisplayUpdate {
    /// Number of rows whose value could not be fetched
    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|row| row.value.is_error()).count()
    }
}
