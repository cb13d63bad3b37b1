use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};
use rusqlite::{params, Connection, OpenFlags};

use crate::debugger::error::{DebugError, DebugResult};

/// A breakpoint-eligible source location known to the simulator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    /// Statement id used by the simulator
    pub id: i64,
    /// Absolute path of the source file
    pub filename: String,
    /// 1-based line number
    pub line: u32,
}

impl Breakpoint {
    /// File name without its directory, as shown in the location line
    pub fn basename(&self) -> &str {
        Path::new(&self.filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.filename)
    }

    /// `<basename>:<line>`
    pub fn location(&self) -> String {
        format!("{}:{}", self.basename(), self.line)
    }
}

impl fmt::Display for Breakpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Breakpoint {} at {}:{}", self.id, self.filename, self.line)
    }
}

/// One variable visible at a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBinding {
    /// Simulator-side scope prefix
    pub generator_handle: String,
    /// Simulator-side variable name inside that scope
    pub variable_name: String,
    /// Name shown to the user
    pub display_name: String,
    /// Breakpoint this binding belongs to
    pub statement_id: i64,
}

/// Read-only view of the breakpoint database.
///
/// The connection is shared between the command path and the callback
/// listener, so every query takes the lock for its duration.
#[derive(Debug)]
pub struct BreakpointStore {
    conn: Mutex<Connection>,
    /// Name of the statement column in the `variable` table
    statement_column: &'static str,
}

impl BreakpointStore {
    /// Open an existing database file read-only
    pub fn open(path: impl AsRef<Path>) -> DebugResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DebugError::StoreUnavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| DebugError::StoreUnavailable(format!("{}: {err}", path.display())))?;

        let store = Self::from_connection(conn)?;
        info!("Opened breakpoint database {}", path.display());
        Ok(store)
    }

    /// Wrap an already open connection, validating the schema
    pub fn from_connection(conn: Connection) -> DebugResult<Self> {
        let statement_column = detect_statement_column(&conn)?;

        conn.query_row("SELECT COUNT(*) FROM breakpoint", [], |row| row.get::<_, i64>(0))
            .map_err(|err| DebugError::StoreUnavailable(format!("breakpoint table: {err}")))?;

        debug!("variable table keyed by column '{}'", statement_column);

        Ok(Self {
            conn: Mutex::new(conn),
            statement_column,
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // read-only connection, a poisoned lock holds no partial state
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Distinct file names across all breakpoints, sorted
    pub fn list_files(&self) -> DebugResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT DISTINCT filename FROM breakpoint ORDER BY filename")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Breakpoint lines for one absolute path, ascending
    pub fn list_breakpoint_lines(&self, filename: &str) -> DebugResult<Vec<u32>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT line_num FROM breakpoint WHERE filename = ?1 ORDER BY line_num")?;
        let rows = stmt.query_map(params![filename], |row| row.get::<_, u32>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The statement id at `filename:line`, if exactly one row matches
    pub fn find_breakpoint_id(&self, filename: &str, line: u32) -> DebugResult<Option<i64>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id FROM breakpoint WHERE filename = ?1 AND line_num = ?2")?;
        let ids = stmt
            .query_map(params![filename, line], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        match ids.as_slice() {
            [id] => Ok(Some(*id)),
            _ => {
                debug!("{} rows match {}:{}", ids.len(), filename, line);
                Ok(None)
            }
        }
    }

    /// All variable bindings of a statement, in table order
    pub fn list_variables(&self, statement_id: i64) -> DebugResult<Vec<VariableBinding>> {
        let sql = format!(
            "SELECT generator_handle, variable_name, display_name, {col} \
             FROM variable WHERE {col} = ?1 ORDER BY rowid",
            col = self.statement_column
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![statement_id], |row| {
            Ok(VariableBinding {
                generator_handle: row.get(0)?,
                variable_name: row.get(1)?,
                display_name: row.get(2)?,
                statement_id: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The breakpoint row of a statement
    pub fn lookup_breakpoint(&self, statement_id: i64) -> DebugResult<Breakpoint> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT id, filename, line_num FROM breakpoint WHERE id = ?1",
            params![statement_id],
            |row| {
                Ok(Breakpoint {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    line: row.get(2)?,
                })
            },
        );

        match result {
            Ok(bp) => Ok(bp),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(DebugError::Inconsistent(statement_id)),
            Err(err) => Err(err.into()),
        }
    }
}

/// Older databases key the variable table by `id` instead of `statement_id`
fn detect_statement_column(conn: &Connection) -> DebugResult<&'static str> {
    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('variable')")
        .map_err(|err| DebugError::StoreUnavailable(format!("variable table: {err}")))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
        .map_err(|err| DebugError::StoreUnavailable(format!("variable table: {err}")))?;

    if columns.is_empty() {
        return Err(DebugError::StoreUnavailable(
            "variable table is missing".to_string(),
        ));
    }

    for required in ["generator_handle", "variable_name", "display_name"] {
        if !columns.iter().any(|c| c == required) {
            return Err(DebugError::StoreUnavailable(format!(
                "variable table has no '{required}' column"
            )));
        }
    }

    if columns.iter().any(|c| c == "statement_id") {
        Ok("statement_id")
    } else if columns.iter().any(|c| c == "id") {
        Ok("id")
    } else {
        Err(DebugError::StoreUnavailable(
            "variable table has no statement column".to_string(),
        ))
    }
}
