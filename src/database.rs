//! The handle callers hold: statement execution, pragma helpers, error reporting

use crate::connection::PhysicalConnection;
use crate::error::QueryError;
use crate::info::{ConnectionInfo, OpenMode};
use crate::registry::RegistryShared;
use crate::sink::ErrorSink;
use crate::sqlite::{QueryResult, Value};
use rusqlite::{Batch, Connection, Statement};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, warn};

struct State {
    conn: PhysicalConnection,
    last_query: Option<String>,
}

/// A cached connection to the resources store.
///
/// Obtained from [`ConnectionRegistry::acquire`](crate::ConnectionRegistry::acquire)
/// as an `Arc<Database>`. Every caller on the same thread asking for the same
/// mode shares one `Database` while any of them still holds it. The connection
/// closes when the last `Arc` drops.
///
/// Statements are executed in submission order. Failures never abort: the
/// caller gets a [`QueryResult`] carrying the error, and unless the statement
/// was run with `ignore_errors` the error sink is notified once.
pub struct Database {
    state: Mutex<State>,
    info: ConnectionInfo,
    name: String,
    generation: u64,
    sink: Arc<dyn ErrorSink>,
    registry: Weak<RegistryShared>,
}

impl Database {
    pub(crate) fn new(
        conn: PhysicalConnection,
        info: ConnectionInfo,
        generation: u64,
        sink: Arc<dyn ErrorSink>,
        registry: Weak<RegistryShared>,
    ) -> Self {
        Self {
            name: conn.name().to_string(),
            state: Mutex::new(State {
                conn,
                last_query: None,
            }),
            info,
            generation,
            sink,
            registry,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply the durability and access pragmas for this connection's mode
    pub(crate) fn configure(&self) {
        match self.info.open_mode {
            OpenMode::ReadOnly => {
                // From now on only SELECT statements succeed
                self.set_pragma("query_only = 1");
                self.set_pragma("synchronous = 0");
            }
            OpenMode::ReadWrite => {
                // 0 OFF | 1 NORMAL | 2 FULL | 3 EXTRA
                self.set_pragma("synchronous = 2");
                // No write-ahead log: its shared-memory index is unreliable on
                // network and virtualized filesystems
                self.pragma("journal_mode = TRUNCATE");
            }
        }

        debug!(
            connection = %self.name,
            query_only = ?self.pragma("query_only"),
            journal_mode = ?self.pragma("journal_mode"),
            synchronous = ?self.pragma("synchronous"),
            "Database connection configured"
        );
    }

    /// Execute one statement.
    ///
    /// With `ignore_errors` set a failure is neither logged nor reported to the
    /// sink; it is still recorded on the returned result.
    pub fn exec_query(&self, query: &str, ignore_errors: bool) -> QueryResult {
        let result = {
            let mut state = self.lock();
            state.last_query = Some(query.to_string());
            match state.conn.raw() {
                Some(conn) => run(conn, query),
                None => QueryResult::failed(QueryError::message(
                    query,
                    format!("connection '{}' is closed", self.name),
                )),
            }
        };

        if let Some(err) = result.error() {
            if !ignore_errors {
                warn!(connection = %self.name, query = %query, "SQL error: {}", err.message);
                self.sink.report(err);
            }
        }

        result
    }

    /// Execute statements in order and return the result of the last one.
    ///
    /// Every failing statement is reported; execution continues past failures.
    pub fn exec_queries<I, S>(&self, queries: I) -> QueryResult
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = QueryResult::default();
        for query in queries {
            result = self.exec_query(query.as_ref(), false);
        }
        result
    }

    /// Run `PRAGMA <pragma>` and discard the result
    pub fn set_pragma(&self, pragma: &str) {
        self.exec_query(&format!("PRAGMA {pragma}"), false);
    }

    /// Run `PRAGMA <pragma>` and return its first value
    pub fn pragma(&self, pragma: &str) -> Value {
        self.value(&format!("PRAGMA {pragma}"))
    }

    /// First column of the first row of `query`, or `Value::Null` if it returns no rows
    pub fn value(&self, query: &str) -> Value {
        self.exec_query(query, false).first_value()
    }

    /// Text of the statement most recently executed through this handle
    pub fn last_query(&self) -> Option<String> {
        self.lock().last_query.clone()
    }

    pub fn connection_name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.lock().conn.is_open()
    }

    /// Close the connection now instead of when the last owner drops it.
    ///
    /// The registry forgets this handle immediately, so the next `acquire` on
    /// this thread opens a fresh connection. Statements issued through a closed
    /// handle fail and are reported.
    pub fn close(&self) {
        self.lock().conn.close();
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.info, self.generation);
        }
    }

    pub fn open_mode(&self) -> OpenMode {
        self.info.open_mode
    }

    pub fn info(&self) -> ConnectionInfo {
        self.info
    }

    /// Registry generation this handle was created under; a fresh open after
    /// full release always gets a new generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether an explicit transaction is open on this connection
    pub fn in_transaction(&self) -> bool {
        !self.lock().conn.is_autocommit()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(&self.info, self.generation);
        }
    }
}

/// Prepare exactly one statement from `query`.
///
/// Whitespace and comments around it are fine; any further statement is an
/// error, so no part of the text is silently skipped.
fn prepare_single<'conn>(conn: &'conn Connection, query: &str) -> Result<Statement<'conn>, QueryError> {
    let mut batch = Batch::new(conn, query);
    let stmt = match batch.next() {
        Ok(Some(stmt)) => stmt,
        Ok(None) => return Err(QueryError::message(query, "no statement to execute")),
        Err(e) => return Err(QueryError::new(query, &e)),
    };
    match batch.next() {
        Ok(None) => Ok(stmt),
        Ok(Some(_)) | Err(_) => Err(QueryError::message(
            query,
            "unable to execute multiple statements at a time",
        )),
    }
}

/// Prepare and step a statement to completion, collecting every row
fn run(conn: &Connection, query: &str) -> QueryResult {
    let mut stmt = match prepare_single(conn, query) {
        Ok(stmt) => stmt,
        Err(e) => return QueryResult::failed(e),
    };

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut result = QueryResult {
        columns,
        ..QueryResult::default()
    };

    let column_count = result.columns.len();
    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            result.error = Some(QueryError::new(query, &e));
            return result;
        }
    };

    loop {
        match rows.next() {
            Ok(Some(row)) => {
                let mut values = Vec::with_capacity(column_count);
                for index in 0..column_count {
                    match row.get_ref(index) {
                        Ok(value) => values.push(Value::from(value)),
                        Err(e) => {
                            result.error = Some(QueryError::new(query, &e));
                            return result;
                        }
                    }
                }
                result.rows.push(values);
            }
            Ok(None) => break,
            Err(e) => {
                result.error = Some(QueryError::new(query, &e));
                return result;
            }
        }
    }
    drop(rows);

    if column_count == 0 {
        result.rows_affected = conn.changes() as usize;
    }
    result
}
