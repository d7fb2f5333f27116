//! Scoped transaction guard

use crate::database::Database;
use crate::info::OpenMode;
use std::thread;
use tracing::warn;

/// RAII guard that opens a transaction on construction and commits on drop.
///
/// The commit happens on every exit path: normal scope end, early `return` and
/// `?` propagation. If the guard is dropped while the thread is unwinding from
/// a panic, the transaction is rolled back instead, matching what a crash
/// between statements would leave on disk. Use [`Locker::rollback`] to abandon
/// a sequence explicitly.
///
/// If the engine refuses to begin (a writer on another thread held the store
/// past the busy timeout, or a transaction is already open) the failure is
/// reported like any other statement and the guard is inactive: it never
/// commits or rolls back. Callers that need atomicity check
/// [`Locker::is_active`] before issuing their statements.
///
/// Guards do not nest. A second guard on a connection that is already in a
/// transaction is always inactive.
///
/// # Example
///
/// ```no_run
/// use resources_db::{ConnectionRegistry, DatabaseConfig, Locker};
///
/// # fn example(registry: &ConnectionRegistry) -> resources_db::Result<()> {
/// let db = registry.read_write()?;
/// let lock = Locker::new(&db);
/// db.exec_query("DELETE FROM ResourceLink WHERE usedActivity = 'old'", false);
/// db.exec_query("DELETE FROM ResourceInfo WHERE title IS NULL", false);
/// drop(lock); // both deletes become visible together
/// # Ok(())
/// # }
/// ```
#[must_use = "the transaction commits as soon as the guard is dropped"]
pub struct Locker<'a> {
    database: &'a Database,
    active: bool,
}

impl<'a> Locker<'a> {
    pub fn new(database: &'a Database) -> Self {
        if database.in_transaction() {
            warn!(
                connection = %database.connection_name(),
                "Locker created while a transaction is already open"
            );
        }

        // Take the write lock up front so concurrent writers wait on the busy
        // timeout instead of failing on lock upgrade mid-transaction
        let begin = match database.open_mode() {
            OpenMode::ReadOnly => "BEGIN",
            OpenMode::ReadWrite => "BEGIN IMMEDIATE",
        };
        let active = database.exec_query(begin, false).is_ok();

        Self { database, active }
    }

    /// Whether the transaction was opened and is still pending
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn database(&self) -> &'a Database {
        self.database
    }

    /// Commit now instead of at scope end
    pub fn commit(mut self) {
        self.finish("COMMIT");
    }

    /// Abandon every statement issued since the guard was created
    pub fn rollback(mut self) {
        self.finish("ROLLBACK");
    }

    fn finish(&mut self, statement: &str) {
        if self.active {
            self.active = false;
            self.database.exec_query(statement, false);
        }
    }
}

impl Drop for Locker<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.finish("ROLLBACK");
        } else {
            self.finish("COMMIT");
        }
    }
}

impl std::fmt::Debug for Locker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locker")
            .field("connection", &self.database.connection_name())
            .field("active", &self.active)
            .finish()
    }
}
