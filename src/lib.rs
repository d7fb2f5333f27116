//! Thread-affined SQLite connection cache for the activity resources store.
//!
//! # Intention
//!
//! - Serialize access to the single on-disk resources store from many threads
//!   without reopening the file for every call.
//! - Keep at most one open connection per (thread, access mode) and close it as
//!   soon as no caller holds it.
//! - Enforce read-only access in the engine itself, not only in callers.
//! - Offer scoped transactions for multi-statement atomic writes.
//!
//! # Architectural Boundaries
//!
//! - Only connection management and statement execution belong here.
//! - Schema definition, migrations and the service layer live with their
//!   consumers, which reach the store through [`ConnectionRegistry::acquire`],
//!   [`Database`] and [`Locker`].
//!
//! # Usage
//!
//! ```no_run
//! use resources_db::{ConnectionRegistry, DatabaseConfig, OpenMode, Value};
//!
//! # fn main() -> resources_db::Result<()> {
//! let registry = ConnectionRegistry::new(DatabaseConfig::default());
//!
//! let db = registry.acquire(OpenMode::ReadWrite)?;
//! db.exec_query("CREATE TABLE IF NOT EXISTS t(x INTEGER)", false);
//! db.exec_query("INSERT INTO t VALUES (1)", false);
//! assert_eq!(db.value("SELECT x FROM t"), Value::Integer(1));
//!
//! // Same thread, same mode: the same connection
//! let again = registry.acquire(OpenMode::ReadWrite)?;
//! assert!(std::sync::Arc::ptr_eq(&db, &again));
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod database;
mod error;
mod info;
mod locker;
mod registry;
mod sink;
pub mod sqlite;

pub use config::{DatabaseConfig, PATH_OVERRIDE_VAR};
pub use connection::{connection_name, PhysicalConnection, CONNECTION_NAME_PREFIX};
pub use database::Database;
pub use error::{Error, QueryError, Result};
pub use info::{ConnectionInfo, OpenMode, ThreadIdentity};
pub use locker::Locker;
pub use registry::ConnectionRegistry;
pub use sink::{ErrorSink, LogSink, NullSink};
pub use sqlite::{QueryResult, Value};
