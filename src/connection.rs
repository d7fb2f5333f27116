//! Engine-level connection for one (thread, mode) key

use crate::config::DatabaseConfig;
use crate::info::{ConnectionInfo, OpenMode};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

/// Prefix shared by every connection name
pub const CONNECTION_NAME_PREFIX: &str = "kactivities_db_resources_";

/// Name of the connection for a key: prefix, thread identity, mode suffix.
///
/// Two lookups of the same key always produce the same name.
pub fn connection_name(info: &ConnectionInfo) -> String {
    format!(
        "{}{}_{}",
        CONNECTION_NAME_PREFIX,
        info.thread,
        info.open_mode.suffix()
    )
}

fn open_flags(mode: OpenMode) -> OpenFlags {
    let common = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match mode {
        // The engine itself refuses writes; the file must already exist
        OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY | common,
        OpenMode::ReadWrite => {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | common
        }
    }
}

/// One open SQLite handle, owned exclusively.
///
/// Pragmas are applied by the owning `Database` so that failures go through
/// the same reporting path as any other statement.
#[derive(Debug)]
pub struct PhysicalConnection {
    conn: Option<Connection>,
    name: String,
    mode: OpenMode,
}

impl PhysicalConnection {
    /// Open the configured store for the given key
    pub fn open(info: &ConnectionInfo, config: &DatabaseConfig) -> Result<Self, rusqlite::Error> {
        let name = connection_name(info);
        let conn = Connection::open_with_flags(&config.path, open_flags(info.open_mode))?;
        conn.busy_timeout(config.busy_timeout())?;

        debug!(connection = %name, path = %config.path.display(), "Opened SQL connection");

        Ok(Self {
            conn: Some(conn),
            name,
            mode: info.open_mode,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether the engine is currently outside an explicit transaction
    pub fn is_autocommit(&self) -> bool {
        self.conn.as_ref().map_or(true, Connection::is_autocommit)
    }

    /// Close the engine handle. Any open transaction is rolled back by the engine.
    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            debug!(connection = %self.name, "Closing SQL connection");
            if let Err((_, err)) = conn.close() {
                warn!(connection = %self.name, "Closing SQL connection failed: {}", err);
            }
        }
    }

    pub(crate) fn raw(&self) -> Option<&Connection> {
        self.conn.as_ref()
    }
}

impl Drop for PhysicalConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::ThreadIdentity;
    use tempfile::TempDir;

    #[test]
    fn names_are_deterministic_per_key() {
        let info = ConnectionInfo::current(OpenMode::ReadOnly);
        let name = connection_name(&info);
        assert_eq!(name, connection_name(&info));
        assert_eq!(
            name,
            format!(
                "kactivities_db_resources_{}_readonly",
                ThreadIdentity::current().as_u64()
            )
        );
        assert_ne!(name, connection_name(&ConnectionInfo::current(OpenMode::ReadWrite)));
    }

    #[test]
    fn read_only_open_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path().join("missing.db"));
        let info = ConnectionInfo::current(OpenMode::ReadOnly);
        assert!(PhysicalConnection::open(&info, &config).is_err());
        assert!(!config.path.exists());
    }

    #[test]
    fn read_write_open_creates_file() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path().join("created.db"));
        let info = ConnectionInfo::current(OpenMode::ReadWrite);
        let conn = PhysicalConnection::open(&info, &config).unwrap();
        assert!(conn.is_open());
        assert!(conn.is_autocommit());
        assert_eq!(conn.mode(), OpenMode::ReadWrite);
        assert!(config.path.exists());
    }

    #[test]
    fn close_reports_closed_state() {
        let dir = TempDir::new().unwrap();
        let config = DatabaseConfig::new(dir.path().join("closed.db"));
        let info = ConnectionInfo::current(OpenMode::ReadWrite);
        let mut conn = PhysicalConnection::open(&info, &config).unwrap();

        conn.close();
        assert!(!conn.is_open());
        assert!(conn.raw().is_none());
        assert!(conn.is_autocommit());

        // Closing twice is harmless
        conn.close();
        assert!(!conn.is_open());
    }
}
