//! Process-wide table of live connections, keyed by (thread, mode)

use crate::config::DatabaseConfig;
use crate::connection::{connection_name, PhysicalConnection};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::info::{ConnectionInfo, OpenMode};
use crate::sink::{ErrorSink, LogSink};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{error, warn};

struct Slot {
    generation: u64,
    database: Weak<Database>,
}

#[derive(Default)]
struct Table {
    slots: BTreeMap<ConnectionInfo, Slot>,
    next_generation: u64,
}

pub(crate) struct RegistryShared {
    table: Mutex<Table>,
    config: DatabaseConfig,
    sink: Arc<dyn ErrorSink>,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the slot for `info` if it still belongs to `generation`
    pub(crate) fn release(&self, info: &ConnectionInfo, generation: u64) {
        let mut table = self.lock();
        if table
            .slots
            .get(info)
            .map_or(false, |slot| slot.generation == generation)
        {
            table.slots.remove(info);
        }
    }
}

/// Hands out one shared [`Database`] per (thread, mode).
///
/// Construct it once at service start and pass clones to collaborators; clones
/// share the same table. A connection stays cached exactly as long as some
/// caller holds its `Arc<Database>`.
///
/// # Example
///
/// ```no_run
/// use resources_db::{ConnectionRegistry, DatabaseConfig, Locker, OpenMode};
///
/// # fn example() -> resources_db::Result<()> {
/// let registry = ConnectionRegistry::new(DatabaseConfig::default());
///
/// let db = registry.acquire(OpenMode::ReadWrite)?;
/// {
///     let _lock = Locker::new(&db);
///     db.exec_query("INSERT INTO ResourceInfo (targettedResource) VALUES ('a')", false);
///     db.exec_query("INSERT INTO ResourceInfo (targettedResource) VALUES ('b')", false);
/// }
///
/// if let Some(reader) = registry.read_only() {
///     let count = reader.value("SELECT COUNT(*) FROM ResourceInfo");
///     println!("{count:?}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionRegistry {
    shared: Arc<RegistryShared>,
}

impl ConnectionRegistry {
    /// Create a registry whose failed statements are logged
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_sink(config, LogSink)
    }

    /// Create a registry that reports failed statements to `sink`
    pub fn with_sink(config: DatabaseConfig, sink: impl ErrorSink + 'static) -> Self {
        Self::with_shared_sink(config, Arc::new(sink))
    }

    pub fn with_shared_sink(config: DatabaseConfig, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            shared: Arc::new(RegistryShared {
                table: Mutex::new(Table::default()),
                config,
                sink,
            }),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }

    /// Get the calling thread's connection for `mode`, opening it if needed.
    ///
    /// The whole lookup-or-open runs under the registry lock. A failure to
    /// open in read-write mode is fatal (see [`Error::is_fatal`]).
    pub fn acquire(&self, mode: OpenMode) -> Result<Arc<Database>> {
        let info = ConnectionInfo::current(mode);

        let database = {
            let mut table = self.shared.lock();

            if let Some(existing) = table.slots.get(&info).and_then(|slot| slot.database.upgrade()) {
                return Ok(existing);
            }

            let conn = match PhysicalConnection::open(&info, &self.shared.config) {
                Ok(conn) => conn,
                Err(source) => {
                    let name = connection_name(&info);
                    match mode {
                        OpenMode::ReadOnly => warn!(
                            connection = %name,
                            path = %self.shared.config.path.display(),
                            "Database is not open: {}", source
                        ),
                        OpenMode::ReadWrite => error!(
                            connection = %name,
                            path = %self.shared.config.path.display(),
                            "Opening the database in read-write mode should always succeed: {}", source
                        ),
                    }
                    return Err(Error::unavailable(mode, name, source));
                }
            };

            table.next_generation += 1;
            let generation = table.next_generation;
            let database = Arc::new(Database::new(
                conn,
                info,
                generation,
                Arc::clone(&self.shared.sink),
                Arc::downgrade(&self.shared),
            ));
            table.slots.insert(
                info,
                Slot {
                    generation,
                    database: Arc::downgrade(&database),
                },
            );
            database
        };

        // Only this thread can look up this key, so configuring outside the
        // lock cannot hand out a half-configured connection
        database.configure();
        Ok(database)
    }

    /// Read-only connection, or `None` when the store cannot be read
    pub fn read_only(&self) -> Option<Arc<Database>> {
        self.acquire(OpenMode::ReadOnly).ok()
    }

    pub fn read_write(&self) -> Result<Arc<Database>> {
        self.acquire(OpenMode::ReadWrite)
    }

    /// Number of connections currently cached
    pub fn live_connections(&self) -> usize {
        self.shared.lock().slots.len()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("config", &self.shared.config)
            .field("live_connections", &self.live_connections())
            .finish()
    }
}
