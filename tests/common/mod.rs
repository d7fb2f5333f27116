#![allow(dead_code)]

use resources_db::{ConnectionRegistry, DatabaseConfig, ErrorSink, QueryError};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Sink that remembers every reported failure
#[derive(Clone, Default)]
pub struct Errors(Arc<Mutex<Vec<QueryError>>>);

impl Errors {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn all(&self) -> Vec<QueryError> {
        self.0.lock().unwrap().clone()
    }
}

impl ErrorSink for Errors {
    fn report(&self, error: &QueryError) {
        self.0.lock().unwrap().push(error.clone());
    }
}

/// Registry over a fresh store inside a temporary directory
pub fn create_test_registry() -> (ConnectionRegistry, Errors, TempDir) {
    let dir = TempDir::new().unwrap();
    let errors = Errors::default();
    let config = DatabaseConfig::new(dir.path().join("database"));
    let registry = ConnectionRegistry::with_sink(config, errors.clone());
    (registry, errors, dir)
}

/// Registry over a store that already holds `t(x)` with the single row `1`
pub fn create_seeded_registry() -> (ConnectionRegistry, Errors, TempDir) {
    let (registry, errors, dir) = create_test_registry();
    {
        let db = registry.read_write().unwrap();
        db.exec_query("CREATE TABLE t(x INTEGER)", false);
        db.exec_query("INSERT INTO t VALUES (1)", false);
    }
    assert_eq!(errors.count(), 0);
    (registry, errors, dir)
}
