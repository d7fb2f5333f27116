//! Error notification channel for failed statements

use crate::error::QueryError;
use tracing::error;

/// Receives one notification per failed statement that was not run with
/// `ignore_errors`.
///
/// Implemented for any `Fn(&QueryError) + Send + Sync`, so a closure can be
/// handed to the registry directly:
///
/// ```
/// use resources_db::{ConnectionRegistry, DatabaseConfig};
///
/// let registry = ConnectionRegistry::with_sink(
///     DatabaseConfig::new("resources.db"),
///     |err: &resources_db::QueryError| eprintln!("sql error: {err}"),
/// );
/// # drop(registry);
/// ```
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &QueryError);
}

impl<F> ErrorSink for F
where
    F: Fn(&QueryError) + Send + Sync,
{
    fn report(&self, error: &QueryError) {
        self(error)
    }
}

/// Sink that logs the failure at error level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, err: &QueryError) {
        error!(statement = %err.statement, code = ?err.code, "SQL error: {}", err.message);
    }
}

/// Sink that drops every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ErrorSink for NullSink {
    fn report(&self, _error: &QueryError) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn sample() -> QueryError {
        QueryError {
            statement: "SELEC 1".to_string(),
            code: Some(1),
            message: "near \"SELEC\": syntax error".to_string(),
        }
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let sink: Arc<dyn ErrorSink> = Arc::new(move |_: &QueryError| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sink.report(&sample());
        sink.report(&sample());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn builtin_sinks_accept_reports() {
        NullSink.report(&sample());
        LogSink.report(&sample());
    }
}
