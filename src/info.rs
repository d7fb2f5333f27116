//! Connection keys: which thread asked, and for what kind of access

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Access mode of a connection
///
/// Ordered so that `ReadOnly < ReadWrite`, which fixes the secondary ordering of
/// [`ConnectionInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OpenMode {
    /// Mutations are rejected by the engine
    ReadOnly,
    /// Full read/write access
    ReadWrite,
}

impl OpenMode {
    /// Suffix used in connection names
    pub fn suffix(self) -> &'static str {
        match self {
            OpenMode::ReadOnly => "readonly",
            OpenMode::ReadWrite => "readwrite",
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

static NEXT_THREAD_IDENTITY: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_IDENTITY: Cell<u64> = const { Cell::new(0) };
}

/// Process-unique, ordered identity of an OS thread.
///
/// Assigned on first use and never reused, so a connection name derived from a
/// thread that has exited cannot be mistaken for one of a live thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadIdentity(u64);

impl ThreadIdentity {
    /// Identity of the calling thread
    pub fn current() -> Self {
        THREAD_IDENTITY.with(|cell| {
            if cell.get() == 0 {
                cell.set(NEXT_THREAD_IDENTITY.fetch_add(1, Ordering::Relaxed));
            }
            ThreadIdentity(cell.get())
        })
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache key of a logical connection.
///
/// Ordered by thread first, then by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionInfo {
    pub thread: ThreadIdentity,
    pub open_mode: OpenMode,
}

impl ConnectionInfo {
    /// Key for the calling thread
    pub fn current(open_mode: OpenMode) -> Self {
        Self {
            thread: ThreadIdentity::current(),
            open_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::thread;

    #[test]
    fn identity_is_stable_within_a_thread() {
        assert_eq!(ThreadIdentity::current(), ThreadIdentity::current());
    }

    #[test]
    fn identities_differ_across_threads() {
        let here = ThreadIdentity::current();
        let there = thread::spawn(ThreadIdentity::current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn keys_order_by_thread_then_mode() {
        let a = ThreadIdentity(3);
        let b = ThreadIdentity(7);
        let mut map = BTreeMap::new();
        for key in [
            ConnectionInfo { thread: b, open_mode: OpenMode::ReadOnly },
            ConnectionInfo { thread: a, open_mode: OpenMode::ReadWrite },
            ConnectionInfo { thread: b, open_mode: OpenMode::ReadWrite },
            ConnectionInfo { thread: a, open_mode: OpenMode::ReadOnly },
        ] {
            map.insert(key, ());
        }

        let order: Vec<_> = map.keys().map(|k| (k.thread.as_u64(), k.open_mode)).collect();
        assert_eq!(
            order,
            vec![
                (3, OpenMode::ReadOnly),
                (3, OpenMode::ReadWrite),
                (7, OpenMode::ReadOnly),
                (7, OpenMode::ReadWrite),
            ]
        );
    }
}
