//! Bounded pool of SQLite connections
//!
//! Caps the number of concurrent store calls. Acquisition waits at most the
//! caller's remaining budget, so a saturated pool surfaces as a timeout
//! instead of an unbounded queue.

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};
use rusqlite::Connection;
use std::ops::Deref;
use std::path::Path;
use std::time::{Duration, Instant};

pub(crate) struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    returned: Condvar,
    size: usize,
}

impl ConnectionPool {
    /// Open `size` connections to the database at `path`
    pub(crate) fn open(path: &Path, size: usize) -> Result<Self> {
        let mut idle = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open(path)
                .with_context(|| format!("Failed to open SQLite database at {}", path.display()))?;
            // WAL lets readers proceed while ingestion writes
            conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0))
                .context("Failed to enable WAL journal")?;
            conn.busy_timeout(Duration::from_secs(5))?;
            idle.push(conn);
        }

        Ok(Self {
            idle: Mutex::new(idle),
            returned: Condvar::new(),
            size,
        })
    }

    /// Borrow a connection, waiting up to `timeout` for one to be returned
    pub(crate) fn acquire(&self, timeout: Duration) -> Option<PooledConnection<'_>> {
        let deadline = Instant::now() + timeout;
        let mut idle = self.idle.lock();
        loop {
            if let Some(conn) = idle.pop() {
                return Some(PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
            if self.returned.wait_until(&mut idle, deadline).timed_out() {
                return idle.pop().map(|conn| PooledConnection {
                    pool: self,
                    conn: Some(conn),
                });
            }
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    fn release(&self, conn: Connection) {
        self.idle.lock().push(conn);
        self.returned.notify_one();
    }
}

/// Connection on loan from the pool; returned on drop
pub(crate) struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only None during drop
        self.conn.as_ref().expect("pooled connection already released")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
