//! Lazy, idempotent connection state shared by concurrent queries

use crate::connector::ConnectorError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::OnceCell;

/// Established backend session
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Session {
    pub(crate) endpoint: String,
}

/// Connection established on first use
///
/// Concurrent first callers wait on a single connect attempt. A failed attempt
/// leaves the cell empty so the next query tries again.
#[derive(Debug, Default)]
pub(crate) struct LazySession {
    cell: OnceCell<Session>,
    connects: AtomicUsize,
}

impl LazySession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn get_or_connect<F, Fut>(&self, connect: F) -> Result<&Session, ConnectorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Session, ConnectorError>>,
    {
        self.cell
            .get_or_try_init(|| async {
                self.connects.fetch_add(1, Ordering::Relaxed);
                connect().await
            })
            .await
    }

    /// Connect attempts made so far
    pub(crate) fn connect_attempts(&self) -> usize {
        self.connects.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn is_connected(&self) -> bool {
        self.cell.initialized()
    }
}
