//! Port allocation arbiter.
//!
//! Every job fork needs a local port. If each subprocess probed for one on
//! its own, two of them could find the same OS-free port before either has
//! bound it. The arbiter closes that race: all requests are funneled
//! through one task, served FIFO, and every granted port is time-locked so
//! it cannot be handed out again before the subprocess has had a chance to
//! bind it.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::observability::metrics;

/// How long a granted port stays locked against reassignment.
pub const PORT_HOLD_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The scan exhausted the configured range.
    #[error("No free ports found")]
    NoFreePort,

    /// The arbiter task is gone (process shutting down).
    #[error("Port arbiter unavailable")]
    Unavailable,
}

struct PortQuery {
    start: u16,
    end: u16,
    reply: oneshot::Sender<Result<u16, PortError>>,
}

/// Serialized port allocator. Owns the lock table; OS-level bindability is
/// the ground truth for "free", the lock table only bridges the
/// lookup-then-bind race window.
pub struct PortArbiter {
    unlock_at: HashMap<u16, Instant>,
    hold: Duration,
}

impl PortArbiter {
    pub fn new() -> Self {
        Self::with_hold_window(PORT_HOLD_WINDOW)
    }

    pub fn with_hold_window(hold: Duration) -> Self {
        Self {
            unlock_at: HashMap::new(),
            hold,
        }
    }

    /// Find the first OS-free, unlocked port in `[start, end]` and lock it.
    ///
    /// A port is eligible only strictly after its unlock time; every grant
    /// pushes that time forward to now + hold window.
    pub async fn find_free_port(&mut self, start: u16, end: u16) -> Result<u16, PortError> {
        let now = Instant::now();

        for port in start..=end {
            if let Some(unlock_at) = self.unlock_at.get(&port) {
                if *unlock_at > now {
                    continue;
                }
            }

            // OS bind probe; the listener is dropped immediately, the lock
            // entry covers the window until the subprocess binds it itself
            if TcpListener::bind(("127.0.0.1", port)).await.is_ok() {
                self.unlock_at.insert(port, now + self.hold);
                metrics::record_port_grant();
                tracing::debug!(port, "Port granted");
                return Ok(port);
            }
        }

        Err(PortError::NoFreePort)
    }

    /// Move the arbiter onto its own task and return a cloneable handle.
    /// Requests are served one at a time in arrival order.
    pub fn spawn(mut self) -> PortArbiterHandle {
        let (tx, mut rx) = mpsc::channel::<PortQuery>(64);

        tokio::spawn(async move {
            while let Some(query) = rx.recv().await {
                let result = self.find_free_port(query.start, query.end).await;
                let _ = query.reply.send(result);
            }
            tracing::debug!("Port arbiter stopped");
        });

        PortArbiterHandle { tx }
    }
}

impl Default for PortArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle used by dispatchers to request ports from the arbiter task.
#[derive(Clone)]
pub struct PortArbiterHandle {
    tx: mpsc::Sender<PortQuery>,
}

impl PortArbiterHandle {
    pub async fn find_free_port(&self, start: u16, end: u16) -> Result<u16, PortError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(PortQuery { start, end, reply })
            .await
            .map_err(|_| PortError::Unavailable)?;
        rx.await.map_err(|_| PortError::Unavailable)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_grants_distinct_ports_within_hold_window() {
        let mut arbiter = PortArbiter::new();
        let first = arbiter.find_free_port(10_000, 10_010).await.unwrap();
        let second = arbiter.find_free_port(10_000, 10_010).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_overlapping_ranges_stay_distinct() {
        let mut arbiter = PortArbiter::new();
        let first = arbiter.find_free_port(10_020, 10_030).await.unwrap();
        let second = arbiter.find_free_port(10_025, 10_035).await.unwrap();
        if (10_025..=10_030).contains(&first) {
            assert_ne!(first, second);
        }
    }

    #[tokio::test]
    async fn test_port_reassigned_after_window_expires() {
        let mut arbiter = PortArbiter::with_hold_window(Duration::from_millis(0));
        let first = arbiter.find_free_port(10_040, 10_050).await.unwrap();
        // zero hold window: the same port is immediately eligible again
        let second = arbiter.find_free_port(10_040, 10_050).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_no_free_port_when_range_exhausted() {
        let mut arbiter = PortArbiter::new();
        // lock the entire two-port range, then ask again
        arbiter.find_free_port(10_060, 10_061).await.unwrap();
        arbiter.find_free_port(10_060, 10_061).await.unwrap();
        let result = arbiter.find_free_port(10_060, 10_061).await;
        assert_eq!(result, Err(PortError::NoFreePort));
    }

    #[tokio::test]
    async fn test_os_busy_port_is_skipped() {
        let held = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let busy = held.local_addr().unwrap().port();

        let mut arbiter = PortArbiter::new();
        let granted = arbiter.find_free_port(busy, busy.saturating_add(5)).await;
        if let Ok(port) = granted {
            assert_ne!(port, busy);
        }
    }

    #[tokio::test]
    async fn test_handle_serves_requests_fifo() {
        let handle = PortArbiter::new().spawn();
        let first = handle.find_free_port(10_070, 10_080).await.unwrap();
        let second = handle.find_free_port(10_070, 10_080).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_grant_extends_unlock_time() {
        let mut arbiter = PortArbiter::with_hold_window(Duration::from_millis(0));
        let port = arbiter.find_free_port(10_090, 10_095).await.unwrap();
        let first_unlock = *arbiter.unlock_at.get(&port).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let again = arbiter.find_free_port(10_090, 10_095).await.unwrap();
        assert_eq!(port, again);
        // each reassignment strictly increases the unlock time
        assert!(*arbiter.unlock_at.get(&port).unwrap() > first_unlock);
    }
}
