//! Session-wide cancellation signal.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, info};

/// Why a session was cancelled. Only the first reason is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The client went away or the transport signalled disconnect
    ClientDisconnected,
    /// Writing a frame to the client failed
    WriteFailed,
    /// The producer failed and the session is being torn down
    ProducerFailed,
    /// The session reached its terminal state; release whatever is left
    SessionEnded,
    /// Explicit abort by the host
    Aborted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::ClientDisconnected => write!(f, "client disconnected"),
            CancelReason::WriteFailed => write!(f, "write failed"),
            CancelReason::ProducerFailed => write!(f, "producer failed"),
            CancelReason::SessionEnded => write!(f, "session ended"),
            CancelReason::Aborted => write!(f, "aborted"),
        }
    }
}

/// Shared, idempotent cancellation for one session.
///
/// Clones observe the same signal. Once fired it stays fired.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session signal that also fires when `parent` is cancelled
    /// (server shutdown). Firing the session never touches the parent.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            reason: Arc::default(),
        }
    }

    /// Fire the signal. Returns `true` for the call that actually fired it.
    pub fn fire(&self, reason: CancelReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            match reason {
                CancelReason::SessionEnded => debug!(%reason, "session cancellation fired"),
                _ => info!(%reason, "session cancellation fired"),
            }
        }
        self.token.cancel();
        first
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<CancelReason> {
        self.reason.get().copied()
    }

    /// Completes once the signal fires.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// Token handed to collaborators that only need to observe the signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}
