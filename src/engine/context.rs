//! Per-call deadlines and caller cancellation.

use super::error::{TransportError, TransportResult};
use std::{future::Future, time::Duration};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-side context of a bridge call.
///
/// Cancelling the context aborts every call running under it; the call then
/// fails with [`TransportError::Cancelled`]. A context never extends a call
/// past the bridge's own per-call deadline.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancel: CancellationToken,
}

impl CallContext {
    /// A context that is only cancelled through [`CallContext::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    pub fn from_token(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// A context cancelled together with `self`, but cancellable on its own.
    pub fn child(&self) -> Self {
        Self { cancel: self.cancel.child_token() }
    }

    /// Cancel the context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the context was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Underlying token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Drive `fut` until it completes, the deadline passes, or the context is
    /// cancelled, whichever comes first.
    pub(crate) async fn run<F, T>(&self, deadline: Deadline, fut: F) -> TransportResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::Cancelled),
            result = tokio::time::timeout_at(deadline.instant(), fut) => {
                result.unwrap_or_else(|_| Err(TransportError::DeadlineExceeded))
            }
        }
    }
}

/// Hard upper bound of a single bridge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self { at: Instant::now() + timeout, timeout }
    }

    /// Instant the deadline elapses.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Timeout the deadline was derived from.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time left, zero once elapsed.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}
