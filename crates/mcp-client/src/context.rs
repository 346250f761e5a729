//! Per-call deadline and cancellation.
//!
//! Every blocking operation (connect, ping, tool calls) takes a
//! [`CallContext`]. Dropping a future already cancels it; the context adds
//! the two things a dropped future cannot express: a deadline that spans
//! several awaits, and a token another task can trip.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::McpError;

/// Deadline and cancellation scope for one caller.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    /// A context with no deadline that is never cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// A fresh context bounded by `timeout` from now.
    pub fn with_timeout_from_now(timeout: Duration) -> Self {
        Self::background().with_timeout(timeout)
    }

    /// A fresh context that is cancelled together with `token`.
    pub fn with_cancel(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            cancel: token,
        }
    }

    /// Derive a child context whose deadline is the earlier of the
    /// current one and `now + timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context bounded by `deadline` (never extended).
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            deadline: Some(deadline),
            cancel: self.cancel.child_token(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drive `fut` until it completes, the deadline passes, or the
    /// context is cancelled, whichever comes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, McpError>
    where
        F: Future<Output = Result<T, McpError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(McpError::Cancelled);
        }
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => Err(McpError::Cancelled),
                res = tokio::time::timeout_at(deadline, fut) => {
                    res.unwrap_or(Err(McpError::DeadlineExceeded))
                }
            },
            None => tokio::select! {
                _ = self.cancel.cancelled() => Err(McpError::Cancelled),
                res = fut => res,
            },
        }
    }
}
