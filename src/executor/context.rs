//! Unified execution context
//!
//! One handle carries both the task deadline and its cancellation, so
//! executors can await a single `done()` and the orchestrator can ask
//! which of the two ended the run.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Longest deadline a context will carry
///
/// Larger timeouts are clamped so the deadline arithmetic cannot overflow.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Why a context finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DoneReason {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoneReason::Canceled => write!(f, "context canceled"),
            DoneReason::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

/// Where cancellation can come from besides `cancel()` and the deadline
#[derive(Debug)]
enum Upstream {
    None,
    /// External cancel signal; firing it always means Canceled
    Signal(CancellationToken),
    Context(ExecutionContext),
}

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    deadline: Instant,
    timeout: Duration,
    reason: OnceLock<DoneReason>,
    upstream: Upstream,
}

/// Deadline-bound, cancellable context handed to every executor call
///
/// Cheap to clone; clones observe the same state.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

/// `timeout` from now, clamped to `MAX_TIMEOUT`
pub fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout.min(MAX_TIMEOUT)
}

impl ExecutionContext {
    fn build(token: CancellationToken, timeout: Duration, deadline: Instant, upstream: Upstream) -> Self {
        Self {
            inner: Arc::new(Inner {
                token,
                deadline,
                timeout: timeout.min(MAX_TIMEOUT),
                reason: OnceLock::new(),
                upstream,
            }),
        }
    }

    /// Standalone context that expires after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(CancellationToken::new(), timeout, deadline_after(timeout), Upstream::None)
    }

    /// Context cancelled as soon as `signal` fires
    ///
    /// A fired signal reports `Canceled` even when observed after the
    /// deadline; whoever fires it must not do so once the deadline passed.
    pub fn linked(signal: &CancellationToken, timeout: Duration) -> Self {
        Self::build(
            signal.child_token(),
            timeout,
            deadline_after(timeout),
            Upstream::Signal(signal.clone()),
        )
    }

    /// Derive a narrower context, bounded by both this deadline and `timeout`
    pub fn child(&self, timeout: Duration) -> Self {
        let deadline = deadline_after(timeout).min(self.inner.deadline);
        Self::build(
            self.inner.token.child_token(),
            timeout,
            deadline,
            Upstream::Context(self.clone()),
        )
    }

    /// Cancel explicitly; idempotent
    ///
    /// After the deadline the context is already done, so the reason stays
    /// `DeadlineExceeded`.
    pub fn cancel(&self) {
        let reason = if Instant::now() >= self.inner.deadline {
            DoneReason::DeadlineExceeded
        } else {
            DoneReason::Canceled
        };
        let _ = self.inner.reason.set(reason);
        self.inner.token.cancel();
    }

    /// `None` while live, otherwise the reason that fired first
    pub fn err(&self) -> Option<DoneReason> {
        if let Some(reason) = self.inner.reason.get() {
            return Some(*reason);
        }

        let upstream = match &self.inner.upstream {
            Upstream::Signal(signal) if signal.is_cancelled() => Some(DoneReason::Canceled),
            Upstream::Context(parent) => parent.err(),
            _ => None,
        };
        if let Some(reason) = upstream {
            return Some(self.finish(reason));
        }

        if Instant::now() >= self.inner.deadline {
            return Some(self.finish(DoneReason::DeadlineExceeded));
        }

        if self.inner.token.is_cancelled() {
            return Some(self.finish(DoneReason::Canceled));
        }

        None
    }

    fn finish(&self, reason: DoneReason) -> DoneReason {
        let reason = *self.inner.reason.get_or_init(|| reason);
        self.inner.token.cancel();
        reason
    }

    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once cancelled or past the deadline
    pub async fn done(&self) -> DoneReason {
        tokio::select! {
            _ = self.inner.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.inner.deadline) => {}
        }
        self.err().unwrap_or(DoneReason::DeadlineExceeded)
    }

    pub fn remaining(&self) -> Duration {
        self.inner.deadline.saturating_duration_since(Instant::now())
    }

    pub fn deadline(&self) -> Instant {
        self.inner.deadline
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }
}
