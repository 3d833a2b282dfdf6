//! A single in-flight request stamped with its dispatch time

use std::fmt;
use std::time::{Duration, Instant};

use super::pending::{Interrupt, PendingReply};
use crate::utils::Interrupted;

/// Result of one bounded wait
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome<T, E> {
    /// The reply arrived (possibly before the wait started)
    Completed(Result<T, E>),
    /// The wait slice ran out while the request was still in flight
    TimedOut,
    /// No budget was left, and the request was not already done
    BudgetExhausted,
}

impl<T, E> WaitOutcome<T, E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, WaitOutcome::Completed(_))
    }
}

/// Handle around one dispatched request
///
/// `dispatched_at` is taken when the handle is built, which dispatchers do
/// before handing the request to the I/O layer.
pub struct TimedRequest<P> {
    pending: P,
    dispatched_at: Instant,
}

impl<P: PendingReply> TimedRequest<P> {
    pub fn new(pending: P) -> Self {
        Self {
            pending,
            dispatched_at: Instant::now(),
        }
    }

    pub fn dispatched_at(&self) -> Instant {
        self.dispatched_at
    }

    pub fn pending(&self) -> &P {
        &self.pending
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_done()
    }

    pub fn outcome(&self) -> Option<Result<P::Output, P::Error>> {
        self.pending.outcome()
    }

    /// Time from dispatch to reply, once the reply is in
    pub fn latency(&self) -> Option<Duration> {
        self.pending
            .completed_at()
            .map(|done| done.saturating_duration_since(self.dispatched_at))
    }

    /// Wait at most `remaining` for the reply
    ///
    /// A zero budget only checks whether the reply is already in. The
    /// request is never cancelled; a timed-out request can be waited on
    /// again later.
    pub fn bounded_wait(
        &self,
        remaining: Duration,
        interrupt: &Interrupt,
    ) -> Result<WaitOutcome<P::Output, P::Error>, Interrupted> {
        if remaining.is_zero() {
            return Ok(match self.pending.outcome() {
                Some(result) => WaitOutcome::Completed(result),
                None => WaitOutcome::BudgetExhausted,
            });
        }

        if !self.pending.await_for(remaining, interrupt)? {
            return Ok(WaitOutcome::TimedOut);
        }
        Ok(self
            .pending
            .outcome()
            .map_or(WaitOutcome::TimedOut, WaitOutcome::Completed))
    }
}

impl<P: PendingReply> fmt::Debug for TimedRequest<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedRequest")
            .field("dispatched_at", &self.dispatched_at)
            .field("done", &self.pending.is_done())
            .finish()
    }
}
