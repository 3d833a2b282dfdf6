//! Pending replies and wait interruption
//!
//! The aggregation engine never touches sockets. It only needs something it
//! can wait on for a bounded time, ask whether it is done, and read the
//! outcome of once it is. [`PendingReply`] is that capability set;
//! [`ReplySlot`] is the one-shot implementation the bundled dispatcher hands
//! out.
//!
//! A blocking wait can be cut short by raising an [`Interrupt`]. Raising it
//! wakes every thread currently parked in a [`ReplySlot`] wait that was
//! given the same token.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::utils::{Interrupted, RequestError};

/// An in-flight request whose reply arrives exactly once
pub trait PendingReply: Send + Sync {
    type Output: Clone;
    type Error: Clone;

    /// Block until the reply arrives or `timeout` elapses
    ///
    /// Returns `Ok(true)` if the reply is available. Never cancels the
    /// request. A raised `interrupt` ends the wait with `Err(Interrupted)`,
    /// except that a reply already in hand is returned as `Ok(true)` without
    /// looking at the interrupt.
    fn await_for(&self, timeout: Duration, interrupt: &Interrupt) -> Result<bool, Interrupted>;

    /// Whether the reply has arrived
    fn is_done(&self) -> bool;

    /// The reply, once it has arrived
    fn outcome(&self) -> Option<Result<Self::Output, Self::Error>>;

    /// When the reply arrived, if the implementation tracks it
    fn completed_at(&self) -> Option<Instant> {
        None
    }
}

/// Something parked on a condition that an interrupt must wake
trait Wake: Send + Sync {
    fn wake(&self);
}

#[derive(Default)]
struct InterruptInner {
    raised: AtomicBool,
    watchers: Mutex<Vec<Weak<dyn Wake>>>,
}

/// Cancellation signal for blocking waits
///
/// Clones share the same signal. Once raised it stays raised.
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<InterruptInner>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal and wake every registered waiter
    pub fn raise(&self) {
        self.inner.raised.store(true, Ordering::SeqCst);
        let watchers = std::mem::take(&mut *self.inner.watchers.lock());
        for watcher in watchers.iter().filter_map(Weak::upgrade) {
            watcher.wake();
        }
    }

    pub fn is_raised(&self) -> bool {
        self.inner.raised.load(Ordering::SeqCst)
    }

    fn register(&self, watcher: Weak<dyn Wake>) {
        let mut watchers = self.inner.watchers.lock();
        watchers.retain(|w| w.strong_count() > 0);
        if !watchers.iter().any(|w| Weak::ptr_eq(w, &watcher)) {
            watchers.push(watcher);
        }
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("raised", &self.is_raised())
            .finish()
    }
}

struct SlotState<T, E> {
    outcome: Option<Result<T, E>>,
    completed_at: Option<Instant>,
}

struct Shared<T, E> {
    state: Mutex<SlotState<T, E>>,
    ready: Condvar,
}

impl<T: Send, E: Send> Wake for Shared<T, E> {
    fn wake(&self) {
        // Taking the lock orders this notify after the waiter's flag check
        let _guard = self.state.lock();
        self.ready.notify_all();
    }
}

/// Create a connected sender/slot pair
pub fn reply_channel<T, E>() -> (ReplySender<T, E>, ReplySlot<T, E>)
where
    E: From<RequestError>,
{
    let shared = Arc::new(Shared {
        state: Mutex::new(SlotState {
            outcome: None,
            completed_at: None,
        }),
        ready: Condvar::new(),
    });
    (
        ReplySender {
            shared: Some(Arc::clone(&shared)),
        },
        ReplySlot { shared },
    )
}

/// Completing half of a reply channel, owned by the I/O side
///
/// Dropping it without calling [`ReplySender::complete`] completes the slot
/// with [`RequestError::Abandoned`].
pub struct ReplySender<T, E: From<RequestError>> {
    shared: Option<Arc<Shared<T, E>>>,
}

impl<T, E: From<RequestError>> ReplySender<T, E> {
    pub fn complete(mut self, result: Result<T, E>) {
        if let Some(shared) = self.shared.take() {
            fill(&shared, result);
        }
    }
}

impl<T, E: From<RequestError>> Drop for ReplySender<T, E> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            fill(&shared, Err(E::from(RequestError::Abandoned)));
        }
    }
}

fn fill<T, E>(shared: &Shared<T, E>, result: Result<T, E>) {
    let mut state = shared.state.lock();
    state.outcome = Some(result);
    state.completed_at = Some(Instant::now());
    shared.ready.notify_all();
}

/// Waiting half of a reply channel
pub struct ReplySlot<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> ReplySlot<T, E> {
    /// A slot that is already complete, for replies known up front
    pub fn ready(result: Result<T, E>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SlotState {
                    outcome: Some(result),
                    completed_at: Some(Instant::now()),
                }),
                ready: Condvar::new(),
            }),
        }
    }
}

impl<T, E> PendingReply for ReplySlot<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    type Output = T;
    type Error = E;

    fn await_for(&self, timeout: Duration, interrupt: &Interrupt) -> Result<bool, Interrupted> {
        let mut state = self.shared.state.lock();
        if state.outcome.is_some() {
            return Ok(true);
        }
        if timeout.is_zero() {
            return Ok(false);
        }

        let watcher: Arc<dyn Wake> = self.shared.clone();
        interrupt.register(Arc::downgrade(&watcher));

        let deadline = Instant::now() + timeout;
        loop {
            if interrupt.is_raised() {
                return Err(Interrupted);
            }
            if state.outcome.is_some() {
                return Ok(true);
            }
            if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                return Ok(state.outcome.is_some());
            }
        }
    }

    fn is_done(&self) -> bool {
        self.shared.state.lock().outcome.is_some()
    }

    fn outcome(&self) -> Option<Result<T, E>> {
        self.shared.state.lock().outcome.clone()
    }

    fn completed_at(&self) -> Option<Instant> {
        self.shared.state.lock().completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    type Slot = ReplySlot<String, RequestError>;

    #[test]
    fn test_complete_then_wait() {
        let (tx, rx) = reply_channel::<String, RequestError>();
        tx.complete(Ok("pong".to_string()));

        assert!(rx.is_done());
        assert!(rx.await_for(Duration::from_millis(10), &Interrupt::new()).unwrap());
        assert_eq!(rx.outcome(), Some(Ok("pong".to_string())));
        assert!(rx.completed_at().is_some());
    }

    #[test]
    fn test_completed_slot_ignores_raised_interrupt() {
        let slot: Slot = ReplySlot::ready(Ok("pong".to_string()));
        let interrupt = Interrupt::new();
        interrupt.raise();

        assert_eq!(slot.await_for(Duration::from_millis(10), &interrupt), Ok(true));
    }

    #[test]
    fn test_wait_times_out_without_reply() {
        let (_tx, rx) = reply_channel::<String, RequestError>();
        let start = Instant::now();
        let done = rx.await_for(Duration::from_millis(20), &Interrupt::new()).unwrap();

        assert!(!done);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert!(rx.outcome().is_none());
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let (_tx, rx) = reply_channel::<String, RequestError>();
        let start = Instant::now();
        assert!(!rx.await_for(Duration::ZERO, &Interrupt::new()).unwrap());
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn test_completion_from_another_thread_wakes_waiter() {
        let (tx, rx) = reply_channel::<String, RequestError>();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.complete(Err(RequestError::Server("CLUSTERDOWN".to_string())));
        });

        assert!(rx.await_for(Duration::from_secs(5), &Interrupt::new()).unwrap());
        assert_eq!(
            rx.outcome(),
            Some(Err(RequestError::Server("CLUSTERDOWN".to_string())))
        );
        handle.join().unwrap();
    }

    #[test]
    fn test_dropped_sender_abandons() {
        let (tx, rx) = reply_channel::<String, RequestError>();
        drop(tx);
        assert_eq!(rx.outcome(), Some(Err(RequestError::Abandoned)));
    }

    #[test]
    fn test_interrupt_wakes_blocked_waiter() {
        let (_tx, rx) = reply_channel::<String, RequestError>();
        let interrupt = Interrupt::new();
        let raiser = interrupt.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            raiser.raise();
        });

        let start = Instant::now();
        let result = rx.await_for(Duration::from_secs(10), &interrupt);
        assert_eq!(result, Err(Interrupted));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!rx.is_done());
        handle.join().unwrap();
    }

    #[test]
    fn test_interrupt_raised_before_wait() {
        let (_tx, rx) = reply_channel::<String, RequestError>();
        let interrupt = Interrupt::new();
        interrupt.raise();
        assert_eq!(
            rx.await_for(Duration::from_secs(1), &interrupt),
            Err(Interrupted)
        );
    }

    #[test]
    fn test_ready_slot() {
        let slot = Slot::ready(Ok("x".to_string()));
        assert!(slot.is_done());
        assert_eq!(slot.outcome(), Some(Ok("x".to_string())));
    }
}
