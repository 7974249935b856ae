//! Coalescing of concurrent access-token refreshes.
//!
//! The first request to see a 401 becomes the leader and performs the refresh;
//! every request that sees a 401 while the leader is working parks a oneshot
//! receiver and is released in one batch when the leader settles. A leader
//! dropped before settling (its request timed out or was abandoned) releases
//! the queue with [`RefreshFailure::Cancelled`].

use crate::RefreshFailure;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;
use tracing::debug;

pub(crate) type RefreshOutcome = Result<String, RefreshFailure>;

enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

/// Proof that the holder is the one caller allowed to run the refresh.
///
/// Must be handed back through [`RefreshCoordinator::settle`]; dropping it
/// unsettled rejects the waiters and returns the coordinator to idle.
pub(crate) struct RefreshTicket<'a> {
    coordinator: &'a RefreshCoordinator,
    generation: u64,
    settled: bool,
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let released = self
            .coordinator
            .release(self.generation, &Err(RefreshFailure::Cancelled));
        debug!(
            generation = self.generation,
            released, "Refresh leader dropped before settling"
        );
    }
}

pub(crate) enum RefreshRole<'a> {
    Leader(RefreshTicket<'a>),
    Waiter(oneshot::Receiver<RefreshOutcome>),
}

/// Owns the refresh-in-flight flag and the queue of waiting requests.
///
/// The lock is never held across an await point.
pub(crate) struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    /// Bumped by [`cancel`](Self::cancel); a leader whose ticket carries an
    /// older generation must not persist its result.
    generation: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            generation: AtomicU64::new(0),
        }
    }

    /// Become the leader if no refresh is running, otherwise join the queue.
    pub(crate) fn begin(&self) -> RefreshRole<'_> {
        let mut state = self.state.lock();
        match &mut *state {
            RefreshState::Refreshing { waiters } => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                RefreshRole::Waiter(rx)
            }
            RefreshState::Idle => {
                *state = RefreshState::Refreshing {
                    waiters: Vec::new(),
                };
                RefreshRole::Leader(RefreshTicket {
                    coordinator: self,
                    generation: self.generation.load(Ordering::SeqCst),
                    settled: false,
                })
            }
        }
    }

    /// Whether the ticket still belongs to the current generation.
    pub(crate) fn is_current(&self, ticket: &RefreshTicket<'_>) -> bool {
        ticket.generation == self.generation.load(Ordering::SeqCst)
    }

    /// Finish the leader's refresh: return to idle and release every waiter
    /// with `outcome`. Returns the number of waiters released.
    ///
    /// A stale ticket releases nothing; its waiters were already rejected by
    /// [`cancel`](Self::cancel) and the state may belong to a newer leader.
    pub(crate) fn settle(&self, mut ticket: RefreshTicket<'_>, outcome: &RefreshOutcome) -> usize {
        ticket.settled = true;
        self.release(ticket.generation, outcome)
    }

    fn release(&self, generation: u64, outcome: &RefreshOutcome) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            if generation != self.generation.load(Ordering::SeqCst) {
                return 0;
            }
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means the waiting request was abandoned.
            let _ = waiter.send(outcome.clone());
        }
        count
    }

    /// Reject every waiter with [`RefreshFailure::Cancelled`] and invalidate
    /// the running leader, if any. Returns the number of waiters rejected.
    pub(crate) fn cancel(&self) -> usize {
        let waiters = {
            let mut state = self.state.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        let count = waiters.len();
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshFailure::Cancelled));
        }
        count
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    pub(crate) fn waiter_count(&self) -> usize {
        match &*self.state.lock() {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }
}
