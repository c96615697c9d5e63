//! Lock-wait coordination for the embedded engine.
//!
//! SQLite calls the busy handler when another connection holds a lock it
//! needs. Instead of sleeping a fixed interval, the handler parks on one
//! process-wide condition variable that every statement finalization and
//! transaction end broadcasts. Each wait lasts at most one slice (`usleep`)
//! and the whole episode is bounded by the first-busy instant plus the
//! connection's `timeout`.

use std::{
    cell::Cell,
    sync::{Condvar, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// Default lock-wait budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default longest single wait.
pub const DEFAULT_SLICE: Duration = Duration::from_micros(10_000);

///
/// BusyCoordinator
///

struct BusyCoordinator {
    generation: Mutex<u64>,
    wake: Condvar,
}

static COORDINATOR: BusyCoordinator = BusyCoordinator {
    generation: Mutex::new(0),
    wake: Condvar::new(),
};

///
/// WaitState
/// Per-thread settings of the connection currently running a statement.
///

#[derive(Clone, Copy)]
struct WaitState {
    timeout: Duration,
    slice: Duration,
    first_busy: Option<Instant>,
}

thread_local! {
    static WAIT: Cell<WaitState> = const {
        Cell::new(WaitState {
            timeout: DEFAULT_TIMEOUT,
            slice: DEFAULT_SLICE,
            first_busy: None,
        })
    };
}

fn lock() -> MutexGuard<'static, u64> {
    COORDINATOR
        .generation
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Load one connection's wait settings before it runs a statement.
pub(crate) fn arm(timeout: Duration, slice: Duration) {
    WAIT.with(|state| {
        state.set(WaitState {
            timeout,
            slice,
            first_busy: None,
        });
    });
}

/// Wake every thread parked in [`busy_wait`].
pub fn broadcast() {
    let mut generation = lock();
    *generation = generation.wrapping_add(1);
    COORDINATOR.wake.notify_all();
}

/// Busy handler installed on every embedded connection.
///
/// Returns `true` to have SQLite retry the lock, `false` to give up with
/// `SQLITE_BUSY`. `count` is zero on the first call of a busy episode.
pub(crate) fn busy_wait(count: i32) -> bool {
    let now = Instant::now();
    let state = WAIT.with(|cell| {
        let mut state = cell.get();
        if count == 0 || state.first_busy.is_none() {
            state.first_busy = Some(now);
            cell.set(state);
        }
        state
    });

    let deadline = state.first_busy.unwrap_or(now) + state.timeout;
    let remaining = deadline.saturating_duration_since(now);
    if remaining.is_zero() {
        tracing::debug!(
            count,
            timeout_ms = state.timeout.as_millis(),
            "sqlite lock wait deadline passed"
        );
        return false;
    }

    let guard = lock();
    let seen = *guard;
    let wait = remaining.min(state.slice);
    let woken = match COORDINATOR
        .wake
        .wait_timeout_while(guard, wait, |generation| *generation == seen)
    {
        Ok((_, result)) => !result.timed_out(),
        Err(poisoned) => !poisoned.into_inner().1.timed_out(),
    };
    tracing::trace!(count, woken, "sqlite busy wait");

    true
}
