use may::sync::mpsc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Lifecycle of one exchange.
///
/// ```text
/// SyncActive ──start_async──▶ AsyncStarted ──dispatch──▶ AsyncDispatched
///     │                           │                          │ (dispatch coroutine begins)
///     │                           │                          ▼
///     │                           │                      SyncActive (re-entrant)
///     │                           └──complete──▶ AsyncCompleted ──▶ Closed
///     └──────── handler returns / forced ───────▶ AsyncCompleted ──▶ Closed
/// ```
///
/// `AsyncCompleted` is held while listeners run; `Closed` once the sink was
/// released. Both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    SyncActive,
    AsyncStarted,
    AsyncDispatched,
    AsyncCompleted,
    Closed,
}

impl DispatchState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, DispatchState::AsyncCompleted | DispatchState::Closed)
    }
}

/// Monotonic one-shot notification.
///
/// `fire` flips the flag exactly once and wakes every waiter; `wait` returns
/// immediately once fired. Waiters park on `may` channels, so both OS threads
/// and coroutines can wait without pinning a worker thread.
#[derive(Default)]
pub(crate) struct OneShot {
    fired: AtomicBool,
    waiters: Mutex<Vec<mpsc::Sender<()>>>,
}

impl OneShot {
    pub(crate) fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Returns `true` for the call that actually fired.
    pub(crate) fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        let waiters = std::mem::take(&mut *self.waiters.lock().unwrap_or_else(|e| e.into_inner()));
        for tx in waiters {
            // receiver may have given up
            let _ = tx.send(());
        }
        true
    }

    pub(crate) fn wait(&self) {
        let rx = {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            if self.is_fired() {
                return;
            }
            let (tx, rx) = mpsc::channel();
            waiters.push(tx);
            rx
        };
        let _ = rx.recv();
    }
}
