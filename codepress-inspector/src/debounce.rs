use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Default quiet window before a coalesced run starts.
pub const DEFAULT_QUIET: Duration = Duration::from_millis(150);

struct State<T> {
    pending: Option<T>,
    /// Bumped on every submission so the worker can tell whether the quiet window was disturbed.
    generation: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    wake: Notify,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A poisoned slot still holds a valid payload.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Producer side of a single-slot queue. Cheap to clone.
pub struct CoalescerHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for CoalescerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> CoalescerHandle<T> {
    /// Replace the pending payload. Returns false once closed.
    pub fn submit(&self, payload: T) -> bool {
        self.update(|_| payload)
    }

    /// Build the new pending payload from the one it replaces.
    pub fn update(&self, f: impl FnOnce(Option<T>) -> T) -> bool {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return false;
            }
            let previous = state.pending.take();
            if previous.is_some() {
                tracing::trace!("coalesced pending request");
            }
            state.pending = Some(f(previous));
            state.generation += 1;
        }
        self.shared.wake.notify_one();
        true
    }

    /// Drop any pending payload and stop the worker after its current run.
    pub fn close(&self) {
        {
            let mut state = self.shared.lock();
            state.closed = true;
            if state.pending.take().is_some() {
                tracing::debug!("cancelled pending run");
            }
        }
        self.shared.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

/// Worker side: runs the callback with the latest payload, at most one run at a time.
pub struct Coalescer<T> {
    shared: Arc<Shared<T>>,
    quiet: Duration,
}

pub fn coalescer<T>(quiet: Duration) -> (CoalescerHandle<T>, Coalescer<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            pending: None,
            generation: 0,
            closed: false,
        }),
        wake: Notify::new(),
    });
    (
        CoalescerHandle {
            shared: shared.clone(),
        },
        Coalescer { shared, quiet },
    )
}

impl<T> Coalescer<T> {
    pub fn handle(&self) -> CoalescerHandle<T> {
        CoalescerHandle {
            shared: self.shared.clone(),
        }
    }

    /// Drive runs until the handle is closed. Returns how many runs executed.
    pub async fn run<F>(self, mut f: F) -> usize
    where
        F: FnMut(T),
    {
        let mut runs = 0;
        loop {
            let Some(mut seen) = self.wait_for_submission().await else {
                return runs;
            };

            if !self.quiet.is_zero() {
                loop {
                    tokio::time::sleep(self.quiet).await;
                    let state = self.shared.lock();
                    if state.closed || state.generation == seen {
                        break;
                    }
                    seen = state.generation;
                }
            }

            let payload = {
                let mut state = self.shared.lock();
                if state.closed {
                    return runs;
                }
                state.pending.take()
            };

            if let Some(payload) = payload {
                f(payload);
                runs += 1;
            }
        }
    }

    /// Generation of the pending submission, or `None` when closed.
    async fn wait_for_submission(&self) -> Option<u64> {
        loop {
            {
                let state = self.shared.lock();
                if state.closed {
                    return None;
                }
                if state.pending.is_some() {
                    return Some(state.generation);
                }
            }
            self.shared.wake.notified().await;
        }
    }
}
