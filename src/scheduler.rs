use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct DebounceSlot {
    pending: Option<Callback>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
}

/// Runs only the last callback handed to `call` once `delay` passes without a
/// newer call. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    slot: Arc<Mutex<DebounceSlot>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(DebounceSlot::default())),
        }
    }

    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.slot);
        slot.pending = Some(Box::new(callback));
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }

        let generation = slot.generation;
        let shared = Arc::clone(&self.slot);
        let delay = self.delay;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let callback = {
                let mut slot = lock(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.timer = None;
                slot.pending.take()
            };
            if let Some(callback) = callback {
                callback();
            }
        }));
    }

    /// Drops the pending callback, if any, without running it.
    pub fn cancel(&self) -> bool {
        let mut slot = lock(&self.slot);
        slot.generation = slot.generation.wrapping_add(1);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        slot.pending.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

#[derive(Default)]
struct ThrottleSlot {
    last_run: Option<Instant>,
    pending: Option<Callback>,
    timer: Option<JoinHandle<()>>,
}

/// Runs at most one callback per `interval`. Calls inside the interval replace
/// the deferred callback, so the latest one runs when the interval elapses.
#[derive(Clone)]
pub struct Throttler {
    interval: Duration,
    slot: Arc<Mutex<ThrottleSlot>>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slot: Arc::new(Mutex::new(ThrottleSlot::default())),
        }
    }

    pub fn call<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let now = Instant::now();
        let mut slot = lock(&self.slot);
        let elapsed = slot.last_run.map(|last| now.saturating_duration_since(last));
        let ready = slot.timer.is_none() && elapsed.map_or(true, |elapsed| elapsed >= self.interval);

        if ready {
            slot.last_run = Some(now);
            drop(slot);
            tokio::spawn(async move {
                callback();
            });
            return;
        }

        slot.pending = Some(Box::new(callback));
        if slot.timer.is_some() {
            return;
        }

        let wait = elapsed
            .map(|elapsed| self.interval.saturating_sub(elapsed))
            .unwrap_or_default();
        let shared = Arc::clone(&self.slot);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let callback = {
                let mut slot = lock(&shared);
                slot.timer = None;
                slot.last_run = Some(Instant::now());
                slot.pending.take()
            };
            if let Some(callback) = callback {
                callback();
            }
        }));
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.slot).pending.is_some()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
