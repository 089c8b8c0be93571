//! Timer capability used to debounce threshold driven refetches.
//!
//! Engines never touch a clock themselves; they ask an injected [`Scheduler`]
//! for a timeout and react to [`FreqAction::DebounceElapsed`] once the host
//! delivers it.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::action::FreqAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

/// `setTimeout`/`clearTimeout` equivalent
pub trait Scheduler {
    fn set_timeout(&mut self, delay: Duration) -> TimerId;
    fn clear_timeout(&mut self, id: TimerId);
}

/// Holds at most one pending refetch timer; a new request replaces the old one
pub struct FetchDebouncer {
    delay: Duration,
    pending: Option<TimerId>,
    scheduler: Box<dyn Scheduler>,
}

impl FetchDebouncer {
    pub fn new(delay: Duration, scheduler: Box<dyn Scheduler>) -> Self {
        Self {
            delay,
            pending: None,
            scheduler,
        }
    }

    pub fn request(&mut self) -> TimerId {
        self.cancel();
        let id = self.scheduler.set_timeout(self.delay);
        trace!("debounced refetch armed as {:?}", id);
        self.pending = Some(id);
        id
    }

    /// Drop the pending timer, if any
    pub fn cancel(&mut self) {
        if let Some(prev) = self.pending.take() {
            self.scheduler.clear_timeout(prev);
            trace!("debounced refetch {:?} cancelled", prev);
        }
    }

    /// True when `id` is the timer currently pending; consumes it
    pub fn take_elapsed(&mut self, id: TimerId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(Debug, Default)]
struct ManualClock {
    now: Duration,
    next_id: u64,
    timers: Vec<(TimerId, Duration)>,
}

/// Deterministic scheduler driven by a virtual clock
///
/// Cloning yields another handle to the same clock, so a test can keep one
/// handle while the engine owns the other.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Rc<RefCell<ManualClock>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward and return the timers that fired, earliest first
    pub fn advance(&self, by: Duration) -> Vec<TimerId> {
        let mut clock = self.inner.borrow_mut();
        clock.now += by;
        let now = clock.now;
        let mut fired: Vec<(TimerId, Duration)> = Vec::new();
        clock.timers.retain(|&(id, deadline)| {
            if deadline <= now {
                fired.push((id, deadline));
                false
            } else {
                true
            }
        });
        fired.sort_by_key(|&(id, deadline)| (deadline, id));
        fired.into_iter().map(|(id, _)| id).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.borrow().timers.len()
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        let mut clock = self.inner.borrow_mut();
        clock.next_id += 1;
        let id = TimerId(clock.next_id);
        let deadline = clock.now + delay;
        clock.timers.push((id, deadline));
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.inner.borrow_mut().timers.retain(|&(t, _)| t != id);
    }
}

/// Scheduler backed by tokio timers, delivering elapsed timers as actions
///
/// Must be used from within a tokio runtime.
pub struct TokioScheduler {
    action_tx: UnboundedSender<FreqAction>,
    next_id: u64,
    tasks: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(action_tx: UnboundedSender<FreqAction>) -> Self {
        Self {
            action_tx,
            next_id: 0,
            tasks: HashMap::new(),
        }
    }
}

impl Scheduler for TokioScheduler {
    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.tasks.retain(|_, handle| !handle.is_finished());
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.action_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FreqAction::DebounceElapsed(id));
        });
        self.tasks.insert(id, handle);
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        if let Some(handle) = self.tasks.remove(&id) {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}
