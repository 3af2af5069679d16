//! Engine lifecycle state and the in-flight handler counter.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// Lifecycle of an [`Engine`](super::Engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Handlers and hooks may still be registered; traffic is not dispatched.
    Configuring,
    /// Messages are dispatched.
    Running,
    /// New messages are dropped while in-flight handlers finish.
    Draining,
    /// Dispatch has ended.
    Stopped,
}

impl Lifecycle {
    const fn as_u8(self) -> u8 {
        match self {
            Self::Configuring => 0,
            Self::Running => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Configuring,
            1 => Self::Running,
            2 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuring => "configuring",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Atomic holder for the current [`Lifecycle`].
#[derive(Debug)]
pub(crate) struct LifecycleCell(AtomicU8);

impl LifecycleCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(Lifecycle::Configuring.as_u8()))
    }

    pub(crate) fn get(&self) -> Lifecycle {
        Lifecycle::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: Lifecycle) {
        self.0.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Moves from `from` to `to`; on mismatch returns the actual state.
    pub(crate) fn transition(&self, from: Lifecycle, to: Lifecycle) -> Result<(), Lifecycle> {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(Lifecycle::from_u8)
    }
}

/// Counts synchronous dispatch work so draining can wait for it.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    pub(crate) fn enter(&self) -> InFlightGuard<'_> {
        *self.lock() += 1;
        InFlightGuard { owner: self }
    }

    pub(crate) fn count(&self) -> usize {
        *self.lock()
    }

    /// Blocks until the count reaches zero or `timeout` expires. On expiry
    /// returns the count still in flight.
    pub(crate) fn wait_idle(&self, timeout: Duration) -> Result<(), usize> {
        let guard = self.lock();
        let (guard, result) = self
            .idle
            .wait_timeout_while(guard, timeout, |count| *count > 0)
            .unwrap_or_else(|poison| poison.into_inner());
        if result.timed_out() && *guard > 0 {
            Err(*guard)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

/// Decrements the in-flight count when dropped, including during unwinding.
pub(crate) struct InFlightGuard<'a> {
    owner: &'a InFlight,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.owner.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.owner.idle.notify_all();
        }
    }
}
