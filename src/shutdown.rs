//! Waiting for termination
//!
//! SIGINT and SIGTERM are blocked and collected with `sigwait`, so the
//! display is always released on the main control path and never from a
//! signal handler. Tests wait on a `CancellationToken` instead.

use std::fmt;
#[cfg(test)]
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use log::debug;
use nix::sys::signal::{SigSet, SigmaskHow, Signal};

use crate::error::DisplayError;

/// Why the wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    Signal(Signal),
    #[cfg(test)]
    Cancelled,
}

impl fmt::Display for TerminationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationCause::Signal(sig) => write!(f, "{}", sig.as_str()),
            #[cfg(test)]
            TerminationCause::Cancelled => write!(f, "cancellation"),
        }
    }
}

/// Blocks the calling thread until it is told to stop. No timeout.
pub trait Termination {
    fn wait(&self) -> Result<TerminationCause, DisplayError>;
}

/// SIGINT/SIGTERM waiter
///
/// Installing blocks both signals for the current thread; a signal that
/// arrives before `wait` stays pending and ends the wait immediately.
pub struct SignalWaiter {
    mask: SigSet,
    /// Original signal mask to restore on drop
    old_mask: SigSet,
}

impl SignalWaiter {
    pub fn install() -> Result<Self, DisplayError> {
        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);

        let old_mask = mask
            .thread_swap_mask(SigmaskHow::SIG_BLOCK)
            .map_err(|errno| DisplayError::Wait {
                source: errno.into(),
            })?;
        debug!("SIGINT/SIGTERM blocked");

        Ok(Self { mask, old_mask })
    }
}

impl Termination for SignalWaiter {
    fn wait(&self) -> Result<TerminationCause, DisplayError> {
        let signal = self.mask.wait().map_err(|errno| DisplayError::Wait {
            source: errno.into(),
        })?;
        Ok(TerminationCause::Signal(signal))
    }
}

impl Drop for SignalWaiter {
    fn drop(&mut self) {
        self.old_mask.thread_set_mask().ok();
    }
}

/// Cloneable cancellation flag with a blocking wait
#[cfg(test)]
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

#[cfg(test)]
impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
impl Termination for CancellationToken {
    fn wait(&self) -> Result<TerminationCause, DisplayError> {
        let (lock, cvar) = &*self.inner;
        let mut cancelled = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            cancelled = cvar.wait(cancelled).unwrap_or_else(PoisonError::into_inner);
        }
        Ok(TerminationCause::Cancelled)
    }
}
