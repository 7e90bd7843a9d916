//! Cooperative cancellation shared by sampler chains.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Clonable flag; cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Why a chain stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// This chain hit the deadline and cancelled the others.
    Deadline,
    /// Another chain (or the caller) cancelled.
    Cancelled,
}

/// Deadline plus cancellation, polled on a fixed cadence.
#[derive(Debug, Clone)]
pub struct Budget {
    pub token: CancelToken,
    pub deadline: Option<Instant>,
    pub check_every: usize,
}

impl Budget {
    pub fn new(token: CancelToken, timeout: Option<Duration>, check_every: usize) -> Self {
        Self {
            token,
            deadline: timeout.map(|t| Instant::now() + t),
            check_every: check_every.max(1),
        }
    }

    /// Check on every `check_every`-th iteration; a passed deadline cancels
    /// every holder of the token.
    pub fn poll(&self, iteration: usize) -> Result<(), Interrupt> {
        if iteration % self.check_every != 0 {
            return Ok(());
        }
        if self.token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            self.token.cancel();
            return Err(Interrupt::Deadline);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn poll_respects_cadence_and_deadline() {
        let budget = Budget::new(CancelToken::new(), Some(Duration::ZERO), 4);
        assert_eq!(budget.poll(3), Ok(()));
        assert_eq!(budget.poll(4), Err(Interrupt::Deadline));
        assert!(budget.token.is_cancelled());
        assert_eq!(budget.poll(8), Err(Interrupt::Cancelled));
    }

    #[test]
    fn no_deadline_never_interrupts() {
        let budget = Budget::new(CancelToken::new(), None, 1);
        assert!((0..100).all(|i| budget.poll(i).is_ok()));
    }
}
