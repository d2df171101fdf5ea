//! Pluggable upstream fault injection.
//!
//! The fetcher consults a [`FaultInjector`] once per outer attempt, before
//! the network call. The default strategy is [`NoFaults`], so production
//! builds never take a simulated failure path; tests supply [`FailFirst`] to
//! exercise the retry loop deterministically.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::FxError;

/// Strategy deciding whether an attempt should fail before reaching the wire.
pub trait FaultInjector: Send + Sync {
    /// An error to substitute for this attempt, or `None` to proceed.
    fn inject(&self) -> Option<FxError>;
}

/// Never injects anything. The production strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn inject(&self) -> Option<FxError> {
        None
    }
}

/// Fails the first `n` attempts with a transport error, then stands aside.
///
/// Deterministic, so tests can assert exact retry behavior: `FailFirst::new(2)`
/// makes a three-attempt fetch succeed on its final try, `FailFirst::new(3)`
/// exhausts it.
#[derive(Debug)]
pub struct FailFirst {
    remaining: AtomicU32,
}

impl FailFirst {
    /// A strategy that fails the next `n` attempts.
    pub fn new(n: u32) -> Self {
        Self {
            remaining: AtomicU32::new(n),
        }
    }
}

impl FaultInjector for FailFirst {
    fn inject(&self) -> Option<FxError> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| FxError::UpstreamTransport("injected fault".to_string()))
    }
}
