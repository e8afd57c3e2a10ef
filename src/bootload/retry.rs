use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::warn;

use crate::device::DeviceError;
use crate::Error;

/// The number of device failures a single bootload may still absorb.
///
/// One budget is shared by every phase of a bootload, so a failure while programming spends
/// from the same pool as a failure while entering or leaving the bootloader.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RetryBudget {
    remaining: u32,
}

impl RetryBudget {
    pub fn new(tries: u32) -> RetryBudget {
        RetryBudget { remaining: tries }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Records a failed attempt.
    ///
    /// Returns `Error::RetryBudgetExhausted` carrying `err` once the last try has been spent,
    /// otherwise the caller may recover and try again.
    pub fn spend(&mut self, err: DeviceError) -> Result<(), Error> {
        self.remaining = self.remaining.saturating_sub(1);

        if self.remaining == 0 {
            return Err(Error::RetryBudgetExhausted(err));
        }

        warn!("Device error: {} ({} tries left)", err, self.remaining);

        Ok(())
    }
}

/// A cooperative cancellation flag for a running bootload.
///
/// Clones share the same flag. Cancellation is observed before a bootload starts, between pages
/// and between retry attempts, never in the middle of a page. Once set the flag stays set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Error::Cancelled` if cancellation has been requested
    pub fn check(&self) -> Result<(), Error> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
