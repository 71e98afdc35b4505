//! Semaphore implementation
//!
//! A counting semaphore is a [`queue::OsQueue`] of zero-sized elements:
//! each successful `post` enqueues a token, each successful `pend`
//! dequeues one. Since `()` has no representation, the backing array
//! costs no memory regardless of how large its const capacity is
//! declared, so the array itself is always sized to the largest count an
//! [`OsSemCtr`] can hold; the semaphore's actual capacity — 1 for a
//! binary semaphore, `max` for a counting one — is enforced as a runtime
//! bound on top, separately from that backing array size.

use core::cell::UnsafeCell;

use crate::error::{OsError, OsResult};
use crate::sync::queue::OsQueue;
use crate::types::{OsOpt, OsSemCtr, OsTick};

/// Capacity of the token queue backing every semaphore: the largest
/// value an [`OsSemCtr`] can represent. Never itself the semaphore's
/// advertised capacity — see `max` below.
const SEM_CAPACITY: usize = OsSemCtr::MAX as usize;

/// Counting semaphore
pub struct OsSem {
    queue: OsQueue<(), SEM_CAPACITY>,
    /// Highest count this semaphore may reach: 1 for a binary semaphore,
    /// the configured `max` for a counting one. `post` beyond this is an
    /// overflow, not a silent extra token.
    max: OsSemCtr,
}

impl OsSem {
    /// Create a new, un-initialized semaphore. Call
    /// [`create_binary`](Self::create_binary) or
    /// [`create_counting`](Self::create_counting) before first use.
    pub const fn new(_count: OsSemCtr) -> Self {
        OsSem {
            queue: OsQueue::new(),
            max: 0,
        }
    }

    /// Initialize as a binary semaphore: capacity 1, starting empty.
    pub fn create_binary(&mut self, name: &'static str) -> OsResult<()> {
        self.create_counting(1, 0, name)
    }

    /// Initialize as a counting semaphore: capacity `max`, starting at
    /// `initial` tokens (achieved by `initial` non-blocking sends).
    pub fn create_counting(
        &mut self,
        max: OsSemCtr,
        initial: OsSemCtr,
        name: &'static str,
    ) -> OsResult<()> {
        if initial > max {
            return Err(OsError::SemOvf);
        }

        self.queue.create(name)?;
        self.max = max;

        for _ in 0..initial {
            // Non-blocking: the queue was just created and `initial` is
            // already checked against `max`, so this can only fail on a
            // logic bug.
            self.queue
                .send((), 0, crate::types::opt::PEND_NON_BLOCKING)
                .map_err(|_| OsError::SemOvf)?;
        }
        Ok(())
    }

    /// Wait on (pend) the semaphore.
    ///
    /// * `timeout` - Maximum ticks to wait (`CFG_MAX_DELAY` = forever)
    /// * `pend_opt` - Pend options
    pub fn pend(&mut self, timeout: OsTick, pend_opt: OsOpt) -> OsResult<OsSemCtr> {
        self.queue.receive(timeout, pend_opt)?;
        Ok(self.count())
    }

    /// Signal (post) the semaphore. Refused with [`OsError::SemOvf`] once
    /// the count would exceed this semaphore's configured capacity.
    pub fn post(&mut self, post_opt: OsOpt) -> OsResult<OsSemCtr> {
        if self.count() >= self.max {
            return Err(OsError::SemOvf);
        }

        match self
            .queue
            .send((), 0, post_opt | crate::types::opt::PEND_NON_BLOCKING)
        {
            Ok(()) => Ok(self.count()),
            Err(OsError::PendWouldBlock) => Err(OsError::SemOvf),
            Err(e) => Err(e),
        }
    }

    /// Current token count.
    #[inline(always)]
    pub fn count(&self) -> OsSemCtr {
        self.queue.len() as OsSemCtr
    }
}

impl Default for OsSem {
    fn default() -> Self {
        Self::new(0)
    }
}

// ============ Safe Wrapper ============

pub struct Semaphore {
    inner: UnsafeCell<OsSem>,
}

unsafe impl Sync for Semaphore {}
unsafe impl Send for Semaphore {}

impl Semaphore {
    pub const fn new(count: OsSemCtr) -> Self {
        Semaphore {
            inner: UnsafeCell::new(OsSem::new(count)),
        }
    }

    /// Initialize as a binary semaphore: capacity 1, starting empty.
    pub fn create_binary(&self, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create_binary(name) }
    }

    /// Initialize as a counting semaphore: capacity `max`, starting at
    /// `initial` tokens.
    pub fn create_counting(&self, max: OsSemCtr, initial: OsSemCtr, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create_counting(max, initial, name) }
    }

    pub fn wait(&self, timeout: OsTick, opt: OsOpt) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).pend(timeout, opt) }
    }

    pub fn signal(&self, opt: OsOpt) -> OsResult<OsSemCtr> {
        unsafe { (*self.inner.get()).post(opt) }
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        unsafe { (*self.inner.get()).count() }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new(0)
    }
}
