//! Critical section handling for the kernel
//!
//! Provides a single global interrupt gate with a true nesting counter:
//! interrupts are only re-enabled once the outermost guard is dropped, so
//! a function that takes a critical section internally can safely be
//! called from inside someone else's critical section.

use core::sync::atomic::{AtomicU32, Ordering};

/// Depth of nested critical sections currently held.
static NESTING: AtomicU32 = AtomicU32::new(0);

/// RAII guard for critical sections.
///
/// The first `enter()` disables interrupts. Nested `enter()` calls just
/// bump the nesting count. Interrupts are re-enabled only when the
/// nesting count returns to zero on `drop`.
pub struct CriticalSection {
    _private: (),
}

impl CriticalSection {
    /// Enter a critical section, disabling interrupts if not already inside one.
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        cortex_m::interrupt::disable();

        NESTING.fetch_add(1, Ordering::Acquire);
        CriticalSection { _private: () }
    }

    /// Check if we're currently inside a critical section.
    #[inline(always)]
    pub fn is_active() -> bool {
        NESTING.load(Ordering::Acquire) != 0
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        if NESTING.fetch_sub(1, Ordering::Release) == 1 {
            #[cfg(target_arch = "arm")]
            unsafe {
                cortex_m::interrupt::enable()
            };
        }
    }
}

/// Execute a closure with interrupts disabled.
///
/// The closure receives a reference to the critical section guard, which
/// can be used to access [`crate::core::cs_cell::CsCell`] protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an ISR context.
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
