//! Mutex implementation with priority inheritance
//!
//! Built directly on the waiter-list wake protocol the generic queue
//! uses (see [`crate::sync::queue`]), rather than wrapping a queue
//! instance: a mutex needs to track an owner and boost its priority,
//! which a plain token queue has no notion of.

use core::ptr::NonNull;

use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::List;
use crate::sched;
use crate::sync::queue::{block_on, pend_outcome, wake_one};
use crate::task::OsTcb;
use crate::types::{opt, OsNestingCtr, OsObjType, OsOpt, OsPrio, OsTaskState, OsTick};

/// Mutex with priority inheritance
pub struct OsMutex {
    obj_type: OsObjType,
    waiters: List<OsTcb>,
    owner: Option<NonNull<OsTcb>>,
    /// The owner's priority at the moment it acquired the mutex, before
    /// any inheritance boost from a waiter. `post` restores to this value
    /// rather than the owner's `base_prio`, since a task that holds more
    /// than one mutex may already be boosted above its base priority by
    /// one of the others when it takes this one.
    owner_original_priority: OsPrio,
    held: bool,
    nesting_ctr: OsNestingCtr,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

unsafe impl Send for OsMutex {}
unsafe impl Sync for OsMutex {}

impl OsMutex {
    /// Create a new, un-initialized mutex. Call [`create`](Self::create)
    /// before use.
    pub const fn new() -> Self {
        OsMutex {
            obj_type: OsObjType::None,
            waiters: List::new(),
            owner: None,
            owner_original_priority: 0,
            held: false,
            nesting_ctr: 0,
            #[cfg(feature = "defmt")]
            name: "",
        }
    }

    /// Initialize the mutex.
    pub fn create(&mut self, _name: &'static str) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }

        critical_section(|_cs| {
            self.obj_type = OsObjType::Mutex;
            self.waiters.init();
            self.owner = None;
            self.owner_original_priority = 0;
            self.held = false;
            self.nesting_ctr = 0;
            #[cfg(feature = "defmt")]
            {
                self.name = _name;
            }
            Ok(())
        })
    }

    /// Acquire the mutex. If it is held by a lower-priority task, that
    /// task's priority is boosted to the caller's for the duration of
    /// the hold (priority inheritance); the boost is undone in
    /// [`post`](Self::post) once nothing else needs it.
    ///
    /// * `timeout` - Maximum ticks to wait (`CFG_MAX_DELAY` = forever)
    pub fn pend(&mut self, timeout: OsTick, pend_opt: OsOpt) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        if !kernel::KERNEL.is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Mutex {
            return Err(OsError::ObjType);
        }

        loop {
            let blocked = critical_section(|_cs| -> OsResult<bool> {
                let cur = unsafe { kernel::tcb_cur_ptr() }.ok_or(OsError::TcbInvalid)?;

                if !self.held {
                    self.held = true;
                    self.owner = Some(cur);
                    self.owner_original_priority = unsafe { cur.as_ref().prio };
                    self.nesting_ctr = 1;
                    return Ok(false);
                }

                if self.owner == Some(cur) {
                    if self.nesting_ctr == OsNestingCtr::MAX {
                        return Err(OsError::MutexOvf);
                    }
                    self.nesting_ctr += 1;
                    return Ok(false);
                }

                if pend_opt & opt::PEND_NON_BLOCKING != 0 {
                    return Err(OsError::PendWouldBlock);
                }
                if kernel::KERNEL.sched_lock_nesting() > 0 {
                    return Err(OsError::PendLocked);
                }

                let cur_prio = unsafe { cur.as_ref().prio };
                if let Some(mut owner) = self.owner {
                    let owner_ref = unsafe { owner.as_mut() };
                    if cur_prio > owner_ref.prio {
                        if owner_ref.task_state == OsTaskState::Ready {
                            unsafe { sched::os_rdy_list_change_prio(owner, cur_prio) };
                        } else {
                            owner_ref.prio = cur_prio;
                        }
                    }
                }

                unsafe { block_on(&mut self.waiters, cur, timeout) };
                Ok(true)
            })?;

            if !blocked {
                return Ok(());
            }

            sched::os_sched();
            pend_outcome()?;
        }
    }

    /// Release the mutex. If the caller's priority was boosted by
    /// inheritance, it is restored to the priority it held when it
    /// acquired this mutex (not necessarily its task base priority — it
    /// may still be boosted on behalf of another mutex it holds).
    pub fn post(&mut self, post_opt: OsOpt) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::AcceptIsr);
        }
        if !kernel::KERNEL.is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Mutex {
            return Err(OsError::ObjType);
        }

        critical_section(|_cs| {
            let cur = unsafe { kernel::tcb_cur_ptr() }.ok_or(OsError::TcbInvalid)?;

            if self.owner != Some(cur) {
                return Err(OsError::MutexNotOwner);
            }

            if self.nesting_ctr > 1 {
                self.nesting_ctr -= 1;
                return Ok(());
            }

            self.nesting_ctr = 0;
            self.held = false;
            self.owner = None;

            let original_prio = self.owner_original_priority;
            let cur_tcb = unsafe { &mut *cur.as_ptr() };
            if cur_tcb.prio != original_prio {
                if cur_tcb.task_state == OsTaskState::Ready {
                    unsafe { sched::os_rdy_list_change_prio(cur, original_prio) };
                } else {
                    cur_tcb.prio = original_prio;
                }
            }

            // The woken waiter does not inherit ownership here — it is
            // only made ready, and re-acquires (or loses, to a higher
            // priority contender) via its own `pend` retry loop.
            unsafe { wake_one(&mut self.waiters) };

            if post_opt & opt::POST_NO_SCHED == 0 {
                sched::os_sched();
            }

            Ok(())
        })
    }

    /// Whether the mutex is currently held.
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.held
    }

    /// Priority of the current owner, if held.
    pub fn owner_prio(&self) -> Option<crate::types::OsPrio> {
        self.owner.map(|ptr| unsafe { ptr.as_ref().prio })
    }
}

impl Default for OsMutex {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Safe Wrapper ============

use core::cell::UnsafeCell;

pub struct Mutex {
    inner: UnsafeCell<OsMutex>,
}

unsafe impl Sync for Mutex {}
unsafe impl Send for Mutex {}

impl Mutex {
    pub const fn new() -> Self {
        Mutex {
            inner: UnsafeCell::new(OsMutex::new()),
        }
    }

    pub fn create(&self, name: &'static str) -> OsResult<()> {
        unsafe { (*self.inner.get()).create(name) }
    }

    pub fn lock(&self, timeout: OsTick, opt: OsOpt) -> OsResult<()> {
        unsafe { (*self.inner.get()).pend(timeout, opt) }
    }

    pub fn unlock(&self, opt: OsOpt) -> OsResult<()> {
        unsafe { (*self.inner.get()).post(opt) }
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        unsafe { (*self.inner.get()).is_owned() }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
