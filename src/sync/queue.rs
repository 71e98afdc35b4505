//! Generic message queue
//!
//! A fixed-capacity circular buffer with two intrusive waiter lists — one
//! for tasks blocked because the queue is full, one for tasks blocked
//! because it is empty. Both are strict FIFO: a waiter is always tail-
//! inserted, so the task that has been waiting longest always wakes
//! first, regardless of priority.
//!
//! [`crate::sem::OsSem`] is a thin adapter over a queue of `()` — an
//! element with no payload turns the queue into a pure counter, and
//! since `MaybeUninit<()>` is zero-sized, the backing array costs no
//! memory no matter how large its const capacity is declared.

use core::mem::MaybeUninit;
use core::ptr::NonNull;

use crate::config::CFG_MAX_DELAY;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::list::List;
use crate::sched;
use crate::task::OsTcb;
use crate::time::add_to_delayed_list;
use crate::types::{opt, OsObjType, OsOpt, OsPendStatus, OsTaskState, OsTick};

/// Link the current task into `waiters`, optionally registering it on
/// the delayed list too when `timeout != CFG_MAX_DELAY`.
///
/// # Safety
/// Must be called with the kernel's critical section held; `cur` must
/// be the currently running task and not already linked into any list.
pub(crate) unsafe fn block_on(waiters: &mut List<OsTcb>, mut cur: NonNull<OsTcb>, timeout: OsTick) {
    let tcb = unsafe { cur.as_mut() };

    unsafe {
        sched::os_rdy_list_remove(cur);
    }

    tcb.pend_status = OsPendStatus::Ok;
    let node = NonNull::from(&mut tcb.event_node);
    unsafe {
        waiters.insert_tail(node);
    }

    if timeout == CFG_MAX_DELAY {
        tcb.task_state = OsTaskState::Pend;
    } else {
        tcb.task_state = OsTaskState::PendTimeout;
        unsafe {
            add_to_delayed_list(cur, timeout);
        }
    }
}

/// Unblock the head of `waiters`, moving it back onto the ready list.
/// Returns its owner, if any.
///
/// # Safety
/// Must be called with the kernel's critical section held.
pub(crate) unsafe fn wake_one(waiters: &mut List<OsTcb>) -> Option<NonNull<OsTcb>> {
    let owner = waiters.head_owner()?;
    let tcb = unsafe { &mut *owner.as_ptr() };

    unsafe {
        tcb.event_node.unlink();
        tcb.state_node.unlink();
    }

    tcb.pend_status = OsPendStatus::Ok;
    tcb.task_state = OsTaskState::Ready;
    unsafe {
        sched::os_rdy_list_insert(owner);
    }

    Some(owner)
}

/// Translate the current task's `pend_status` into the result of the
/// blocking call it just woke from.
pub(crate) fn pend_outcome() -> OsResult<()> {
    let cur = unsafe { kernel::tcb_cur_ptr() }.ok_or(OsError::TcbInvalid)?;
    let tcb = unsafe { cur.as_ref() };
    match tcb.pend_status {
        OsPendStatus::Ok => Ok(()),
        OsPendStatus::Timeout => Err(OsError::Timeout),
        OsPendStatus::Abort => Err(OsError::PendAbort),
        OsPendStatus::Del => Err(OsError::ObjDel),
    }
}

enum Progress {
    Done,
    Blocked,
}

/// A bounded FIFO queue of up to `N` elements of type `T`.
pub struct OsQueue<T, const N: usize> {
    obj_type: OsObjType,
    recv_waiters: List<OsTcb>,
    send_waiters: List<OsTcb>,
    buf: [MaybeUninit<T>; N],
    head: usize,
    len: usize,
    #[cfg(feature = "defmt")]
    name: &'static str,
}

unsafe impl<T: Send, const N: usize> Send for OsQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for OsQueue<T, N> {}

impl<T, const N: usize> OsQueue<T, N> {
    /// Create an empty, un-initialized queue. Call [`create`](Self::create)
    /// before use.
    pub const fn new() -> Self {
        OsQueue {
            obj_type: OsObjType::None,
            recv_waiters: List::new(),
            send_waiters: List::new(),
            // Sound: an array of `MaybeUninit<T>` is valid in any bit
            // pattern, including this one.
            buf: unsafe { MaybeUninit::uninit().assume_init() },
            head: 0,
            len: 0,
            #[cfg(feature = "defmt")]
            name: "",
        }
    }

    /// Initialize (or reset) the queue.
    pub fn create(&mut self, _name: &'static str) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::CreateIsr);
        }

        critical_section(|_cs| {
            while self.len > 0 {
                let slot = self.head;
                unsafe { self.buf[slot].assume_init_drop() };
                self.head = (self.head + 1) % N;
                self.len -= 1;
            }

            self.obj_type = OsObjType::Queue;
            self.recv_waiters.init();
            self.send_waiters.init();
            self.head = 0;
            self.len = 0;
            #[cfg(feature = "defmt")]
            {
                self.name = _name;
            }
            Ok(())
        })
    }

    /// Number of elements currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Send an item, blocking up to `timeout` ticks if the queue is full
    /// (`CFG_MAX_DELAY` waits forever).
    pub fn send(&mut self, item: T, timeout: OsTick, send_opt: OsOpt) -> OsResult<()> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        if !kernel::KERNEL.is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Queue {
            return Err(OsError::ObjType);
        }

        let mut item = Some(item);

        loop {
            let progress = critical_section(|_cs| -> OsResult<Progress> {
                if self.len < N {
                    let slot = (self.head + self.len) % N;
                    self.buf[slot] = MaybeUninit::new(item.take().unwrap());
                    self.len += 1;
                    unsafe {
                        wake_one(&mut self.recv_waiters);
                    }
                    return Ok(Progress::Done);
                }

                if send_opt & opt::PEND_NON_BLOCKING != 0 {
                    return Err(OsError::PendWouldBlock);
                }
                if kernel::KERNEL.sched_lock_nesting() > 0 {
                    return Err(OsError::PendLocked);
                }

                let cur = unsafe { kernel::tcb_cur_ptr() }.ok_or(OsError::TcbInvalid)?;
                unsafe { block_on(&mut self.send_waiters, cur, timeout) };
                Ok(Progress::Blocked)
            })?;

            sched::os_sched();

            match progress {
                Progress::Done => return Ok(()),
                Progress::Blocked => pend_outcome()?,
            }
        }
    }

    /// Receive an item, blocking up to `timeout` ticks if the queue is
    /// empty (`CFG_MAX_DELAY` waits forever).
    pub fn receive(&mut self, timeout: OsTick, recv_opt: OsOpt) -> OsResult<T> {
        if is_isr_context() {
            return Err(OsError::PendIsr);
        }
        if !kernel::KERNEL.is_running() {
            return Err(OsError::OsNotRunning);
        }
        if self.obj_type != OsObjType::Queue {
            return Err(OsError::ObjType);
        }

        loop {
            let outcome = critical_section(|_cs| -> OsResult<Option<T>> {
                if self.len > 0 {
                    let slot = self.head;
                    let item = unsafe { self.buf[slot].assume_init_read() };
                    self.head = (self.head + 1) % N;
                    self.len -= 1;
                    unsafe {
                        wake_one(&mut self.send_waiters);
                    }
                    return Ok(Some(item));
                }

                if recv_opt & opt::PEND_NON_BLOCKING != 0 {
                    return Err(OsError::PendWouldBlock);
                }
                if kernel::KERNEL.sched_lock_nesting() > 0 {
                    return Err(OsError::PendLocked);
                }

                let cur = unsafe { kernel::tcb_cur_ptr() }.ok_or(OsError::TcbInvalid)?;
                unsafe { block_on(&mut self.recv_waiters, cur, timeout) };
                Ok(None)
            })?;

            sched::os_sched();

            match outcome {
                Some(item) => return Ok(item),
                None => pend_outcome()?,
            }
        }
    }

    /// Flush everyone waiting to send or receive with
    /// [`OsError::ObjDel`]-equivalent abort status, used when the queue
    /// is torn down while tasks are pending on it.
    pub fn flush_waiters(&mut self) {
        critical_section(|_cs| unsafe {
            while let Some(owner) = self.recv_waiters.head_owner() {
                let tcb = &mut *owner.as_ptr();
                tcb.event_node.unlink();
                tcb.state_node.unlink();
                tcb.pend_status = OsPendStatus::Del;
                tcb.task_state = OsTaskState::Ready;
                sched::os_rdy_list_insert(owner);
            }
            while let Some(owner) = self.send_waiters.head_owner() {
                let tcb = &mut *owner.as_ptr();
                tcb.event_node.unlink();
                tcb.state_node.unlink();
                tcb.pend_status = OsPendStatus::Del;
                tcb.task_state = OsTaskState::Ready;
                sched::os_rdy_list_insert(owner);
            }
        });
        sched::os_sched();
    }
}

impl<T, const N: usize> Default for OsQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_queue_is_empty() {
        let q: OsQueue<u32, 4> = OsQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.len(), 0);
    }
}
