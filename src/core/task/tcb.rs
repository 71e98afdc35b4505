//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information needed to manage a task.

use core::ptr::NonNull;

use crate::core::list::ListItem;
use crate::types::{
    OsNestingCtr, OsOpt, OsPendStatus, OsPrio, OsStkElement, OsTaskState, OsTick,
};

/// Task Control Block
///
/// Carries two independent list nodes: `state_node` tracks exactly one of
/// ready/suspended/delayed/termination membership, and `event_node` tracks
/// at most one waiter-list membership. A task can be on both at once —
/// blocked on a queue/mutex/semaphore with a timeout means linked via
/// `event_node` into that object's waiter list *and* via `state_node` into
/// the delayed list, so whichever fires first (a post, or the timeout)
/// unlinks the other side.
#[repr(C)]
pub struct OsTcb {
    // ============ Stack pointer — MUST be first field (port ABI) ============
    pub stk_ptr: *mut OsStkElement,

    // ============ Stack information ============
    pub stk_base: *mut OsStkElement,
    pub stk_limit: *mut OsStkElement,
    pub stk_size: usize,

    // ============ Task identification ============
    pub name: &'static str,

    // ============ List membership ============
    /// Ready / suspended / delayed list node. Sort value is the absolute
    /// wake tick while delayed; unused while ready or suspended.
    pub state_node: ListItem<OsTcb>,
    /// Queue/mutex/semaphore waiter-list node.
    pub event_node: ListItem<OsTcb>,
    /// Result of the most recent pend operation.
    pub pend_status: OsPendStatus,

    // ============ Priority ============
    pub prio: OsPrio,
    /// Priority before any priority-inheritance boost.
    pub base_prio: OsPrio,

    // ============ State ============
    pub task_state: OsTaskState,
    pub opt: OsOpt,

    // ============ Suspend ============
    /// Suspend nesting counter: resume only takes effect once this
    /// returns to zero.
    pub suspend_ctr: OsNestingCtr,

    // ============ Time slicing ============
    pub time_quanta: OsTick,
    pub time_quanta_ctr: OsTick,

    // ============ Task entry point ============
    pub task_entry_addr: u32,
    pub task_entry_arg: *mut (),
}

impl OsTcb {
    /// Create a new, uninitialized TCB.
    pub const fn new() -> Self {
        OsTcb {
            stk_ptr: core::ptr::null_mut(),
            stk_base: core::ptr::null_mut(),
            stk_limit: core::ptr::null_mut(),
            stk_size: 0,

            name: "",

            state_node: ListItem::new(),
            event_node: ListItem::new(),
            pend_status: OsPendStatus::Ok,

            prio: 0,
            base_prio: 0,

            task_state: OsTaskState::Ready,
            opt: 0,

            suspend_ctr: 0,

            time_quanta: 0,
            time_quanta_ctr: 0,

            task_entry_addr: 0,
            task_entry_arg: core::ptr::null_mut(),
        }
    }

    /// Reset to default values and re-bind the list nodes' owner pointer
    /// to this TCB. Must be called after the TCB is at its final address
    /// (it never moves again once a task is created).
    pub fn init(&mut self) {
        let self_ptr = NonNull::from(&mut *self);
        *self = Self::new();
        self.state_node.set_owner(self_ptr);
        self.event_node.set_owner(self_ptr);
    }

    /// Check if task is ready to run
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.task_state == OsTaskState::Ready
    }

    /// Check if task is pending
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(
            self.task_state,
            OsTaskState::Pend
                | OsTaskState::PendTimeout
                | OsTaskState::PendSuspended
                | OsTaskState::PendTimeoutSuspended
        )
    }

    /// Check if task is suspended
    #[inline]
    pub fn is_suspended(&self) -> bool {
        matches!(
            self.task_state,
            OsTaskState::Suspended
                | OsTaskState::DelayedSuspended
                | OsTaskState::PendSuspended
                | OsTaskState::PendTimeoutSuspended
        )
    }

    /// Check if task is delayed
    #[inline]
    pub fn is_delayed(&self) -> bool {
        matches!(
            self.task_state,
            OsTaskState::Delayed | OsTaskState::DelayedSuspended
        )
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl Send for OsTcb {}
unsafe impl Sync for OsTcb {}
