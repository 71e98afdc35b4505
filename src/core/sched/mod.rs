//! Scheduler module
//!
//! Priority-based preemptive scheduler with round-robin for same priority.

use core::ptr::NonNull;

use crate::config::CFG_SCHED_ROUND_ROBIN_EN;
use crate::critical::{critical_section, CriticalSection, is_isr_context};
use crate::error::{OsError, OsResult};

use crate::kernel;
use crate::list::ListItem;
use crate::task::OsTcb;
use crate::types::OsPrio;

/// Main scheduling point
///
/// This function determines the highest priority ready task and
/// triggers a context switch if needed. It should be called:
/// - After any operation that may change task readiness
/// - After releasing a semaphore/mutex
/// - After resuming a task
/// - When a delay/timeout expires
pub fn os_sched() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    if is_isr_context() {
        return;
    }

    if kernel::KERNEL.sched_lock_nesting() > 0 {
        return;
    }

    let _cs = CriticalSection::enter();

    let high_prio = unsafe { kernel::prio_table().get_highest() };

    unsafe {
        if let Some(high_rdy) = kernel::rdy_list(high_prio).head_owner() {
            kernel::set_prio_high_rdy(high_prio);
            kernel::set_tcb_high_rdy_ptr(Some(high_rdy));

            if Some(high_rdy) != kernel::tcb_cur_ptr() {
                crate::port::os_ctx_sw();
            }
        }
    }
}

/// Round-robin scheduling for tasks at the same priority
pub fn os_sched_round_robin() {
    if !CFG_SCHED_ROUND_ROBIN_EN {
        return;
    }

    if !kernel::KERNEL.is_running() {
        return;
    }

    if kernel::KERNEL.sched_lock_nesting() > 0 {
        return;
    }

    critical_section(|_cs| {
        unsafe {
            if let Some(mut cur_tcb_ptr) = kernel::tcb_cur_ptr() {
                let cur_tcb = cur_tcb_ptr.as_mut();

                if cur_tcb.time_quanta_ctr > 0 {
                    cur_tcb.time_quanta_ctr -= 1;
                }

                if cur_tcb.time_quanta_ctr == 0 {
                    cur_tcb.time_quanta_ctr = cur_tcb.time_quanta;

                    let prio = cur_tcb.prio;
                    let rdy_list = kernel::rdy_list(prio);

                    // Only rotate if more than one task at this priority
                    if rdy_list.count() > 1 {
                        if let Some(new_head) = rdy_list.next_round_robin() {
                            kernel::set_tcb_high_rdy_ptr(Some(new_head));
                            crate::port::os_ctx_sw();
                        }
                    }
                }
            }
        }
    });
}

/// Voluntarily give up the CPU to another ready task at the same priority
///
/// Unlike [`os_sched_round_robin`], which only rotates a priority's ready
/// list once a task's time-quantum has been exhausted across repeated
/// calls, this unconditionally rotates the caller's ready list by one
/// position and requests a reschedule, regardless of quantum state. The
/// caller's own quantum counter is reset so it gets a fresh slice the
/// next time it runs.
pub fn os_yield() -> OsResult<()> {
    if is_isr_context() {
        return Err(OsError::YieldIsr);
    }

    if !kernel::KERNEL.is_running() {
        return Ok(());
    }

    critical_section(|_cs| {
        unsafe {
            if let Some(mut cur_tcb_ptr) = kernel::tcb_cur_ptr() {
                let cur_tcb = cur_tcb_ptr.as_mut();
                cur_tcb.time_quanta_ctr = cur_tcb.time_quanta;

                let prio = cur_tcb.prio;
                let rdy_list = kernel::rdy_list(prio);

                if rdy_list.count() > 1 {
                    if let Some(new_head) = rdy_list.next_round_robin() {
                        kernel::set_tcb_high_rdy_ptr(Some(new_head));
                        crate::port::os_ctx_sw();
                    }
                }
            }
        }
    });

    Ok(())
}

/// Make a task ready
///
/// # Safety
/// `tcb` must point to a live, initialized TCB not currently on any
/// run-state list.
pub(crate) unsafe fn os_rdy_list_insert(mut tcb: NonNull<OsTcb>) {
    let tcb_ref = unsafe { tcb.as_mut() };
    let prio = tcb_ref.prio;
    let node = NonNull::from(&mut tcb_ref.state_node);

    unsafe {
        kernel::rdy_list(prio).insert_tail(node);
        kernel::prio_table().insert(prio);
    }
}

/// Remove a task from its priority's ready list
///
/// # Safety
/// `tcb` must currently be linked into its priority's ready list.
pub(crate) unsafe fn os_rdy_list_remove(mut tcb: NonNull<OsTcb>) {
    let tcb_ref = unsafe { tcb.as_mut() };
    let prio = tcb_ref.prio;

    unsafe {
        tcb_ref.state_node.unlink();

        if kernel::rdy_list(prio).is_empty() {
            kernel::prio_table().remove(prio);
        }
    }
}

/// Move a ready task to a different priority's ready list
///
/// # Safety
/// `tcb` must currently be linked into `old_prio`'s ready list.
pub(crate) unsafe fn os_rdy_list_change_prio(mut tcb: NonNull<OsTcb>, new_prio: OsPrio) {
    let tcb_ref = unsafe { tcb.as_mut() };
    let old_prio = tcb_ref.prio;

    if old_prio == new_prio {
        return;
    }

    unsafe {
        tcb_ref.state_node.unlink();
        if kernel::rdy_list(old_prio).is_empty() {
            kernel::prio_table().remove(old_prio);
        }
    }

    tcb_ref.prio = new_prio;
    let node: NonNull<ListItem<OsTcb>> = NonNull::from(&mut tcb_ref.state_node);

    unsafe {
        kernel::rdy_list(new_prio).insert_tail(node);
        kernel::prio_table().insert(new_prio);
    }
}
