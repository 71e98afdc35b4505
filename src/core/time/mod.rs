//! Time management module
//!
//! Provides tick handling, time delays, and timeout management.
//!
//! Delayed tasks live on one of two sorted lists (see
//! [`crate::kernel::SchedState`]): the active list holds wake ticks that
//! are still ahead of the current tick, the overflow list holds wake
//! ticks that already wrapped past `u32::MAX`. Swapping them on tick
//! wraparound keeps the sort order correct without ever comparing ticks
//! with wrapping arithmetic at lookup time.

use core::ptr::NonNull;

use crate::config::CFG_TICK_RATE_HZ;
use crate::critical::{critical_section, is_isr_context};
use crate::error::{OsError, OsResult};
use crate::kernel;
use crate::sched;
use crate::task::OsTcb;
use crate::types::{OsPendStatus, OsTaskState, OsTick};

/// Link `tcb` into the delayed list so it wakes at `ticks` ticks from
/// now, choosing the active or overflow list depending on whether the
/// wake tick wraps past `u32::MAX`. Does not touch the task's state or
/// its ready/event list membership — callers handle that.
///
/// # Safety
/// `tcb` must point to a live TCB whose `state_node` is not currently
/// linked into any list.
pub(crate) unsafe fn add_to_delayed_list(mut tcb: NonNull<OsTcb>, ticks: OsTick) {
    let tcb_ref = unsafe { tcb.as_mut() };
    let current_tick = kernel::KERNEL.tick_get();
    let wake_tick = current_tick.wrapping_add(ticks);
    tcb_ref.state_node.set_value(wake_tick);

    let node = NonNull::from(&mut tcb_ref.state_node);

    unsafe {
        if wake_tick < current_tick {
            // Wrapped: this wake tick is numerically smaller than "now",
            // so it belongs with the tasks already waiting for the tick
            // counter to catch back up to it.
            kernel::delayed_overflow().insert(node);
        } else {
            kernel::delayed_active().insert(node);
            if wake_tick < kernel::next_unblock_tick() {
                kernel::set_next_unblock_tick(wake_tick);
            }
        }
    }
}

/// Time delay in ticks
///
/// Delays the calling task for the specified number of system ticks.
/// A delay of `0` ticks yields to any other ready task at the same
/// priority without blocking.
///
/// # Returns
/// * `Ok(())` - Delay completed (or yielded, for a 0-tick delay)
/// * `Err(OsError::TimeDlyIsr)` - Cannot delay from ISR
/// * `Err(OsError::PendLocked)` - Scheduler is locked
pub fn os_time_dly(ticks: OsTick) -> OsResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }

    if is_isr_context() {
        return Err(OsError::TimeDlyIsr);
    }

    if kernel::KERNEL.sched_lock_nesting() > 0 {
        return Err(OsError::PendLocked);
    }

    if ticks == 0 {
        return sched::os_yield();
    }

    critical_section(|_cs| {
        unsafe {
            if let Some(cur_tcb) = kernel::tcb_cur_ptr() {
                (*cur_tcb.as_ptr()).task_state = OsTaskState::Delayed;
                sched::os_rdy_list_remove(cur_tcb);
                add_to_delayed_list(cur_tcb, ticks);
            }
        }
    });

    sched::os_sched();

    Ok(())
}

/// Time delay in hours, minutes, seconds, milliseconds
pub fn os_time_dly_hmsm(hours: u16, minutes: u8, seconds: u8, milliseconds: u16) -> OsResult<()> {
    if minutes > 59 || seconds > 59 || milliseconds > 999 {
        return Err(OsError::PrioInvalid);
    }

    let total_ms = (hours as u32) * 3_600_000
        + (minutes as u32) * 60_000
        + (seconds as u32) * 1000
        + (milliseconds as u32);

    let ticks = (total_ms * CFG_TICK_RATE_HZ) / 1000;

    os_time_dly(ticks)
}

/// Resume a delayed task before its delay expires
pub fn os_time_dly_resume(tcb: NonNull<OsTcb>) -> OsResult<()> {
    if !kernel::KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }

    if is_isr_context() {
        return Err(OsError::TimeDlyIsr);
    }

    critical_section(|_cs| {
        let tcb_ref = unsafe { &mut *tcb.as_ptr() };

        if !tcb_ref.is_delayed() {
            return Err(OsError::TaskNotExist);
        }

        unsafe {
            tcb_ref.state_node.unlink();
        }

        match tcb_ref.task_state {
            OsTaskState::Delayed => {
                tcb_ref.task_state = OsTaskState::Ready;
                unsafe { sched::os_rdy_list_insert(tcb) };
            }
            OsTaskState::DelayedSuspended => {
                tcb_ref.task_state = OsTaskState::Suspended;
            }
            _ => {}
        }

        sched::os_sched();

        Ok(())
    })
}

/// Get current tick count
#[inline]
pub fn os_time_get() -> OsTick {
    kernel::KERNEL.tick_get()
}

/// Tick handler: advances the tick counter, wakes any tasks whose delay
/// or pend timeout has expired, and runs round-robin time slicing.
pub fn os_tick_handler() {
    if !kernel::KERNEL.is_running() {
        return;
    }

    kernel::KERNEL.int_enter();

    let tick = kernel::KERNEL.tick_increment();

    critical_section(|_cs| {
        if tick == 0 {
            unsafe { kernel::swap_delayed_lists() };
        }

        if tick >= unsafe { kernel::next_unblock_tick() } {
            wake_expired_tasks(tick);
        }

        sched::os_sched_round_robin();
    });

    kernel::os_int_exit();
}

/// Pop and wake every task on the active delayed list whose wake tick
/// has arrived, then refresh the early-exit threshold from whatever is
/// left at the head.
fn wake_expired_tasks(tick: OsTick) {
    loop {
        let head_value = unsafe { kernel::delayed_active().head_value() };
        let Some(wake_tick) = head_value else {
            break;
        };
        if wake_tick > tick {
            break;
        }

        let owner = unsafe { kernel::delayed_active().head_owner() }.unwrap();
        let tcb = unsafe { &mut *owner.as_ptr() };

        unsafe {
            tcb.state_node.unlink();
        }

        match tcb.task_state {
            OsTaskState::Delayed => {
                tcb.task_state = OsTaskState::Ready;
                unsafe { sched::os_rdy_list_insert(owner) };
            }
            OsTaskState::DelayedSuspended => {
                tcb.task_state = OsTaskState::Suspended;
            }
            OsTaskState::PendTimeout | OsTaskState::PendTimeoutSuspended => {
                unsafe {
                    tcb.event_node.unlink();
                }
                tcb.pend_status = OsPendStatus::Timeout;
                if tcb.task_state == OsTaskState::PendTimeout {
                    tcb.task_state = OsTaskState::Ready;
                    unsafe { sched::os_rdy_list_insert(owner) };
                } else {
                    tcb.task_state = OsTaskState::Suspended;
                }
            }
            _ => {}
        }
    }

    let next = unsafe { kernel::delayed_active().head_value() }.unwrap_or(crate::config::CFG_MAX_DELAY);
    unsafe { kernel::set_next_unblock_tick(next) };
}

/// SysTick interrupt handler
#[no_mangle]
pub extern "C" fn SysTick() {
    os_tick_handler();
}
