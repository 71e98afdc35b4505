//! Global kernel state and initialization
//!
//! This module manages the global OS state including initialization,
//! starting the scheduler, and tracking kernel status.

use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use crate::config::{CFG_MAX_DELAY, CFG_PRIO_MAX};
use crate::core::cs_cell::CsCell;
use crate::core::list::List;
use crate::critical::{critical_section, CriticalSection};
use crate::error::{OsError, OsResult};
use crate::prio::PrioTable;
use crate::task::OsTcb;
use crate::types::{OsNestingCtr, OsPrio, OsTick};

// ============ Kernel State Structures ============

/// Atomic kernel flags
pub struct KernelFlags {
    initialized: AtomicBool,
    running: AtomicBool,
    int_nesting: AtomicU8,
    sched_lock_nesting: AtomicU8,
    tick_counter: AtomicU32,
}

impl KernelFlags {
    const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            int_nesting: AtomicU8::new(0),
            sched_lock_nesting: AtomicU8::new(0),
            tick_counter: AtomicU32::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.int_nesting.store(0, Ordering::SeqCst);
        self.sched_lock_nesting.store(0, Ordering::SeqCst);
        self.tick_counter.store(0, Ordering::SeqCst);
    }

    /// Check if the OS is running
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Check if OS is initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Get current tick count
    #[inline(always)]
    pub fn tick_get(&self) -> OsTick {
        self.tick_counter.load(Ordering::Relaxed)
    }

    /// Get interrupt nesting level
    #[inline(always)]
    pub fn int_nesting(&self) -> OsNestingCtr {
        self.int_nesting.load(Ordering::Relaxed)
    }

    /// Get scheduler lock nesting level
    #[inline(always)]
    pub fn sched_lock_nesting(&self) -> OsNestingCtr {
        self.sched_lock_nesting.load(Ordering::SeqCst)
    }

    /// Increment the tick counter, wrapping at `u32::MAX`, and return the
    /// new value.
    #[inline(always)]
    pub(crate) fn tick_increment(&self) -> OsTick {
        self.tick_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// Enter ISR
    #[inline(always)]
    pub(crate) fn int_enter(&self) {
        if self.is_running() {
            let nesting = self.int_nesting.fetch_add(1, Ordering::Relaxed);
            if nesting == 254 {
                self.int_nesting.store(254, Ordering::Relaxed);
            }
        }
    }

    /// Set initialized flag
    #[inline(always)]
    pub(crate) fn set_initialized(&self, val: bool) {
        self.initialized.store(val, Ordering::SeqCst);
    }

    /// Set running flag
    #[inline(always)]
    pub(crate) fn set_running(&self, val: bool) {
        self.running.store(val, Ordering::SeqCst);
    }

    /// Decrement int nesting
    #[inline(always)]
    pub(crate) fn int_nesting_dec(&self) -> OsNestingCtr {
        let nesting = self.int_nesting.load(Ordering::Relaxed);
        if nesting > 0 {
            self.int_nesting.store(nesting - 1, Ordering::Relaxed);
        }
        nesting.saturating_sub(1)
    }

    /// Lock scheduler
    pub(crate) fn try_sched_lock(&self) -> OsResult<()> {
        let nesting = self.sched_lock_nesting.load(Ordering::SeqCst);
        if nesting == 255 {
            return Err(OsError::LockNestingOvf);
        }
        self.sched_lock_nesting.store(nesting + 1, Ordering::SeqCst);
        Ok(())
    }

    /// Unlock scheduler
    pub(crate) fn try_sched_unlock(&self) -> OsResult<OsNestingCtr> {
        let nesting = self.sched_lock_nesting.load(Ordering::SeqCst);
        if nesting == 0 {
            return Ok(0);
        }
        self.sched_lock_nesting.store(nesting - 1, Ordering::SeqCst);
        Ok(nesting - 1)
    }
}

// ============ Global Instances ============

/// Global kernel state instance
pub(crate) static KERNEL: KernelFlags = KernelFlags::new();

/// Scheduler state: the ready bitmap + lists, and the pair of delayed
/// lists used to keep wake ordering correct across tick-counter overflow.
///
/// `delayed[active]` holds tasks waking at or after the current tick;
/// `delayed[1 - active]` holds tasks whose wake tick already wrapped
/// past `u32::MAX` and so is smaller than the current tick numerically.
/// The two are swapped whenever the tick counter itself wraps to zero.
pub struct SchedState {
    pub(crate) prio_tbl: PrioTable,
    pub(crate) rdy_list: [List<OsTcb>; CFG_PRIO_MAX],
    pub(crate) delayed: [List<OsTcb>; 2],
    pub(crate) active_delayed: usize,
    pub(crate) next_unblock_tick: OsTick,
}

impl SchedState {
    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY_LIST: List<OsTcb> = List::new();

    const fn new() -> Self {
        Self {
            prio_tbl: PrioTable::new(),
            rdy_list: [Self::EMPTY_LIST; CFG_PRIO_MAX],
            delayed: [List::new(), List::new()],
            active_delayed: 0,
            next_unblock_tick: CFG_MAX_DELAY,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.prio_tbl.init();
        for list in self.rdy_list.iter_mut() {
            list.init();
        }
        for list in self.delayed.iter_mut() {
            list.init();
        }
        self.active_delayed = 0;
        self.next_unblock_tick = CFG_MAX_DELAY;
    }

    #[inline(always)]
    pub fn prio_table(&mut self) -> &mut PrioTable {
        &mut self.prio_tbl
    }

    #[inline(always)]
    pub fn rdy_list(&mut self, prio: OsPrio) -> &mut List<OsTcb> {
        &mut self.rdy_list[prio as usize]
    }

    #[inline(always)]
    pub fn delayed_active(&mut self) -> &mut List<OsTcb> {
        &mut self.delayed[self.active_delayed]
    }

    #[inline(always)]
    pub fn delayed_overflow(&mut self) -> &mut List<OsTcb> {
        &mut self.delayed[1 - self.active_delayed]
    }

    /// Swap the active/overflow delayed lists and recompute the next
    /// unblock tick, mirroring `prvSwitchDelayedLists`.
    pub fn swap_delayed_lists(&mut self) {
        self.active_delayed = 1 - self.active_delayed;
        self.next_unblock_tick = self
            .delayed_active()
            .head_value()
            .unwrap_or(CFG_MAX_DELAY);
    }
}

/// Global scheduler state instance
pub(crate) static SCHED: CsCell<SchedState> = CsCell::new(SchedState::new());

/// IDLE task TCB
static mut IDLE_TCB: OsTcb = OsTcb::new();

/// IDLE task stack
static mut IDLE_STK: [crate::types::OsStkElement; crate::config::CFG_STK_SIZE_MIN] =
    [0; crate::config::CFG_STK_SIZE_MIN];

// ============ CPU/Context Switch State ============

/// CPU context switch state
#[repr(C)]
pub struct CpuState {
    /// Current running task's TCB pointer
    pub tcb_cur: *mut OsTcb,
    /// Highest priority ready task's TCB pointer
    pub tcb_high_rdy: *mut OsTcb,
    /// Current running task's priority
    pub prio_cur: OsPrio,
    /// Highest ready priority
    pub prio_high_rdy: OsPrio,
    /// Exception stack base
    pub except_stk_base: u32,
}

impl CpuState {
    pub const fn new() -> Self {
        Self {
            tcb_cur: core::ptr::null_mut(),
            tcb_high_rdy: core::ptr::null_mut(),
            prio_cur: 0,
            prio_high_rdy: 0,
            except_stk_base: 0,
        }
    }

    pub fn reset(&mut self) {
        self.tcb_cur = core::ptr::null_mut();
        self.tcb_high_rdy = core::ptr::null_mut();
        self.prio_cur = 0;
        self.prio_high_rdy = 0;
    }

    // ============ TCB Accessor Methods ============

    #[inline(always)]
    pub unsafe fn tcb_cur_ptr(&self) -> Option<NonNull<OsTcb>> {
        NonNull::new(self.tcb_cur)
    }

    #[inline(always)]
    pub unsafe fn set_tcb_cur(&mut self, tcb: Option<NonNull<OsTcb>>) {
        self.tcb_cur = tcb.map_or(core::ptr::null_mut(), |p| p.as_ptr());
    }

    #[inline(always)]
    pub unsafe fn tcb_high_rdy_ptr(&self) -> Option<NonNull<OsTcb>> {
        NonNull::new(self.tcb_high_rdy)
    }

    #[inline(always)]
    pub unsafe fn set_tcb_high_rdy(&mut self, tcb: Option<NonNull<OsTcb>>) {
        self.tcb_high_rdy = tcb.map_or(core::ptr::null_mut(), |p| p.as_ptr());
    }

    // ============ Priority Accessor Methods ============

    #[inline(always)]
    pub unsafe fn get_prio_cur(&self) -> OsPrio {
        self.prio_cur
    }

    #[inline(always)]
    pub unsafe fn set_prio_cur(&mut self, prio: OsPrio) {
        self.prio_cur = prio;
    }

    #[inline(always)]
    pub unsafe fn get_prio_high_rdy(&self) -> OsPrio {
        self.prio_high_rdy
    }

    #[inline(always)]
    pub unsafe fn set_prio_high_rdy(&mut self, prio: OsPrio) {
        self.prio_high_rdy = prio;
    }
}

/// Global CPU state instance
#[no_mangle]
#[used]
pub static mut CPU_STATE: CpuState = CpuState::new();

// ============ Initialization ============

/// Internal IDLE task function
fn os_idle_task(_: *mut ()) -> ! {
    loop {
        cortex_m::asm::nop();
    }
}

/// Reset global kernel state
unsafe fn os_reset_globals() {
    KERNEL.reset();

    unsafe {
        CPU_STATE.reset();
    }

    unsafe {
        SCHED.get_unchecked().reset();
    }
}

// ============ Public API ============

/// Initialize the RTOS kernel
///
/// This must be called before any other OS function. It initializes the
/// priority table, ready lists, and internal state. The IDLE task is
/// automatically created at [`crate::config::CFG_PRIO_IDLE`].
pub fn os_init() -> OsResult<()> {
    unsafe {
        os_reset_globals();
    }

    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    crate::heap::os_heap_init();

    critical_section(|cs| {
        let sched = SCHED.get(cs);
        sched.reset();

        unsafe {
            #[allow(static_mut_refs)]
            crate::task::os_task_create_internal(
                &raw mut IDLE_TCB,
                "Idle",
                os_idle_task,
                core::ptr::null_mut(),
                crate::config::CFG_PRIO_IDLE,
                IDLE_STK.as_mut_ptr(),
                IDLE_STK.len(),
                0,
                0,
            )
            .expect("IDLE task creation failed");
        }

        KERNEL.set_initialized(true);
    });

    Ok(())
}

/// Start multitasking
///
/// Starts the highest-priority ready task. Never returns under normal
/// operation. At least one application task must already be created.
pub fn os_start() -> OsResult<()> {
    if !KERNEL.is_initialized() {
        return Err(OsError::OsNotInit);
    }

    if KERNEL.is_running() {
        return Err(OsError::OsRunning);
    }

    critical_section(|cs| {
        let sched = SCHED.get(cs);
        let high_prio = sched.prio_tbl.get_highest();

        unsafe {
            CPU_STATE.prio_high_rdy = high_prio;
            CPU_STATE.prio_cur = high_prio;

            if let Some(head) = sched.rdy_list[high_prio as usize].head_owner() {
                CPU_STATE.tcb_high_rdy = head.as_ptr();
                CPU_STATE.tcb_cur = head.as_ptr();
            } else {
                return;
            }
        }

        KERNEL.set_running(true);
    });

    crate::port::os_cpu_systick_init(16_000_000 / crate::config::CFG_TICK_RATE_HZ);

    unsafe {
        CPU_STATE.tcb_cur = CPU_STATE.tcb_high_rdy;
        crate::port::os_start_high_rdy()
    };

    Ok(())
}

/// Exit ISR
pub fn os_int_exit() {
    if !KERNEL.is_running() {
        return;
    }

    let _cs = CriticalSection::enter();

    let old_nesting = KERNEL.int_nesting();
    if old_nesting == 0 {
        return;
    }

    let new_nesting = KERNEL.int_nesting_dec();

    if new_nesting == 0 && KERNEL.sched_lock_nesting() == 0 {
        let high_prio = unsafe { SCHED.get_unchecked().prio_tbl.get_highest() };

        unsafe {
            if high_prio != CPU_STATE.prio_cur {
                CPU_STATE.prio_high_rdy = high_prio;

                if let Some(head) = SCHED.get_unchecked().rdy_list[high_prio as usize].head_owner() {
                    CPU_STATE.tcb_high_rdy = head.as_ptr();
                    crate::port::os_int_ctx_sw();
                }
            }
        }
    }
}

/// Lock the scheduler: nestable, suppresses `reschedule()` without
/// disabling interrupts.
pub fn os_sched_lock() -> OsResult<()> {
    if !KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }

    if KERNEL.int_nesting() > 0 {
        return Err(OsError::SchedLockIsr);
    }

    critical_section(|_cs| KERNEL.try_sched_lock())
}

/// Unlock the scheduler. Once the nesting count returns to zero, a
/// pending reschedule fires immediately.
pub fn os_sched_unlock() -> OsResult<()> {
    if !KERNEL.is_running() {
        return Err(OsError::OsNotRunning);
    }

    if KERNEL.int_nesting() > 0 {
        return Err(OsError::SchedUnlockIsr);
    }

    critical_section(|_cs| {
        let remaining = KERNEL.try_sched_unlock()?;
        if remaining == 0 {
            crate::sched::os_sched();
        }
        Ok(())
    })
}

// ============ Internal accessors for other modules ============

#[inline(always)]
pub(crate) unsafe fn prio_table() -> &'static mut PrioTable {
    unsafe { &mut SCHED.get_unchecked().prio_tbl }
}

#[inline(always)]
pub(crate) unsafe fn rdy_list(prio: OsPrio) -> &'static mut List<OsTcb> {
    unsafe { &mut SCHED.get_unchecked().rdy_list[prio as usize] }
}

#[inline(always)]
pub(crate) unsafe fn delayed_active() -> &'static mut List<OsTcb> {
    unsafe { SCHED.get_unchecked().delayed_active() }
}

#[inline(always)]
pub(crate) unsafe fn delayed_overflow() -> &'static mut List<OsTcb> {
    unsafe { SCHED.get_unchecked().delayed_overflow() }
}

#[inline(always)]
pub(crate) unsafe fn swap_delayed_lists() {
    unsafe { SCHED.get_unchecked().swap_delayed_lists() }
}

#[inline(always)]
pub(crate) unsafe fn next_unblock_tick() -> OsTick {
    unsafe { SCHED.get_unchecked().next_unblock_tick }
}

#[inline(always)]
pub(crate) unsafe fn set_next_unblock_tick(tick: OsTick) {
    unsafe { SCHED.get_unchecked().next_unblock_tick = tick }
}

#[inline]
#[allow(static_mut_refs)]
pub(crate) unsafe fn tcb_cur_ptr() -> Option<NonNull<OsTcb>> {
    unsafe { CPU_STATE.tcb_cur_ptr() }
}

#[inline]
#[allow(dead_code, static_mut_refs)]
pub(crate) unsafe fn set_tcb_cur_ptr(tcb: Option<NonNull<OsTcb>>) {
    unsafe { CPU_STATE.set_tcb_cur(tcb) }
}

#[inline]
#[allow(dead_code, static_mut_refs)]
pub(crate) unsafe fn tcb_high_rdy_ptr() -> Option<NonNull<OsTcb>> {
    unsafe { CPU_STATE.tcb_high_rdy_ptr() }
}

#[inline]
#[allow(static_mut_refs)]
pub(crate) unsafe fn set_tcb_high_rdy_ptr(tcb: Option<NonNull<OsTcb>>) {
    unsafe { CPU_STATE.set_tcb_high_rdy(tcb) }
}

#[inline]
#[allow(dead_code, static_mut_refs)]
pub(crate) unsafe fn prio_cur() -> OsPrio {
    unsafe { CPU_STATE.get_prio_cur() }
}

#[inline]
#[allow(dead_code, static_mut_refs)]
pub(crate) unsafe fn set_prio_cur(prio: OsPrio) {
    unsafe { CPU_STATE.set_prio_cur(prio) }
}

#[inline]
#[allow(dead_code, static_mut_refs)]
pub(crate) unsafe fn prio_high_rdy() -> OsPrio {
    unsafe { CPU_STATE.get_prio_high_rdy() }
}

#[inline]
#[allow(static_mut_refs)]
pub(crate) unsafe fn set_prio_high_rdy(prio: OsPrio) {
    unsafe { CPU_STATE.set_prio_high_rdy(prio) }
}
