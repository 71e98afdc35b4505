//! Compile-time configuration for the kernel
//!
//! These constants control the behavior and resource limits of the RTOS.

/// Maximum number of priority levels. Priority 0 is the lowest (the idle
/// task's priority); `CFG_PRIO_MAX - 1` is the highest.
pub const CFG_PRIO_MAX: usize = 8;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Default time quanta for round-robin scheduling, in ticks
pub const CFG_TIME_QUANTA_DEFAULT: u32 = 10;

/// Minimum task stack size, in stack elements (words)
pub const CFG_STK_SIZE_MIN: usize = 128;

/// Maximum length of a task name, including the nul terminator
pub const CFG_TASK_NAME_LEN: usize = 16;

/// Total size of the kernel heap arena, in bytes
pub const CFG_HEAP_SIZE: usize = 10 * 1024;

/// Byte alignment enforced on every heap allocation
pub const CFG_HEAP_ALIGN: usize = 8;

/// Enable round-robin scheduling for same-priority tasks
pub const CFG_SCHED_ROUND_ROBIN_EN: bool = true;

/// Idle task priority — always the lowest priority level
pub const CFG_PRIO_IDLE: u8 = 0;

/// Sentinel meaning "wait forever"
pub const CFG_MAX_DELAY: u32 = 0xFFFF_FFFF;
