//! Error types for the kernel
//!
//! Uses Rust's Result pattern instead of C-style error pointers, but keeps
//! the numbered-error-code convention so an error can be logged as a single
//! integer and looked up later.

/// RTOS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OsError {
    /// No error
    None = 0,

    // ============ ISR errors ============
    /// Function cannot be called from ISR context
    AcceptIsr = 10001,
    /// Cannot create an object from ISR context
    CreateIsr = 12001,

    // ============ Lock errors ============
    /// Scheduler lock nesting overflow
    LockNestingOvf = 21001,

    // ============ OS state errors ============
    /// `os_init()` has not been called yet
    OsNotInit = 21501,
    /// The OS is already running
    OsRunning = 21502,
    /// The OS is not yet running
    OsNotRunning = 21503,

    // ============ Memory errors ============
    /// Requested size exceeds the largest available free block
    MemNoFreeBlks = 22210,
    /// Requested size is zero or would overflow the allocated-bit marker
    MemInvalidSize = 22211,

    // ============ Mutex errors ============
    /// Caller is not the mutex's owner
    MutexNotOwner = 22401,
    /// Mutex nesting (recursive take) count overflow
    MutexOvf = 22404,

    // ============ Pend errors ============
    /// Cannot pend from ISR context
    PendIsr = 25006,
    /// Scheduler is locked, blocking not permitted
    PendLocked = 25007,
    /// Pend would block and non-blocking mode was requested
    PendWouldBlock = 25008,
    /// Pend was aborted by another task
    PendAbort = 25009,
    /// Handle does not match the expected kernel object kind
    ObjType = 25010,
    /// The object was deleted while a task was pending on it
    ObjDel = 25011,

    // ============ Priority errors ============
    /// Priority is out of range
    PrioInvalid = 25203,

    // ============ Queue errors ============
    /// Queue is full
    QFull = 26001,
    /// Queue is empty
    QEmpty = 26002,

    // ============ Scheduler errors ============
    /// Cannot lock the scheduler from ISR context
    SchedLockIsr = 28002,
    /// Cannot unlock the scheduler from ISR context
    SchedUnlockIsr = 28005,

    // ============ Semaphore errors ============
    /// Semaphore counter would overflow
    SemOvf = 28101,

    // ============ Task errors ============
    /// TCB pointer is null
    TcbInvalid = 28201,
    /// Stack base pointer is null
    StkInvalid = 28207,
    /// Stack pointer or size is invalid
    StkSizeInvalid = 28208,
    /// Cannot create a task from ISR context
    TaskCreateIsr = 29002,
    /// Cannot delete a task from ISR context
    TaskDelIsr = 29003,
    /// Cannot delete the idle task
    TaskDelIdle = 29004,
    /// No more TCB slots available
    TaskNoMoreTcb = 29008,
    /// Referenced task does not exist
    TaskNotExist = 29009,
    /// Cannot resume a task from ISR context
    TaskResumeIsr = 29017,
    /// Task is not currently suspended
    TaskNotSuspended = 29018,
    /// Cannot suspend the idle task
    TaskSuspendIdle = 29019,
    /// Cannot suspend a task from ISR context
    TaskSuspendIsr = 29020,
    /// Cannot change a task's priority from ISR context
    TaskChangePrioIsr = 29021,

    // ============ Time errors ============
    /// Cannot delay from ISR context
    TimeDlyIsr = 29301,

    // ============ Timeout ============
    /// Operation timed out
    Timeout = 29401,

    // ============ Yield errors ============
    /// Cannot yield from ISR context
    YieldIsr = 34001,
}

/// Result type alias for RTOS operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    #[inline]
    pub fn is_ok(self) -> bool {
        self == OsError::None
    }

    #[inline]
    pub fn is_err(self) -> bool {
        self != OsError::None
    }
}
