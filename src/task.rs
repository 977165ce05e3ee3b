//! Task subsystem: host-thread-backed tasks, registered in
//! the kind's row table, with self-identification via thread-local
//! storage and cooperative delete-hook dispatch.
//!
//! Grounded on `r3_port_std::threading_unix`: that module wraps
//! `std::thread::spawn` to add remote-park support; this module wraps
//! it to add the OSAL's row-table bookkeeping and uses the same "reach
//! into the raw `pthread_t` via `libc`" idiom for `TaskDelete`'s
//! asynchronous cancel, via `pthread_cancel` rather than a delivered
//! signal — there is no cooperative flag to poll, so a task blocked in
//! a long host call is still torn down.

use std::cell::Cell;
use std::os::unix::thread::JoinHandleExt;
use std::thread;

use once_cell::sync::Lazy;

use crate::config::MAX_TASKS;
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};

/// Highest-priority OSAL value: 0 is highest, 255 is lowest.
pub const PRIORITY_HIGHEST: u32 = 0;
/// Lowest-priority OSAL value.
pub const PRIORITY_LOWEST: u32 = 255;

pub(crate) struct TaskRow {
    pthread: libc::pthread_t,
    std_thread_id: thread::ThreadId,
    stack_size: u32,
    priority: AtomicU32Cell,
    delete_hook: Cell<Option<fn()>>,
}

// `TaskRow` is only ever touched through `Table`'s mutex, and `Cell`s
// inside it are never aliased across threads without that mutex held.
unsafe impl Send for TaskRow {}

/// A `u32`-sized `Cell` substitute; plain `std::sync::atomic::AtomicU32`
/// would do, but the row is already behind the table's mutex, so a
/// `Cell` documents that no extra synchronization is happening here.
struct AtomicU32Cell(Cell<u32>);
impl AtomicU32Cell {
    fn new(v: u32) -> Self {
        Self(Cell::new(v))
    }
    fn get(&self) -> u32 {
        self.0.get()
    }
    fn set(&self, v: u32) {
        self.0.set(v)
    }
}

static TASK_TABLE: Lazy<Table<TaskRow, MAX_TASKS>> = Lazy::new(Table::new);

thread_local! {
    /// Bound once by `register()` (`TaskRegister`).
    static CURRENT_TASK_ID: Cell<Option<ObjId>> = Cell::new(None);
}

/// `TaskGetInfo` result.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub creator: ObjId,
    pub stack_size: u32,
    pub priority: u32,
    pub name: String,
    pub native_id: thread::ThreadId,
}

/// Host thread-stack floor; a request below this is raised, not
/// rejected.
const HOST_MIN_STACK: u32 = 16 * 1024;

/// `TaskCreate(name, entry_fn, stack_size, priority, flags)`. `flags` is
/// accepted for API-compat and currently unused, the same way
/// `OS_TaskCreate` ignores its own `flags` for everything but a
/// (deprecated) floating-point-context opt-in.
pub fn create(
    name: &str,
    entry: impl FnOnce() + Send + 'static,
    stack_size: u32,
    priority: u32,
) -> Result<ObjId> {
    crate::assert_initialized();
    if priority > PRIORITY_LOWEST {
        return Err(Status::InvalidPriority);
    }
    let row_name = Name::new(name)?;
    let creator = current().unwrap_or(ObjId::from(u32::MAX));

    let id = TASK_TABLE.reserve(row_name)?;

    let effective_stack = stack_size.max(HOST_MIN_STACK);

    let spawn_result = thread::Builder::new()
        .name(name.to_string())
        .stack_size(effective_stack as usize)
        .spawn(move || {
            entry();
            // A task that returns instead of calling `exit()` still
            // needs its row released, or a normally-returning entry
            // point leaks a slot forever.
            exit();
        });

    let handle = match spawn_result {
        Ok(h) => h,
        Err(_) => {
            TASK_TABLE.release(id);
            return Err(Status::Error);
        }
    };

    let pthread = handle.as_pthread_t();
    let std_thread_id = handle.thread().id();
    // Detached: we never retain `handle`/call `.join()`, matching
    // `pthread_detach` immediately after `pthread_create`.
    drop(handle);

    TASK_TABLE.fill(
        id,
        row_name,
        creator,
        TaskRow {
            pthread,
            std_thread_id,
            stack_size: effective_stack,
            priority: AtomicU32Cell::new(priority),
            delete_hook: Cell::new(None),
        },
    );

    Ok(id)
}

/// `TaskRegister()`: called once, from within the new thread's own
/// entry function, to bind its row index into TLS.
pub fn register() {
    let this_thread = thread::current().id();
    if let Some(id) = TASK_TABLE.find_by(|row| row.std_thread_id == this_thread) {
        CURRENT_TASK_ID.with(|c| c.set(Some(id)));
    }
}

/// `TaskGetId()`: O(1) after `register()`.
pub fn current() -> Option<ObjId> {
    CURRENT_TASK_ID.with(|c| c.get())
}

/// `TaskGetIdByName`.
pub fn get_id_by_name(name: &str) -> Result<ObjId> {
    TASK_TABLE.find_by_name(name)
}

/// `TaskGetInfo`.
pub fn get_info(id: ObjId) -> Result<TaskInfo> {
    TASK_TABLE.with_row(id, |row| TaskInfo {
        creator: row.creator,
        stack_size: row.payload.stack_size,
        priority: row.payload.priority.get(),
        name: row.name.as_str().to_string(),
        native_id: row.payload.std_thread_id,
    })
}

/// `TaskSetPriority`: updates the shadow field only — no live
/// host-priority retargeting is attempted (see DESIGN.md's Open
/// Question decisions).
pub fn set_priority(id: ObjId, new_priority: u32) -> Status {
    if new_priority > PRIORITY_LOWEST {
        return Status::InvalidPriority;
    }
    match TASK_TABLE.with_row(id, |row| row.payload.priority.set(new_priority)) {
        Ok(()) => Status::Success,
        Err(e) => e,
    }
}

/// `TaskInstallDeleteHandler`: records a cleanup function in the
/// *calling* task's own row.
pub fn install_delete_handler(hook: fn()) -> Status {
    let Some(id) = current() else {
        return Status::Error;
    };
    match TASK_TABLE.with_row(id, |row| row.payload.delete_hook.set(Some(hook))) {
        Ok(()) => Status::Success,
        Err(e) => e,
    }
}

/// `TaskDelete(id)`: runs the delete hook in the *caller's* context,
/// then asynchronously cancels the target thread via `pthread_cancel`,
/// then releases the row. Calling this on the caller's own task is an
/// error — use `exit()` instead.
pub fn delete(id: ObjId) -> Status {
    if current() == Some(id) {
        return Status::Error;
    }

    let hook_and_pthread = TASK_TABLE.with_row(id, |row| {
        (row.payload.delete_hook.get(), row.payload.pthread)
    });
    let (hook, pthread) = match hook_and_pthread {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Some(hook) = hook {
        log::debug!("running delete hook for task {id:?} in caller's context");
        hook();
    }

    // Safety: `pthread` was obtained from a live `JoinHandle` created by
    // `create()` and the thread is never joined, so the handle remains
    // a valid target for the lifetime of the process.
    unsafe {
        libc::pthread_cancel(pthread);
    }

    TASK_TABLE.release(id);
    Status::Success
}

/// `TaskExit()`: the calling thread releases its own row and
/// terminates.
pub fn exit() -> ! {
    if let Some(id) = current() {
        TASK_TABLE.release(id);
    }
    // `std::thread`'s entry function returning is how a std-backed
    // thread terminates; there is no portable in-crate equivalent of
    // `pthread_exit` that unwinds Rust's stack safely, so returning is
    // the correct "terminate now" primitive here. Callers invoke this
    // as the last statement of their entry function.
    std::panic::resume_unwind(Box::new(TaskExited));
}

/// Sentinel payload used to short-circuit out of a task's entry
/// function from nested call frames without running the rest of it;
/// caught at the thread boundary so it never surfaces as a visible
/// panic message.
struct TaskExited;

/// `TaskDelay(ms)`: zero is a successful no-op (see DESIGN.md's Open
/// Question decisions).
pub fn delay(ms: u32) -> Status {
    if ms == 0 {
        return Status::Success;
    }
    thread::sleep(std::time::Duration::from_millis(ms as u64));
    Status::Success
}

/// Priority remap: OSAL `[0, 255]` (0 = highest) to a host
/// range `[pmin, pmax]` (may be negative), order-reversing and
/// compressive.
pub fn remap_priority(osal_priority: u32, pmin: i32, pmax: i32) -> i32 {
    let osal_priority = osal_priority.min(PRIORITY_LOWEST) as i64;

    let shift = (-pmin.min(pmax).min(0)) as i64;
    let (pmin_s, pmax_s) = (pmin as i64 + shift, pmax as i64 + shift);

    let prange = (pmax_s - pmin_s).unsigned_abs() + 1;
    let mut numbins = 255 / prange;
    if 255 % prange > prange / 2 {
        numbins += 1;
    }
    let numbins = numbins.max(1);

    let input_rev = 255 - osal_priority;
    let mapped = pmin_s + (input_rev / numbins as i64);

    let (lo, hi) = if pmin_s <= pmax_s {
        (pmin_s, pmax_s)
    } else {
        (pmax_s, pmin_s)
    };
    let clamped = mapped.clamp(lo, hi);

    (clamped - shift) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[quickcheck]
    fn remap_always_lands_within_host_range(osal_priority: u32, a: i16, b: i16) -> bool {
        let (pmin, pmax) = (a as i32, b as i32);
        let mapped = remap_priority(osal_priority, pmin, pmax);
        let (lo, hi) = if pmin <= pmax { (pmin, pmax) } else { (pmax, pmin) };
        mapped >= lo && mapped <= hi
    }

    #[test]
    fn remap_endpoints() {
        crate::api_init();
        assert_eq!(remap_priority(0, 0, 255), 255);
        assert_eq!(remap_priority(255, 0, 255), 0);
    }

    #[test]
    fn remap_is_monotonically_non_increasing() {
        crate::api_init();
        let mut prev = remap_priority(0, -20, 19);
        for p in 1..=255u32 {
            let cur = remap_priority(p, -20, 19);
            assert!(cur <= prev, "remap({p}) = {cur} > previous {prev}");
            prev = cur;
        }
    }

    #[test]
    fn create_and_get_info_roundtrip() {
        crate::api_init();
        let (tx, rx) = mpsc::channel();
        let id = create(
            "t-info",
            move || {
                register();
                tx.send(current()).unwrap();
                // Park forever-ish so `get_info` below observes a live row.
                thread::sleep(Duration::from_millis(200));
            },
            4096,
            100,
        )
        .unwrap();

        let info = get_info(id).unwrap();
        assert_eq!(info.name, "t-info");
        assert_eq!(info.stack_size, HOST_MIN_STACK.max(4096));
        assert_eq!(info.priority, 100);

        let seen_from_inside = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(seen_from_inside, Some(id));
    }

    #[test]
    fn info_then_delete_then_invalid_id() {
        crate::api_init();
        let creator = current().unwrap_or(ObjId::from(u32::MAX));
        let (ready_tx, ready_rx) = mpsc::channel();
        let id = create(
            "T1",
            move || {
                register();
                ready_tx.send(()).unwrap();
                thread::sleep(Duration::from_secs(5));
            },
            4096,
            100,
        )
        .unwrap();
        ready_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        let info = get_info(id).unwrap();
        assert_eq!(info.creator, creator);
        assert_eq!(info.stack_size, HOST_MIN_STACK.max(4096));
        assert_eq!(info.priority, 100);
        assert_eq!(info.name, "T1");

        assert_eq!(delete(id), Status::Success);
        assert_eq!(get_info(id).unwrap_err(), Status::InvalidId);
    }

    #[test]
    fn delay_zero_is_success_immediately() {
        crate::api_init();
        assert_eq!(delay(0), Status::Success);
    }

    static DELETE_HOOK_RAN: AtomicBool = AtomicBool::new(false);
    fn record_delete_hook() {
        DELETE_HOOK_RAN.store(true, Ordering::SeqCst);
    }

    #[test]
    fn delete_runs_hook_in_callers_context_then_releases_row() {
        crate::api_init();
        DELETE_HOOK_RAN.store(false, Ordering::SeqCst);
        let (ready_tx, ready_rx) = mpsc::channel();
        let id = create(
            "t-delete-hook",
            move || {
                register();
                install_delete_handler(record_delete_hook);
                ready_tx.send(()).unwrap();
                thread::sleep(Duration::from_secs(5));
            },
            4096,
            100,
        )
        .unwrap();
        ready_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        assert_eq!(delete(id), Status::Success);
        assert!(DELETE_HOOK_RAN.load(Ordering::SeqCst));
        assert_eq!(get_info(id).is_err(), true);
    }
}
