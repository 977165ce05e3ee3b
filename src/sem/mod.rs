//! Shared host-semaphore wrapper for the binary and counting kinds: an
//! unnamed, process-private `libc::sem_t`, since `std::sync` has no
//! `trywait`/`timedwait`-capable primitive.

use std::cell::UnsafeCell;

use crate::error::{from_errno, Status};
use crate::time::realtime_deadline_from_millis;

pub mod binary;
pub mod counting;

/// Result of a blocking host-semaphore wait.
pub(crate) struct HostSem(UnsafeCell<libc::sem_t>);

// Every access besides construction/destruction goes through the
// libc wait/post calls, which are themselves thread-safe; the
// `UnsafeCell` only exists because `libc::sem_t` has no safe wrapper.
unsafe impl Send for HostSem {}
unsafe impl Sync for HostSem {}

impl HostSem {
    pub(crate) fn new(initial: u32) -> Result<Self, Status> {
        let sem = UnsafeCell::new(unsafe { std::mem::zeroed::<libc::sem_t>() });
        let ret = unsafe { libc::sem_init(sem.get(), 0, initial) };
        if ret != 0 {
            return Err(from_errno(errno::errno()));
        }
        Ok(Self(sem))
    }

    pub(crate) fn post(&self) -> Status {
        let ret = unsafe { libc::sem_post(self.0.get()) };
        if ret == 0 {
            Status::Success
        } else {
            from_errno(errno::errno())
        }
    }

    /// Blocking wait with signal-restart: every blocking host call must
    /// restart transparently on `EINTR`.
    pub(crate) fn wait(&self) -> Status {
        loop {
            let ret = unsafe { libc::sem_wait(self.0.get()) };
            if ret == 0 {
                return Status::Success;
            }
            let e = errno::errno();
            if e.0 == libc::EINTR {
                continue;
            }
            return Status::SemFailure;
        }
    }

    /// Timed wait against an absolute `CLOCK_REALTIME` deadline computed
    /// once by the caller, never recomputed across restarts.
    pub(crate) fn timedwait(&self, deadline: &libc::timespec) -> Status {
        loop {
            let ret = unsafe { libc::sem_timedwait(self.0.get(), deadline) };
            if ret == 0 {
                return Status::Success;
            }
            let e = errno::errno();
            match e.0 {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return Status::SemTimeout,
                _ => return Status::SemFailure,
            }
        }
    }
}

impl Drop for HostSem {
    fn drop(&mut self) {
        unsafe {
            libc::sem_destroy(self.0.get());
        }
    }
}

pub(crate) fn realtime_deadline(ms: u32) -> libc::timespec {
    realtime_deadline_from_millis(ms)
}

/// `GetInfo` result shared by binary and counting semaphores.
#[derive(Debug, Clone)]
pub struct SemInfo {
    pub creator: crate::registry::ObjId,
    pub name: String,
    pub current_value: i32,
    pub max_value: u32,
}
