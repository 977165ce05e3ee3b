//! Recursive mutexes: a `libc::pthread_mutex_t` created with
//! `PTHREAD_MUTEX_ERRORCHECK` (Open Question resolution, see DESIGN.md —
//! chosen over a platform-gated `PTHREAD_MUTEX_RECURSIVE`/default split)
//! so `pthread_mutex_lock` deterministically reports `EDEADLK` when the
//! owning thread relocks, which drives the `nested_depth` counter.

use std::cell::UnsafeCell;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::MAX_MUTEXES;
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};
use crate::task;

struct HostMutex(UnsafeCell<libc::pthread_mutex_t>);

unsafe impl Send for HostMutex {}
unsafe impl Sync for HostMutex {}

enum Lock {
    Acquired,
    AlreadyOwned,
    Failed,
}

impl HostMutex {
    fn new() -> Result<Self> {
        let mut attr: libc::pthread_mutexattr_t = unsafe { std::mem::zeroed() };
        if unsafe { libc::pthread_mutexattr_init(&mut attr) } != 0 {
            return Err(Status::Error);
        }
        if unsafe { libc::pthread_mutexattr_settype(&mut attr, libc::PTHREAD_MUTEX_ERRORCHECK) }
            != 0
        {
            unsafe {
                libc::pthread_mutexattr_destroy(&mut attr);
            }
            return Err(Status::Error);
        }

        let mut mutex: libc::pthread_mutex_t = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::pthread_mutex_init(&mut mutex, &attr) };
        unsafe {
            libc::pthread_mutexattr_destroy(&mut attr);
        }
        if ret != 0 {
            return Err(Status::Error);
        }
        Ok(Self(UnsafeCell::new(mutex)))
    }

    fn lock(&self) -> Lock {
        let ret = unsafe { libc::pthread_mutex_lock(self.0.get()) };
        match ret {
            0 => Lock::Acquired,
            libc::EDEADLK => Lock::AlreadyOwned,
            _ => Lock::Failed,
        }
    }

    fn unlock(&self) -> Status {
        if unsafe { libc::pthread_mutex_unlock(self.0.get()) } == 0 {
            Status::Success
        } else {
            Status::Error
        }
    }
}

impl Drop for HostMutex {
    fn drop(&mut self) {
        unsafe {
            libc::pthread_mutex_destroy(self.0.get());
        }
    }
}

struct MutexRow {
    host: Arc<HostMutex>,
    nested_depth: u32,
}

static MUTEX_TABLE: Lazy<Table<MutexRow, MAX_MUTEXES>> = Lazy::new(Table::new);

/// `MutSemCreate(name, options)`.
pub fn create(name: &str) -> Result<ObjId> {
    crate::assert_initialized();
    let row_name = Name::new(name)?;
    let creator = task::current().unwrap_or(ObjId::from(u32::MAX));

    let id = MUTEX_TABLE.reserve(row_name)?;

    let host = match HostMutex::new() {
        Ok(h) => h,
        Err(e) => {
            MUTEX_TABLE.release(id);
            return Err(e);
        }
    };

    MUTEX_TABLE.fill(
        id,
        row_name,
        creator,
        MutexRow {
            host: Arc::new(host),
            nested_depth: 0,
        },
    );
    Ok(id)
}

pub fn delete(id: ObjId) -> Status {
    match MUTEX_TABLE.validate(id) {
        Ok(()) => {
            MUTEX_TABLE.release(id);
            Status::Success
        }
        Err(e) => e,
    }
}

/// `Take`: attempts the host lock; `EDEADLK` means this thread already
/// owns it, so bump `nested_depth` instead of failing.
pub fn take(id: ObjId) -> Status {
    let host = match MUTEX_TABLE.with_row(id, |row| Arc::clone(&row.payload.host)) {
        Ok(h) => h,
        Err(e) => return e,
    };

    match host.lock() {
        Lock::Acquired => Status::Success,
        Lock::AlreadyOwned => {
            match MUTEX_TABLE.with_row_mut(id, |row| row.payload.nested_depth += 1) {
                Ok(()) => Status::Success,
                Err(e) => e,
            }
        }
        Lock::Failed => Status::Error,
    }
}

/// `Give`: decrements `nested_depth` without unlocking the
/// host mutex while still nested; unlocks only when it reaches zero.
pub fn give(id: ObjId) -> Status {
    let depth = match MUTEX_TABLE.with_row(id, |row| row.payload.nested_depth) {
        Ok(d) => d,
        Err(e) => return e,
    };

    if depth > 0 {
        return match MUTEX_TABLE.with_row_mut(id, |row| row.payload.nested_depth -= 1) {
            Ok(()) => Status::Success,
            Err(e) => e,
        };
    }

    match MUTEX_TABLE.with_row(id, |row| Arc::clone(&row.payload.host)) {
        Ok(host) => host.unlock(),
        Err(e) => e,
    }
}

pub fn get_id_by_name(name: &str) -> Result<ObjId> {
    MUTEX_TABLE.find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn recursive_take_requires_matching_gives() {
        crate::api_init();
        let id = create("m-recursive").unwrap();
        assert_eq!(take(id), Status::Success);
        assert_eq!(take(id), Status::Success);
        assert_eq!(take(id), Status::Success);
        assert_eq!(give(id), Status::Success);
        assert_eq!(give(id), Status::Success);
        assert_eq!(give(id), Status::Success);
    }

    #[test]
    fn second_thread_blocks_until_fully_released() {
        crate::api_init();
        let id = create("m-cross-thread").unwrap();
        take(id);
        take(id);

        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            ready_tx.send(()).unwrap();
            take(id);
            done_tx.send(()).unwrap();
        });
        ready_rx.recv().unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(done_rx.try_recv().is_err());

        give(id);
        give(id);
        done_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        waiter.join().unwrap();
        give(id);
    }
}
