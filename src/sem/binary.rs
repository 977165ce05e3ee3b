//! Binary semaphores: `max_value = 1`, `Give` posts and increments the
//! shadow *without* holding the table lock across the post — a
//! deliberate difference from the counting kind, kept for
//! back-compatibility with existing callers.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::MAX_BIN_SEMAPHORES;
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};
use crate::task;

use super::{HostSem, SemInfo};

struct BinSemRow {
    host: Arc<HostSem>,
    current: Arc<AtomicI32>,
}

static BIN_TABLE: Lazy<Table<BinSemRow, MAX_BIN_SEMAPHORES>> = Lazy::new(Table::new);

const MAX_VALUE: u32 = 1;

/// `BinSemCreate(name, initial, options)`: `initial` is clamped to
/// `{0, 1}`.
pub fn create(name: &str, initial: u32) -> Result<ObjId> {
    crate::assert_initialized();
    let initial = initial.min(1);
    let row_name = Name::new(name)?;
    let creator = task::current().unwrap_or(ObjId::from(u32::MAX));

    let id = BIN_TABLE.reserve(row_name)?;

    let host = match HostSem::new(initial) {
        Ok(h) => h,
        Err(e) => {
            BIN_TABLE.release(id);
            return Err(e);
        }
    };

    BIN_TABLE.fill(
        id,
        row_name,
        creator,
        BinSemRow {
            host: Arc::new(host),
            current: Arc::new(AtomicI32::new(initial as i32)),
        },
    );
    Ok(id)
}

pub fn delete(id: ObjId) -> Status {
    match BIN_TABLE.validate(id) {
        Ok(()) => {
            BIN_TABLE.release(id);
            Status::Success
        }
        Err(e) => e,
    }
}

/// `Give`: no-op when already at `max_value` (flood protection),
/// otherwise posts the host sem and increments the shadow.
pub fn give(id: ObjId) -> Status {
    let fetched = BIN_TABLE.with_row(id, |row| {
        (Arc::clone(&row.payload.host), Arc::clone(&row.payload.current))
    });
    let (host, current) = match fetched {
        Ok(v) => v,
        Err(e) => return e,
    };

    if current.load(Ordering::SeqCst) >= MAX_VALUE as i32 {
        return Status::Success;
    }
    let status = host.post();
    if status.is_success() {
        current.fetch_add(1, Ordering::SeqCst);
    }
    status
}

/// `Take`: decrements the shadow speculatively, blocks on the host sem,
/// restores the shadow on failure.
pub fn take(id: ObjId) -> Status {
    let fetched = BIN_TABLE.with_row(id, |row| {
        (Arc::clone(&row.payload.host), Arc::clone(&row.payload.current))
    });
    let (host, current) = match fetched {
        Ok(v) => v,
        Err(e) => return e,
    };

    current.fetch_sub(1, Ordering::SeqCst);
    let status = host.wait();
    if !status.is_success() {
        current.fetch_add(1, Ordering::SeqCst);
    }
    status
}

/// `TimedWait(ms)`.
pub fn timed_wait(id: ObjId, ms: u32) -> Status {
    let fetched = BIN_TABLE.with_row(id, |row| {
        (Arc::clone(&row.payload.host), Arc::clone(&row.payload.current))
    });
    let (host, current) = match fetched {
        Ok(v) => v,
        Err(e) => return e,
    };

    current.fetch_sub(1, Ordering::SeqCst);
    let deadline = super::realtime_deadline(ms);
    let status = host.timedwait(&deadline);
    if !status.is_success() {
        current.fetch_add(1, Ordering::SeqCst);
    }
    status
}

/// `Flush`: wakes exactly the currently-blocked waiters by posting
/// `-current_value` times when negative; never touches the shadow
/// value.
pub fn flush(id: ObjId) -> Status {
    let fetched = BIN_TABLE.with_row(id, |row| {
        (Arc::clone(&row.payload.host), Arc::clone(&row.payload.current))
    });
    let (host, current) = match fetched {
        Ok(v) => v,
        Err(e) => return e,
    };

    let n = current.load(Ordering::SeqCst);
    if n < 0 {
        for _ in 0..(-n) {
            host.post();
        }
    }
    Status::Success
}

pub fn get_info(id: ObjId) -> Result<SemInfo> {
    BIN_TABLE.with_row(id, |row| SemInfo {
        creator: row.creator,
        name: row.name.as_str().to_string(),
        current_value: row.payload.current.load(Ordering::SeqCst),
        max_value: MAX_VALUE,
    })
}

pub fn get_id_by_name(name: &str) -> Result<ObjId> {
    BIN_TABLE.find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn give_then_take_succeeds_immediately() {
        crate::api_init();
        let id = create("b-give-take", 0).unwrap();
        assert_eq!(give(id), Status::Success);
        assert_eq!(take(id), Status::Success);
    }

    #[test]
    fn second_take_blocks_until_timeout() {
        crate::api_init();
        let id = create("b-second-take", 0).unwrap();
        give(id);
        assert_eq!(take(id), Status::Success);
        let started = Instant::now();
        assert_eq!(timed_wait(id, 50), Status::SemTimeout);
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn take_blocks_until_another_thread_gives() {
        crate::api_init();
        let id = create("b-cross-thread", 0).unwrap();
        let giver = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            give(id);
        });
        let started = Instant::now();
        assert_eq!(take(id), Status::Success);
        assert!(started.elapsed() >= Duration::from_millis(90));
        giver.join().unwrap();
    }
}
