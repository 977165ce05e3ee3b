//! Counting semaphores: identical to the binary kind except
//! `max_value` defaults to `SEM_VALUE_MAX` and `Give` runs under the
//! table lock so the shadow and the host sem move together — the one
//! place this kind's locking differs from binary.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::{MAX_COUNT_SEMAPHORES, SEM_VALUE_MAX};
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};
use crate::task;

use super::{HostSem, SemInfo};

struct CountSemRow {
    host: Arc<HostSem>,
    current: AtomicI32,
    max_value: u32,
}

static COUNT_TABLE: Lazy<Table<CountSemRow, MAX_COUNT_SEMAPHORES>> = Lazy::new(Table::new);

/// `CountSemCreate(name, initial, max_value)`.
pub fn create(name: &str, initial: u32, max_value: u32) -> Result<ObjId> {
    crate::assert_initialized();
    let max_value = if max_value == 0 { SEM_VALUE_MAX } else { max_value };
    if max_value > SEM_VALUE_MAX || initial > max_value {
        return Err(Status::InvalidSemValue);
    }
    let row_name = Name::new(name)?;
    let creator = task::current().unwrap_or(ObjId::from(u32::MAX));

    let id = COUNT_TABLE.reserve(row_name)?;

    let host = match HostSem::new(initial) {
        Ok(h) => h,
        Err(e) => {
            COUNT_TABLE.release(id);
            return Err(e);
        }
    };

    COUNT_TABLE.fill(
        id,
        row_name,
        creator,
        CountSemRow {
            host: Arc::new(host),
            current: AtomicI32::new(initial as i32),
            max_value,
        },
    );
    Ok(id)
}

pub fn delete(id: ObjId) -> Status {
    match COUNT_TABLE.validate(id) {
        Ok(()) => {
            COUNT_TABLE.release(id);
            Status::Success
        }
        Err(e) => e,
    }
}

/// `Give`: runs entirely under the table lock, unlike the binary kind,
/// so the shadow and the host sem count never disagree even under
/// concurrent `Give`s.
pub fn give(id: ObjId) -> Status {
    COUNT_TABLE
        .with_row(id, |row| {
            if row.payload.current.load(Ordering::SeqCst) >= row.payload.max_value as i32 {
                return Status::Success;
            }
            let status = row.payload.host.post();
            if status.is_success() {
                row.payload.current.fetch_add(1, Ordering::SeqCst);
            }
            status
        })
        .unwrap_or_else(|e| e)
}

/// `Take`: same speculative-shadow-decrement protocol as the binary
/// kind, outside the lock.
pub fn take(id: ObjId) -> Status {
    let fetched = COUNT_TABLE.with_row(id, |row| Arc::clone(&row.payload.host));
    let host = match fetched {
        Ok(h) => h,
        Err(e) => return e,
    };

    let decrement = COUNT_TABLE.with_row(id, |row| {
        row.payload.current.fetch_sub(1, Ordering::SeqCst);
    });
    if let Err(e) = decrement {
        return e;
    }

    let status = host.wait();
    if !status.is_success() {
        let _ = COUNT_TABLE.with_row(id, |row| {
            row.payload.current.fetch_add(1, Ordering::SeqCst);
        });
    }
    status
}

/// `TimedWait(ms)`.
pub fn timed_wait(id: ObjId, ms: u32) -> Status {
    let fetched = COUNT_TABLE.with_row(id, |row| Arc::clone(&row.payload.host));
    let host = match fetched {
        Ok(h) => h,
        Err(e) => return e,
    };

    if let Err(e) = COUNT_TABLE.with_row(id, |row| {
        row.payload.current.fetch_sub(1, Ordering::SeqCst);
    }) {
        return e;
    }

    let deadline = super::realtime_deadline(ms);
    let status = host.timedwait(&deadline);
    if !status.is_success() {
        let _ = COUNT_TABLE.with_row(id, |row| {
            row.payload.current.fetch_add(1, Ordering::SeqCst);
        });
    }
    status
}

/// `Flush`: same contract as the binary kind.
pub fn flush(id: ObjId) -> Status {
    let fetched = COUNT_TABLE.with_row(id, |row| Arc::clone(&row.payload.host));
    let host = match fetched {
        Ok(h) => h,
        Err(e) => return e,
    };
    let n = match COUNT_TABLE.with_row(id, |row| row.payload.current.load(Ordering::SeqCst)) {
        Ok(n) => n,
        Err(e) => return e,
    };
    if n < 0 {
        for _ in 0..(-n) {
            host.post();
        }
    }
    Status::Success
}

pub fn get_info(id: ObjId) -> Result<SemInfo> {
    COUNT_TABLE.with_row(id, |row| SemInfo {
        creator: row.creator,
        name: row.name.as_str().to_string(),
        current_value: row.payload.current.load(Ordering::SeqCst),
        max_value: row.payload.max_value,
    })
}

pub fn get_id_by_name(name: &str) -> Result<ObjId> {
    COUNT_TABLE.find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn three_takes_succeed_fourth_times_out() {
        crate::api_init();
        let id = create("c-three-of-three", 3, 3).unwrap();
        assert_eq!(take(id), Status::Success);
        assert_eq!(take(id), Status::Success);
        assert_eq!(take(id), Status::Success);
        let started = Instant::now();
        assert_eq!(timed_wait(id, 50), Status::SemTimeout);
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn give_respects_max_value() {
        crate::api_init();
        let id = create("c-max-value", 2, 2).unwrap();
        assert_eq!(give(id), Status::Success); // no-op, already at max
        let info = get_info(id).unwrap();
        assert_eq!(info.current_value, 2);
    }

    #[test]
    fn invalid_sem_value_rejected() {
        crate::api_init();
        assert_eq!(
            create("c-invalid", 5, 3),
            Err(Status::InvalidSemValue)
        );
    }
}
