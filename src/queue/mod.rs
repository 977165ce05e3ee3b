//! Bounded FIFO message queues, backed by one of two interchangeable
//! host primitives selected at build time.
//!
//! Row reads happen under the table lock; the host primitive itself is
//! always called on a cloned `Arc<dyn HostQueue>` after the lock is
//! dropped, since a lock is never held across a potentially blocking
//! host call.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::config::MAX_QUEUES;
use crate::error::{Result, Status};
use crate::registry::{Name, ObjId, Table};
use crate::task;

#[cfg(all(feature = "queue-mq", feature = "queue-socket"))]
compile_error!("features `queue-mq` and `queue-socket` are mutually exclusive");
#[cfg(not(any(feature = "queue-mq", feature = "queue-socket")))]
compile_error!("enable exactly one of `queue-mq` or `queue-socket`");

#[cfg(feature = "queue-mq")]
mod mq;
#[cfg(feature = "queue-socket")]
mod socket;

#[cfg(feature = "queue-mq")]
use mq as backend;
#[cfg(feature = "queue-socket")]
use socket as backend;

/// The three receive modes a `Get` can run in.
#[derive(Debug, Clone, Copy)]
pub enum Timeout {
    /// Block until a message arrives.
    Pend,
    /// Return `QueueEmpty` immediately if none is queued.
    Check,
    /// Wait up to this many milliseconds, then `QueueTimeout`.
    Ms(u32),
}

/// Implemented by each queue backing. All methods are called outside
/// the queue table's lock.
pub(crate) trait HostQueue: Send + Sync {
    fn put(&self, data: &[u8]) -> Status;
    fn get_pend(&self, buf: &mut [u8]) -> Result<usize>;
    fn get_check(&self, buf: &mut [u8]) -> Result<usize>;
    fn get_timeout(&self, buf: &mut [u8], ms: u32) -> Result<usize>;
}

struct QueueRow {
    host: Arc<dyn HostQueue>,
    msg_size: u32,
    depth: u32,
}

static QUEUE_TABLE: Lazy<Table<QueueRow, MAX_QUEUES>> = Lazy::new(Table::new);

/// `QueueCreate(name, depth, data_size)`. Per-process-unique backing
/// names are the backend's concern; callers only ever see the bare
/// `name`.
pub fn create(name: &str, depth: u32, data_size: u32) -> Result<ObjId> {
    crate::assert_initialized();
    let row_name = Name::new(name)?;
    let creator = task::current().unwrap_or(ObjId::from(u32::MAX));

    let id = QUEUE_TABLE.reserve(row_name)?;

    let host = match backend::open(id, name, depth, data_size) {
        Ok(h) => h,
        Err(e) => {
            QUEUE_TABLE.release(id);
            return Err(e);
        }
    };

    QUEUE_TABLE.fill(
        id,
        row_name,
        creator,
        QueueRow {
            host,
            msg_size: data_size,
            depth,
        },
    );
    Ok(id)
}

/// `QueueDelete`: tears down the host backing and releases the row.
pub fn delete(id: ObjId) -> Status {
    match QUEUE_TABLE.validate(id) {
        Ok(()) => {
            QUEUE_TABLE.release(id);
            Status::Success
        }
        Err(e) => e,
    }
}

/// `QueuePut(id, data, size, flags)`: non-blocking, `flags`
/// unused (accepted for API compat, as with `TaskCreate`'s `flags`).
pub fn put(id: ObjId, data: &[u8]) -> Status {
    let fetched = QUEUE_TABLE.with_row(id, |row| {
        if data.len() != row.payload.msg_size as usize {
            return Err(Status::QueueInvalidSize);
        }
        Ok(Arc::clone(&row.payload.host))
    });
    let host = match fetched {
        Ok(Ok(host)) => host,
        Ok(Err(e)) | Err(e) => return e,
    };
    host.put(data)
}

/// `QueueGet(id, buf, size, &copied, timeout)`. Returns the
/// number of bytes copied, or an error status — including
/// `QueueInvalidSize` if the received message's length doesn't match
/// `buf.len()`.
pub fn get(id: ObjId, buf: &mut [u8], timeout: Timeout) -> Result<usize> {
    let host = QUEUE_TABLE.with_row(id, |row| Arc::clone(&row.payload.host))?;

    let received = match timeout {
        Timeout::Pend => host.get_pend(buf)?,
        Timeout::Check => host.get_check(buf)?,
        Timeout::Ms(ms) => host.get_timeout(buf, ms)?,
    };

    if received != buf.len() {
        return Err(Status::QueueInvalidSize);
    }
    Ok(received)
}

/// `QueueGetIdByName`: the registry's `find_by_name` contract applied
/// to this kind.
pub fn get_id_by_name(name: &str) -> Result<ObjId> {
    QUEUE_TABLE.find_by_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_put_get_roundtrip() {
        crate::api_init();
        let id = create("q-fifo", 4, 4).unwrap();
        for n in 0u32..4 {
            assert_eq!(put(id, &n.to_le_bytes()), Status::Success);
        }
        let mut buf = [0u8; 4];
        for expected in 0u32..4 {
            let n = get(id, &mut buf, Timeout::Pend).unwrap();
            assert_eq!(n, 4);
            assert_eq!(u32::from_le_bytes(buf), expected);
        }
    }

    #[test]
    fn full_queue_then_drained_queue_report_their_edges() {
        crate::api_init();
        let id = create("q-full-then-empty", 4, 8).unwrap();
        for n in 0u32..4 {
            assert_eq!(put(id, &(n as u64).to_le_bytes()), Status::Success);
        }
        assert_eq!(put(id, &99u64.to_le_bytes()), Status::QueueFull);

        let mut buf = [0u8; 8];
        for expected in 0u32..4 {
            assert_eq!(get(id, &mut buf, Timeout::Pend).unwrap(), 8);
            assert_eq!(u64::from_le_bytes(buf), expected as u64);
        }
        assert_eq!(get(id, &mut buf, Timeout::Check), Err(Status::QueueEmpty));
    }

    #[test]
    fn check_on_empty_is_queue_empty() {
        crate::api_init();
        let id = create("q-check-empty", 2, 4).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(get(id, &mut buf, Timeout::Check), Err(Status::QueueEmpty));
    }

    #[test]
    fn size_mismatch_is_queue_invalid_size() {
        crate::api_init();
        let id = create("q-size-mismatch", 2, 4).unwrap();
        assert_eq!(put(id, &[1, 2, 3]), Status::QueueInvalidSize);
    }

    #[test]
    fn timeout_on_empty_waits_then_errors() {
        crate::api_init();
        let id = create("q-timeout", 2, 4).unwrap();
        let mut buf = [0u8; 4];
        let started = std::time::Instant::now();
        assert_eq!(
            get(id, &mut buf, Timeout::Ms(50)),
            Err(Status::QueueTimeout)
        );
        assert!(started.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn blocked_pend_wakes_on_put_from_another_thread() {
        crate::api_init();
        let id = create("q-blocked-pend", 2, 4).unwrap();
        let putter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            put(id, &77u32.to_le_bytes());
        });
        let mut buf = [0u8; 4];
        let n = get(id, &mut buf, Timeout::Pend).unwrap();
        assert_eq!(n, 4);
        assert_eq!(u32::from_le_bytes(buf), 77);
        putter.join().unwrap();
    }
}
