//! Time & delay utilities: absolute-deadline computation,
//! millisecond/tick conversion, and wall-clock get/set.
//!
//! Grounded on `r3_port_std::State::tick_count`'s `Instant`-origin clock
//! (`lib.rs`): this crate doesn't need a full tick-count abstraction
//! since the OSAL consumes deadlines directly as `Instant`s, but the
//! "pick an origin once, measure `elapsed()` from it" idiom is the same.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Ticks per second this host reports. Computed as a true ratio rather
/// than truncating integer division, which would floor to zero for any
/// `TICKS_PER_SECOND` above `1_000_000`.
pub const TICKS_PER_SECOND: u32 = 1_000_000;

/// Microseconds per host tick.
pub fn tick2micros() -> u32 {
    1_000_000 / TICKS_PER_SECOND
}

/// `Milli2Ticks(ms) = ceil(ms * 1000 / tick_us)`.
pub fn milli2ticks(ms: u32) -> u32 {
    let tick_us = tick2micros().max(1) as u64;
    let micros = ms as u64 * 1000;
    ((micros + tick_us - 1) / tick_us) as u32
}

/// Compute the absolute deadline for a relative-millisecond wait:
/// converts relative ms to an absolute monotonic deadline, computed
/// once per call and never recomputed across a signal-restart loop.
pub fn deadline_from_millis(ms: u32) -> Instant {
    Instant::now() + Duration::from_millis(ms as u64)
}

/// Absolute `CLOCK_REALTIME` deadline, computed once per call, for host
/// primitives that take a `timespec` (`mq_timedreceive`, `sem_timedwait`)
/// rather than a relative duration. These host calls are specified
/// against wall-clock time, not the monotonic clock `Instant` uses, so
/// this is a distinct helper rather than a conversion of
/// `deadline_from_millis`'s result.
pub fn realtime_deadline_from_millis(ms: u32) -> libc::timespec {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    let target = now + Duration::from_millis(ms as u64);
    libc::timespec {
        tv_sec: target.as_secs() as libc::time_t,
        tv_nsec: target.subsec_nanos() as libc::c_long,
    }
}

/// Seconds + microseconds since the host epoch, returned by
/// `GetLocalTime`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OsTime {
    pub seconds: u64,
    pub microseconds: u32,
}

pub fn get_local_time() -> OsTime {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    OsTime {
        seconds: now.as_secs(),
        microseconds: now.subsec_micros(),
    }
}

/// `SetLocalTime`: attempts `settimeofday` against the requested
/// `(seconds, microseconds)` and reports what actually happened. A
/// hosted process usually has no privilege to move the system clock,
/// so `Error` here is the expected outcome outside a container or a
/// root-run test; this never claims `Success` for a call that wasn't
/// made.
pub fn set_local_time(time: OsTime) -> crate::error::Status {
    let tv = libc::timeval {
        tv_sec: time.seconds as libc::time_t,
        tv_usec: time.microseconds as libc::suseconds_t,
    };
    let ret = unsafe { libc::settimeofday(&tv, std::ptr::null()) };
    if ret == 0 {
        crate::error::Status::Success
    } else {
        crate::error::Status::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milli2ticks_matches_micros() {
        assert_eq!(milli2ticks(1), 1000);
        assert_eq!(milli2ticks(0), 0);
    }

    #[test]
    fn tick2micros_is_a_true_ratio() {
        assert_eq!(tick2micros(), 1);
    }

    #[test]
    fn deadline_is_in_the_future() {
        let d = deadline_from_millis(10);
        assert!(d > Instant::now());
    }
}
