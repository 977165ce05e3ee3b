//! POSIX message-queue backing (`queue-mq` feature, default).
//!
//! Opens three descriptors against the same named queue — one
//! non-blocking for `Put`/`Check`, one blocking for `Pend`/timed waits —
//! because `mq_timedreceive` ignores its timeout entirely and behaves
//! like `mq_receive` would under `O_NONBLOCK` (POSIX leaves no way to
//! get both "never blocks" and "blocks up to a deadline" out of a single
//! descriptor's flags).

use std::ffi::CString;
use std::sync::Arc;

use crate::config::MQ_MAXMSG;
use crate::error::{from_errno, Result, Status};
use crate::registry::ObjId;
use crate::time::realtime_deadline_from_millis;

use super::HostQueue;

struct MqBacking {
    put_mqd: libc::mqd_t,
    get_block_mqd: libc::mqd_t,
    get_nonblock_mqd: libc::mqd_t,
    name: CString,
    msg_size: usize,
}

// Raw descriptors behind a `Mutex`-guarded table row; never touched
// concurrently without synchronization above this layer.
unsafe impl Send for MqBacking {}
unsafe impl Sync for MqBacking {}

pub(crate) fn open(
    id: ObjId,
    name: &str,
    depth: u32,
    msg_size: u32,
) -> Result<Arc<dyn HostQueue>> {
    let pid = unsafe { libc::getpid() };
    let cname = CString::new(format!("/{pid}.{name}")).map_err(|_| Status::NameTooLong)?;

    let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
    attr.mq_maxmsg = (depth as i64).min(MQ_MAXMSG).max(1);
    attr.mq_msgsize = msg_size as i64;

    // Create the queue and immediately close this handle; the two
    // operational descriptors below are opened fresh against the same
    // name so each can carry its own blocking-mode flags.
    let creator = unsafe {
        libc::mq_open(
            cname.as_ptr(),
            libc::O_CREAT | libc::O_RDWR,
            0o666 as libc::mode_t,
            &attr as *const libc::mq_attr as *mut libc::mq_attr,
        )
    };
    if creator == -1 {
        return Err(from_errno(errno::errno()));
    }
    unsafe {
        libc::mq_close(creator);
    }

    let put_mqd = unsafe { libc::mq_open(cname.as_ptr(), libc::O_WRONLY | libc::O_NONBLOCK) };
    let get_block_mqd = unsafe { libc::mq_open(cname.as_ptr(), libc::O_RDONLY) };
    let get_nonblock_mqd =
        unsafe { libc::mq_open(cname.as_ptr(), libc::O_RDONLY | libc::O_NONBLOCK) };

    if put_mqd == -1 || get_block_mqd == -1 || get_nonblock_mqd == -1 {
        for mqd in [put_mqd, get_block_mqd, get_nonblock_mqd] {
            if mqd != -1 {
                unsafe {
                    libc::mq_close(mqd);
                }
            }
        }
        unsafe {
            libc::mq_unlink(cname.as_ptr());
        }
        return Err(Status::Error);
    }

    log::debug!("queue {id:?} backed by mqueue {:?}", cname);

    Ok(Arc::new(MqBacking {
        put_mqd,
        get_block_mqd,
        get_nonblock_mqd,
        name: cname,
        msg_size: msg_size as usize,
    }))
}

impl Drop for MqBacking {
    fn drop(&mut self) {
        unsafe {
            libc::mq_close(self.put_mqd);
            libc::mq_close(self.get_block_mqd);
            libc::mq_close(self.get_nonblock_mqd);
            libc::mq_unlink(self.name.as_ptr());
        }
    }
}

impl HostQueue for MqBacking {
    fn put(&self, data: &[u8]) -> Status {
        let ret = unsafe {
            libc::mq_send(
                self.put_mqd,
                data.as_ptr() as *const libc::c_char,
                data.len(),
                0,
            )
        };
        if ret == 0 {
            return Status::Success;
        }
        let e = errno::errno();
        if e.0 == libc::EAGAIN {
            Status::QueueFull
        } else {
            from_errno(e)
        }
    }

    fn get_pend(&self, buf: &mut [u8]) -> Result<usize> {
        let mut scratch = vec![0u8; self.msg_size];
        loop {
            let n = unsafe {
                libc::mq_receive(
                    self.get_block_mqd,
                    scratch.as_mut_ptr() as *mut libc::c_char,
                    scratch.len(),
                    std::ptr::null_mut(),
                )
            };
            if n >= 0 {
                return copy_received(&scratch, n as usize, buf);
            }
            let e = errno::errno();
            if e.0 == libc::EINTR {
                continue;
            }
            return Err(from_errno(e));
        }
    }

    fn get_check(&self, buf: &mut [u8]) -> Result<usize> {
        let mut scratch = vec![0u8; self.msg_size];
        let n = unsafe {
            libc::mq_receive(
                self.get_nonblock_mqd,
                scratch.as_mut_ptr() as *mut libc::c_char,
                scratch.len(),
                std::ptr::null_mut(),
            )
        };
        if n >= 0 {
            return copy_received(&scratch, n as usize, buf);
        }
        let e = errno::errno();
        if e.0 == libc::EAGAIN {
            Err(Status::QueueEmpty)
        } else {
            Err(from_errno(e))
        }
    }

    fn get_timeout(&self, buf: &mut [u8], ms: u32) -> Result<usize> {
        let deadline = realtime_deadline_from_millis(ms);
        let mut scratch = vec![0u8; self.msg_size];
        loop {
            let n = unsafe {
                libc::mq_timedreceive(
                    self.get_block_mqd,
                    scratch.as_mut_ptr() as *mut libc::c_char,
                    scratch.len(),
                    std::ptr::null_mut(),
                    &deadline,
                )
            };
            if n >= 0 {
                return copy_received(&scratch, n as usize, buf);
            }
            let e = errno::errno();
            match e.0 {
                libc::EINTR => continue,
                libc::ETIMEDOUT => return Err(Status::QueueTimeout),
                _ => return Err(from_errno(e)),
            }
        }
    }
}

/// Copies `received` bytes of `scratch` into the caller's `buf`, refusing
/// the copy (and the caller's undersized/oversized buffer) when the two
/// lengths disagree rather than ever writing past `buf`'s end.
fn copy_received(scratch: &[u8], received: usize, buf: &mut [u8]) -> Result<usize> {
    if received != buf.len() {
        return Err(Status::QueueInvalidSize);
    }
    buf.copy_from_slice(&scratch[..received]);
    Ok(received)
}
