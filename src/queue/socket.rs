//! Loopback-UDP-datagram queue backing (`queue-socket` feature).
//!
//! Each queue owns one bound `UdpSocket`. `Put` opens a fresh ephemeral
//! socket, sends one datagram of exactly `size` bytes, and lets the
//! socket drop.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crate::config::QUEUE_SOCKET_BASE_PORT;
use crate::error::{Result, Status};
use crate::registry::ObjId;

use super::HostQueue;

struct SocketBacking {
    sock: UdpSocket,
    addr: SocketAddr,
}

pub(crate) fn open(
    id: ObjId,
    _name: &str,
    _depth: u32,
    _msg_size: u32,
) -> Result<Arc<dyn HostQueue>> {
    let port = QUEUE_SOCKET_BASE_PORT
        .checked_add(id.index() as u16)
        .ok_or(Status::Error)?;
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let sock = UdpSocket::bind(addr).map_err(|_| Status::Error)?;
    log::debug!("queue {id:?} backed by udp socket {addr}");
    Ok(Arc::new(SocketBacking { sock, addr }))
}

impl HostQueue for SocketBacking {
    fn put(&self, data: &[u8]) -> Status {
        let ephemeral = match UdpSocket::bind(("127.0.0.1", 0)) {
            Ok(s) => s,
            Err(_) => return Status::Error,
        };
        match ephemeral.send_to(data, self.addr) {
            Ok(_) => Status::Success,
            Err(_) => Status::QueueFull,
        }
    }

    fn get_pend(&self, buf: &mut [u8]) -> Result<usize> {
        self.sock.set_read_timeout(None).ok();
        let (n, _) = self.sock.recv_from(buf).map_err(|_| Status::Error)?;
        Ok(n)
    }

    fn get_check(&self, buf: &mut [u8]) -> Result<usize> {
        self.sock.set_nonblocking(true).map_err(|_| Status::Error)?;
        let result = self.sock.recv_from(buf);
        self.sock.set_nonblocking(false).ok();
        match result {
            Ok((n, _)) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(Status::QueueEmpty),
            Err(_) => Err(Status::Error),
        }
    }

    fn get_timeout(&self, buf: &mut [u8], ms: u32) -> Result<usize> {
        self.sock
            .set_read_timeout(Some(Duration::from_millis(ms as u64)))
            .map_err(|_| Status::Error)?;
        let result = self.sock.recv_from(buf);
        self.sock.set_read_timeout(None).ok();
        match result {
            Ok((n, _)) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(Status::QueueTimeout)
            }
            Err(_) => Err(Status::Error),
        }
    }
}
