use std::collections::VecDeque;
use std::io::ErrorKind;
use std::os::unix::io::AsRawFd;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use netlink_sys::{protocols::NETLINK_NETFILTER, Socket};
use nflog_attr::NlMsgHeader;
use tracing::{debug, info, warn};

use crate::config::SocketConfig;
use crate::error::{Result, TransportError};
use crate::reply::{classify_reply, Reply};
use crate::traits::Transport;

/// Datagrams held back while a command waits for its acknowledgement.
const MAX_PENDING_DATAGRAMS: usize = 256;

/// `NETLINK_NETFILTER` socket speaking to the kernel's nfnetlink subsystems.
///
/// Requires `CAP_NET_ADMIN`. Log records that arrive while a command is
/// waiting for its acknowledgement are queued, up to a fixed limit, and
/// handed out by the next [`Transport::receive`] calls.
pub struct NetlinkSocket {
    socket: Socket,
    port_id: u32,
    next_seq: u32,
    pending: VecDeque<Bytes>,
    config: SocketConfig,
}

impl NetlinkSocket {
    /// Open and bind a socket with default configuration.
    pub fn open() -> Result<Self> {
        Self::open_with_config(SocketConfig::default())
    }

    /// Open and bind a socket with explicit configuration.
    pub fn open_with_config(config: SocketConfig) -> Result<Self> {
        let mut socket = Socket::new(NETLINK_NETFILTER).map_err(TransportError::Open)?;
        let addr = socket.bind_auto().map_err(TransportError::Open)?;

        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(1);

        let mut nl = Self {
            socket,
            port_id: addr.port_number(),
            next_seq: seed,
            pending: VecDeque::new(),
            config,
        };

        if let Some(size) = config.receive_buffer_size {
            nl.set_receive_buffer_size(size)?;
        }
        if config.read_timeout.is_some() {
            nl.set_read_timeout(config.read_timeout)?;
        }

        info!(port_id = nl.port_id, "opened netfilter netlink socket");
        Ok(nl)
    }

    /// Port id the kernel assigned to this socket.
    pub fn port_id(&self) -> u32 {
        self.port_id
    }

    /// Raw file descriptor, for use with poll/epoll.
    pub fn as_raw_fd(&self) -> i32 {
        self.socket.as_raw_fd()
    }

    /// Current socket configuration.
    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Set or clear the receive timeout.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let tv = match timeout {
            Some(t) => libc::timeval {
                tv_sec: libc::time_t::try_from(t.as_secs()).unwrap_or(libc::time_t::MAX),
                tv_usec: libc::suseconds_t::from(t.subsec_micros() as i32),
            },
            None => libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
        };
        // SAFETY: `tv` outlives the call and the length matches its type.
        let rc = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                (&tv as *const libc::timeval).cast::<libc::c_void>(),
                std::mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(TransportError::Io(std::io::Error::last_os_error()));
        }
        self.config.read_timeout = timeout;
        Ok(())
    }

    fn recv_datagram(&mut self) -> Result<Bytes> {
        let queued = recv_retrying(|| self.peek_datagram_len())?;
        let before = self.config.max_message_size;
        let capacity = self.config.fit_message_size(queued);
        if capacity > before {
            debug!(before, capacity, "grew receive size for a large batch");
        }

        let mut buf = BytesMut::with_capacity(capacity);
        let read = recv_retrying(|| self.socket.recv(&mut buf, 0))?;
        if read == 0 {
            return Err(TransportError::Closed);
        }
        Ok(buf.freeze())
    }

    /// Length of the next queued datagram, without consuming it.
    fn peek_datagram_len(&self) -> std::io::Result<usize> {
        // SAFETY: a zero-length peek writes nothing; MSG_TRUNC makes the
        // kernel report the full datagram length anyway.
        let rc = unsafe {
            libc::recv(
                self.as_raw_fd(),
                std::ptr::null_mut(),
                0,
                libc::MSG_PEEK | libc::MSG_TRUNC,
            )
        };
        if rc < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    fn setsockopt_int(&self, option: libc::c_int, value: libc::c_int) -> std::io::Result<()> {
        // SAFETY: `value` outlives the call and the length matches its type;
        // the descriptor is owned by `self.socket`.
        let rc = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                option,
                (&value as *const libc::c_int).cast::<libc::c_void>(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn receive_buffer_size(&self) -> std::io::Result<usize> {
        let mut value: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        // SAFETY: `value` and `len` are valid writable pointers for their sizes.
        let rc = unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                (&mut value as *mut libc::c_int).cast::<libc::c_void>(),
                &mut len,
            )
        };
        if rc < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(value.max(0) as usize)
        }
    }
}

impl Transport for NetlinkSocket {
    fn send_and_wait_ack(&mut self, request: &mut [u8]) -> Result<()> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        NlMsgHeader::stamp_seq(request, seq)?;

        loop {
            match self.socket.send(request, 0) {
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        debug!(seq, len = request.len(), "sent netlink request");

        loop {
            let datagram = self.recv_datagram()?;
            match classify_reply(&datagram, seq)? {
                Reply::Ack => return Ok(()),
                Reply::Rejected(code) => {
                    debug!(seq, code, "netlink request rejected");
                    return Err(TransportError::Rejected { code });
                }
                Reply::Stale { seq: stale } => {
                    debug!(expected = seq, got = stale, "dropping stale acknowledgement");
                }
                Reply::Unrelated => queue_unrelated(&mut self.pending, datagram),
            }
        }
    }

    fn receive(&mut self) -> Result<Bytes> {
        if let Some(datagram) = self.pending.pop_front() {
            return Ok(datagram);
        }
        self.recv_datagram()
    }

    fn reserve_message_size(&mut self, bytes: usize) {
        let size = self.config.fit_message_size(bytes);
        debug!(requested = bytes, size, "receive size reserved");
    }

    fn set_receive_buffer_size(&mut self, bytes: usize) -> Result<usize> {
        let requested = libc::c_int::try_from(bytes).unwrap_or(libc::c_int::MAX);

        // SO_RCVBUFFORCE ignores rmem_max but needs CAP_NET_ADMIN.
        if let Err(err) = self.setsockopt_int(libc::SO_RCVBUFFORCE, requested) {
            debug!(error = %err, "SO_RCVBUFFORCE refused, falling back to SO_RCVBUF");
            self.setsockopt_int(libc::SO_RCVBUF, requested)?;
        }

        let granted = self.receive_buffer_size()?;
        if granted < bytes {
            warn!(requested = bytes, granted, "kernel granted a smaller receive buffer");
        }
        Ok(granted)
    }
}

fn recv_retrying(mut op: impl FnMut() -> std::io::Result<usize>) -> Result<usize> {
    loop {
        match op() {
            Ok(n) => return Ok(n),
            Err(err) => match err.kind() {
                ErrorKind::Interrupted => continue,
                ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                    return Err(TransportError::TimedOut)
                }
                _ if err.raw_os_error() == Some(libc::ENOBUFS) => {
                    warn!("netlink receive buffer overrun");
                    return Err(TransportError::Overrun);
                }
                _ => return Err(TransportError::Io(err)),
            },
        }
    }
}

/// Hold a datagram that arrived while a command waited for its ack.
///
/// Keeps at most [`MAX_PENDING_DATAGRAMS`]; the oldest is dropped first.
fn queue_unrelated(pending: &mut VecDeque<Bytes>, datagram: Bytes) {
    if pending.len() >= MAX_PENDING_DATAGRAMS {
        pending.pop_front();
        warn!(
            limit = MAX_PENDING_DATAGRAMS,
            "dropping oldest queued datagram while waiting for an ack"
        );
    }
    pending.push_back(datagram);
}

impl std::fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("port_id", &self.port_id)
            .field("pending", &self.pending.len())
            .finish()
    }
}
