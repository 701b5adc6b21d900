use std::sync::atomic::{AtomicU64, Ordering};

use nflog_attr::{messages, Message, NLMSG_DONE, NLMSG_ERROR, NLMSG_NOOP};
use nflog_record::attrs::MSG_TYPE_PACKET;
use nflog_record::{CopyMode, LogRecord};
use nflog_transport::Transport;
use tracing::{debug, trace, warn};

use crate::command::{encode_command, Command, AF_UNSPEC};
use crate::config::GroupConfig;
use crate::error::{Result, SessionError};
use crate::handler::LogHandler;
use crate::registry::{GroupHandle, GroupRegistry};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The socket receive buffer is sized to hold this many kernel batches.
const RECEIVE_BUFFER_BATCHES: usize = 10;

/// Outcome of delivering log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Delivery {
    /// Every record was delivered, or skipped as recoverable.
    Continue,
    /// A handler returned this negative value; later records were not
    /// delivered.
    Halted(i32),
}

impl Delivery {
    pub fn is_halted(&self) -> bool {
        matches!(self, Delivery::Halted(_))
    }
}

/// One connection to the kernel logger and the groups bound on it.
pub struct Session<T: Transport> {
    id: u64,
    transport: T,
    registry: GroupRegistry,
}

impl<T: Transport> Session<T> {
    /// Start a session over an open transport.
    pub fn new(transport: T) -> Self {
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id,
            transport,
            registry: GroupRegistry::new(id),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// End the session and hand back the transport.
    ///
    /// Every handle issued by this session becomes stale. The kernel drops
    /// the bindings itself once the socket is closed.
    pub fn close(mut self) -> T {
        debug!(session = self.id, groups = self.registry.len(), "closing session");
        self.registry.clear();
        self.transport
    }

    /// Encode `command`, send it and wait for the kernel's answer.
    pub fn send_command(&mut self, command: Command, group: u16, family: u8) -> Result<()> {
        let mut message = encode_command(command, group, family)?;
        debug!(command = command.name(), group, family, "sending config command");
        self.transport.send_and_wait_ack(&mut message)?;
        Ok(())
    }

    /// Make this socket the log handler for address family `family`.
    pub fn bind_pf(&mut self, family: u8) -> Result<()> {
        self.send_command(Command::BindFamily, 0, family)
    }

    /// Release address family `family`.
    pub fn unbind_pf(&mut self, family: u8) -> Result<()> {
        self.send_command(Command::UnbindFamily, 0, family)
    }

    /// Subscribe to `group`.
    ///
    /// Nothing is registered unless the kernel acknowledges the bind.
    pub fn bind_group(&mut self, group: u16) -> Result<GroupHandle> {
        if self.registry.find(group).is_some() {
            return Err(SessionError::Conflict { group });
        }
        self.send_command(Command::BindGroup, group, AF_UNSPEC)?;
        self.registry.insert(group)
    }

    /// [`bind_group`](Self::bind_group) and install `handler` in one step.
    pub fn bind_group_with<H>(&mut self, group: u16, handler: H) -> Result<GroupHandle>
    where
        H: LogHandler + Send + 'static,
    {
        let handle = self.bind_group(group)?;
        self.registry.set_handler(handle, Some(Box::new(handler)))?;
        Ok(handle)
    }

    /// Unsubscribe from the group behind `handle`.
    ///
    /// If the kernel declines, the group stays registered.
    pub fn unbind_group(&mut self, handle: GroupHandle) -> Result<()> {
        self.registry.resolve(handle)?;
        self.send_command(Command::UnbindGroup, handle.group(), AF_UNSPEC)?;
        self.registry.remove(handle)?;
        Ok(())
    }

    /// Install the handler that receives the group's records.
    pub fn set_callback<H>(&mut self, handle: GroupHandle, handler: H) -> Result<()>
    where
        H: LogHandler + Send + 'static,
    {
        self.registry.set_handler(handle, Some(Box::new(handler)))
    }

    /// Remove the group's handler; its records are reported as `NoCallback`.
    pub fn clear_callback(&mut self, handle: GroupHandle) -> Result<()> {
        self.registry.set_handler(handle, None)
    }

    /// Handle of `group`, if bound in this session.
    pub fn find(&self, group: u16) -> Option<GroupHandle> {
        self.registry.find(group).map(|entry| entry.handle())
    }

    /// Bound group ids in ascending order.
    pub fn groups(&self) -> Vec<u16> {
        self.registry.groups()
    }

    pub fn set_mode(&mut self, handle: GroupHandle, mode: CopyMode, range: u32) -> Result<()> {
        self.group_command(handle, Command::Mode { mode, range })
    }

    /// Flush timeout in 1/100 s.
    pub fn set_timeout(&mut self, handle: GroupHandle, hundredths: u32) -> Result<()> {
        self.group_command(handle, Command::Timeout(hundredths))
    }

    pub fn set_qthresh(&mut self, handle: GroupHandle, count: u32) -> Result<()> {
        self.group_command(handle, Command::QueueThreshold(count))
    }

    /// Set the kernel batch buffer size, then size the transport so one
    /// receive holds a whole batch and the socket buffer holds several.
    ///
    /// The socket resize is best effort and never undoes the command.
    pub fn set_nlbufsiz(&mut self, handle: GroupHandle, bytes: u32) -> Result<()> {
        self.group_command(handle, Command::BufferSize(bytes))?;
        self.transport.reserve_message_size(bytes as usize);

        let wanted = (bytes as usize).saturating_mul(RECEIVE_BUFFER_BATCHES);
        if let Err(err) = self.transport.set_receive_buffer_size(wanted) {
            warn!(group = handle.group(), wanted, error = %err, "could not grow receive buffer");
        }
        Ok(())
    }

    /// `NFULNL_CFG_F_*` bitmask.
    pub fn set_flags(&mut self, handle: GroupHandle, flags: u16) -> Result<()> {
        self.group_command(handle, Command::Flags(flags))
    }

    /// Send one command per field set in `config`. Stops at the first
    /// failure.
    pub fn apply_group_config(&mut self, handle: GroupHandle, config: &GroupConfig) -> Result<()> {
        for command in config.commands() {
            match command {
                Command::BufferSize(bytes) => self.set_nlbufsiz(handle, bytes)?,
                other => self.group_command(handle, other)?,
            }
        }
        Ok(())
    }

    fn group_command(&mut self, handle: GroupHandle, command: Command) -> Result<()> {
        self.registry.resolve(handle)?;
        self.send_command(command, handle.group(), AF_UNSPEC)
    }

    /// Deliver one log record message to its group's handler.
    pub fn handle_message(&mut self, message: &[u8]) -> Result<Delivery> {
        let msg = Message::parse(message)?;
        if msg.header.kind != MSG_TYPE_PACKET {
            return Err(SessionError::UnexpectedMessage {
                kind: msg.header.kind,
            });
        }
        self.dispatch(&msg)
    }

    /// Deliver every log record in one receive buffer.
    ///
    /// Records for unbound groups or groups without a handler are skipped.
    /// A halting handler stops delivery of the rest of the buffer.
    pub fn handle_packet(&mut self, buf: &[u8]) -> Result<Delivery> {
        for msg in messages(buf) {
            let msg = msg?;
            match msg.header.kind {
                MSG_TYPE_PACKET => match self.dispatch(&msg) {
                    Ok(Delivery::Continue) => {}
                    Ok(halted) => return Ok(halted),
                    Err(err) if err.is_recoverable() => {
                        debug!(error = %err, "skipping log record");
                    }
                    Err(err) => return Err(err),
                },
                NLMSG_DONE => break,
                NLMSG_NOOP | NLMSG_ERROR => {
                    trace!(kind = msg.header.kind, "ignoring control message");
                }
                kind => {
                    debug!(kind, "ignoring message of unexpected type");
                }
            }
        }
        Ok(Delivery::Continue)
    }

    /// Receive one buffer from the transport and deliver it.
    pub fn process_next(&mut self) -> Result<Delivery> {
        let buf = self.transport.receive()?;
        self.handle_packet(&buf)
    }

    /// Deliver records until a handler halts. Returns the halting value.
    ///
    /// Transport failures, including the end of the stream, end the loop
    /// with an error.
    pub fn run(&mut self) -> Result<i32> {
        loop {
            if let Delivery::Halted(code) = self.process_next()? {
                return Ok(code);
            }
        }
    }

    fn dispatch(&mut self, msg: &Message<'_>) -> Result<Delivery> {
        let (nfgen, attrs) = msg.nfgen()?;
        let group = nfgen.group;

        let entry = self
            .registry
            .find_mut(group)
            .ok_or(SessionError::NoSubscriber { group })?;
        let handle = entry.handle();
        let handler = entry
            .handler_mut()
            .ok_or(SessionError::NoCallback { group })?;

        let record = LogRecord::parse(attrs)?;
        let rc = handler.on_record(handle, &nfgen, &record);
        if rc < 0 {
            debug!(group, rc, "handler halted delivery");
            Ok(Delivery::Halted(rc))
        } else {
            Ok(Delivery::Continue)
        }
    }
}

impl<T: Transport> std::fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("groups", &self.registry.groups())
            .finish()
    }
}
