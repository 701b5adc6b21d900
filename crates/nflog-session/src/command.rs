//! Configuration commands sent to the kernel logger.

use bytes::BytesMut;
use nflog_attr::{AttrTable, Message, MessageBuilder, NfGenHeader, NLM_F_ACK, NLM_F_REQUEST};
use nflog_record::attrs::*;
use nflog_record::CopyMode;

use crate::error::{Result, SessionError};

/// Address family used by group-level commands.
pub const AF_UNSPEC: u8 = 0;

/// One configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Make the logger the handler for an address family.
    BindFamily,
    /// Release the address family.
    UnbindFamily,
    /// Subscribe to a group.
    BindGroup,
    /// Unsubscribe from a group.
    UnbindGroup,
    /// How much of each packet to copy, and up to how many bytes.
    Mode { mode: CopyMode, range: u32 },
    /// Maximum delay before a batch is flushed, in 1/100 s.
    Timeout(u32),
    /// Records queued in the kernel before a batch is flushed.
    QueueThreshold(u32),
    /// Kernel-side batch buffer size in bytes.
    BufferSize(u32),
    /// `NFULNL_CFG_F_*` bitmask.
    Flags(u16),
}

impl Command {
    fn code(self) -> Option<u8> {
        match self {
            Command::BindFamily => Some(NFULNL_CFG_CMD_PF_BIND),
            Command::UnbindFamily => Some(NFULNL_CFG_CMD_PF_UNBIND),
            Command::BindGroup => Some(NFULNL_CFG_CMD_BIND),
            Command::UnbindGroup => Some(NFULNL_CFG_CMD_UNBIND),
            _ => None,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            NFULNL_CFG_CMD_PF_BIND => Some(Command::BindFamily),
            NFULNL_CFG_CMD_PF_UNBIND => Some(Command::UnbindFamily),
            NFULNL_CFG_CMD_BIND => Some(Command::BindGroup),
            NFULNL_CFG_CMD_UNBIND => Some(Command::UnbindGroup),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::BindFamily => "bind-family",
            Command::UnbindFamily => "unbind-family",
            Command::BindGroup => "bind-group",
            Command::UnbindGroup => "unbind-group",
            Command::Mode { .. } => "mode",
            Command::Timeout(_) => "timeout",
            Command::QueueThreshold(_) => "queue-threshold",
            Command::BufferSize(_) => "buffer-size",
            Command::Flags(_) => "flags",
        }
    }
}

/// A command recovered from an encoded configuration message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedCommand {
    pub command: Command,
    pub group: u16,
    pub family: u8,
}

/// Build the configuration message for `command`.
///
/// The sequence number is left at zero for the transport to stamp.
pub fn encode_command(command: Command, group: u16, family: u8) -> Result<BytesMut> {
    let mut builder = MessageBuilder::new(
        MSG_TYPE_CONFIG,
        NLM_F_REQUEST | NLM_F_ACK,
        NfGenHeader::new(family, group),
    );
    let attrs = builder.attrs();

    match command {
        Command::Mode { mode, range } => {
            let mut payload = [0u8; 6];
            payload[..4].copy_from_slice(&range.to_be_bytes());
            payload[4] = mode.as_u8();
            attrs.put_attr(NFULA_CFG_MODE, &payload)?;
        }
        Command::Timeout(hundredths) => {
            attrs.put_u32(NFULA_CFG_TIMEOUT, hundredths)?;
        }
        Command::QueueThreshold(count) => {
            attrs.put_u32(NFULA_CFG_QTHRESH, count)?;
        }
        Command::BufferSize(bytes) => {
            attrs.put_u32(NFULA_CFG_NLBUFSIZ, bytes)?;
        }
        Command::Flags(flags) => {
            attrs.put_u16(NFULA_CFG_FLAGS, flags)?;
        }
        cmd => {
            // Only the four bind/unbind variants remain here.
            if let Some(code) = cmd.code() {
                attrs.put_u8(NFULA_CFG_CMD, code)?;
            }
        }
    }

    Ok(builder.finish()?)
}

/// Decode a configuration message built by [`encode_command`].
pub fn decode_command(message: &[u8]) -> Result<DecodedCommand> {
    let msg = Message::parse(message)?;
    if msg.header.kind != MSG_TYPE_CONFIG {
        return Err(SessionError::UnexpectedMessage {
            kind: msg.header.kind,
        });
    }

    let (nfgen, attrs) = msg.nfgen()?;
    let table = AttrTable::parse(attrs, NFULA_CFG_MAX)?;

    let command = if let Some(code) = table.get_u8(NFULA_CFG_CMD)? {
        Command::from_code(code)
            .ok_or_else(|| SessionError::InvalidCommand(format!("unknown command code {code}")))?
    } else if let Some(payload) = table.get_array::<6>(NFULA_CFG_MODE)? {
        let mode = CopyMode::from_u8(payload[4]).ok_or_else(|| {
            SessionError::InvalidCommand(format!("unknown copy mode {}", payload[4]))
        })?;
        Command::Mode {
            mode,
            range: u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]),
        }
    } else if let Some(value) = table.get_u32(NFULA_CFG_TIMEOUT)? {
        Command::Timeout(value)
    } else if let Some(value) = table.get_u32(NFULA_CFG_QTHRESH)? {
        Command::QueueThreshold(value)
    } else if let Some(value) = table.get_u32(NFULA_CFG_NLBUFSIZ)? {
        Command::BufferSize(value)
    } else if let Some(value) = table.get_u16(NFULA_CFG_FLAGS)? {
        Command::Flags(value)
    } else {
        return Err(SessionError::InvalidCommand(
            "no configuration attribute present".to_string(),
        ));
    };

    Ok(DecodedCommand {
        command,
        group: nfgen.group,
        family: nfgen.family,
    })
}
