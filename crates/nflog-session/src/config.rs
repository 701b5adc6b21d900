use nflog_record::attrs::{NFULNL_CFG_F_CONNTRACK, NFULNL_CFG_F_SEQ, NFULNL_CFG_F_SEQ_GLOBAL};
use nflog_record::CopyMode;
use serde::{Deserialize, Serialize};

use crate::command::Command;

/// Extra attributes the kernel should attach to each record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogFlags {
    /// Per-group sequence number.
    pub seq: bool,
    /// Global sequence number shared by all groups.
    pub seq_global: bool,
    /// Conntrack information for the packet's flow.
    pub conntrack: bool,
}

impl LogFlags {
    /// `NFULNL_CFG_F_*` bitmask.
    pub fn bits(&self) -> u16 {
        let mut bits = 0;
        if self.seq {
            bits |= NFULNL_CFG_F_SEQ;
        }
        if self.seq_global {
            bits |= NFULNL_CFG_F_SEQ_GLOBAL;
        }
        if self.conntrack {
            bits |= NFULNL_CFG_F_CONNTRACK;
        }
        bits
    }
}

/// Per-group logging parameters. Unset fields keep the kernel defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
    pub copy_mode: Option<CopyMode>,
    /// Bytes of each packet to copy. Implies `packet` mode when no mode is set.
    pub copy_range: Option<u32>,
    /// Flush timeout in 1/100 s.
    pub timeout: Option<u32>,
    pub queue_threshold: Option<u32>,
    /// Kernel batch buffer size in bytes.
    pub buffer_size: Option<u32>,
    pub flags: Option<LogFlags>,
}

impl GroupConfig {
    /// Commands that apply this configuration, in the order they are sent.
    pub fn commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.copy_mode.is_some() || self.copy_range.is_some() {
            commands.push(Command::Mode {
                mode: self.copy_mode.unwrap_or_default(),
                range: self.copy_range.unwrap_or(0xffff),
            });
        }
        if let Some(size) = self.buffer_size {
            commands.push(Command::BufferSize(size));
        }
        if let Some(timeout) = self.timeout {
            commands.push(Command::Timeout(timeout));
        }
        if let Some(qthresh) = self.queue_threshold {
            commands.push(Command::QueueThreshold(qthresh));
        }
        if let Some(flags) = self.flags {
            commands.push(Command::Flags(flags.bits()));
        }
        commands
    }

    /// Fields set in `other` replace those in `self`.
    pub fn merge(self, other: GroupConfig) -> GroupConfig {
        GroupConfig {
            copy_mode: other.copy_mode.or(self.copy_mode),
            copy_range: other.copy_range.or(self.copy_range),
            timeout: other.timeout.or(self.timeout),
            queue_threshold: other.queue_threshold.or(self.queue_threshold),
            buffer_size: other.buffer_size.or(self.buffer_size),
            flags: other.flags.or(self.flags),
        }
    }
}
