//! NFLOG protocol constants.
//!
//! Values follow the kernel's `linux/netfilter/nfnetlink_log.h` ABI and must
//! not be renumbered.

use serde::{Deserialize, Serialize};

/// nfnetlink subsystem id of the packet logger.
pub const NFNL_SUBSYS_ULOG: u8 = 4;

/// Kernel-to-user log record message.
pub const NFULNL_MSG_PACKET: u8 = 0;
/// User-to-kernel configuration message.
pub const NFULNL_MSG_CONFIG: u8 = 1;

/// Netlink message type of a log record.
pub const MSG_TYPE_PACKET: u16 = ((NFNL_SUBSYS_ULOG as u16) << 8) | NFULNL_MSG_PACKET as u16;
/// Netlink message type of a configuration command.
pub const MSG_TYPE_CONFIG: u16 = ((NFNL_SUBSYS_ULOG as u16) << 8) | NFULNL_MSG_CONFIG as u16;

// Log record attributes.
pub const NFULA_PACKET_HDR: u16 = 1;
pub const NFULA_MARK: u16 = 2;
pub const NFULA_TIMESTAMP: u16 = 3;
pub const NFULA_IFINDEX_INDEV: u16 = 4;
pub const NFULA_IFINDEX_OUTDEV: u16 = 5;
pub const NFULA_IFINDEX_PHYSINDEV: u16 = 6;
pub const NFULA_IFINDEX_PHYSOUTDEV: u16 = 7;
pub const NFULA_HWADDR: u16 = 8;
pub const NFULA_PAYLOAD: u16 = 9;
pub const NFULA_PREFIX: u16 = 10;
pub const NFULA_UID: u16 = 11;
pub const NFULA_SEQ: u16 = 12;
pub const NFULA_SEQ_GLOBAL: u16 = 13;
pub const NFULA_GID: u16 = 14;
pub const NFULA_HWTYPE: u16 = 15;
pub const NFULA_HWHEADER: u16 = 16;
pub const NFULA_HWLEN: u16 = 17;
pub const NFULA_CT: u16 = 18;
pub const NFULA_CT_INFO: u16 = 19;
/// Highest log record attribute this client understands.
pub const NFULA_MAX: u16 = NFULA_CT_INFO;

// Configuration attributes.
pub const NFULA_CFG_CMD: u16 = 1;
pub const NFULA_CFG_MODE: u16 = 2;
pub const NFULA_CFG_NLBUFSIZ: u16 = 3;
pub const NFULA_CFG_TIMEOUT: u16 = 4;
pub const NFULA_CFG_QTHRESH: u16 = 5;
pub const NFULA_CFG_FLAGS: u16 = 6;
pub const NFULA_CFG_MAX: u16 = NFULA_CFG_FLAGS;

// Configuration command codes.
pub const NFULNL_CFG_CMD_NONE: u8 = 0;
pub const NFULNL_CFG_CMD_BIND: u8 = 1;
pub const NFULNL_CFG_CMD_UNBIND: u8 = 2;
pub const NFULNL_CFG_CMD_PF_BIND: u8 = 3;
pub const NFULNL_CFG_CMD_PF_UNBIND: u8 = 4;

// Configuration flags.
pub const NFULNL_CFG_F_SEQ: u16 = 0x0001;
pub const NFULNL_CFG_F_SEQ_GLOBAL: u16 = 0x0002;
pub const NFULNL_CFG_F_CONNTRACK: u16 = 0x0004;

/// Conntrack id inside the nested `NFULA_CT` attribute.
pub const CTA_ID: u16 = 12;
/// Highest conntrack attribute indexed when the nest is parsed as a table.
pub const CTA_MAX: u16 = 32;

/// How much of each logged packet the kernel copies to userspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CopyMode {
    /// No packet data.
    None,
    /// Metadata only.
    Meta,
    /// Metadata plus up to `copy_range` bytes of the packet.
    #[default]
    Packet,
}

impl CopyMode {
    /// Wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            CopyMode::None => 0x00,
            CopyMode::Meta => 0x01,
            CopyMode::Packet => 0x02,
        }
    }

    /// Decode a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(CopyMode::None),
            0x01 => Some(CopyMode::Meta),
            0x02 => Some(CopyMode::Packet),
            _ => None,
        }
    }
}

/// Returns a human-readable name for a log record attribute.
pub fn attr_name(kind: u16) -> &'static str {
    match kind {
        NFULA_PACKET_HDR => "PACKET_HDR",
        NFULA_MARK => "MARK",
        NFULA_TIMESTAMP => "TIMESTAMP",
        NFULA_IFINDEX_INDEV => "IFINDEX_INDEV",
        NFULA_IFINDEX_OUTDEV => "IFINDEX_OUTDEV",
        NFULA_IFINDEX_PHYSINDEV => "IFINDEX_PHYSINDEV",
        NFULA_IFINDEX_PHYSOUTDEV => "IFINDEX_PHYSOUTDEV",
        NFULA_HWADDR => "HWADDR",
        NFULA_PAYLOAD => "PAYLOAD",
        NFULA_PREFIX => "PREFIX",
        NFULA_UID => "UID",
        NFULA_SEQ => "SEQ",
        NFULA_SEQ_GLOBAL => "SEQ_GLOBAL",
        NFULA_GID => "GID",
        NFULA_HWTYPE => "HWTYPE",
        NFULA_HWHEADER => "HWHEADER",
        NFULA_HWLEN => "HWLEN",
        NFULA_CT => "CT",
        NFULA_CT_INFO => "CT_INFO",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_types_match_kernel_abi() {
        assert_eq!(MSG_TYPE_PACKET, 0x0400);
        assert_eq!(MSG_TYPE_CONFIG, 0x0401);
    }

    #[test]
    fn copy_mode_wire_values() {
        for mode in [CopyMode::None, CopyMode::Meta, CopyMode::Packet] {
            assert_eq!(CopyMode::from_u8(mode.as_u8()), Some(mode));
        }
        assert_eq!(CopyMode::from_u8(3), None);
    }

    #[test]
    fn attr_names() {
        assert_eq!(attr_name(NFULA_PREFIX), "PREFIX");
        assert_eq!(attr_name(0), "UNKNOWN");
        assert_eq!(attr_name(NFULA_MAX + 1), "UNKNOWN");
    }
}
