use nflog_attr::{AttrError, AttrIter, AttrTable, Result};
use serde::Serialize;

use crate::attrs::*;

/// Fixed packet header carried by every log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PacketHeader {
    /// Link-layer protocol (ETH_P_*), host order.
    pub hw_protocol: u16,
    /// Netfilter hook the packet was logged from.
    pub hook: u8,
}

/// Time the kernel logged the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timestamp {
    pub sec: u64,
    pub usec: u64,
}

/// Link-layer source address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwAddr {
    len: u16,
    addr: [u8; 8],
}

impl HwAddr {
    /// Address length the kernel declared.
    pub fn declared_len(&self) -> u16 {
        self.len
    }

    /// Address bytes, capped at the 8 bytes the wire format carries.
    pub fn as_bytes(&self) -> &[u8] {
        &self.addr[..usize::from(self.len).min(self.addr.len())]
    }
}

/// One kernel log record.
///
/// Every accessor returns `Ok(None)` when the attribute is absent and an
/// error only when it is present but malformed. Decoding one field never
/// affects another.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    attrs: AttrTable<'a>,
}

impl<'a> LogRecord<'a> {
    /// Wrap an already parsed attribute table.
    pub fn new(attrs: AttrTable<'a>) -> Self {
        Self { attrs }
    }

    /// Parse the attribute section of a log record message.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        AttrTable::parse(buf, NFULA_MAX).map(Self::new)
    }

    /// Underlying attribute table.
    pub fn attrs(&self) -> &AttrTable<'a> {
        &self.attrs
    }

    pub fn packet_header(&self) -> Result<Option<PacketHeader>> {
        Ok(self
            .attrs
            .get_array::<4>(NFULA_PACKET_HDR)?
            .map(|b| PacketHeader {
                hw_protocol: u16::from_be_bytes([b[0], b[1]]),
                hook: b[2],
            }))
    }

    /// Link-layer type (ARPHRD_*).
    pub fn hw_type(&self) -> Result<Option<u16>> {
        self.attrs.get_u16(NFULA_HWTYPE)
    }

    pub fn hw_header_len(&self) -> Result<Option<u16>> {
        self.attrs.get_u16(NFULA_HWLEN)
    }

    /// Raw link-layer header.
    pub fn hw_header(&self) -> Option<&'a [u8]> {
        self.attrs.get(NFULA_HWHEADER)
    }

    pub fn mark(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_MARK)
    }

    pub fn timestamp(&self) -> Result<Option<Timestamp>> {
        Ok(self.attrs.get_array::<16>(NFULA_TIMESTAMP)?.map(|b| {
            let mut sec = [0u8; 8];
            let mut usec = [0u8; 8];
            sec.copy_from_slice(&b[..8]);
            usec.copy_from_slice(&b[8..]);
            Timestamp {
                sec: u64::from_be_bytes(sec),
                usec: u64::from_be_bytes(usec),
            }
        }))
    }

    /// Input interface index.
    pub fn indev(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_IFINDEX_INDEV)
    }

    /// Output interface index.
    ///
    /// `Some(0)` is ambiguous: the kernel never assigns index 0, yet a
    /// sender may still emit it for "no interface".
    pub fn outdev(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_IFINDEX_OUTDEV)
    }

    /// Physical input interface index (bridged traffic only).
    pub fn physindev(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_IFINDEX_PHYSINDEV)
    }

    /// Physical output interface index (bridged traffic only). Index 0 is
    /// ambiguous in the same way as [`outdev`](Self::outdev).
    pub fn physoutdev(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_IFINDEX_PHYSOUTDEV)
    }

    pub fn hw_addr(&self) -> Result<Option<HwAddr>> {
        Ok(self.attrs.get_array::<12>(NFULA_HWADDR)?.map(|b| {
            let mut addr = [0u8; 8];
            addr.copy_from_slice(&b[4..]);
            HwAddr {
                len: u16::from_be_bytes([b[0], b[1]]),
                addr,
            }
        }))
    }

    /// Packet bytes copied by the kernel, starting at the network header.
    pub fn payload(&self) -> Option<&'a [u8]> {
        self.attrs.get(NFULA_PAYLOAD)
    }

    /// Log prefix configured in the firewall rule, without its NUL
    /// terminator.
    pub fn prefix(&self) -> Result<Option<&'a str>> {
        let Some(raw) = self.attrs.get(NFULA_PREFIX) else {
            return Ok(None);
        };
        let text = raw.split(|b| *b == 0).next().unwrap_or(raw);
        std::str::from_utf8(text)
            .map(Some)
            .map_err(|_| AttrError::InvalidString {
                attr_type: NFULA_PREFIX,
            })
    }

    /// Uid of the local socket owner.
    pub fn uid(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_UID)
    }

    /// Gid of the local socket owner.
    pub fn gid(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_GID)
    }

    /// Per-group sequence number (needs the SEQ config flag).
    pub fn seq(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_SEQ)
    }

    /// Global sequence number (needs the SEQ_GLOBAL config flag).
    pub fn seq_global(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_SEQ_GLOBAL)
    }

    /// Connection tracking id of the packet's flow.
    ///
    /// Scans the children of the nested conntrack attribute for `CTA_ID`.
    pub fn ct_id(&self) -> Result<Option<u32>> {
        let Some(nest) = self.attrs.get(NFULA_CT) else {
            return Ok(None);
        };
        for attr in AttrIter::new(nest) {
            let attr = attr?;
            if attr.kind() != CTA_ID {
                continue;
            }
            let bytes: [u8; 4] =
                attr.payload()
                    .try_into()
                    .map_err(|_| AttrError::TypeMismatch {
                        attr_type: CTA_ID,
                        expected: 4,
                        actual: attr.len(),
                    })?;
            return Ok(Some(u32::from_be_bytes(bytes)));
        }
        Ok(None)
    }

    /// Conntrack state (IP_CT_*) of the packet.
    pub fn ct_info(&self) -> Result<Option<u32>> {
        self.attrs.get_u32(NFULA_CT_INFO)
    }

    /// Full conntrack nest as an attribute table, parsed on demand.
    pub fn conntrack(&self) -> Result<Option<AttrTable<'a>>> {
        self.attrs.get_nested(NFULA_CT, CTA_MAX)
    }

    /// Owned snapshot of every decodable field, for structured output.
    pub fn summary(&self) -> Result<RecordSummary> {
        let header = self.packet_header()?;
        Ok(RecordSummary {
            hw_protocol: header.map(|h| h.hw_protocol),
            hook: header.map(|h| h.hook),
            prefix: self.prefix()?.map(str::to_string),
            mark: self.mark()?,
            indev: self.indev()?,
            outdev: self.outdev()?,
            physindev: self.physindev()?,
            physoutdev: self.physoutdev()?,
            uid: self.uid()?,
            gid: self.gid()?,
            seq: self.seq()?,
            seq_global: self.seq_global()?,
            ct_id: self.ct_id()?,
            hw_addr: self.hw_addr()?.map(|hw| hex(hw.as_bytes())),
            timestamp: self.timestamp()?,
            payload_len: self.payload().map(<[u8]>::len),
        })
    }
}

/// Owned, serializable view of a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_protocol: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hook: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physindev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physoutdev: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_global: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_len: Option<usize>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nflog_attr::AttrWriter;

    fn record_bytes(build: impl FnOnce(&mut AttrWriter)) -> Vec<u8> {
        let mut writer = AttrWriter::new();
        build(&mut writer);
        writer.into_inner().to_vec()
    }

    #[test]
    fn absent_fields_are_none() {
        let buf = record_bytes(|_| {});
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(record.mark().unwrap(), None);
        assert_eq!(record.packet_header().unwrap(), None);
        assert_eq!(record.prefix().unwrap(), None);
        assert_eq!(record.ct_id().unwrap(), None);
        assert!(record.payload().is_none());
        assert_eq!(record.summary().unwrap(), RecordSummary::default());
    }

    #[test]
    fn decodes_fixed_structs() {
        let buf = record_bytes(|w| {
            w.put_attr(NFULA_PACKET_HDR, &[0x08, 0x00, 1, 0]).unwrap();
            let mut ts = Vec::new();
            ts.extend_from_slice(&1_700_000_000u64.to_be_bytes());
            ts.extend_from_slice(&250_000u64.to_be_bytes());
            w.put_attr(NFULA_TIMESTAMP, &ts).unwrap();
            w.put_attr(
                NFULA_HWADDR,
                &[0, 6, 0, 0, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0, 0],
            )
            .unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();

        assert_eq!(
            record.packet_header().unwrap(),
            Some(PacketHeader {
                hw_protocol: 0x0800,
                hook: 1
            })
        );
        assert_eq!(
            record.timestamp().unwrap(),
            Some(Timestamp {
                sec: 1_700_000_000,
                usec: 250_000
            })
        );
        let hw = record.hw_addr().unwrap().unwrap();
        assert_eq!(hw.declared_len(), 6);
        assert_eq!(hw.as_bytes(), &[0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]);
    }

    #[test]
    fn zero_device_index_is_present() {
        let buf = record_bytes(|w| {
            w.put_u32(NFULA_IFINDEX_OUTDEV, 0).unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(record.outdev().unwrap(), Some(0));
        assert_eq!(record.indev().unwrap(), None);
    }

    #[test]
    fn prefix_stops_at_nul() {
        let buf = record_bytes(|w| {
            w.put_str(NFULA_PREFIX, "DROP ").unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(record.prefix().unwrap(), Some("DROP "));
    }

    #[test]
    fn invalid_prefix_is_an_error() {
        let buf = record_bytes(|w| {
            w.put_attr(NFULA_PREFIX, &[0xff, 0xfe, 0]).unwrap();
            w.put_u32(NFULA_MARK, 3).unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(
            record.prefix().unwrap_err(),
            AttrError::InvalidString {
                attr_type: NFULA_PREFIX
            }
        );
        assert_eq!(record.mark().unwrap(), Some(3));
    }

    #[test]
    fn ct_id_is_found_among_siblings() {
        let buf = record_bytes(|w| {
            let nest = w.begin_nested(NFULA_CT);
            w.put_u32(3, 0x0000_0188).unwrap();
            w.put_u32(CTA_ID, 0xabcd).unwrap();
            w.end_nested(nest).unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(record.ct_id().unwrap(), Some(0xabcd));

        let ct = record.conntrack().unwrap().unwrap();
        assert_eq!(ct.get_u32(3).unwrap(), Some(0x188));
    }

    #[test]
    fn ct_id_with_wrong_width_is_rejected() {
        let buf = record_bytes(|w| {
            let nest = w.begin_nested(NFULA_CT);
            w.put_u16(CTA_ID, 7).unwrap();
            w.end_nested(nest).unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        assert!(matches!(
            record.ct_id(),
            Err(AttrError::TypeMismatch {
                attr_type: CTA_ID,
                expected: 4,
                actual: 2
            })
        ));
    }

    #[test]
    fn ct_without_id_is_none() {
        let buf = record_bytes(|w| {
            let nest = w.begin_nested(NFULA_CT);
            w.put_u32(3, 1).unwrap();
            w.end_nested(nest).unwrap();
        });
        assert_eq!(LogRecord::parse(&buf).unwrap().ct_id().unwrap(), None);
    }

    #[test]
    fn summary_serializes_present_fields_only() {
        let buf = record_bytes(|w| {
            w.put_u32(NFULA_MARK, 42).unwrap();
            w.put_str(NFULA_PREFIX, "DROP ").unwrap();
            w.put_attr(NFULA_PAYLOAD, &[0x45, 0x00]).unwrap();
        });
        let summary = LogRecord::parse(&buf).unwrap().summary().unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "prefix": "DROP ", "mark": 42, "payload_len": 2 })
        );
    }
}
