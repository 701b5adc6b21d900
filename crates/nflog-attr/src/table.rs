use tracing::trace;

use crate::error::{AttrError, Result};
use crate::header::align;

/// Attribute header: length (2) + type (2) = 4 bytes.
pub const ATTR_HDRLEN: usize = 4;

/// Type flag: payload is itself an attribute sequence.
pub const NLA_F_NESTED: u16 = 1 << 15;
/// Type flag: payload is in network byte order.
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
/// Mask selecting the attribute type without flags.
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

/// Deepest nesting any NFLOG schema uses (conntrack tuples sit three levels
/// below the record), plus headroom.
pub const MAX_NESTING_DEPTH: usize = 4;

/// One attribute: its type, flags and a payload borrowed from the wire buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr<'a> {
    kind: u16,
    flags: u16,
    payload: &'a [u8],
}

impl<'a> Attr<'a> {
    /// Attribute type with the flag bits masked off.
    pub fn kind(&self) -> u16 {
        self.kind
    }

    /// Whether the sender marked the payload as a nested attribute sequence.
    pub fn is_nested(&self) -> bool {
        self.flags & NLA_F_NESTED != 0
    }

    /// Payload bytes, excluding header and padding.
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Walks a raw attribute sequence in wire order.
///
/// Yields an error and stops at the first malformed record, so it never
/// reads past the buffer.
#[derive(Debug, Clone)]
pub struct AttrIter<'a> {
    buf: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> AttrIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    type Item = Result<Attr<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.offset >= self.buf.len() {
            return None;
        }

        let offset = self.offset;
        let remaining = self.buf.len() - offset;
        if remaining < ATTR_HDRLEN {
            self.done = true;
            return Some(Err(AttrError::TruncatedHeader { offset, remaining }));
        }

        let len = u16::from_ne_bytes([self.buf[offset], self.buf[offset + 1]]) as usize;
        let raw_type = u16::from_ne_bytes([self.buf[offset + 2], self.buf[offset + 3]]);

        if len < ATTR_HDRLEN {
            self.done = true;
            return Some(Err(AttrError::LengthTooShort { offset, len }));
        }
        if len > remaining {
            self.done = true;
            return Some(Err(AttrError::LengthOverflow {
                offset,
                len,
                remaining,
            }));
        }

        let payload = &self.buf[offset + ATTR_HDRLEN..offset + len];
        // The last record may omit its trailing padding.
        self.offset += align(len).min(remaining);

        Some(Ok(Attr {
            kind: raw_type & NLA_TYPE_MASK,
            flags: raw_type & !NLA_TYPE_MASK,
            payload,
        }))
    }
}

/// Attributes of one message indexed by type `1..=max_type`.
///
/// The table is a view over the buffer it was parsed from. Nested
/// attributes are parsed only when asked for via [`AttrTable::get_nested`].
#[derive(Debug, Clone)]
pub struct AttrTable<'a> {
    slots: Vec<Option<Attr<'a>>>,
    depth: usize,
    skipped: usize,
}

impl<'a> AttrTable<'a> {
    /// Parse a top-level attribute sequence.
    ///
    /// Types `0` and above `max_type` are skipped; a repeated type keeps the
    /// last occurrence.
    pub fn parse(buf: &'a [u8], max_type: u16) -> Result<Self> {
        Self::parse_at_depth(buf, max_type, 0)
    }

    fn parse_at_depth(buf: &'a [u8], max_type: u16, depth: usize) -> Result<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(AttrError::NestingTooDeep {
                max: MAX_NESTING_DEPTH,
            });
        }

        let mut slots = vec![None; max_type as usize];
        let mut skipped = 0usize;
        for attr in AttrIter::new(buf) {
            let attr = attr?;
            let kind = attr.kind();
            if kind == 0 || kind > max_type {
                trace!(kind, max_type, depth, "skipping unknown attribute");
                skipped += 1;
                continue;
            }
            slots[kind as usize - 1] = Some(attr);
        }

        Ok(Self {
            slots,
            depth,
            skipped,
        })
    }

    /// Highest attribute type this table indexes.
    pub fn max_type(&self) -> u16 {
        self.slots.len() as u16
    }

    /// Nesting depth; 0 for a top-level table.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of records skipped because their type was out of range.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of present attributes.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The attribute stored for `kind`, if any.
    pub fn attr(&self, kind: u16) -> Option<Attr<'a>> {
        if kind == 0 {
            return None;
        }
        self.slots.get(kind as usize - 1).copied().flatten()
    }

    /// Raw payload for `kind`.
    pub fn get(&self, kind: u16) -> Option<&'a [u8]> {
        self.attr(kind).map(|attr| attr.payload())
    }

    pub fn contains(&self, kind: u16) -> bool {
        self.attr(kind).is_some()
    }

    /// Whether the sender flagged `kind` as nested.
    pub fn is_nested(&self, kind: u16) -> bool {
        self.attr(kind).is_some_and(|attr| attr.is_nested())
    }

    /// Payload for `kind` as an exact-width array.
    pub fn get_array<const N: usize>(&self, kind: u16) -> Result<Option<[u8; N]>> {
        match self.get(kind) {
            None => Ok(None),
            Some(bytes) => <[u8; N]>::try_from(bytes)
                .map(Some)
                .map_err(|_| AttrError::TypeMismatch {
                    attr_type: kind,
                    expected: N,
                    actual: bytes.len(),
                }),
        }
    }

    pub fn get_u8(&self, kind: u16) -> Result<Option<u8>> {
        Ok(self.get_array::<1>(kind)?.map(|b| b[0]))
    }

    /// Big-endian `u16` payload.
    pub fn get_u16(&self, kind: u16) -> Result<Option<u16>> {
        Ok(self.get_array(kind)?.map(u16::from_be_bytes))
    }

    /// Big-endian `u32` payload.
    pub fn get_u32(&self, kind: u16) -> Result<Option<u32>> {
        Ok(self.get_array(kind)?.map(u32::from_be_bytes))
    }

    /// Big-endian `u64` payload.
    pub fn get_u64(&self, kind: u16) -> Result<Option<u64>> {
        Ok(self.get_array(kind)?.map(u64::from_be_bytes))
    }

    /// Parse the payload of `kind` as a nested table one level down.
    ///
    /// The nested flag is not required; several kernel emitters omit it.
    pub fn get_nested(&self, kind: u16, max_type: u16) -> Result<Option<AttrTable<'a>>> {
        match self.get(kind) {
            None => Ok(None),
            Some(inner) => Self::parse_at_depth(inner, max_type, self.depth + 1).map(Some),
        }
    }

    /// Present attributes in type order.
    pub fn iter(&self) -> impl Iterator<Item = Attr<'a>> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::AttrWriter;

    fn raw_attr(len: u16, kind: u16, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&len.to_ne_bytes());
        out.extend_from_slice(&kind.to_ne_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn parse_indexes_by_type() {
        let mut writer = AttrWriter::new();
        writer.put_u32(2, 42).unwrap();
        writer.put_attr(10, b"DROP \0").unwrap();
        writer.put_u16(15, 1).unwrap();
        let buf = writer.into_inner();

        let table = AttrTable::parse(&buf, 19).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get_u32(2).unwrap(), Some(42));
        assert_eq!(table.get(10), Some(&b"DROP \0"[..]));
        assert_eq!(table.get_u16(15).unwrap(), Some(1));
        assert_eq!(table.get(3), None);
        assert_eq!(table.get_u32(3).unwrap(), None);
    }

    #[test]
    fn span_length_matches_declared_length() {
        for payload_len in 0..=9usize {
            let payload = vec![0x5a; payload_len];
            let mut writer = AttrWriter::new();
            writer.put_attr(1, &payload).unwrap();
            writer.put_u8(2, 7).unwrap();
            let buf = writer.into_inner();

            let declared = u16::from_ne_bytes([buf[0], buf[1]]) as usize;
            let table = AttrTable::parse(&buf, 4).unwrap();
            assert_eq!(table.get(1).unwrap().len(), declared - ATTR_HDRLEN);
            assert_eq!(table.get_u8(2).unwrap(), Some(7));
        }
    }

    #[test]
    fn overlong_length_is_rejected() {
        let mut buf = raw_attr(8, 2, &42u32.to_be_bytes());
        buf.extend(raw_attr(12, 3, &[1, 2, 3, 4]));

        let err = AttrTable::parse(&buf, 19).unwrap_err();
        assert_eq!(
            err,
            AttrError::LengthOverflow {
                offset: 8,
                len: 12,
                remaining: 8
            }
        );
    }

    #[test]
    fn short_declared_length_is_rejected() {
        let buf = raw_attr(3, 2, &[0, 0, 0, 0]);
        assert!(matches!(
            AttrTable::parse(&buf, 19),
            Err(AttrError::LengthTooShort { offset: 0, len: 3 })
        ));
    }

    #[test]
    fn truncated_header_is_rejected() {
        let mut buf = raw_attr(8, 2, &[0, 0, 0, 1]);
        buf.extend_from_slice(&[8, 0]);
        assert!(matches!(
            AttrTable::parse(&buf, 19),
            Err(AttrError::TruncatedHeader {
                offset: 8,
                remaining: 2
            })
        ));
    }

    #[test]
    fn missing_final_padding_is_tolerated() {
        let buf = raw_attr(5, 1, &[9]);
        let table = AttrTable::parse(&buf, 4).unwrap();
        assert_eq!(table.get(1), Some(&[9u8][..]));
    }

    #[test]
    fn width_mismatch_is_local_to_the_attribute() {
        let mut writer = AttrWriter::new();
        writer.put_u16(2, 42).unwrap();
        writer.put_u32(4, 3).unwrap();
        let buf = writer.into_inner();

        let table = AttrTable::parse(&buf, 19).unwrap();
        assert_eq!(
            table.get_u32(2).unwrap_err(),
            AttrError::TypeMismatch {
                attr_type: 2,
                expected: 4,
                actual: 2
            }
        );
        assert_eq!(table.get_u32(4).unwrap(), Some(3));
    }

    #[test]
    fn unknown_types_are_skipped_and_last_duplicate_wins() {
        let mut writer = AttrWriter::new();
        writer.put_u32(2, 1).unwrap();
        writer.put_u32(40, 9).unwrap();
        writer.put_u32(0, 9).unwrap();
        writer.put_u32(2, 5).unwrap();
        let buf = writer.into_inner();

        let table = AttrTable::parse(&buf, 19).unwrap();
        assert_eq!(table.skipped(), 2);
        assert_eq!(table.get_u32(2).unwrap(), Some(5));
        assert_eq!(table.get(0), None);
        assert_eq!(table.get(40), None);
    }

    #[test]
    fn nested_tables_are_parsed_on_demand() {
        let mut writer = AttrWriter::new();
        let nest = writer.begin_nested(18);
        writer.put_u32(3, 0x10).unwrap();
        writer.put_u32(12, 77).unwrap();
        writer.end_nested(nest).unwrap();
        let buf = writer.into_inner();

        let table = AttrTable::parse(&buf, 19).unwrap();
        assert!(table.is_nested(18));
        let inner = table.get_nested(18, 12).unwrap().unwrap();
        assert_eq!(inner.depth(), 1);
        assert_eq!(inner.get_u32(12).unwrap(), Some(77));
        assert!(table.get_nested(17, 12).unwrap().is_none());
    }

    #[test]
    fn malformed_nested_payload_does_not_poison_siblings() {
        let mut buf = raw_attr(8, 2, &42u32.to_be_bytes());
        buf.extend(raw_attr(8, 18 | NLA_F_NESTED, &[200, 0, 12, 0]));

        let table = AttrTable::parse(&buf, 19).unwrap();
        assert!(table.get_nested(18, 12).is_err());
        assert_eq!(table.get_u32(2).unwrap(), Some(42));
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let mut writer = AttrWriter::new();
        let mut tokens = Vec::new();
        for _ in 0..=MAX_NESTING_DEPTH + 1 {
            tokens.push(writer.begin_nested(1));
        }
        for token in tokens.into_iter().rev() {
            writer.end_nested(token).unwrap();
        }
        let buf = writer.into_inner();

        let mut table = AttrTable::parse(&buf, 1).unwrap();
        let mut result = Ok(());
        for _ in 0..=MAX_NESTING_DEPTH + 1 {
            match table.get_nested(1, 1) {
                Ok(Some(inner)) => table = inner,
                Ok(None) => break,
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        assert_eq!(
            result,
            Err(AttrError::NestingTooDeep {
                max: MAX_NESTING_DEPTH
            })
        );
    }

    #[test]
    fn iterator_stops_after_error() {
        let buf = raw_attr(2, 1, &[]);
        let mut iter = AttrIter::new(&buf);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}
