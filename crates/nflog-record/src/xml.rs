//! XML rendering of log records.
//!
//! The document layout is fixed:
//!
//! ```text
//! <log>[<when>..</when>][<prefix>..</prefix>][<hook>..</hook>[<hw>..</hw>]]
//!      [<mark>..</mark>][<indev>..</indev>][<outdev>..</outdev>]
//!      [<physindev>..</physindev>][<physoutdev>..</physoutdev>]
//!      [<ctid>..</ctid>][<payload>..</payload>]</log>
//! ```
//!
//! Numeric fields whose value is zero are left out, so a zero mark or device
//! index cannot be told apart from an absent one in the output.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::error::{Result, XmlError};
use crate::fmt::BoundedWriter;
use crate::record::LogRecord;

/// Selects which optional fields are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XmlFlags(u32);

impl XmlFlags {
    pub const NONE: Self = Self(0);
    pub const PREFIX: Self = Self(1 << 0);
    pub const HW: Self = Self(1 << 1);
    pub const MARK: Self = Self(1 << 2);
    pub const DEV: Self = Self(1 << 3);
    pub const PHYSDEV: Self = Self(1 << 4);
    pub const PAYLOAD: Self = Self(1 << 5);
    pub const TIME: Self = Self(1 << 6);
    pub const CTID: Self = Self(1 << 7);
    pub const ALL: Self = Self(!0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "none" => Self::NONE,
            "prefix" => Self::PREFIX,
            "hw" => Self::HW,
            "mark" => Self::MARK,
            "dev" => Self::DEV,
            "physdev" => Self::PHYSDEV,
            "payload" => Self::PAYLOAD,
            "time" => Self::TIME,
            "ctid" => Self::CTID,
            "all" => Self::ALL,
            _ => return None,
        })
    }
}

impl Default for XmlFlags {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for XmlFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for XmlFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Parses a comma-separated list of flag names, e.g. `prefix,mark,payload`.
impl FromStr for XmlFlags {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .try_fold(Self::NONE, |acc, name| {
                Self::from_name(&name.to_ascii_lowercase())
                    .map(|flag| acc | flag)
                    .ok_or_else(|| XmlError::UnknownFlag(name.to_string()))
            })
    }
}

/// Outcome of a bounded render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rendered {
    /// Length of the complete document.
    pub len: usize,
    /// Bytes actually written to the buffer.
    pub written: usize,
}

impl Rendered {
    pub fn is_truncated(&self) -> bool {
        self.written < self.len
    }
}

/// Render `record` into `buf`, timestamping with the current local time.
///
/// Never writes past `buf.len()`. The returned `len` is the size of the
/// whole document, so a caller can retry with a buffer of that size.
pub fn render_xml(buf: &mut [u8], record: &LogRecord<'_>, flags: XmlFlags) -> Result<Rendered> {
    render_xml_at(buf, record, flags, Local::now().naive_local())
}

/// [`render_xml`] with an explicit local time for the `<when>` block.
pub fn render_xml_at(
    buf: &mut [u8],
    record: &LogRecord<'_>,
    flags: XmlFlags,
    now: NaiveDateTime,
) -> Result<Rendered> {
    let mut out = BoundedWriter::new(buf);
    out.push("<log>");

    if flags.contains(XmlFlags::TIME) {
        out.push("<when>");
        out.emit(format_args!("<hour>{}</hour>", now.hour()))?;
        out.emit(format_args!("<min>{:02}</min>", now.minute()))?;
        out.emit(format_args!("<sec>{:02}</sec>", now.second()))?;
        out.emit(format_args!(
            "<wday>{}</wday>",
            now.weekday().num_days_from_sunday() + 1
        ))?;
        out.emit(format_args!("<day>{}</day>", now.day()))?;
        out.emit(format_args!("<month>{}</month>", now.month()))?;
        out.emit(format_args!("<year>{}</year>", now.year()))?;
        out.push("</when>");
    }

    if flags.contains(XmlFlags::PREFIX) {
        if let Some(prefix) = record.prefix()? {
            out.emit(format_args!("<prefix>{}</prefix>", Escaped(prefix)))?;
        }
    }

    if let Some(header) = record.packet_header()? {
        out.emit(format_args!("<hook>{}</hook>", header.hook))?;

        if flags.contains(XmlFlags::HW) {
            match record.hw_addr()? {
                Some(hw) => {
                    out.emit(format_args!("<hw><proto>{:04x}</proto>", header.hw_protocol))?;
                    out.push("<src>");
                    for byte in hw.as_bytes() {
                        out.emit(format_args!("{byte:02x}"))?;
                    }
                    out.push("</src></hw>");
                }
                None => {
                    out.emit(format_args!(
                        "<hw><proto>{:04x}</proto></hw>",
                        header.hw_protocol
                    ))?;
                }
            }
        }
    }

    if flags.contains(XmlFlags::MARK) {
        if let Some(mark) = record.mark()?.filter(|m| *m != 0) {
            out.emit(format_args!("<mark>{mark}</mark>"))?;
        }
    }

    if flags.contains(XmlFlags::DEV) {
        if let Some(ifi) = record.indev()?.filter(|i| *i != 0) {
            out.emit(format_args!("<indev>{ifi}</indev>"))?;
        }
        if let Some(ifi) = record.outdev()?.filter(|i| *i != 0) {
            out.emit(format_args!("<outdev>{ifi}</outdev>"))?;
        }
    }

    if flags.contains(XmlFlags::PHYSDEV) {
        if let Some(ifi) = record.physindev()?.filter(|i| *i != 0) {
            out.emit(format_args!("<physindev>{ifi}</physindev>"))?;
        }
        if let Some(ifi) = record.physoutdev()?.filter(|i| *i != 0) {
            out.emit(format_args!("<physoutdev>{ifi}</physoutdev>"))?;
        }
    }

    if flags.contains(XmlFlags::CTID) {
        if let Some(ctid) = record.ct_id()? {
            out.emit(format_args!("<ctid>{ctid}</ctid>"))?;
        }
    }

    if flags.contains(XmlFlags::PAYLOAD) {
        if let Some(payload) = record.payload() {
            out.push("<payload>");
            for byte in payload {
                out.emit(format_args!("{byte:02x}"))?;
            }
            out.push("</payload>");
        }
    }

    out.push("</log>");
    Ok(out.finish())
}

/// Render `record` into a freshly allocated string.
pub fn to_xml_string(record: &LogRecord<'_>, flags: XmlFlags) -> Result<String> {
    let now = Local::now().naive_local();
    let sized = render_xml_at(&mut [0u8; 0], record, flags, now)?;
    let mut buf = vec![0u8; sized.len];
    let rendered = render_xml_at(&mut buf, record, flags, now)?;
    buf.truncate(rendered.written);
    String::from_utf8(buf).map_err(|_| XmlError::Format)
}

/// Escapes markup characters in free text.
struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rest = self.0;
        while let Some(pos) = rest.find(['&', '<', '>']) {
            f.write_str(&rest[..pos])?;
            f.write_str(match rest.as_bytes()[pos] {
                b'&' => "&amp;",
                b'<' => "&lt;",
                _ => "&gt;",
            })?;
            rest = &rest[pos + 1..];
        }
        f.write_str(rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrs::*;
    use chrono::NaiveDate;
    use nflog_attr::{AttrError, AttrWriter};

    fn fixed_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(7, 4, 9)
            .unwrap()
    }

    fn attrs(build: impl FnOnce(&mut AttrWriter)) -> Vec<u8> {
        let mut writer = AttrWriter::new();
        build(&mut writer);
        writer.into_inner().to_vec()
    }

    fn drop_record() -> Vec<u8> {
        attrs(|w| {
            w.put_attr(NFULA_PACKET_HDR, &[0x08, 0x00, 1, 0]).unwrap();
            w.put_u32(NFULA_MARK, 42).unwrap();
            w.put_str(NFULA_PREFIX, "DROP ").unwrap();
        })
    }

    fn render_string(buf: &[u8], flags: XmlFlags) -> String {
        let record = LogRecord::parse(buf).unwrap();
        let mut out = vec![0u8; 1024];
        let rendered = render_xml_at(&mut out, &record, flags, fixed_time()).unwrap();
        assert!(!rendered.is_truncated());
        out.truncate(rendered.written);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn renders_prefix_hook_and_mark() {
        let buf = drop_record();
        let record = LogRecord::parse(&buf).unwrap();
        assert_eq!(record.mark().unwrap(), Some(42));

        let expected = "<log><prefix>DROP </prefix><hook>1</hook><mark>42</mark></log>";
        let mut out = vec![0u8; 256];
        let rendered = render_xml(&mut out, &record, XmlFlags::PREFIX | XmlFlags::MARK).unwrap();
        assert_eq!(rendered.len, expected.len());
        assert_eq!(&out[..rendered.written], expected.as_bytes());
    }

    #[test]
    fn truncation_keeps_whole_fragments_at_every_capacity() {
        let buf = drop_record();
        let record = LogRecord::parse(&buf).unwrap();
        let flags = XmlFlags::PREFIX | XmlFlags::MARK;
        let full = to_xml_string(&record, flags).unwrap();
        // Fragment ends: <log>, <prefix>..</prefix>, <hook>..</hook>, <mark>..</mark>, </log>
        let boundaries = [0usize, 5, 27, 41, 56, 62];
        assert_eq!(full.len(), 62);

        for capacity in 0..=full.len() {
            let mut out = vec![0xAAu8; capacity];
            let rendered = render_xml(&mut out, &record, flags).unwrap();
            assert_eq!(rendered.len, full.len(), "capacity {capacity}");
            assert!(rendered.written <= capacity);

            let expected = boundaries
                .iter()
                .copied()
                .filter(|b| *b <= capacity)
                .max()
                .unwrap();
            assert_eq!(rendered.written, expected, "capacity {capacity}");
            assert_eq!(&out[..rendered.written], &full.as_bytes()[..rendered.written]);
            assert!(out[rendered.written..].iter().all(|b| *b == 0xAA));
        }
    }

    #[test]
    fn renders_hardware_address_and_payload_as_hex() {
        let buf = attrs(|w| {
            w.put_attr(NFULA_PACKET_HDR, &[0x08, 0x00, 3, 0]).unwrap();
            w.put_attr(
                NFULA_HWADDR,
                &[0, 6, 0, 0, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x01, 0, 0],
            )
            .unwrap();
            w.put_attr(NFULA_PAYLOAD, &[0x45, 0x00, 0xab]).unwrap();
        });
        assert_eq!(
            render_string(&buf, XmlFlags::HW | XmlFlags::PAYLOAD),
            "<log><hook>3</hook><hw><proto>0800</proto><src>deadbeef0001</src></hw>\
             <payload>4500ab</payload></log>"
        );
    }

    #[test]
    fn hw_without_address_renders_protocol_only() {
        let buf = attrs(|w| {
            w.put_attr(NFULA_PACKET_HDR, &[0x86, 0xdd, 2, 0]).unwrap();
        });
        assert_eq!(
            render_string(&buf, XmlFlags::HW),
            "<log><hook>2</hook><hw><proto>86dd</proto></hw></log>"
        );
    }

    #[test]
    fn zero_values_are_omitted() {
        let buf = attrs(|w| {
            w.put_u32(NFULA_MARK, 0).unwrap();
            w.put_u32(NFULA_IFINDEX_INDEV, 0).unwrap();
            w.put_u32(NFULA_IFINDEX_OUTDEV, 7).unwrap();
            w.put_u32(NFULA_IFINDEX_PHYSOUTDEV, 0).unwrap();
        });
        assert_eq!(
            render_string(&buf, XmlFlags::from_bits(!XmlFlags::TIME.bits())),
            "<log><outdev>7</outdev></log>"
        );
    }

    #[test]
    fn renders_time_block() {
        let buf = attrs(|_| {});
        assert_eq!(
            render_string(&buf, XmlFlags::TIME),
            "<log><when><hour>7</hour><min>04</min><sec>09</sec><wday>3</wday>\
             <day>5</day><month>3</month><year>2024</year></when></log>"
        );
    }

    #[test]
    fn renders_ctid_and_physdev() {
        let buf = attrs(|w| {
            w.put_u32(NFULA_IFINDEX_PHYSINDEV, 4).unwrap();
            let nest = w.begin_nested(NFULA_CT);
            w.put_u32(CTA_ID, 77).unwrap();
            w.end_nested(nest).unwrap();
        });
        assert_eq!(
            render_string(&buf, XmlFlags::PHYSDEV | XmlFlags::CTID),
            "<log><physindev>4</physindev><ctid>77</ctid></log>"
        );
    }

    #[test]
    fn prefix_markup_is_escaped() {
        let buf = attrs(|w| {
            w.put_str(NFULA_PREFIX, "a<b>&c").unwrap();
        });
        assert_eq!(
            render_string(&buf, XmlFlags::PREFIX),
            "<log><prefix>a&lt;b&gt;&amp;c</prefix></log>"
        );
    }

    #[test]
    fn malformed_field_fails_only_when_selected() {
        let buf = attrs(|w| {
            w.put_u16(NFULA_MARK, 1).unwrap();
        });
        let record = LogRecord::parse(&buf).unwrap();
        let mut out = [0u8; 64];
        assert!(matches!(
            render_xml(&mut out, &record, XmlFlags::MARK),
            Err(XmlError::Attr(AttrError::TypeMismatch { .. }))
        ));
        assert!(render_xml(&mut out, &record, XmlFlags::PREFIX).is_ok());
    }

    #[test]
    fn parses_flag_lists() {
        assert_eq!(
            "prefix, MARK,payload".parse::<XmlFlags>().unwrap(),
            XmlFlags::PREFIX | XmlFlags::MARK | XmlFlags::PAYLOAD
        );
        assert_eq!("all".parse::<XmlFlags>().unwrap(), XmlFlags::ALL);
        assert!(matches!(
            "prefix,bogus".parse::<XmlFlags>(),
            Err(XmlError::UnknownFlag(name)) if name == "bogus"
        ));
    }
}
