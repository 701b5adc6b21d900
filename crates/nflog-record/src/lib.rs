//! Typed views over NFLOG log records.
//!
//! A [`LogRecord`] wraps the attribute table of one kernel log message and
//! decodes fields on demand. [`render_xml`] turns a record into a bounded
//! XML document with exact truncation accounting.

pub mod attrs;
pub mod error;
pub mod fmt;
pub mod record;
pub mod xml;

pub use attrs::{attr_name, CopyMode, CTA_ID, NFULA_MAX};
pub use error::{Result, XmlError};
pub use fmt::BoundedWriter;
pub use record::{HwAddr, LogRecord, PacketHeader, RecordSummary, Timestamp};
pub use xml::{render_xml, render_xml_at, to_xml_string, Rendered, XmlFlags};
