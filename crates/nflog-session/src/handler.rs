use nflog_attr::NfGenHeader;
use nflog_record::LogRecord;

use crate::registry::GroupHandle;

/// Receives the log records of one group.
///
/// The record borrows the receive buffer and cannot be kept past the call.
/// A negative return value halts delivery of the rest of the batch and is
/// handed back to whoever drives the session.
pub trait LogHandler {
    fn on_record(
        &mut self,
        group: GroupHandle,
        header: &NfGenHeader,
        record: &LogRecord<'_>,
    ) -> i32;
}

impl<F> LogHandler for F
where
    F: FnMut(GroupHandle, &NfGenHeader, &LogRecord<'_>) -> i32,
{
    fn on_record(
        &mut self,
        group: GroupHandle,
        header: &NfGenHeader,
        record: &LogRecord<'_>,
    ) -> i32 {
        self(group, header, record)
    }
}

/// Pins a closure to the [`LogHandler`] signature so its argument types
/// can be inferred.
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(GroupHandle, &NfGenHeader, &LogRecord<'_>) -> i32,
{
    f
}
