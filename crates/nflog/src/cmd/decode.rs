use std::io::Read;

use nflog_attr::{messages, Message};
use nflog_record::attrs::MSG_TYPE_PACKET;
use nflog_record::{attr_name, LogRecord};
use tracing::debug;

use crate::cmd::DecodeArgs;
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let buf = match &args.path {
        Some(path) => std::fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .map_err(|err| io_error("failed reading stdin", err))?;
            buf
        }
    };

    let mut printed = 0usize;
    for msg in messages(&buf) {
        let msg = msg.map_err(|err| invalid("malformed netlink message", err))?;
        if msg.header.kind != MSG_TYPE_PACKET {
            debug!(kind = msg.header.kind, "skipping non-record message");
            continue;
        }
        if decode_one(&msg, &args, format)? {
            printed += 1;
        }
    }

    debug!(printed, "decode finished");
    Ok(SUCCESS)
}

fn decode_one(msg: &Message<'_>, args: &DecodeArgs, format: OutputFormat) -> CliResult<bool> {
    let (header, attrs) = msg
        .nfgen()
        .map_err(|err| invalid("malformed nfnetlink header", err))?;
    if let Some(groups) = &args.group {
        if !groups.contains(&header.group) {
            return Ok(false);
        }
    }

    let record = LogRecord::parse(attrs).map_err(|err| invalid("malformed log record", err))?;
    let present: Vec<&str> = record
        .attrs()
        .iter()
        .map(|attr| attr_name(attr.kind()))
        .collect();
    debug!(group = header.group, attrs = ?present, "decoded record");
    print_record(&header, &record, format, args.xml_flags)?;
    Ok(true)
}

fn invalid(context: &str, err: impl std::fmt::Display) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}
