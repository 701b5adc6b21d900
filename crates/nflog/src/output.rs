use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nflog_attr::NfGenHeader;
use nflog_record::{to_xml_string, LogRecord, RecordSummary, XmlFlags};
use serde::Serialize;

use crate::exit::{xml_error, CliResult};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Xml,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct RecordOutput {
    group: u16,
    family: u8,
    #[serde(flatten)]
    record: RecordSummary,
}

/// Print one record in the selected format.
pub fn print_record(
    header: &NfGenHeader,
    record: &LogRecord<'_>,
    format: OutputFormat,
    xml_flags: XmlFlags,
) -> CliResult<()> {
    if let OutputFormat::Xml = format {
        let xml = to_xml_string(record, xml_flags).map_err(|err| xml_error("render failed", err))?;
        println!("{xml}");
        return Ok(());
    }

    let summary = record
        .summary()
        .map_err(|err| xml_error("decode failed", err.into()))?;

    match format {
        OutputFormat::Json => {
            let out = RecordOutput {
                group: header.group,
                family: header.family,
                record: summary,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "GROUP", "HOOK", "PREFIX", "MARK", "INDEV", "OUTDEV", "UID", "PAYLOAD",
                ])
                .add_row(vec![
                    header.group.to_string(),
                    opt(summary.hook),
                    summary.prefix.clone().unwrap_or_default(),
                    opt(summary.mark),
                    opt(summary.indev),
                    opt(summary.outdev),
                    opt(summary.uid),
                    opt(summary.payload_len),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", pretty_line(header.group, &summary));
        }
        OutputFormat::Xml => {}
    }
    Ok(())
}

fn pretty_line(group: u16, summary: &RecordSummary) -> String {
    let mut line = format!("group={group}");
    if let Some(prefix) = &summary.prefix {
        line.push_str(&format!(" prefix={prefix:?}"));
    }
    if let Some(hook) = summary.hook {
        line.push_str(&format!(" hook={hook}"));
    }
    if let Some(proto) = summary.hw_protocol {
        line.push_str(&format!(" proto=0x{proto:04x}"));
    }
    for (name, value) in [
        ("mark", summary.mark),
        ("indev", summary.indev),
        ("outdev", summary.outdev),
        ("uid", summary.uid),
        ("gid", summary.gid),
        ("seq", summary.seq),
        ("ctid", summary.ct_id),
    ] {
        if let Some(value) = value {
            line.push_str(&format!(" {name}={value}"));
        }
    }
    if let Some(len) = summary.payload_len {
        line.push_str(&format!(" payload={len}B"));
    }
    line
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_line_lists_present_fields() {
        let summary = RecordSummary {
            hook: Some(1),
            prefix: Some("DROP ".to_string()),
            mark: Some(42),
            payload_len: Some(60),
            ..RecordSummary::default()
        };
        assert_eq!(
            pretty_line(0, &summary),
            "group=0 prefix=\"DROP \" hook=1 mark=42 payload=60B"
        );
    }
}
