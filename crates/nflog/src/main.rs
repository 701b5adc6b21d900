mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nflog", version, about = "NFLOG packet log client")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nflog_record::XmlFlags;

    #[test]
    fn parses_listen_subcommand() {
        let cli = Cli::try_parse_from([
            "nflog",
            "listen",
            "--group",
            "1,2",
            "--copy-mode",
            "meta",
            "--xml-flags",
            "prefix,mark",
        ])
        .expect("listen args should parse");

        match cli.command {
            Command::Listen(args) => {
                assert_eq!(args.group, vec![1, 2]);
                assert_eq!(args.family, 2);
                assert_eq!(args.xml_flags, XmlFlags::PREFIX | XmlFlags::MARK);
            }
            other => panic!("expected listen, got {other:?}"),
        }
    }

    #[test]
    fn listen_requires_a_group() {
        let err = Cli::try_parse_from(["nflog", "listen"]).expect_err("missing group should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_xml_flag() {
        let err = Cli::try_parse_from(["nflog", "decode", "--xml-flags", "prefix,bogus"])
            .expect_err("unknown flag should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_decode_with_global_format() {
        let cli = Cli::try_parse_from(["nflog", "decode", "dump.bin", "--format", "xml"])
            .expect("decode args should parse");
        assert!(matches!(cli.format, Some(OutputFormat::Xml)));
        assert!(matches!(cli.command, Command::Decode(_)));
    }
}
