use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use nflog_record::{CopyMode, XmlFlags};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
#[cfg(target_os = "linux")]
pub mod listen;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bind to log groups and print the records the kernel sends.
    Listen(ListenArgs),
    /// Print the records in a captured netlink receive buffer.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        #[cfg(target_os = "linux")]
        Command::Listen(args) => listen::run(args, format),
        #[cfg(not(target_os = "linux"))]
        Command::Listen(_) => Err(crate::exit::CliError::new(
            crate::exit::USAGE,
            "listen needs a Linux netfilter netlink socket",
        )),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum CopyModeArg {
    None,
    Meta,
    Packet,
}

impl From<CopyModeArg> for CopyMode {
    fn from(arg: CopyModeArg) -> Self {
        match arg {
            CopyModeArg::None => CopyMode::None,
            CopyModeArg::Meta => CopyMode::Meta,
            CopyModeArg::Packet => CopyMode::Packet,
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Log groups to bind (comma-separated).
    #[arg(long, short = 'g', value_delimiter = ',', required = true)]
    pub group: Vec<u16>,
    /// Address family to rebind to the logger (2 = IPv4, 10 = IPv6).
    #[arg(long, default_value = "2")]
    pub family: u8,
    /// Leave the address family binding alone.
    #[arg(long)]
    pub no_bind_family: bool,
    /// Group configuration file (JSON). Flags below override it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// How much of each packet to copy.
    #[arg(long, value_enum)]
    pub copy_mode: Option<CopyModeArg>,
    /// Bytes of each packet to copy.
    #[arg(long)]
    pub copy_range: Option<u32>,
    /// Flush timeout in 1/100 s.
    #[arg(long)]
    pub timeout: Option<u32>,
    /// Records queued in the kernel before a flush.
    #[arg(long)]
    pub qthresh: Option<u32>,
    /// Kernel batch buffer size in bytes.
    #[arg(long)]
    pub buffer_size: Option<u32>,
    /// Ask for per-group sequence numbers.
    #[arg(long)]
    pub seq: bool,
    /// Ask for global sequence numbers.
    #[arg(long)]
    pub seq_global: bool,
    /// Ask for conntrack information.
    #[arg(long)]
    pub conntrack: bool,
    /// Exit after printing N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Fields included in xml output (comma-separated, e.g. prefix,mark,payload).
    #[arg(long, default_value = "all")]
    pub xml_flags: XmlFlags,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// File holding one raw receive buffer. Reads stdin when omitted.
    pub path: Option<PathBuf>,
    /// Only print records for these groups (comma-separated).
    #[arg(long, short = 'g', value_delimiter = ',')]
    pub group: Option<Vec<u16>>,
    /// Fields included in xml output (comma-separated, e.g. prefix,mark,payload).
    #[arg(long, default_value = "all")]
    pub xml_flags: XmlFlags,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
