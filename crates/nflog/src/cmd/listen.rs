use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nflog_session::{handler_fn, Delivery, GroupConfig, LogFlags, SessionError};
use nflog_transport::{NetlinkSocket, SocketConfig, TransportError};
use tracing::{info, warn};

use crate::cmd::ListenArgs;
use crate::exit::{io_error, session_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

/// How often a blocked receive wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = group_config(&args)?;

    let socket = NetlinkSocket::open_with_config(SocketConfig {
        read_timeout: Some(POLL_INTERVAL),
        ..SocketConfig::default()
    })
    .map_err(|err| transport_error("failed to open netlink socket", err))?;
    let mut session = nflog_session::Session::new(socket);

    if !args.no_bind_family {
        // Older kernels refuse the unbind when nothing is bound yet.
        if let Err(err) = session.unbind_pf(args.family) {
            warn!(family = args.family, error = %err, "unbind family failed");
        }
        session
            .bind_pf(args.family)
            .map_err(|err| session_error("bind family failed", err))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    let printed = Arc::new(AtomicUsize::new(0));

    for &group in &args.group {
        let running = running.clone();
        let printed = printed.clone();
        let limit = args.count;
        let xml_flags = args.xml_flags;

        let handle = session
            .bind_group_with(
                group,
                handler_fn(move |_, header, record| {
                    if let Err(err) = print_record(header, record, format, xml_flags) {
                        warn!(group = header.group, error = %err, "could not print record");
                        return 0;
                    }
                    let total = printed.fetch_add(1, Ordering::SeqCst) + 1;
                    let done = limit.is_some_and(|limit| total >= limit);
                    if done || !running.load(Ordering::SeqCst) {
                        -1
                    } else {
                        0
                    }
                }),
            )
            .map_err(|err| session_error(&format!("bind group {group} failed"), err))?;

        session
            .apply_group_config(handle, &config)
            .map_err(|err| session_error(&format!("configure group {group} failed"), err))?;
        info!(group, "listening");
    }

    while running.load(Ordering::SeqCst) {
        match session.process_next() {
            Ok(Delivery::Continue) => {}
            Ok(Delivery::Halted(_)) => break,
            Err(SessionError::Transport(err)) if err.is_transient() => {
                if matches!(err, TransportError::Overrun) {
                    warn!("records were dropped by the kernel");
                }
            }
            Err(err) => return Err(session_error("receive failed", err)),
        }
    }

    info!(printed = printed.load(Ordering::SeqCst), "stopped");
    Ok(SUCCESS)
}

fn group_config(args: &ListenArgs) -> CliResult<GroupConfig> {
    let from_file = match &args.config {
        Some(path) => {
            let file = std::fs::File::open(path).map_err(|err| {
                io_error(&format!("failed opening config {}", path.display()), err)
            })?;
            serde_json::from_reader(std::io::BufReader::new(file)).map_err(|err| {
                CliError::new(
                    crate::exit::DATA_INVALID,
                    format!("invalid config {}: {err}", path.display()),
                )
            })?
        }
        None => GroupConfig::default(),
    };

    let any_flag = args.seq || args.seq_global || args.conntrack;
    let overrides = GroupConfig {
        copy_mode: args.copy_mode.map(Into::into),
        copy_range: args.copy_range,
        timeout: args.timeout,
        queue_threshold: args.qthresh,
        buffer_size: args.buffer_size,
        flags: any_flag.then_some(LogFlags {
            seq: args.seq,
            seq_global: args.seq_global,
            conntrack: args.conntrack,
        }),
    };
    Ok(from_file.merge(overrides))
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
