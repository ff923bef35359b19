//! A simple tool for dumping Elasticsearch indices to and from cloud storage.
//!
//! It's designed to be run as a one-off job next to a cluster: a backup
//! hands every index of the cluster to an external helper to be dumped, and
//! then asks the helper to push the dumps to a bucket. A restore does the
//! opposite, pulling the dumps back down and loading them index by index.
//!
//! All of the heavy lifting lives in the helper; this tool only decides
//! what to hand to it, and in which order.
#![doc(html_root_url = "https://docs.rs/esdump/0.1.0")]
use anyhow::Result;
use clap::{Arg, Command};

use std::env;
use std::io::{self, Write};
use std::process;

mod command;
use command::*;

mod connect;
mod helper;
mod logger;
mod manifest;
mod options;
mod remote;
mod retry;
mod stats;

#[cfg(test)]
mod testing;

use helper::ScriptHelper;
use options::{FlagSet, Options, Process, UsageError};
use remote::ElasticConnector;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Everything runs sequentially, so a Runtime on the current thread
    // is all we need to drive the cluster client and the helper.
    logger::init();

    let result = run(env::args().skip(1).collect()).await;
    let code = report(result, &mut io::stdout());

    process::exit(code);
}

/// Reports the outcome of a run and decides the exit code.
///
/// Usage errors are written to `out`, everything else is logged.
fn report<W: Write>(result: Result<()>, out: &mut W) -> i32 {
    let err = match result {
        Ok(()) => return 0,
        Err(err) => err,
    };

    match err.downcast_ref::<UsageError>() {
        Some(usage) => {
            let _ = writeln!(out, "{}", usage);
        }
        None => tracing::error!("{:#}", err),
    }

    1
}

/// Parses the provided arguments and delegates to the requested process.
async fn run(args: Vec<String>) -> Result<()> {
    if requested(&args, "--help", "-h") {
        return build_cli().print_help().map_err(Into::into);
    }

    if requested(&args, "--version", "-V") {
        print!("{}", build_cli().render_version());
        return Ok(());
    }

    let options = Options::from_flags(&FlagSet::parse(args))?;
    let connector = ElasticConnector::new(&options)?;
    let helper = ScriptHelper::new(&options.helper);

    match options.process {
        Process::Backup => backup::run(&options, &connector, &helper).await,
        Process::Restore => restore::run(&options, &connector, &helper).await,
    }
}

/// Checks whether a value-less flag was provided.
fn requested(args: &[String], long: &str, short: &str) -> bool {
    args.iter().any(|arg| arg == long || arg == short)
}

/// Creates the command definition used to render help.
///
/// Flags are parsed by `FlagSet` rather than by this definition, as they're
/// always provided as `--key=value` and unknown flags have to be tolerated.
/// This keeps the help output in line with what `Options` accepts.
fn build_cli() -> Command<'static> {
    Command::new(env!("CARGO_PKG_NAME"))
        // package metadata from cargo
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .override_usage(
            "esdump --process=<process> --host=<host> --bucket=<bucket> \
             --folder=<folder> --snapshot=<snapshot> [OPTIONS]",
        )
        .args(&[
            // process: +required
            Arg::new("process")
                .help("The process to run, either backup or restore")
                .long("process")
                .takes_value(true)
                .required(true),
            // host: +required
            Arg::new("host")
                .help("Host of the cluster to back up or restore")
                .long("host")
                .takes_value(true)
                .required(true),
            // bucket: +required
            Arg::new("bucket")
                .help("Cloud bucket holding the snapshots")
                .long("bucket")
                .takes_value(true)
                .required(true),
            // folder: +required
            Arg::new("folder")
                .help("Folder inside the bucket holding the snapshots")
                .long("folder")
                .takes_value(true)
                .required(true),
            // snapshot: +required
            Arg::new("snapshot")
                .help("Name of the snapshot to create or restore")
                .long("snapshot")
                .takes_value(true)
                .required(true),
            // port: [9200]
            Arg::new("port")
                .help("Port of the cluster, unless provided in the host")
                .long("port")
                .takes_value(true)
                .default_value("9200"),
            // helper: [./utils.sh]
            Arg::new("helper")
                .help("Helper used to dump, load, push and pull snapshots")
                .long("helper")
                .takes_value(true)
                .default_value(options::DEFAULT_HELPER),
            // backup-dir: [/var/dump-backup]
            Arg::new("backup-dir")
                .help("Base directory for snapshots being backed up")
                .long("backup-dir")
                .takes_value(true)
                .default_value(options::DEFAULT_BACKUP_DIR),
            // restore-dir: [/var/dump-restore]
            Arg::new("restore-dir")
                .help("Base directory for snapshots being restored")
                .long("restore-dir")
                .takes_value(true)
                .default_value(options::DEFAULT_RESTORE_DIR),
            // retry-delay: [10]
            Arg::new("retry-delay")
                .help("Seconds to wait between connection attempts")
                .long("retry-delay")
                .takes_value(true)
                .default_value("10"),
            // retry-limit: []
            Arg::new("retry-limit")
                .help("Maximum connection attempts, unlimited by default")
                .long("retry-limit")
                .takes_value(true),
        ])
}
