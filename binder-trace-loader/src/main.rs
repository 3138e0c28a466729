// Userspace half of binder-trace: loads `binder-trace-ebpf`, attaches its
// tracepoints, and drains `BINDER_EVENTS_BUFFER`, re-framing each record up
// to the wire-format boundary (type tag + header + tail). It does not
// reconstruct Binder transactions — that belongs to the external consumer
// this crate publishes records to.

use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use aya::maps::{ring_buf::RingBuf, MapData};
use aya::programs::TracePoint;
use aya::{Ebpf, EbpfLoader};
use aya_log::EbpfLogger;
use clap::Parser;
use log::{info, warn};

mod decode;

use decode::decode_record;

#[derive(Parser, Debug)]
#[command(name = "binder-trace-loader")]
#[command(about = "Loads binder-trace-ebpf and streams framed Binder IPC events")]
struct Args {
    /// Path to the compiled binder-trace-ebpf object. Falls back to
    /// `BINDER_TRACE_BPF_PATH` and then a set of well-known build/install
    /// locations when unset.
    #[arg(long, value_name = "PATH")]
    bpf_path: Option<PathBuf>,

    /// Emit debug-level logging in addition to info.
    #[arg(long)]
    verbose: bool,
}

/// Locate and read the compiled `binder-trace-ebpf` object: an explicit
/// `--bpf-path` wins, then `BINDER_TRACE_BPF_PATH`, then a fixed list of
/// well-known build/install locations, matching `cognitod::read_bpf_bytes`'s
/// lookup order for its own BPF object.
fn read_bpf_bytes(explicit: Option<&Path>) -> Result<(Vec<u8>, String)> {
    if let Some(path) = explicit {
        let data = fs::read(path)
            .with_context(|| format!("reading BPF object from {}", path.display()))?;
        return Ok((data, path.display().to_string()));
    }

    if let Ok(path) = std::env::var("BINDER_TRACE_BPF_PATH") {
        let data = fs::read(&path)
            .with_context(|| format!("reading BPF object from {path} (BINDER_TRACE_BPF_PATH)"))?;
        return Ok((data, path));
    }

    const CANDIDATES: [&str; 6] = [
        "/usr/local/share/binder-trace/binder-trace-ebpf",
        "target/bpfel-unknown-none/release/binder-trace-ebpf",
        "./target/bpfel-unknown-none/release/binder-trace-ebpf",
        "../target/bpfel-unknown-none/release/binder-trace-ebpf",
        "target/bpf/binder-trace-ebpf.o",
        "./target/bpf/binder-trace-ebpf.o",
    ];
    for candidate in CANDIDATES {
        if Path::new(candidate).exists() {
            let data = fs::read(candidate)
                .with_context(|| format!("reading BPF object from {candidate}"))?;
            return Ok((data, candidate.to_string()));
        }
    }

    anyhow::bail!(
        "binder-trace-ebpf object not found; pass --bpf-path, set BINDER_TRACE_BPF_PATH, \
         or build with `cargo xtask build-ebpf`"
    )
}

/// Attaches a required tracepoint; failure to attach any of these means
/// the tracer cannot do its job, so this bubbles up rather than degrading
/// gracefully.
fn attach_tracepoint(bpf: &mut Ebpf, program: &str, category: &str, name: &str) -> Result<()> {
    let tp: &mut TracePoint = bpf
        .program_mut(program)
        .with_context(|| format!("{program} program not found in BPF object"))?
        .try_into()?;
    tp.load()
        .with_context(|| format!("loading tracepoint program {program}"))?;
    tp.attach(category, name)
        .with_context(|| format!("attaching {category}:{name} ({program})"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.verbose && std::env::var("RUST_LOG").is_err() {
        // SAFETY: single-threaded at this point, before any other thread or
        // the tokio runtime could observe the environment concurrently.
        unsafe {
            std::env::set_var("RUST_LOG", "debug");
        }
    }
    env_logger::init();

    let (bpf_bytes, chosen_path) = read_bpf_bytes(args.bpf_path.as_deref())?;
    info!("binder-trace-loader: using BPF object {chosen_path}");

    let mut bpf = EbpfLoader::new()
        .load(&bpf_bytes)
        .context("loading binder-trace-ebpf object")?;

    let _logger = match EbpfLogger::init(&mut bpf) {
        Ok(logger) => Some(logger),
        Err(err) => {
            warn!("binder-trace-loader: BPF logger not active: {err}");
            None
        }
    };

    // All twelve are required for a faithful trace: raw_syscalls entry/exit
    // recover fd, sched_process_exit drives process-lifecycle cleanup, and
    // the rest are Binder-specific.
    attach_tracepoint(&mut bpf, "sys_enter", "raw_syscalls", "sys_enter")?;
    attach_tracepoint(&mut bpf, "sys_exit", "raw_syscalls", "sys_exit")?;
    attach_tracepoint(&mut bpf, "binder_ioctl", "binder", "binder_ioctl")?;
    attach_tracepoint(&mut bpf, "binder_ioctl_done", "binder", "binder_ioctl_done")?;
    attach_tracepoint(&mut bpf, "binder_command", "binder", "binder_command")?;
    attach_tracepoint(&mut bpf, "binder_return", "binder", "binder_return")?;
    attach_tracepoint(&mut bpf, "binder_transaction", "binder", "binder_transaction")?;
    attach_tracepoint(
        &mut bpf,
        "binder_transaction_received",
        "binder",
        "binder_transaction_received",
    )?;
    attach_tracepoint(&mut bpf, "binder_write_done", "binder", "binder_write_done")?;
    attach_tracepoint(&mut bpf, "binder_read_done", "binder", "binder_read_done")?;
    attach_tracepoint(
        &mut bpf,
        "binder_wait_for_work",
        "binder",
        "binder_wait_for_work",
    )?;
    attach_tracepoint(
        &mut bpf,
        "sched_process_exit",
        "sched",
        "sched_process_exit",
    )?;

    info!("binder-trace-loader: tracepoints attached, draining BINDER_EVENTS_BUFFER");

    let ring_buf: RingBuf<MapData> = bpf
        .take_map("BINDER_EVENTS_BUFFER")
        .context("BINDER_EVENTS_BUFFER map not found")?
        .try_into()
        .context("BINDER_EVENTS_BUFFER is not a ring buffer map")?;

    // The drain loop runs on a blocking thread; `RingBuf::next()` isn't
    // `Send`-friendly across an async await point the way an `AsyncFd`-based
    // reader would be, so a dedicated poll-and-sleep thread is simpler than
    // threading epoll through this map type.
    let drain_handle = tokio::task::spawn_blocking(move || drain(ring_buf));

    info!("binder-trace-loader: running. Press Ctrl+C to exit.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("binder-trace-loader: Ctrl+C received, shutting down");
        }
        result = drain_handle => {
            if let Err(err) = result {
                warn!("binder-trace-loader: drain task ended unexpectedly: {err}");
            }
        }
    }

    // `bpf` keeps every attached tracepoint loaded for as long as it's
    // alive; dropping it here detaches them. Process exit would do the
    // same implicitly, but this makes the shutdown path explicit.
    drop(bpf);
    Ok(())
}

/// Polling drain of the ring buffer: `aya`'s `RingBuf::next()` is
/// non-blocking, so a short sleep backs off when the buffer is empty
/// instead of busy-spinning.
fn drain(mut ring_buf: RingBuf<MapData>) -> Result<()> {
    loop {
        match ring_buf.next() {
            Some(item) => {
                if let Some(line) = decode_record(item.as_ref()) {
                    println!("{line}");
                } else {
                    warn!(
                        "binder-trace-loader: dropped malformed record ({} bytes)",
                        item.as_ref().len()
                    );
                }
            }
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
}
