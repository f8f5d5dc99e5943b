//! Demo CLI: ingest a handful of local pcap files or directories through
//! `ingest-core` and print a per-run summary.
//!
//! This is a thin embedder, not part of the library: it builds an
//! [`ingest_core::IngestConfig`], a trivial stdout-summarizing
//! [`ingest_core::Batcher`], and all-zero queue-depth gauges (there's no real
//! downstream here), then drives `ingest_core::IngestContext` to completion.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use ingest_core::{
    AtomicDepth, Batcher, FilenameRuleEngine, IngestConfig, IngestContext, IngestError,
    NoopFilterCompiler, Packet, QueueDepths, SchemeFlags,
};

/// Ingest pcap files and directories and print a summary.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Files (or bare paths) to ingest.
    #[arg(value_name = "PATH")]
    paths: Vec<String>,

    /// Treat every PATH as a directory to expand.
    #[arg(long)]
    dir: bool,

    /// Recurse into sub-directories (only meaningful with --dir).
    #[arg(long)]
    recursive: bool,

    /// Abandon unparseable files instead of treating it as fatal.
    #[arg(long)]
    tolerate_errors: bool,

    /// Accept captured_len != original_len records instead of failing.
    #[arg(long)]
    allow_truncated_packets: bool,

    /// Parse but never hand packets downstream.
    #[arg(long)]
    dry_run: bool,

    /// `field=value` operations applied to every ingested file.
    #[arg(long = "op", value_name = "FIELD=VALUE")]
    ops: Vec<String>,
}

#[derive(Default)]
struct Totals {
    files: AtomicU64,
    packets: AtomicU64,
    bytes: AtomicU64,
}

/// A [`Batcher`] that logs per-file completion and accumulates run totals
/// into a shared [`Totals`], in place of a real packet-processing pipeline.
struct SummaryBatcher {
    totals: Arc<Totals>,
}

impl Batcher for SummaryBatcher {
    fn configure(&mut self, dlt: u32, snaplen: u32) -> Result<(), IngestError> {
        info!("configured dlt={dlt} snaplen={snaplen}");
        Ok(())
    }

    fn submit(&mut self, packet: Packet<'_>) -> Result<(), IngestError> {
        self.totals.packets.fetch_add(1, Ordering::Relaxed);
        self.totals
            .bytes
            .fetch_add(packet.original_len as u64, Ordering::Relaxed);
        Ok(())
    }

    fn flush(&mut self) {}

    fn end_of_file(&mut self, slot_id: u8) {
        self.totals.files.fetch_add(1, Ordering::Relaxed);
        info!("finished slot {slot_id}");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.paths.is_empty() {
        bail!("at least one PATH is required");
    }

    // Validated up front; IngestConfig carries per-file actions via the
    // control channel (ingest_core::command), not as static startup state.
    ingest_core::ActionSet::parse(&args.ops).context("parsing --op arguments")?;

    let default_flags = if args.recursive {
        SchemeFlags::RECURSIVE
    } else {
        SchemeFlags::empty()
    };

    let config = if args.dir {
        IngestConfig {
            initial_directories: args.paths.clone(),
            default_flags,
            tolerate_errors: args.tolerate_errors,
            allow_truncated_packets: args.allow_truncated_packets,
            dry_run: args.dry_run,
            filter_compiler: Some(Arc::new(NoopFilterCompiler)),
            ..Default::default()
        }
    } else {
        IngestConfig {
            initial_files: args.paths.clone(),
            default_flags,
            tolerate_errors: args.tolerate_errors,
            allow_truncated_packets: args.allow_truncated_packets,
            dry_run: args.dry_run,
            filter_compiler: Some(Arc::new(NoopFilterCompiler)),
            ..Default::default()
        }
    };

    let totals = Arc::new(Totals::default());
    let batcher = Box::new(SummaryBatcher {
        totals: totals.clone(),
    });
    let depths = QueueDepths {
        disk_writer: Arc::new(AtomicDepth::new(0)),
        index_sink: Arc::new(AtomicDepth::new(0)),
        in_flight_packets: Arc::new(AtomicDepth::new(0)),
    };

    let context = IngestContext::start(
        config,
        FilenameRuleEngine::default(),
        Vec::new(),
        batcher,
        depths,
        None,
    )
    .context("starting ingest context")?;
    context.join();

    println!(
        "files={} packets={} bytes={}",
        totals.files.load(Ordering::Relaxed),
        totals.packets.load(Ordering::Relaxed),
        totals.bytes.load(Ordering::Relaxed),
    );
    Ok(())
}
