//! Top-level wiring: turns an [`IngestConfig`] plus the embedder's
//! collaborators into a running [`WorkerHandle`] (spec.md §9 redesign flag —
//! an explicit struct in place of scattered module-level globals).
//!
//! Grounded on `reader_scheme_thread`'s startup sequence: individual files,
//! then file-list files (honoring `-` for stdin, blank-line/`#`-comment
//! skipping), then directories, each folded into `default_flags` the same
//! way `config.pcap{Monitor,Recursive,Skip,Delete}` seed `flags` in the
//! original before any per-entry override.

use std::fs::File;
use std::io::{self, BufRead};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{error, Level};

use crate::actions::ActionSet;
use crate::backpressure::{BackpressureGate, QueueDepth};
use crate::batch::Batcher;
use crate::config::{ConfigError, IngestConfig};
use crate::file_scheme::FileScheme;
use crate::filename_rules::FilenameRuleEngine;
use crate::flags::SchemeFlags;
use crate::queue::PendingQueue;
use crate::quiesce::QuiesceProbe;
use crate::scheme::{Scheme, SchemeRegistry};
use crate::uri::OwnedUri;
use crate::worker::{IngestWorker, WorkerHandle};

/// The downstream depth gauges the backpressure gate polls (spec.md §4.G).
pub struct QueueDepths {
    pub disk_writer: Arc<dyn QueueDepth>,
    pub index_sink: Arc<dyn QueueDepth>,
    pub in_flight_packets: Arc<dyn QueueDepth>,
}

/// Failure constructing an [`IngestContext`].
#[derive(Debug)]
pub enum ContextError {
    Config(ConfigError),
}

impl std::fmt::Display for ContextError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextError::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ContextError {}

impl From<ConfigError> for ContextError {
    fn from(e: ConfigError) -> Self {
        ContextError::Config(e)
    }
}

/// The running ingest core: one worker thread, its pending queue, and the
/// shared shutdown flag, all wired up from an [`IngestConfig`] (spec.md §9).
pub struct IngestContext {
    handle: WorkerHandle,
}

impl IngestContext {
    /// Build the scheme registry, backpressure gate, and pending queue, then
    /// spawn the worker thread against `config`'s initial sources.
    ///
    /// `extra_schemes` lets the embedder register transports beyond the
    /// built-in `file` scheme (spec.md §3: "schemes beyond `file` ... are out
    /// of this crate's scope to implement, but the registry accommodates
    /// them").
    pub fn start(
        config: IngestConfig,
        rules: FilenameRuleEngine,
        extra_schemes: Vec<Arc<dyn Scheme>>,
        batcher: Box<dyn Batcher>,
        depths: QueueDepths,
        quiesce: Option<Arc<dyn QuiesceProbe>>,
    ) -> Result<IngestContext, ContextError> {
        config.validate()?;

        let mut registry = SchemeRegistry::new();
        registry.register(Arc::new(FileScheme));
        for scheme in extra_schemes {
            registry.register(scheme);
        }
        let registry = Arc::new(registry);

        let gate = Arc::new(BackpressureGate::new(
            depths.disk_writer,
            depths.index_sink,
            depths.in_flight_packets,
            config.max_in_queue,
            config.dispatch_after,
            log::log_enabled!(Level::Debug),
        ));
        let shutdown = Arc::new(AtomicBool::new(false));
        let queue = Arc::new(PendingQueue::new());

        let initial = initial_sources(&config);
        let filter_compiler = config.filter_compiler.clone();

        let worker = IngestWorker::new(
            registry,
            rules,
            filter_compiler,
            &config,
            gate,
            shutdown,
            queue,
            batcher,
            quiesce,
        );
        let handle = WorkerHandle::spawn(worker, initial);
        Ok(IngestContext { handle })
    }

    /// Enqueue a request from any thread (spec.md §4.A's `add-file`/`add-dir`
    /// control-channel commands land here, via [`crate::command`]).
    pub fn submit(&self, uri: OwnedUri, flags: SchemeFlags, actions: ActionSet) {
        self.handle.submit(uri, flags, actions);
    }

    /// Signal the worker to stop once its current load and pending queue
    /// drain, without blocking for it.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Block until the worker thread exits.
    pub fn join(self) {
        self.handle.join();
    }
}

/// Enumerate `config`'s startup sources in `reader_scheme_thread`'s order:
/// individual files, then file-list files, then directories.
fn initial_sources(config: &IngestConfig) -> Vec<(OwnedUri, SchemeFlags)> {
    let mut sources = Vec::new();

    for path in &config.initial_files {
        sources.push((OwnedUri::new(path.clone()), config.default_flags));
    }

    for list_path in &config.file_list_files {
        match read_file_list(list_path) {
            Ok(lines) => {
                for line in lines {
                    sources.push((OwnedUri::new(line), config.default_flags));
                }
            }
            Err(e) => error!("couldn't open file list {list_path}: {e}"),
        }
    }

    for dir in &config.initial_directories {
        sources.push((OwnedUri::new(dir.clone()), config.default_flags | SchemeFlags::DIR_HINT));
    }

    sources
}

/// Read one URI per line from `path` (`-` meaning stdin), stripping
/// whitespace and skipping blank lines and `#`-comments, mirroring
/// `reader_scheme_thread`'s file-list loop.
fn read_file_list(path: &str) -> io::Result<Vec<String>> {
    let lines: Vec<String> = if path == "-" {
        io::stdin().lock().lines().collect::<io::Result<_>>()?
    } else {
        io::BufReader::new(File::open(path)?).lines().collect::<io::Result<_>>()?
    };
    Ok(lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_list_skips_blank_lines_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("list.txt");
        std::fs::write(&list_path, "a.pcap\n\n# a comment\n  b.pcap  \n").unwrap();
        let lines = read_file_list(list_path.to_str().unwrap()).unwrap();
        assert_eq!(lines, vec!["a.pcap".to_string(), "b.pcap".to_string()]);
    }

    #[test]
    fn initial_sources_orders_files_then_lists_then_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let list_path = dir.path().join("list.txt");
        std::fs::write(&list_path, "from-list.pcap\n").unwrap();

        let config = IngestConfig {
            initial_files: vec!["a.pcap".to_string()],
            file_list_files: vec![list_path.to_str().unwrap().to_string()],
            initial_directories: vec!["/caps".to_string()],
            ..Default::default()
        };
        let sources = initial_sources(&config);
        let uris: Vec<String> = sources.iter().map(|(u, _)| u.to_string()).collect();
        assert_eq!(uris, vec!["a.pcap", "from-list.pcap", "/caps"]);
        assert!(sources[2].1.contains(SchemeFlags::DIR_HINT));
        assert!(!sources[0].1.contains(SchemeFlags::DIR_HINT));
    }
}
