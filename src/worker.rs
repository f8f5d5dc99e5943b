//! The single ingest worker thread (component J, spec.md §4.J) and the
//! recursive dispatcher it drives.
//!
//! Mirrors `reader-scheme.c`'s `schemeThread` / `arkime_reader_scheme_load` /
//! `reader_scheme_thread`: one thread enumerates the configured sources, then
//! drains [`crate::queue::PendingQueue`] until told to stop. A loader that
//! discovers further URIs (a directory yielding files) calls back into
//! [`Dispatcher::submit`], which either runs the nested load inline — as long
//! as it's still on the worker thread and the recursion bound hasn't been
//! reached — or defers it to the pending queue, exactly as
//! `arkime_reader_scheme_load` does with its `depth` static and `laterHead`
//! list.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use log::{info, warn};

use crate::actions::ActionSet;
use crate::backpressure::BackpressureGate;
use crate::batch::Batcher;
use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::filename_rules::FilenameRuleEngine;
use crate::filter::FilterCompiler;
use crate::flags::SchemeFlags;
use crate::queue::{PendingItem, PendingQueue};
use crate::quiesce::QuiesceProbe;
use crate::scheme::{DEFAULT_SCHEME_NAME, LoadContext, LoadRequest, SchemeRegistry};
use crate::slots::FileSlotTable;
use crate::stream::StreamPolicy;
use crate::uri::OwnedUri;

/// Bound on inline (same-stack-frame) recursive submissions (spec.md §4.J,
/// §9: "load-bearing... do not replace with unbounded recursion guarded only
/// by stack-overflow detection").
pub const INLINE_RECURSION_LIMIT: u32 = 20;

/// Drives one [`LoadRequest`] to completion, resolving its scheme and handing
/// it a [`LoadContext`] wired to this worker's collaborators.
///
/// Owns the mutable ingest-side state (`FileSlotTable`, the `Batcher`) behind
/// `RefCell`s so that [`LoadContext`] can lend them out transiently even
/// while a `submit` call is recursing — see `scheme::LoadContext`'s docs.
/// Everything here runs on exactly one thread (spec.md §5), so the `RefCell`
/// never contends; it exists purely to let the borrow's lifetime be shorter
/// than the enclosing `load` call, not for any cross-thread reason.
pub struct Dispatcher {
    registry: Arc<SchemeRegistry>,
    rules: FilenameRuleEngine,
    filter_compiler: Option<Arc<dyn FilterCompiler>>,
    policy: StreamPolicy,
    gate: Arc<BackpressureGate>,
    shutdown: Arc<AtomicBool>,
    queue: Arc<PendingQueue>,
    slots: RefCell<FileSlotTable>,
    batcher: RefCell<Box<dyn Batcher>>,
    depth: RefCell<u32>,
    worker_thread: ThreadId,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SchemeRegistry>,
        rules: FilenameRuleEngine,
        filter_compiler: Option<Arc<dyn FilterCompiler>>,
        policy: StreamPolicy,
        gate: Arc<BackpressureGate>,
        shutdown: Arc<AtomicBool>,
        queue: Arc<PendingQueue>,
        batcher: Box<dyn Batcher>,
    ) -> Self {
        Dispatcher {
            registry,
            rules,
            filter_compiler,
            policy,
            gate,
            shutdown,
            queue,
            slots: RefCell::new(FileSlotTable::new()),
            batcher: RefCell::new(batcher),
            depth: RefCell::new(0),
            worker_thread: thread::current().id(),
        }
    }

    pub fn slots(&self) -> std::cell::Ref<'_, FileSlotTable> {
        self.slots.borrow()
    }

    /// Resolve `request`'s scheme and run its loader, wiring `submit` back to
    /// [`Dispatcher::submit`] for any sub-URIs it discovers.
    pub fn execute(&self, request: LoadRequest) -> Result<(), IngestError> {
        let scheme = self.registry.resolve(request.uri.as_uri())?;
        info!("processing {}", request.uri);
        let mut submit_fn = |uri: OwnedUri, flags: SchemeFlags, actions: ActionSet| {
            self.submit(uri, flags, actions);
        };
        let mut cx = LoadContext {
            slots: &self.slots,
            rules: &self.rules,
            filter_compiler: self.filter_compiler.as_deref(),
            batcher: &self.batcher,
            policy: self.policy,
            gate: &self.gate,
            shutdown: &self.shutdown,
            submit: &mut submit_fn,
        };
        scheme.load(request, &mut cx)
    }

    /// The `submit` entry point handed to every loader (spec.md §4.J):
    /// inline on the worker thread under the recursion bound, deferred to
    /// [`PendingQueue`] otherwise.
    fn submit(&self, uri: OwnedUri, flags: SchemeFlags, actions: ActionSet) {
        let on_worker_thread = thread::current().id() == self.worker_thread;
        let depth = *self.depth.borrow();
        if on_worker_thread && depth < INLINE_RECURSION_LIMIT {
            *self.depth.borrow_mut() = depth + 1;
            let request = LoadRequest {
                uri: uri.clone(),
                flags,
                actions,
                extra_info: None,
            };
            if let Err(e) = self.execute(request) {
                warn!("load failed for {uri}: {e}");
            }
            *self.depth.borrow_mut() = depth;
        } else {
            self.queue.push(PendingItem { uri, flags, actions });
        }
    }
}

/// `Starting → Priming → Draining → Quitting`, exactly spec.md §4.J's
/// diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Priming,
    Draining,
    Quitting,
}

/// The single ingest worker (component J). Owns a [`Dispatcher`] and drives
/// it through initial-source enumeration, then the cross-thread pending
/// queue, until shutdown.
pub struct IngestWorker {
    dispatcher: Dispatcher,
    config: WorkerPolicy,
    queue: Arc<PendingQueue>,
    shutdown: Arc<AtomicBool>,
    quiesce: Option<Arc<dyn QuiesceProbe>>,
    monitoring: bool,
    phase: std::cell::Cell<Phase>,
    /// Set once a load returns a [`crate::error::ErrorDisposition::Fatal`]
    /// error (spec.md §7: "UnknownFormat ... Fatal by default"). Checked
    /// after every load so the worker stops draining further sources instead
    /// of the crate calling `std::process::exit` itself (spec.md §9 redesign
    /// flag).
    fatal: std::cell::Cell<bool>,
}

/// The subset of [`IngestConfig`] the worker's own loop (as opposed to the
/// stream parser) needs.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPolicy {
    pub flush_between_files: bool,
    pub tolerate_errors: bool,
}

impl IngestWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<SchemeRegistry>,
        rules: FilenameRuleEngine,
        filter_compiler: Option<Arc<dyn FilterCompiler>>,
        config: &IngestConfig,
        gate: Arc<BackpressureGate>,
        shutdown: Arc<AtomicBool>,
        queue: Arc<PendingQueue>,
        batcher: Box<dyn Batcher>,
        quiesce: Option<Arc<dyn QuiesceProbe>>,
    ) -> Self {
        let policy = StreamPolicy {
            allow_truncated_packets: config.allow_truncated_packets,
            scheme_ethertype: config.scheme_ethertype,
            dry_run: config.dry_run,
            copy_only: config.copy_only,
        };
        let monitoring = config.default_flags.contains(SchemeFlags::MONITOR);
        IngestWorker {
            dispatcher: Dispatcher::new(
                registry,
                rules,
                filter_compiler,
                policy,
                gate,
                shutdown.clone(),
                queue.clone(),
                batcher,
            ),
            config: WorkerPolicy {
                flush_between_files: config.flush_between_files,
                tolerate_errors: config.tolerate_errors,
            },
            queue,
            shutdown,
            quiesce,
            monitoring,
            phase: std::cell::Cell::new(Phase::Starting),
            fatal: std::cell::Cell::new(false),
        }
    }

    /// The worker's current position in the `Starting → Priming → Draining →
    /// Quitting` state machine (spec.md §4.J).
    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Whether a fatal error (spec.md §7: `UnknownFormat` with
    /// `tolerate_errors` unset) has stopped this worker from draining any
    /// further sources.
    pub fn hit_fatal_error(&self) -> bool {
        self.fatal.get()
    }

    /// Run the `Starting → Priming → Draining → Quitting` loop on the
    /// calling thread. Blocks until shutdown.
    pub fn run(&self, initial: Vec<(OwnedUri, SchemeFlags)>) {
        self.phase.set(Phase::Priming);
        for (uri, flags) in initial {
            if self.fatal.get() {
                break;
            }
            self.load_initial(uri, flags);
        }

        if !self.monitoring || self.fatal.get() {
            // No monitor source expects further input once the initial
            // sources and whatever they recursively enqueued have drained —
            // or a fatal error (spec.md §7) means no further source should
            // run at all: tell the queue to stop blocking once it runs dry.
            self.queue.request_shutdown();
        }

        self.phase.set(Phase::Draining);
        while let Some(item) = self.queue.pop_blocking() {
            if self.shutdown.load(Ordering::Relaxed) || self.fatal.get() {
                break;
            }
            let request = LoadRequest {
                uri: item.uri,
                flags: item.flags,
                actions: item.actions,
                extra_info: None,
            };
            self.load_and_quiesce(request);
        }
        self.phase.set(Phase::Quitting);
    }

    fn load_initial(&self, uri: OwnedUri, flags: SchemeFlags) {
        let request = LoadRequest {
            uri,
            flags,
            actions: ActionSet::empty(),
            extra_info: None,
        };
        self.load_and_quiesce(request);
    }

    fn load_and_quiesce(&self, request: LoadRequest) {
        let uri = request.uri.clone();
        match self.dispatcher.execute(request) {
            Ok(()) => info!("finished {uri}"),
            Err(e) => match e.disposition(self.config.tolerate_errors) {
                crate::error::ErrorDisposition::AbandonFile => warn!("abandoned {uri}: {e}"),
                crate::error::ErrorDisposition::Fatal => {
                    log::error!("fatal error on {uri}, stopping ingest: {e}");
                    self.fatal.set(true);
                }
            },
        }
        if self.config.flush_between_files {
            self.quiesce_between_files();
        }
    }

    /// Between-files quiesce policy (spec.md §4.J): flush, then spin-wait
    /// until all four external counters reach zero.
    fn quiesce_between_files(&self) {
        let Some(probe) = &self.quiesce else {
            return;
        };
        probe.flush();
        loop {
            let outstanding = probe.session_cmd_outstanding()
                + probe.session_close_outstanding()
                + probe.packet_outstanding()
                + probe.session_monitoring();
            if outstanding == 0 || self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
    }

    pub fn slots(&self) -> std::cell::Ref<'_, FileSlotTable> {
        self.dispatcher.slots()
    }
}

/// Spawns an [`IngestWorker`] on its own thread and hands back a way to
/// signal it to stop (spec.md §5: "External shutdown signal raises a flag
/// inspected at each backpressure poll and at the condvar wake").
pub struct WorkerHandle {
    join: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    queue: Arc<PendingQueue>,
}

impl WorkerHandle {
    pub fn spawn(worker: IngestWorker, initial: Vec<(OwnedUri, SchemeFlags)>) -> Self {
        let shutdown = worker.shutdown.clone();
        let queue = worker.queue.clone();
        let join = thread::Builder::new()
            .name("ingest-worker".to_string())
            .spawn(move || worker.run(initial))
            .expect("spawning the ingest worker thread");
        WorkerHandle {
            join: Some(join),
            shutdown,
            queue,
        }
    }

    /// Request shutdown and wake the worker if it's blocked on the pending
    /// queue's condvar.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.queue.request_shutdown();
    }

    /// Enqueue a request from a foreign thread (spec.md §4.J: "called on a
    /// foreign thread ... enqueue a `PendingItem`").
    pub fn submit(&self, uri: OwnedUri, flags: SchemeFlags, actions: ActionSet) {
        self.queue.push(PendingItem { uri, flags, actions });
    }

    pub fn join(mut self) {
        if let Some(handle) = self.join.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.join.take() {
            self.shutdown.store(true, Ordering::Relaxed);
            self.queue.request_shutdown();
            let _ = handle.join();
        }
    }
}
