//! Staged scan pipeline: copy-to-scratch -> walker -> matcher pool ->
//! aggregator.
//!
//! # Invariants
//! - Bounded channels between stages make backpressure explicit: when the
//!   workers fall behind, the walker blocks on send; when the walker falls
//!   behind, extraction stalls.
//! - Every blocking point selects on the cancellation channel.
//! - The first non-cancellation error cancels the run and becomes the
//!   pipeline's result; cancellation itself yields the partial summary.
//! - Results are aggregated in arrival order; no global sort. Ordering
//!   across files is explicitly not guaranteed between runs.
//!
//! # Stage wiring
//!
//! ```text
//! input ──copy──> scratch path ──walks──> leaf paths ──workers──> results
//!                                   (walk_tx/rx)        (result_tx/rx)
//!                                                            │
//!                            error channel (cap 1, latching) ┴─> aggregator
//! ```

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::debug;

use crate::archive::walk::{spawn_walk, UNAR_SUFFIX};
use crate::archive::Extractor;
use crate::cancel::{CancelSource, CancelToken};
use crate::error::Error;
use crate::keywords::Keywords;
use crate::output::{ScanResult, ScanStats, ScanSummary};
use crate::scratch::Scratch;

/// Leaf-path channel depth.
pub const PATH_CHAN_CAP: usize = 64;
/// Result channel depth.
pub const RESULT_CHAN_CAP: usize = 64;

/// Tuning for one scan run.
#[derive(Clone, Debug)]
pub struct ScanOptions {
    /// Bytes of context captured around each hit.
    pub context: usize,
    /// Drop zero-hit results from the summary (they still count in stats).
    pub hits_only: bool,
    /// Scan worker count.
    pub parallelism: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            context: 10,
            hits_only: false,
            parallelism: num_cpus::get().max(1),
        }
    }
}

/// Run the full pipeline over one input file.
///
/// Returns the summary on success or on cancellation (partial results);
/// returns the first non-cancellation error otherwise.
pub fn scan(
    input: &Path,
    keywords: Arc<Keywords>,
    scratch: &Scratch,
    extractor: Arc<dyn Extractor>,
    opts: &ScanOptions,
    cancel: &CancelSource,
) -> Result<ScanSummary, Error> {
    let start = Instant::now();
    let mut summary = ScanSummary {
        input_file: input.display().to_string(),
        results: Vec::new(),
        stats: ScanStats::default(),
    };

    if cancel.is_cancelled() {
        return Ok(summary);
    }

    // Stage 1: stage the input under the scratch root. A failure here is
    // fatal before any concurrent machinery spins up.
    let staged = scratch.copy_file(input)?;
    debug!(
        "staged {} as {}; {} scan workers",
        input.display(),
        staged.display(),
        opts.parallelism
    );

    let (walk_tx, walk_rx) = bounded(PATH_CHAN_CAP);
    let (result_tx, result_rx) = bounded(RESULT_CHAN_CAP);
    let (err_tx, err_rx) = bounded::<Error>(1);

    // Stage 2: the recursive walk closes walk_rx once every sub-walk has
    // drained (sender-clone semantics).
    spawn_walk(staged, extractor, cancel.token(), walk_tx);

    // Stage 3: matcher pool.
    let mut workers = Vec::with_capacity(opts.parallelism);
    for _ in 0..opts.parallelism {
        workers.push(spawn_scan_worker(
            Arc::clone(&keywords),
            scratch.dir().to_path_buf(),
            opts.context,
            walk_rx.clone(),
            result_tx.clone(),
            err_tx.clone(),
            cancel.token(),
        ));
    }
    drop(walk_rx);
    drop(result_tx);
    drop(err_tx);

    // Stage 4: aggregate in arrival order.
    let mut first_err: Option<Error> = None;
    loop {
        select! {
            recv(result_rx) -> msg => match msg {
                Err(_) => break,
                Ok(result) => accumulate(&mut summary, result, opts.hits_only),
            },
            recv(err_rx) -> msg => if let Ok(err) = msg {
                if !err.is_cancelled() && first_err.is_none() {
                    first_err = Some(err);
                    cancel.cancel();
                }
            },
        }
    }
    // A worker may have raced its error past the result channel closing.
    while let Ok(err) = err_rx.try_recv() {
        if !err.is_cancelled() && first_err.is_none() {
            first_err = Some(err);
            cancel.cancel();
        }
    }

    for worker in workers {
        let _ = worker.join();
    }

    if let Some(err) = first_err {
        return Err(err);
    }
    summary.stats.duration = start.elapsed().as_secs_f64();
    Ok(summary)
}

fn accumulate(summary: &mut ScanSummary, result: ScanResult, hits_only: bool) {
    summary.stats.files_scanned += 1;
    if !result.hits.is_empty() {
        summary.stats.files_hit += 1;
        summary.stats.total_hits += result.hits.len() as u64;
    }
    if !hits_only || !result.hits.is_empty() {
        summary.results.push(result);
    }
}

fn spawn_scan_worker(
    keywords: Arc<Keywords>,
    scratch_dir: std::path::PathBuf,
    context: usize,
    walk_rx: Receiver<crate::archive::WalkResult>,
    result_tx: Sender<ScanResult>,
    err_tx: Sender<Error>,
    cancel: CancelToken,
) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        let item = select! {
            recv(walk_rx) -> msg => match msg {
                Err(_) => return,
                Ok(item) => item,
            },
            recv(cancel.channel()) -> _ => return,
        };

        let path = match item {
            Ok(path) => path,
            Err(err) => {
                let _ = err_tx.try_send(err);
                return;
            }
        };

        let hits = match keywords.match_file(&path, context, Some(&cancel)) {
            Ok(hits) => hits,
            Err(err) => {
                let _ = err_tx.try_send(err);
                return;
            }
        };

        let result = ScanResult {
            file: display_path(&scratch_dir, &path),
            hits,
        };
        select! {
            send(result_tx, result) -> res => {
                if res.is_err() {
                    return;
                }
            }
            recv(cancel.channel()) -> _ => return,
        }
    })
}

/// Report path: scratch-relative, with extraction-directory suffixes
/// stripped so the path reads as a location inside the input archive.
fn display_path(scratch_dir: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(scratch_dir).unwrap_or(path);
    rel.to_string_lossy().replace(UNAR_SUFFIX, "")
}
