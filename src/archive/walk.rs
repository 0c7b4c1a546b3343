//! Recursive unarchive walker.
//!
//! # Invariants
//! - Every regular, non-empty file under the root is emitted exactly once.
//! - Archive files are emitted whether or not extraction succeeded: the
//!   unextracted bytes (metadata, stored members, trailing data) are still
//!   worth scanning, so a broken extractor degrades coverage instead of
//!   aborting it.
//! - The result stream closes exactly once, after every in-flight walk has
//!   drained: each walk owns a clone of the sender, and the channel
//!   disconnects when the last clone drops.
//! - Directory listings are snapshotted (and sorted) before visiting, so
//!   extraction directories created mid-walk are seen only by the sub-walk
//!   spawned for them.
//!
//! # Algorithm
//! Depth-first over an explicit stack. Archives are extracted into a
//! sibling `<file>.goscan-unar` directory; if that directory exists
//! afterwards, a concurrent sub-walk expands it while the parent walk
//! continues.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, Sender};
use tracing::{debug, warn};

use crate::archive::classify;
use crate::archive::extract::Extractor;
use crate::cancel::CancelToken;
use crate::error::Error;

/// Suffix appended to an archive path to form its extraction directory.
pub const UNAR_SUFFIX: &str = ".goscan-unar";

/// One walker emission: a leaf file path, or the error that ended a walk.
pub type WalkResult = Result<PathBuf, Error>;

/// Start a walk of `root` on its own thread.
///
/// The walk (and any sub-walks it spawns) sends results on `results`; the
/// caller's clone-count of the sender determines when the stream closes.
/// Threads are detached: they exit on completion, on cancellation, or when
/// the receiving side goes away.
pub fn spawn_walk(
    root: PathBuf,
    extractor: Arc<dyn Extractor>,
    cancel: CancelToken,
    results: Sender<WalkResult>,
) {
    thread::spawn(move || walk_tree(root, extractor, cancel, results));
}

fn walk_tree(
    root: PathBuf,
    extractor: Arc<dyn Extractor>,
    cancel: CancelToken,
    results: Sender<WalkResult>,
) {
    let mut stack = vec![root];
    while let Some(path) = stack.pop() {
        if cancel.is_cancelled() {
            send(&results, Err(Error::Cancelled), &cancel);
            return;
        }

        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                send(&results, Err(Error::Io(e)), &cancel);
                return;
            }
        };
        let ty = meta.file_type();

        if ty.is_dir() {
            match snapshot_dir(&path) {
                Ok(mut entries) => {
                    // Reverse so the stack visits in ascending name order.
                    entries.reverse();
                    stack.extend(entries);
                }
                Err(e) => {
                    send(&results, Err(Error::Io(e)), &cancel);
                    return;
                }
            }
            continue;
        }

        if !ty.is_file() || meta.len() == 0 {
            continue;
        }

        match classify::is_archive(&path) {
            Err(e) => {
                send(&results, Err(Error::Io(e)), &cancel);
                return;
            }
            Ok(false) => {
                if !send(&results, Ok(path), &cancel) {
                    return;
                }
            }
            Ok(true) => {
                let dest = extraction_dir(&path);
                // Best-effort: the archive itself is scanned either way.
                if let Err(err) = extractor.extract(&path, &dest) {
                    warn!("extraction failed for {}: {err}", path.display());
                }
                if !send(&results, Ok(path), &cancel) {
                    return;
                }
                if dest.is_dir() {
                    debug!("expanding {}", dest.display());
                    spawn_walk(
                        dest,
                        Arc::clone(&extractor),
                        cancel.clone(),
                        results.clone(),
                    );
                }
            }
        }
    }
}

/// Sibling extraction directory for an archive path.
pub fn extraction_dir(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(UNAR_SUFFIX);
    PathBuf::from(name)
}

/// Read a directory into a sorted path list.
fn snapshot_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Cancellation-aware send. Returns false when the walk should stop
/// (cancelled, or the receiver is gone).
fn send(results: &Sender<WalkResult>, item: WalkResult, cancel: &CancelToken) -> bool {
    select! {
        send(results, item) -> res => res.is_ok(),
        recv(cancel.channel()) -> _ => false,
    }
}
