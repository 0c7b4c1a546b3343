//! End-to-end pipeline tests over real archive fixtures.
//!
//! # Scope
//! - Nested-archive expansion (tar containing gzip containing text) with
//!   hit attribution to the logical inner path.
//! - hits_only filtering and statistics.
//! - Cancellation liveness and scratch cleanliness on every exit path.
//!
//! # Assumptions
//! - Extraction uses a stub [`Extractor`] that understands the tar and
//!   gzip fixtures synthesized here, standing in for the external `unar`
//!   binary so the suite runs without host tooling.

use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use goscan::archive::{ExtractError, Extractor};
use goscan::cancel::CancelSource;
use goscan::keywords::Keywords;
use goscan::pipeline::{self, ScanOptions};
use goscan::scratch::{PlainDirectory, Scratch};

const KEYWORDS_YAML: &str = "\
- word: secret
  policies:
    restricted: do not ship
- word: internal
";

fn load_keywords() -> Arc<Keywords> {
    Arc::new(Keywords::load_reader(Cursor::new(KEYWORDS_YAML.as_bytes().to_vec()), None).unwrap())
}

fn scan_options(parallelism: usize) -> ScanOptions {
    ScanOptions {
        context: 6,
        hits_only: false,
        parallelism,
    }
}

/// Extractor that expands the tar/gzip fixtures in-process.
struct StubExtractor;

impl Extractor for StubExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        let name = archive.file_name().unwrap_or_default().to_string_lossy();
        fs::create_dir_all(dest).map_err(|e| ExtractError::new(e.to_string()))?;
        if name.ends_with(".tar") {
            let file = File::open(archive).map_err(|e| ExtractError::new(e.to_string()))?;
            tar::Archive::new(file)
                .unpack(dest)
                .map_err(|e| ExtractError::new(e.to_string()))?;
            return Ok(());
        }
        if name.ends_with(".gz") {
            let file = File::open(archive).map_err(|e| ExtractError::new(e.to_string()))?;
            let mut decoder = flate2::read::GzDecoder::new(file);
            let mut inner = Vec::new();
            decoder
                .read_to_end(&mut inner)
                .map_err(|e| ExtractError::new(e.to_string()))?;
            let stem = name.trim_end_matches(".gz");
            fs::write(dest.join(stem), inner).map_err(|e| ExtractError::new(e.to_string()))?;
            return Ok(());
        }
        Err(ExtractError::new(format!("unsupported fixture: {name}")))
    }
}

fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// tar( inner.txt.gz = gzip("... secret ...") )
fn nested_fixture(dir: &Path) -> PathBuf {
    let gz = gzip_bytes(b"leading bytes then the secret word and more");
    let tar_path = dir.join("bundle.tar");
    let mut builder = tar::Builder::new(File::create(&tar_path).unwrap());
    let mut header = tar::Header::new_ustar();
    header.set_size(gz.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "inner.txt.gz", gz.as_slice())
        .unwrap();
    builder.finish().unwrap();
    tar_path
}

#[test]
fn nested_archive_hits_attribute_to_inner_path() {
    let base = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = nested_fixture(inputs.path());

    let scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let cancel = CancelSource::new();
    let summary = pipeline::scan(
        &input,
        load_keywords(),
        &scratch,
        Arc::new(StubExtractor),
        &scan_options(2),
        &cancel,
    )
    .unwrap();

    assert_eq!(summary.input_file, input.display().to_string());
    assert!(summary.stats.total_hits >= 1);
    assert_eq!(summary.stats.files_hit, 1);
    // tar leaf + gz leaf + inner text leaf.
    assert_eq!(summary.stats.files_scanned, 3);

    let inner = summary
        .results
        .iter()
        .find(|r| r.file.ends_with("inner.txt"))
        .expect("inner file reported");
    assert_eq!(inner.hits.len(), 1);
    let hit = &inner.hits[0];
    assert_eq!(hit.word, "secret");
    assert_eq!(hit.index, 23);
    assert_eq!(hit.context, "n the secret word ");
    assert_eq!(
        hit.policies.get("restricted").map(String::as_str),
        Some("do not ship")
    );

    // The logical path contains no scratch or extraction artifacts.
    assert!(!inner.file.contains("goscan-unar"));
    assert!(inner.file.contains("bundle.tar/inner.txt.gz/inner.txt"));

    // The archive file itself is reported as a leaf too.
    assert!(summary
        .results
        .iter()
        .any(|r| r.file.ends_with("bundle.tar")));
}

#[test]
fn hits_only_drops_clean_files_but_counts_them() {
    let base = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = nested_fixture(inputs.path());

    let scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let cancel = CancelSource::new();
    let mut opts = scan_options(2);
    opts.hits_only = true;
    let summary = pipeline::scan(
        &input,
        load_keywords(),
        &scratch,
        Arc::new(StubExtractor),
        &opts,
        &cancel,
    )
    .unwrap();

    assert_eq!(summary.stats.files_scanned, 3);
    assert_eq!(summary.results.len(), 1);
    assert!(summary.results[0].file.ends_with("inner.txt"));
}

#[test]
fn missing_input_fails_and_scratch_is_removed() {
    let base = tempfile::tempdir().unwrap();

    let mut scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let scratch_dir = scratch.dir().to_path_buf();
    let cancel = CancelSource::new();
    let err = pipeline::scan(
        Path::new("/no/such/input.tar"),
        load_keywords(),
        &scratch,
        Arc::new(StubExtractor),
        &scan_options(1),
        &cancel,
    )
    .unwrap_err();
    assert!(!err.is_cancelled());

    scratch.teardown().unwrap();
    assert!(!scratch_dir.exists());
}

/// Extractor that nests forever (up to a runaway guard) and yields slowly,
/// so cancellation always lands mid-expansion.
struct EndlessExtractor;

impl Extractor for EndlessExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
        let depth = archive
            .components()
            .filter(|c| c.as_os_str().to_string_lossy().contains("goscan-unar"))
            .count();
        if depth > 1000 {
            return Err(ExtractError::new("runaway nesting"));
        }
        std::thread::sleep(Duration::from_millis(2));
        fs::create_dir_all(dest).map_err(|e| ExtractError::new(e.to_string()))?;
        // Another "gzip" for the walker to expand, plus scannable filler.
        fs::write(dest.join("again.gz"), [0x1F, 0x8B, 0x08, 0x00, 0x99])
            .map_err(|e| ExtractError::new(e.to_string()))?;
        fs::write(dest.join("filler.txt"), b"nothing secret here at all")
            .map_err(|e| ExtractError::new(e.to_string()))?;
        Ok(())
    }
}

#[test]
fn cancellation_mid_scan_is_clean() {
    let base = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = inputs.path().join("deep.gz");
    fs::write(&input, [0x1F, 0x8B, 0x08, 0x00, 0x42]).unwrap();

    let mut scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let scratch_dir = scratch.dir().to_path_buf();
    let cancel = CancelSource::new();

    let canceller = {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            cancel.cancel();
        })
    };

    let start = Instant::now();
    let summary = pipeline::scan(
        &input,
        load_keywords(),
        &scratch,
        Arc::new(EndlessExtractor),
        &scan_options(2),
        &cancel,
    )
    .unwrap();
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "pipeline wound down promptly after cancellation"
    );
    canceller.join().unwrap();

    // Partial summary is well-formed: stats agree with the result list.
    assert!(summary.stats.files_scanned >= summary.stats.files_hit);
    assert_eq!(
        summary.stats.files_hit,
        summary.results.iter().filter(|r| !r.hits.is_empty()).count() as u64
    );

    scratch.teardown().unwrap();
    assert!(!scratch_dir.exists());
}

#[test]
fn already_cancelled_scan_returns_empty_summary() {
    let base = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = nested_fixture(inputs.path());

    let scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let cancel = CancelSource::new();
    cancel.cancel();
    let summary = pipeline::scan(
        &input,
        load_keywords(),
        &scratch,
        Arc::new(StubExtractor),
        &scan_options(1),
        &cancel,
    )
    .unwrap();
    assert!(summary.results.is_empty());
    assert_eq!(summary.stats.files_scanned, 0);
}

#[test]
fn plain_file_input_scans_without_extraction() {
    let base = tempfile::tempdir().unwrap();
    let inputs = tempfile::tempdir().unwrap();
    let input = inputs.path().join("notes.txt");
    fs::write(&input, b"an internal memo about the secret plan").unwrap();

    let scratch = Scratch::new(base.path(), Box::new(PlainDirectory)).unwrap();
    let cancel = CancelSource::new();
    let summary = pipeline::scan(
        &input,
        load_keywords(),
        &scratch,
        Arc::new(StubExtractor),
        &scan_options(1),
        &cancel,
    )
    .unwrap();

    assert_eq!(summary.stats.files_scanned, 1);
    assert_eq!(summary.stats.files_hit, 1);
    assert_eq!(summary.stats.total_hits, 2);
    assert!(summary.results[0].file.ends_with("notes.txt"));
    assert!(summary.stats.duration >= 0.0);
}
