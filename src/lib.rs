//! Recursive, keyword-aware content scanner.
//!
//! Given an input archive or plain file, find every occurrence of a
//! curated keyword set anywhere inside it, however deeply nested the
//! archives are, and report each match with its byte offset, surrounding
//! context, and policy metadata.
//!
//! The engine is built from three interlocking parts:
//! - A double-array trie encoding of an Aho-Corasick automaton that scans
//!   byte streams for every keyword in one linear pass, with a sliding
//!   three-buffer variant that keeps matches and their context exact
//!   across buffer boundaries.
//! - A concurrent, cancellable unarchive walker that expands archives in
//!   place via an external extractor and emits leaf files lazily.
//! - A staged pipeline (copy-to-scratch -> walker -> matcher pool ->
//!   aggregator) with bounded channels, cooperative cancellation, and
//!   first-error short-circuiting.
//!
//! Data flow:
//! input -> scratch copy -> recursive walk -> per-file streaming match ->
//! aggregated summary (JSON or YAML).

pub mod app;
pub mod archive;
pub mod cancel;
pub mod cli;
pub mod error;
pub mod keywords;
pub mod matcher;
pub mod output;
pub mod pipeline;
pub mod scratch;
pub mod signal;

pub use archive::{ArchiveKind, ExtractError, Extractor, UnarExtractor, UNAR_SUFFIX};
pub use cancel::{CancelSource, CancelToken};
pub use error::Error;
pub use keywords::{Hit, Keyword, Keywords};
pub use matcher::{Machine, Term, MAX_KEYWORD_LEN};
pub use output::{OutputFormat, ScanResult, ScanStats, ScanSummary};
pub use pipeline::ScanOptions;
pub use scratch::{PlainDirectory, Scratch, ScratchBackend};
