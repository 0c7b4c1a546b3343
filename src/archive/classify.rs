//! Archive-likeness classification by magic bytes.
//!
//! # Invariants
//! - The signature table is local to this module; nothing registers
//!   matchers in process-global state.
//! - Zero-byte and non-regular files are never archives.
//! - `deb` is checked before `ar`: a Debian package is an `ar` archive
//!   with a fixed first member name.
//!
//! # Algorithm
//! Read the first [`HEADER_LEN`] bytes and probe a fixed signature table;
//! a handful of extensions (`.cpio`, `.iso`, `.img`) are admitted without
//! magic because their formats have no usable leading signature.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Header bytes needed by the deepest probe (the `ustar` tag at 257).
pub const HEADER_LEN: usize = 262;

/// Container kinds the external extractor is expected to handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Gzip,
    Xz,
    Bzip2,
    SevenZip,
    Tar,
    Rar,
    Rpm,
    Deb,
    Pdf,
    Exe,
    Rtf,
    Postscript,
    Cab,
    Ar,
    Compress,
    Lzip,
    Cpio,
    Iso,
    RawImage,
}

/// Sniff a kind from a file header. Longer/more specific signatures are
/// probed before their generalizations.
pub fn sniff_kind(header: &[u8]) -> Option<ArchiveKind> {
    if header.starts_with(b"!<arch>\ndebian-binary") {
        return Some(ArchiveKind::Deb);
    }
    if header.starts_with(b"!<arch>") {
        return Some(ArchiveKind::Ar);
    }
    if header.len() >= 4
        && header[0] == b'P'
        && header[1] == b'K'
        && matches!(header[2], 0x03 | 0x05 | 0x07)
        && matches!(header[3], 0x04 | 0x06 | 0x08)
    {
        return Some(ArchiveKind::Zip);
    }
    if header.starts_with(&[0x1F, 0x8B]) {
        return Some(ArchiveKind::Gzip);
    }
    if header.starts_with(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]) {
        return Some(ArchiveKind::Xz);
    }
    if header.starts_with(b"BZh") {
        return Some(ArchiveKind::Bzip2);
    }
    if header.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some(ArchiveKind::SevenZip);
    }
    if header.starts_with(&[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07]) {
        return Some(ArchiveKind::Rar);
    }
    if header.starts_with(&[0xED, 0xAB, 0xEE, 0xDB]) {
        return Some(ArchiveKind::Rpm);
    }
    if header.len() >= HEADER_LEN && &header[257..262] == b"ustar" {
        return Some(ArchiveKind::Tar);
    }
    if header.starts_with(b"%PDF") {
        return Some(ArchiveKind::Pdf);
    }
    if header.starts_with(b"MSCF") {
        return Some(ArchiveKind::Cab);
    }
    if header.starts_with(b"MZ") {
        return Some(ArchiveKind::Exe);
    }
    if header.starts_with(b"{\\rtf") {
        return Some(ArchiveKind::Rtf);
    }
    if header.starts_with(b"%!") {
        return Some(ArchiveKind::Postscript);
    }
    if header.starts_with(&[0x1F, 0x9D]) || header.starts_with(&[0x1F, 0xA0]) {
        return Some(ArchiveKind::Compress);
    }
    if header.starts_with(b"LZIP") {
        return Some(ArchiveKind::Lzip);
    }
    None
}

/// Kinds admitted by filename suffix alone.
pub fn kind_from_extension(path: &Path) -> Option<ArchiveKind> {
    let name = path.file_name()?.to_str()?;
    if ends_with_ignore_ascii_case(name, ".cpio") {
        return Some(ArchiveKind::Cpio);
    }
    if ends_with_ignore_ascii_case(name, ".iso") {
        return Some(ArchiveKind::Iso);
    }
    if ends_with_ignore_ascii_case(name, ".img") {
        return Some(ArchiveKind::RawImage);
    }
    None
}

/// Should this file be handed to the extractor?
///
/// Reads the header; I/O failures propagate. Non-regular and zero-byte
/// files are not archives.
pub fn is_archive(path: &Path) -> io::Result<bool> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.file_type().is_file() || meta.len() == 0 {
        return Ok(false);
    }
    if kind_from_extension(path).is_some() {
        return Ok(true);
    }
    let mut header = [0u8; HEADER_LEN];
    let mut file = File::open(path)?;
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(sniff_kind(&header[..filled]).is_some())
}

fn ends_with_ignore_ascii_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}
