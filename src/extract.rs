//! Source archive extraction into the scoped work directory.
//!
//! Archives are recognized by their leading bytes rather than by URL suffix:
//! - **gzip** (`1f 8b`) is decompressed and read as tar
//! - **POSIX tar** (`ustar` magic at offset 257) is read directly
//! - bzip2, xz and zip are recognized but unsupported
//!
//! Upstream tarballs almost always wrap their contents in one top-level
//! directory (`git-secrets-1.3.1/`). When that is the case the source tree is
//! that directory; otherwise it is the extraction root itself.
//!
//! ```text
//! <tmp>/src/
//!   git-secrets-1.3.1/      <- returned source tree
//!     Makefile
//!     git-secrets
//! ```

use crate::error::{Error, Result, Stage};
use flate2::read::GzDecoder;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Gzip,
    Tar,
}

impl ArchiveFormat {
    /// Identify an archive from its magic bytes
    pub fn detect(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            return Ok(ArchiveFormat::Gzip);
        }
        if bytes.len() > 262 && &bytes[257..262] == b"ustar" {
            return Ok(ArchiveFormat::Tar);
        }

        let known = if bytes.starts_with(b"BZh") {
            Some("bzip2")
        } else if bytes.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some("xz")
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some("zip")
        } else {
            None
        };

        Err(Error::Extraction(match known {
            Some(format) => format!("unsupported archive format: {}", format),
            None => "unrecognized archive format".to_string(),
        }))
    }
}

/// Unpack `bytes` under `dest` and return the source tree root
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<PathBuf> {
    let format = ArchiveFormat::detect(bytes)?;
    fs::create_dir_all(dest).map_err(Error::io(Stage::Extract))?;

    let count = match format {
        ArchiveFormat::Gzip => unpack(Archive::new(GzDecoder::new(bytes)), dest)?,
        ArchiveFormat::Tar => unpack(Archive::new(bytes), dest)?,
    };
    if count == 0 {
        return Err(Error::Extraction("archive is empty".to_string()));
    }
    tracing::debug!("Extracted {} entries into {}", count, dest.display());

    source_root(dest)
}

fn unpack<R: Read>(mut archive: Archive<R>, dest: &Path) -> Result<usize> {
    let corrupt = |e: std::io::Error| Error::Extraction(e.to_string());
    let mut count = 0;

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if entry.header().entry_type().is_pax_global_extensions() {
            continue;
        }

        let unpacked = entry.unpack_in(dest).map_err(corrupt)?;
        if !unpacked {
            let path = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(Error::Extraction(format!(
                "entry '{}' would be written outside the work directory",
                path
            )));
        }
        count += 1;
    }

    Ok(count)
}

/// The single top-level directory of an extracted archive, or `dest` itself
fn source_root(dest: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)
        .map_err(Error::io(Stage::Extract))?
        .filter_map(|entry| entry.ok())
        .collect();

    match entries.as_slice() {
        [only] if only.path().is_dir() => Ok(only.path()),
        _ => Ok(dest.to_path_buf()),
    }
}
