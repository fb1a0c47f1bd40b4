//! Installed kegs under the prefix base

use crate::receipt::{InstallReceipt, RECEIPT_FILE};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One installed formula version
#[derive(Debug, Clone)]
pub struct Keg {
    pub name: String,
    pub version: String,
    pub path: PathBuf,
    pub receipt: Option<InstallReceipt>,
}

impl Keg {
    fn from_path(name: String, version: String, path: PathBuf) -> Self {
        let receipt = InstallReceipt::read(&path).ok();
        Self {
            name,
            version,
            path,
            receipt,
        }
    }
}

/// Read all installed kegs under `prefix_base`
pub fn list_installed(prefix_base: &Path) -> Result<Vec<Keg>> {
    if !prefix_base.exists() {
        return Ok(vec![]);
    }

    let mut kegs = Vec::new();

    for entry in fs::read_dir(prefix_base)
        .with_context(|| format!("Failed to read prefix: {}", prefix_base.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        // Skip hidden files
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }

        kegs.extend(installed_versions(prefix_base, &name)?);
    }

    kegs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(kegs)
}

/// All installed versions of one formula, newest first
pub fn installed_versions(prefix_base: &Path, name: &str) -> Result<Vec<Keg>> {
    let formula_dir = prefix_base.join(name);

    if !formula_dir.is_dir() {
        return Ok(vec![]);
    }

    let mut kegs = Vec::new();

    for entry in fs::read_dir(&formula_dir)
        .with_context(|| format!("Failed to read {}", formula_dir.display()))?
    {
        let entry = entry?;
        let version = entry.file_name().to_string_lossy().to_string();

        if version.starts_with('.') || !entry.path().is_dir() {
            continue;
        }

        kegs.push(Keg::from_path(name.to_string(), version, entry.path()));
    }

    kegs.sort_by(|a, b| compare_versions(&b.version, &a.version));
    Ok(kegs)
}

/// Files under a keg, relative to it and sorted, excluding the receipt
pub fn keg_files(keg: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(keg)
        .follow_links(false)
        .max_open(64)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.path().strip_prefix(keg).ok().map(Path::to_path_buf))
        .filter(|rel| rel != Path::new(RECEIPT_FILE))
        .collect();
    files.sort();
    files
}

/// Compare two version strings numerically by dot-separated parts
fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let a_parts: Vec<u32> = a.split('.').filter_map(|s| s.parse::<u32>().ok()).collect();
    let b_parts: Vec<u32> = b.split('.').filter_map(|s| s.parse::<u32>().ok()).collect();

    for i in 0..a_parts.len().max(b_parts.len()) {
        let a_part = a_parts.get(i).unwrap_or(&0);
        let b_part = b_parts.get(i).unwrap_or(&0);
        match a_part.cmp(b_part) {
            std::cmp::Ordering::Equal => continue,
            other => return other,
        }
    }

    // Fall back to lexicographic
    a.cmp(b)
}
