//! Install receipts.
//!
//! Every keg gets an `INSTALL_RECEIPT.json` once its install stage succeeds:
//!
//! ```text
//! <base>/git-secrets/1.3.1/
//!   INSTALL_RECEIPT.json     # how this keg was produced
//!   bin/
//!   share/
//! ```
//!
//! The receipt records the archive the keg was built from, the build system
//! and flags used, and the files the install stage produced. Only `time`
//! differs between two installs of the same recipe.

use crate::build::BuildSystem;
use crate::formula::Formula;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const RECEIPT_FILE: &str = "INSTALL_RECEIPT.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub tool_version: String,
    pub time: i64,
    pub source: SourceInfo,
    pub build: BuildInfo,
    #[serde(default)]
    pub installed_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    pub url: String,
    pub checksum: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub system: String,
    #[serde(default)]
    pub flags: Vec<String>,
    pub arch: String,
    pub os: String,
}

impl InstallReceipt {
    /// Receipt for a keg just installed from `formula`
    pub fn new(formula: &Formula, system: BuildSystem, files: &[PathBuf]) -> Self {
        Self {
            tool_version: format!("brewsmith/{}", env!("CARGO_PKG_VERSION")),
            time: chrono::Utc::now().timestamp(),
            source: SourceInfo {
                url: formula.url.to_string(),
                checksum: formula.checksum.to_string(),
                version: formula.version.clone(),
            },
            build: BuildInfo {
                system: system.name().to_string(),
                flags: formula.build.flags.clone(),
                arch: std::env::consts::ARCH.to_string(),
                os: std::env::consts::OS.to_string(),
            },
            installed_files: files
                .iter()
                .map(|f| f.to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// Read the receipt of the keg at `keg_path`
    pub fn read(keg_path: &Path) -> Result<Self> {
        let receipt_path = keg_path.join(RECEIPT_FILE);
        let contents = fs::read_to_string(&receipt_path)
            .with_context(|| format!("Failed to read receipt: {}", receipt_path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse receipt: {}", receipt_path.display()))
    }

    pub fn write(&self, keg_path: &Path) -> Result<()> {
        let receipt_path = keg_path.join(RECEIPT_FILE);
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize install receipt")?;

        fs::write(&receipt_path, json)
            .with_context(|| format!("Failed to write receipt: {}", receipt_path.display()))?;

        Ok(())
    }

    /// Installation time in the local timezone, for display
    pub fn installed_at(&self) -> Option<String> {
        chrono::DateTime::from_timestamp(self.time, 0).map(|utc| {
            utc.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formula() -> Formula {
        Formula::from_toml_str(
            r#"
name = "git-secrets"
url = "https://github.com/Smarsh/git-secrets/archive/v1.3.1.tar.gz"
sha256 = "476c9e82cc8cbe6957cee6a07fa4d94213b4b3b881d27444dc12560b8c40c619"

[build]
system = "make"
flags = ["--disable-debug"]

[test]
command = ["{bin}/git-secrets", "--list"]
"#,
            "git-secrets.toml",
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read() {
        let keg = tempfile::tempdir().unwrap();
        let files = vec![PathBuf::from("bin/git-secrets")];
        let receipt = InstallReceipt::new(&formula(), BuildSystem::Make, &files);
        receipt.write(keg.path()).unwrap();

        let read = InstallReceipt::read(keg.path()).unwrap();
        assert_eq!(read.source.version, "1.3.1");
        assert_eq!(read.build.system, "make");
        assert_eq!(read.build.flags, vec!["--disable-debug"]);
        assert_eq!(read.installed_files, vec!["bin/git-secrets"]);
        assert!(read.source.checksum.starts_with("sha256:476c9e82"));
        assert!(read.installed_at().is_some());
    }

    #[test]
    fn test_read_missing_receipt() {
        let keg = tempfile::tempdir().unwrap();
        let err = InstallReceipt::read(keg.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to read receipt"));
    }
}
