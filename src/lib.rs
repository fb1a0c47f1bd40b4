//! Library interface for brewsmith
//!
//! Builds and installs a package from a declarative formula: the source
//! archive is fetched, checked against its pinned digest, unpacked into a
//! scoped work directory, built with an allow-listed build system into
//! `<prefix base>/<name>/<version>`, and smoke-tested from there.

pub mod build;
pub mod cellar;
pub mod checksum;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod formula;
pub mod installer;
pub mod receipt;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result, Stage};
pub use formula::Formula;
pub use installer::{InstallOutcome, Installer, TestOutcome};
