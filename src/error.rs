use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Recipe,
    Fetch,
    Verify,
    Extract,
    Build,
    Install,
    Test,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Recipe => "recipe",
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Extract => "extract",
            Stage::Build => "build",
            Stage::Install => "install",
            Stage::Test => "test",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid recipe {path}: {reason}")]
    Recipe { path: String, reason: String },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    Integrity { expected: String, actual: String },

    #[error("Failed to extract archive: {0}")]
    Extraction(String),

    #[error("No configure script, CMakeLists.txt or Makefile in {}", .0.display())]
    NoBuildSystem(PathBuf),

    #[error("Build tool '{0}' not found on PATH")]
    MissingTool(String),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        stage: Stage,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` failed ({})", describe_exit(.code))]
    Build {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("`{command}` failed ({})", describe_exit(.code))]
    Install {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("`{command}` failed ({})", describe_exit(.code))]
    TestFailure {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Installation produced no files in {}", .0.display())]
    EmptyInstall(PathBuf),

    #[error("{name} {version} is already installed at {}; use --force to reinstall", .path.display())]
    AlreadyInstalled {
        name: String,
        version: String,
        path: PathBuf,
    },

    #[error("{name} {version} is not installed")]
    NotInstalled { name: String, version: String },

    #[error("Interrupted during {0}")]
    Interrupted(Stage),

    #[error("{stage} failed: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Stage the error aborted the pipeline in
    pub fn stage(&self) -> Stage {
        match self {
            Error::Recipe { .. } => Stage::Recipe,
            Error::Network { .. } => Stage::Fetch,
            Error::Integrity { .. } => Stage::Verify,
            Error::Extraction(_) => Stage::Extract,
            Error::Build { .. } | Error::NoBuildSystem(_) | Error::MissingTool(_) => Stage::Build,
            Error::Install { .. } | Error::EmptyInstall(_) | Error::AlreadyInstalled { .. } => {
                Stage::Install
            }
            Error::TestFailure { .. } | Error::NotInstalled { .. } => Stage::Test,
            Error::Interrupted(stage) => *stage,
            Error::Io { stage, .. } | Error::Spawn { stage, .. } => *stage,
        }
    }

    /// Combined stdout/stderr of the subprocess that failed, if any
    pub fn captured_output(&self) -> Option<&str> {
        match self {
            Error::Build { output, .. }
            | Error::Install { output, .. }
            | Error::TestFailure { output, .. } => Some(output.as_str()),
            _ => None,
        }
    }

    pub(crate) fn io(stage: Stage) -> impl FnOnce(std::io::Error) -> Error {
        move |source| Error::Io { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
