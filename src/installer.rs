//! The fetch → verify → extract → build → install pipeline and the smoke test.
//!
//! Each stage gates the next; the first error aborts the run and is returned
//! as-is. All scratch work happens in a [`TempDir`] under
//! [`Config::temp_root`], which is removed when the pipeline future completes
//! or is dropped. A keg whose install stage does not finish is removed too, so
//! after any run the keg is either complete or absent.
//!
//! ```no_run
//! use brewsmith::{Config, Formula, Installer};
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> brewsmith::Result<()> {
//!     let formula = Formula::from_path(Path::new("git-secrets.toml"))?;
//!     let installer = Installer::new(Config::from_env());
//!
//!     let outcome = installer.install(&formula, false).await?;
//!     println!("installed {} files into {}", outcome.files, outcome.prefix.display());
//!
//!     let result = installer.run_test(&formula).await?;
//!     println!("test passed: {}", result.passed());
//!     Ok(())
//! }
//! ```

use crate::build::{self, BuildEnv, BuildPlan, BuildSystem};
use crate::cellar;
use crate::config::Config;
use crate::download;
use crate::error::{Error, Result, Stage};
use crate::extract;
use crate::formula::Formula;
use crate::receipt::InstallReceipt;
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;

/// Placeholders a test command may use, and the keg subdirectory each expands to
const PLACEHOLDERS: &[(&str, &str)] = &[
    ("{bin}", "bin"),
    ("{sbin}", "sbin"),
    ("{lib}", "lib"),
    ("{libexec}", "libexec"),
    ("{include}", "include"),
    ("{share}", "share"),
    ("{etc}", "etc"),
];

/// Result of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub prefix: PathBuf,
    pub build_system: BuildSystem,
    /// Number of files the install stage produced
    pub files: usize,
}

/// Result of running a formula's test command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed {
        output: String,
    },
    Failed {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

impl TestOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, TestOutcome::Passed { .. })
    }

    /// Turn a failed outcome into [`Error::TestFailure`]
    pub fn into_result(self) -> Result<String> {
        match self {
            TestOutcome::Passed { output } => Ok(output),
            TestOutcome::Failed {
                command,
                code,
                output,
            } => Err(Error::TestFailure {
                command,
                code,
                output,
            }),
        }
    }
}

pub struct Installer {
    config: Config,
    show_progress: bool,
    stage: Cell<Stage>,
    on_stage: Option<Box<dyn Fn(Stage)>>,
}

impl Installer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            show_progress: false,
            stage: Cell::new(Stage::Recipe),
            on_stage: None,
        }
    }

    /// Show a download progress bar during fetch
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Call `callback` as each stage starts
    pub fn on_stage(mut self, callback: impl Fn(Stage) + 'static) -> Self {
        self.on_stage = Some(Box::new(callback));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The stage most recently entered; still valid after the pipeline is dropped
    pub fn current_stage(&self) -> Stage {
        self.stage.get()
    }

    /// Install prefix `formula` builds into, always absolute
    pub fn prefix_for(&self, formula: &Formula) -> Result<PathBuf> {
        let keg = self.config.keg_path(&formula.name, &formula.version);
        std::path::absolute(&keg).map_err(Error::io(self.current_stage()))
    }

    /// Parent of the scoped work directories, always absolute
    fn temp_root(&self) -> Result<PathBuf> {
        std::path::absolute(&self.config.temp_root).map_err(Error::io(self.current_stage()))
    }

    fn enter(&self, stage: Stage, formula: &Formula) {
        self.stage.set(stage);
        tracing::info!("{} {}: {}", formula.name, formula.version, stage);
        if let Some(callback) = &self.on_stage {
            callback(stage);
        }
    }

    /// Fetch and verify the source archive without building it
    pub async fn fetch(&self, formula: &Formula) -> Result<Vec<u8>> {
        self.enter(Stage::Fetch, formula);
        let bytes =
            download::fetch(&formula.url, self.config.fetch_timeout, self.show_progress).await?;

        self.enter(Stage::Verify, formula);
        formula.checksum.verify(&bytes)?;
        Ok(bytes)
    }

    /// Run the full pipeline for `formula`.
    ///
    /// An existing keg is refused unless `force` is set, in which case it is
    /// replaced right before the install stage.
    pub async fn install(&self, formula: &Formula, force: bool) -> Result<InstallOutcome> {
        let prefix = self.prefix_for(formula)?;
        if prefix.exists() && !force {
            return Err(Error::AlreadyInstalled {
                name: formula.name.clone(),
                version: formula.version.clone(),
                path: prefix,
            });
        }

        let bytes = self.fetch(formula).await?;

        self.enter(Stage::Extract, formula);
        let work = WorkDir::create(&self.temp_root()?, &formula.name)?;
        let source_tree = extract::extract_archive(&bytes, &work.src)?;
        drop(bytes);

        self.enter(Stage::Build, formula);
        let system = formula.build.system.resolve(&source_tree)?;
        build::check_tools(&formula.build.dependencies)?;
        let plan = BuildPlan::new(system, &formula.build, &prefix, &self.config);
        let jobs = if formula.build.deparallelize {
            1
        } else {
            self.config.jobs
        };
        let env = work.build_env(jobs);
        for invocation in &plan.build {
            build::run(invocation, &source_tree, &env, Stage::Build).await?;
        }

        self.enter(Stage::Install, formula);
        if prefix.exists() {
            tracing::info!("Removing existing keg {}", prefix.display());
            fs::remove_dir_all(&prefix).map_err(Error::io(Stage::Install))?;
        }
        let guard = KegGuard::new(prefix.clone());
        for invocation in &plan.install {
            build::run(invocation, &source_tree, &env, Stage::Install).await?;
        }

        let files = cellar::keg_files(&prefix);
        if files.is_empty() {
            return Err(Error::EmptyInstall(prefix));
        }
        InstallReceipt::new(formula, system, &files)
            .write(&prefix)
            .map_err(|e| Error::Io {
                stage: Stage::Install,
                source: std::io::Error::other(e),
            })?;
        guard.disarm();

        tracing::info!("Installed {} files into {}", files.len(), prefix.display());
        Ok(InstallOutcome {
            prefix,
            build_system: system,
            files: files.len(),
        })
    }

    /// Run the formula's test command against its installed keg.
    ///
    /// The command runs in a fresh scratch directory that is also its `HOME`.
    pub async fn run_test(&self, formula: &Formula) -> Result<TestOutcome> {
        self.enter(Stage::Test, formula);

        let prefix = self.prefix_for(formula)?;
        if !prefix.is_dir() {
            return Err(Error::NotInstalled {
                name: formula.name.clone(),
                version: formula.version.clone(),
            });
        }
        let argv = resolve_test_command(&formula.test_command, &prefix);
        let Some((program, args)) = argv.split_first() else {
            return Err(Error::Recipe {
                path: formula.origin.clone(),
                reason: "no test command defined".to_string(),
            });
        };
        let command_line = argv.join(" ");
        let sandbox = scratch_dir(
            &self.temp_root()?,
            &format!("{}-test", formula.name),
            Stage::Test,
        )?;
        tracing::debug!("Running test `{}` in {}", command_line, sandbox.path().display());

        let output = Command::new(program)
            .args(args)
            .current_dir(sandbox.path())
            .env("HOME", sandbox.path())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| Error::Spawn {
                stage: Stage::Test,
                program: program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(TestOutcome::Passed { output: combined })
        } else {
            Ok(TestOutcome::Failed {
                command: command_line,
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

/// Expand prefix placeholders and pin a bare program name to the keg's `bin/`.
///
/// The keg is never put on `PATH`; an installed executable is always run by
/// its absolute path.
pub fn resolve_test_command(command: &[String], prefix: &Path) -> Vec<String> {
    let prefix_str = prefix.display().to_string();

    let mut argv: Vec<String> = command
        .iter()
        .map(|token| {
            let mut token = token.replace("{prefix}", &prefix_str);
            for (placeholder, dir) in PLACEHOLDERS {
                if token.contains(placeholder) {
                    token = token.replace(placeholder, &prefix.join(dir).display().to_string());
                }
            }
            token
        })
        .collect();

    if let Some(program) = argv.first_mut()
        && !program.contains('/')
    {
        let installed = prefix.join("bin").join(program.as_str());
        if build::is_executable(&installed) {
            *program = installed.display().to_string();
        }
    }

    argv
}

fn scratch_dir(root: &Path, label: &str, stage: Stage) -> Result<TempDir> {
    fs::create_dir_all(root).map_err(Error::io(stage))?;
    tempfile::Builder::new()
        .prefix(&format!("brewsmith-{}-", label))
        .tempdir_in(root)
        .map_err(Error::io(stage))
}

/// Scoped work directory of one pipeline run
struct WorkDir {
    dir: TempDir,
    src: PathBuf,
}

impl WorkDir {
    fn create(root: &Path, name: &str) -> Result<Self> {
        let dir = scratch_dir(root, name, Stage::Extract)?;
        let src = dir.path().join("src");
        for sub in ["src", "home", "tmp"] {
            fs::create_dir_all(dir.path().join(sub)).map_err(Error::io(Stage::Extract))?;
        }
        Ok(Self { dir, src })
    }

    fn build_env(&self, jobs: usize) -> BuildEnv {
        BuildEnv {
            home: self.dir.path().join("home"),
            tmpdir: self.dir.path().join("tmp"),
            jobs,
        }
    }
}

/// Removes a keg on drop unless disarmed
struct KegGuard {
    path: PathBuf,
    armed: bool,
}

impl KegGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for KegGuard {
    fn drop(&mut self) {
        if !self.armed || !self.path.exists() {
            return;
        }
        tracing::info!("Removing incomplete keg {}", self.path.display());
        if let Err(e) = fs::remove_dir_all(&self.path) {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
        // Drop the empty <base>/<name> directory as well
        if let Some(parent) = self.path.parent() {
            let _ = fs::remove_dir(parent);
        }
    }
}
