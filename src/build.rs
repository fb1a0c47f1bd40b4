//! Build-system invocations.
//!
//! A formula never runs arbitrary shell. Its build is one of a fixed set of
//! invocation shapes, each ending with the synthesized install prefix:
//!
//! | System      | Build                                          | Install                 |
//! |-------------|------------------------------------------------|-------------------------|
//! | `configure` | `./configure <flags> --prefix=P`, then `make`  | `make install`          |
//! | `cmake`     | `cmake . <flags> -DCMAKE_INSTALL_PREFIX=P`, then `make` | `make install` |
//! | `make`      | `make <flags> PREFIX=P`                        | `make PREFIX=P install` |
//!
//! Parallelism is passed to make through `MAKEFLAGS` so the argument lists stay
//! exactly the formula's flags plus the prefix.

use crate::config::Config;
use crate::error::{Error, Result, Stage};
use crate::formula::BuildSpec;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    /// Autotools-style `./configure` script
    #[default]
    Configure,
    Cmake,
    /// A plain Makefile honoring `PREFIX`
    Make,
    /// Decide from the extracted source tree
    Auto,
}

impl BuildSystem {
    /// Resolve `Auto` against the files present in `source_tree`
    pub fn resolve(self, source_tree: &Path) -> Result<Self> {
        if self != BuildSystem::Auto {
            return Ok(self);
        }

        if source_tree.join("configure").is_file() {
            Ok(BuildSystem::Configure)
        } else if source_tree.join("CMakeLists.txt").is_file() {
            Ok(BuildSystem::Cmake)
        } else if ["Makefile", "makefile", "GNUmakefile"]
            .iter()
            .any(|name| source_tree.join(name).is_file())
        {
            Ok(BuildSystem::Make)
        } else {
            Err(Error::NoBuildSystem(source_tree.to_path_buf()))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BuildSystem::Configure => "configure",
            BuildSystem::Cmake => "cmake",
            BuildSystem::Make => "make",
            BuildSystem::Auto => "auto",
        }
    }
}

/// One allow-listed subprocess call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Human-readable command line for logs and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The invocations of the build and install stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub system: BuildSystem,
    pub build: Vec<Invocation>,
    pub install: Vec<Invocation>,
}

impl BuildPlan {
    /// Lay out the invocations for a resolved build system
    pub fn new(system: BuildSystem, spec: &BuildSpec, prefix: &Path, config: &Config) -> Self {
        let prefix = prefix.display();
        let make = || config.make.clone();
        let with_prefix = |arg: String| -> Vec<String> {
            spec.flags.iter().cloned().chain(std::iter::once(arg)).collect()
        };

        let (build, install) = match system {
            BuildSystem::Configure | BuildSystem::Auto => (
                vec![
                    Invocation::new("./configure", with_prefix(format!("--prefix={}", prefix))),
                    Invocation::new(make(), vec![]),
                ],
                vec![Invocation::new(make(), vec!["install".to_string()])],
            ),
            BuildSystem::Cmake => {
                let mut args = vec![".".to_string()];
                args.extend(with_prefix(format!("-DCMAKE_INSTALL_PREFIX={}", prefix)));
                (
                    vec![
                        Invocation::new(config.cmake.clone(), args),
                        Invocation::new(make(), vec![]),
                    ],
                    vec![Invocation::new(make(), vec!["install".to_string()])],
                )
            }
            BuildSystem::Make => (
                vec![Invocation::new(make(), with_prefix(format!("PREFIX={}", prefix)))],
                vec![Invocation::new(
                    make(),
                    vec![format!("PREFIX={}", prefix), "install".to_string()],
                )],
            ),
        };

        Self {
            system,
            build,
            install,
        }
    }
}

/// Environment the build and install subprocesses run with
#[derive(Debug, Clone)]
pub struct BuildEnv {
    pub home: PathBuf,
    pub tmpdir: PathBuf,
    pub jobs: usize,
}

impl BuildEnv {
    fn vars(&self) -> Vec<(&'static str, OsString)> {
        vec![
            ("HOME", self.home.clone().into_os_string()),
            ("TMPDIR", self.tmpdir.clone().into_os_string()),
            ("MAKEFLAGS", format!("-j{}", self.jobs.max(1)).into()),
        ]
    }
}

/// Run one invocation in `cwd`, capturing stdout and stderr.
///
/// A non-zero exit becomes [`Error::Build`] or [`Error::Install`] depending on `stage`.
pub async fn run(invocation: &Invocation, cwd: &Path, env: &BuildEnv, stage: Stage) -> Result<String> {
    let command_line = invocation.command_line();
    tracing::debug!("Running `{}` in {}", command_line, cwd.display());

    // Source-tree scripts are resolved against the tree, not our own cwd
    let program = if invocation.program.starts_with(".") {
        cwd.join(&invocation.program)
    } else {
        invocation.program.clone()
    };

    let output = Command::new(&program)
        .args(&invocation.args)
        .current_dir(cwd)
        .envs(env.vars())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| Error::Spawn {
            stage,
            program: invocation.program.display().to_string(),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if output.status.success() {
        return Ok(combined);
    }

    let code = output.status.code();
    Err(match stage {
        Stage::Install => Error::Install {
            command: command_line,
            code,
            output: combined,
        },
        _ => Error::Build {
            command: command_line,
            code,
            output: combined,
        },
    })
}

/// Locate an executable on PATH
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Fail on the first build dependency that cannot be found
pub fn check_tools(dependencies: &[String]) -> Result<()> {
    for tool in dependencies {
        if find_in_path(tool).is_none() {
            return Err(Error::MissingTool(tool.clone()));
        }
    }
    Ok(())
}

#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(system: BuildSystem, flags: &[&str]) -> BuildSpec {
        BuildSpec {
            system,
            flags: flags.iter().map(|s| s.to_string()).collect(),
            deparallelize: false,
            dependencies: vec![],
        }
    }

    #[test]
    fn test_configure_flags_in_order_with_prefix_last() {
        let config = Config::with_prefix_base("/cellar");
        let flags = [
            "--disable-debug",
            "--disable-dependency-tracking",
            "--disable-silent-rules",
        ];
        let plan = BuildPlan::new(
            BuildSystem::Configure,
            &spec(BuildSystem::Configure, &flags),
            Path::new("/cellar/git-secrets/1.3.1"),
            &config,
        );

        let configure = &plan.build[0];
        assert_eq!(configure.program, PathBuf::from("./configure"));
        assert_eq!(configure.args.len(), flags.len() + 1);
        assert_eq!(&configure.args[..flags.len()], &flags);
        assert_eq!(
            configure.args.last().unwrap(),
            "--prefix=/cellar/git-secrets/1.3.1"
        );
        assert_eq!(plan.build[1].program, PathBuf::from("make"));
        assert_eq!(plan.install[0].args, vec!["install"]);
    }

    #[test]
    fn test_cmake_plan() {
        let mut config = Config::with_prefix_base("/cellar");
        config.cmake = PathBuf::from("/usr/local/bin/cmake");
        let plan = BuildPlan::new(
            BuildSystem::Cmake,
            &spec(BuildSystem::Cmake, &["-DBUILD_TESTING=OFF"]),
            Path::new("/p"),
            &config,
        );
        assert_eq!(
            plan.build[0].command_line(),
            "/usr/local/bin/cmake . -DBUILD_TESTING=OFF -DCMAKE_INSTALL_PREFIX=/p"
        );
        assert_eq!(plan.install[0].command_line(), "make install");
    }

    #[test]
    fn test_make_plan_passes_prefix_to_both_stages() {
        let config = Config::with_prefix_base("/cellar");
        let plan = BuildPlan::new(
            BuildSystem::Make,
            &spec(BuildSystem::Make, &[]),
            Path::new("/p"),
            &config,
        );
        assert_eq!(plan.build.len(), 1);
        assert_eq!(plan.build[0].command_line(), "make PREFIX=/p");
        assert_eq!(plan.install[0].command_line(), "make PREFIX=/p install");
    }

    #[test]
    fn test_resolve_auto() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            BuildSystem::Auto.resolve(dir.path()),
            Err(Error::NoBuildSystem(_))
        ));

        std::fs::write(dir.path().join("Makefile"), "all:\n").unwrap();
        assert_eq!(BuildSystem::Auto.resolve(dir.path()).unwrap(), BuildSystem::Make);

        std::fs::write(dir.path().join("CMakeLists.txt"), "").unwrap();
        assert_eq!(BuildSystem::Auto.resolve(dir.path()).unwrap(), BuildSystem::Cmake);

        std::fs::write(dir.path().join("configure"), "#!/bin/sh\n").unwrap();
        assert_eq!(
            BuildSystem::Auto.resolve(dir.path()).unwrap(),
            BuildSystem::Configure
        );

        // Explicit choices are never second-guessed
        assert_eq!(BuildSystem::Make.resolve(dir.path()).unwrap(), BuildSystem::Make);
    }

    #[test]
    fn test_missing_tool() {
        let err = check_tools(&["definitely-not-a-real-tool-7f3a".to_string()]).unwrap_err();
        assert!(matches!(err, Error::MissingTool(ref t) if t == "definitely-not-a-real-tool-7f3a"));
        assert_eq!(err.stage(), Stage::Build);
        assert!(check_tools(&[]).is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let env = BuildEnv {
            home: dir.path().to_path_buf(),
            tmpdir: dir.path().to_path_buf(),
            jobs: 2,
        };

        let ok = Invocation::new("sh", vec!["-c".into(), "echo $MAKEFLAGS".into()]);
        let out = run(&ok, dir.path(), &env, Stage::Build).await.unwrap();
        assert_eq!(out.trim(), "-j2");

        let failing = Invocation::new("sh", vec!["-c".into(), "echo boom >&2; exit 3".into()]);
        match run(&failing, dir.path(), &env, Stage::Install).await {
            Err(Error::Install { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert!(output.contains("boom"));
            }
            other => panic!("expected install error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let env = BuildEnv {
            home: dir.path().to_path_buf(),
            tmpdir: dir.path().to_path_buf(),
            jobs: 1,
        };
        let missing = Invocation::new("./configure", vec![]);
        let err = run(&missing, dir.path(), &env, Stage::Build).await.unwrap_err();
        assert!(matches!(err, Error::Spawn { stage: Stage::Build, .. }));
    }
}
