// Test helpers for isolated pipeline runs
// Provides throwaway prefixes, fixture archives and stub build tools

#![allow(dead_code)]

use brewsmith::Config;
use brewsmith::checksum::Algorithm;
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::Url;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Isolated test environment using temporary directories
/// Automatically cleaned up when dropped (RAII pattern)
///
/// - temp/
///   - Cellar/     (prefix base, kegs land here)
///   - work/       (temp root for scoped work directories)
///   - fixtures/   (archives and recipes)
///   - tools/      (stub make scripts)
///   - logs/       (what stub tools saw)
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub prefix_base: PathBuf,
    pub temp_root: PathBuf,
    pub fixtures: PathBuf,
    pub tools: PathBuf,
    pub logs: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let env = Self {
            prefix_base: root.join("Cellar"),
            temp_root: root.join("work"),
            fixtures: root.join("fixtures"),
            tools: root.join("tools"),
            logs: root.join("logs"),
            temp_dir,
        };

        for dir in [&env.temp_root, &env.fixtures, &env.tools, &env.logs] {
            fs::create_dir_all(dir).unwrap();
        }
        env
    }

    /// Installer configuration pointing at this environment and the stub make
    pub fn config(&self) -> Config {
        let mut config = Config::with_prefix_base(&self.prefix_base);
        config.temp_root = self.temp_root.clone();
        config.make = self.stub_make();
        config.jobs = 2;
        config
    }

    pub fn keg(&self, name: &str, version: &str) -> PathBuf {
        self.prefix_base.join(name).join(version)
    }

    /// Entries left in the temp root; empty once every run cleaned up
    pub fn leftover_work_dirs(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.temp_root)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    pub fn log(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.logs.join(name)).ok()
    }

    /// Write an archive into fixtures and return its file URL
    pub fn publish(&self, file_name: &str, bytes: &[u8]) -> Url {
        let path = self.fixtures.join(file_name);
        fs::write(&path, bytes).unwrap();
        Url::from_file_path(&path).unwrap()
    }

    pub fn write_recipe(&self, file_name: &str, contents: &str) -> PathBuf {
        let path = self.fixtures.join(file_name);
        fs::write(&path, contents).unwrap();
        path
    }

    /// A `make` that logs its arguments and, for `install`, copies the
    /// fixture's `hello` and `README` into the prefix
    pub fn stub_make(&self) -> PathBuf {
        let path = self.tools.join("make");
        if !path.exists() {
            write_script(
                &path,
                &format!(
                    r#"#!/bin/sh
echo "$*" >> "{log}"
prefix=""
install=0
for arg in "$@"; do
  case "$arg" in
    PREFIX=*) prefix="${{arg#PREFIX=}}" ;;
    install) install=1 ;;
  esac
done
if [ "$install" = 1 ]; then
  [ -n "$prefix" ] || prefix="$(cat .configured-prefix)"
  mkdir -p "$prefix/bin" "$prefix/share/doc/hello"
  cp hello "$prefix/bin/hello"
  chmod 755 "$prefix/bin/hello"
  cp README "$prefix/share/doc/hello/README"
fi
"#,
                    log = self.logs.join("make.log").display()
                ),
            );
        }
        path
    }

    /// A `make` whose install target writes part of the keg and then fails
    pub fn failing_install_make(&self) -> PathBuf {
        let path = self.tools.join("make-broken-install");
        write_script(
            &path,
            r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = install ]; then
    prefix="$(cat .configured-prefix)"
    mkdir -p "$prefix/bin"
    echo partial > "$prefix/bin/partial"
    echo "install: cannot create directory 'share': Permission denied" >&2
    exit 2
  fi
done
"#,
        );
        path
    }

    /// `configure` script recording its arguments and build environment
    pub fn configure_script(&self) -> String {
        format!(
            r#"#!/bin/sh
echo "$*" > "{args}"
echo "$HOME" > "{home}"
for arg in "$@"; do
  case "$arg" in
    --prefix=*) echo "${{arg#--prefix=}}" > .configured-prefix ;;
  esac
done
"#,
            args = self.logs.join("configure.args").display(),
            home = self.logs.join("configure.home").display()
        )
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

pub fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// Gzipped tarball of `entries`, all with mode 0755
pub fn tarball(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    let tar = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap()
}

/// The hello package: a configure script, an executable and a README
pub fn hello_archive(env: &TestEnvironment) -> Vec<u8> {
    let configure = env.configure_script();
    tarball(&[
        ("hello-1.0/configure", configure.as_str()),
        ("hello-1.0/hello", "#!/bin/sh\necho hello, world\n"),
        ("hello-1.0/README", "hello is a test package\n"),
    ])
}

pub fn sha256(bytes: &[u8]) -> String {
    Algorithm::Sha256.digest(bytes)
}

/// Recipe text for `hello` at `url`
pub fn hello_recipe(url: &Url, sha256: &str, flags: &[&str], test: &[&str]) -> String {
    let quote = |items: &[&str]| {
        items
            .iter()
            .map(|s| format!("{:?}", s))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        r#"name = "hello"
desc = "Prints a greeting"
url = "{url}"
version = "1.0"
sha256 = "{sha256}"

[build]
flags = [{flags}]

[test]
command = [{test}]
"#,
        url = url,
        sha256 = sha256,
        flags = quote(flags),
        test = quote(test)
    )
}
