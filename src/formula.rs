//! Formula recipes.
//!
//! A formula is a small declarative file describing where a package's source
//! archive lives, what it must hash to, how it is built, and how the installed
//! result is smoke-tested. Recipes are TOML; files ending in `.json` are read
//! as JSON with the same shape.
//!
//! ```toml
//! name = "git-secrets"
//! desc = "Prevents you from committing secrets and credentials into git repositories"
//! url = "https://github.com/awslabs/git-secrets/archive/v1.3.1.tar.gz"
//! sha256 = "476c9e82cc8cbe6957cee6a07fa4d94213b4b3b881d27444dc12560b8c40c619"
//!
//! [build]
//! flags = ["--disable-debug", "--disable-dependency-tracking", "--disable-silent-rules"]
//!
//! [test]
//! command = ["false"]
//! ```
//!
//! The version is taken from `version` when present, otherwise derived from the
//! archive file name (`v1.3.1.tar.gz` gives `1.3.1`).

use crate::build::BuildSystem;
use crate::checksum::{Algorithm, Checksum};
use crate::error::{Error, Result};
use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Archive suffixes stripped before reading a version out of a file name
const ARCHIVE_SUFFIXES: &[&str] = &[".tar.gz", ".tgz", ".tar.bz2", ".tar.xz", ".tar", ".zip"];

/// Build instructions of a formula
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSpec {
    pub system: BuildSystem,
    /// Passed verbatim, in order, before the synthesized prefix argument
    pub flags: Vec<String>,
    /// Run make with a single job
    pub deparallelize: bool,
    /// Tools that must be on PATH before building
    pub dependencies: Vec<String>,
}

/// A validated formula
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    pub name: String,
    pub desc: String,
    pub homepage: String,
    pub url: Url,
    pub version: String,
    pub checksum: Checksum,
    pub build: BuildSpec,
    pub test_command: Vec<String>,
    /// Where the recipe was read from, for error messages
    pub origin: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeFile {
    name: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    homepage: String,
    url: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    build: BuildSection,
    #[serde(default)]
    test: TestSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BuildSection {
    #[serde(default)]
    system: BuildSystem,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    deparallelize: bool,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestSection {
    #[serde(default)]
    command: Vec<String>,
}

impl Formula {
    /// Load a recipe from disk, choosing the parser by file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|e| Error::Recipe {
            path: origin.clone(),
            reason: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text, &origin),
            _ => Self::from_toml_str(&text, &origin),
        }
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self> {
        let raw: RecipeFile = toml::from_str(text).map_err(|e| Error::Recipe {
            path: origin.to_string(),
            reason: e.message().to_string(),
        })?;
        Self::validate(raw, origin)
    }

    pub fn from_json_str(text: &str, origin: &str) -> Result<Self> {
        let raw: RecipeFile = serde_json::from_str(text).map_err(|e| Error::Recipe {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        Self::validate(raw, origin)
    }

    fn validate(raw: RecipeFile, origin: &str) -> Result<Self> {
        let invalid = |reason: String| Error::Recipe {
            path: origin.to_string(),
            reason,
        };

        validate_name(&raw.name).map_err(invalid)?;

        if raw.url.trim().is_empty() {
            return Err(invalid("url is empty".to_string()));
        }
        let url = Url::parse(raw.url.trim())
            .map_err(|e| invalid(format!("url '{}' is malformed: {}", raw.url, e)))?;
        match url.scheme() {
            "http" | "https" | "file" => {}
            scheme => return Err(invalid(format!("unsupported url scheme '{}'", scheme))),
        }

        let checksum = match (raw.sha256, raw.checksum) {
            (Some(_), Some(_)) => {
                return Err(invalid("give either sha256 or checksum, not both".to_string()));
            }
            (Some(hex), None) => Checksum::new(Algorithm::Sha256, &hex).map_err(invalid)?,
            (None, Some(spec)) => spec.parse::<Checksum>().map_err(invalid)?,
            (None, None) => return Err(invalid("checksum is missing".to_string())),
        };

        let version = match raw.version {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            Some(_) => return Err(invalid("version is empty".to_string())),
            None => version_from_url(&url).ok_or_else(|| {
                invalid(format!(
                    "cannot derive a version from '{}'; set `version`",
                    url
                ))
            })?,
        };
        if version.contains('/') || version == "." || version == ".." {
            return Err(invalid(format!("version '{}' is not a valid path component", version)));
        }

        if let Some(flag) = raw.build.flags.iter().find(|f| is_prefix_flag(f)) {
            return Err(invalid(format!(
                "build flag '{}' sets the prefix; it is added automatically",
                flag
            )));
        }

        if raw.test.command.is_empty() {
            return Err(invalid("test command is missing".to_string()));
        }
        if raw.test.command.iter().any(|t| t.is_empty()) {
            return Err(invalid("test command contains an empty token".to_string()));
        }

        Ok(Self {
            name: raw.name,
            desc: raw.desc,
            homepage: raw.homepage,
            url,
            version,
            checksum,
            build: BuildSpec {
                system: raw.build.system,
                flags: raw.build.flags,
                deparallelize: raw.build.deparallelize,
                dependencies: raw.build.dependencies,
            },
            test_command: raw.test.command,
            origin: origin.to_string(),
        })
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty".to_string()),
        Some(c) if !(c.is_ascii_lowercase() || c.is_ascii_digit()) => {
            return Err(format!("name '{}' must start with a lowercase letter or digit", name));
        }
        _ => {}
    }
    if let Some(bad) = chars.find(|&c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '_' | '+' | '-'))
    }) {
        return Err(format!("name '{}' contains invalid character '{}'", name, bad));
    }
    Ok(())
}

fn is_prefix_flag(flag: &str) -> bool {
    flag.starts_with("--prefix") || flag.starts_with("-DCMAKE_INSTALL_PREFIX") || flag.starts_with("PREFIX=")
}

/// Derive a version from the archive file name at the end of `url`.
///
/// Handles `v1.2.3.tar.gz`, `name-1.2.3.tar.gz`, `name_1.2.tgz` and bare `1.2.3.zip`.
pub fn version_from_url(url: &Url) -> Option<String> {
    let file_name = url.path_segments()?.next_back()?;
    let stem = ARCHIVE_SUFFIXES
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name);

    let starts_with_digit = |s: &str| s.chars().next().is_some_and(|c| c.is_ascii_digit());
    let strip_v = |s: &str| -> Option<String> {
        let s = s.strip_prefix('v').unwrap_or(s);
        starts_with_digit(s).then(|| s.to_string())
    };

    if let Some(version) = strip_v(stem) {
        return Some(version);
    }

    stem.char_indices()
        .rev()
        .filter(|(_, c)| *c == '-' || *c == '_')
        .find_map(|(i, _)| strip_v(&stem[i + 1..]))
}
