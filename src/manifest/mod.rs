//! Dependency manifest loading.
//!
//! A manifest is an ordered list of requirements in the pip requirements
//! format. It is read-only input: the provisioner re-reads it on every run
//! and never writes to it.
//!
//! # Example
//!
//! ```
//! use cps_provision::manifest::Manifest;
//! use std::path::Path;
//!
//! let manifest = Manifest::parse(
//!     "fastapi>=0.110\nrequests==2.31.0  # pinned\n",
//!     Path::new("requirements.txt"),
//! )
//! .unwrap();
//! assert_eq!(manifest.len(), 2);
//! assert_eq!(manifest.get("Requests").unwrap().as_str(), "requests==2.31.0");
//! ```

pub mod marker;
pub mod requirement;
pub mod version;

pub use marker::HostPlatform;
pub use requirement::{normalize_name, Requirement};
pub use version::{Operator, PreRelease, Specifier, Version};

use crate::error::{ProvisionError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed dependency manifest, with `-r` includes expanded in place.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    entries: Vec<Requirement>,
    options: Vec<String>,
    includes: Vec<PathBuf>,
    digest: String,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `ManifestNotFound` if the file (or an included file) doesn't
    /// exist, and `ManifestParseError` for invalid lines or include cycles.
    pub fn load(path: &Path) -> Result<Self> {
        let content = read_manifest(path)?;
        Self::parse(&content, path)
    }

    /// Parse manifest content. `path` is used for error reporting and to
    /// resolve `-r` includes relative to it.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut manifest = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
            options: Vec::new(),
            includes: Vec::new(),
            digest: String::new(),
        };
        let mut hasher = Sha256::new();
        let mut stack = vec![identity(path)];
        manifest.parse_into(content, path, &mut stack, &mut hasher)?;
        manifest.digest = hex::encode(hasher.finalize());
        tracing::debug!(
            "parsed manifest {} ({} requirements, {} includes)",
            path.display(),
            manifest.entries.len(),
            manifest.includes.len()
        );
        Ok(manifest)
    }

    fn parse_into(
        &mut self,
        content: &str,
        path: &Path,
        stack: &mut Vec<PathBuf>,
        hasher: &mut Sha256,
    ) -> Result<()> {
        hasher.update(content.as_bytes());

        for (line_number, line) in logical_lines(content) {
            let line = strip_comment(&line);
            if line.is_empty() {
                continue;
            }

            if line.starts_with('-') {
                match include_target(line) {
                    Some(Ok(target)) => {
                        let target = resolve_include(path, target);
                        let included = read_manifest(&target)?;
                        let id = identity(&target);
                        if stack.contains(&id) {
                            return Err(ProvisionError::ManifestParseError {
                                path: path.to_path_buf(),
                                line: line_number,
                                message: format!("include cycle through {}", target.display()),
                            });
                        }
                        stack.push(id);
                        self.includes.push(target.clone());
                        self.parse_into(&included, &target, stack, hasher)?;
                        stack.pop();
                    }
                    Some(Err(message)) => {
                        return Err(ProvisionError::ManifestParseError {
                            path: path.to_path_buf(),
                            line: line_number,
                            message,
                        });
                    }
                    None => self.options.push(line.to_string()),
                }
                continue;
            }

            let requirement = Requirement::parse(line, line_number).map_err(|message| {
                ProvisionError::ManifestParseError {
                    path: path.to_path_buf(),
                    line: line_number,
                    message,
                }
            })?;
            self.entries.push(requirement);
        }

        Ok(())
    }

    /// Path of the top-level manifest.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Requirements in manifest order.
    pub fn entries(&self) -> &[Requirement] {
        &self.entries
    }

    /// Installer options (`--index-url`, `-c`, `-e`, ...) kept verbatim.
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Files pulled in through `-r`.
    pub fn includes(&self) -> &[PathBuf] {
        &self.includes
    }

    /// Number of requirements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no requirements.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a requirement by (normalized) name.
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        let key = normalize_name(name);
        self.entries.iter().find(|r| r.key() == key)
    }

    /// Hex SHA-256 of the manifest content, including included files.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Whether the manifest contains entries only the installer can judge
    /// (direct references or editable installs).
    pub fn needs_installer(&self) -> bool {
        self.entries.iter().any(Requirement::needs_installer)
            || self
                .options
                .iter()
                .any(|o| o.starts_with("-e") || o.starts_with("--editable"))
    }
}

fn read_manifest(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProvisionError::ManifestNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ProvisionError::Io(e)
        }
    })
}

/// Join `\`-continued physical lines; yields (first line number, text).
fn logical_lines(content: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut start = 0;

    for (idx, line) in content.lines().enumerate() {
        if current.is_empty() {
            start = idx + 1;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                current.push_str(head);
                current.push(' ');
            }
            None => {
                current.push_str(line);
                lines.push((start, std::mem::take(&mut current)));
            }
        }
    }
    if !current.is_empty() {
        lines.push((start, current));
    }
    lines
}

/// Drop full-line comments and ` #` inline comments.
fn strip_comment(line: &str) -> &str {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return "";
    }
    let cut = trimmed
        .char_indices()
        .find(|&(i, c)| c == '#' && i > 0 && trimmed[..i].ends_with(char::is_whitespace))
        .map_or(trimmed.len(), |(i, _)| i);
    trimmed[..cut].trim_end()
}

/// Target of a `-r` / `--requirement` option line, if this is one.
fn include_target(line: &str) -> Option<std::result::Result<&str, String>> {
    let rest = if let Some(rest) = line.strip_prefix("--requirement") {
        rest.strip_prefix('=').unwrap_or(rest)
    } else {
        line.strip_prefix("-r")?
    };
    let target = rest.trim();
    if target.is_empty() {
        Some(Err(format!("missing file after '{}'", line)))
    } else {
        Some(Ok(target))
    }
}

/// The file a path names once `..` and symlinks are resolved.
fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn resolve_include(including: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    including
        .parent()
        .map(|dir| dir.join(target))
        .unwrap_or_else(|| target.to_path_buf())
}
