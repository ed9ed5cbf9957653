//! A single manifest entry.

use super::marker::{self, HostPlatform};
use super::version::{Specifier, Version};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static RE_REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[([^\]]*)\])?\s*(.*)$")
        .unwrap()
});

static RE_NAME_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_.]+").unwrap());

/// Normalize a package name for comparison (`Foo_Bar.baz` -> `foo-bar-baz`).
pub fn normalize_name(name: &str) -> String {
    RE_NAME_SEPARATORS
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// A dependency specifier: name, optional extras, constraints, marker.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Package name as written.
    pub name: String,
    /// Requested extras, e.g. `standard` in `uvicorn[standard]`.
    pub extras: Vec<String>,
    /// Version constraints, all of which must hold.
    pub specifiers: Vec<Specifier>,
    /// Environment marker, kept verbatim.
    pub marker: Option<String>,
    /// Direct reference URL for `name @ url` entries.
    pub url: Option<String>,
    /// 1-based line number in the file it came from.
    pub line: usize,
    raw: String,
}

impl Requirement {
    /// Parse one logical manifest line.
    pub fn parse(line: &str, line_number: usize) -> Result<Self, String> {
        let raw = line.trim();
        let caps = RE_REQUIREMENT
            .captures(raw)
            .ok_or_else(|| format!("invalid requirement: {}", raw))?;

        let name = caps[1].to_string();
        let extras = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(normalize_name)
                    .collect()
            })
            .unwrap_or_default();
        let rest = caps.get(3).map_or("", |m| m.as_str()).trim();

        let mut url = None;
        let mut specifiers = Vec::new();
        let marker;

        if let Some(reference) = rest.strip_prefix('@') {
            let (location, m) = match reference.split_once(" ;") {
                Some((l, m)) => (l.trim(), Some(m)),
                None => (reference.trim(), None),
            };
            if location.is_empty() {
                return Err(format!("missing URL after '@': {}", raw));
            }
            url = Some(location.to_string());
            marker = m;
        } else {
            let (constraints, m) = match rest.split_once(';') {
                Some((c, m)) => (c, Some(m)),
                None => (rest, None),
            };
            marker = m;
            let constraints = constraints.trim();
            let constraints = constraints
                .strip_prefix('(')
                .and_then(|c| c.strip_suffix(')'))
                .unwrap_or(constraints);
            for part in constraints.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                specifiers.push(part.parse::<Specifier>()?);
            }
        }

        let marker = match marker.map(str::trim) {
            Some("") => return Err(format!("empty environment marker: {}", raw)),
            m => m.map(str::to_string),
        };

        Ok(Self {
            name,
            extras,
            specifiers,
            marker,
            url,
            line: line_number,
            raw: raw.to_string(),
        })
    }

    /// Normalized package name.
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether `version` satisfies every specifier.
    pub fn is_satisfied_by(&self, version: &Version) -> bool {
        self.specifiers.iter().all(|s| s.contains(version))
    }

    /// Whether the installer, not the provisioner, must decide if this
    /// entry applies or is satisfied.
    pub fn needs_installer(&self) -> bool {
        self.url.is_some()
    }

    /// Whether this entry applies on `host`, `None` when its marker can't
    /// be evaluated here.
    pub fn applies_to(&self, host: &HostPlatform) -> Option<bool> {
        match &self.marker {
            Some(m) => marker::evaluate(m, host),
            None => Some(true),
        }
    }

    /// Whether pre-releases may satisfy this requirement.
    pub fn allows_prereleases(&self) -> bool {
        self.specifiers.iter().any(Specifier::mentions_prerelease)
    }

    /// The requirement exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}
