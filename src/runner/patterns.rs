//! Failure output classification.
//!
//! Package managers and installers report failures only as text. The
//! patterns here turn that text into a [`PackageFailure`] kind, pull the
//! failing requirement out of installer output, and attach a short hint
//! where one is known. Patterns are checked in order; the first match wins.

use crate::error::PackageFailure;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Which tool produced the output being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSource {
    /// A host package manager (apt-get, dnf, apk, ...).
    PackageManager,
    /// The language package installer (pip).
    Installer,
}

/// A registered failure pattern.
pub struct FailurePattern {
    /// Pattern name (for debugging).
    pub name: &'static str,
    /// Compiled regex matched against combined output.
    pub regex: &'static LazyLock<Regex>,
    /// Which output this pattern applies to.
    pub source: OutputSource,
    /// Failure kind for a match.
    pub classify: fn(&Captures) -> PackageFailure,
    /// Hint shown below the error.
    pub hint: Option<&'static str>,
}

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($pattern).unwrap());
    };
}

lazy_regex!(RE_APT_UNKNOWN, r"Unable to locate package (\S+)");
lazy_regex!(
    RE_DNF_UNKNOWN,
    r"No match for argument: (\S+)|No package (\S+) available"
);
lazy_regex!(RE_APK_UNKNOWN, r"(\S+) \(no such package\)");
lazy_regex!(RE_PACMAN_UNKNOWN, r"target not found: (\S+)");
lazy_regex!(RE_BREW_UNKNOWN, r#"No (?:available )?formula (?:with the name )?"?([^"\s]+)"?"#);
lazy_regex!(
    RE_LOCK,
    r"Could not get lock|Unable to acquire the dpkg frontend lock|unable to lock database|Waiting for process with pid \d+ to finish"
);
lazy_regex!(
    RE_NETWORK,
    r"(?i)Temporary failure resolving|Could not resolve|Failed to fetch|Network is unreachable|Connection timed out|Failed to establish a new connection|Max retries exceeded|Name or service not known|Cannot download repomd\.xml|temporary error \(try again later\)"
);
lazy_regex!(
    RE_PERMISSION,
    r"(?i)are you root\?|Permission denied|This command has to be run with superuser privileges|you cannot perform this operation unless you are root|Operation not permitted"
);
lazy_regex!(
    RE_PIP_NO_DISTRIBUTION,
    r"No matching distribution found for (\S+)"
);
lazy_regex!(
    RE_PIP_NO_VERSION,
    r"Could not find a version that satisfies the requirement (\S+)"
);
lazy_regex!(
    RE_PIP_CONFLICT,
    r"Cannot install (\S+?)(?: and \S+)? because these package versions have conflicting dependencies"
);
lazy_regex!(RE_PIP_INVALID, r"Invalid requirement: '([^']+)'");
lazy_regex!(
    RE_PIP_BUILD,
    r"Failed building wheel for (\S+)|Failed to build (\S+)"
);

fn first_capture(caps: &Captures) -> String {
    caps.iter()
        .skip(1)
        .flatten()
        .next()
        .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '"').to_string())
        .unwrap_or_default()
}

/// Return all built-in failure patterns, ordered by specificity.
pub fn built_in_patterns() -> Vec<FailurePattern> {
    vec![
        FailurePattern {
            name: "apt_unknown_package",
            regex: &RE_APT_UNKNOWN,
            source: OutputSource::PackageManager,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("check the package name for this distribution"),
        },
        FailurePattern {
            name: "dnf_unknown_package",
            regex: &RE_DNF_UNKNOWN,
            source: OutputSource::PackageManager,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("check the package name for this distribution"),
        },
        FailurePattern {
            name: "apk_unknown_package",
            regex: &RE_APK_UNKNOWN,
            source: OutputSource::PackageManager,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: None,
        },
        FailurePattern {
            name: "pacman_unknown_package",
            regex: &RE_PACMAN_UNKNOWN,
            source: OutputSource::PackageManager,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: None,
        },
        FailurePattern {
            name: "brew_unknown_formula",
            regex: &RE_BREW_UNKNOWN,
            source: OutputSource::PackageManager,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: None,
        },
        FailurePattern {
            name: "package_permission",
            regex: &RE_PERMISSION,
            source: OutputSource::PackageManager,
            classify: |_| PackageFailure::PermissionDenied,
            hint: Some("run as root or set system.use_sudo to 'always'"),
        },
        FailurePattern {
            name: "package_lock",
            regex: &RE_LOCK,
            source: OutputSource::PackageManager,
            classify: |_| PackageFailure::LockUnavailable,
            hint: Some("another package operation is running; wait for it and retry"),
        },
        FailurePattern {
            name: "package_network",
            regex: &RE_NETWORK,
            source: OutputSource::PackageManager,
            classify: |_| PackageFailure::Network,
            hint: Some("check network access to the package mirrors"),
        },
        FailurePattern {
            name: "pip_no_distribution",
            regex: &RE_PIP_NO_DISTRIBUTION,
            source: OutputSource::Installer,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("check the requirement name and version against the package index"),
        },
        FailurePattern {
            name: "pip_no_version",
            regex: &RE_PIP_NO_VERSION,
            source: OutputSource::Installer,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("check the requirement name and version against the package index"),
        },
        FailurePattern {
            name: "pip_conflict",
            regex: &RE_PIP_CONFLICT,
            source: OutputSource::Installer,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("relax the conflicting version constraints in the manifest"),
        },
        FailurePattern {
            name: "pip_invalid_requirement",
            regex: &RE_PIP_INVALID,
            source: OutputSource::Installer,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: None,
        },
        FailurePattern {
            name: "pip_build_failure",
            regex: &RE_PIP_BUILD,
            source: OutputSource::Installer,
            classify: |caps| PackageFailure::UnknownPackage {
                name: first_capture(caps),
            },
            hint: Some("a native build failed; system build dependencies may be missing"),
        },
        FailurePattern {
            name: "installer_network",
            regex: &RE_NETWORK,
            source: OutputSource::Installer,
            classify: |_| PackageFailure::Network,
            hint: Some("check network access to the package index"),
        },
        FailurePattern {
            name: "installer_permission",
            regex: &RE_PERMISSION,
            source: OutputSource::Installer,
            classify: |_| PackageFailure::PermissionDenied,
            hint: Some("install into a virtual environment or run with sufficient privileges"),
        },
    ]
}

/// A classified failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Name of the matching pattern.
    pub pattern: &'static str,
    /// Failure kind.
    pub kind: PackageFailure,
    /// Optional hint for the operator.
    pub hint: Option<&'static str>,
}

/// Find the first pattern for `source` matching `output`.
pub fn classify(output: &str, source: OutputSource) -> Option<Classification> {
    built_in_patterns()
        .into_iter()
        .filter(|p| p.source == source)
        .find_map(|p| {
            p.regex.captures(output).map(|caps| Classification {
                pattern: p.name,
                kind: (p.classify)(&caps),
                hint: p.hint,
            })
        })
}

/// Failure kind for package manager output, `Failed` when nothing matches.
pub fn classify_package_failure(output: &str) -> PackageFailure {
    classify(output, OutputSource::PackageManager)
        .map(|c| c.kind)
        .unwrap_or(PackageFailure::Failed)
}

/// Whether output reports an unreachable mirror or index.
///
/// `apt-get update` only warns about unreachable mirrors and still exits 0.
pub fn reports_network_failure(output: &str) -> bool {
    RE_NETWORK.is_match(output)
}

/// Classify a failed install that followed an index refresh.
///
/// A package the manager cannot locate after the index failed to download
/// is a network failure, not a bad package name.
pub fn classify_after_refresh(output: &str, index_unreachable: bool) -> PackageFailure {
    match classify_package_failure(output) {
        PackageFailure::UnknownPackage { .. } if index_unreachable => PackageFailure::Network,
        kind => kind,
    }
}

/// Name of the requirement the installer could not satisfy, if reported.
pub fn failing_requirement(output: &str) -> Option<String> {
    match classify(output, OutputSource::Installer)?.kind {
        PackageFailure::UnknownPackage { name } if !name.is_empty() => Some(name),
        _ => None,
    }
}

/// Hint for a failure, if a pattern provides one.
pub fn find_hint(output: &str, source: OutputSource) -> Option<&'static str> {
    classify(output, source).and_then(|c| c.hint)
}

/// Last non-empty line of output, used as a one-line error message.
pub fn last_line(output: &str) -> String {
    output
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_patterns_compile() {
        for pattern in built_in_patterns() {
            let _ = pattern.regex.as_str();
        }
    }

    #[test]
    fn apt_unknown_package_names_package() {
        let output = "Reading package lists...\nE: Unable to locate package not-a-real-package-xyz\n";
        assert_eq!(
            classify_package_failure(output),
            PackageFailure::UnknownPackage {
                name: "not-a-real-package-xyz".into()
            }
        );
    }

    #[test]
    fn unknown_package_after_unreachable_index_is_network() {
        let refresh = "Ign:1 http://deb.debian.org/debian bookworm InRelease\n\
                       W: Failed to fetch http://deb.debian.org/debian/dists/bookworm/InRelease  \
                       Temporary failure resolving 'deb.debian.org'\n\
                       W: Some index files failed to download. They have been ignored, or old ones used instead.\n";
        assert!(reports_network_failure(refresh));
        assert!(!reports_network_failure("Hit:1 http://deb.debian.org/debian bookworm InRelease\n"));

        let install = "E: Unable to locate package tesseract-ocr\n";
        assert_eq!(classify_after_refresh(install, true), PackageFailure::Network);
        assert_eq!(
            classify_after_refresh(install, false),
            PackageFailure::UnknownPackage {
                name: "tesseract-ocr".into()
            }
        );
        assert_eq!(
            classify_after_refresh("E: Could not get lock /var/lib/dpkg/lock-frontend", true),
            PackageFailure::LockUnavailable
        );
    }

    #[test]
    fn dnf_unknown_package() {
        let output = "No match for argument: tesseract-ocr\nError: Unable to find a match";
        assert_eq!(
            classify_package_failure(output),
            PackageFailure::UnknownPackage {
                name: "tesseract-ocr".into()
            }
        );
    }

    #[test]
    fn apt_lock() {
        let output = "E: Could not get lock /var/lib/dpkg/lock-frontend. It is held by process 1234";
        assert_eq!(
            classify_package_failure(output),
            PackageFailure::LockUnavailable
        );
    }

    #[test]
    fn apt_network() {
        let output = "Err:1 http://deb.debian.org/debian bookworm InRelease\n  Temporary failure resolving 'deb.debian.org'";
        assert_eq!(classify_package_failure(output), PackageFailure::Network);
    }

    #[test]
    fn apt_permission() {
        let output = "E: Could not open lock file /var/lib/dpkg/lock-frontend - open (13: Permission denied)\nE: Unable to acquire the dpkg frontend lock (/var/lib/dpkg/lock-frontend), are you root?";
        assert_eq!(
            classify_package_failure(output),
            PackageFailure::PermissionDenied
        );
        let output = "E: This command has to be run with superuser privileges";
        assert_eq!(
            classify_package_failure(output),
            PackageFailure::PermissionDenied
        );
    }

    #[test]
    fn unrecognized_output_is_failed() {
        assert_eq!(
            classify_package_failure("something else went wrong"),
            PackageFailure::Failed
        );
    }

    #[test]
    fn pip_no_distribution() {
        let output = "ERROR: Could not find a version that satisfies the requirement requests==99.0 (from versions: 2.31.0)\nERROR: No matching distribution found for requests==99.0";
        assert_eq!(failing_requirement(output).as_deref(), Some("requests==99.0"));
    }

    #[test]
    fn pip_conflict() {
        let output = "ERROR: Cannot install fastapi==0.110.0 because these package versions have conflicting dependencies.";
        assert_eq!(failing_requirement(output).as_deref(), Some("fastapi==0.110.0"));
    }

    #[test]
    fn pip_network_has_no_requirement() {
        let output = "WARNING: Retrying ... Failed to establish a new connection: [Errno -3] Temporary failure in name resolution";
        assert!(failing_requirement(output).is_none());
        assert_eq!(
            classify(output, OutputSource::Installer).unwrap().kind,
            PackageFailure::Network
        );
    }

    #[test]
    fn sources_are_kept_apart() {
        let output = "No matching distribution found for foo";
        assert!(classify(output, OutputSource::PackageManager).is_none());
    }

    #[test]
    fn hint_for_lock() {
        let output = "E: Could not get lock /var/lib/apt/lists/lock. It is held by process 42";
        let hint = find_hint(output, OutputSource::PackageManager);
        assert!(hint.unwrap().contains("retry"));
    }

    #[test]
    fn last_line_skips_blank_lines() {
        assert_eq!(last_line("first\nE: broken\n\n  \n"), "E: broken");
        assert_eq!(last_line(""), "");
    }
}
