//! Platform environment markers.
//!
//! Only `sys_platform`, `platform_system` and `os_name` compared with `==`
//! or `!=` are evaluated. Any other clause is undecided and left to the
//! installer, which knows the interpreter it runs under. Clauses combine
//! with `and`/`or` using three-valued logic, so
//! `sys_platform == "win32" and python_version < "3.12"` is still
//! `Some(false)` on Linux.

use regex::Regex;
use std::sync::LazyLock;

static RE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(sys_platform|platform_system|os_name)\s*(==|!=)\s*['"]([^'"]*)['"]\s*$"#)
        .unwrap()
});
static RE_OR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+or\s+").unwrap());
static RE_AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+and\s+").unwrap());

/// Marker variable values for the host the provisioner runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub sys_platform: Option<&'static str>,
    pub platform_system: Option<&'static str>,
    pub os_name: Option<&'static str>,
}

impl HostPlatform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    /// Values for a Rust target OS name (`linux`, `macos`, `windows`, ...).
    pub fn for_os(os: &str) -> Self {
        let (sys_platform, platform_system, os_name) = match os {
            "linux" => (Some("linux"), Some("Linux"), Some("posix")),
            "macos" => (Some("darwin"), Some("Darwin"), Some("posix")),
            "windows" => (Some("win32"), Some("Windows"), Some("nt")),
            "freebsd" => (None, Some("FreeBSD"), Some("posix")),
            _ => (None, None, None),
        };
        Self {
            sys_platform,
            platform_system,
            os_name,
        }
    }

    fn value(&self, variable: &str) -> Option<&'static str> {
        match variable {
            "sys_platform" => self.sys_platform,
            "platform_system" => self.platform_system,
            "os_name" => self.os_name,
            _ => None,
        }
    }
}

/// Evaluate `marker` for `host`; `None` when it can't be decided here.
pub fn evaluate(marker: &str, host: &HostPlatform) -> Option<bool> {
    if marker.contains('(') {
        return None;
    }
    let mut result = Some(false);
    for alternative in RE_OR.split(marker) {
        let mut all = Some(true);
        for clause in RE_AND.split(alternative) {
            all = and(all, clause_value(clause, host));
        }
        result = or(result, all);
    }
    result
}

fn clause_value(clause: &str, host: &HostPlatform) -> Option<bool> {
    let caps = RE_CLAUSE.captures(clause)?;
    let actual = host.value(&caps[1])?;
    let equal = actual == &caps[3];
    Some(if &caps[2] == "==" { equal } else { !equal })
}

fn and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux() -> HostPlatform {
        HostPlatform::for_os("linux")
    }

    #[test]
    fn platform_clauses() {
        assert_eq!(evaluate(r#"sys_platform == "win32""#, &linux()), Some(false));
        assert_eq!(evaluate(r#"sys_platform != "win32""#, &linux()), Some(true));
        assert_eq!(evaluate("platform_system=='Linux'", &linux()), Some(true));
        assert_eq!(evaluate(r#"os_name == "nt""#, &linux()), Some(false));
        assert_eq!(
            evaluate(r#"sys_platform == "darwin""#, &HostPlatform::for_os("macos")),
            Some(true)
        );
    }

    #[test]
    fn other_variables_are_undecided() {
        assert_eq!(evaluate(r#"python_version >= "3.10""#, &linux()), None);
        assert_eq!(evaluate(r#"extra == "dev""#, &linux()), None);
        assert_eq!(evaluate(r#"(sys_platform == "linux")"#, &linux()), None);
    }

    #[test]
    fn combinations_use_three_valued_logic() {
        let host = linux();
        assert_eq!(
            evaluate(r#"sys_platform == "win32" and python_version < "3.12""#, &host),
            Some(false)
        );
        assert_eq!(
            evaluate(r#"sys_platform == "linux" and python_version < "3.12""#, &host),
            None
        );
        assert_eq!(
            evaluate(r#"sys_platform == "linux" or python_version < "3.12""#, &host),
            Some(true)
        );
        assert_eq!(
            evaluate(r#"sys_platform == "win32" or sys_platform == "cygwin""#, &host),
            Some(false)
        );
    }

    #[test]
    fn unknown_os_decides_nothing() {
        let host = HostPlatform::for_os("haiku");
        assert_eq!(evaluate(r#"sys_platform == "win32""#, &host), None);
    }
}
