//! Package versions and version specifiers.
//!
//! Implements the subset of PEP 440 that requirement manifests use in
//! practice: epochs, release segments, pre/post/dev releases and local
//! labels, plus the comparison operators pip accepts.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static RE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^
        v?
        (?:(\d+)!)?                                          # epoch
        (\d+(?:\.\d+)*)                                      # release
        (?:[-_.]?(a|alpha|b|beta|c|rc|pre|preview)[-_.]?(\d*))?
        (?:-(\d+)|[-_.]?(post|rev|r)[-_.]?(\d*))?
        (?:[-_.]?(dev)[-_.]?(\d*))?
        (?:\+([a-z0-9]+(?:[-_.][a-z0-9]+)*))?
        $",
    )
    .unwrap()
});

static RE_SPECIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(===|==|!=|~=|<=|>=|<|>)\s*([^\s,;]+)$").unwrap());

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    Candidate,
}

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
    raw: String,
}

impl Version {
    /// Release segments, e.g. `[2, 31, 0]` for `2.31.0`.
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Whether this is a pre-release or development release.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Whether this is a post-release.
    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// Local version label, if any.
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// The version exactly as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }

    fn pre_key(&self) -> (i8, u64) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (-1, 0),
            (Some((PreRelease::Alpha, n)), _, _) => (0, n),
            (Some((PreRelease::Beta, n)), _, _) => (1, n),
            (Some((PreRelease::Candidate, n)), _, _) => (2, n),
            (None, _, _) => (3, 0),
        }
    }

    fn post_key(&self) -> (i8, u64) {
        self.post.map_or((-1, 0), |n| (0, n))
    }

    fn dev_key(&self) -> (i8, u64) {
        self.dev.map_or((1, 0), |n| (0, n))
    }

    /// Whether the release segments start with `prefix`, padding with zeros.
    fn release_starts_with(&self, prefix: &[u64]) -> bool {
        prefix
            .iter()
            .enumerate()
            .all(|(i, p)| self.release.get(i).copied().unwrap_or(0) == *p)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let lower = raw.to_lowercase();
        let caps = RE_VERSION
            .captures(&lower)
            .ok_or_else(|| format!("invalid version: {}", raw))?;

        let num = |i: usize| -> Option<u64> {
            caps.get(i)
                .map(|m| m.as_str().parse::<u64>().unwrap_or(0))
        };

        let epoch = num(1).unwrap_or(0);
        let release = caps[2]
            .split('.')
            .map(|p| p.parse::<u64>().map_err(|e| format!("invalid version {}: {}", raw, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let pre = caps.get(3).map(|label| {
            let phase = match label.as_str() {
                "a" | "alpha" => PreRelease::Alpha,
                "b" | "beta" => PreRelease::Beta,
                _ => PreRelease::Candidate,
            };
            (phase, num(4).unwrap_or(0))
        });

        let post = num(5).or_else(|| caps.get(6).map(|_| num(7).unwrap_or(0)));
        let dev = caps.get(8).map(|_| num(9).unwrap_or(0));
        let local = caps.get(10).map(|m| m.as_str().to_string());

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
            raw: raw.to_string(),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

/// Comparison operator of a version specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `===`
    ArbitraryEqual,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `~=`
    Compatible,
    /// `<=`
    LessEqual,
    /// `>=`
    GreaterEqual,
    /// `<`
    Less,
    /// `>`
    Greater,
}

impl Operator {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "===" => Self::ArbitraryEqual,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            "~=" => Self::Compatible,
            "<=" => Self::LessEqual,
            ">=" => Self::GreaterEqual,
            "<" => Self::Less,
            ">" => Self::Greater,
            _ => return None,
        })
    }

    /// Operator as written in a manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArbitraryEqual => "===",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Compatible => "~=",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::Greater => ">",
        }
    }
}

/// A single version constraint such as `>=2.0` or `==1.4.*`.
#[derive(Debug, Clone)]
pub struct Specifier {
    op: Operator,
    raw_version: String,
    version: Option<Version>,
    wildcard: bool,
}

impl Specifier {
    /// The comparison operator.
    pub fn operator(&self) -> Operator {
        self.op
    }

    /// Whether the specifier pins a single exact version.
    pub fn is_exact(&self) -> bool {
        matches!(self.op, Operator::Equal | Operator::ArbitraryEqual) && !self.wildcard
    }

    /// Whether the operand itself is a pre-release, which opts the
    /// specifier into matching pre-releases.
    pub fn mentions_prerelease(&self) -> bool {
        self.version.as_ref().is_some_and(Version::is_prerelease)
    }

    /// Check whether `candidate` satisfies this specifier.
    pub fn contains(&self, candidate: &Version) -> bool {
        if self.op == Operator::ArbitraryEqual {
            return candidate.as_str().eq_ignore_ascii_case(&self.raw_version);
        }
        let Some(v) = &self.version else {
            return false;
        };
        match self.op {
            Operator::Equal if self.wildcard => {
                candidate.epoch == v.epoch && candidate.release_starts_with(&v.release)
            }
            Operator::NotEqual if self.wildcard => {
                !(candidate.epoch == v.epoch && candidate.release_starts_with(&v.release))
            }
            Operator::Equal => candidate == v,
            Operator::NotEqual => candidate != v,
            Operator::Compatible => {
                let prefix = &v.release[..v.release.len() - 1];
                candidate >= v && candidate.epoch == v.epoch && candidate.release_starts_with(prefix)
            }
            Operator::LessEqual => candidate <= v,
            Operator::GreaterEqual => candidate >= v,
            Operator::Less => {
                candidate < v
                    && (v.is_prerelease()
                        || !candidate.is_prerelease()
                        || candidate.trimmed_release() != v.trimmed_release())
            }
            Operator::Greater => {
                candidate > v
                    && (v.is_postrelease()
                        || !candidate.is_postrelease()
                        || candidate.trimmed_release() != v.trimmed_release())
            }
            Operator::ArbitraryEqual => unreachable!(),
        }
    }
}

impl FromStr for Specifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let caps = RE_SPECIFIER
            .captures(s)
            .ok_or_else(|| format!("invalid version specifier: {}", s))?;
        let op = Operator::parse(&caps[1]).ok_or_else(|| format!("unknown operator in {}", s))?;
        let operand = &caps[2];

        if op == Operator::ArbitraryEqual {
            return Ok(Self {
                op,
                raw_version: operand.to_string(),
                version: operand.parse().ok(),
                wildcard: false,
            });
        }

        let (raw_version, wildcard) = match operand.strip_suffix(".*") {
            Some(prefix) if matches!(op, Operator::Equal | Operator::NotEqual) => (prefix, true),
            Some(_) => return Err(format!("wildcard not allowed with {}: {}", op.as_str(), s)),
            None => (operand, false),
        };

        let version: Version = raw_version.parse()?;
        if op == Operator::Compatible && version.release.len() < 2 {
            return Err(format!("~= needs at least two release segments: {}", s));
        }

        Ok(Self {
            op,
            raw_version: raw_version.to_string(),
            version: Some(version),
            wildcard,
        })
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.raw_version)?;
        if self.wildcard {
            write!(f, ".*")?;
        }
        Ok(())
    }
}
