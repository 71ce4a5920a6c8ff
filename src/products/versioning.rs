use std::{cmp::Ordering, fmt, str::FromStr};

use serde::Deserialize;

/// How versions within one title are ranked to pick the latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrdering {
    /// Plain byte-wise string comparison: "9" ranks above "10".
    Lexicographic,
    /// Semantic-version precedence. Short numeric cores are padded
    /// ("2" → "2.0.0", "1.10" → "1.10.0") and a leading `v` is ignored.
    /// Strings that still do not parse rank below every parsable version
    /// and compare lexicographically among themselves.
    #[default]
    Semantic,
}

impl VersionOrdering {
    /// Total order over version strings. Equal precedence under semver
    /// ("1.0" vs "1.0.0") falls back to the raw strings so the result is
    /// deterministic.
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            Self::Lexicographic => a.cmp(b),
            Self::Semantic => {
                let (pa, pb) = (parse_lenient(a), parse_lenient(b));
                match (pa, pb) {
                    (Some(va), Some(vb)) => va.cmp(&vb),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                }
                .then_with(|| a.cmp(b))
            }
        }
    }

    /// Sorts newest first.
    pub fn sort_desc<T, F>(self, items: &mut [T], version: F)
    where
        F: Fn(&T) -> &str,
    {
        items.sort_by(|x, y| self.compare(version(y), version(x)));
    }
}

impl FromStr for VersionOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lexicographic" | "lex" => Ok(Self::Lexicographic),
            "semantic" | "semver" => Ok(Self::Semantic),
            other => Err(format!("unknown version ordering '{other}'")),
        }
    }
}

impl fmt::Display for VersionOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexicographic => f.write_str("lexicographic"),
            Self::Semantic => f.write_str("semantic"),
        }
    }
}

fn parse_lenient(raw: &str) -> Option<semver::Version> {
    let raw = raw.trim();
    let raw = raw.strip_prefix(['v', 'V']).unwrap_or(raw);
    if let Ok(v) = semver::Version::parse(raw) {
        return Some(v);
    }

    let split = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, rest) = raw.split_at(split);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty()
        || parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(rest);
    semver::Version::parse(&padded).ok()
}
