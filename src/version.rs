use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Dotted numeric run (at least two components) optionally followed by a letter run
static VERSION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]+(?:\.[0-9]+)+)([a-z]+)?$").unwrap());

/// Schema version such as `1.6`, `0.4.8` or `2.1.0a`.
///
/// Ordering is component-wise; a missing component sorts below any present one,
/// so `1.0 < 1.0.0`. The suffix only breaks ties between equal numeric runs.
#[derive(Debug, Clone)]
pub struct Version {
    components: Vec<u32>,
    suffix: String,
    text: String,
}

impl Version {
    pub fn parse(text: &str) -> Result<Self> {
        let lowered = text.to_lowercase();
        let caps = VERSION_PATTERN
            .captures(&lowered)
            .ok_or_else(|| Error::InvalidVersionFormat(text.to_string()))?;

        let components = caps[1]
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersionFormat(text.to_string()))?;
        let suffix = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        Ok(Self {
            components,
            suffix,
            text: lowered,
        })
    }

    pub fn components(&self) -> &[u32] {
        &self.components
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn major(&self) -> u32 {
        self.components[0]
    }

    /// Two documents of one role can be folded together when they share a major version
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major() == other.major()
    }

    fn component(&self, index: usize) -> i64 {
        self.components
            .get(index)
            .map(|&c| i64::from(c))
            .unwrap_or(-1)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| self.component(i).cmp(&other.component(i)))
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| self.suffix.cmp(&other.suffix))
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

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
        self.suffix.hash(state);
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
