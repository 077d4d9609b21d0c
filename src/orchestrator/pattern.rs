//! Key matching for cache invalidation.

use regex_lite::Regex;

/// Selects cache keys to invalidate.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Exactly this key
    Exact(String),
    /// Every key starting with this prefix
    Prefix(String),
    /// Every key the expression matches anywhere
    Regex(Regex),
}

impl KeyPattern {
    pub fn exact(key: impl Into<String>) -> Self {
        KeyPattern::Exact(key.into())
    }

    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, regex_lite::Error> {
        Regex::new(pattern).map(KeyPattern::Regex)
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Exact(exact) => key == exact,
            KeyPattern::Prefix(prefix) => key.starts_with(prefix.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}
