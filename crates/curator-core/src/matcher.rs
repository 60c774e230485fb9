//! Glob-style name matching.

use regex::{Regex, RegexBuilder};

use crate::error::ConfigError;

/// A set of compiled name patterns.
///
/// Each pattern supports a single wildcard syntax: `*` matches any run of
/// characters (including none). Everything else is literal. Matching is
/// case-insensitive and anchored at both ends, so `*.ini` matches
/// `desktop.INI` but not `settings.ini.bak`.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    patterns: Vec<Regex>,
}

impl PathMatcher {
    /// Compile a list of patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// An empty matcher that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }

    /// Check a name against every pattern.
    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for ch in pattern.chars() {
        if ch == '*' {
            expr.push_str(".*");
        } else {
            let mut buf = [0u8; 4];
            expr.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
        }
    }
    expr.push('$');
    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .build()
        .map_err(|source| ConfigError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}
