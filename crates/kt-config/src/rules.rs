//! Pattern rule table for export-name matching.
//!
//! The active rule set is data, not code: new obfuscated export names ship
//! as entries in `rules.json` without touching matching logic. Rules are
//! validated and compiled once per scan; matching itself lives in kt-core's
//! symbol matcher.

use kt_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single export-name matching rule.
///
/// JSON form is tagged by match mode:
/// ```json
/// [
///   { "match": "contains", "pattern": "oecc" },
///   { "match": "exact", "pattern": "GetDeviceUniqueId" },
///   { "match": "regex", "pattern": "^_?lcc[0-9]+$" }
/// ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum PatternRule {
    /// Symbol name contains the pattern as a substring.
    Contains { pattern: String },

    /// Symbol name equals the pattern exactly.
    Exact { pattern: String },

    /// Symbol name matches the regular expression.
    Regex { pattern: String },
}

impl PatternRule {
    /// The raw pattern text, regardless of mode.
    pub fn pattern(&self) -> &str {
        match self {
            PatternRule::Contains { pattern }
            | PatternRule::Exact { pattern }
            | PatternRule::Regex { pattern } => pattern,
        }
    }
}

/// The process-wide, read-only rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub rules: Vec<PatternRule>,
}

impl RuleSet {
    /// Built-in defaults covering the known obfuscated export-name
    /// fragments of the Widevine DRM engine library.
    pub fn builtin() -> Self {
        RuleSet {
            rules: vec![
                PatternRule::Contains {
                    pattern: "oecc".into(),
                },
                PatternRule::Contains {
                    pattern: "lcc".into(),
                },
                PatternRule::Contains {
                    pattern: "oemcrypto".into(),
                },
            ],
        }
    }

    /// Load a rule table from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidRules(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&data)
    }

    /// Parse a rule table from a JSON string.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let set: RuleSet =
            serde_json::from_str(data).map_err(|e| Error::InvalidRules(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    /// Validate the rule table: non-empty, no empty patterns, regexes parse.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(Error::InvalidRules("rule table is empty".into()));
        }
        for rule in &self.rules {
            if rule.pattern().is_empty() {
                return Err(Error::InvalidRules("empty pattern".into()));
            }
            if let PatternRule::Regex { pattern } = rule {
                regex::Regex::new(pattern)
                    .map_err(|e| Error::InvalidRules(format!("bad regex '{}': {}", pattern, e)))?;
            }
        }
        Ok(())
    }

    /// Compile the table for repeated matching during a scan.
    pub fn compile(&self) -> Result<CompiledRuleSet> {
        self.validate()?;
        let matchers = self
            .rules
            .iter()
            .map(|rule| {
                Ok(match rule {
                    PatternRule::Contains { pattern } => RuleMatcher::Contains(pattern.clone()),
                    PatternRule::Exact { pattern } => RuleMatcher::Exact(pattern.clone()),
                    PatternRule::Regex { pattern } => RuleMatcher::Regex(
                        regex::Regex::new(pattern)
                            .map_err(|e| Error::InvalidRules(e.to_string()))?,
                    ),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(CompiledRuleSet { matchers })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

enum RuleMatcher {
    Contains(String),
    Exact(String),
    Regex(regex::Regex),
}

/// A rule table compiled for matching.
pub struct CompiledRuleSet {
    matchers: Vec<RuleMatcher>,
}

impl CompiledRuleSet {
    /// Whether any rule matches the given symbol name.
    pub fn is_match(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| match m {
            RuleMatcher::Contains(p) => name.contains(p.as_str()),
            RuleMatcher::Exact(p) => name == p,
            RuleMatcher::Regex(re) => re.is_match(name),
        })
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
