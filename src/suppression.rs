use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::finding::Finding;
use crate::registry::PatternRegistry;

/// How a rule's matcher string is compared against a finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-sensitive prefix on the pattern key, or case-insensitive
    /// equality on category or kind.
    Default,
    /// Case-sensitive equality on pattern key, category, or kind.
    Exact,
    /// Full-string regular expression over pattern key, category, or kind.
    Regex,
}

/// Where a suppression rule applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SuppressionScope {
    /// A single top-level class (nested classes suppressed with it).
    Class(String),
    /// A package by name.
    Package(String),
}

enum Matcher {
    Any,
    Text { value: String, mode: MatchMode },
    Pattern(Regex),
}

/// One user-declared suppression rule.
pub struct SuppressionRule {
    matcher: Matcher,
    scope: SuppressionScope,
    matched: bool,
}

impl SuppressionRule {
    /// Build a rule. A missing matcher string matches every finding in
    /// scope. Regex rules compile here and fail fast on malformed input.
    pub fn new(
        matcher: Option<&str>,
        mode: MatchMode,
        scope: SuppressionScope,
    ) -> Result<Self> {
        let matcher = match matcher {
            None => Matcher::Any,
            Some(value) if mode == MatchMode::Regex => {
                let anchored = format!("^(?:{value})$");
                let regex = Regex::new(&anchored)
                    .with_context(|| format!("invalid suppression regex {value:?}"))?;
                Matcher::Pattern(regex)
            }
            Some(value) => Matcher::Text {
                value: value.to_string(),
                mode,
            },
        };
        Ok(Self {
            matcher,
            scope,
            matched: false,
        })
    }

    pub fn scope(&self) -> &SuppressionScope {
        &self.scope
    }

    pub fn was_matched(&self) -> bool {
        self.matched
    }

    fn matches(&self, finding: &Finding, registry: &PatternRegistry) -> bool {
        let descriptor = registry.lookup(finding.pattern());
        let key = finding.pattern();
        match &self.matcher {
            Matcher::Any => true,
            Matcher::Text { value, mode } => match mode {
                MatchMode::Default => {
                    key.starts_with(value.as_str())
                        || value.eq_ignore_ascii_case(&descriptor.category)
                        || value.eq_ignore_ascii_case(&descriptor.kind)
                }
                MatchMode::Exact => {
                    key == value || descriptor.category == *value || descriptor.kind == *value
                }
                MatchMode::Regex => unreachable!("regex matcher stored as compiled pattern"),
            },
            Matcher::Pattern(regex) => {
                regex.is_match(key)
                    || regex.is_match(&descriptor.category)
                    || regex.is_match(&descriptor.kind)
            }
        }
    }
}

impl fmt::Display for SuppressionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let matcher = match &self.matcher {
            Matcher::Any => "<any>".to_string(),
            Matcher::Text { value, .. } => value.clone(),
            Matcher::Pattern(regex) => regex.as_str().to_string(),
        };
        match &self.scope {
            SuppressionScope::Class(class) => write!(f, "{matcher} in class {class}"),
            SuppressionScope::Package(package) => write!(f, "{matcher} in package {package}"),
        }
    }
}

/// Filters findings against registered suppression rules, tracking which
/// rules ever fired so useless suppressions can be reported afterwards.
#[derive(Default)]
pub struct SuppressionMatcher {
    rules: Vec<SuppressionRule>,
    by_class: HashMap<String, Vec<usize>>,
    package_rules: Vec<usize>,
    match_count: u64,
}

impl SuppressionMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: SuppressionRule) {
        let index = self.rules.len();
        match &rule.scope {
            SuppressionScope::Class(class) => {
                self.by_class.entry(class.clone()).or_default().push(index);
            }
            SuppressionScope::Package(_) => self.package_rules.push(index),
        }
        self.rules.push(rule);
    }

    pub fn match_count(&self) -> u64 {
        self.match_count
    }

    /// Test a finding against all applicable rules in registration order,
    /// short-circuiting on the first match.
    ///
    /// Class-scoped rules are looked up under the finding's top-level
    /// enclosing class. Package-scoped rules are then all tested regardless
    /// of the finding's actual package; tightening that would be a behavior
    /// change for existing suppression files.
    pub fn matches(&mut self, finding: &Finding, registry: &PatternRegistry) -> bool {
        let mut candidates: Vec<usize> = Vec::new();
        if let Some(class) = finding.primary_class() {
            if let Some(indices) = self.by_class.get(class.top_level_class()) {
                candidates.extend_from_slice(indices);
            }
        }
        candidates.extend_from_slice(&self.package_rules);

        for index in candidates {
            if self.rules[index].matches(finding, registry) {
                self.rules[index].matched = true;
                self.match_count += 1;
                return true;
            }
        }
        false
    }

    /// Rules that never matched anything over the whole analysis.
    pub fn unused_rules(&self) -> impl Iterator<Item = &SuppressionRule> {
        self.rules.iter().filter(|rule| !rule.matched)
    }

    /// Log each useless suppression once, after a full analysis pass.
    pub fn report_unused_suppressions(&self) {
        for rule in self.unused_rules() {
            warn!("useless suppression: {rule}");
        }
    }
}
