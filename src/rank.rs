use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use tracing::warn;

use crate::finding::{HIGHEST_PRIORITY, LOW_PRIORITY, NORMAL_PRIORITY};
use crate::registry::PatternRegistry;

/// Largest rank still shown by default; ranks above it mark the pattern as
/// hidden-by-default.
pub const VISIBLE_RANK_MAX: i32 = 20;

/// Identifier of the core rank source.
pub const CORE_PLUGIN_ID: &str = "core";

/// One scoring-table entry: an absolute rank or a signed relative delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankValue {
    pub value: i32,
    pub relative: bool,
}

impl RankValue {
    pub fn absolute(value: i32) -> Self {
        Self {
            value,
            relative: false,
        }
    }

    pub fn relative(value: i32) -> Self {
        Self {
            value,
            relative: true,
        }
    }
}

#[derive(Clone, Copy)]
enum Table {
    Pattern,
    Kind,
    Category,
}

/// Scoring tables contributed by one plugin (or the core, or a global
/// override source): independent pattern, kind, and category tables.
#[derive(Clone, Debug, Default)]
pub struct RankSource {
    plugin_id: String,
    patterns: BTreeMap<String, RankValue>,
    kinds: BTreeMap<String, RankValue>,
    categories: BTreeMap<String, RankValue>,
    reported_patterns: BTreeSet<String>,
}

impl RankSource {
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            ..Self::default()
        }
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn set_pattern_rank(&mut self, key: impl Into<String>, value: RankValue) -> &mut Self {
        self.patterns.insert(key.into(), value);
        self
    }

    pub fn set_kind_rank(&mut self, kind: impl Into<String>, value: RankValue) -> &mut Self {
        self.kinds.insert(kind.into(), value);
        self
    }

    pub fn set_category_rank(&mut self, category: impl Into<String>, value: RankValue) -> &mut Self {
        self.categories.insert(category.into(), value);
        self
    }

    /// Declare that the owning plugin can produce `key`; consulted when a
    /// finding's owning detector is unknown.
    pub fn declare_pattern(&mut self, key: impl Into<String>) -> &mut Self {
        self.reported_patterns.insert(key.into());
        self
    }

    pub fn reports_pattern(&self, key: &str) -> bool {
        self.reported_patterns.contains(key)
    }

    /// Parse the text rank-source format: one `<value> <kind> <key>` rule
    /// per non-blank, non-comment line, `key` optionally a comma-separated
    /// target list. Malformed lines are logged and skipped.
    pub fn parse(plugin_id: impl Into<String>, text: &str) -> Self {
        let mut source = Self::new(plugin_id);
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Err(reason) = source.parse_line(line) {
                warn!(
                    "skipping malformed rank rule at line {}: {reason}: {line}",
                    index + 1
                );
            }
        }
        source
    }

    fn parse_line(&mut self, line: &str) -> Result<(), String> {
        let mut tokens = line.split_whitespace();
        let value = tokens.next().ok_or("missing value")?;
        let kind = tokens.next().ok_or("missing table kind")?;
        let keys = tokens.collect::<String>();
        if keys.is_empty() {
            return Err("missing target key".to_string());
        }

        let value = parse_rank_value(value)?;
        let table = match kind {
            "BugPattern" => Table::Pattern,
            "BugKind" => Table::Kind,
            "Category" => Table::Category,
            other => return Err(format!("unrecognized table kind {other}")),
        };
        for key in keys.split(',').filter(|key| !key.is_empty()) {
            match table {
                Table::Pattern => self.patterns.insert(key.to_string(), value),
                Table::Kind => self.kinds.insert(key.to_string(), value),
                Table::Category => self.categories.insert(key.to_string(), value),
            };
        }
        Ok(())
    }

    fn entry(&self, table: Table, key: &str) -> Option<RankValue> {
        match table {
            Table::Pattern => self.patterns.get(key).copied(),
            Table::Kind => self.kinds.get(key).copied(),
            Table::Category => self.categories.get(key).copied(),
        }
    }
}

/// A bare non-negative integer is an absolute rank; an explicit sign marks a
/// relative delta.
fn parse_rank_value(token: &str) -> Result<RankValue, String> {
    let relative = token.starts_with('+') || token.starts_with('-');
    let value = token
        .parse::<i32>()
        .map_err(|err| format!("invalid rank value {token}: {err}"))?;
    Ok(RankValue { value, relative })
}

/// The full set of rank sources installed for one analysis session: the
/// optional global override source, plugin sources in registration order,
/// and the core source. Shared read-only across workers.
#[derive(Debug)]
pub struct RankSourceSet {
    global: Option<RankSource>,
    plugins: Vec<RankSource>,
    core: RankSource,
}

impl RankSourceSet {
    pub fn new(core: RankSource) -> Self {
        Self {
            global: None,
            plugins: Vec::new(),
            core,
        }
    }

    /// Install the global override source, consulted before every other
    /// source. Its construction is a configuration concern.
    pub fn set_global_override(&mut self, source: RankSource) {
        self.global = Some(source);
    }

    pub fn add_plugin_source(&mut self, source: RankSource) {
        self.plugins.push(source);
    }

    fn chain_for(&self, pattern_key: &str, plugin: Option<&str>) -> Vec<&RankSource> {
        let mut chain = Vec::new();
        if let Some(global) = &self.global {
            chain.push(global);
        }
        match plugin {
            Some(plugin_id) => {
                if plugin_id != self.core.plugin_id
                    && let Some(source) =
                        self.plugins.iter().find(|s| s.plugin_id == plugin_id)
                {
                    chain.push(source);
                }
            }
            None => {
                for source in &self.plugins {
                    if source.reports_pattern(pattern_key) {
                        chain.push(source);
                    }
                }
            }
        }
        chain.push(&self.core);
        chain
    }
}

/// Priority contribution added on top of the pattern-rank.
fn priority_adjustment(priority: i32) -> i32 {
    match priority {
        HIGHEST_PRIORITY => 0,
        NORMAL_PRIORITY => 2,
        LOW_PRIORITY => 5,
        _ => 10,
    }
}

/// Session-scoped rank computation with a per-pattern cache.
///
/// The cache holds the pattern-only partial result, before the priority
/// adjustment; it is owned by one analysis worker and never shared.
pub struct RankScorer {
    sources: Arc<RankSourceSet>,
    registry: Arc<PatternRegistry>,
    cache: HashMap<String, i32>,
}

impl RankScorer {
    pub fn new(sources: Arc<RankSourceSet>, registry: Arc<PatternRegistry>) -> Self {
        Self {
            sources,
            registry,
            cache: HashMap::new(),
        }
    }

    /// Rank a finding: 1..=20 is visible, anything above is hidden.
    pub fn rank(&mut self, pattern_key: &str, priority: i32, plugin: Option<&str>) -> i32 {
        let pattern_rank = match self.cache.get(pattern_key) {
            Some(rank) => *rank,
            None => {
                let rank = self.pattern_rank(pattern_key, plugin);
                self.cache.insert(pattern_key.to_string(), rank);
                rank
            }
        };
        let sum = pattern_rank + priority_adjustment(priority);
        if pattern_rank > VISIBLE_RANK_MAX {
            sum
        } else {
            sum.clamp(1, VISIBLE_RANK_MAX)
        }
    }

    /// Walk the source chain three times (pattern, kind, category),
    /// accumulating relative deltas until an absolute entry closes the sum.
    fn pattern_rank(&self, pattern_key: &str, plugin: Option<&str>) -> i32 {
        let descriptor = self.registry.lookup(pattern_key);
        let chain = self.sources.chain_for(pattern_key, plugin);
        let passes = [
            (Table::Pattern, pattern_key),
            (Table::Kind, descriptor.kind.as_str()),
            (Table::Category, descriptor.category.as_str()),
        ];
        let mut total = 0;
        for (table, key) in passes {
            for source in &chain {
                if let Some(entry) = source.entry(table, key) {
                    total += entry.value;
                    if !entry.relative {
                        return total;
                    }
                }
            }
        }
        // Reached only when no source binds an absolute value; a well-formed
        // core source binds every category.
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{EXPERIMENTAL_PRIORITY, HIGH_PRIORITY};
    use crate::registry::PatternDescriptor;

    fn registry() -> Arc<PatternRegistry> {
        Arc::new(PatternRegistry::with_patterns([PatternDescriptor::new(
            "P",
            "X",
            "PK",
        )]))
    }

    fn core_with_category_x() -> RankSource {
        let mut core = RankSource::new(CORE_PLUGIN_ID);
        core.set_category_rank("X", RankValue::absolute(5));
        core
    }

    #[test]
    fn plugin_delta_stacks_on_core_category() {
        let mut sources = RankSourceSet::new(core_with_category_x());
        let mut plugin = RankSource::new("acme");
        plugin.set_pattern_rank("P", RankValue::relative(2));
        sources.add_plugin_source(plugin);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        assert_eq!(scorer.rank("P", HIGH_PRIORITY, Some("acme")), 7);
        assert_eq!(scorer.rank("P", LOW_PRIORITY, Some("acme")), 12);
    }

    #[test]
    fn absolute_pattern_entry_short_circuits() {
        let mut sources = RankSourceSet::new(core_with_category_x());
        let mut plugin = RankSource::new("acme");
        plugin.set_pattern_rank("P", RankValue::absolute(3));
        sources.add_plugin_source(plugin);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        // Core category never consulted once the plugin binds an absolute.
        assert_eq!(scorer.rank("P", HIGH_PRIORITY, Some("acme")), 3);
    }

    #[test]
    fn unknown_plugin_consults_sources_declaring_the_pattern() {
        let mut sources = RankSourceSet::new(core_with_category_x());
        let mut plugin = RankSource::new("acme");
        plugin.set_pattern_rank("P", RankValue::relative(2));
        plugin.declare_pattern("P");
        let mut silent = RankSource::new("other");
        silent.set_pattern_rank("P", RankValue::relative(100));
        sources.add_plugin_source(plugin);
        sources.add_plugin_source(silent);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        assert_eq!(scorer.rank("P", HIGH_PRIORITY, None), 7);
    }

    #[test]
    fn global_override_is_consulted_first() {
        let mut sources = RankSourceSet::new(core_with_category_x());
        let mut global = RankSource::new("global");
        global.set_pattern_rank("P", RankValue::absolute(19));
        sources.set_global_override(global);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        assert_eq!(scorer.rank("P", HIGH_PRIORITY, Some("acme")), 19);
    }

    #[test]
    fn hidden_pattern_rank_is_returned_unclamped() {
        let mut core = RankSource::new(CORE_PLUGIN_ID);
        core.set_category_rank("X", RankValue::absolute(25));
        let sources = RankSourceSet::new(core);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        assert_eq!(scorer.rank("P", LOW_PRIORITY, None), 30);
    }

    #[test]
    fn visible_rank_is_clamped_to_twenty() {
        let mut core = RankSource::new(CORE_PLUGIN_ID);
        core.set_category_rank("X", RankValue::absolute(18));
        let sources = RankSourceSet::new(core);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        assert_eq!(scorer.rank("P", EXPERIMENTAL_PRIORITY, None), VISIBLE_RANK_MAX);
    }

    #[test]
    fn parser_loads_rules_and_skips_malformed_lines() {
        let text = "\
# core ranking
5 Category X
+2 BugPattern P,Q

not-a-value Category Y
3 Unknown Z
";
        let source = RankSource::parse(CORE_PLUGIN_ID, text);
        assert_eq!(
            source.entry(Table::Category, "X"),
            Some(RankValue::absolute(5))
        );
        assert_eq!(
            source.entry(Table::Pattern, "P"),
            Some(RankValue::relative(2))
        );
        assert_eq!(
            source.entry(Table::Pattern, "Q"),
            Some(RankValue::relative(2))
        );
        assert_eq!(source.entry(Table::Category, "Y"), None);
        assert_eq!(source.entry(Table::Kind, "Z"), None);
    }

    #[test]
    fn explicit_sign_marks_a_relative_value() {
        assert!(parse_rank_value("5").is_ok_and(|v| !v.relative));
        assert!(parse_rank_value("+5").is_ok_and(|v| v.relative));
        assert!(parse_rank_value("-5").is_ok_and(|v| v.relative && v.value == -5));
    }

    #[test]
    fn rank_cache_is_stable_within_a_session() {
        let mut sources = RankSourceSet::new(core_with_category_x());
        let mut plugin = RankSource::new("acme");
        plugin.set_pattern_rank("P", RankValue::relative(2));
        plugin.declare_pattern("P");
        sources.add_plugin_source(plugin);

        let mut scorer = RankScorer::new(Arc::new(sources), registry());
        let first = scorer.rank("P", HIGH_PRIORITY, None);
        // Cached pattern-rank is reused even if the plugin hint changes.
        let second = scorer.rank("P", HIGH_PRIORITY, Some("acme"));
        assert_eq!(first, second);
    }
}
