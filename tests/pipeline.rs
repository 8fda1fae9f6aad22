use std::collections::BTreeSet;
use std::sync::Arc;

use bugledger::annotations::SourceLineAnnotation;
use bugledger::finding::{HIGH_PRIORITY, LOW_PRIORITY, NORMAL_PRIORITY};
use bugledger::rank::{CORE_PLUGIN_ID, RankSource, RankValue};
use bugledger::{
    AnalysisSession, CollectingSink, Finding, FuzzyComparator, MatchMode, PatternDescriptor,
    PatternRegistry, PriorityOverrides, SuppressionRule, SuppressionScope,
};

fn registry() -> Arc<PatternRegistry> {
    Arc::new(PatternRegistry::with_patterns([
        PatternDescriptor::new("SIC_INNER_CLASS", "PERFORMANCE", "SIC"),
        PatternDescriptor::new("NP_NULL_ON_SOME_PATH", "CORRECTNESS", "NP"),
        PatternDescriptor::new("URF_UNREAD_FIELD", "PERFORMANCE", "URF"),
    ]))
}

fn session() -> AnalysisSession {
    let mut core = RankSource::new(CORE_PLUGIN_ID);
    core.set_category_rank("CORRECTNESS", RankValue::absolute(5));
    core.set_category_rank("PERFORMANCE", RankValue::absolute(12));
    let sources = bugledger::RankSourceSet::new(core);
    AnalysisSession::new(registry(), Arc::new(sources))
}

fn null_deref(class: &str, line: i32, priority: i32) -> Finding {
    let mut finding = Finding::new("NP_NULL_ON_SOME_PATH", priority);
    finding
        .add_class(class)
        .add_method(class, "run", "()V")
        .add_source_line(SourceLineAnnotation::new(class, line, line));
    finding
}

#[test]
fn full_pipeline_accumulates_overrides_ranks_and_suppresses() {
    let session = session();
    let registry = Arc::clone(session.registry());

    // Detectors observe the same unread field at three locations, plus one
    // null dereference and one inner-class issue.
    let mut accumulator = session.accumulator(CollectingSink::new(), true);
    let mut unread = Finding::new("URF_UNREAD_FIELD", NORMAL_PRIORITY);
    unread
        .add_class("com.example.App")
        .add_field("com.example.App", "unused", "I");
    for line in [11, 17, 42] {
        accumulator.accumulate(
            unread.clone(),
            SourceLineAnnotation::new("com.example.App", line, line),
        );
    }
    accumulator.accumulate(
        null_deref("com.example.App", 99, NORMAL_PRIORITY),
        SourceLineAnnotation::new("com.example.App", 99, 99),
    );
    let mut inner = Finding::new("SIC_INNER_CLASS", LOW_PRIORITY);
    inner.add_class("com.example.Widget$Listener");
    accumulator.accumulate(
        inner,
        SourceLineAnnotation::new("com.example.Widget$Listener", 7, 7),
    );
    accumulator.flush_all();

    let merged = accumulator.into_sink().into_findings();
    assert_eq!(merged.len(), 3);

    // Configuration raises every null-dereference finding.
    let detectors: BTreeSet<String> = ["FindNullDeref".to_string()].into_iter().collect();
    let overrides = PriorityOverrides::load(
        [("NP_NULL_ON_SOME_PATH", "raise")],
        &detectors,
        &registry,
    )
    .expect("load overrides");

    // Widget-scoped suppression hides the inner-class finding.
    let mut suppressions = session.suppression_matcher([
        SuppressionRule::new(
            Some("SIC_"),
            MatchMode::Default,
            SuppressionScope::Class("com.example.Widget".to_string()),
        )
        .expect("rule"),
    ]);

    let mut scorer = session.scorer();
    let mut reported = Vec::new();
    for finding in &merged {
        let adjusted = overrides.apply(finding, None).into_owned();
        if suppressions.matches(&adjusted, &registry) {
            continue;
        }
        let rank = scorer.rank(adjusted.pattern(), adjusted.priority(), None);
        reported.push((adjusted, rank));
    }

    assert_eq!(reported.len(), 2);
    assert_eq!(suppressions.match_count(), 1);

    let (unread, unread_rank) = reported
        .iter()
        .find(|(f, _)| f.pattern() == "URF_UNREAD_FIELD")
        .expect("unread field reported");
    let unread_lines: Vec<i32> = unread
        .annotations()
        .iter()
        .filter_map(|a| match a {
            bugledger::Annotation::SourceLine(line) => Some(line.start_line),
            _ => None,
        })
        .collect();
    assert_eq!(unread_lines, vec![11, 17, 42]);
    assert_eq!(*unread_rank, 14); // 12 + NORMAL adjustment

    let (deref, deref_rank) = reported
        .iter()
        .find(|(f, _)| f.pattern() == "NP_NULL_ON_SOME_PATH")
        .expect("null deref reported");
    assert_eq!(deref.priority(), HIGH_PRIORITY);
    assert_eq!(*deref_rank, 5); // 5 + HIGH adjustment
}

#[test]
fn lifecycle_tracking_across_two_runs() {
    let session = session();
    let registry = Arc::clone(session.registry());
    let comparator = FuzzyComparator::new();

    let previous = vec![
        null_deref("com.example.App", 10, NORMAL_PRIORITY),
        null_deref("com.example.Legacy", 33, NORMAL_PRIORITY),
    ];
    let dir = tempfile::tempdir().expect("baseline dir");
    let path = dir.path().join("baseline.json");
    bugledger::history::write_baseline(&path, &previous, 7).expect("write baseline");

    // Next version: App's issue drifted four lines, Legacy's was fixed,
    // and Fresh gained a new one.
    let mut current = vec![
        null_deref("com.example.App", 14, NORMAL_PRIORITY),
        null_deref("com.example.Fresh", 3, NORMAL_PRIORITY),
    ];
    let baseline = bugledger::history::load_baseline(&path)
        .expect("load baseline")
        .expect("baseline present");
    let fixed = baseline.reconcile(&mut current, &comparator, &registry, 8);

    assert!(!current[0].introduced_by_change());
    assert!(current[0].is_still_present());
    assert!(current[1].introduced_by_change());
    assert_eq!(current[1].first_version(), 8);

    assert_eq!(fixed.len(), 1);
    assert!(fixed[0].removed_by_change());
    assert_eq!(fixed[0].last_version(), 7);
}

#[test]
fn unused_suppressions_are_reported() {
    let session = session();
    let registry = Arc::clone(session.registry());

    let mut suppressions = session.suppression_matcher([
        SuppressionRule::new(
            Some("NP_"),
            MatchMode::Default,
            SuppressionScope::Class("com.example.App".to_string()),
        )
        .expect("rule"),
        SuppressionRule::new(
            Some("UWF_"),
            MatchMode::Default,
            SuppressionScope::Package("com.example".to_string()),
        )
        .expect("rule"),
    ]);

    let finding = null_deref("com.example.App", 10, NORMAL_PRIORITY);
    assert!(suppressions.matches(&finding, &registry));

    let unused: Vec<String> = suppressions
        .unused_rules()
        .map(|rule| rule.to_string())
        .collect();
    assert_eq!(unused, vec!["UWF_ in package com.example".to_string()]);
}
