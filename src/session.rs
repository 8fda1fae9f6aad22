use std::sync::Arc;

use crate::accumulator::FindingAccumulator;
use crate::rank::{RankScorer, RankSourceSet};
use crate::registry::PatternRegistry;
use crate::sink::FindingSink;
use crate::suppression::{SuppressionMatcher, SuppressionRule};

/// Shared read-only state of one analysis session.
///
/// The pattern registry and rank-source tables may be shared across
/// workers; everything with mutable state (scorer cache, accumulation map,
/// suppression usage tracking) is handed out as a per-worker instance and
/// must stay confined to the worker that owns it.
#[derive(Clone)]
pub struct AnalysisSession {
    registry: Arc<PatternRegistry>,
    rank_sources: Arc<RankSourceSet>,
}

impl AnalysisSession {
    pub fn new(registry: Arc<PatternRegistry>, rank_sources: Arc<RankSourceSet>) -> Self {
        Self {
            registry,
            rank_sources,
        }
    }

    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    pub fn scorer(&self) -> RankScorer {
        RankScorer::new(Arc::clone(&self.rank_sources), Arc::clone(&self.registry))
    }

    pub fn accumulator<S: FindingSink>(&self, sink: S, merge: bool) -> FindingAccumulator<S> {
        FindingAccumulator::new(sink, merge)
    }

    pub fn suppression_matcher(
        &self,
        rules: impl IntoIterator<Item = SuppressionRule>,
    ) -> SuppressionMatcher {
        let mut matcher = SuppressionMatcher::new();
        for rule in rules {
            matcher.add_rule(rule);
        }
        matcher
    }
}
