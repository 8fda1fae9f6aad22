//! Issue identity, accumulation, and ranking pipeline for bytecode-level
//! static-analysis findings.
//!
//! Detectors (external) construct [`finding::Finding`]s and feed them to a
//! [`accumulator::FindingAccumulator`], which merges occurrences of the
//! same logical issue across source locations. Surviving findings pass
//! through [`priority::PriorityOverrides`], get a visibility rank from
//! [`rank::RankScorer`], are filtered by
//! [`suppression::SuppressionMatcher`], and end up at a
//! [`sink::FindingSink`] for reporting. [`history::Baseline`] and
//! [`fuzzy::FuzzyComparator`] track finding lifecycles between analysis
//! runs.

pub mod accumulator;
pub mod annotations;
pub mod finding;
pub mod fuzzy;
pub mod history;
pub mod logging;
pub mod priority;
pub mod rank;
pub mod registry;
pub mod session;
pub mod sink;
pub mod suppression;

pub use accumulator::{FindingAccumulator, PcIndexedAccumulator};
pub use annotations::Annotation;
pub use finding::Finding;
pub use fuzzy::FuzzyComparator;
pub use history::Baseline;
pub use priority::PriorityOverrides;
pub use rank::{RankScorer, RankSource, RankSourceSet, VISIBLE_RANK_MAX};
pub use registry::{PatternDescriptor, PatternRegistry};
pub use session::AnalysisSession;
pub use sink::{CollectingSink, FindingSink};
pub use suppression::{MatchMode, SuppressionMatcher, SuppressionRule, SuppressionScope};
