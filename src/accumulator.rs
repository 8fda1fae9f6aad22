use std::collections::{BTreeMap, HashMap, HashSet};

use crate::annotations::{Annotation, SourceLineAnnotation, roles};
use crate::finding::{Finding, LOW_PRIORITY, NORMAL_PRIORITY};
use crate::sink::FindingSink;

/// Structural bucket key for accumulation.
///
/// Computed from a priority-normalized view of the finding, never by
/// mutating the finding itself: everything identical except the original
/// priority buckets together.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct GroupKey {
    pattern: String,
    annotations: Vec<Annotation>,
}

impl GroupKey {
    fn of(finding: &Finding) -> Self {
        Self {
            pattern: finding.pattern().to_string(),
            annotations: finding.annotations().to_vec(),
        }
    }
}

/// State tracked for one merged group of occurrences.
#[derive(Debug)]
struct AccumulationRecord {
    finding: Finding,
    /// Best (numerically smallest) original priority seen so far.
    priority: i32,
    primary: SourceLineAnnotation,
    /// All locations in insertion order; line-level dedup happens at flush.
    locations: Vec<SourceLineAnnotation>,
}

#[derive(Debug)]
enum LastOp {
    None,
    Created(GroupKey),
    Appended(GroupKey),
}

/// Merges raw findings that describe the same logical issue observed at
/// several source locations.
///
/// Session-scoped and single-threaded; workers processing disjoint classes
/// each own their own accumulator.
pub struct FindingAccumulator<S: FindingSink> {
    sink: S,
    merge: bool,
    order: Vec<GroupKey>,
    groups: HashMap<GroupKey, AccumulationRecord>,
    hashes: HashMap<String, GroupKey>,
    last: LastOp,
}

impl<S: FindingSink> FindingAccumulator<S> {
    pub fn new(sink: S, merge: bool) -> Self {
        Self {
            sink,
            merge,
            order: Vec::new(),
            groups: HashMap::new(),
            hashes: HashMap::new(),
            last: LastOp::None,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Record that `finding` was observed at `location`.
    ///
    /// With merging disabled the location is attached and the finding is
    /// forwarded unmodified.
    pub fn accumulate(&mut self, mut finding: Finding, location: SourceLineAnnotation) {
        if !self.merge {
            finding.add_source_line(location);
            self.sink.deliver(finding);
            return;
        }

        // Original priority, captured before any normalized view is formed.
        let priority = finding.priority();
        let key = GroupKey::of(&finding);

        if let Some(record) = self.groups.get_mut(&key) {
            if record.priority > priority {
                // A strictly more severe occurrence arrived. Flush the
                // tracked group first when it sits at the Low tier or worse,
                // so its locations are not absorbed under-reported.
                if record.priority >= LOW_PRIORITY {
                    let mut flushed = record.finding.clone();
                    flushed.set_priority(record.priority);
                    attach_locations(&mut flushed, &record.primary, &record.locations);
                    self.sink.deliver(flushed);
                    record.locations.clear();
                }
                record.priority = priority;
                record.primary = location.clone();
            } else if priority > LOW_PRIORITY && priority > record.priority {
                // A much less severe occurrence never joins the group.
                let mut standalone = finding;
                standalone.set_priority(priority);
                standalone.add_source_line(location);
                self.sink.deliver(standalone);
                self.last = LastOp::None;
                return;
            }
            record.locations.push(location);
            self.last = LastOp::Appended(key);
            return;
        }

        // Unknown structural key; a different structural key with the same
        // content hash is the same semantic issue in conflicting shape.
        let hash = finding.content_hash().to_string();
        if let Some(conflicting) = self.hashes.get(&hash).cloned() {
            let existing = &self.groups[&conflicting];
            if existing.priority <= priority {
                // The registered finding is at least as severe; drop this
                // occurrence entirely.
                self.last = LastOp::None;
                return;
            }
            self.groups.remove(&conflicting);
            self.order.retain(|key| *key != conflicting);
            self.hashes.remove(&hash);
        }

        let mut normalized = finding;
        normalized.set_priority(NORMAL_PRIORITY);
        self.groups.insert(
            key.clone(),
            AccumulationRecord {
                finding: normalized,
                priority,
                primary: location,
                locations: Vec::new(),
            },
        );
        self.order.push(key.clone());
        self.hashes.insert(hash, key.clone());
        self.last = LastOp::Created(key);
    }

    /// Undo the most recent `accumulate` call.
    pub fn forget_most_recent(&mut self) {
        match std::mem::replace(&mut self.last, LastOp::None) {
            LastOp::None => {}
            LastOp::Created(key) => {
                self.groups.remove(&key);
                self.order.retain(|k| *k != key);
                self.hashes.retain(|_, registered| *registered != key);
            }
            LastOp::Appended(key) => {
                if let Some(record) = self.groups.get_mut(&key) {
                    record.locations.pop();
                }
            }
        }
    }

    /// Emit every tracked group exactly once and clear all state.
    pub fn flush_all(&mut self) {
        let order = std::mem::take(&mut self.order);
        for key in order {
            if let Some(record) = self.groups.remove(&key) {
                let mut finding = record.finding;
                finding.set_priority(record.priority);
                attach_locations(&mut finding, &record.primary, &record.locations);
                self.sink.deliver(finding);
            }
        }
        self.groups.clear();
        self.hashes.clear();
        self.last = LastOp::None;
    }
}

/// Attach the primary location, then the remaining locations in insertion
/// order, skipping any whose starting line was already added and tagging
/// extras as further instances.
fn attach_locations(
    finding: &mut Finding,
    primary: &SourceLineAnnotation,
    locations: &[SourceLineAnnotation],
) {
    let mut seen_lines = HashSet::new();
    seen_lines.insert(primary.start_line);
    finding.add_source_line(primary.clone());
    for location in locations {
        if seen_lines.insert(location.start_line) {
            let mut extra = location.clone();
            extra.role = roles::SOURCE_LINE_ANOTHER_INSTANCE.to_string();
            finding.add_source_line(extra);
        }
    }
}

/// Single-slot accumulator keyed by program counter.
///
/// Used by detectors that must retroactively attach a field descriptor to a
/// finding recorded at the previous bytecode offset once the following
/// field-access instruction is seen. No priority-based merging; flushes
/// unconditionally.
#[derive(Debug, Default)]
pub struct PcIndexedAccumulator {
    slots: BTreeMap<u32, Finding>,
}

impl PcIndexedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding at a bytecode offset, replacing any previous slot.
    pub fn record(&mut self, pc: u32, finding: Finding) {
        self.slots.insert(pc, finding);
    }

    pub fn finding_at_mut(&mut self, pc: u32) -> Option<&mut Finding> {
        self.slots.get_mut(&pc)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Deliver every slot in offset order and clear state.
    pub fn flush_all(&mut self, sink: &mut dyn FindingSink) {
        for (_, finding) in std::mem::take(&mut self.slots) {
            sink.deliver(finding);
        }
    }
}
