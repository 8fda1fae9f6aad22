use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::annotations::Annotation;
use crate::finding::Finding;
use crate::fuzzy::FuzzyComparator;
use crate::registry::PatternRegistry;

/// Stored snapshot of a completed analysis run, used to track finding
/// lifecycles across versions of an evolving codebase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Baseline {
    version: u32,
    sequence: i64,
    findings: Vec<BaselineEntry>,
}

/// Canonicalized finding snapshot stored in a baseline file.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
struct BaselineEntry {
    pattern: String,
    content_hash: String,
    first_version: i64,
    annotations: Vec<Annotation>,
}

impl Baseline {
    /// Snapshot a finished run. `sequence` is the version number of the
    /// analyzed codebase.
    pub fn capture(findings: &[Finding], sequence: i64) -> Self {
        let mut entries: Vec<BaselineEntry> = findings
            .iter()
            .map(|finding| BaselineEntry {
                pattern: finding.pattern().to_string(),
                content_hash: finding.content_hash().to_string(),
                first_version: finding.first_version(),
                annotations: finding.annotations().to_vec(),
            })
            .collect();
        entries.sort();
        entries.dedup();
        Self {
            version: 1,
            sequence,
            findings: entries,
        }
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Update lifecycle fields of the current run against this baseline.
    ///
    /// A current finding matched by content hash, or approximately by the
    /// comparator, inherits the baseline entry's first version and records
    /// the entry's hash as its previous-run hash. Unmatched current
    /// findings are new in `current_version`. Baseline entries with no
    /// current counterpart are returned as fixed findings.
    pub fn reconcile(
        &self,
        current: &mut [Finding],
        comparator: &FuzzyComparator,
        registry: &PatternRegistry,
        current_version: i64,
    ) -> Vec<Finding> {
        let mut consumed = vec![false; self.findings.len()];

        for finding in current.iter_mut() {
            let matched = self
                .match_by_hash(finding, &consumed)
                .or_else(|| self.match_fuzzily(finding, &consumed, comparator, registry));
            match matched {
                Some(index) => {
                    consumed[index] = true;
                    let entry = &self.findings[index];
                    finding.set_first_version(entry.first_version);
                    finding.set_previous_hash(entry.content_hash.clone());
                }
                None => {
                    finding.set_first_version(current_version);
                    finding.set_introduced_by_change(true);
                }
            }
        }

        let mut fixed = Vec::new();
        for (index, entry) in self.findings.iter().enumerate() {
            if consumed[index] {
                continue;
            }
            let mut finding = entry.reconstruct();
            finding.set_first_version(entry.first_version.max(0));
            finding.set_last_version(self.sequence.max(entry.first_version));
            finding.set_removed_by_change(true);
            fixed.push(finding);
        }
        fixed
    }

    fn match_by_hash(&self, finding: &Finding, consumed: &[bool]) -> Option<usize> {
        self.findings
            .iter()
            .enumerate()
            .find(|(index, entry)| {
                !consumed[*index] && entry.content_hash == finding.content_hash()
            })
            .map(|(index, _)| index)
    }

    fn match_fuzzily(
        &self,
        finding: &Finding,
        consumed: &[bool],
        comparator: &FuzzyComparator,
        registry: &PatternRegistry,
    ) -> Option<usize> {
        self.findings
            .iter()
            .enumerate()
            .find(|(index, entry)| {
                !consumed[*index]
                    && comparator.same_issue(finding, &entry.reconstruct(), registry)
            })
            .map(|(index, _)| index)
    }
}

impl BaselineEntry {
    fn reconstruct(&self) -> Finding {
        let mut finding = Finding::new(&self.pattern, crate::finding::NORMAL_PRIORITY);
        for annotation in &self.annotations {
            finding.add_annotation(annotation.clone());
        }
        finding
    }
}

pub fn write_baseline(path: &Path, findings: &[Finding], sequence: i64) -> Result<()> {
    let baseline = Baseline::capture(findings, sequence);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create baseline directory {}", parent.display()))?;
    }
    let mut file = File::create(path)
        .with_context(|| format!("failed to create baseline file {}", path.display()))?;

    // Compact JSON with one finding per line for readable diffs.
    write!(
        file,
        "{{\"version\":{},\"sequence\":{},\"findings\":[",
        baseline.version, baseline.sequence
    )
    .context("failed to write baseline header")?;
    for (index, finding) in baseline.findings.iter().enumerate() {
        file.write_all(b"\n")
            .context("failed to write baseline newline")?;
        serde_json::to_writer(&mut file, finding).context("failed to serialize baseline entry")?;
        if index + 1 < baseline.findings.len() {
            file.write_all(b",")
                .context("failed to write baseline separator")?;
        }
    }
    if !baseline.findings.is_empty() {
        file.write_all(b"\n")
            .context("failed to write baseline trailing newline")?;
    }
    file.write_all(b"]}\n")
        .context("failed to finalize baseline file")?;
    Ok(())
}

pub fn load_baseline(path: &Path) -> Result<Option<Baseline>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read baseline file {}", path.display()));
        }
    };
    let mut baseline: Baseline =
        serde_json::from_str(&content).context("failed to parse baseline file")?;
    baseline.findings.sort();
    baseline.findings.dedup();
    Ok(Some(baseline))
}
