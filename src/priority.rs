use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result, bail};

use crate::finding::{Finding, clamp_priority};
use crate::registry::PatternRegistry;

/// Configured priority adjustment: an absolute override or a relative delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    Absolute(i32),
    Relative(i32),
}

impl Adjustment {
    /// Parse an adjustment expression: `raise` (−1), `lower` (+1),
    /// `suppress` (+100, saturating at the Ignore bound so threshold
    /// filters drop the finding), an explicitly signed delta, or a bare
    /// unsigned absolute value. Malformed expressions are configuration
    /// errors and fail fast.
    pub fn parse(expression: &str) -> Result<Self> {
        match expression {
            "raise" => Ok(Self::Relative(-1)),
            "lower" => Ok(Self::Relative(1)),
            "suppress" => Ok(Self::Relative(100)),
            signed if signed.starts_with('+') || signed.starts_with('-') => {
                let delta = signed
                    .parse::<i32>()
                    .with_context(|| format!("invalid priority delta {signed:?}"))?;
                Ok(Self::Relative(delta))
            }
            absolute => {
                let value = absolute
                    .parse::<u32>()
                    .with_context(|| format!("invalid priority adjustment {absolute:?}"))?;
                Ok(Self::Absolute(value as i32))
            }
        }
    }

    fn apply(self, priority: i32) -> i32 {
        match self {
            Self::Absolute(value) => value,
            Self::Relative(delta) => priority + delta,
        }
    }
}

/// Per-detector and per-pattern priority overrides, resolved and validated
/// at configuration-load time.
#[derive(Debug, Default)]
pub struct PriorityOverrides {
    by_detector: HashMap<String, Adjustment>,
    by_pattern: HashMap<String, Adjustment>,
}

impl PriorityOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `target=expression` pairs. A target must resolve to a known
    /// detector or a registered pattern key; anything else fails fast.
    pub fn load<'a>(
        entries: impl IntoIterator<Item = (&'a str, &'a str)>,
        known_detectors: &BTreeSet<String>,
        registry: &PatternRegistry,
    ) -> Result<Self> {
        let mut overrides = Self::new();
        for (target, expression) in entries {
            let adjustment = Adjustment::parse(expression)
                .with_context(|| format!("priority override for {target}"))?;
            if known_detectors.contains(target) {
                overrides.by_detector.insert(target.to_string(), adjustment);
            } else if registry.is_known(target) {
                overrides.by_pattern.insert(target.to_string(), adjustment);
            } else {
                bail!("priority override target {target} is neither a detector nor a pattern");
            }
        }
        Ok(overrides)
    }

    pub fn is_empty(&self) -> bool {
        self.by_detector.is_empty() && self.by_pattern.is_empty()
    }

    /// Apply configured adjustments to a finding.
    ///
    /// The detector-level adjustment fires first, the pattern-level one on
    /// top of it; both may fire. Returns the borrowed input when the final
    /// value equals the original, otherwise a deep copy with the new
    /// priority (annotations and properties cloned, never shared).
    pub fn apply<'a>(&self, finding: &'a Finding, detector: Option<&str>) -> Cow<'a, Finding> {
        let original = finding.priority();
        let mut adjusted = original;
        if let Some(detector) = detector
            && let Some(adjustment) = self.by_detector.get(detector)
        {
            adjusted = adjustment.apply(adjusted);
        }
        if let Some(adjustment) = self.by_pattern.get(finding.pattern()) {
            adjusted = adjustment.apply(adjusted);
        }
        let adjusted = clamp_priority(adjusted);
        if adjusted == original {
            Cow::Borrowed(finding)
        } else {
            let mut copy = finding.clone();
            copy.set_priority(adjusted);
            Cow::Owned(copy)
        }
    }
}
