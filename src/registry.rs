use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use tracing::warn;

/// Category and kind assigned to pattern keys the registry does not know.
pub const UNKNOWN: &str = "UNKNOWN";

/// Registry-side description of a bug pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternDescriptor {
    pub key: String,
    pub category: String,
    /// Short code ("kind") shared by a family of related pattern keys.
    pub kind: String,
    /// Static priority adjustment applied by detectors that honor it.
    pub priority_adjustment: i32,
}

impl PatternDescriptor {
    pub fn new(
        key: impl Into<String>,
        category: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            category: category.into(),
            kind: kind.into(),
            priority_adjustment: 0,
        }
    }

    pub fn with_priority_adjustment(mut self, adjustment: i32) -> Self {
        self.priority_adjustment = adjustment;
        self
    }
}

/// Pattern-key lookup boundary shared read-only across analysis workers.
///
/// Unknown keys are tolerated: they are logged once per key and resolved to
/// an UNKNOWN placeholder so ranking and suppression can proceed.
#[derive(Debug, Default)]
pub struct PatternRegistry {
    patterns: HashMap<String, PatternDescriptor>,
    unknown_logged: Mutex<HashSet<String>>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_patterns(patterns: impl IntoIterator<Item = PatternDescriptor>) -> Self {
        let mut registry = Self::new();
        for pattern in patterns {
            registry.register(pattern);
        }
        registry
    }

    pub fn register(&mut self, descriptor: PatternDescriptor) {
        self.patterns.insert(descriptor.key.clone(), descriptor);
    }

    pub fn is_known(&self, key: &str) -> bool {
        self.patterns.contains_key(key)
    }

    /// Resolve a pattern key, substituting a placeholder for unknown keys.
    pub fn lookup(&self, key: &str) -> PatternDescriptor {
        if let Some(descriptor) = self.patterns.get(key) {
            return descriptor.clone();
        }
        let mut logged = self
            .unknown_logged
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if logged.insert(key.to_string()) {
            warn!("unknown bug pattern {key}; treating as {UNKNOWN}");
        }
        PatternDescriptor::new(key, UNKNOWN, UNKNOWN)
    }
}
