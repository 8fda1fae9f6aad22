use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use sha2::{Digest, Sha256};

use crate::annotations::{
    Annotation, ClassAnnotation, FieldAnnotation, IntAnnotation, LocalVariableAnnotation,
    MethodAnnotation, SourceLineAnnotation, StringAnnotation,
};

/// Most severe priority a detector can assign.
pub const HIGHEST_PRIORITY: i32 = 1;
/// Alias kept for detectors that think in high/normal/low terms.
pub const HIGH_PRIORITY: i32 = 1;
pub const NORMAL_PRIORITY: i32 = 2;
pub const LOW_PRIORITY: i32 = 3;
pub const EXPERIMENTAL_PRIORITY: i32 = 4;
/// Least severe priority; threshold filters drop findings at this tier.
pub const IGNORE_PRIORITY: i32 = 5;

/// Sentinel for a finding that is still present in the latest analyzed
/// version.
pub const STILL_PRESENT: i64 = -1;

/// Clamp a raw priority value into the valid closed interval.
pub fn clamp_priority(priority: i32) -> i32 {
    priority.clamp(HIGHEST_PRIORITY, IGNORE_PRIORITY)
}

/// A single reported potential defect: pattern key, priority, and an ordered
/// list of annotations describing where and what.
///
/// Identity is structural over (pattern key, priority, annotations, in
/// order). The content hash is a separate, priority-independent identity
/// used for cross-run tracking; it is computed lazily and cached until the
/// annotation list changes.
#[derive(Clone, Debug)]
pub struct Finding {
    pattern: String,
    priority: i32,
    annotations: Vec<Annotation>,
    properties: Vec<(String, String)>,
    hash: OnceCell<String>,
    previous_hash: Option<String>,
    first_version: i64,
    last_version: i64,
    introduced_by_change: bool,
    removed_by_change: bool,
}

impl Finding {
    pub fn new(pattern: impl Into<String>, priority: i32) -> Self {
        Self {
            pattern: pattern.into(),
            priority: clamp_priority(priority),
            annotations: Vec::new(),
            properties: Vec::new(),
            hash: OnceCell::new(),
            previous_hash: None,
            first_version: 0,
            last_version: STILL_PRESENT,
            introduced_by_change: false,
            removed_by_change: false,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = clamp_priority(priority);
    }

    pub fn raise_priority(&mut self) {
        self.set_priority(self.priority - 1);
    }

    pub fn lower_priority(&mut self) {
        self.set_priority(self.priority + 1);
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Append an annotation. Append order is semantically significant: it
    /// feeds both the content hash and display.
    pub fn add_annotation(&mut self, annotation: Annotation) -> &mut Self {
        self.annotations.push(annotation);
        self.hash = OnceCell::new();
        self
    }

    pub fn add_class(&mut self, class_name: impl Into<String>) -> &mut Self {
        self.add_annotation(Annotation::Class(ClassAnnotation::new(class_name)))
    }

    pub fn add_method(
        &mut self,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> &mut Self {
        self.add_annotation(Annotation::Method(MethodAnnotation::new(
            class_name,
            method_name,
            signature,
        )))
    }

    pub fn add_field(
        &mut self,
        class_name: impl Into<String>,
        field_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> &mut Self {
        self.add_annotation(Annotation::Field(FieldAnnotation::new(
            class_name, field_name, signature,
        )))
    }

    pub fn add_source_line(&mut self, source_line: SourceLineAnnotation) -> &mut Self {
        self.add_annotation(Annotation::SourceLine(source_line))
    }

    pub fn add_int(&mut self, value: i64) -> &mut Self {
        self.add_annotation(Annotation::Int(IntAnnotation::new(value)))
    }

    pub fn add_string(&mut self, value: impl Into<String>) -> &mut Self {
        self.add_annotation(Annotation::String(StringAnnotation::new(value)))
    }

    pub fn add_local_variable(&mut self, local: LocalVariableAnnotation) -> &mut Self {
        self.add_annotation(Annotation::LocalVariable(local))
    }

    fn primary(&self, variant: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .find(|a| a.variant_name() == variant && a.role().ends_with("DEFAULT"))
    }

    pub fn primary_class(&self) -> Option<&ClassAnnotation> {
        match self.primary("Class") {
            Some(Annotation::Class(a)) => Some(a),
            _ => None,
        }
    }

    pub fn primary_method(&self) -> Option<&MethodAnnotation> {
        match self.primary("Method") {
            Some(Annotation::Method(a)) => Some(a),
            _ => None,
        }
    }

    pub fn primary_source_line(&self) -> Option<&SourceLineAnnotation> {
        match self.primary("SourceLine") {
            Some(Annotation::SourceLine(a)) => Some(a),
            _ => None,
        }
    }

    /// Key-value properties carried for reporting. Deep-copied, never
    /// shared, when the override engine clones a finding.
    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        for entry in &mut self.properties {
            if entry.0 == key {
                entry.1 = value;
                return;
            }
        }
        self.properties.push((key, value));
    }

    /// Stable, priority-independent identity digest.
    ///
    /// Concatenates the pattern key with the hash contribution of every
    /// annotation that is significant, an Int, or a LocalVariable, in list
    /// order, then digests and renders the value as an unpadded hexadecimal
    /// integer. The variable-length rendering is load-bearing: persisted
    /// baselines store these strings, so zero-padding would orphan them.
    pub fn content_hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut key = self.pattern.clone();
            for annotation in &self.annotations {
                let included = annotation.is_significant()
                    || matches!(
                        annotation,
                        Annotation::Int(_) | Annotation::LocalVariable(_)
                    );
                if included {
                    key.push_str(&annotation.hash_contribution());
                }
            }
            let digest = Sha256::digest(key.as_bytes());
            render_unpadded_hex(&digest[..16])
        })
    }

    pub fn previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn set_previous_hash(&mut self, hash: impl Into<String>) {
        self.previous_hash = Some(hash.into());
    }

    pub fn first_version(&self) -> i64 {
        self.first_version
    }

    pub fn set_first_version(&mut self, version: i64) {
        assert!(version >= 0, "first version must be non-negative");
        assert!(
            self.last_version == STILL_PRESENT || version <= self.last_version,
            "first version {version} exceeds last version {}",
            self.last_version
        );
        self.first_version = version;
    }

    pub fn last_version(&self) -> i64 {
        self.last_version
    }

    /// Record the last version this finding was seen in, or
    /// [`STILL_PRESENT`].
    pub fn set_last_version(&mut self, version: i64) {
        assert!(
            version == STILL_PRESENT || version >= self.first_version,
            "last version {version} precedes first version {}",
            self.first_version
        );
        self.last_version = version;
    }

    pub fn is_still_present(&self) -> bool {
        self.last_version == STILL_PRESENT
    }

    pub fn introduced_by_change(&self) -> bool {
        self.introduced_by_change
    }

    pub fn set_introduced_by_change(&mut self, value: bool) {
        self.introduced_by_change = value;
    }

    pub fn removed_by_change(&self) -> bool {
        self.removed_by_change
    }

    pub fn set_removed_by_change(&mut self, value: bool) {
        self.removed_by_change = value;
    }
}

/// Render digest bytes as a variable-length hexadecimal integer, leading
/// zeros stripped.
fn render_unpadded_hex(bytes: &[u8]) -> String {
    let mut rendered = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        rendered.push_str(&format!("{byte:02x}"));
    }
    let trimmed = rendered.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

impl PartialEq for Finding {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
            && self.priority == other.priority
            && self.annotations == other.annotations
    }
}

impl Eq for Finding {}

impl PartialOrd for Finding {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Finding {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pattern
            .cmp(&other.pattern)
            .then_with(|| self.priority.cmp(&other.priority))
            .then_with(|| self.annotations.cmp(&other.annotations))
    }
}

impl Hash for Finding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.priority.hash(state);
        self.annotations.hash(state);
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (priority {})", self.pattern, self.priority)?;
        for annotation in &self.annotations {
            write!(f, " {annotation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::roles;

    fn sample_finding() -> Finding {
        let mut finding = Finding::new("NP_NULL_ON_SOME_PATH", NORMAL_PRIORITY);
        finding
            .add_class("com.example.App")
            .add_method("com.example.App", "run", "()V");
        finding
    }

    #[test]
    fn priority_is_clamped_on_every_mutation() {
        let mut finding = Finding::new("X", 99);
        assert_eq!(finding.priority(), IGNORE_PRIORITY);

        finding.set_priority(-7);
        assert_eq!(finding.priority(), HIGHEST_PRIORITY);

        finding.raise_priority();
        assert_eq!(finding.priority(), HIGHEST_PRIORITY);
    }

    #[test]
    fn content_hash_is_idempotent() {
        let finding = sample_finding();
        let first = finding.content_hash().to_string();
        assert_eq!(finding.content_hash(), first);
    }

    #[test]
    fn content_hash_is_priority_independent() {
        let mut low = sample_finding();
        low.set_priority(LOW_PRIORITY);
        let mut high = sample_finding();
        high.set_priority(HIGH_PRIORITY);

        assert_eq!(low.content_hash(), high.content_hash());
    }

    #[test]
    fn content_hash_tracks_significant_annotation_order() {
        let mut ab = Finding::new("X", NORMAL_PRIORITY);
        ab.add_string("a").add_string("b");
        let mut ba = Finding::new("X", NORMAL_PRIORITY);
        ba.add_string("b").add_string("a");

        assert_ne!(ab.content_hash(), ba.content_hash());
    }

    #[test]
    fn content_hash_ignores_insignificant_annotation_order() {
        use crate::annotations::SourceLineAnnotation;

        let mut first = sample_finding();
        first.add_source_line(SourceLineAnnotation::new("com.example.App", 10, 10));
        first.add_source_line(SourceLineAnnotation::new("com.example.Other", 20, 20));

        let mut second = sample_finding();
        second.add_source_line(SourceLineAnnotation::new("com.example.Other", 20, 20));
        second.add_source_line(SourceLineAnnotation::new("com.example.App", 10, 10));

        assert_eq!(first.content_hash(), second.content_hash());
    }

    #[test]
    fn content_hash_cache_invalidated_by_new_annotation() {
        let mut finding = sample_finding();
        let before = finding.content_hash().to_string();

        finding.add_string("extra");
        assert_ne!(finding.content_hash(), before);
    }

    #[test]
    fn content_hash_has_no_leading_zeros() {
        let finding = sample_finding();
        let hash = finding.content_hash();
        assert!(!hash.starts_with('0') || hash == "0");
    }

    #[test]
    fn equality_includes_annotation_order() {
        let mut ab = Finding::new("X", NORMAL_PRIORITY);
        ab.add_string("a").add_string("b");
        let mut ba = Finding::new("X", NORMAL_PRIORITY);
        ba.add_string("b").add_string("a");

        assert_ne!(ab, ba);
    }

    #[test]
    fn primary_annotation_requires_default_role() {
        let mut finding = Finding::new("X", NORMAL_PRIORITY);
        finding.add_annotation(Annotation::Class(
            crate::annotations::ClassAnnotation::new("com.example.Base")
                .with_role(roles::CLASS_SUPERCLASS),
        ));
        finding.add_class("com.example.App");

        let primary = finding.primary_class().expect("primary class");
        assert_eq!(primary.class_name, "com.example.App");
    }

    #[test]
    #[should_panic(expected = "precedes first version")]
    fn lifecycle_contract_rejects_inverted_versions() {
        let mut finding = sample_finding();
        finding.set_first_version(5);
        finding.set_last_version(3);
    }

    #[test]
    fn render_unpadded_hex_strips_leading_zeros() {
        assert_eq!(render_unpadded_hex(&[0x00, 0x0f, 0xa0]), "fa0");
        assert_eq!(render_unpadded_hex(&[0x00, 0x00]), "0");
    }
}
