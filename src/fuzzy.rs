use std::cmp::Ordering;

use crate::annotations::{Annotation, roles};
use crate::finding::Finding;
use crate::registry::PatternRegistry;

/// Roles whose annotations participate in cross-run identity. Everything
/// else (bytecode offsets, synthetic context, unnamed locals) is noise that
/// drifts between analyses of an evolving codebase.
const SIGNIFICANT_ROLES: &[&str] = &[
    roles::CLASS_DEFAULT,
    roles::METHOD_DEFAULT,
    roles::FIELD_DEFAULT,
    roles::CLASS_SUPERCLASS,
    roles::CLASS_IMPLEMENTED_INTERFACE,
    roles::METHOD_DECLARED_NONNULL,
    roles::LOCAL_VARIABLE_NAMED,
    roles::INT_NULL_ARG,
    roles::INT_MAYBE_NULL_ARG,
    roles::SOURCE_LINE_DEFAULT,
];

/// Maps class names from a previous analysis onto the current one, so a
/// rename or repackage does not break finding identity.
pub trait ClassNameRewriter {
    fn rewrite(&self, class_name: &str) -> String;
}

/// Rewriter that leaves every class name unchanged.
pub struct IdentityRewriter;

impl ClassNameRewriter for IdentityRewriter {
    fn rewrite(&self, class_name: &str) -> String {
        class_name.to_string()
    }
}

/// Approximate comparator establishing identity between findings of two
/// analysis runs, tolerant of line-number drift and (with a rewriter)
/// class renames.
pub struct FuzzyComparator {
    rewriter: Option<Box<dyn ClassNameRewriter>>,
}

impl FuzzyComparator {
    pub fn new() -> Self {
        Self { rewriter: None }
    }

    pub fn with_rewriter(rewriter: Box<dyn ClassNameRewriter>) -> Self {
        Self {
            rewriter: Some(rewriter),
        }
    }

    fn rewrite(&self, class_name: &str) -> String {
        match &self.rewriter {
            Some(rewriter) => rewriter.rewrite(class_name),
            None => class_name.to_string(),
        }
    }

    /// Order two findings from different runs; `Ordering::Equal` means they
    /// are the same issue across versions.
    pub fn compare(&self, a: &Finding, b: &Finding, registry: &PatternRegistry) -> Ordering {
        // A pattern that migrated to a sibling in the same family still
        // counts as the same kind.
        let kind_a = registry.lookup(a.pattern()).kind;
        let kind_b = registry.lookup(b.pattern()).kind;
        let by_kind = kind_a.cmp(&kind_b);
        if by_kind != Ordering::Equal {
            return by_kind;
        }

        let significant_a: Vec<&Annotation> = significant_annotations(a);
        let significant_b: Vec<&Annotation> = significant_annotations(b);
        for (x, y) in significant_a.iter().copied().zip(significant_b.iter().copied()) {
            let ordering = self.compare_annotations(x, y);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        significant_a.len().cmp(&significant_b.len())
    }

    pub fn same_issue(&self, a: &Finding, b: &Finding, registry: &PatternRegistry) -> bool {
        self.compare(a, b, registry) == Ordering::Equal
    }

    fn compare_annotations(&self, a: &Annotation, b: &Annotation) -> Ordering {
        let by_variant = a.variant_name().cmp(b.variant_name());
        if by_variant != Ordering::Equal {
            return by_variant;
        }
        match (a, b) {
            (Annotation::Class(x), Annotation::Class(y)) => self
                .rewrite(&x.class_name)
                .cmp(&self.rewrite(&y.class_name)),
            (Annotation::SourceLine(x), Annotation::SourceLine(y)) => {
                // Line numbers drift; only the containing class matters.
                self.rewrite(&x.class_name).cmp(&self.rewrite(&y.class_name))
            }
            _ => a.cmp(b),
        }
    }
}

impl Default for FuzzyComparator {
    fn default() -> Self {
        Self::new()
    }
}

fn significant_annotations(finding: &Finding) -> Vec<&Annotation> {
    finding
        .annotations()
        .iter()
        .filter(|annotation| SIGNIFICANT_ROLES.contains(&annotation.role()))
        .collect()
}
