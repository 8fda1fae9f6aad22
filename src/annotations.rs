use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Annotation roles. A role is display metadata, but it also drives the
/// primary-annotation selection rule (first annotation of a variant whose
/// role ends in "DEFAULT") and per-variant significance.
pub mod roles {
    pub const CLASS_DEFAULT: &str = "CLASS_DEFAULT";
    pub const CLASS_SUPERCLASS: &str = "CLASS_SUPERCLASS";
    pub const CLASS_IMPLEMENTED_INTERFACE: &str = "CLASS_IMPLEMENTED_INTERFACE";
    pub const METHOD_DEFAULT: &str = "METHOD_DEFAULT";
    pub const METHOD_DID_YOU_MEAN: &str = "METHOD_DID_YOU_MEAN";
    pub const METHOD_DECLARED_NONNULL: &str = "METHOD_DECLARED_NONNULL";
    pub const FIELD_DEFAULT: &str = "FIELD_DEFAULT";
    pub const FIELD_DID_YOU_MEAN: &str = "FIELD_DID_YOU_MEAN";
    pub const SOURCE_LINE_DEFAULT: &str = "SOURCE_LINE_DEFAULT";
    pub const SOURCE_LINE_ANOTHER_INSTANCE: &str = "SOURCE_LINE_ANOTHER_INSTANCE";
    pub const INT_DEFAULT: &str = "INT_DEFAULT";
    pub const INT_NULL_ARG: &str = "INT_NULL_ARG";
    pub const INT_MAYBE_NULL_ARG: &str = "INT_MAYBE_NULL_ARG";
    pub const STRING_DEFAULT: &str = "STRING_DEFAULT";
    pub const LOCAL_VARIABLE_DEFAULT: &str = "LOCAL_VARIABLE_DEFAULT";
    pub const LOCAL_VARIABLE_NAMED: &str = "LOCAL_VARIABLE_NAMED";
}

/// Placeholder name for a local variable whose name could not be recovered.
pub const UNKNOWN_LOCAL_VARIABLE: &str = "?";

/// Class reference attached to a finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassAnnotation {
    pub class_name: String,
    pub role: String,
}

/// Method reference attached to a finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MethodAnnotation {
    pub class_name: String,
    pub method_name: String,
    pub signature: String,
    pub role: String,
}

/// Field reference attached to a finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldAnnotation {
    pub class_name: String,
    pub field_name: String,
    pub signature: String,
    pub role: String,
}

/// Source location attached to a finding. Ordering and hashing use the class
/// name only; line numbers matter for display and flush-time grouping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceLineAnnotation {
    pub class_name: String,
    pub source_file: Option<String>,
    pub start_line: i32,
    pub end_line: i32,
    pub role: String,
}

/// Integer value attached to a finding (e.g. a bytecode offset or argument
/// index). Never significant, but always contributes to the content hash.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntAnnotation {
    pub value: i64,
    pub role: String,
}

/// Free-form string attached to a finding.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StringAnnotation {
    pub value: String,
    pub role: String,
}

/// Local variable reference attached to a finding. Significant only when the
/// variable name was recovered from debug info.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalVariableAnnotation {
    pub name: String,
    pub register: i32,
    pub pc: i32,
    pub role: String,
}

impl ClassAnnotation {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            role: roles::CLASS_DEFAULT.to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Top-level enclosing class, with any nested-class suffix stripped.
    pub fn top_level_class(&self) -> &str {
        match self.class_name.find('$') {
            Some(index) => &self.class_name[..index],
            None => &self.class_name,
        }
    }
}

impl MethodAnnotation {
    pub fn new(
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            signature: signature.into(),
            role: roles::METHOD_DEFAULT.to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

impl FieldAnnotation {
    pub fn new(
        class_name: impl Into<String>,
        field_name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            field_name: field_name.into(),
            signature: signature.into(),
            role: roles::FIELD_DEFAULT.to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

impl SourceLineAnnotation {
    pub fn new(class_name: impl Into<String>, start_line: i32, end_line: i32) -> Self {
        Self {
            class_name: class_name.into(),
            source_file: None,
            start_line,
            end_line,
            role: roles::SOURCE_LINE_DEFAULT.to_string(),
        }
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

impl IntAnnotation {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            role: roles::INT_DEFAULT.to_string(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

impl StringAnnotation {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            role: roles::STRING_DEFAULT.to_string(),
        }
    }
}

impl LocalVariableAnnotation {
    pub fn new(name: impl Into<String>, register: i32, pc: i32) -> Self {
        Self {
            name: name.into(),
            register,
            pc,
            role: roles::LOCAL_VARIABLE_DEFAULT.to_string(),
        }
    }

    pub fn unknown(register: i32, pc: i32) -> Self {
        Self::new(UNKNOWN_LOCAL_VARIABLE, register, pc)
    }

    pub fn is_named(&self) -> bool {
        self.name != UNKNOWN_LOCAL_VARIABLE
    }
}

/// Typed descriptor attached to a finding.
///
/// A closed union: formatting, significance, and ordering are matches over
/// the variant tag, so adding a variant forces every rule to be revisited.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Annotation {
    Class(ClassAnnotation),
    Method(MethodAnnotation),
    Field(FieldAnnotation),
    SourceLine(SourceLineAnnotation),
    Int(IntAnnotation),
    String(StringAnnotation),
    LocalVariable(LocalVariableAnnotation),
}

impl Annotation {
    /// Variant name used to order annotations of different variants.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Annotation::Class(_) => "Class",
            Annotation::Field(_) => "Field",
            Annotation::Int(_) => "Int",
            Annotation::LocalVariable(_) => "LocalVariable",
            Annotation::Method(_) => "Method",
            Annotation::SourceLine(_) => "SourceLine",
            Annotation::String(_) => "String",
        }
    }

    pub fn role(&self) -> &str {
        match self {
            Annotation::Class(a) => &a.role,
            Annotation::Method(a) => &a.role,
            Annotation::Field(a) => &a.role,
            Annotation::SourceLine(a) => &a.role,
            Annotation::Int(a) => &a.role,
            Annotation::String(a) => &a.role,
            Annotation::LocalVariable(a) => &a.role,
        }
    }

    pub fn set_role(&mut self, role: impl Into<String>) {
        let role = role.into();
        match self {
            Annotation::Class(a) => a.role = role,
            Annotation::Method(a) => a.role = role,
            Annotation::Field(a) => a.role = role,
            Annotation::SourceLine(a) => a.role = role,
            Annotation::Int(a) => a.role = role,
            Annotation::String(a) => a.role = role,
            Annotation::LocalVariable(a) => a.role = role,
        }
    }

    /// Whether the annotation carries semantic content for identity purposes.
    pub fn is_significant(&self) -> bool {
        match self {
            Annotation::Class(a) => {
                a.role != roles::CLASS_SUPERCLASS && a.role != roles::CLASS_IMPLEMENTED_INTERFACE
            }
            Annotation::Method(a) => a.role != roles::METHOD_DID_YOU_MEAN,
            Annotation::Field(a) => a.role != roles::FIELD_DID_YOU_MEAN,
            Annotation::SourceLine(_) => false,
            Annotation::Int(_) => false,
            Annotation::String(_) => true,
            Annotation::LocalVariable(a) => a.is_named(),
        }
    }

    /// String this annotation contributes when it participates in a finding's
    /// content hash.
    pub fn hash_contribution(&self) -> String {
        match self {
            Annotation::Class(a) => a.class_name.clone(),
            Annotation::Method(a) => {
                format!("{}.{}{}", a.class_name, a.method_name, a.signature)
            }
            Annotation::Field(a) => format!("{}.{}", a.class_name, a.field_name),
            Annotation::SourceLine(a) => a.class_name.clone(),
            Annotation::Int(a) => a.value.to_string(),
            Annotation::String(a) => a.value.clone(),
            Annotation::LocalVariable(a) => a.name.clone(),
        }
    }

    /// Order among annotations of the same variant, by natural key. Line
    /// numbers, registers, and roles never participate.
    fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Annotation::Class(a), Annotation::Class(b)) => a.class_name.cmp(&b.class_name),
            (Annotation::Method(a), Annotation::Method(b)) => a
                .class_name
                .cmp(&b.class_name)
                .then_with(|| a.method_name.cmp(&b.method_name))
                .then_with(|| a.signature.cmp(&b.signature)),
            (Annotation::Field(a), Annotation::Field(b)) => a
                .class_name
                .cmp(&b.class_name)
                .then_with(|| a.field_name.cmp(&b.field_name))
                .then_with(|| a.signature.cmp(&b.signature)),
            (Annotation::SourceLine(a), Annotation::SourceLine(b)) => {
                a.class_name.cmp(&b.class_name)
            }
            (Annotation::Int(a), Annotation::Int(b)) => a.value.cmp(&b.value),
            (Annotation::String(a), Annotation::String(b)) => a.value.cmp(&b.value),
            (Annotation::LocalVariable(a), Annotation::LocalVariable(b)) => a
                .name
                .cmp(&b.name)
                .then_with(|| a.register.cmp(&b.register)),
            _ => unreachable!("natural_cmp requires matching variants"),
        }
    }
}

impl PartialEq for Annotation {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Annotation {}

impl PartialOrd for Annotation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Annotation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.variant_name()
            .cmp(other.variant_name())
            .then_with(|| self.natural_cmp(other))
    }
}

impl Hash for Annotation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant_name().hash(state);
        match self {
            Annotation::Class(a) => a.class_name.hash(state),
            Annotation::Method(a) => {
                a.class_name.hash(state);
                a.method_name.hash(state);
                a.signature.hash(state);
            }
            Annotation::Field(a) => {
                a.class_name.hash(state);
                a.field_name.hash(state);
                a.signature.hash(state);
            }
            Annotation::SourceLine(a) => a.class_name.hash(state),
            Annotation::Int(a) => a.value.hash(state),
            Annotation::String(a) => a.value.hash(state),
            Annotation::LocalVariable(a) => {
                a.name.hash(state);
                a.register.hash(state);
            }
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Class(a) => write!(f, "{}", a.class_name),
            Annotation::Method(a) => {
                write!(f, "{}.{}{}", a.class_name, a.method_name, a.signature)
            }
            Annotation::Field(a) => write!(f, "{}.{}", a.class_name, a.field_name),
            Annotation::SourceLine(a) => {
                if a.start_line == a.end_line {
                    write!(f, "At {}:[line {}]", a.class_name, a.start_line)
                } else {
                    write!(
                        f,
                        "At {}:[lines {}-{}]",
                        a.class_name, a.start_line, a.end_line
                    )
                }
            }
            Annotation::Int(a) => write!(f, "{}", a.value),
            Annotation::String(a) => write!(f, "{}", a.value),
            Annotation::LocalVariable(a) => write!(f, "{}", a.name),
        }
    }
}
