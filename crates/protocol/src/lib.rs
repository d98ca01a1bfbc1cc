use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod descriptor;
pub mod version;
pub use descriptor::{ClassMapper, DescriptorError, MethodSignature};
pub use version::{MappingVersion, Namespaces};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Class,
    Field,
    Method,
}

impl RecordKind {
    /// Record kind for a mapping-table tag; version markers are not record kinds
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CLASS" => Some(RecordKind::Class),
            "FIELD" => Some(RecordKind::Field),
            "METHOD" => Some(RecordKind::Method),
            _ => None,
        }
    }
}

/// One entry of the translated symbol table.
///
/// Classes store both names in descriptor form (`Lfoo/Bar;`) and leave
/// `descriptor`/`owner_class` empty. Members store the bare owner name and the
/// descriptor as written in the table (source namespace).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingRecord {
    pub source_name: String,
    pub target_name: String,
    pub descriptor: String,
    pub owner_class: String,
    pub kind: RecordKind,
}

impl MappingRecord {
    pub fn class(source: &str, target: &str) -> Self {
        Self {
            source_name: class_token(source),
            target_name: class_token(target),
            descriptor: String::new(),
            owner_class: String::new(),
            kind: RecordKind::Class,
        }
    }

    pub fn member(
        kind: RecordKind,
        owner: &str,
        descriptor: &str,
        source: &str,
        target: &str,
    ) -> Self {
        Self {
            source_name: source.to_string(),
            target_name: target.to_string(),
            descriptor: descriptor.to_string(),
            owner_class: owner.to_string(),
            kind,
        }
    }
}

/// Strip descriptor brackets: `Lfoo/Bar;` becomes `foo/Bar`, bare names pass through.
pub fn bare_class_name(name: &str) -> &str {
    name.strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .unwrap_or(name)
}

/// Bracket-qualify a class name: `foo/Bar` becomes `Lfoo/Bar;`. Already qualified names are kept.
pub fn class_token(name: &str) -> String {
    format!("L{};", bare_class_name(name))
}

/// Class equality that accepts either side with or without bracket qualification
pub fn same_class(a: &str, b: &str) -> bool {
    a == b || bare_class_name(a) == bare_class_name(b)
}

// Class tree handed over by the class-file reader

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassTree {
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<MemberTree>,
    pub methods: Vec<MemberTree>,
    pub annotations: Vec<AnnotationNode>,
}

impl ClassTree {
    pub fn annotation(&self, desc: &str) -> Option<&AnnotationNode> {
        find_annotation(&self.annotations, desc)
    }

    /// Direct supertypes: the superclass first, then interfaces in declaration order
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.super_name
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemberTree {
    pub name: String,
    pub descriptor: String,
    pub signature: Option<String>,
    pub annotations: Vec<AnnotationNode>,
}

impl MemberTree {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            ..Default::default()
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationNode) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn annotation(&self, desc: &str) -> Option<&AnnotationNode> {
        find_annotation(&self.annotations, desc)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationNode {
    pub desc: String,
    pub visible: bool,
    pub values: Vec<(String, AnnotationValue)>,
}

impl AnnotationNode {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            desc: desc.into(),
            visible: false,
            values: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.push((name.into(), value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(AnnotationValue::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(AnnotationValue::as_bool)
    }

    /// Element values of `name`, treating a scalar as a one-element list
    pub fn get_list(&self, name: &str) -> Vec<&AnnotationValue> {
        match self.get(name) {
            Some(AnnotationValue::Array(values)) => values.iter().collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }
}

// Visible annotations win over invisible ones of the same type
fn find_annotation<'a>(
    annotations: &'a [AnnotationNode],
    desc: &str,
) -> Option<&'a AnnotationNode> {
    annotations
        .iter()
        .find(|a| a.visible && a.desc == desc)
        .or_else(|| annotations.iter().find(|a| a.desc == desc))
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Boolean(bool),
    Char(char),
    Int(i64),
    Float(f64),
    String(String),
    Enum { desc: String, value: String },
    /// Class literal as a type descriptor, e.g. `Lfoo/Bar;`
    Class(String),
    Annotation(AnnotationNode),
    Array(Vec<AnnotationValue>),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_annotation(&self) -> Option<&AnnotationNode> {
        match self {
            AnnotationValue::Annotation(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&str> {
        match self {
            AnnotationValue::Class(desc) => Some(desc),
            _ => None,
        }
    }
}

// Annotation references extracted from mixin classes

/// A mixin class and the classes it targets, first target first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixinDeclaration {
    pub name: String,
    pub targets: Vec<String>,
}

impl MixinDeclaration {
    /// The class every reference of this mixin resolves against
    pub fn primary_target(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum GenKind {
    Accessor,
    Invoker,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum InjectionKind {
    Inject,
    Redirect,
    ModifyArgs,
}

impl InjectionKind {
    /// Whether the target method's descriptor is synthesized from the handler signature
    pub fn generates_descriptor(&self) -> bool {
        matches!(self, InjectionKind::Inject)
    }

    /// Whether the annotation declares a single `at` rather than an array
    pub fn single_at(&self) -> bool {
        !matches!(self, InjectionKind::Inject)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AtKind {
    Head,
    Tail,
    Return,
    Invoke,
    Field,
}

impl AtKind {
    pub fn has_target(&self) -> bool {
        matches!(self, AtKind::Invoke | AtKind::Field)
    }
}

impl FromStr for AtKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HEAD" => Ok(AtKind::Head),
            "TAIL" => Ok(AtKind::Tail),
            "RETURN" => Ok(AtKind::Return),
            "INVOKE" => Ok(AtKind::Invoke),
            "FIELD" => Ok(AtKind::Field),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AtTarget {
    pub kind: AtKind,
    pub target: String,
}

/// A typed request to resolve a symbol, tagged by the declaring annotation kind.
/// `member` is the annotated handler method in the mixin class.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnnotationReference {
    GenAccess {
        kind: GenKind,
        member: String,
        name: String,
    },
    Injection {
        kind: InjectionKind,
        member: String,
        methods: Vec<String>,
        ats: Vec<AtTarget>,
        descriptor: Option<String>,
    },
}

/// Annotation references of one mixin class, in declaration order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixinReferences {
    pub mixin: MixinDeclaration,
    pub references: Vec<AnnotationReference>,
}

/// A reference resolved into target-namespace names, keyed by its source-namespace token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResolvedReference {
    Accessor {
        key: String,
        name: String,
        descriptor: String,
    },
    Invoker {
        key: String,
        name: String,
        descriptor: String,
    },
    Injection {
        key: String,
        owner: String,
        name: String,
        descriptor: String,
    },
    InvokeTarget {
        key: String,
        owner: String,
        name: String,
        descriptor: String,
    },
    FieldTarget {
        key: String,
        owner: String,
        name: String,
        descriptor: String,
    },
}

impl ResolvedReference {
    pub fn key(&self) -> &str {
        match self {
            ResolvedReference::Accessor { key, .. }
            | ResolvedReference::Invoker { key, .. }
            | ResolvedReference::Injection { key, .. }
            | ResolvedReference::InvokeTarget { key, .. }
            | ResolvedReference::FieldTarget { key, .. } => key,
        }
    }

    pub fn value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ResolvedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedReference::Accessor {
                name, descriptor, ..
            } => write!(f, "{}:{}", name, descriptor),
            ResolvedReference::Invoker {
                name, descriptor, ..
            } => write!(f, "{}{}", name, descriptor),
            ResolvedReference::Injection { owner, name, descriptor, .. }
            | ResolvedReference::InvokeTarget { owner, name, descriptor, .. } => {
                write!(f, "{}{}{}", owner, name, descriptor)
            }
            ResolvedReference::FieldTarget { owner, name, descriptor, .. } => {
                write!(f, "{}{}:{}", owner, name, descriptor)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_normalization() {
        assert_eq!(bare_class_name("Lfoo/Bar;"), "foo/Bar");
        assert_eq!(bare_class_name("foo/Bar"), "foo/Bar");
        assert_eq!(class_token("foo/Bar"), "Lfoo/Bar;");
        assert_eq!(class_token("Lfoo/Bar;"), "Lfoo/Bar;");
        assert!(same_class("Lfoo/Bar;", "foo/Bar"));
        assert!(same_class("foo/Bar", "Lfoo/Bar;"));
        assert!(!same_class("foo/Bar", "foo/Baz"));
    }

    #[test]
    fn test_resolved_reference_values() {
        let accessor = ResolvedReference::Accessor {
            key: "health".to_string(),
            name: "f_001".to_string(),
            descriptor: "F".to_string(),
        };
        assert_eq!(accessor.key(), "health");
        assert_eq!(accessor.value(), "f_001:F");

        let invoker = ResolvedReference::Invoker {
            key: "doThing".to_string(),
            name: "m001".to_string(),
            descriptor: "()V".to_string(),
        };
        assert_eq!(invoker.value(), "m001()V");

        let invoke = ResolvedReference::InvokeTarget {
            key: "Lfoo/Bar;helper()V".to_string(),
            owner: "Lfoo/Baz;".to_string(),
            name: "m002".to_string(),
            descriptor: "()V".to_string(),
        };
        assert_eq!(invoke.value(), "Lfoo/Baz;m002()V");

        let field = ResolvedReference::FieldTarget {
            key: "Lfoo/Bar;count:I".to_string(),
            owner: "Lfoo/Baz;".to_string(),
            name: "f_002".to_string(),
            descriptor: "I".to_string(),
        };
        assert_eq!(field.value(), "Lfoo/Baz;f_002:I");
    }

    #[test]
    fn test_annotation_lookup_prefers_visible() {
        let mut visible = AnnotationNode::new("Lfoo/Marker;")
            .with("value", AnnotationValue::String("seen".to_string()));
        visible.visible = true;
        let invisible = AnnotationNode::new("Lfoo/Marker;")
            .with("value", AnnotationValue::String("hidden".to_string()));

        let member = MemberTree::new("run", "()V")
            .with_annotation(invisible)
            .with_annotation(visible);

        let found = member.annotation("Lfoo/Marker;").unwrap();
        assert_eq!(found.get_str("value"), Some("seen"));
    }

    #[test]
    fn test_get_list_wraps_scalars() {
        let node = AnnotationNode::new("Lfoo/Inject;")
            .with("method", AnnotationValue::String("tick".to_string()))
            .with("at", AnnotationValue::Array(vec![
                AnnotationValue::String("a".to_string()),
                AnnotationValue::String("b".to_string()),
            ]));

        assert_eq!(node.get_list("method").len(), 1);
        assert_eq!(node.get_list("at").len(), 2);
        assert!(node.get_list("missing").is_empty());
    }

    #[test]
    fn test_serialize_deserialize() {
        let reference = AnnotationReference::Injection {
            kind: InjectionKind::Inject,
            member: "onTick".to_string(),
            methods: vec!["tick".to_string()],
            ats: vec![AtTarget { kind: AtKind::Head, target: String::new() }],
            descriptor: Some("()V".to_string()),
        };

        let json = serde_json::to_string(&reference).unwrap();
        let deserialized: AnnotationReference = serde_json::from_str(&json).unwrap();
        assert_eq!(reference, deserialized);
    }
}
