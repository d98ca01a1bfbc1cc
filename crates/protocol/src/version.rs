use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag of a mapping table header
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MappingVersion {
    V1,
}

impl MappingVersion {
    /// Parse a version marker such as `v1`. Unknown markers yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "v1" => Some(MappingVersion::V1),
            _ => None,
        }
    }

    /// Version markers are the only tags that start with a lowercase `v`
    pub fn is_version_tag(tag: &str) -> bool {
        tag.starts_with('v')
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MappingVersion::V1 => "v1",
        }
    }
}

impl fmt::Display for MappingVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// The source and target namespace of a remapping run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Namespaces {
    pub source: String,
    pub target: String,
}

impl Namespaces {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Label used for the namespace-pair section of a refmap, e.g. `named:intermediary`
    pub fn label(&self) -> String {
        format!("{}:{}", self.source, self.target)
    }
}

impl Default for Namespaces {
    fn default() -> Self {
        Self::new("named", "intermediary")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_v1_is_supported() {
        assert_eq!(MappingVersion::from_tag("v1"), Some(MappingVersion::V1));
        assert_eq!(MappingVersion::from_tag("v2"), None);
        assert_eq!(MappingVersion::from_tag("v"), None);
        assert!(MappingVersion::is_version_tag("v2"));
        assert!(!MappingVersion::is_version_tag("CLASS"));
    }

    #[test]
    fn test_namespace_label() {
        assert_eq!(Namespaces::default().label(), "named:intermediary");
        assert_eq!(Namespaces::new("official", "named").label(), "official:named");
    }
}
