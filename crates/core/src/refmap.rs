use crate::resolution::SymbolResolver;
use indexmap::IndexMap;
use protocol::{
    AnnotationReference, AtKind, AtTarget, DescriptorError, GenKind, MixinDeclaration,
    MixinReferences, Namespaces, ResolvedReference,
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

type EntrySet = IndexMap<String, String>;

/// Collects resolved references per mixin class, keeping the first value of each key
pub struct RefmapBuilder<'a> {
    resolver: SymbolResolver<'a>,
    namespaces: Namespaces,
    mixins: IndexMap<String, EntrySet>,
    duplicates: usize,
}

impl<'a> RefmapBuilder<'a> {
    pub fn new(resolver: SymbolResolver<'a>) -> Self {
        Self::with_namespaces(resolver, Namespaces::default())
    }

    pub fn with_namespaces(resolver: SymbolResolver<'a>, namespaces: Namespaces) -> Self {
        Self {
            resolver,
            namespaces,
            mixins: IndexMap::new(),
            duplicates: 0,
        }
    }

    /// Resolve and record every reference of one mixin class.
    /// Returns the number of entries added.
    pub fn add(&mut self, references: &MixinReferences) -> Result<usize, DescriptorError> {
        if references.references.is_empty() {
            return Ok(0);
        }

        let mut resolved = Vec::new();
        for reference in &references.references {
            resolved.extend(self.resolve(&references.mixin, reference)?);
        }

        let entries = self.mixins.entry(references.mixin.name.clone()).or_default();
        let before = entries.len();
        for entry in resolved {
            if entries.contains_key(entry.key()) {
                self.duplicates += 1;
                continue;
            }
            entries.insert(entry.key().to_string(), entry.value());
        }

        Ok(entries.len() - before)
    }

    /// Resolve one reference against the mixin's primary target.
    /// References that do not resolve yield no entries.
    pub fn resolve(
        &self,
        mixin: &MixinDeclaration,
        reference: &AnnotationReference,
    ) -> Result<Vec<ResolvedReference>, DescriptorError> {
        let Some(target) = mixin.primary_target() else {
            return Ok(Vec::new());
        };

        let mut resolved = Vec::new();
        match reference {
            AnnotationReference::GenAccess { kind: GenKind::Accessor, name, .. } => {
                if let Some(record) = self.resolver.resolve_field(name, target) {
                    resolved.push(ResolvedReference::Accessor {
                        key: name.clone(),
                        name: record.target_name.clone(),
                        descriptor: self.resolver.target_descriptor(record)?,
                    });
                }
            }
            AnnotationReference::GenAccess { kind: GenKind::Invoker, name, .. } => {
                if let Some(record) = self.resolver.resolve_method(name, target)? {
                    resolved.push(ResolvedReference::Invoker {
                        key: name.clone(),
                        name: record.target_name.clone(),
                        descriptor: self.resolver.target_descriptor(record)?,
                    });
                }
            }
            AnnotationReference::Injection {
                kind,
                methods,
                ats,
                descriptor,
                ..
            } => {
                for method in methods {
                    let bare = !method.contains('(');
                    let selector = match descriptor {
                        Some(descriptor) if kind.generates_descriptor() && bare => {
                            format!("{}{}", method, descriptor)
                        }
                        _ => method.clone(),
                    };

                    let Some(record) = self.resolver.resolve_method(&selector, target)? else {
                        debug!("{}: no mapping for injection target {}", mixin.name, selector);
                        continue;
                    };

                    for at in ats {
                        resolved.extend(self.resolve_at(at)?);
                    }

                    resolved.push(ResolvedReference::Injection {
                        key: method.clone(),
                        owner: target.to_string(),
                        name: record.target_name.clone(),
                        descriptor: self.resolver.target_descriptor(record)?,
                    });
                }
                return Ok(resolved);
            }
        }

        if resolved.is_empty() {
            debug!("{}: no mapping for {:?}", mixin.name, reference);
        }
        Ok(resolved)
    }

    fn resolve_at(&self, at: &AtTarget) -> Result<Option<ResolvedReference>, DescriptorError> {
        if !at.kind.has_target() {
            return Ok(None);
        }

        // Targets look like `Lowner;member...`
        let Some(split) = at.target.find(';') else {
            debug!("@At target {:?} has no owner", at.target);
            return Ok(None);
        };
        let (owner, member) = at.target.split_at(split + 1);
        let owner_token = self.resolver.target_class_token(owner);

        match at.kind {
            AtKind::Invoke => {
                let Some(record) = self.resolver.resolve_method(member, owner)? else {
                    debug!("No mapping for invoke target {}", at.target);
                    return Ok(None);
                };
                Ok(Some(ResolvedReference::InvokeTarget {
                    key: at.target.clone(),
                    owner: owner_token,
                    name: record.target_name.clone(),
                    descriptor: self.resolver.target_descriptor(record)?,
                }))
            }
            AtKind::Field => {
                let name = member.split(':').next().unwrap_or(member);
                let Some(record) = self.resolver.resolve_field(name, owner) else {
                    debug!("No mapping for field target {}", at.target);
                    return Ok(None);
                };
                Ok(Some(ResolvedReference::FieldTarget {
                    key: at.target.clone(),
                    owner: owner_token,
                    name: record.target_name.clone(),
                    descriptor: self.resolver.target_descriptor(record)?,
                }))
            }
            AtKind::Head | AtKind::Tail | AtKind::Return => Ok(None),
        }
    }

    /// Number of later entries dropped because their key was already present
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn build(self) -> Refmap {
        Refmap {
            namespaces: self.namespaces,
            mixins: self.mixins,
        }
    }
}

/// The reference map: the same entry sets under `mappings` and under the
/// namespace-pair label in `data`
#[derive(Debug, Clone, PartialEq)]
pub struct Refmap {
    namespaces: Namespaces,
    mixins: IndexMap<String, EntrySet>,
}

impl Refmap {
    pub fn entry_count(&self) -> usize {
        self.mixins.values().map(IndexMap::len).sum()
    }

    pub fn mixin_count(&self) -> usize {
        self.mixins.len()
    }

    pub fn get(&self, mixin: &str, key: &str) -> Option<&str> {
        self.mixins.get(mixin)?.get(key).map(String::as_str)
    }

    pub fn entries(&self, mixin: &str) -> Option<&IndexMap<String, String>> {
        self.mixins.get(mixin)
    }

    /// Tab-indented JSON, mixins and keys in insertion order
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }
}

impl Serialize for Refmap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut data = IndexMap::new();
        data.insert(self.namespaces.label(), &self.mixins);

        let mut root = serializer.serialize_map(Some(2))?;
        root.serialize_entry("mappings", &self.mixins)?;
        root.serialize_entry("data", &data)?;
        root.end()
    }
}
