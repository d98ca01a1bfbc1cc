use crate::resolution::SymbolResolver;
use protocol::descriptor::{map_descriptor_token, map_full_descriptor};
use protocol::{bare_class_name, DescriptorError, Namespaces};
use tracing::{debug, warn};

const HEADER: &str = "accessWidener";
const ACCESS_KINDS: [&str; 3] = ["accessible", "mutable", "extendable"];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AccessWidenerStats {
    pub classes: usize,
    pub fields: usize,
    pub methods: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemappedAccessWidener {
    pub text: String,
    pub stats: AccessWidenerStats,
}

/// Rewrites access-widener files from the source to the target namespace, line by line
pub struct AccessWidenerRemapper<'a> {
    resolver: SymbolResolver<'a>,
    namespaces: Namespaces,
}

impl<'a> AccessWidenerRemapper<'a> {
    pub fn new(resolver: SymbolResolver<'a>) -> Self {
        Self {
            resolver,
            namespaces: Namespaces::default(),
        }
    }

    pub fn with_namespaces(mut self, namespaces: Namespaces) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn remap(&self, text: &str) -> Result<RemappedAccessWidener, DescriptorError> {
        let mut stats = AccessWidenerStats::default();
        let mut lines = Vec::new();

        for line in text.split('\n') {
            lines.push(self.remap_line(line, &mut stats)?);
        }

        debug!(
            "Access widener: {} classes, {} fields, {} methods remapped",
            stats.classes, stats.fields, stats.methods
        );
        Ok(RemappedAccessWidener {
            text: lines.join("\n"),
            stats,
        })
    }

    fn remap_line(
        &self,
        line: &str,
        stats: &mut AccessWidenerStats,
    ) -> Result<String, DescriptorError> {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let Some(&first) = columns.first() else {
            return Ok(line.to_string());
        };

        if first.starts_with('#') {
            return Ok(line.to_string());
        }
        if first == HEADER {
            return Ok(format!("{}\tv1\t{}", HEADER, self.namespaces.target));
        }
        if !ACCESS_KINDS.contains(&first) {
            warn!("Unsupported access widener line: {}", line);
            return Ok(line.to_string());
        }

        match (columns.get(1).copied(), columns.len()) {
            (Some("class"), 3..) => {
                let owner = columns[2];
                let target = match self.resolver.resolve_class(owner) {
                    Some(record) => {
                        stats.classes += 1;
                        bare_class_name(&record.target_name)
                    }
                    None => owner,
                };
                Ok(format!("{}\tclass\t{}", first, target))
            }
            (Some(kind @ ("field" | "method")), 5..) => {
                let (owner, name, descriptor) = (columns[2], columns[3], columns[4]);
                let Some(class) = self.resolver.resolve_class(owner) else {
                    return Ok(line.to_string());
                };
                let owner_target = bare_class_name(&class.target_name);
                let table = self.resolver.table();

                let (name, descriptor) = if kind == "field" {
                    // Field types are single tokens and never fail to map
                    match self.resolver.resolve_typed_field(name, descriptor, owner) {
                        Some(record) => {
                            stats.fields += 1;
                            let descriptor = map_descriptor_token(&record.descriptor, table);
                            (record.target_name.clone(), descriptor)
                        }
                        None => {
                            debug!("No mapping for field {}.{}:{}", owner, name, descriptor);
                            (name.to_string(), map_descriptor_token(descriptor, table))
                        }
                    }
                } else {
                    match self.resolver.resolve_method(&format!("{}{}", name, descriptor), owner)? {
                        Some(record) => {
                            stats.methods += 1;
                            (record.target_name.clone(), self.resolver.target_descriptor(record)?)
                        }
                        None => {
                            debug!("No mapping for method {}.{}{}", owner, name, descriptor);
                            (name.to_string(), map_full_descriptor(descriptor, table)?)
                        }
                    }
                };

                Ok(format!("{}\t{}\t{}\t{}\t{}", first, kind, owner_target, name, descriptor))
            }
            _ => {
                warn!("Malformed access widener line: {}", line);
                Ok(line.to_string())
            }
        }
    }
}
