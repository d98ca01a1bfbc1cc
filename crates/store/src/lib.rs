use protocol::{bare_class_name, ClassMapper, MappingRecord, MappingVersion, RecordKind};
use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod graph;
pub use graph::{GraphStats, InheritanceGraph};

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Only v1 mappings are supported, found {0:?}")]
    UnsupportedVersion(String),

    #[error("line {line}: {tag} entry has {found} columns, expected {expected}")]
    TruncatedRecord {
        line: usize,
        tag: String,
        found: usize,
        expected: usize,
    },

    #[error("could not read mappings: {0}")]
    Io(#[from] std::io::Error),
}

type MemberIndex = FxHashMap<String, FxHashMap<String, Vec<usize>>>;

/// In-memory symbol table loaded from a tab-separated mapping file.
///
/// Records keep their insertion order; lookups that match several overloads
/// return them in that order.
#[derive(Debug, Default)]
pub struct MappingTable {
    records: Vec<MappingRecord>,
    classes: FxHashMap<String, usize>,
    classes_by_target: FxHashMap<String, usize>,
    fields: MemberIndex,
    methods: MemberIndex,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_path(path: &Path) -> Result<Self, MappingError> {
        let text = std::fs::read_to_string(path)?;
        let table = Self::parse(&text)?;
        info!("Loaded {} mapping entries from {:?}", table.len(), path);
        Ok(table)
    }

    /// Parse the mapping text format:
    ///
    /// ```text
    /// v1	named	intermediary
    /// CLASS	<named>	<target>
    /// FIELD	<owner>	<descriptor>	<named>	<target>
    /// METHOD	<owner>	<descriptor>	<named>	<target>
    /// ```
    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let mut table = Self::new();

        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let columns: Vec<&str> = line.split('\t').collect();
            let tag = columns[0];

            if MappingVersion::is_version_tag(tag) {
                if MappingVersion::from_tag(tag).is_none() {
                    return Err(MappingError::UnsupportedVersion(tag.to_string()));
                }
                continue;
            }

            match RecordKind::from_tag(tag) {
                Some(RecordKind::Class) => {
                    require_columns(&columns, 3, index)?;
                    table.insert(MappingRecord::class(columns[1], columns[2]));
                }
                Some(kind) => {
                    require_columns(&columns, 5, index)?;
                    let mut descriptor = columns[2].to_string();
                    if descriptor.ends_with(')') {
                        descriptor.push('V');
                    }
                    table.insert(MappingRecord::member(
                        kind,
                        columns[1],
                        &descriptor,
                        columns[3],
                        columns[4],
                    ));
                }
                None => warn!("{} mapping entry not supported", tag),
            }
        }

        debug!(
            "Parsed {} records ({} classes)",
            table.records.len(),
            table.classes.len()
        );
        Ok(table)
    }

    pub fn insert(&mut self, record: MappingRecord) {
        let index = self.records.len();

        match record.kind {
            RecordKind::Class => {
                self.classes
                    .entry(bare_class_name(&record.source_name).to_string())
                    .or_insert(index);
                self.classes_by_target
                    .entry(bare_class_name(&record.target_name).to_string())
                    .or_insert(index);
            }
            RecordKind::Field | RecordKind::Method => {
                let members = if record.kind == RecordKind::Field {
                    &mut self.fields
                } else {
                    &mut self.methods
                };
                members
                    .entry(bare_class_name(&record.owner_class).to_string())
                    .or_default()
                    .entry(record.source_name.clone())
                    .or_default()
                    .push(index);
            }
        }

        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MappingRecord] {
        &self.records
    }

    /// First record with the given source name, owner and kind.
    /// The owner may be given with or without bracket qualification; it is ignored for classes.
    pub fn find(&self, name: &str, owner: &str, kind: RecordKind) -> Option<&MappingRecord> {
        match kind {
            RecordKind::Class => self.find_class(name),
            _ => self.find_all(name, owner, kind).next(),
        }
    }

    /// All member records with the given source name and owner, in table order
    pub fn find_all<'a>(
        &'a self,
        name: &str,
        owner: &str,
        kind: RecordKind,
    ) -> impl Iterator<Item = &'a MappingRecord> + 'a {
        let members = match kind {
            RecordKind::Field => Some(&self.fields),
            RecordKind::Method => Some(&self.methods),
            RecordKind::Class => None,
        };

        members
            .and_then(|members| members.get(bare_class_name(owner)))
            .and_then(|by_name| by_name.get(name))
            .map(|indices| indices.as_slice())
            .unwrap_or_default()
            .iter()
            .map(move |&index| &self.records[index])
    }

    /// Class record by its source name, with or without bracket qualification
    pub fn find_class(&self, name: &str) -> Option<&MappingRecord> {
        self.classes
            .get(bare_class_name(name))
            .map(|&index| &self.records[index])
    }

    /// Class record by its target name, with or without bracket qualification
    pub fn find_class_by_target(&self, name: &str) -> Option<&MappingRecord> {
        self.classes_by_target
            .get(bare_class_name(name))
            .map(|&index| &self.records[index])
    }
}

impl ClassMapper for MappingTable {
    fn map_class(&self, token: &str) -> Option<&str> {
        self.find_class(token).map(|record| record.target_name.as_str())
    }
}

fn require_columns(columns: &[&str], expected: usize, index: usize) -> Result<(), MappingError> {
    if columns.len() < expected {
        return Err(MappingError::TruncatedRecord {
            line: index + 1,
            tag: columns[0].to_string(),
            found: columns.len(),
            expected,
        });
    }
    Ok(())
}
