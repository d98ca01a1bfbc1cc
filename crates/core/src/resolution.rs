use protocol::descriptor::{map_descriptor_token, map_full_descriptor, map_method_descriptor};
use protocol::{bare_class_name, class_token, DescriptorError, MappingRecord, RecordKind};
use store::{InheritanceGraph, MappingTable};
use tracing::trace;

/// Read-only lookup layer over the mapping table and the inheritance graph.
///
/// Owners may be given in either namespace, with or without bracket
/// qualification. A member not declared on the owner is searched on its
/// supertypes in depth-first order.
#[derive(Clone, Copy)]
pub struct SymbolResolver<'a> {
    table: &'a MappingTable,
    graph: &'a InheritanceGraph,
}

impl<'a> SymbolResolver<'a> {
    pub fn new(table: &'a MappingTable, graph: &'a InheritanceGraph) -> Self {
        Self { table, graph }
    }

    pub fn table(&self) -> &'a MappingTable {
        self.table
    }

    pub fn resolve_class(&self, token: &str) -> Option<&'a MappingRecord> {
        self.table.find_class(token)
    }

    /// Bracket-qualified target name of a class; unmapped classes keep their name
    pub fn target_class_token(&self, token: &str) -> String {
        self.resolve_class(token)
            .map(|record| record.target_name.clone())
            .unwrap_or_else(|| class_token(token))
    }

    pub fn resolve_field(&self, name: &str, owner: &str) -> Option<&'a MappingRecord> {
        self.owner_candidates(owner)
            .into_iter()
            .find_map(|candidate| self.table.find(name, &candidate, RecordKind::Field))
    }

    /// Field lookup that also requires the type token to match once both sides are mapped
    pub fn resolve_typed_field(
        &self,
        name: &str,
        descriptor: &str,
        owner: &str,
    ) -> Option<&'a MappingRecord> {
        let wanted = map_descriptor_token(descriptor, self.table);

        self.owner_candidates(owner).into_iter().find_map(|candidate| {
            self.table
                .find_all(name, &candidate, RecordKind::Field)
                .find(|record| map_descriptor_token(&record.descriptor, self.table) == wanted)
        })
    }

    /// Resolve `name` or `name(params)return`.
    ///
    /// With a descriptor, only the overload whose mapped descriptor equals the
    /// mapped input is accepted. A malformed descriptor is an error.
    pub fn resolve_method(
        &self,
        selector: &str,
        owner: &str,
    ) -> Result<Option<&'a MappingRecord>, DescriptorError> {
        let Some(paren) = selector.find('(') else {
            return Ok(self
                .owner_candidates(owner)
                .into_iter()
                .find_map(|candidate| self.table.find(selector, &candidate, RecordKind::Method)));
        };

        let (name, descriptor) = selector.split_at(paren);
        let wanted = map_method_descriptor(descriptor, self.table)?;

        for candidate in self.owner_candidates(owner) {
            for record in self.table.find_all(name, &candidate, RecordKind::Method) {
                if map_method_descriptor(&record.descriptor, self.table)? == wanted {
                    trace!("{} resolved on {} as {}", selector, candidate, record.target_name);
                    return Ok(Some(record));
                }
            }
        }

        Ok(None)
    }

    /// The record's descriptor with every class token mapped to the target namespace
    pub fn target_descriptor(&self, record: &MappingRecord) -> Result<String, DescriptorError> {
        map_full_descriptor(&record.descriptor, self.table)
    }

    /// Owner names to try, in order: the owner in both namespaces, then each
    /// ancestor of its target-namespace form in both namespaces.
    fn owner_candidates(&self, owner: &str) -> Vec<String> {
        let owner = bare_class_name(owner);
        let target = self
            .table
            .find_class(owner)
            .map(|record| bare_class_name(&record.target_name))
            .unwrap_or(owner);

        let mut candidates: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !candidates.iter().any(|c| c == name) {
                candidates.push(name.to_string());
            }
        };

        push(owner);
        for class in self.graph.ancestors(target) {
            push(&class);
            if let Some(record) = self.table.find_class_by_target(&class) {
                push(bare_class_name(&record.source_name));
            }
        }

        candidates
    }
}
