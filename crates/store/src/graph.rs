use crate::MappingTable;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use protocol::{bare_class_name, ClassTree};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

/// Deepest supertype chain followed by [`InheritanceGraph::ancestors`]
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Direct supertype edges of the reference binary, keyed by target-namespace class name.
/// Names are stored bare (`foo/Bar`).
#[derive(Debug, Default)]
pub struct InheritanceGraph {
    graph: DiGraph<String, ()>,
    class_to_node: FxHashMap<String, NodeIndex>,
    recorded: usize,
}

impl InheritanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the classes of a reference binary.
    ///
    /// Only classes under `prefix` are recorded, and only their supertypes under
    /// `prefix` are kept. Every name is translated to the target namespace.
    pub fn build<'a>(
        classes: impl IntoIterator<Item = &'a ClassTree>,
        table: &MappingTable,
        prefix: &str,
    ) -> Self {
        let mut graph = Self::new();
        let translate = |name: &str| -> String {
            table
                .find_class(name)
                .map(|record| bare_class_name(&record.target_name).to_string())
                .unwrap_or_else(|| name.to_string())
        };

        for class in classes {
            if !class.name.starts_with(prefix) {
                continue;
            }

            let supertypes: Vec<String> = class
                .supertypes()
                .filter(|name| name.starts_with(prefix))
                .map(|name| translate(name))
                .collect();

            if !supertypes.is_empty() {
                graph.record(&translate(&class.name), &supertypes);
            }
        }

        info!(
            "Cached {} inheritances ({} classes, {} edges)",
            graph.len(),
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    fn add_class(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.class_to_node.get(name) {
            return node;
        }

        let node = self.graph.add_node(name.to_string());
        self.class_to_node.insert(name.to_string(), node);
        node
    }

    /// Record the direct supertypes of `class`, superclass first
    pub fn record(&mut self, class: &str, supertypes: &[String]) {
        let class = bare_class_name(class);
        let from = self.add_class(class);
        if self.graph.neighbors_directed(from, Direction::Outgoing).next().is_none() {
            self.recorded += 1;
        }

        for supertype in supertypes {
            let to = self.add_class(bare_class_name(supertype));
            self.graph.add_edge(from, to, ());
        }
    }

    /// Direct supertypes of `class` in the order they were recorded
    pub fn supertypes(&self, class: &str) -> Vec<String> {
        let Some(&node) = self.class_to_node.get(bare_class_name(class)) else {
            return Vec::new();
        };

        // petgraph lists neighbors most recent first
        let mut supertypes: Vec<String> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n].clone())
            .collect();
        supertypes.reverse();
        supertypes
    }

    /// `class` itself followed by its supertypes in depth-first pre-order.
    /// A class reachable along several paths is listed once.
    pub fn ancestors(&self, class: &str) -> Vec<String> {
        let class = bare_class_name(class);
        let mut hierarchy = vec![class.to_string()];
        let mut visited = FxHashSet::default();
        visited.insert(class.to_string());

        self.collect_ancestors(class, 0, &mut visited, &mut hierarchy);
        hierarchy
    }

    fn collect_ancestors(
        &self,
        class: &str,
        depth: usize,
        visited: &mut FxHashSet<String>,
        hierarchy: &mut Vec<String>,
    ) {
        if depth >= MAX_HIERARCHY_DEPTH {
            debug!("Hierarchy of {} exceeds {} levels", class, MAX_HIERARCHY_DEPTH);
            return;
        }

        for supertype in self.supertypes(class) {
            if visited.insert(supertype.clone()) {
                hierarchy.push(supertype.clone());
                self.collect_ancestors(&supertype, depth + 1, visited, hierarchy);
            }
        }
    }

    /// Number of classes with recorded supertypes
    pub fn len(&self) -> usize {
        self.recorded
    }

    pub fn is_empty(&self) -> bool {
        self.recorded == 0
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.graph.node_count(),
            edge_count: self.graph.edge_count(),
            is_cyclic: petgraph::algo::is_cyclic_directed(&self.graph),
        }
    }
}

pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub is_cyclic: bool,
}
