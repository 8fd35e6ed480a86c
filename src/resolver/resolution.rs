//! Resolution - the immutable output of a session.
//!
//! Holds every product's final state and resolved module list, plus the
//! product graph with build-order edges for the downstream build-graph
//! constructor. Once built it is read-only.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Topo;

use crate::core::product::{ResolutionState, ResolvedModule};
use crate::util::Symbol;

/// The resolved product graph.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Product graph; an edge a -> b means "a depends on b"
    graph: DiGraph<Symbol, ()>,

    /// Map from product key to node index
    nodes: HashMap<Symbol, NodeIndex>,

    /// Resolved modules per product, in declaration order
    modules: HashMap<Symbol, Vec<ResolvedModule>>,

    /// Final state per product
    states: HashMap<Symbol, ResolutionState>,

    /// Failure causes for products that ended Failed
    failures: Vec<(Symbol, String)>,
}

impl Resolution {
    pub fn new() -> Self {
        Resolution::default()
    }

    pub(crate) fn add_product(
        &mut self,
        key: Symbol,
        state: ResolutionState,
        modules: Vec<ResolvedModule>,
        failure: Option<String>,
    ) {
        if self.nodes.contains_key(&key) {
            return;
        }

        let node = self.graph.add_node(key);
        self.nodes.insert(key, node);
        self.states.insert(key, state);
        self.modules.insert(key, modules);

        if let Some(cause) = failure {
            self.failures.push((key, cause));
        }
    }

    pub(crate) fn add_edge(&mut self, from: Symbol, to: Symbol) {
        if let (Some(&from_node), Some(&to_node)) = (self.nodes.get(&from), self.nodes.get(&to)) {
            if !self.graph.contains_edge(from_node, to_node) {
                self.graph.add_edge(from_node, to_node, ());
            }
        }
    }

    /// All product keys.
    pub fn products(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.states.keys().copied()
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Final state of a product.
    pub fn state(&self, product: Symbol) -> Option<ResolutionState> {
        self.states.get(&product).copied()
    }

    /// Resolved modules of a product, in declaration order.
    pub fn modules(&self, product: Symbol) -> &[ResolvedModule] {
        self.modules.get(&product).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether every product reached Resolved.
    pub fn is_fully_resolved(&self) -> bool {
        self.states
            .values()
            .all(|s| *s == ResolutionState::Resolved)
    }

    /// Products that ended Failed, with their causes.
    pub fn failures(&self) -> &[(Symbol, String)] {
        &self.failures
    }

    /// Direct product dependencies (build-order edges).
    pub fn deps(&self, product: Symbol) -> Vec<Symbol> {
        match self.nodes.get(&product) {
            Some(&node) => self.graph.neighbors(node).map(|n| self.graph[n]).collect(),
            None => Vec::new(),
        }
    }

    /// Products that depend on the given product.
    pub fn dependents(&self, product: Symbol) -> Vec<Symbol> {
        match self.nodes.get(&product) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|n| self.graph[n])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Products in build order (dependencies before dependents).
    ///
    /// Only meaningful when the graph is fully resolved; the resolved
    /// build-order edge set is guaranteed acyclic.
    pub fn topological_order(&self) -> Vec<Symbol> {
        let mut topo = Topo::new(&self.graph);
        let mut order = Vec::new();

        while let Some(node) = topo.next(&self.graph) {
            order.push(self.graph[node]);
        }

        // Topo visits sources first; an edge a -> b means a depends on b,
        // so reverse to put dependencies first.
        order.reverse();
        order
    }
}
