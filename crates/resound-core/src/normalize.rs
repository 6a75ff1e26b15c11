//! Graph normalization: key assignment and flattening.
//!
//! Nested virtual nodes are hoisted into a flat key-indexed map. Each node's
//! children become [`Edge`]s naming their destination by key, so feedback
//! loops are two map entries with a back-edge rather than a cyclic structure.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::graph::{Child, ReferenceNode, VirtualGraph, VirtualNode};
use crate::node::NodeType;
use crate::param::Parameter;

/// Directed edge from the owning node to a destination key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    /// Destination node key
    pub key: String,
    /// Destination control, or `None` for the primary input
    pub param: Option<String>,
}

impl Edge {
    /// Edge to the primary input of `key`.
    pub fn to(key: impl Into<String>) -> Self {
        Self { key: key.into(), param: None }
    }

    /// Edge to control `param` of `key`.
    pub fn to_param(key: impl Into<String>, param: impl Into<String>) -> Self {
        Self { key: key.into(), param: Some(param.into()) }
    }
}

impl From<&ReferenceNode> for Edge {
    fn from(reference: &ReferenceNode) -> Self {
        Self { key: reference.key.clone(), param: reference.param.clone() }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{}.{param}", self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// A node after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedNode {
    /// Type tag
    pub node_type: NodeType,
    /// Ordered parameters
    pub parameters: Vec<Parameter>,
    /// Ordered outgoing edges
    pub children: Vec<Edge>,
}

/// Flat key-indexed form of a virtual graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedGraph {
    nodes: BTreeMap<String, NormalizedNode>,
}

impl NormalizedGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a node by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&NormalizedNode> {
        self.nodes.get(key)
    }

    /// Check whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    /// Iterate nodes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NormalizedNode)> {
        self.nodes.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// All keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every edge (as `(source key, edge)`) whose destination is `key`.
    pub fn edges_into<'a>(&'a self, key: &'a str) -> impl Iterator<Item = (&'a str, &'a Edge)> + 'a {
        self.iter()
            .flat_map(|(from, node)| node.children.iter().map(move |edge| (from, edge)))
            .filter(move |(_, edge)| edge.key == key)
    }

    /// Insert a node. Returns `false` and keeps the existing entry when the
    /// key is already taken.
    pub fn insert(&mut self, key: String, node: NormalizedNode) -> bool {
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(key, node);
        true
    }
}

/// Synthesize the key of an unkeyed node from its structural position.
#[must_use]
pub fn synthesize_key(parent: Option<&str>, index: usize) -> String {
    match parent {
        Some(parent) => format!("{parent}/{index}"),
        None => format!("#{index}"),
    }
}

/// Normalize a virtual graph into its flat keyed form.
///
/// Deterministic: structurally identical input always yields identical keys.
#[must_use]
pub fn normalize(graph: &VirtualGraph) -> NormalizedGraph {
    let mut out = NormalizedGraph::new();
    for (index, root) in graph.roots.iter().enumerate() {
        // A root-level reference has no owner to connect from.
        if let Child::Node(node) = root {
            flatten(node, None, index, &mut out);
        }
    }
    out
}

fn flatten(node: &VirtualNode, parent: Option<&str>, index: usize, out: &mut NormalizedGraph) -> String {
    let key = node.key.clone().unwrap_or_else(|| synthesize_key(parent, index));

    let children = node
        .children
        .iter()
        .enumerate()
        .map(|(position, child)| match child {
            Child::Node(nested) => Edge::to(flatten(nested, Some(&key), position, out)),
            Child::Ref(reference) => Edge::from(reference),
        })
        .collect();

    let normalized = NormalizedNode {
        node_type: node.node_type.clone(),
        parameters: node.parameters.clone(),
        children,
    };
    if !out.insert(key.clone(), normalized) {
        warn!(key = %key, "Duplicate node key in graph, keeping first occurrence");
    }
    key
}
