//! Diffing of normalized graphs into patch sets.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::normalize::{Edge, NormalizedGraph, NormalizedNode};
use crate::param::{ParamKind, Parameter};

/// Strategy for diffing a node's outgoing edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionDiff {
    /// Compare child lists index for index
    #[default]
    Positional,
    /// Compare child lists as sets of edges, ignoring order
    KeySet,
}

/// Options for [`diff_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Connection diff strategy
    pub connections: ConnectionDiff,
}

/// Node-level patch.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePatch {
    /// Node key
    pub key: String,
    /// The node as it is in the current graph (or the previous one for removals)
    pub node: NormalizedNode,
}

/// Parameter-level patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyPatch {
    /// Node key
    pub key: String,
    /// The parameter (previous value for removals)
    pub parameter: Parameter,
}

/// Connection-level patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPatch {
    /// Source node key
    pub from: String,
    /// Position of the edge in the source's child list
    pub index: usize,
    /// The edge
    pub edge: Edge,
}

/// Patches of one change type, grouped by sub-domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub nodes: Vec<NodePatch>,
    pub properties: Vec<PropertyPatch>,
    pub connections: Vec<ConnectionPatch>,
}

impl Changes {
    /// Number of patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.properties.len() + self.connections.len()
    }

    /// Whether there are no patches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of diffing two normalized graphs.
///
/// Patches are grouped by type only; application order is decided by the
/// caller. The differ never emits connection updates: a changed edge is a
/// removal plus a creation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    pub removed: Changes,
    pub created: Changes,
    pub updated: Changes,
}

impl PatchSet {
    /// Total number of patches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.removed.len() + self.created.len() + self.updated.len()
    }

    /// Whether the two graphs were equivalent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Diff two graphs with the default options.
#[must_use]
pub fn diff(previous: &NormalizedGraph, current: &NormalizedGraph) -> PatchSet {
    diff_with(previous, current, DiffOptions::default())
}

/// Diff two graphs.
#[must_use]
pub fn diff_with(previous: &NormalizedGraph, current: &NormalizedGraph, options: DiffOptions) -> PatchSet {
    let mut patches = PatchSet::default();

    let keys: BTreeSet<&str> = previous.keys().chain(current.keys()).collect();
    for key in keys {
        match (previous.get(key), current.get(key)) {
            (None, Some(node)) => {
                for (index, edge) in node.children.iter().enumerate() {
                    patches.created.connections.push(connection(key, index, edge));
                }
                patches.created.nodes.push(NodePatch { key: key.to_string(), node: node.clone() });
            }
            (Some(node), None) => {
                for (index, edge) in node.children.iter().enumerate() {
                    patches.removed.connections.push(connection(key, index, edge));
                }
                patches.removed.nodes.push(NodePatch { key: key.to_string(), node: node.clone() });
            }
            (Some(old), Some(new)) if old.node_type != new.node_type => {
                patches.updated.nodes.push(NodePatch { key: key.to_string(), node: new.clone() });
            }
            (Some(old), Some(new)) => {
                diff_parameters(key, &old.parameters, &new.parameters, &mut patches);
                match options.connections {
                    ConnectionDiff::Positional => {
                        diff_edges_positional(key, &old.children, &new.children, &mut patches);
                    }
                    ConnectionDiff::KeySet => {
                        diff_edges_key_set(key, &old.children, &new.children, &mut patches);
                    }
                }
            }
            (None, None) => {}
        }
    }

    patches
}

fn connection(from: &str, index: usize, edge: &Edge) -> ConnectionPatch {
    ConnectionPatch { from: from.to_string(), index, edge: edge.clone() }
}

fn property(key: &str, parameter: &Parameter) -> PropertyPatch {
    PropertyPatch { key: key.to_string(), parameter: parameter.clone() }
}

fn diff_parameters(key: &str, old: &[Parameter], new: &[Parameter], patches: &mut PatchSet) {
    // Scheduled changes are never matched against history.
    let index = |params: &[Parameter]| -> HashMap<(String, ParamKind), usize> {
        params
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_scheduled())
            .map(|(i, p)| ((p.label().to_string(), p.kind()), i))
            .collect()
    };
    let old_index = index(old);
    let new_index = index(new);

    for parameter in old.iter().filter(|p| !p.is_scheduled()) {
        if !new_index.contains_key(&(parameter.label().to_string(), parameter.kind())) {
            patches.removed.properties.push(property(key, parameter));
        }
    }

    for (position, parameter) in new.iter().enumerate() {
        if parameter.is_scheduled() {
            patches.created.properties.push(property(key, parameter));
            continue;
        }
        let identity = (parameter.label().to_string(), parameter.kind());
        // Later duplicates of one identity shadow earlier ones.
        if new_index.get(&identity) != Some(&position) {
            continue;
        }
        match old_index.get(&identity) {
            None => patches.created.properties.push(property(key, parameter)),
            Some(&previous) if old[previous] != *parameter => {
                patches.updated.properties.push(property(key, parameter));
            }
            Some(_) => {}
        }
    }
}

fn diff_edges_positional(key: &str, old: &[Edge], new: &[Edge], patches: &mut PatchSet) {
    for index in 0..old.len().max(new.len()) {
        match (old.get(index), new.get(index)) {
            (Some(before), Some(after)) if before == after => {}
            (before, after) => {
                if let Some(edge) = before {
                    patches.removed.connections.push(connection(key, index, edge));
                }
                if let Some(edge) = after {
                    patches.created.connections.push(connection(key, index, edge));
                }
            }
        }
    }
}

fn diff_edges_key_set(key: &str, old: &[Edge], new: &[Edge], patches: &mut PatchSet) {
    let old_set: HashSet<&Edge> = old.iter().collect();
    let new_set: HashSet<&Edge> = new.iter().collect();

    for (index, edge) in old.iter().enumerate() {
        if !new_set.contains(edge) {
            patches.removed.connections.push(connection(key, index, edge));
        }
    }
    let mut seen = HashSet::new();
    for (index, edge) in new.iter().enumerate() {
        if !old_set.contains(edge) && seen.insert(edge) {
            patches.created.connections.push(connection(key, index, edge));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ReferenceNode, VirtualGraph, VirtualNode};
    use crate::node::NodeType;
    use crate::normalize::normalize;
    use crate::param::ScheduledChange;
    use assert_matches::assert_matches;

    fn synth(frequency: f64) -> NormalizedGraph {
        normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Oscillator)
            .control("frequency", frequency)
            .child(
                VirtualNode::new(NodeType::Gain)
                    .control("gain", 0.1)
                    .child(VirtualNode::new(NodeType::Destination)),
            )]))
    }

    #[test]
    fn test_identical_graphs_produce_no_patches() {
        assert!(diff(&synth(440.0), &synth(440.0)).is_empty());
    }

    #[test]
    fn test_empty_to_graph_creates_everything() {
        let patches = diff(&NormalizedGraph::new(), &synth(440.0));

        assert_eq!(patches.created.nodes.len(), 3);
        assert_eq!(patches.created.connections.len(), 2);
        // Parameters travel with node creation.
        assert!(patches.created.properties.is_empty());
        assert!(patches.removed.is_empty());
        assert!(patches.updated.is_empty());
    }

    #[test]
    fn test_single_value_change_is_one_update() {
        let patches = diff(&synth(440.0), &synth(880.0));

        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches.updated.properties,
            vec![PropertyPatch { key: "#0".into(), parameter: Parameter::control("frequency", 880.0) }]
        );
    }

    #[test]
    fn test_node_type_change_is_node_update_only() {
        let before = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Oscillator)
            .with_key("src")
            .control("frequency", 440.0)]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::ConstantSource)
            .with_key("src")
            .control("offset", 0.5)]));

        let patches = diff(&before, &after);
        assert_eq!(patches.len(), 1);
        assert_matches!(
            patches.updated.nodes.as_slice(),
            [NodePatch { key, node }] if key == "src" && node.node_type == NodeType::ConstantSource
        );
    }

    #[test]
    fn test_removing_unkeyed_source_leaves_keyed_target_untouched() {
        let gain = || VirtualNode::new(NodeType::Gain).with_key("g").child(VirtualNode::new(NodeType::Destination));
        let before = normalize(&VirtualGraph::from_iter([
            VirtualNode::new(NodeType::Oscillator).child(ReferenceNode::to("g")),
            gain(),
        ]));
        // Keep the gain at the same position so nothing else shifts.
        let after = normalize(&VirtualGraph::new(vec![ReferenceNode::to("placeholder").into(), gain().into()]));

        let patches = diff(&before, &after);
        assert_eq!(patches.removed.nodes.len(), 1);
        assert_eq!(patches.removed.nodes[0].key, "#0");
        assert_eq!(
            patches.removed.connections,
            vec![ConnectionPatch { from: "#0".into(), index: 0, edge: Edge::to("g") }]
        );
        assert!(patches.created.is_empty());
        assert!(patches.updated.is_empty());
        assert!(patches.removed.properties.is_empty());
    }

    #[test]
    fn test_removing_subtree_cascades_to_nested_nodes() {
        let before = normalize(&VirtualGraph::from_iter([
            VirtualNode::new(NodeType::Gain).with_key("keep"),
            VirtualNode::new(NodeType::Oscillator)
                .with_key("gone")
                .child(VirtualNode::new(NodeType::Gain).child(ReferenceNode::to("keep"))),
        ]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain).with_key("keep")]));

        let patches = diff(&before, &after);
        let removed: Vec<_> = patches.removed.nodes.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(removed, vec!["gone", "gone/0"]);
        assert_eq!(patches.removed.connections.len(), 2);
        assert!(patches.removed.connections.iter().all(|c| c.from.starts_with("gone")));
        assert!(patches.created.is_empty());
    }

    #[test]
    fn test_parameter_added_and_removed() {
        let before = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::BiquadFilter)
            .with_key("f")
            .property("type", "lowpass")
            .control("Q", 1.0)]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::BiquadFilter)
            .with_key("f")
            .property("type", "lowpass")
            .control("frequency", 1200.0)]));

        let patches = diff(&before, &after);
        assert_eq!(patches.removed.properties, vec![PropertyPatch { key: "f".into(), parameter: Parameter::control("Q", 1.0) }]);
        assert_eq!(
            patches.created.properties,
            vec![PropertyPatch { key: "f".into(), parameter: Parameter::control("frequency", 1200.0) }]
        );
        assert!(patches.updated.is_empty());
    }

    #[test]
    fn test_property_and_control_with_same_label_are_distinct() {
        let before = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("g")
            .property("gain", 1.0)]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("g")
            .control("gain", 1.0)]));

        let patches = diff(&before, &after);
        assert_eq!(patches.removed.properties.len(), 1);
        assert_eq!(patches.created.properties.len(), 1);
        assert!(patches.updated.is_empty());
    }

    #[test]
    fn test_scheduled_changes_are_always_reemitted() {
        let graph = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("env")
            .scheduled("gain", ScheduledChange::linear(0.0, 1.0))]));

        let patches = diff(&graph, &graph);
        assert_eq!(patches.len(), 1);
        assert_matches!(&patches.created.properties[0].parameter, Parameter::Scheduled { label, .. } if label == "gain");

        // Dropping the scheduled change emits nothing: it cannot be cancelled.
        let cleared = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain).with_key("env")]));
        assert!(diff(&graph, &cleared).is_empty());
    }

    #[test]
    fn test_positional_reorder_is_two_removes_and_two_creates() {
        let node = |a: &str, b: &str| {
            normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
                .with_key("split")
                .child(ReferenceNode::to(a))
                .child(ReferenceNode::to(b))]))
        };

        let patches = diff(&node("left", "right"), &node("right", "left"));
        assert_eq!(patches.removed.connections.len(), 2);
        assert_eq!(patches.created.connections.len(), 2);

        let patches = diff_with(
            &node("left", "right"),
            &node("right", "left"),
            DiffOptions { connections: ConnectionDiff::KeySet },
        );
        assert!(patches.is_empty());
    }

    #[test]
    fn test_positional_changed_target_and_growth() {
        let before = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("src")
            .child(ReferenceNode::to("a"))
            .child(ReferenceNode::to("b"))]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("src")
            .child(ReferenceNode::to("a"))
            .child(ReferenceNode::to_param("b", "gain"))
            .child(ReferenceNode::to("c"))]));

        let patches = diff(&before, &after);
        assert_eq!(patches.removed.connections, vec![ConnectionPatch { from: "src".into(), index: 1, edge: Edge::to("b") }]);
        assert_eq!(
            patches.created.connections,
            vec![
                ConnectionPatch { from: "src".into(), index: 1, edge: Edge::to_param("b", "gain") },
                ConnectionPatch { from: "src".into(), index: 2, edge: Edge::to("c") },
            ]
        );
    }

    #[test]
    fn test_key_set_reports_membership_changes() {
        let before = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("src")
            .child(ReferenceNode::to("a"))
            .child(ReferenceNode::to("b"))]));
        let after = normalize(&VirtualGraph::from_iter([VirtualNode::new(NodeType::Gain)
            .with_key("src")
            .child(ReferenceNode::to("c"))
            .child(ReferenceNode::to("a"))]));

        let patches = diff_with(&before, &after, DiffOptions { connections: ConnectionDiff::KeySet });
        assert_eq!(patches.removed.connections.len(), 1);
        assert_eq!(patches.removed.connections[0].edge, Edge::to("b"));
        assert_eq!(patches.created.connections.len(), 1);
        assert_eq!(patches.created.connections[0].edge, Edge::to("c"));
    }
}
