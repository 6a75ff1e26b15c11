//! Virtual graph description.
//!
//! A [`VirtualGraph`] is plain snapshot data: an ordered forest of nodes whose
//! children are the destinations each node feeds. Non-tree shapes (fan-in,
//! feedback, modulation of another node's control) are expressed with
//! [`ReferenceNode`]s naming another node by key.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::NodeType;
use crate::param::{Parameter, ScheduledChange};

/// Wire tag of reference nodes.
pub const REF_NODE_TAG: &str = "RefNode";

/// A node of the virtual graph.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualNode {
    /// Explicit identity; synthesized from the position when absent
    pub key: Option<String>,
    /// Type tag
    pub node_type: NodeType,
    /// Ordered parameters
    pub parameters: Vec<Parameter>,
    /// Ordered destinations this node is connected to
    pub children: Vec<Child>,
}

impl VirtualNode {
    /// Create an unkeyed node with no parameters or children.
    pub fn new(node_type: impl Into<NodeType>) -> Self {
        Self { key: None, node_type: node_type.into(), parameters: Vec::new(), children: Vec::new() }
    }

    /// Set an explicit key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Append a parameter.
    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Append a plain attribute.
    #[must_use]
    pub fn property(self, label: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.param(Parameter::property(label, value))
    }

    /// Append a control value.
    #[must_use]
    pub fn control(self, label: impl Into<String>, value: f64) -> Self {
        self.param(Parameter::control(label, value))
    }

    /// Append a scheduled control change.
    #[must_use]
    pub fn scheduled(self, label: impl Into<String>, change: ScheduledChange) -> Self {
        self.param(Parameter::scheduled(label, change))
    }

    /// Append a child (a destination of this node).
    #[must_use]
    pub fn child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// Pointer to another node of the same graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceNode {
    /// Key of the referenced node
    pub key: String,
    /// Control of the referenced node to target instead of its primary input
    pub param: Option<String>,
}

impl ReferenceNode {
    /// Reference the primary input of `key`.
    pub fn to(key: impl Into<String>) -> Self {
        Self { key: key.into(), param: None }
    }

    /// Reference control `param` of `key`.
    pub fn to_param(key: impl Into<String>, param: impl Into<String>) -> Self {
        Self { key: key.into(), param: Some(param.into()) }
    }

    /// Parse the dotted wire notation `key` or `key.param`.
    ///
    /// The last dot separates the control label, so `voice.1.gain` targets
    /// control `gain` of key `voice.1`. A key containing a dot can only be
    /// referenced together with a control; `voice.1` alone reads as control
    /// `1` of `voice`.
    pub fn parse(reference: &str) -> Result<Self> {
        let parsed = match reference.rsplit_once('.') {
            Some((key, param)) => Self::to_param(key, param),
            None => Self::to(reference),
        };
        if parsed.key.is_empty() || parsed.param.as_deref() == Some("") {
            return Err(Error::InvalidReference(reference.to_string()));
        }
        Ok(parsed)
    }

    /// Dotted wire notation.
    #[must_use]
    pub fn dotted(&self) -> String {
        match &self.param {
            Some(param) => format!("{}.{param}", self.key),
            None => self.key.clone(),
        }
    }
}

/// Entry of a node's child list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireNode", into = "WireNode")]
pub enum Child {
    Node(VirtualNode),
    Ref(ReferenceNode),
}

impl From<VirtualNode> for Child {
    fn from(node: VirtualNode) -> Self {
        Self::Node(node)
    }
}

impl From<ReferenceNode> for Child {
    fn from(reference: ReferenceNode) -> Self {
        Self::Ref(reference)
    }
}

/// Serialized shape shared by nodes and reference nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    properties: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    connections: Vec<Child>,
}

impl TryFrom<WireNode> for Child {
    type Error = Error;

    fn try_from(wire: WireNode) -> Result<Self> {
        if wire.node_type == REF_NODE_TAG {
            let key = wire.key.ok_or(Error::MissingReferenceKey)?;
            return ReferenceNode::parse(&key).map(Child::Ref);
        }
        Ok(Child::Node(VirtualNode {
            key: wire.key,
            node_type: NodeType::from(wire.node_type),
            parameters: wire.properties,
            children: wire.connections,
        }))
    }
}

impl From<Child> for WireNode {
    fn from(child: Child) -> Self {
        match child {
            Child::Node(node) => Self {
                node_type: node.node_type.into(),
                key: node.key,
                properties: node.parameters,
                connections: node.children,
            },
            Child::Ref(reference) => Self {
                node_type: REF_NODE_TAG.to_string(),
                key: Some(reference.dotted()),
                properties: Vec::new(),
                connections: Vec::new(),
            },
        }
    }
}

/// Complete description of the desired graph for one update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualGraph {
    /// Ordered roots
    pub roots: Vec<Child>,
}

impl VirtualGraph {
    /// Create a graph from its roots.
    #[must_use]
    pub fn new(roots: Vec<Child>) -> Self {
        Self { roots }
    }

    /// Parse a graph from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the graph in its JSON wire form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<VirtualNode> for VirtualGraph {
    fn from_iter<I: IntoIterator<Item = VirtualNode>>(iter: I) -> Self {
        Self { roots: iter.into_iter().map(Child::Node).collect() }
    }
}
