//! Resound Core - Virtual audio graph model, normalization and diffing.
//!
//! This crate contains the pure, side-effect-free half of the reconciler:
//! - The virtual graph data model and its JSON wire shape
//! - Normalization of nested graphs into a flat keyed form
//! - Diffing of two normalized graphs into create/update/remove patches

pub mod diff;
pub mod error;
pub mod graph;
pub mod node;
pub mod normalize;
pub mod param;

pub use diff::{
    Changes, ConnectionDiff, ConnectionPatch, DiffOptions, NodePatch, PatchSet, PropertyPatch, diff,
    diff_with,
};
pub use error::{Error, Result};
pub use graph::{Child, ReferenceNode, VirtualGraph, VirtualNode};
pub use node::NodeType;
pub use normalize::{Edge, NormalizedGraph, NormalizedNode, normalize, synthesize_key};
pub use param::{ParamKind, Parameter, ScheduleMethod, ScheduledChange};
