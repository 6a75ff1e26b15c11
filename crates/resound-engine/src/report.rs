//! Non-fatal diagnostics and per-update reports.

use std::fmt;

use resound_core::{Edge, NodeType, PatchSet};

use crate::error::HostError;

/// A recoverable problem met while applying patches.
///
/// None of these abort an update: the affected resource or edge degrades and
/// the rest of the graph is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Node type not registered or not constructible; a pass-through was used
    UnknownNodeType { key: String, node_type: NodeType },
    /// A connection names an endpoint (or control) that does not exist
    DanglingReference { from: String, edge: Edge },
    /// A control label is absent on the resource; plain assignment was deferred
    UnsupportedParameterTarget { key: String, label: String },
    /// A host primitive returned an error
    HostRejected { key: String, operation: &'static str, error: HostError },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { key, node_type } => {
                write!(f, "unknown node type {node_type} for {key}, substituted pass-through")
            }
            Self::DanglingReference { from, edge } => write!(f, "dangling reference {from} -> {edge}"),
            Self::UnsupportedParameterTarget { key, label } => {
                write!(f, "{key} has no control {label}, deferred plain assignment")
            }
            Self::HostRejected { key, operation, error } => write!(f, "host rejected {operation} on {key}: {error}"),
        }
    }
}

/// Outcome of one update cycle.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Patches applied this cycle
    pub patches: PatchSet,
    /// Problems recovered from
    pub diagnostics: Vec<Diagnostic>,
    /// Connections made in the deferred phase
    pub connections_made: usize,
    /// Deferred plain assignments performed
    pub assignments_made: usize,
    /// Deferred work still queued when the report was produced
    pub pending: usize,
}

impl UpdateReport {
    /// Fold the outcome of a deferred phase into this report.
    pub fn absorb(&mut self, deferred: DeferredReport) {
        self.diagnostics.extend(deferred.diagnostics);
        self.connections_made += deferred.connections_made;
        self.assignments_made += deferred.assignments_made;
        self.pending = 0;
    }

    /// Whether nothing needed recovery.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Outcome of a deferred phase.
#[derive(Debug, Clone, Default)]
pub struct DeferredReport {
    pub diagnostics: Vec<Diagnostic>,
    pub connections_made: usize,
    pub assignments_made: usize,
}
