//! Deferred connection scheduling.
//!
//! Connections are established only after every node and parameter patch of
//! a cycle has been applied, so an edge may name a node created later in the
//! same cycle. Disconnections happen immediately.

use std::collections::VecDeque;

use resound_core::Edge;
use tracing::debug;

use crate::host::AudioHost;
use crate::lifecycle::ResourceManager;
use crate::report::{DeferredReport, Diagnostic};

/// A connection waiting for the deferred phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingConnection {
    /// Source node key
    pub from: String,
    /// Destination
    pub edge: Edge,
}

/// Queue of connection work.
#[derive(Debug, Default)]
pub struct ConnectionScheduler {
    queue: VecDeque<PendingConnection>,
}

impl ConnectionScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a connection. Identical pending connections are queued once.
    pub fn connect(&mut self, from: &str, edge: &Edge) {
        let pending = PendingConnection { from: from.to_string(), edge: edge.clone() };
        if self.queue.contains(&pending) {
            return;
        }
        debug!(from, to = %edge, "Connection scheduled");
        self.queue.push_back(pending);
    }

    /// Remove the connection from `from` to `edge` now.
    ///
    /// A pending connect for the same edge is cancelled. Returns `false` if
    /// either endpoint is gone or the host refused.
    pub fn disconnect<H: AudioHost>(&mut self, resources: &ResourceManager<H>, from: &str, edge: &Edge) -> bool {
        self.queue.retain(|pending| pending.from != from || pending.edge != *edge);

        let (Some(source), Some(destination)) = (resources.get(from), resources.get(&edge.key)) else {
            debug!(from, to = %edge, "Disconnect endpoint absent, skipping");
            return false;
        };
        match source.disconnect(Some(destination), edge.param.as_deref()) {
            Ok(()) => {
                debug!(from, to = %edge, "Disconnected");
                true
            }
            Err(error) => {
                debug!(from, to = %edge, error = %error, "Disconnect refused");
                false
            }
        }
    }

    /// Drain the queue, connecting every edge whose endpoints (and named
    /// control) exist at this point.
    pub fn run<H: AudioHost>(&mut self, resources: &ResourceManager<H>) -> DeferredReport {
        let mut report = DeferredReport::default();

        while let Some(PendingConnection { from, edge }) = self.queue.pop_front() {
            let source = resources.get(&from);
            let destination = resources.get(&edge.key);
            let (Some(source), Some(destination)) = (source, destination) else {
                debug!(from = %from, to = %edge, "Dangling reference, connection dropped");
                report.diagnostics.push(Diagnostic::DanglingReference { from, edge });
                continue;
            };
            if let Some(param) = &edge.param {
                if destination.control(param).is_none() {
                    debug!(from = %from, to = %edge, "Destination has no such control, connection dropped");
                    report.diagnostics.push(Diagnostic::DanglingReference { from, edge });
                    continue;
                }
            }

            match source.connect(destination, edge.param.as_deref()) {
                Ok(()) => {
                    debug!(from = %from, to = %edge, "Connected");
                    report.connections_made += 1;
                }
                Err(error) => {
                    debug!(from = %from, to = %edge, error = %error, "Host refused connection");
                    report.diagnostics.push(Diagnostic::HostRejected { key: from, operation: "connect", error });
                }
            }
        }

        report
    }

    /// Number of queued connections.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drop all queued connections.
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
