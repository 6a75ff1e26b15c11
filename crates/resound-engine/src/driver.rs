//! Async driver owning an engine inside a tokio task.
//!
//! Update requests are serialized over a channel and applied in arrival
//! order. The task yields to the runtime between the synchronous apply phase
//! and the deferred phase. A queued update is always applied completely.

use resound_core::VirtualGraph;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::host::AudioHost;
use crate::report::UpdateReport;

/// Requests accepted by the driver task.
#[derive(Debug)]
pub enum DriverRequest {
    /// Reconcile against a new graph
    Update { graph: VirtualGraph, reply: oneshot::Sender<UpdateReport> },
    /// Stop the task and hand the engine back
    Shutdown,
}

/// Handle for submitting updates to a running driver.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<DriverRequest>,
}

impl EngineHandle {
    /// Submit a graph and wait for its report.
    pub async fn update(&self, graph: VirtualGraph) -> Result<UpdateReport> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DriverRequest::Update { graph, reply }).await.map_err(|_| Error::DriverClosed)?;
        rx.await.map_err(|_| Error::DriverClosed)
    }

    /// Ask the driver to stop after the updates already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(DriverRequest::Shutdown).await.map_err(|_| Error::DriverClosed)
    }
}

/// Spawn a driver task owning `engine`.
///
/// The task ends on [`EngineHandle::shutdown`] or when every handle is
/// dropped, returning the engine.
pub fn spawn<H>(engine: Engine<H>) -> (EngineHandle, JoinHandle<Engine<H>>)
where
    H: AudioHost + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    let task = tokio::spawn(run(engine, rx));
    (EngineHandle { tx }, task)
}

async fn run<H: AudioHost>(mut engine: Engine<H>, mut rx: mpsc::Receiver<DriverRequest>) -> Engine<H> {
    info!("Engine driver started");

    while let Some(request) = rx.recv().await {
        match request {
            DriverRequest::Update { graph, reply } => {
                let mut report = engine.update(&graph);
                tokio::task::yield_now().await;
                report.absorb(engine.run_deferred());

                debug!(
                    patches = report.patches.len(),
                    diagnostics = report.diagnostics.len(),
                    "Update applied"
                );
                if reply.send(report).is_err() {
                    debug!("Update requester went away before the reply");
                }
            }
            DriverRequest::Shutdown => break,
        }
    }

    info!("Engine driver stopped");
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;
    use resound_core::{NodeType, VirtualNode};

    fn tone(frequency: f64) -> VirtualGraph {
        VirtualGraph::from_iter([VirtualNode::new(NodeType::Oscillator)
            .with_key("osc")
            .control("frequency", frequency)
            .child(VirtualNode::new(NodeType::Destination).with_key("out"))])
    }

    #[tokio::test]
    async fn test_updates_are_applied_in_order() {
        let host = MemoryHost::new();
        let (handle, task) = spawn(Engine::new(host.clone()));

        let first = handle.update(tone(440.0)).await.unwrap();
        assert_eq!(first.patches.created.nodes.len(), 2);
        assert_eq!(first.connections_made, 1);

        let second = handle.update(tone(220.0)).await.unwrap();
        assert_eq!(second.patches.len(), 1);

        handle.shutdown().await.unwrap();
        let engine = task.await.unwrap();
        let id = engine.resource_id("osc").unwrap();
        assert_eq!(host.control_value(id, "frequency"), Some(220.0));
        assert_eq!(host.edges().len(), 1);
    }

    #[tokio::test]
    async fn test_closed_driver_is_an_error() {
        let (handle, task) = spawn(Engine::new(MemoryHost::new()));
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(matches!(handle.update(tone(440.0)).await, Err(Error::DriverClosed)));
    }
}
