//! Headless in-memory host.
//!
//! Implements the host audio API contract without producing sound. Every
//! primitive invocation is recorded as a [`HostOp`], and the resulting
//! connection topology, attribute and control values can be inspected. Used
//! by the test-suite and for dry-running graph updates.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use resound_core::{NodeType, ScheduleMethod};
use serde_json::Value;
use tracing::debug;

use crate::error::{HostError, HostResult};
use crate::host::{AudioControl, AudioHost, AudioResource, ResourceId};

/// A recorded host primitive invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    Create { id: ResourceId, node_type: NodeType },
    Start { id: ResourceId },
    Stop { id: ResourceId },
    Connect { from: ResourceId, to: ResourceId, control: Option<String> },
    Disconnect { from: ResourceId, to: Option<ResourceId>, control: Option<String> },
    SetAttribute { id: ResourceId, name: String, value: Value },
    SetControl { id: ResourceId, name: String, value: f64 },
    Schedule { id: ResourceId, name: String, method: ScheduleMethod, target: f64, at: f64 },
}

/// A connection between two live resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostEdge {
    pub from: ResourceId,
    pub to: ResourceId,
    pub control: Option<String>,
}

#[derive(Debug, Default)]
struct HostState {
    next_id: u64,
    time: f64,
    ops: Vec<HostOp>,
    node_types: HashMap<ResourceId, NodeType>,
    live: HashSet<ResourceId>,
    edges: BTreeSet<HostEdge>,
    attributes: HashMap<(ResourceId, String), Value>,
    controls: HashMap<(ResourceId, String), f64>,
    unsupported: HashSet<NodeType>,
}

type SharedState = Arc<Mutex<HostState>>;

/// In-memory implementation of [`AudioHost`].
///
/// Cloning yields another handle to the same host.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: SharedState,
}

impl MemoryHost {
    /// Create a host with every builtin node type available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the host refuse to construct `node_type`.
    #[must_use]
    pub fn without(self, node_type: NodeType) -> Self {
        self.state.lock().unsupported.insert(node_type);
        self
    }

    /// Set the audio clock.
    pub fn set_time(&self, time: f64) {
        self.state.lock().time = time;
    }

    /// All recorded operations.
    #[must_use]
    pub fn ops(&self) -> Vec<HostOp> {
        self.state.lock().ops.clone()
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.state.lock().ops.len()
    }

    /// Forget recorded operations.
    pub fn clear_ops(&self) {
        self.state.lock().ops.clear();
    }

    /// Current connections, in order.
    #[must_use]
    pub fn edges(&self) -> Vec<HostEdge> {
        self.state.lock().edges.iter().cloned().collect()
    }

    /// Whether a resource handle is still alive.
    #[must_use]
    pub fn is_live(&self, id: ResourceId) -> bool {
        self.state.lock().live.contains(&id)
    }

    /// Number of live resources.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Node type a resource was constructed as.
    #[must_use]
    pub fn node_type_of(&self, id: ResourceId) -> Option<NodeType> {
        self.state.lock().node_types.get(&id).cloned()
    }

    /// Last assigned attribute value.
    #[must_use]
    pub fn attribute(&self, id: ResourceId, name: &str) -> Option<Value> {
        self.state.lock().attributes.get(&(id, name.to_string())).cloned()
    }

    /// Current control value.
    #[must_use]
    pub fn control_value(&self, id: ResourceId, name: &str) -> Option<f64> {
        self.state.lock().controls.get(&(id, name.to_string())).copied()
    }

    fn record(state: &SharedState, op: HostOp) {
        debug!(?op, "Host operation");
        state.lock().ops.push(op);
    }
}

impl AudioHost for MemoryHost {
    fn create(&self, node_type: &NodeType) -> HostResult<Box<dyn AudioResource>> {
        let mut state = self.state.lock();
        if !node_type.is_builtin() || state.unsupported.contains(node_type) {
            return Err(HostError::UnsupportedNodeType(node_type.to_string()));
        }

        state.next_id += 1;
        let id = ResourceId(state.next_id);
        state.node_types.insert(id, node_type.clone());
        state.live.insert(id);

        let controls = default_controls(node_type)
            .iter()
            .map(|&(name, default)| {
                state.controls.insert((id, name.to_string()), default);
                MemoryControl { id, name: name.to_string(), default, state: Arc::clone(&self.state) }
            })
            .collect();

        state.ops.push(HostOp::Create { id, node_type: node_type.clone() });
        drop(state);

        Ok(Box::new(MemoryResource { id, controls, state: Arc::clone(&self.state) }))
    }

    fn current_time(&self) -> f64 {
        self.state.lock().time
    }
}

/// Documented default values of the controls each node type exposes.
fn default_controls(node_type: &NodeType) -> &'static [(&'static str, f64)] {
    match node_type {
        NodeType::Oscillator => &[("frequency", 440.0), ("detune", 0.0)],
        NodeType::BufferSource => &[("playbackRate", 1.0), ("detune", 0.0)],
        NodeType::BiquadFilter => &[("frequency", 350.0), ("detune", 0.0), ("Q", 1.0), ("gain", 0.0)],
        NodeType::ConstantSource => &[("offset", 1.0)],
        NodeType::Delay => &[("delayTime", 0.0)],
        NodeType::DynamicsCompressor => &[
            ("threshold", -24.0),
            ("knee", 30.0),
            ("ratio", 12.0),
            ("attack", 0.003),
            ("release", 0.25),
        ],
        NodeType::Gain => &[("gain", 1.0)],
        NodeType::Panner => &[
            ("positionX", 0.0),
            ("positionY", 0.0),
            ("positionZ", 0.0),
            ("orientationX", 1.0),
            ("orientationY", 0.0),
            ("orientationZ", 0.0),
        ],
        NodeType::StereoPanner => &[("pan", 0.0)],
        _ => &[],
    }
}

struct MemoryResource {
    id: ResourceId,
    controls: Vec<MemoryControl>,
    state: SharedState,
}

impl AudioResource for MemoryResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn start(&self) -> HostResult<()> {
        MemoryHost::record(&self.state, HostOp::Start { id: self.id });
        Ok(())
    }

    fn stop(&self) -> HostResult<()> {
        MemoryHost::record(&self.state, HostOp::Stop { id: self.id });
        Ok(())
    }

    fn connect(&self, destination: &dyn AudioResource, control: Option<&str>) -> HostResult<()> {
        if let Some(name) = control {
            if destination.control(name).is_none() {
                return Err(HostError::ConnectionFailed(format!("no control named {name}")));
            }
        }
        let edge = HostEdge { from: self.id, to: destination.id(), control: control.map(str::to_string) };
        let mut state = self.state.lock();
        state.ops.push(HostOp::Connect { from: edge.from, to: edge.to, control: edge.control.clone() });
        state.edges.insert(edge);
        Ok(())
    }

    fn disconnect(&self, destination: Option<&dyn AudioResource>, control: Option<&str>) -> HostResult<()> {
        let mut state = self.state.lock();
        let to = destination.map(|d| d.id());
        let before = state.edges.len();
        state.edges.retain(|edge| {
            edge.from != self.id
                || to.is_some_and(|to| edge.to != to || edge.control.as_deref() != control)
        });
        let removed = before - state.edges.len();
        state.ops.push(HostOp::Disconnect { from: self.id, to, control: control.map(str::to_string) });
        if to.is_some() && removed == 0 {
            return Err(HostError::InvalidState("resources are not connected".to_string()));
        }
        Ok(())
    }

    fn set_attribute(&self, name: &str, value: &Value) -> HostResult<()> {
        let mut state = self.state.lock();
        state.attributes.insert((self.id, name.to_string()), value.clone());
        state.ops.push(HostOp::SetAttribute { id: self.id, name: name.to_string(), value: value.clone() });
        Ok(())
    }

    fn control(&self, name: &str) -> Option<&dyn AudioControl> {
        self.controls.iter().find(|c| c.name == name).map(|c| c as &dyn AudioControl)
    }
}

impl Drop for MemoryResource {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live.remove(&self.id);
        state.edges.retain(|edge| edge.from != self.id && edge.to != self.id);
    }
}

struct MemoryControl {
    id: ResourceId,
    name: String,
    default: f64,
    state: SharedState,
}

impl AudioControl for MemoryControl {
    fn value(&self) -> f64 {
        self.state.lock().controls.get(&(self.id, self.name.clone())).copied().unwrap_or(self.default)
    }

    fn set_value(&self, value: f64) -> HostResult<()> {
        let mut state = self.state.lock();
        state.controls.insert((self.id, self.name.clone()), value);
        state.ops.push(HostOp::SetControl { id: self.id, name: self.name.clone(), value });
        Ok(())
    }

    fn default_value(&self) -> f64 {
        self.default
    }

    fn schedule(&self, method: ScheduleMethod, target: f64, at: f64) -> HostResult<()> {
        if method == ScheduleMethod::ExponentialRampToValueAtTime && target <= 0.0 {
            return Err(HostError::InvalidValue {
                name: self.name.clone(),
                reason: "exponential ramp target must be positive".to_string(),
            });
        }
        MemoryHost::record(
            &self.state,
            HostOp::Schedule { id: self.id, name: self.name.clone(), method, target, at },
        );
        Ok(())
    }
}
