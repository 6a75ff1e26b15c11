//! Host audio API contract.
//!
//! The engine drives live resources only through these traits. Resources are
//! handles: every primitive takes `&self`, as the host owns the underlying
//! audio objects and their mutability.

use resound_core::{NodeType, ScheduleMethod};
use serde_json::Value;

use crate::error::HostResult;

/// Identity of a live resource handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// The host audio API: resource constructors and the audio clock.
#[cfg_attr(test, mockall::automock)]
pub trait AudioHost {
    /// Construct a resource of the given type.
    fn create(&self, node_type: &NodeType) -> HostResult<Box<dyn AudioResource>>;

    /// Current host clock time, in seconds.
    fn current_time(&self) -> f64;
}

/// A live audio resource.
pub trait AudioResource: Send {
    /// Handle identity.
    fn id(&self) -> ResourceId;

    /// Start producing signal. Only called for source node types.
    fn start(&self) -> HostResult<()> {
        Ok(())
    }

    /// Stop producing signal. Only called for source node types.
    fn stop(&self) -> HostResult<()> {
        Ok(())
    }

    /// Connect this resource's output to `destination`, either its primary
    /// input or the named control.
    fn connect(&self, destination: &dyn AudioResource, control: Option<&str>) -> HostResult<()>;

    /// Disconnect outputs. `None` disconnects every output; otherwise only
    /// the edge to `destination` (and `control`) is removed.
    fn disconnect(&self, destination: Option<&dyn AudioResource>, control: Option<&str>) -> HostResult<()>;

    /// Assign a plain attribute.
    fn set_attribute(&self, name: &str, value: &Value) -> HostResult<()>;

    /// Look up a named control.
    fn control(&self, name: &str) -> Option<&dyn AudioControl>;
}

/// A continuously controllable value of a resource.
pub trait AudioControl {
    /// Current value.
    fn value(&self) -> f64;

    /// Assign the value immediately.
    fn set_value(&self, value: f64) -> HostResult<()>;

    /// The documented default value.
    fn default_value(&self) -> f64;

    /// Schedule a change to `target` landing at absolute host time `at`.
    fn schedule(&self, method: ScheduleMethod, target: f64, at: f64) -> HostResult<()>;
}
