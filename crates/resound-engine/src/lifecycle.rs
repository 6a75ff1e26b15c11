//! Resource lifecycle management.
//!
//! The [`ResourceManager`] owns the resource pool: every live resource handle,
//! indexed by node key. All operations are best-effort and ignore keys that
//! are not in the pool, so patches applied out of order degrade instead of
//! failing.

use std::collections::HashMap;

use resound_core::{NodeType, Parameter};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HostError;
use crate::host::{AudioHost, AudioResource, ResourceId};
use crate::registry::{Capabilities, NodeRegistry};
use crate::report::{DeferredReport, Diagnostic};

/// A live resource in the pool.
struct PoolEntry {
    /// Type the resource was actually constructed as
    node_type: NodeType,
    capabilities: Capabilities,
    resource: Box<dyn AudioResource>,
}

/// A plain attribute assignment waiting for the deferred phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAssignment {
    pub key: String,
    pub label: String,
    pub value: Value,
}

/// Owns the resource pool and the host resources in it.
pub struct ResourceManager<H> {
    host: H,
    registry: NodeRegistry,
    fallback: NodeType,
    pool: HashMap<String, PoolEntry>,
    pending: Vec<PendingAssignment>,
    diagnostics: Vec<Diagnostic>,
}

impl<H: AudioHost> ResourceManager<H> {
    /// Create a manager with an empty pool.
    #[must_use]
    pub fn new(host: H, registry: NodeRegistry) -> Self {
        Self {
            host,
            registry,
            fallback: NodeType::Gain,
            pool: HashMap::new(),
            pending: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Node type substituted for unknown types.
    #[must_use]
    pub fn with_fallback(mut self, fallback: NodeType) -> Self {
        self.fallback = fallback;
        self
    }

    /// The host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// The node registry.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// The node registry, for registering custom types.
    pub fn registry_mut(&mut self) -> &mut NodeRegistry {
        &mut self.registry
    }

    /// Get a live resource by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&dyn AudioResource> {
        self.pool.get(key).map(|entry| entry.resource.as_ref())
    }

    /// Check whether a key has a live resource.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.pool.contains_key(key)
    }

    /// Handle identity of the resource at `key`.
    #[must_use]
    pub fn resource_id(&self, key: &str) -> Option<ResourceId> {
        self.get(key).map(AudioResource::id)
    }

    /// Node type the resource at `key` was constructed as.
    #[must_use]
    pub fn node_type(&self, key: &str) -> Option<&NodeType> {
        self.pool.get(key).map(|entry| &entry.node_type)
    }

    /// All pool keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.pool.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of live resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Create the resource for `key`, apply `parameters` in order, and start
    /// it if it is a signal source.
    ///
    /// Unknown node types get the fallback pass-through resource instead.
    /// Returns `None` only if not even the fallback could be constructed.
    pub fn create_node(&mut self, key: &str, node_type: &NodeType, parameters: &[Parameter]) -> Option<ResourceId> {
        if self.pool.contains_key(key) {
            warn!(key, "Resource already exists, replacing");
            self.destroy_node(key);
        }

        let (resource, constructed_as, capabilities) = self.construct(key, node_type)?;
        let id = resource.id();
        debug!(key, node_type = %constructed_as, id = id.0, "Resource created");
        self.pool.insert(key.to_string(), PoolEntry { node_type: constructed_as, capabilities, resource });

        for parameter in parameters {
            self.set_parameter(key, parameter);
        }

        if capabilities.source {
            if let Some(entry) = self.pool.get(key) {
                if let Err(error) = entry.resource.start() {
                    warn!(key, error = %error, "Failed to start source");
                    self.diagnostics.push(Diagnostic::HostRejected { key: key.to_string(), operation: "start", error });
                }
            }
        }

        Some(id)
    }

    fn construct(
        &mut self,
        key: &str,
        node_type: &NodeType,
    ) -> Option<(Box<dyn AudioResource>, NodeType, Capabilities)> {
        if let Some(registration) = self.registry.get(node_type) {
            match registration.construct(&self.host) {
                Ok(resource) => return Some((resource, node_type.clone(), registration.capabilities)),
                Err(error) => warn!(key, %node_type, error = %error, "Host could not construct node type"),
            }
        } else {
            warn!(key, %node_type, fallback = %self.fallback, "Unknown node type, substituting pass-through");
        }
        self.diagnostics.push(Diagnostic::UnknownNodeType { key: key.to_string(), node_type: node_type.clone() });

        let fallback = self.registry.get(&self.fallback).map(|registration| {
            (registration.construct(&self.host), registration.capabilities)
        });
        match fallback {
            Some((Ok(resource), capabilities)) => Some((resource, self.fallback.clone(), capabilities)),
            Some((Err(error), _)) => {
                warn!(key, fallback = %self.fallback, error = %error, "Fallback resource could not be constructed");
                self.diagnostics.push(Diagnostic::HostRejected { key: key.to_string(), operation: "create", error });
                None
            }
            None => {
                let error = HostError::UnsupportedNodeType(self.fallback.to_string());
                warn!(key, fallback = %self.fallback, "Fallback node type is not registered");
                self.diagnostics.push(Diagnostic::HostRejected { key: key.to_string(), operation: "create", error });
                None
            }
        }
    }

    /// Stop (if a source), disconnect all outputs and drop the resource at
    /// `key`. Returns `false` if there was nothing to destroy.
    pub fn destroy_node(&mut self, key: &str) -> bool {
        let Some(entry) = self.pool.remove(key) else {
            return false;
        };

        if entry.capabilities.source {
            if let Err(error) = entry.resource.stop() {
                debug!(key, error = %error, "Stop failed during destroy");
            }
        }
        if let Err(error) = entry.resource.disconnect(None, None) {
            debug!(key, error = %error, "Disconnect failed during destroy");
        }
        self.pending.retain(|assignment| assignment.key != key);

        debug!(key, id = entry.resource.id().0, "Resource destroyed");
        true
    }

    /// Apply a parameter to the resource at `key`.
    ///
    /// Scheduled changes land relative to the host's current time. A control
    /// or scheduled change naming a control the resource lacks becomes a
    /// deferred plain attribute assignment.
    pub fn set_parameter(&mut self, key: &str, parameter: &Parameter) {
        let Some(entry) = self.pool.get(key) else {
            debug!(key, label = parameter.label(), "Parameter target absent, skipping");
            return;
        };
        let resource = entry.resource.as_ref();

        // Ok(Some(value)) means the control is missing and a plain assignment is owed
        let outcome = match parameter {
            Parameter::Property { label, value } => resource.set_attribute(label, value).map(|()| None),
            Parameter::Control { label, value } => match resource.control(label) {
                Some(control) => control.set_value(*value).map(|()| None),
                None => Ok(Some(Value::from(*value))),
            },
            Parameter::Scheduled { label, change } => match resource.control(label) {
                Some(control) => {
                    let at = change.resolve(self.host.current_time());
                    control.schedule(change.method, change.target, at).map(|()| None)
                }
                None => Ok(Some(Value::from(change.target))),
            },
        };

        match outcome {
            Ok(None) => {}
            Ok(Some(value)) => self.defer_assignment(key, parameter.label(), value),
            Err(error) => {
                warn!(key, label = parameter.label(), error = %error, "Host rejected parameter");
                self.diagnostics.push(Diagnostic::HostRejected { key: key.to_string(), operation: "set", error });
            }
        }
    }

    /// Reset a parameter that disappeared from the graph.
    ///
    /// Attributes keep their last value and scheduled changes cannot be
    /// cancelled; controls return to their default.
    pub fn clear_parameter(&mut self, key: &str, parameter: &Parameter) {
        let Parameter::Control { label, .. } = parameter else {
            return;
        };
        let Some(control) = self.pool.get(key).and_then(|entry| entry.resource.control(label)) else {
            return;
        };
        if let Err(error) = control.set_value(control.default_value()) {
            warn!(key, label = %label, error = %error, "Failed to reset control");
            self.diagnostics.push(Diagnostic::HostRejected { key: key.to_string(), operation: "reset", error });
        }
    }

    fn defer_assignment(&mut self, key: &str, label: &str, value: Value) {
        debug!(key, label, "No such control, deferring plain assignment");
        self.diagnostics.push(Diagnostic::UnsupportedParameterTarget {
            key: key.to_string(),
            label: label.to_string(),
        });
        self.pending.push(PendingAssignment { key: key.to_string(), label: label.to_string(), value });
    }

    /// Number of deferred assignments queued.
    #[must_use]
    pub fn pending_assignments(&self) -> usize {
        self.pending.len()
    }

    /// Perform queued plain assignments whose resource still exists.
    pub fn run_deferred(&mut self) -> DeferredReport {
        let mut report = DeferredReport::default();
        for assignment in std::mem::take(&mut self.pending) {
            let Some(entry) = self.pool.get(&assignment.key) else {
                continue;
            };
            match entry.resource.set_attribute(&assignment.label, &assignment.value) {
                Ok(()) => report.assignments_made += 1,
                Err(error) => {
                    warn!(key = %assignment.key, label = %assignment.label, error = %error, "Deferred assignment failed");
                    report.diagnostics.push(Diagnostic::HostRejected {
                        key: assignment.key,
                        operation: "assign",
                        error,
                    });
                }
            }
        }
        report
    }

    /// Drain diagnostics collected since the last call.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MockAudioHost;
    use crate::memory::{HostOp, MemoryHost};
    use assert_matches::assert_matches;
    use resound_core::{ScheduleMethod, ScheduledChange};

    fn manager() -> (MemoryHost, ResourceManager<MemoryHost>) {
        let host = MemoryHost::new();
        (host.clone(), ResourceManager::new(host, NodeRegistry::builtin()))
    }

    #[test]
    fn test_create_applies_parameters_then_starts_source() {
        let (host, mut manager) = manager();
        let id = manager
            .create_node(
                "osc",
                &NodeType::Oscillator,
                &[Parameter::property("type", "square"), Parameter::control("frequency", 220.0)],
            )
            .unwrap();

        let ops = host.ops();
        assert_matches!(ops.as_slice(), [
            HostOp::Create { .. },
            HostOp::SetAttribute { name, .. },
            HostOp::SetControl { value, .. },
            HostOp::Start { .. },
        ] if name == "type" && *value == 220.0);
        assert_eq!(host.control_value(id, "frequency"), Some(220.0));
    }

    #[test]
    fn test_non_source_is_not_started() {
        let (host, mut manager) = manager();
        manager.create_node("g", &NodeType::Gain, &[]);
        assert!(!host.ops().iter().any(|op| matches!(op, HostOp::Start { .. })));
    }

    #[test]
    fn test_unknown_type_falls_back_to_gain() {
        let (host, mut manager) = manager();
        let id = manager.create_node("x", &NodeType::from("GranularNode"), &[]).unwrap();

        assert_eq!(host.node_type_of(id), Some(NodeType::Gain));
        assert_eq!(manager.node_type("x"), Some(&NodeType::Gain));
        assert_matches!(
            manager.take_diagnostics().as_slice(),
            [Diagnostic::UnknownNodeType { key, .. }] if key == "x"
        );
    }

    #[test]
    fn test_host_refusal_falls_back_to_gain() {
        let host = MemoryHost::new().without(NodeType::Convolver);
        let mut manager = ResourceManager::new(host.clone(), NodeRegistry::builtin());

        let id = manager.create_node("verb", &NodeType::Convolver, &[]).unwrap();
        assert_eq!(host.node_type_of(id), Some(NodeType::Gain));
        assert_eq!(manager.take_diagnostics().len(), 1);
    }

    #[test]
    fn test_destroy_stops_disconnects_and_is_idempotent() {
        let (host, mut manager) = manager();
        let id = manager.create_node("osc", &NodeType::Oscillator, &[]).unwrap();
        host.clear_ops();

        assert!(manager.destroy_node("osc"));
        assert_eq!(
            host.ops(),
            vec![HostOp::Stop { id }, HostOp::Disconnect { from: id, to: None, control: None }]
        );
        assert!(!host.is_live(id));

        assert!(!manager.destroy_node("osc"));
        assert_eq!(host.op_count(), 2);
    }

    #[test]
    fn test_operations_on_absent_key_are_ignored() {
        let (host, mut manager) = manager();
        manager.set_parameter("ghost", &Parameter::control("gain", 0.5));
        manager.clear_parameter("ghost", &Parameter::control("gain", 0.5));
        assert_eq!(host.op_count(), 0);
        assert!(manager.take_diagnostics().is_empty());
    }

    #[test]
    fn test_scheduled_change_is_relative_to_host_time() {
        let (host, mut manager) = manager();
        let id = manager.create_node("env", &NodeType::Gain, &[]).unwrap();
        host.set_time(3.0);

        manager.set_parameter("env", &Parameter::scheduled("gain", ScheduledChange::linear(0.0, 0.5)));
        assert_matches!(
            host.ops().last(),
            Some(HostOp::Schedule { id: target, method: ScheduleMethod::LinearRampToValueAtTime, at, .. })
                if *target == id && (*at - 3.5).abs() < f64::EPSILON
        );
    }

    #[test]
    fn test_missing_control_defers_plain_assignment() {
        let (host, mut manager) = manager();
        let id = manager.create_node("shaper", &NodeType::WaveShaper, &[]).unwrap();

        manager.set_parameter("shaper", &Parameter::scheduled("drive", ScheduledChange::set(0.8, 0.0)));
        assert_eq!(manager.pending_assignments(), 1);
        assert_eq!(host.attribute(id, "drive"), None);
        assert_matches!(
            manager.take_diagnostics().as_slice(),
            [Diagnostic::UnsupportedParameterTarget { label, .. }] if label == "drive"
        );

        let report = manager.run_deferred();
        assert_eq!(report.assignments_made, 1);
        assert_eq!(host.attribute(id, "drive"), Some(Value::from(0.8)));
    }

    #[test]
    fn test_deferred_assignment_dropped_with_its_resource() {
        let (_host, mut manager) = manager();
        manager.create_node("shaper", &NodeType::WaveShaper, &[Parameter::control("drive", 2.0)]);
        assert_eq!(manager.pending_assignments(), 1);

        manager.destroy_node("shaper");
        assert_eq!(manager.run_deferred().assignments_made, 0);
    }

    #[test]
    fn test_clear_parameter_resets_control_to_default() {
        let (host, mut manager) = manager();
        let id = manager.create_node("f", &NodeType::BiquadFilter, &[Parameter::control("Q", 8.0)]).unwrap();

        manager.clear_parameter("f", &Parameter::control("Q", 8.0));
        assert_eq!(host.control_value(id, "Q"), Some(1.0));

        host.clear_ops();
        manager.clear_parameter("f", &Parameter::property("type", "highpass"));
        manager.clear_parameter("f", &Parameter::scheduled("Q", ScheduledChange::set(2.0, 1.0)));
        assert_eq!(host.op_count(), 0);
    }

    #[test]
    fn test_host_rejection_is_reported_not_raised() {
        let (_host, mut manager) = manager();
        manager.create_node("g", &NodeType::Gain, &[]);
        manager.set_parameter("g", &Parameter::scheduled("gain", ScheduledChange::exponential(0.0, 1.0)));

        assert_matches!(
            manager.take_diagnostics().as_slice(),
            [Diagnostic::HostRejected { operation: "set", error: HostError::InvalidValue { .. }, .. }]
        );
    }

    #[test]
    fn test_schedule_time_comes_from_host_clock() {
        let resources = MemoryHost::new();
        let mut host = MockAudioHost::new();
        host.expect_create().returning(move |node_type| resources.create(node_type));
        host.expect_current_time().times(1).return_const(12.0);

        let mut manager = ResourceManager::new(host, NodeRegistry::builtin());
        manager.create_node("osc", &NodeType::Oscillator, &[]);
        manager.set_parameter("osc", &Parameter::scheduled("frequency", ScheduledChange::set(880.0, 0.25)));
        assert!(manager.take_diagnostics().is_empty());
    }
}
