//! Node type registration table.
//!
//! Maps each node type to a constructor and a capability descriptor. The
//! builtin enumeration is registered by default; hosts with extra node types
//! register them here without touching diff or apply logic.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use resound_core::NodeType;

use crate::error::HostResult;
use crate::host::{AudioHost, AudioResource};

/// Function that constructs a resource on a host.
pub type Constructor = Arc<dyn Fn(&dyn AudioHost) -> HostResult<Box<dyn AudioResource>> + Send + Sync>;

/// What the lifecycle manager may do with a node type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Signal source with start/stop
    pub source: bool,
}

impl Capabilities {
    /// Capabilities of a signal source.
    #[must_use]
    pub fn source() -> Self {
        Self { source: true }
    }
}

/// A registered node type.
#[derive(Clone)]
pub struct Registration {
    constructor: Constructor,
    /// Capability descriptor
    pub capabilities: Capabilities,
}

impl Registration {
    /// Construct a resource.
    pub fn construct(&self, host: &dyn AudioHost) -> HostResult<Box<dyn AudioResource>> {
        (self.constructor)(host)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration").field("capabilities", &self.capabilities).finish_non_exhaustive()
    }
}

/// Registry of node constructors.
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    entries: HashMap<NodeType, Registration>,
}

impl NodeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Create a registry with every builtin node type delegating to the
    /// host's own constructor.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for node_type in NodeType::builtins() {
            let capabilities = if is_source(&node_type) { Capabilities::source() } else { Capabilities::default() };
            registry.register_host_type(node_type, capabilities);
        }
        registry
    }

    /// Register a node type with a custom constructor.
    pub fn register<F>(&mut self, node_type: impl Into<NodeType>, capabilities: Capabilities, constructor: F)
    where
        F: Fn(&dyn AudioHost) -> HostResult<Box<dyn AudioResource>> + Send + Sync + 'static,
    {
        self.entries.insert(node_type.into(), Registration { constructor: Arc::new(constructor), capabilities });
    }

    /// Register a node type the host constructs natively.
    pub fn register_host_type(&mut self, node_type: impl Into<NodeType>, capabilities: Capabilities) {
        let node_type = node_type.into();
        let host_type = node_type.clone();
        self.register(node_type, capabilities, move |host| host.create(&host_type));
    }

    /// Look up a node type.
    #[must_use]
    pub fn get(&self, node_type: &NodeType) -> Option<&Registration> {
        self.entries.get(node_type)
    }

    /// Check if a type is registered.
    #[must_use]
    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.entries.contains_key(node_type)
    }

    /// Unregister a node type.
    pub fn unregister(&mut self, node_type: &NodeType) -> bool {
        self.entries.remove(node_type).is_some()
    }

    /// List all registered types.
    #[must_use]
    pub fn types(&self) -> Vec<NodeType> {
        let mut types: Vec<_> = self.entries.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn is_source(node_type: &NodeType) -> bool {
    matches!(node_type, NodeType::Oscillator | NodeType::BufferSource | NodeType::ConstantSource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHost;

    #[test]
    fn test_builtin_registers_every_builtin_type() {
        let registry = NodeRegistry::builtin();
        for node_type in NodeType::builtins() {
            assert!(registry.contains(&node_type), "{node_type} missing");
        }
        assert!(!registry.contains(&NodeType::Other("Custom".into())));
    }

    #[test]
    fn test_sources_are_flagged() {
        let registry = NodeRegistry::builtin();
        assert!(registry.get(&NodeType::Oscillator).unwrap().capabilities.source);
        assert!(registry.get(&NodeType::ConstantSource).unwrap().capabilities.source);
        assert!(!registry.get(&NodeType::Gain).unwrap().capabilities.source);
        assert!(!registry.get(&NodeType::MediaElementSource).unwrap().capabilities.source);
    }

    #[test]
    fn test_custom_registration_constructs_through_closure() {
        let mut registry = NodeRegistry::builtin();
        registry.register("NoiseNode", Capabilities::source(), |host| host.create(&NodeType::BufferSource));

        let host = MemoryHost::new();
        let registration = registry.get(&NodeType::from("NoiseNode")).unwrap();
        let resource = registration.construct(&host).unwrap();
        assert_eq!(host.node_type_of(resource.id()), Some(NodeType::BufferSource));
    }

    #[test]
    fn test_unregister() {
        let mut registry = NodeRegistry::builtin();
        assert!(registry.unregister(&NodeType::Convolver));
        assert!(!registry.unregister(&NodeType::Convolver));
        assert_eq!(registry.types().len(), 18);
    }
}
