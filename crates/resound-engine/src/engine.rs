//! Update cycle orchestration.
//!
//! An [`Engine`] turns successive virtual graphs into host operations. Each
//! cycle normalizes the new graph, diffs it against the previous one and
//! applies the patches in two phases:
//!
//! 1. [`Engine::update`] synchronously applies removals, creations and
//!    updates, and queues connections and fallback assignments.
//! 2. [`Engine::run_deferred`] performs the queued work.
//!
//! [`Engine::reconcile`] runs both phases back to back.

use resound_core::{DiffOptions, NormalizedGraph, PatchSet, VirtualGraph, diff_with, normalize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::host::{AudioHost, ResourceId};
use crate::lifecycle::ResourceManager;
use crate::registry::NodeRegistry;
use crate::report::{DeferredReport, UpdateReport};
use crate::scheduler::ConnectionScheduler;

/// Where the engine is in its update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No deferred work outstanding
    Idle,
    /// Patches applied, deferred work outstanding
    Applying,
}

/// Declarative audio graph reconciler.
pub struct Engine<H> {
    resources: ResourceManager<H>,
    scheduler: ConnectionScheduler,
    previous: NormalizedGraph,
    options: DiffOptions,
    state: EngineState,
}

impl<H: AudioHost> Engine<H> {
    /// Create an engine with the builtin node types.
    #[must_use]
    pub fn new(host: H) -> Self {
        Self::with_registry(host, NodeRegistry::builtin())
    }

    /// Create an engine with a custom node registry.
    #[must_use]
    pub fn with_registry(host: H, registry: NodeRegistry) -> Self {
        Self {
            resources: ResourceManager::new(host, registry),
            scheduler: ConnectionScheduler::new(),
            previous: NormalizedGraph::new(),
            options: DiffOptions::default(),
            state: EngineState::Idle,
        }
    }

    /// Create an engine configured by `config`.
    #[must_use]
    pub fn with_config(host: H, config: &EngineConfig) -> Self {
        let mut engine = Self::new(host).with_options(config.diff_options());
        engine.resources = engine.resources.with_fallback(config.engine.fallback_node_type.clone());
        engine
    }

    /// Set the diff options.
    #[must_use]
    pub fn with_options(mut self, options: DiffOptions) -> Self {
        self.options = options;
        self
    }

    /// The host.
    pub fn host(&self) -> &H {
        self.resources.host()
    }

    /// The resource pool.
    pub fn resources(&self) -> &ResourceManager<H> {
        &self.resources
    }

    /// The resource pool, for registering custom node types.
    pub fn resources_mut(&mut self) -> &mut ResourceManager<H> {
        &mut self.resources
    }

    /// The normalized graph applied by the last update.
    pub fn previous(&self) -> &NormalizedGraph {
        &self.previous
    }

    /// Current cycle state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Keys of every live resource, sorted.
    #[must_use]
    pub fn pool_keys(&self) -> Vec<String> {
        self.resources.keys()
    }

    /// Handle identity of the resource at `key`.
    #[must_use]
    pub fn resource_id(&self, key: &str) -> Option<ResourceId> {
        self.resources.resource_id(key)
    }

    /// Apply `graph` synchronously, queueing connections for
    /// [`Engine::run_deferred`].
    ///
    /// Deferred work left over from the previous cycle is completed first.
    pub fn update(&mut self, graph: &VirtualGraph) -> UpdateReport {
        let mut report = UpdateReport::default();
        if self.state == EngineState::Applying {
            debug!("Completing deferred work of previous cycle");
            report.absorb(self.run_deferred());
        }
        self.state = EngineState::Applying;

        let current = normalize(graph);
        let patches = diff_with(&self.previous, &current, self.options);
        debug!(
            removed = patches.removed.len(),
            created = patches.created.len(),
            updated = patches.updated.len(),
            "Graph diffed"
        );

        self.apply_removed(&patches, &current);
        self.apply_created(&patches, &current);
        self.apply_updated(&patches, &current);
        self.previous = current;

        report.diagnostics.extend(self.resources.take_diagnostics());
        report.pending = self.scheduler.pending() + self.resources.pending_assignments();
        report.patches = patches;
        report
    }

    fn apply_removed(&mut self, patches: &PatchSet, current: &NormalizedGraph) {
        for patch in &patches.removed.connections {
            // The host holds one connection per distinct edge, which a
            // surviving duplicate still needs
            let survives = current.get(&patch.from).is_some_and(|node| node.children.contains(&patch.edge));
            if survives {
                debug!(from = %patch.from, to = %patch.edge, "Edge still present at another position, keeping");
                continue;
            }
            self.scheduler.disconnect(&self.resources, &patch.from, &patch.edge);
        }
        for patch in &patches.removed.properties {
            debug!(key = %patch.key, label = patch.parameter.label(), "Clearing parameter");
            self.resources.clear_parameter(&patch.key, &patch.parameter);
        }
        for patch in &patches.removed.nodes {
            self.resources.destroy_node(&patch.key);
        }
    }

    fn apply_created(&mut self, patches: &PatchSet, current: &NormalizedGraph) {
        for patch in &patches.created.nodes {
            self.resources.create_node(&patch.key, &patch.node.node_type, &patch.node.parameters);

            // Surviving nodes may already point at this key
            for (from, edge) in current.edges_into(&patch.key) {
                self.scheduler.connect(from, edge);
            }
        }
        for patch in &patches.created.properties {
            debug!(key = %patch.key, label = patch.parameter.label(), "Setting parameter");
            self.resources.set_parameter(&patch.key, &patch.parameter);
        }
        for patch in &patches.created.connections {
            self.scheduler.connect(&patch.from, &patch.edge);
        }
    }

    fn apply_updated(&mut self, patches: &PatchSet, current: &NormalizedGraph) {
        for patch in &patches.updated.nodes {
            debug!(key = %patch.key, node_type = %patch.node.node_type, "Node type changed, recreating");
            self.resources.destroy_node(&patch.key);
            self.resources.create_node(&patch.key, &patch.node.node_type, &patch.node.parameters);

            // The old resource took its edges with it, in both directions
            for edge in &patch.node.children {
                self.scheduler.connect(&patch.key, edge);
            }
            for (from, edge) in current.edges_into(&patch.key) {
                self.scheduler.connect(from, edge);
            }
        }
        for patch in &patches.updated.properties {
            debug!(key = %patch.key, label = patch.parameter.label(), "Replacing parameter");
            self.resources.set_parameter(&patch.key, &patch.parameter);
        }
    }

    /// Perform deferred assignments and queued connections, returning to
    /// [`EngineState::Idle`].
    pub fn run_deferred(&mut self) -> DeferredReport {
        let mut report = self.resources.run_deferred();
        let connections = self.scheduler.run(&self.resources);
        report.connections_made += connections.connections_made;
        report.diagnostics.extend(connections.diagnostics);
        self.state = EngineState::Idle;
        report
    }

    /// Apply `graph` completely: [`Engine::update`] then
    /// [`Engine::run_deferred`].
    pub fn reconcile(&mut self, graph: &VirtualGraph) -> UpdateReport {
        let mut report = self.update(graph);
        report.absorb(self.run_deferred());
        info!(
            patches = report.patches.len(),
            connections = report.connections_made,
            diagnostics = report.diagnostics.len(),
            resources = self.resources.len(),
            "Graph reconciled"
        );
        report
    }

    /// Destroy every resource and forget the previous graph.
    pub fn clear(&mut self) {
        self.scheduler.clear();
        for key in self.resources.keys() {
            self.resources.destroy_node(&key);
        }
        self.resources.take_diagnostics();
        self.previous = NormalizedGraph::new();
        self.state = EngineState::Idle;
        info!("Engine cleared");
    }
}
