//! Resound Engine - Applying virtual audio graphs to a live host.
//!
//! This crate owns everything with side effects:
//! - Creating, configuring and destroying host resources
//! - Scheduling connections into a deferred phase
//! - Orchestrating update cycles and reporting recovered problems
//! - An async driver, configuration loading and logging setup

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod memory;
pub mod registry;
pub mod report;
pub mod scheduler;

pub use config::{EngineConfig, LoggingConfig, ReconcileConfig, load_config};
pub use driver::{DriverRequest, EngineHandle};
pub use engine::{Engine, EngineState};
pub use error::{Error, HostError, HostResult, Result};
pub use host::{AudioControl, AudioHost, AudioResource, ResourceId};
pub use lifecycle::{PendingAssignment, ResourceManager};
pub use logging::{init_json_logging, init_logging};
pub use memory::{HostEdge, HostOp, MemoryHost};
pub use registry::{Capabilities, NodeRegistry, Registration};
pub use report::{DeferredReport, Diagnostic, UpdateReport};
pub use scheduler::{ConnectionScheduler, PendingConnection};
