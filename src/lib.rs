//! OCCI infrastructure engine
//!
//! This crate provides a typed OCCI resource model with a category registry
//! and entity graph, per-family lifecycle state machines, a dispatch table
//! routing invoked actions to backend adapters, transactional per-principal
//! persistence, and NATS-based remote action delegation.

pub mod backend;
pub mod config;
pub mod delegation;
pub mod errors;
pub mod model;
pub mod state_machine;
pub mod store;

// Re-export commonly used types
pub use backend::dispatch::{DispatchTable, Operation, Parameters};
pub use backend::provider::IaasProvider;
pub use backend::Backend;
pub use config::BackendConfig;
pub use delegation::{DelegateConfig, QueueDelegate};
pub use errors::{EngineError, EngineResult};
pub use model::category::{Action, Category, CategoryId, Kind, Mixin};
pub use model::entity::{Entity, Link, Resource};
pub use model::Model;
