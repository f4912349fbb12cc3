//! Core lifecycle logic.
//!
//! This module contains:
//! - Validation: per-type rule registry
//! - Factory: type-indexed constructors
//! - Plugin / PluginManager: the plugin contract and its registry
//! - Middleware: the pipeline wrapped around every mutation
//! - Transform: content conversion strategies
//! - Journal: append-only lifecycle log
//! - Orchestrator: create, update, transform, delete

pub mod factory;
pub mod journal;
pub mod middleware;
pub mod orchestrator;
pub mod payload;
pub mod plugin;
pub mod plugin_manager;
pub mod transform;
pub mod validation;

// Re-export commonly used types
pub use factory::TypeFactory;
pub use journal::Journal;
pub use middleware::{Middleware, MiddlewareContext, Next, Operation, Pipeline};
pub use orchestrator::Orchestrator;
pub use plugin::{ArtifactPlugin, BatchConfig, ExportFormat, PluginManifest};
pub use plugin_manager::PluginManager;
pub use transform::{ContentConverter, FnConverter, GeneratedConversion};
pub use validation::{FieldKind, FnRule, RequiredFields, StructuralRule, ValidationRegistry, ValidationRule};
