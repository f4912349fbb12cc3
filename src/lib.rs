//! artifex - Plugin-driven artifact lifecycle engine
//!
//! Typed artifacts (documents, spreadsheets, diagrams, forms, generated
//! images and voice, chats and more) are created, updated, transformed and
//! deleted through one orchestrator. Each type is owned by a plugin that
//! supplies its factory, validation rules, lifecycle hooks and exports.
//!
//! # Architecture
//!
//! Every mutation runs through a middleware pipeline:
//! - Logging and metadata stamping wrap the whole operation
//! - Validation checks the payload against every rule registered for its type
//! - Plugin hooks run around the inner construct or convert step
//!
//! The orchestrator then persists through a [`store::CollectionStore`],
//! journals a lifecycle event and notifies reference holders.
//!
//! # Modules
//!
//! - `domain`: Artifact, type tags, lifecycle events
//! - `core`: Factory, validation, plugins, middleware, orchestrator
//! - `plugins`: The fourteen built-in artifact types
//! - `store`: Collection and blob persistence
//! - `adapters`: Generation service integrations
//! - `references`: Keeping artifact references current
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create a document
//! echo '{"title": "Notes", "content": "Hello"}' | artifex create document
//!
//! # Render it
//! artifex export <id> --format html
//!
//! # See what happened
//! artifex history
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod plugins;
pub mod references;
pub mod store;

// Re-export main types at crate root for convenience
pub use core::{Orchestrator, PluginManager};
pub use domain::{Artifact, ArtifactContent, ArtifactId, ArtifactType, LifecycleEvent, LifecycleEventType};
pub use error::{ArtifactError, Result, ValidationFailure};
pub use plugins::{register_builtin, PluginServices};
