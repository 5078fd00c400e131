//! # Declarative
//!
//! Omission-aware reconciliation of desired resources against a CRUD
//! backend.
//!
//! ## Core Concepts
//!
//! - **DesiredResource**: a user-declared item; anything it leaves out is
//!   left alone on the server
//! - **ServerResource**: the backend's live view of a resource
//! - **ResourceAdapter**: per-kind glue that reads state and schema, builds
//!   payloads and performs CRUD calls
//! - **Engine**: validates, resolves tags, diffs by composite key and
//!   applies the result
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{DesiredResource, Engine, ServerCache, SyncOptions};
//!
//! let engine = Engine::new(&tag_store, SyncOptions::default());
//! let mut cache = ServerCache::new();
//!
//! let desired = vec![
//!     DesiredResource::new("qb", "qBittorrent").with_scalar("priority", 2),
//! ];
//! let summary = engine.sync_resources(&adapter, desired, &mut cache)?;
//! println!("{} added, {} updated", summary.added, summary.updated);
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceAdapter`]: CRUD and schema access for one resource kind
//! - [`TagStore`]: tag listing and creation
//! - [`ProgressCallback`]: receives apply progress
//!
//! The crate has no knowledge of HTTP or of any particular backend.

pub mod context;
pub mod diff;
pub mod equality;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod planner;
pub mod resource;
pub mod tags;
pub mod types;

// Re-export main types at crate root
pub use context::{
    DeletePolicy, NoProgress, Operation, ProgressCallback, ServerCache, SyncOptions, TagStore,
};
pub use diff::{Diff, Unchanged, Update, compute_diff, update_is_partial};
pub use equality::{is_secret_field, json_eq, resources_equal};
pub use error::{SyncError, ValidationError, is_in_use_message};
pub use executor::{Engine, ensure_schema};
pub use normalize::{camel_case, normalize, normalize_scalars};
pub use planner::Plan;
pub use resource::{BoxedAdapter, ResourceAdapter};
pub use types::{
    ApplyResult, CompositeKey, DesiredResource, Field, MASKED_SECRET, ScalarKind, ScalarSpec,
    SchemaTemplate, ServerResource, SyncSummary, Tag, TagRef, TemplateField,
};
