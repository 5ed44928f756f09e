//! # Declarative
//!
//! A framework for declarative management of remote resources.
//!
//! Resource types are described by a [`Schema`] of typed attributes and a set
//! of [`ResourceOps`]. Declared configuration is validated against the
//! schema, compared with persisted [`State`] into an [`ExecutionPlan`], and
//! converged by the [`executor`].
//!
//! ## Core Concepts
//!
//! - **Schema**: attribute metadata (type, required/optional/computed,
//!   force-new, sensitive, defaults, validators, diff suppression)
//! - **ResourceData**: one instance's prior state and declared config, with
//!   typed accessors that understand "only if changed"
//! - **FieldSet**: a static table mapping attributes to fields of a typed
//!   payload, used to pack and unpack in both directions
//! - **ExecutionPlan**: create / update / replace / delete per instance
//! - **Executor**: applies a plan in parallel and records the outcome
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{Attribute, FieldSet, Marshal, Schema};
//!
//! #[derive(Default, serde::Serialize)]
//! struct Repo { key: String, notes: Option<String> }
//!
//! impl Marshal for Repo {
//!     fn fields() -> FieldSet<Self> {
//!         FieldSet::new()
//!             .attr("key", |r| &r.key, |r| &mut r.key)
//!             .attr("notes", |r| &r.notes, |r| &mut r.notes)
//!     }
//! }
//!
//! let schema = Schema::new()
//!     .with("key", Attribute::string().required().force_new())
//!     .with("notes", Attribute::string().optional());
//! ```

pub mod context;
pub mod data;
pub mod diff;
pub mod error;
pub mod executor;
pub mod marshal;
pub mod planner;
pub mod resource;
pub mod schema;
pub mod state;
pub mod types;
pub mod value;

pub use context::{
    AutoConfirm, AutoDecline, CancellationToken, ConfirmCallback, Context, NoProgress,
    ProgressCallback,
};
pub use data::ResourceData;
pub use diff::{AttributeDiff, compute_diffs};
pub use error::{Error, Result};
pub use executor::{execute, import, refresh};
pub use marshal::{Attr, FieldSet, Marshal};
pub use planner::{Action, DeclaredResource, ExecutionPlan, PlanSummary, PlannedChange};
pub use resource::{ResourceDefinition, ResourceMap, ResourceOps};
pub use schema::{Attribute, Schema, Validator, ValueType};
pub use state::{Address, InstanceState, State};
pub use types::{ApplyResult, Diagnostic, ExecuteOptions, ExecuteSummary, Severity};
pub use value::{Attributes, Value};
