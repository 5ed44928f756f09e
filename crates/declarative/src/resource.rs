//! Resource operations and the resource table
//!
//! A resource type is a [`Schema`] plus a set of [`ResourceOps`]. The
//! operations receive the shared provider value `M` (for a REST provider,
//! the configured client) and the instance's [`ResourceData`].

use crate::context::Context;
use crate::data::ResourceData;
use crate::error::Error;
use crate::schema::Schema;
use crate::types::{Diagnostic, Severity};
use crate::value::Attributes;
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle operations of one resource type
///
/// Create and update receive data built from declared configuration; read,
/// delete and exists receive data rebuilt from stored state. Read and
/// delete signal "gone" by clearing the id rather than by failing.
pub trait ResourceOps<M>: Send + Sync {
    fn create(&self, ctx: &Context, meta: &M, d: &mut ResourceData) -> Result<()>;

    fn read(&self, ctx: &Context, meta: &M, d: &mut ResourceData) -> Result<()>;

    fn update(&self, ctx: &Context, meta: &M, d: &mut ResourceData) -> Result<()>;

    fn delete(&self, ctx: &Context, meta: &M, d: &mut ResourceData) -> Result<()>;

    /// Adopt an existing remote object. The id is taken as given and the
    /// state is filled by a read.
    fn import(&self, ctx: &Context, meta: &M, d: &mut ResourceData) -> Result<()> {
        self.read(ctx, meta, d)
    }

    /// Cheap existence probe run before a refresh
    ///
    /// Types without a probe report `true` and rely on read alone.
    fn exists(&self, _ctx: &Context, _meta: &M, _d: &ResourceData) -> Result<bool> {
        Ok(true)
    }
}

/// One entry of the resource table
pub struct ResourceDefinition<M> {
    pub schema: Arc<Schema>,
    pub ops: Arc<dyn ResourceOps<M>>,
    /// Shown whenever the type is used
    pub deprecation: Option<String>,
}

impl<M> ResourceDefinition<M> {
    pub fn new(schema: Schema, ops: impl ResourceOps<M> + 'static) -> Self {
        Self {
            schema: Arc::new(schema),
            ops: Arc::new(ops),
            deprecation: None,
        }
    }

    #[must_use]
    pub fn deprecated(mut self, message: impl Into<String>) -> Self {
        self.deprecation = Some(message.into());
        self
    }
}

impl<M> Clone for ResourceDefinition<M> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            ops: Arc::clone(&self.ops),
            deprecation: self.deprecation.clone(),
        }
    }
}

/// Resource type name → definition
pub struct ResourceMap<M> {
    entries: BTreeMap<String, ResourceDefinition<M>>,
}

impl<M> Default for ResourceMap<M> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<M> ResourceMap<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, definition: ResourceDefinition<M>) {
        self.entries.insert(name.into(), definition);
    }

    /// Add every entry of another table; later entries win
    pub fn extend(&mut self, other: ResourceMap<M>) {
        self.entries.extend(other.entries);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceDefinition<M>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceDefinition<M>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate declared configuration for a resource type
    pub fn validate(
        &self,
        resource_type: &str,
        config: &Attributes,
    ) -> crate::error::Result<Vec<Diagnostic>> {
        let definition = self
            .get(resource_type)
            .ok_or_else(|| Error::UnknownResourceType(resource_type.to_string()))?;
        let mut diagnostics = definition.schema.validate(config);
        if let Some(message) = &definition.deprecation {
            diagnostics.insert(
                0,
                Diagnostic {
                    severity: Severity::Warning,
                    attribute: None,
                    summary: message.clone(),
                },
            );
        }
        Ok(diagnostics)
    }
}
