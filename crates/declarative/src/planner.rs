//! Execution planner - compares declared resources with stored state

use crate::diff::{AttributeDiff, compute_diffs, requires_replacement};
use crate::error::{Error, Result};
use crate::resource::ResourceMap;
use crate::state::{Address, InstanceState, State};
use crate::types::{Diagnostic, has_errors};
use crate::value::Attributes;
use serde::{Deserialize, Serialize};

/// A resource instance as declared in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResource {
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub attributes: Attributes,
}

/// What has to happen to one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    /// Delete then create, because a force-new attribute changed
    Replace,
    Delete,
    NoOp,
}

impl Action {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Create => "+",
            Self::Update => "~",
            Self::Replace => "-/+",
            Self::Delete => "-",
            Self::NoOp => " ",
        }
    }
}

/// One planned change
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub address: Address,
    pub action: Action,
    /// Remote id from state (empty for creates)
    pub id: String,
    /// Stored attributes (empty for creates)
    pub prior: Attributes,
    /// Declared attributes (empty for deletes)
    pub config: Attributes,
    pub diffs: Vec<AttributeDiff>,
}

/// Ordered list of planned changes
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan declared resources against state.
    ///
    /// Every declared resource is validated first; any error diagnostic
    /// aborts planning before a single request is made.
    pub fn build<M>(
        declared: &[DeclaredResource],
        state: &State,
        resources: &ResourceMap<M>,
    ) -> Result<Self> {
        let diagnostics = validate_all(declared, resources)?;
        if has_errors(&diagnostics) {
            return Err(Error::Validation(diagnostics));
        }
        for warning in &diagnostics {
            log::warn!("{warning}");
        }

        let mut plan = Self::new();
        for resource in declared {
            let definition = resources
                .get(&resource.address.resource_type)
                .ok_or_else(|| Error::UnknownResourceType(resource.address.resource_type.clone()))?;

            let change = match state.get(&resource.address) {
                None => PlannedChange {
                    address: resource.address.clone(),
                    action: Action::Create,
                    id: String::new(),
                    prior: Attributes::new(),
                    config: resource.attributes.clone(),
                    diffs: compute_diffs(&definition.schema, &Attributes::new(), &resource.attributes),
                },
                Some(existing) => {
                    let diffs =
                        compute_diffs(&definition.schema, &existing.attributes, &resource.attributes);
                    let action = if diffs.is_empty() {
                        Action::NoOp
                    } else if requires_replacement(&diffs) {
                        Action::Replace
                    } else {
                        Action::Update
                    };
                    PlannedChange {
                        address: resource.address.clone(),
                        action,
                        id: existing.id.clone(),
                        prior: existing.attributes.clone(),
                        config: resource.attributes.clone(),
                        diffs,
                    }
                }
            };
            plan.changes.push(change);
        }

        for existing in &state.resources {
            if !declared.iter().any(|d| d.address == existing.address) {
                plan.changes.push(delete_change(existing.address.clone(), existing));
            }
        }

        Ok(plan)
    }

    /// Plan the removal of everything in state
    pub fn destroy(state: &State) -> Self {
        Self {
            changes: state
                .resources
                .iter()
                .map(|r| delete_change(r.address.clone(), r))
                .collect(),
        }
    }

    /// Filter plan to only include changes matching a predicate
    #[must_use]
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            changes: self.changes.into_iter().filter(|c| predicate(c)).collect(),
        }
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    #[must_use]
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|c| matches_filter(&c.address, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// Changes that actually do something
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action != Action::NoOp)
    }

    /// Number of changes that actually do something
    pub fn total_changes(&self) -> usize {
        self.pending().count()
    }

    /// Check if plan has nothing to do
    pub fn is_empty(&self) -> bool {
        self.total_changes() == 0
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary::from_plan(self)
    }
}

fn delete_change(address: Address, existing: &InstanceState) -> PlannedChange {
    PlannedChange {
        address,
        action: Action::Delete,
        id: existing.id.clone(),
        prior: existing.attributes.clone(),
        config: Attributes::new(),
        diffs: Vec::new(),
    }
}

/// Validate every declared resource, collecting all diagnostics
pub fn validate_all<M>(
    declared: &[DeclaredResource],
    resources: &ResourceMap<M>,
) -> Result<Vec<Diagnostic>> {
    let mut diagnostics = Vec::new();
    for resource in declared {
        let found = resources.validate(&resource.address.resource_type, &resource.attributes)?;
        diagnostics.extend(found.into_iter().map(|mut d| {
            d.attribute = Some(match d.attribute {
                Some(attr) => format!("{}.{attr}", resource.address),
                None => resource.address.to_string(),
            });
            d
        }));
    }
    Ok(diagnostics)
}

/// Plan summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub creates: usize,
    pub updates: usize,
    pub replaces: usize,
    pub deletes: usize,
    pub unchanged: usize,
}

impl PlanSummary {
    pub fn from_plan(plan: &ExecutionPlan) -> Self {
        let mut summary = Self::default();
        for change in &plan.changes {
            match change.action {
                Action::Create => summary.creates += 1,
                Action::Update => summary.updates += 1,
                Action::Replace => summary.replaces += 1,
                Action::Delete => summary.deletes += 1,
                Action::NoOp => summary.unchanged += 1,
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.replaces + self.deletes
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

/// Check if an address matches the filter criteria
fn matches_filter(address: &Address, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // "artifactory_local" matches every local repository type
        let matches_type = address.resource_type == rt || address.resource_type.starts_with(rt);
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && address.name != n
    {
        return false;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::data::ResourceData;
    use crate::resource::{ResourceDefinition, ResourceOps};
    use crate::schema::{Attribute, Schema};
    use crate::value::Value;

    struct Noop;

    impl ResourceOps<()> for Noop {
        fn create(&self, _: &Context, _: &(), _: &mut ResourceData) -> anyhow::Result<()> {
            Ok(())
        }
        fn read(&self, _: &Context, _: &(), _: &mut ResourceData) -> anyhow::Result<()> {
            Ok(())
        }
        fn update(&self, _: &Context, _: &(), _: &mut ResourceData) -> anyhow::Result<()> {
            Ok(())
        }
        fn delete(&self, _: &Context, _: &(), _: &mut ResourceData) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn resources() -> ResourceMap<()> {
        let schema = Schema::new()
            .with("key", Attribute::string().required().force_new())
            .with("notes", Attribute::string().optional());
        let mut map = ResourceMap::new();
        map.insert("test_repo", ResourceDefinition::new(schema, Noop));
        map
    }

    fn declared(name: &str, notes: &str) -> DeclaredResource {
        let mut attributes = Attributes::new();
        attributes.insert("key".into(), Value::from(name));
        attributes.insert("notes".into(), Value::from(notes));
        DeclaredResource {
            address: Address::new("test_repo", name),
            attributes,
        }
    }

    fn stored(name: &str, notes: &str) -> InstanceState {
        let d = declared(name, notes);
        InstanceState {
            address: d.address,
            id: name.to_string(),
            attributes: d.attributes,
        }
    }

    #[test]
    fn test_plan_actions() {
        let mut state = State::default();
        state.upsert(stored("same", "x"));
        state.upsert(stored("changed", "old"));
        state.upsert(stored("gone", "x"));

        let plan = ExecutionPlan::build(
            &[declared("same", "x"), declared("changed", "new"), declared("fresh", "")],
            &state,
            &resources(),
        )
        .unwrap();

        let actions: Vec<_> = plan
            .changes
            .iter()
            .map(|c| (c.address.name.as_str(), c.action))
            .collect();
        assert_eq!(
            actions,
            vec![
                ("same", Action::NoOp),
                ("changed", Action::Update),
                ("fresh", Action::Create),
                ("gone", Action::Delete),
            ]
        );
        assert_eq!(plan.total_changes(), 3);
    }

    #[test]
    fn test_force_new_replaces() {
        let mut state = State::default();
        let mut existing = stored("r", "x");
        existing.attributes.insert("key".into(), "old-key".into());
        state.upsert(existing);

        let plan = ExecutionPlan::build(&[declared("r", "x")], &state, &resources()).unwrap();
        assert_eq!(plan.changes[0].action, Action::Replace);
    }

    #[test]
    fn test_validation_errors_abort_planning() {
        let bad = DeclaredResource {
            address: Address::new("test_repo", "bad"),
            attributes: Attributes::new(),
        };
        let err = ExecutionPlan::build(&[bad], &State::default(), &resources()).unwrap_err();
        match err {
            Error::Validation(diags) => {
                assert_eq!(diags[0].attribute.as_deref(), Some("test_repo.bad.key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_type() {
        let bad = DeclaredResource {
            address: Address::new("nope", "x"),
            attributes: Attributes::new(),
        };
        assert!(matches!(
            ExecutionPlan::build(&[bad], &State::default(), &resources()),
            Err(Error::UnknownResourceType(_))
        ));
    }

    #[test]
    fn test_destroy_and_target_filter() {
        let mut state = State::default();
        state.upsert(stored("a", "x"));
        state.upsert(stored("b", "x"));

        let plan = ExecutionPlan::destroy(&state).filter_by_target(Some("test_repo.b"));
        assert_eq!(plan.changes.len(), 1);
        assert_eq!(plan.summary().deletes, 1);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target("artifactory_local"),
            (Some("artifactory_local".to_string()), None)
        );
        assert_eq!(
            parse_target("artifactory_xray_watch.all"),
            (
                Some("artifactory_xray_watch".to_string()),
                Some("all".to_string())
            )
        );
        assert_eq!(parse_target("a.b.c"), (None, Some("a.b.c".to_string())));
    }
}
