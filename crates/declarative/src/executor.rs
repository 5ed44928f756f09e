//! Execution engine - applies planned changes in parallel and refreshes state

use crate::context::{ConfirmCallback, Context, ProgressCallback};
use crate::data::ResourceData;
use crate::planner::{Action, ExecutionPlan, PlannedChange};
use crate::resource::{ResourceDefinition, ResourceMap};
use crate::state::{Address, InstanceState, State};
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use crate::value::Attributes;
use anyhow::{Context as _, Result};
use rayon::prelude::*;

/// How a finished change affects stored state
enum StateUpdate {
    Keep,
    Upsert(InstanceState),
    Remove(Address),
}

/// Execute a plan with the given options and callbacks
///
/// Changes run in parallel on a pool of `opts.jobs` workers. A failed change
/// is reported in the summary without stopping the others; whatever it did
/// manage to do (an id assigned before a failing read) is still recorded in
/// `state`.
#[allow(clippy::too_many_arguments)]
pub fn execute<M, P, C>(
    plan: &ExecutionPlan,
    resources: &ResourceMap<M>,
    meta: &M,
    ctx: &Context,
    opts: &ExecuteOptions,
    state: &mut State,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    M: Sync,
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending: Vec<&PlannedChange> = plan.pending().collect();
    let mut summary = ExecuteSummary {
        no_change: plan.changes.len() - pending.len(),
        ..Default::default()
    };

    if pending.is_empty() || opts.dry_run {
        return Ok(summary);
    }

    if !confirm.confirm("Apply changes?")? {
        summary.skipped = pending.len();
        return Ok(summary);
    }

    progress.on_batch_start(pending.len());
    for change in &pending {
        progress.on_resource_start(&change.address.to_string(), change.action.symbol());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("Failed to create thread pool")?;

    let results: Vec<(Address, ApplyResult, StateUpdate)> = pool.install(|| {
        pending
            .par_iter()
            .map(|change| {
                let (result, update) = apply_change(change, resources, meta, ctx);
                (change.address.clone(), result, update)
            })
            .collect()
    });

    for (address, result, update) in results {
        match update {
            StateUpdate::Keep => {}
            StateUpdate::Upsert(instance) => state.upsert(instance),
            StateUpdate::Remove(address) => {
                state.remove(&address);
            }
        }
        if let ApplyResult::Failed { error } = &result {
            log::error!("{address}: {error}");
        }
        summary.add_result(&result);
        progress.on_resource_complete(&address.to_string(), &result);
    }
    progress.on_batch_complete();

    Ok(summary)
}

/// Apply a single planned change
fn apply_change<M>(
    change: &PlannedChange,
    resources: &ResourceMap<M>,
    meta: &M,
    ctx: &Context,
) -> (ApplyResult, StateUpdate) {
    if ctx.cancel.is_cancelled() {
        return (
            ApplyResult::Skipped {
                reason: "cancelled".into(),
            },
            StateUpdate::Keep,
        );
    }

    let Some(definition) = resources.get(&change.address.resource_type) else {
        return (
            ApplyResult::Failed {
                error: format!("unsupported resource type {:?}", change.address.resource_type),
            },
            StateUpdate::Keep,
        );
    };

    log::info!("{} {}", change.action.symbol(), change.address);
    let outcome = match change.action {
        Action::NoOp => Ok((ApplyResult::NoChange, StateUpdate::Keep)),
        Action::Create => create(change, definition, meta, ctx),
        Action::Update => update(change, definition, meta, ctx),
        // once the old object is gone a failed create must not leave it in state
        Action::Replace => destroy(change, definition, meta, ctx).and_then(|_| {
            create(change, definition, meta, ctx)
                .map(|(_, update)| (ApplyResult::Replaced, update))
                .map_err(|(e, update)| match update {
                    StateUpdate::Keep => (e, StateUpdate::Remove(change.address.clone())),
                    other => (e, other),
                })
        }),
        Action::Delete => destroy(change, definition, meta, ctx),
    };

    outcome.unwrap_or_else(|(error, update)| {
        (
            ApplyResult::Failed {
                error: format!("{error:#}"),
            },
            update,
        )
    })
}

type Outcome = std::result::Result<(ApplyResult, StateUpdate), (anyhow::Error, StateUpdate)>;

fn instance(address: &Address, d: &ResourceData) -> InstanceState {
    InstanceState {
        address: address.clone(),
        id: d.id().to_string(),
        attributes: d.state(),
    }
}

/// State update for a create or update whose remote call went through
/// (or partly through): whatever id the operation ended with wins.
fn settle(address: &Address, d: &ResourceData) -> StateUpdate {
    if d.is_absent() {
        StateUpdate::Remove(address.clone())
    } else {
        StateUpdate::Upsert(instance(address, d))
    }
}

fn create<M>(
    change: &PlannedChange,
    definition: &ResourceDefinition<M>,
    meta: &M,
    ctx: &Context,
) -> Outcome {
    let mut d = ResourceData::new(
        definition.schema.clone(),
        "",
        Attributes::new(),
        change.config.clone(),
    );
    match definition.ops.create(ctx, meta, &mut d) {
        Ok(()) if d.is_absent() => Err((
            anyhow::anyhow!("{} disappeared right after it was created", change.address),
            StateUpdate::Keep,
        )),
        Ok(()) => Ok((ApplyResult::Created, settle(&change.address, &d))),
        Err(e) if d.is_absent() => Err((e, StateUpdate::Keep)),
        Err(e) => Err((e, settle(&change.address, &d))),
    }
}

fn update<M>(
    change: &PlannedChange,
    definition: &ResourceDefinition<M>,
    meta: &M,
    ctx: &Context,
) -> Outcome {
    let mut d = ResourceData::new(
        definition.schema.clone(),
        change.id.clone(),
        change.prior.clone(),
        change.config.clone(),
    );
    match definition.ops.update(ctx, meta, &mut d) {
        Ok(()) => Ok((ApplyResult::Modified, settle(&change.address, &d))),
        Err(e) => Err((e, StateUpdate::Keep)),
    }
}

fn destroy<M>(
    change: &PlannedChange,
    definition: &ResourceDefinition<M>,
    meta: &M,
    ctx: &Context,
) -> Outcome {
    let mut d = ResourceData::from_state(
        definition.schema.clone(),
        change.id.clone(),
        change.prior.clone(),
    );
    match definition.ops.delete(ctx, meta, &mut d) {
        Ok(()) => Ok((
            ApplyResult::Removed,
            StateUpdate::Remove(change.address.clone()),
        )),
        Err(e) => Err((e, StateUpdate::Keep)),
    }
}

/// Re-read every instance in state.
///
/// Instances whose type offers an existence probe are probed first.
/// Instances reported absent are dropped from state; the rest get their
/// attributes replaced with what the server reports. Every instance is
/// attempted; failures are returned together.
pub fn refresh<M: Sync>(
    state: &mut State,
    resources: &ResourceMap<M>,
    meta: &M,
    ctx: &Context,
    jobs: usize,
) -> Result<()> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create thread pool")?;

    let results: Vec<(Address, Result<Option<InstanceState>>)> = pool.install(|| {
        state
            .resources
            .par_iter()
            .map(|stored| (stored.address.clone(), refresh_one(stored, resources, meta, ctx)))
            .collect()
    });

    let mut failures = Vec::new();
    for (address, result) in results {
        match result {
            Ok(Some(instance)) => state.upsert(instance),
            Ok(None) => {
                log::info!("{address} no longer exists remotely, removing it from state");
                state.remove(&address);
            }
            Err(e) => failures.push(format!("{address}: {e:#}")),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("refresh failed:\n  {}", failures.join("\n  "))
    }
}

fn refresh_one<M>(
    stored: &InstanceState,
    resources: &ResourceMap<M>,
    meta: &M,
    ctx: &Context,
) -> Result<Option<InstanceState>> {
    ctx.check_cancelled()?;
    let definition = resources
        .get(&stored.address.resource_type)
        .with_context(|| format!("unsupported resource type {:?}", stored.address.resource_type))?;

    let mut d = ResourceData::from_state(
        definition.schema.clone(),
        stored.id.clone(),
        stored.attributes.clone(),
    );
    if !definition.ops.exists(ctx, meta, &d)? {
        return Ok(None);
    }
    definition.ops.read(ctx, meta, &mut d)?;
    if d.is_absent() {
        return Ok(None);
    }
    Ok(Some(instance(&stored.address, &d)))
}

/// Import an existing remote object under `address`
pub fn import<M>(
    address: &Address,
    id: &str,
    resources: &ResourceMap<M>,
    meta: &M,
    ctx: &Context,
) -> Result<InstanceState> {
    let definition = resources
        .get(&address.resource_type)
        .with_context(|| format!("unsupported resource type {:?}", address.resource_type))?;

    let mut d = ResourceData::import(definition.schema.clone(), id);
    definition
        .ops
        .import(ctx, meta, &mut d)
        .with_context(|| format!("importing {address} (id {id:?})"))?;
    if d.is_absent() {
        anyhow::bail!("cannot import non-existent remote object {id:?}");
    }
    Ok(instance(address, &d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::planner::DeclaredResource;
    use crate::resource::{ResourceDefinition, ResourceOps};
    use crate::schema::{Attribute, Schema};
    use crate::value::Value;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store keyed by id
    #[derive(Default)]
    struct Store {
        objects: Mutex<HashMap<String, Attributes>>,
    }

    struct MemoryOps;

    impl ResourceOps<Store> for MemoryOps {
        fn create(&self, ctx: &Context, meta: &Store, d: &mut ResourceData) -> Result<()> {
            let key = d.get_string("key", false);
            if key == "explode" {
                anyhow::bail!("server said no");
            }
            meta.objects.lock().unwrap().insert(key.clone(), d.state());
            d.set_id(key);
            self.read(ctx, meta, d)
        }

        fn read(&self, _ctx: &Context, meta: &Store, d: &mut ResourceData) -> Result<()> {
            let found = meta.objects.lock().unwrap().get(d.id()).cloned();
            match found {
                None => d.clear_id(),
                Some(attrs) => {
                    let mut lens = d.lens();
                    for (k, v) in attrs {
                        lens.set(&k, v);
                    }
                    lens.finish()?;
                }
            }
            Ok(())
        }

        fn update(&self, ctx: &Context, meta: &Store, d: &mut ResourceData) -> Result<()> {
            meta.objects
                .lock()
                .unwrap()
                .insert(d.id().to_string(), d.state());
            self.read(ctx, meta, d)
        }

        fn delete(&self, _ctx: &Context, meta: &Store, d: &mut ResourceData) -> Result<()> {
            meta.objects.lock().unwrap().remove(d.id());
            d.clear_id();
            Ok(())
        }
    }

    fn resources() -> ResourceMap<Store> {
        let schema = Schema::new()
            .with("key", Attribute::string().required().force_new())
            .with("notes", Attribute::string().optional());
        let mut map = ResourceMap::new();
        map.insert("mem", ResourceDefinition::new(schema, MemoryOps));
        map
    }

    fn declared(key: &str, notes: &str) -> DeclaredResource {
        let mut attributes = Attributes::new();
        attributes.insert("key".into(), Value::from(key));
        attributes.insert("notes".into(), Value::from(notes));
        DeclaredResource {
            address: Address::new("mem", key),
            attributes,
        }
    }

    fn apply(
        declared: &[DeclaredResource],
        state: &mut State,
        store: &Store,
    ) -> ExecuteSummary {
        let resources = resources();
        let plan = ExecutionPlan::build(declared, state, &resources).unwrap();
        execute(
            &plan,
            &resources,
            store,
            &Context::default(),
            &ExecuteOptions::default(),
            state,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap()
    }

    #[test]
    fn test_execute_empty_plan() {
        let mut state = State::default();
        let summary = apply(&[], &mut state, &Store::default());
        assert_eq!(summary.total(), 0);
    }

    #[test]
    fn test_create_update_delete_cycle() {
        let store = Store::default();
        let mut state = State::default();

        let summary = apply(&[declared("a", "x"), declared("b", "y")], &mut state, &store);
        assert_eq!(summary.created, 2);
        assert_eq!(state.resources.len(), 2);

        let summary = apply(&[declared("a", "changed"), declared("b", "y")], &mut state, &store);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.no_change, 1);

        let summary = apply(&[declared("a", "changed")], &mut state, &store);
        assert_eq!(summary.removed, 1);
        assert_eq!(state.resources.len(), 1);
        assert!(!store.objects.lock().unwrap().contains_key("b"));
    }

    #[test]
    fn test_failures_do_not_abort_others() {
        let store = Store::default();
        let mut state = State::default();

        let summary = apply(&[declared("ok", ""), declared("explode", "")], &mut state, &store);
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(state.resources.len(), 1);
    }

    #[test]
    fn test_declined_confirmation_skips() {
        let resources = resources();
        let mut state = State::default();
        let plan = ExecutionPlan::build(&[declared("a", "")], &state, &resources).unwrap();
        let summary = execute(
            &plan,
            &resources,
            &Store::default(),
            &Context::default(),
            &ExecuteOptions::default(),
            &mut state,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);
        assert!(state.is_empty());
    }

    #[test]
    fn test_refresh_drops_out_of_band_deletions() {
        let store = Store::default();
        let mut state = State::default();
        apply(&[declared("a", "x"), declared("b", "y")], &mut state, &store);

        store.objects.lock().unwrap().remove("a");
        let mut notes = Attributes::new();
        notes.insert("key".into(), "b".into());
        notes.insert("notes".into(), "edited remotely".into());
        store.objects.lock().unwrap().insert("b".into(), notes);

        refresh(&mut state, &resources(), &store, &Context::default(), 2).unwrap();
        assert_eq!(state.resources.len(), 1);
        assert_eq!(
            state.resources[0].attributes["notes"],
            Value::from("edited remotely")
        );
    }

    #[test]
    fn test_import() {
        let store = Store::default();
        let mut attrs = Attributes::new();
        attrs.insert("key".into(), "legacy".into());
        store.objects.lock().unwrap().insert("legacy".into(), attrs);

        let address = Address::new("mem", "legacy");
        let imported = import(&address, "legacy", &resources(), &store, &Context::default()).unwrap();
        assert_eq!(imported.id, "legacy");
        assert_eq!(imported.attributes["key"], Value::from("legacy"));

        assert!(import(&address, "missing", &resources(), &store, &Context::default()).is_err());
    }

    #[test]
    fn test_cancelled_changes_are_skipped() {
        let resources = resources();
        let mut state = State::default();
        let plan = ExecutionPlan::build(&[declared("a", "")], &state, &resources).unwrap();
        let ctx = Context::default();
        ctx.cancel.cancel();

        let summary = execute(
            &plan,
            &resources,
            &Store::default(),
            &ctx,
            &ExecuteOptions::default(),
            &mut state,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();
        assert_eq!(summary.skipped, 1);
    }
}
