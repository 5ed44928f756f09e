//! Plan, apply, destroy and refresh.

use super::Session;
use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs, PlanArgs, RefreshArgs};
use crate::progress::{BarProgress, PromptConfirm};
use crate::ui;
use anyhow::{Result, bail};
use artifactory::Client;
use colored::Colorize;
use declarative::{
    AutoConfirm, ConfirmCallback, Error, ExecuteOptions, ExecuteSummary, ExecutionPlan,
    ProgressCallback,
};

/// Build the plan for the declared resources, restricted to `target`
pub fn build_plan(session: &Session, target: Option<&str>) -> Result<ExecutionPlan> {
    match ExecutionPlan::build(
        &session.config.resources,
        &session.state,
        session.provider.resources(),
    ) {
        Ok(plan) => Ok(plan.filter_by_target(target)),
        Err(Error::Validation(diagnostics)) => {
            ui::print_diagnostics(&diagnostics);
            bail!("configuration is invalid")
        }
        Err(e) => Err(e.into()),
    }
}

/// Re-read every managed resource; drifted ones show up in the next plan
pub fn refresh_state(session: &mut Session, client: &Client, jobs: usize) -> Result<()> {
    if session.state.is_empty() {
        return Ok(());
    }
    log::info!("refreshing {} resources", session.state.resources.len());
    declarative::refresh(
        &mut session.state,
        session.provider.resources(),
        client,
        &session.host,
        jobs,
    )
}

/// Execute `plan` and persist whatever it changed
pub fn run_plan<P, C>(
    session: &mut Session,
    client: &Client,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let summary = declarative::execute(
        plan,
        session.provider.resources(),
        client,
        &session.host,
        opts,
        &mut session.state,
        progress,
        confirm,
    );
    // Partial progress is recorded even when the run as a whole failed
    session.save_state()?;
    summary
}

fn execute_interactive(
    ctx: &Context,
    session: &mut Session,
    client: &Client,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    yes: bool,
) -> Result<ExecuteSummary> {
    let mut progress = BarProgress::new(ctx.quiet);
    if yes {
        run_plan(session, client, plan, opts, &mut progress, &mut AutoConfirm)
    } else {
        run_plan(session, client, plan, opts, &mut progress, &mut PromptConfirm)
    }
}

fn finish(summary: &ExecuteSummary, pending: usize) -> Result<()> {
    if summary.skipped == pending && summary.total_changes() == 0 && summary.failed == 0 {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }
    ui::print_summary(summary);
    if !summary.is_success() {
        bail!("{} resources failed", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

pub fn plan(ctx: &Context, args: &PlanArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let client = session.connect()?;
    if !args.no_refresh {
        refresh_state(&mut session, &client, args.jobs as usize)?;
    }

    let plan = build_plan(&session, args.target.as_deref())?;
    let summary = plan.summary();
    if !summary.has_changes() {
        ui::success("No changes. Server matches the configuration.");
        return Ok(());
    }

    ui::header("Planned changes");
    ui::print_plan(plan.pending());
    ui::print_plan_summary(&summary);
    if ctx.verbose > 0 {
        ui::dim(&format!("{} resources unchanged", summary.unchanged));
    }
    Ok(())
}

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let client = session.connect()?;
    if !args.no_refresh {
        refresh_state(&mut session, &client, args.jobs as usize)?;
        session.save_state()?;
    }

    let plan = build_plan(&session, args.target.as_deref())?;
    let summary = plan.summary();
    if !summary.has_changes() {
        ui::success("No changes. Server matches the configuration.");
        return Ok(());
    }

    ui::header("Planned changes");
    ui::print_plan(plan.pending());
    ui::print_plan_summary(&summary);

    if args.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(());
    }

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: args.jobs as usize,
    };
    println!();
    let result = execute_interactive(ctx, &mut session, &client, &plan, &opts, args.yes)?;
    finish(&result, summary.total())
}

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let plan = ExecutionPlan::destroy(&session.state).filter_by_target(args.target.as_deref());
    let summary = plan.summary();
    if !summary.has_changes() {
        ui::info("Nothing to destroy");
        return Ok(());
    }
    let client = session.connect()?;

    ui::header("Resources to destroy");
    ui::print_plan(plan.pending());
    ui::print_plan_summary(&summary);

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: args.jobs as usize,
    };
    println!();
    let result = execute_interactive(ctx, &mut session, &client, &plan, &opts, args.yes)?;
    finish(&result, summary.total())
}

pub fn refresh(ctx: &Context, args: &RefreshArgs) -> Result<()> {
    let mut session = Session::open(ctx)?;
    let client = session.connect()?;
    let before = session.state.resources.len();
    refresh_state(&mut session, &client, args.jobs as usize)?;
    session.save_state()?;

    let gone = before - session.state.resources.len();
    if gone > 0 {
        ui::warn(&format!("{gone} resources no longer exist on the server"));
    }
    ui::success(&format!("Refreshed {} resources", session.state.resources.len()));
    if let Some(updated) = session.state.last_updated {
        ui::kv("state", &format!("{} (saved {})", session.state_path.display(), updated.to_rfc3339()));
    }
    Ok(())
}
