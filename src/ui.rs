use colored::Colorize;
use declarative::{Action, AttributeDiff, ExecuteSummary, PlanSummary, PlannedChange, Severity};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

// ============================================================================
// Plans
// ============================================================================

/// Colored plan symbol for an action
pub fn action_symbol(action: Action) -> String {
    let symbol = action.symbol();
    match action {
        Action::Create => symbol.green().to_string(),
        Action::Update => symbol.yellow().to_string(),
        Action::Replace => symbol.magenta().to_string(),
        Action::Delete => symbol.red().to_string(),
        Action::NoOp => symbol.dimmed().to_string(),
    }
}

/// One attribute line; sensitive values never reach the terminal
pub fn diff_line(diff: &AttributeDiff) -> String {
    let line = diff.render();
    if diff.force_new { line.magenta().to_string() } else { line }
}

/// Print every pending change with its attribute diffs
pub fn print_plan<'a>(changes: impl IntoIterator<Item = &'a PlannedChange>) {
    for change in changes {
        let id = if change.id.is_empty() {
            String::new()
        } else {
            format!(" (id: {})", change.id).dimmed().to_string()
        };
        println!("  {} {}{id}", action_symbol(change.action), change.address.to_string().bold());
        if change.action != Action::Delete {
            for diff in &change.diffs {
                println!("      {}", diff_line(diff));
            }
        }
    }
}

pub fn print_plan_summary(summary: &PlanSummary) {
    println!();
    println!(
        "  Plan: {} to create, {} to update, {} to replace, {} to delete.",
        summary.creates.to_string().green(),
        summary.updates.to_string().yellow(),
        summary.replaces.to_string().magenta(),
        summary.deletes.to_string().red(),
    );
}

/// Print final summary
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Apply complete!", "✓".green().bold());
    } else {
        println!("  {} Apply finished with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.replaced > 0 {
        println!("    • {} resources replaced", summary.replaced);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

/// Print validation findings
pub fn print_diagnostics(diagnostics: &[declarative::Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.severity {
            Severity::Error => error(&diagnostic.to_string()),
            Severity::Warning => warn(&diagnostic.to_string()),
        }
    }
}
