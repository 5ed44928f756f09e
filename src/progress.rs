//! Terminal implementations of the executor callbacks.

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{ApplyResult, ConfirmCallback, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Progress bar over a batch of changes, with one line per finished change
pub struct BarProgress {
    bar: Option<ProgressBar>,
    quiet: bool,
}

impl BarProgress {
    pub fn new(quiet: bool) -> Self {
        Self { bar: None, quiet }
    }

    fn println(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{line}"),
        }
    }
}

/// Outcome line for a finished change
pub fn result_line(address: &str, result: &ApplyResult) -> String {
    match result {
        ApplyResult::NoChange => format!("    {} {address}", "·".dimmed()),
        ApplyResult::Created => format!("    {} {address} created", "✓".green()),
        ApplyResult::Modified => format!("    {} {address} updated", "✓".green()),
        ApplyResult::Replaced => format!("    {} {address} replaced", "✓".green()),
        ApplyResult::Removed => format!("    {} {address} destroyed", "✓".green()),
        ApplyResult::Failed { error } => format!("    {} {address}: {error}", "✗".red()),
        ApplyResult::Skipped { reason } => {
            format!("    {} {address} skipped ({reason})", "⚠".yellow())
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_batch_start(&mut self, count: usize) {
        let bar = if self.quiet {
            ProgressBar::with_draw_target(Some(count as u64), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(count as u64)
        };
        bar.set_style(
            ProgressStyle::with_template("  {spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, address: &str, description: &str) {
        log::debug!("{description} {address}");
        if let Some(bar) = &self.bar {
            bar.set_message(address.to_string());
        }
    }

    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult) {
        if !self.quiet || matches!(result, ApplyResult::Failed { .. }) {
            self.println(result_line(address, result));
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// Ask on the terminal, refusing when nobody is there to answer
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        if !console::user_attended() {
            bail!("{prompt} needs confirmation; rerun with --yes in non-interactive sessions");
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?;
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_lines() {
        colored::control::set_override(false);
        assert_eq!(
            result_line("artifactory_xray_policy.p", &ApplyResult::Created),
            "    ✓ artifactory_xray_policy.p created"
        );
        let failed = ApplyResult::Failed {
            error: "409 Conflict".into(),
        };
        assert!(result_line("a.b", &failed).ends_with("a.b: 409 Conflict"));
    }

    #[test]
    fn test_quiet_bar_counts_completions() {
        let mut progress = BarProgress::new(true);
        progress.on_batch_start(2);
        progress.on_resource_start("a.b", "+");
        progress.on_resource_complete("a.b", &ApplyResult::Created);
        assert_eq!(progress.bar.as_ref().map(ProgressBar::position), Some(1));
        progress.on_batch_complete();
        assert!(progress.bar.is_none());
    }
}
