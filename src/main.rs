mod cli;
mod commands;
mod config;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Configuration file as given on the command line
    pub config: String,
    /// State file as given on the command line
    pub state: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
    };

    match cli.command {
        Command::Validate => commands::validate::run(&ctx),
        Command::Plan(args) => commands::apply::plan(&ctx, &args),
        Command::Apply(args) => commands::apply::apply(&ctx, &args),
        Command::Destroy(args) => commands::apply::destroy(&ctx, &args),
        Command::Refresh(args) => commands::apply::refresh(&ctx, &args),
        Command::Import(args) => commands::import::run(&ctx, &args),
        Command::Schema { resource_type } => commands::schema::run(resource_type.as_deref()),
        Command::Completions { shell } => {
            generate(shell, &mut Cli::command(), "artprov", &mut io::stdout());
            Ok(())
        }
    }
}
