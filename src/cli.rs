use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Parser)]
#[command(name = "artprov")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Declarative management of Artifactory repositories and Xray policies", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file declaring the provider and its resources
    #[arg(
        short,
        long,
        global = true,
        env = "ARTPROV_CONFIG",
        default_value = crate::config::DEFAULT_CONFIG
    )]
    pub config: String,

    /// State file recording managed resources
    #[arg(long, global = true, env = "ARTPROV_STATE", default_value = crate::config::DEFAULT_STATE)]
    pub state: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check declared resources against their schemas
    Validate,

    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge the server to the declared resources
    Apply(ApplyArgs),

    /// Delete every managed resource
    Destroy(DestroyArgs),

    /// Re-read managed resources from the server into state
    Refresh(RefreshArgs),

    /// Adopt an existing server object into state
    Import(ImportArgs),

    /// List resource types, or show the attributes of one
    Schema {
        /// Resource type (e.g. artifactory_local_maven_repository)
        resource_type: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Apply
// ============================================================================

#[derive(Args)]
pub struct PlanArgs {
    /// Only plan resources matching `type` or `type.name`
    pub target: Option<String>,

    /// Plan against stored state without reading the server first
    #[arg(long)]
    pub no_refresh: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    pub jobs: u8,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only apply resources matching `type` or `type.name`
    pub target: Option<String>,

    /// Show the plan without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Apply against stored state without reading the server first
    #[arg(long)]
    pub no_refresh: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    pub jobs: u8,
}

#[derive(Args)]
pub struct DestroyArgs {
    /// Only destroy resources matching `type` or `type.name`
    pub target: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    pub jobs: u8,
}

#[derive(Args)]
pub struct RefreshArgs {
    /// Number of parallel workers
    #[arg(short, long, default_value = "4")]
    pub jobs: u8,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Resource type (e.g. artifactory_local_npm_repository)
    pub resource_type: String,

    /// Name to manage the object under
    pub name: String,

    /// Server-side id (repository key, policy or watch name)
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from(["artprov", "apply", "artifactory_xray_policy", "--yes", "-j", "2"]);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.target.as_deref(), Some("artifactory_xray_policy"));
                assert!(args.yes);
                assert!(!args.dry_run);
                assert_eq!(args.jobs, 2);
            }
            _ => panic!("expected apply"),
        }
        assert_eq!(cli.config, crate::config::DEFAULT_CONFIG);
    }

    #[test]
    fn test_import_takes_type_name_and_id() {
        let cli = Cli::parse_from([
            "artprov",
            "--state",
            "other.json",
            "import",
            "artifactory_local_npm_repository",
            "npm",
            "npm-local",
        ]);
        assert_eq!(cli.state, "other.json");
        match cli.command {
            Command::Import(args) => {
                assert_eq!(args.resource_type, "artifactory_local_npm_repository");
                assert_eq!(args.name, "npm");
                assert_eq!(args.id, "npm-local");
            }
            _ => panic!("expected import"),
        }
    }
}
