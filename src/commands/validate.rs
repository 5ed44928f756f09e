use crate::Context;
use crate::config::{self, ArtprovConfig};
use crate::ui;
use anyhow::{Result, bail};
use artifactory::Provider;
use declarative::{Diagnostic, Severity};

/// Validate every declared resource without contacting the server
pub fn check(config: &ArtprovConfig, provider: &Provider) -> Result<Vec<Diagnostic>> {
    Ok(declarative::planner::validate_all(&config.resources, provider.resources())?)
}

pub fn run(ctx: &Context) -> Result<()> {
    let path = config::resolve_config(&ctx.config);
    let config = ArtprovConfig::load(&path)?;
    let diagnostics = check(&config, &Provider::new())?;
    ui::print_diagnostics(&diagnostics);

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    if errors > 0 {
        bail!("{errors} errors in {}", path.display());
    }
    ui::success(&format!("{} resources valid", config.resources.len()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::REPOSITORIES;

    #[test]
    fn test_valid_configuration() {
        let config = ArtprovConfig::parse(REPOSITORIES).unwrap();
        assert!(check(&config, &Provider::new()).unwrap().is_empty());
    }

    #[test]
    fn test_errors_are_addressed() {
        let content = REPOSITORIES.replace("url = \"https://registry.npmjs.org\"", "url = \"ftp://mirror\"");
        let config = ArtprovConfig::parse(&content).unwrap();
        let diagnostics = check(&config, &Provider::new()).unwrap();

        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("artifactory_remote_npm_repository.npmjs.url")
        );
    }

    #[test]
    fn test_deprecated_type_warns() {
        let content = r#"
[[resource]]
type = "artifactory_virtual_repository"
name = "all"

[resource.attributes]
key = "all"
package_type = "maven"
repositories = ["libs"]
"#;
        let config = ArtprovConfig::parse(content).unwrap();
        let diagnostics = check(&config, &Provider::new()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn test_unknown_type_fails() {
        let content = "[[resource]]\ntype = \"artifactory_xray_dashboard\"\nname = \"d\"\n";
        let config = ArtprovConfig::parse(content).unwrap();
        assert!(check(&config, &Provider::new()).is_err());
    }
}
