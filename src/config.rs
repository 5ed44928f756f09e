use anyhow::{Context, Result, bail};
use artifactory::ProviderConfig;
use declarative::DeclaredResource;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG: &str = "artprov.toml";
pub const DEFAULT_STATE: &str = "artprov.state.json";

/// Get the user-level config directory
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("artprov"))
}

/// Expand `~` in a path given on the command line
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Resolve the configuration file.
///
/// An explicit path is used as given. The default name is looked up in the
/// working directory first and then in the user config directory.
pub fn resolve_config(path: &str) -> PathBuf {
    let expanded = expand_path(path);
    if path != DEFAULT_CONFIG || expanded.exists() {
        return expanded;
    }
    match config_dir() {
        Ok(dir) if dir.join(DEFAULT_CONFIG).exists() => dir.join(DEFAULT_CONFIG),
        _ => expanded,
    }
}

// ============================================================================
// Configuration File
// ============================================================================

/// Contents of `artprov.toml`
///
/// ```toml
/// [provider]
/// url = "https://example.jfrog.io"
///
/// [[resource]]
/// type = "artifactory_local_maven_repository"
/// name = "libs"
///
/// [resource.attributes]
/// key = "libs-release-local"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtprovConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default, rename = "resource")]
    pub resources: Vec<DeclaredResource>,
}

impl ArtprovConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.check_addresses()?;
        config.provider = config.provider.with_env();
        Ok(config)
    }

    /// Each `type.name` may be declared once
    fn check_addresses(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            if resource.address.name.is_empty() {
                bail!("resource of type {} has no name", resource.address.resource_type);
            }
            if !seen.insert(&resource.address) {
                bail!("{} is declared more than once", resource.address);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::Value;

    const SAMPLE: &str = r#"
[provider]
url = "https://example.jfrog.io"
access_token = "tok"
report_usage = false

[provider.retry]
max_attempts = 3

[[resource]]
type = "artifactory_local_maven_repository"
name = "libs"

[resource.attributes]
key = "libs-release-local"
max_unique_snapshots = 10
handle_snapshots = false
property_sets = ["artifactory"]

[[resource]]
type = "artifactory_xray_watch"
name = "release"

[resource.attributes]
name = "release-watch"

[[resource.attributes.resources]]
type = "all-repos"

[[resource.attributes.assigned_policies]]
name = "no-high-vulns"
type = "security"
"#;

    #[test]
    fn test_parse_provider_and_resources() {
        let config = ArtprovConfig::parse(SAMPLE).unwrap();
        assert_eq!(config.provider.url.as_deref(), Some("https://example.jfrog.io"));
        assert!(!config.provider.report_usage);
        assert_eq!(config.provider.retry.max_attempts, 3);
        assert_eq!(config.resources.len(), 2);

        let libs = &config.resources[0];
        assert_eq!(libs.address.to_string(), "artifactory_local_maven_repository.libs");
        assert_eq!(libs.attributes["key"], Value::from("libs-release-local"));
        assert_eq!(libs.attributes["max_unique_snapshots"], Value::Int(10));
        assert_eq!(libs.attributes["handle_snapshots"], Value::Bool(false));
        assert_eq!(libs.attributes["property_sets"], Value::string_list(["artifactory"]));

        let watch = &config.resources[1];
        assert_eq!(watch.attributes["resources"].blocks().len(), 1);
        assert_eq!(watch.attributes["assigned_policies"].blocks()[0]["type"], Value::from("security"));
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let content = r#"
[[resource]]
type = "artifactory_local_npm_repository"
name = "npm"

[[resource]]
type = "artifactory_local_npm_repository"
name = "npm"
"#;
        let err = ArtprovConfig::parse(content).unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(ArtprovConfig::parse("[providers]\nurl = \"x\"").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = ArtprovConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        fs::write(dir.path().join(DEFAULT_CONFIG), SAMPLE).unwrap();
        let config = ArtprovConfig::load(&dir.path().join(DEFAULT_CONFIG)).unwrap();
        assert_eq!(config.resources.len(), 2);
    }

    #[test]
    fn test_explicit_config_path_is_kept() {
        assert_eq!(resolve_config("/etc/artprov/site.toml"), PathBuf::from("/etc/artprov/site.toml"));
    }
}
