//! Virtual repositories.

use super::local::{DebianSettings, NugetSettings};
use super::validators;
use super::{BaseParams, Extension};
use crate::types::{PackageType, Rclass};
use declarative::{Attribute, FieldSet, Marshal, Schema, Validator};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Parameters shared by every virtual repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VirtualRepositoryBaseParams {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    pub rclass: Rclass,
    pub package_type: PackageType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub includes_pattern: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub excludes_pattern: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub repo_layout_ref: String,
    pub repositories: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifactory_requests_can_retrieve_remote_artifacts: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub default_deployment_repo: String,
}

impl Marshal for VirtualRepositoryBaseParams {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("key", |r: &Self| &r.key, |r| &mut r.key)
            .pack_only("package_type", |r: &Self| &r.package_type)
            .attr("description", |r: &Self| &r.description, |r| &mut r.description)
            .attr("notes", |r: &Self| &r.notes, |r| &mut r.notes)
            .attr("includes_pattern", |r: &Self| &r.includes_pattern, |r| &mut r.includes_pattern)
            .attr("excludes_pattern", |r: &Self| &r.excludes_pattern, |r| &mut r.excludes_pattern)
            .attr("repo_layout_ref", |r: &Self| &r.repo_layout_ref, |r| &mut r.repo_layout_ref)
            .attr("repositories", |r: &Self| &r.repositories, |r| &mut r.repositories)
            .attr(
                "artifactory_requests_can_retrieve_remote_artifacts",
                |r: &Self| &r.artifactory_requests_can_retrieve_remote_artifacts,
                |r| &mut r.artifactory_requests_can_retrieve_remote_artifacts,
            )
            .attr(
                "default_deployment_repo",
                |r: &Self| &r.default_deployment_repo,
                |r| &mut r.default_deployment_repo,
            )
    }
}

impl BaseParams for VirtualRepositoryBaseParams {
    const RCLASS: Rclass = Rclass::Virtual;

    fn stamped(package_type: PackageType) -> Self {
        Self {
            rclass: Self::RCLASS,
            package_type,
            ..Default::default()
        }
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn package_type(&self) -> PackageType {
        self.package_type
    }

    fn schema() -> Schema {
        Schema::new()
            .with(
                "key",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(validators::repo_key()),
            )
            .with("package_type", Attribute::string().computed().force_new())
            .with("description", Attribute::string().optional())
            .with("notes", Attribute::string().optional())
            .with(
                "includes_pattern",
                Attribute::string().optional().default("**/*").description(
                    "List of artifact patterns to include when evaluating artifact requests in the form of \
                     x/y/**/z/*. When used, only artifacts matching one of the include patterns are served. \
                     By default, all artifacts are included (**/*).",
                ),
            )
            .with(
                "excludes_pattern",
                Attribute::string().optional().description(
                    "List of artifact patterns to exclude when evaluating artifact requests, in the form of \
                     x/y/**/z/*. By default no artifacts are excluded.",
                ),
            )
            .with("repo_layout_ref", Attribute::string().optional().computed())
            .with(
                "repositories",
                Attribute::string_list()
                    .required()
                    .description("The effective list of actual repositories included in this virtual repository."),
            )
            .with(
                "artifactory_requests_can_retrieve_remote_artifacts",
                Attribute::bool().optional().default(false),
            )
            .with(
                "default_deployment_repo",
                Attribute::string()
                    .optional()
                    .description("Default repository to deploy artifacts."),
            )
    }
}

/// Maven-layout virtual settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MavenVirtualSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key_pair: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pom_repository_references_cleanup_policy: String,
}

impl Marshal for MavenVirtualSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("key_pair", |s: &Self| &s.key_pair, |s| &mut s.key_pair)
            .attr(
                "pom_repository_references_cleanup_policy",
                |s: &Self| &s.pom_repository_references_cleanup_policy,
                |s| &mut s.pom_repository_references_cleanup_policy,
            )
    }
}

impl MavenVirtualSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .with("key_pair", Attribute::string().optional())
            .with(
                "pom_repository_references_cleanup_policy",
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(pom_cleanup_policy())
                    .description(
                        "(1: discard_active_reference) Discard Active References - Removes repository elements \
                         that are declared directly under project or under a profile in the same POM that is \
                         activeByDefault.\n\
                         (2: discard_any_reference) Discard Any References - Removes all repository elements \
                         regardless of whether they are included in an active profile or not.\n\
                         (3: nothing) Nothing - Does not remove any repository elements declared in the POM.",
                    ),
            )
    }
}

pub fn pom_cleanup_policy() -> Validator {
    Validator::one_of(["discard_active_reference", "discard_any_reference", "nothing"])
}

/// Virtual settings that only some package types have
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum VirtualExtension {
    #[default]
    None,
    Maven(MavenVirtualSettings),
    Debian(DebianSettings),
    Nuget(NugetSettings),
}

impl Serialize for VirtualExtension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_map(Some(0))?.end(),
            Self::Maven(s) => s.serialize(serializer),
            Self::Debian(s) => s.serialize(serializer),
            Self::Nuget(s) => s.serialize(serializer),
        }
    }
}

impl Marshal for VirtualExtension {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .project(
                MavenVirtualSettings::fields(),
                |e: &Self| match e {
                    Self::Maven(s) => Some(s),
                    _ => None,
                },
                |e| match e {
                    Self::Maven(s) => Some(s),
                    _ => None,
                },
            )
            .project(
                DebianSettings::fields(),
                |e: &Self| match e {
                    Self::Debian(s) => Some(s),
                    _ => None,
                },
                |e| match e {
                    Self::Debian(s) => Some(s),
                    _ => None,
                },
            )
            .project(
                NugetSettings::fields(),
                |e: &Self| match e {
                    Self::Nuget(s) => Some(s),
                    _ => None,
                },
                |e| match e {
                    Self::Nuget(s) => Some(s),
                    _ => None,
                },
            )
    }
}

impl Extension for VirtualExtension {
    fn for_package_type(package_type: PackageType) -> Self {
        match package_type {
            pt if pt.is_maven_family() => Self::Maven(MavenVirtualSettings::default()),
            PackageType::Debian => Self::Debian(DebianSettings::default()),
            PackageType::Nuget => Self::Nuget(NugetSettings::default()),
            _ => Self::None,
        }
    }

    fn decode(package_type: PackageType, payload: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(match Self::for_package_type(package_type) {
            Self::None => Self::None,
            Self::Maven(_) => Self::Maven(MavenVirtualSettings::deserialize(payload)?),
            Self::Debian(_) => Self::Debian(DebianSettings::deserialize(payload)?),
            Self::Nuget(_) => Self::Nuget(NugetSettings::deserialize(payload)?),
        })
    }

    fn schema(package_type: PackageType) -> Schema {
        match Self::for_package_type(package_type) {
            Self::None => Schema::new(),
            Self::Maven(_) => MavenVirtualSettings::schema(),
            Self::Debian(_) => DebianSettings::schema(),
            Self::Nuget(_) => NugetSettings::schema(),
        }
    }
}
