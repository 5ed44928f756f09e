//! Local repositories.

use super::validators;
use super::{BaseParams, Extension, is_zero};
use crate::types::{PackageType, Rclass};
use declarative::{Attribute, FieldSet, Marshal, Schema, Validator};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Parameters shared by every local repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalRepositoryBaseParams {
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacked_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xray_index: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_sets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_browsing_enabled: Option<bool>,
    #[serde(rename = "optionalIndexCompressionFormats", skip_serializing_if = "Vec::is_empty")]
    pub index_compression_formats: Vec<String>,
    #[serde(rename = "downloadRedirect", skip_serializing_if = "Option::is_none")]
    pub download_direct: Option<bool>,
}

impl Marshal for LocalRepositoryBaseParams {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("key", |r: &Self| &r.key, |r| &mut r.key)
            .pack_only("package_type", |r: &Self| &r.package_type)
            .attr("description", |r: &Self| &r.description, |r| &mut r.description)
            .attr("notes", |r: &Self| &r.notes, |r| &mut r.notes)
            .attr("includes_pattern", |r: &Self| &r.includes_pattern, |r| &mut r.includes_pattern)
            .attr("excludes_pattern", |r: &Self| &r.excludes_pattern, |r| &mut r.excludes_pattern)
            .attr("repo_layout_ref", |r: &Self| &r.repo_layout_ref, |r| &mut r.repo_layout_ref)
            .attr("blacked_out", |r: &Self| &r.blacked_out, |r| &mut r.blacked_out)
            .attr("xray_index", |r: &Self| &r.xray_index, |r| &mut r.xray_index)
            .attr("property_sets", |r: &Self| &r.property_sets, |r| &mut r.property_sets)
            .attr(
                "archive_browsing_enabled",
                |r: &Self| &r.archive_browsing_enabled,
                |r| &mut r.archive_browsing_enabled,
            )
            .attr(
                "index_compression_formats",
                |r: &Self| &r.index_compression_formats,
                |r| &mut r.index_compression_formats,
            )
            .attr("download_direct", |r: &Self| &r.download_direct, |r| &mut r.download_direct)
    }
}

impl BaseParams for LocalRepositoryBaseParams {
    const RCLASS: Rclass = Rclass::Local;

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
            .with("includes_pattern", Attribute::string().optional().computed())
            .with("excludes_pattern", Attribute::string().optional().computed())
            .with("repo_layout_ref", Attribute::string().optional().computed())
            .with("blacked_out", Attribute::bool().optional().default(false))
            .with("xray_index", Attribute::bool().optional().computed())
            .with("property_sets", Attribute::string_set().optional())
            .with(
                "archive_browsing_enabled",
                Attribute::bool().optional().description(
                    "When set, you may view content such as HTML or Javadoc files directly from Artifactory.\n\
                     This may not be safe and therefore requires strict content moderation to prevent malicious \
                     users from uploading content that may compromise security (e.g., cross-site scripting attacks).",
                ),
            )
            .with("index_compression_formats", Attribute::string_set().optional())
            .with("download_direct", Attribute::bool().optional())
    }
}

/// Maven-layout settings, shared by maven, gradle, ivy and sbt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MavenLocalSettings {
    #[serde(skip_serializing_if = "is_zero")]
    pub max_unique_snapshots: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_releases: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle_snapshots: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppress_pom_consistency_checks: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub snapshot_version_behavior: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub checksum_policy_type: String,
}

impl Marshal for MavenLocalSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("max_unique_snapshots", |s: &Self| &s.max_unique_snapshots, |s| &mut s.max_unique_snapshots)
            .attr("handle_releases", |s: &Self| &s.handle_releases, |s| &mut s.handle_releases)
            .attr("handle_snapshots", |s: &Self| &s.handle_snapshots, |s| &mut s.handle_snapshots)
            .attr(
                "suppress_pom_consistency_checks",
                |s: &Self| &s.suppress_pom_consistency_checks,
                |s| &mut s.suppress_pom_consistency_checks,
            )
            .attr(
                "snapshot_version_behavior",
                |s: &Self| &s.snapshot_version_behavior,
                |s| &mut s.snapshot_version_behavior,
            )
            .attr("checksum_policy_type", |s: &Self| &s.checksum_policy_type, |s| &mut s.checksum_policy_type)
    }
}

impl MavenLocalSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .with("max_unique_snapshots", Attribute::int().optional().computed().validate(Validator::IntAtLeast(0)))
            .with("handle_releases", Attribute::bool().optional().computed())
            .with("handle_snapshots", Attribute::bool().optional().computed())
            .with("suppress_pom_consistency_checks", Attribute::bool().optional().computed())
            .with(
                "snapshot_version_behavior",
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(validators::snapshot_version_behavior()),
            )
            .with(
                "checksum_policy_type",
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(validators::checksum_policy()),
            )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DebianSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debian_trivial_layout: Option<bool>,
}

impl Marshal for DebianSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new().attr(
            "debian_trivial_layout",
            |s: &Self| &s.debian_trivial_layout,
            |s| &mut s.debian_trivial_layout,
        )
    }
}

impl DebianSettings {
    pub fn schema() -> Schema {
        Schema::new().with("debian_trivial_layout", Attribute::bool().optional())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DockerLocalSettings {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_api_version: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub max_unique_tags: i64,
}

impl Marshal for DockerLocalSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("docker_api_version", |s: &Self| &s.docker_api_version, |s| &mut s.docker_api_version)
            .attr("max_unique_tags", |s: &Self| &s.max_unique_tags, |s| &mut s.max_unique_tags)
    }
}

impl DockerLocalSettings {
    /// API version assumed for repositories declared without one
    pub const DEFAULT_API_VERSION: &'static str = "V2";

    pub fn schema() -> Schema {
        Schema::new()
            .with("docker_api_version", Attribute::string().optional().computed())
            .with("max_unique_tags", Attribute::int().optional().computed())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RpmLocalSettings {
    #[serde(skip_serializing_if = "is_zero")]
    pub yum_root_depth: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculate_yum_metadata: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_file_lists_indexing: Option<bool>,
}

impl Marshal for RpmLocalSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("yum_root_depth", |s: &Self| &s.yum_root_depth, |s| &mut s.yum_root_depth)
            .attr(
                "calculate_yum_metadata",
                |s: &Self| &s.calculate_yum_metadata,
                |s| &mut s.calculate_yum_metadata,
            )
            .attr(
                "enable_file_lists_indexing",
                |s: &Self| &s.enable_file_lists_indexing,
                |s| &mut s.enable_file_lists_indexing,
            )
    }
}

impl RpmLocalSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .with("yum_root_depth", Attribute::int().optional().validate(Validator::IntAtLeast(0)))
            .with("calculate_yum_metadata", Attribute::bool().optional())
            .with("enable_file_lists_indexing", Attribute::bool().optional().computed())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NugetSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_nuget_authentication: Option<bool>,
}

impl Marshal for NugetSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new().attr(
            "force_nuget_authentication",
            |s: &Self| &s.force_nuget_authentication,
            |s| &mut s.force_nuget_authentication,
        )
    }
}

impl NugetSettings {
    pub fn schema() -> Schema {
        Schema::new().with("force_nuget_authentication", Attribute::bool().optional().computed())
    }
}

/// Local settings that only some package types have
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LocalExtension {
    #[default]
    None,
    Maven(MavenLocalSettings),
    Debian(DebianSettings),
    Docker(DockerLocalSettings),
    Rpm(RpmLocalSettings),
    Nuget(NugetSettings),
}

impl Serialize for LocalExtension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_map(Some(0))?.end(),
            Self::Maven(s) => s.serialize(serializer),
            Self::Debian(s) => s.serialize(serializer),
            Self::Docker(s) => s.serialize(serializer),
            Self::Rpm(s) => s.serialize(serializer),
            Self::Nuget(s) => s.serialize(serializer),
        }
    }
}

impl Marshal for LocalExtension {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .project(
                MavenLocalSettings::fields(),
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
                DockerLocalSettings::fields(),
                |e: &Self| match e {
                    Self::Docker(s) => Some(s),
                    _ => None,
                },
                |e| match e {
                    Self::Docker(s) => Some(s),
                    _ => None,
                },
            )
            .project(
                RpmLocalSettings::fields(),
                |e: &Self| match e {
                    Self::Rpm(s) => Some(s),
                    _ => None,
                },
                |e| match e {
                    Self::Rpm(s) => Some(s),
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

impl Extension for LocalExtension {
    fn for_package_type(package_type: PackageType) -> Self {
        match package_type {
            pt if pt.is_maven_family() => Self::Maven(MavenLocalSettings::default()),
            PackageType::Debian => Self::Debian(DebianSettings::default()),
            PackageType::Docker => Self::Docker(DockerLocalSettings::default()),
            PackageType::Rpm => Self::Rpm(RpmLocalSettings::default()),
            PackageType::Nuget => Self::Nuget(NugetSettings::default()),
            _ => Self::None,
        }
    }

    fn decode(package_type: PackageType, payload: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(match Self::for_package_type(package_type) {
            Self::None => Self::None,
            Self::Maven(_) => Self::Maven(MavenLocalSettings::deserialize(payload)?),
            Self::Debian(_) => Self::Debian(DebianSettings::deserialize(payload)?),
            Self::Docker(_) => Self::Docker(DockerLocalSettings::deserialize(payload)?),
            Self::Rpm(_) => Self::Rpm(RpmLocalSettings::deserialize(payload)?),
            Self::Nuget(_) => Self::Nuget(NugetSettings::deserialize(payload)?),
        })
    }

    fn schema(package_type: PackageType) -> Schema {
        match Self::for_package_type(package_type) {
            Self::None => Schema::new(),
            Self::Maven(_) => MavenLocalSettings::schema(),
            Self::Debian(_) => DebianSettings::schema(),
            Self::Docker(_) => DockerLocalSettings::schema(),
            Self::Rpm(_) => RpmLocalSettings::schema(),
            Self::Nuget(_) => NugetSettings::schema(),
        }
    }

    /// Repositories provisioned before the API version was configurable
    /// were created as V2
    fn normalize(&mut self) {
        if let Self::Docker(settings) = self
            && settings.docker_api_version.is_empty()
        {
            settings.docker_api_version = DockerLocalSettings::DEFAULT_API_VERSION.to_string();
        }
    }
}
