//! Remote repositories.
//!
//! Updates send most attributes only when they changed, since the server
//! answers with its own defaults for anything left out and re-sending those
//! would turn every apply into a change.

use super::validators;
use super::{BaseParams, Extension, is_zero};
use crate::types::{PackageType, Rclass};
use declarative::{Attribute, FieldSet, Marshal, Schema, Validator};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// Nested enable switches the server keeps alongside `enabled`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncToggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSource {
    pub origin_absence_detection: bool,
}

/// Smart remote repository synchronisation
///
/// Only `enabled` is declarable; the nested switches are carried through
/// unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSynchronisation {
    pub enabled: bool,
    pub statistics: SyncToggle,
    pub properties: SyncToggle,
    pub source: SyncSource,
}

impl Marshal for ContentSynchronisation {
    fn fields() -> FieldSet<Self> {
        FieldSet::new().attr("enabled", |c: &Self| &c.enabled, |c| &mut c.enabled)
    }
}

/// Parameters shared by every remote repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteRepositoryBaseParams {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub key: String,
    pub rclass: Rclass,
    pub package_type: PackageType,
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    pub proxy: String,
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
    pub hard_fail: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blacked_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xray_index: Option<bool>,
    pub propagate_query_params: bool,
    pub priority_resolution: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_artifacts_locally: Option<bool>,
    #[serde(skip_serializing_if = "is_zero")]
    pub socket_timeout_millis: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub local_address: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub retrieval_cache_period_secs: i64,
    /// Offered by the UI but absent from read payloads
    #[serde(skip_serializing_if = "is_zero")]
    pub failed_retrieval_cache_period_secs: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub missed_retrieval_cache_period_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unused_artifacts_cleanup_enabled: Option<bool>,
    #[serde(skip_serializing_if = "is_zero")]
    pub unused_artifacts_cleanup_period_hours: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub assumed_offline_period_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_configuration: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synchronize_properties: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_mismatching_mime_types: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub property_sets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_any_host_auth: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_cookie_management: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_head_requests: Option<bool>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_tls_certificate: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_synchronisation: Option<ContentSynchronisation>,
}

impl Marshal for RemoteRepositoryBaseParams {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("key", |r: &Self| &r.key, |r| &mut r.key)
            .pack_only("package_type", |r: &Self| &r.package_type)
            .attr("url", |r: &Self| &r.url, |r| &mut r.url)
            .changed("username", |r: &Self| &r.username, |r| &mut r.username)
            .unpack_only("password", true, |r: &mut Self| &mut r.password)
            .changed("proxy", |r: &Self| &r.proxy, |r| &mut r.proxy)
            .changed("description", |r: &Self| &r.description, |r| &mut r.description)
            .changed("notes", |r: &Self| &r.notes, |r| &mut r.notes)
            .changed("includes_pattern", |r: &Self| &r.includes_pattern, |r| &mut r.includes_pattern)
            .changed("excludes_pattern", |r: &Self| &r.excludes_pattern, |r| &mut r.excludes_pattern)
            .changed("repo_layout_ref", |r: &Self| &r.repo_layout_ref, |r| &mut r.repo_layout_ref)
            .changed("hard_fail", |r: &Self| &r.hard_fail, |r| &mut r.hard_fail)
            .changed("offline", |r: &Self| &r.offline, |r| &mut r.offline)
            .changed("blacked_out", |r: &Self| &r.blacked_out, |r| &mut r.blacked_out)
            .changed("xray_index", |r: &Self| &r.xray_index, |r| &mut r.xray_index)
            .attr(
                "propagate_query_params",
                |r: &Self| &r.propagate_query_params,
                |r| &mut r.propagate_query_params,
            )
            .attr("priority_resolution", |r: &Self| &r.priority_resolution, |r| &mut r.priority_resolution)
            .changed(
                "store_artifacts_locally",
                |r: &Self| &r.store_artifacts_locally,
                |r| &mut r.store_artifacts_locally,
            )
            .changed("socket_timeout_millis", |r: &Self| &r.socket_timeout_millis, |r| &mut r.socket_timeout_millis)
            .changed("local_address", |r: &Self| &r.local_address, |r| &mut r.local_address)
            .changed(
                "retrieval_cache_period_seconds",
                |r: &Self| &r.retrieval_cache_period_secs,
                |r| &mut r.retrieval_cache_period_secs,
            )
            .changed(
                "missed_cache_period_seconds",
                |r: &Self| &r.missed_retrieval_cache_period_secs,
                |r| &mut r.missed_retrieval_cache_period_secs,
            )
            .changed(
                "unused_artifacts_cleanup_period_enabled",
                |r: &Self| &r.unused_artifacts_cleanup_enabled,
                |r| &mut r.unused_artifacts_cleanup_enabled,
            )
            .changed(
                "unused_artifacts_cleanup_period_hours",
                |r: &Self| &r.unused_artifacts_cleanup_period_hours,
                |r| &mut r.unused_artifacts_cleanup_period_hours,
            )
            .changed(
                "assumed_offline_period_secs",
                |r: &Self| &r.assumed_offline_period_secs,
                |r| &mut r.assumed_offline_period_secs,
            )
            .changed("share_configuration", |r: &Self| &r.share_configuration, |r| &mut r.share_configuration)
            .changed(
                "synchronize_properties",
                |r: &Self| &r.synchronize_properties,
                |r| &mut r.synchronize_properties,
            )
            .changed(
                "block_mismatching_mime_types",
                |r: &Self| &r.block_mismatching_mime_types,
                |r| &mut r.block_mismatching_mime_types,
            )
            .attr("property_sets", |r: &Self| &r.property_sets, |r| &mut r.property_sets)
            .changed("allow_any_host_auth", |r: &Self| &r.allow_any_host_auth, |r| &mut r.allow_any_host_auth)
            .changed(
                "enable_cookie_management",
                |r: &Self| &r.enable_cookie_management,
                |r| &mut r.enable_cookie_management,
            )
            .changed("bypass_head_requests", |r: &Self| &r.bypass_head_requests, |r| &mut r.bypass_head_requests)
            .changed(
                "client_tls_certificate",
                |r: &Self| &r.client_tls_certificate,
                |r| &mut r.client_tls_certificate,
            )
            .block(
                "content_synchronisation",
                |r: &Self| &r.content_synchronisation,
                |r| &mut r.content_synchronisation,
            )
    }
}

impl BaseParams for RemoteRepositoryBaseParams {
    const RCLASS: Rclass = Rclass::Remote;

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
        let seconds = || Attribute::int().optional().computed().validate(Validator::IntAtLeast(0));
        let flag = || Attribute::bool().optional().computed();

        Schema::new()
            .with(
                "key",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(validators::repo_key()),
            )
            .with("package_type", Attribute::string().computed().force_new())
            .with(
                "url",
                Attribute::string()
                    .required()
                    .validate(Validator::UrlWithHttpOrHttps),
            )
            .with("username", Attribute::string().optional())
            .with(
                "password",
                Attribute::string()
                    .optional()
                    .sensitive()
                    .state_func(validators::hash_secret),
            )
            .with("proxy", Attribute::string().optional().computed())
            .with(
                "description",
                Attribute::string()
                    .optional()
                    .computed()
                    .diff_suppress(validators::suppress_cache_description),
            )
            .with("notes", Attribute::string().optional())
            .with("includes_pattern", Attribute::string().optional().computed())
            .with("excludes_pattern", Attribute::string().optional().computed())
            .with("repo_layout_ref", Attribute::string().optional().computed())
            .with("hard_fail", flag())
            .with(
                "offline",
                flag().description(
                    "If set, Artifactory does not try to fetch remote artifacts. \
                     Only locally-cached artifacts are retrieved.",
                ),
            )
            .with(
                "blacked_out",
                flag().description(
                    "(A.K.A 'Ignore Repository' on the UI) When set, the repository or its local cache \
                     do not participate in artifact resolution.",
                ),
            )
            .with("xray_index", flag())
            .with(
                "store_artifacts_locally",
                flag().description(
                    "When set, the repository should store cached artifacts locally. When not set, \
                     artifacts are not stored locally, and direct repository-to-client streaming is used.",
                ),
            )
            .with("socket_timeout_millis", seconds())
            .with("local_address", Attribute::string().optional())
            .with(
                "retrieval_cache_period_seconds",
                seconds().default(7200_i64).description(
                    "The metadataRetrievalTimeoutSecs field not allowed to be bigger then retrievalCachePeriodSecs field.",
                ),
            )
            .with(
                "failed_retrieval_cache_period_secs",
                seconds().deprecated(
                    "This field is not returned in a get payload but is offered on the UI. \
                     It's inserted here for inclusive and informational reasons. It does not function",
                ),
            )
            .with(
                "missed_cache_period_seconds",
                seconds().description("This is actually the missedRetrievalCachePeriodSecs in the API"),
            )
            .with("unused_artifacts_cleanup_period_enabled", flag())
            .with("unused_artifacts_cleanup_period_hours", seconds())
            .with(
                "assumed_offline_period_secs",
                Attribute::int().optional().validate(Validator::IntAtLeast(0)),
            )
            .with("share_configuration", flag())
            .with(
                "synchronize_properties",
                flag().description("When set, remote artifacts are fetched along with their properties."),
            )
            .with("block_mismatching_mime_types", flag())
            .with("property_sets", Attribute::string_set().optional())
            .with(
                "allow_any_host_auth",
                flag().description(
                    "Also known as 'Lenient Host Authentication', Allow credentials of this repository \
                     to be used on requests redirected to any other host.",
                ),
            )
            .with(
                "enable_cookie_management",
                flag().description(
                    "Enables cookie management if the remote repository uses cookies to manage client state.",
                ),
            )
            .with(
                "bypass_head_requests",
                flag().description(
                    "Before caching an artifact, Artifactory first sends a HEAD request to the remote resource. \
                     When checked, Artifactory will bypass the HEAD request and cache the artifact directly \
                     using a GET request.",
                ),
            )
            .with("priority_resolution", flag())
            .with("client_tls_certificate", Attribute::string().optional().computed())
            .with(
                "content_synchronisation",
                Attribute::block(Schema::new().with("enabled", Attribute::bool().optional()))
                    .optional()
                    .computed()
                    .max_items(1),
            )
            .with("propagate_query_params", Attribute::bool().optional().default(false))
    }
}

/// Cargo registry index settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CargoSettings {
    pub git_registry_url: String,
    #[serde(rename = "cargoAnonymousAccess")]
    pub anonymous_access: bool,
}

impl Marshal for CargoSettings {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("git_registry_url", |s: &Self| &s.git_registry_url, |s| &mut s.git_registry_url)
            .attr("anonymous_access", |s: &Self| &s.anonymous_access, |s| &mut s.anonymous_access)
    }
}

impl CargoSettings {
    pub fn schema() -> Schema {
        Schema::new()
            .with(
                "git_registry_url",
                Attribute::string()
                    .required()
                    .validate(Validator::UrlWithHttpOrHttps)
                    .description(
                        "This is the index url, expected to be a git repository. \
                         For remote artifactory use \"arturl/git/repokey.git\"",
                    ),
            )
            .with(
                "anonymous_access",
                Attribute::bool().optional().description(
                    "(On the UI: Anonymous download and search) Cargo client does not send credentials \
                     when performing download and search for crates. Enable this to allow anonymous \
                     access to these resources (only), note that this will override the security \
                     anonymous access option.",
                ),
            )
    }
}

/// Remote settings that only some package types have
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RemoteExtension {
    #[default]
    None,
    Cargo(CargoSettings),
}

impl Serialize for RemoteExtension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_map(Some(0))?.end(),
            Self::Cargo(s) => s.serialize(serializer),
        }
    }
}

impl Marshal for RemoteExtension {
    fn fields() -> FieldSet<Self> {
        FieldSet::new().project(
            CargoSettings::fields(),
            |e: &Self| match e {
                Self::Cargo(s) => Some(s),
                Self::None => None,
            },
            |e| match e {
                Self::Cargo(s) => Some(s),
                Self::None => None,
            },
        )
    }
}

impl Extension for RemoteExtension {
    fn for_package_type(package_type: PackageType) -> Self {
        match package_type {
            PackageType::Cargo => Self::Cargo(CargoSettings::default()),
            _ => Self::None,
        }
    }

    fn decode(package_type: PackageType, payload: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(match Self::for_package_type(package_type) {
            Self::None => Self::None,
            Self::Cargo(_) => Self::Cargo(CargoSettings::deserialize(payload)?),
        })
    }

    fn schema(package_type: PackageType) -> Schema {
        match Self::for_package_type(package_type) {
            Self::None => Schema::new(),
            Self::Cargo(_) => CargoSettings::schema(),
        }
    }
}
