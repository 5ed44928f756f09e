//! Untyped repository resources.
//!
//! These predate the per-package-type resources: the package type is an
//! ordinary attribute and the schema is the union of every type's settings.
//! Only the settings of the declared type are sent.

use super::local::{LocalExtension, LocalRepositoryBaseParams};
use super::virtual_repo::{self, VirtualExtension, VirtualRepositoryBaseParams};
use super::{BaseParams, repository_ops, validators};
use crate::client::Client;
use crate::types::PackageType;
use declarative::{Attribute, ResourceData, ResourceDefinition, Schema, Validator};

pub const LOCAL_RESOURCE: &str = "artifactory_local_repository";
pub const VIRTUAL_RESOURCE: &str = "artifactory_virtual_repository";

const VIRTUAL_DEPRECATION: &str = "This resource is deprecated and you should use repo type specific resources \
                                   (such as artifactory_virtual_maven_repository) in the future";

fn declared_type(d: &ResourceData) -> PackageType {
    d.get_string("package_type", false).parse().unwrap_or_default()
}

pub fn local_resource() -> ResourceDefinition<Client> {
    ResourceDefinition::new(
        local_schema(),
        repository_ops::<LocalRepositoryBaseParams, LocalExtension>(PackageType::Generic, declared_type),
    )
}

pub fn virtual_resource() -> ResourceDefinition<Client> {
    ResourceDefinition::new(
        virtual_schema(),
        repository_ops::<VirtualRepositoryBaseParams, VirtualExtension>(PackageType::Generic, declared_type)
            .with_exists(),
    )
    .deprecated(VIRTUAL_DEPRECATION)
}

fn local_schema() -> Schema {
    let computed_bool = || Attribute::bool().optional().computed();

    LocalRepositoryBaseParams::schema()
        .with(
            "package_type",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(validators::package_type()),
        )
        .with("blacked_out", computed_bool())
        .with("handle_releases", computed_bool())
        .with("handle_snapshots", computed_bool())
        .with("max_unique_snapshots", Attribute::int().optional().computed())
        .with("debian_trivial_layout", Attribute::bool().optional())
        .with(
            "checksum_policy_type",
            Attribute::string()
                .optional()
                .computed()
                .validate(validators::checksum_policy()),
        )
        .with("max_unique_tags", Attribute::int().optional().computed())
        .with(
            "snapshot_version_behavior",
            Attribute::string()
                .optional()
                .computed()
                .validate(validators::snapshot_version_behavior()),
        )
        .with("suppress_pom_consistency_checks", computed_bool())
        .with("calculate_yum_metadata", Attribute::bool().optional())
        .with("yum_root_depth", Attribute::int().optional().validate(Validator::IntAtLeast(0)))
        .with("docker_api_version", Attribute::string().optional().computed())
        .with("enable_file_lists_indexing", computed_bool())
        .with("force_nuget_authentication", computed_bool())
}

fn virtual_schema() -> Schema {
    VirtualRepositoryBaseParams::schema()
        .with(
            "package_type",
            Attribute::string()
                .required()
                .force_new()
                .validate(validators::package_type()),
        )
        .with("debian_trivial_layout", Attribute::bool().optional())
        .with("key_pair", Attribute::string().optional())
        .with(
            "pom_repository_references_cleanup_policy",
            Attribute::string()
                .optional()
                .computed()
                .validate(virtual_repo::pom_cleanup_policy()),
        )
        .with("force_nuget_authentication", Attribute::bool().optional().computed())
}
