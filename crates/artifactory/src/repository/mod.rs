//! Repository Type Registry.
//!
//! Every repository payload is a [`Repository`]: the base parameters of its
//! class plus the extension selected by its package type. Both halves carry
//! a field table, so one descriptor-driven unpack and pack serves all 87
//! typed resources and the two legacy untyped ones.
//!
//! Resource names follow `artifactory_{class}_{package_type}_repository`.

pub mod legacy;
pub mod local;
pub mod remote;
pub mod validators;
pub mod virtual_repo;

use crate::client::Client;
use crate::crud::{Endpoint, RestResource};
use crate::types::{PackageType, Rclass};
use declarative::{FieldSet, Marshal, ResourceData, ResourceDefinition, ResourceMap, Schema};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base parameters shared by every package type of one repository class
pub trait BaseParams: Marshal + Serialize + DeserializeOwned + Clone + fmt::Debug {
    const RCLASS: Rclass;

    /// Empty parameters stamped with the class and package type
    fn stamped(package_type: PackageType) -> Self;

    fn key(&self) -> &str;

    fn package_type(&self) -> PackageType;

    fn schema() -> Schema;
}

/// Package-type-specific parameters of one repository class
pub trait Extension: Marshal + Serialize + Clone + fmt::Debug {
    /// The (empty) variant used by `package_type`
    fn for_package_type(package_type: PackageType) -> Self;

    /// Read the variant for `package_type` out of a payload object
    fn decode(package_type: PackageType, payload: &serde_json::Value) -> serde_json::Result<Self>;

    /// Attributes the variant for `package_type` adds to the base schema
    fn schema(package_type: PackageType) -> Schema;

    /// Adjust values after unpacking declared configuration
    fn normalize(&mut self) {}
}

/// A repository payload: class base parameters plus package-type extension
#[derive(Debug, Clone, Default, Serialize)]
pub struct Repository<B, E> {
    #[serde(flatten)]
    pub base: B,
    #[serde(flatten)]
    pub ext: E,
}

impl<B: BaseParams, E: Extension> Repository<B, E> {
    pub fn new(package_type: PackageType) -> Self {
        Self {
            base: B::stamped(package_type),
            ext: E::for_package_type(package_type),
        }
    }

    pub fn key(&self) -> &str {
        self.base.key()
    }

    /// Full schema for a typed resource of `package_type`
    pub fn schema(package_type: PackageType) -> Schema {
        B::schema().merge(E::schema(package_type))
    }
}

impl<B: BaseParams, E: Extension> Marshal for Repository<B, E> {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .embed(B::fields(), |r: &Self| &r.base, |r| &mut r.base)
            .embed(E::fields(), |r: &Self| &r.ext, |r| &mut r.ext)
    }
}

impl<'de, B: BaseParams, E: Extension> Deserialize<'de> for Repository<B, E> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = serde_json::Value::deserialize(deserializer)?;
        let base = B::deserialize(&payload).map_err(de::Error::custom)?;
        let ext = E::decode(base.package_type(), &payload).map_err(de::Error::custom)?;
        Ok(Self { base, ext })
    }
}

pub type LocalRepository = Repository<local::LocalRepositoryBaseParams, local::LocalExtension>;
pub type RemoteRepository = Repository<remote::RemoteRepositoryBaseParams, remote::RemoteExtension>;
pub type VirtualRepository =
    Repository<virtual_repo::VirtualRepositoryBaseParams, virtual_repo::VirtualExtension>;

/// Resource type name for a class and package type
pub fn resource_name(rclass: Rclass, package_type: PackageType) -> String {
    format!("artifactory_{rclass}_{package_type}_repository")
}

/// CRUD operations for repositories of one class.
///
/// `construct_type` stamps the payload a read decodes into; the server's
/// own `packageType` wins when present. `declared_type` picks the package
/// type when unpacking declared configuration.
pub(crate) fn repository_ops<B, E>(
    construct_type: PackageType,
    declared_type: impl Fn(&ResourceData) -> PackageType + Send + Sync + 'static,
) -> RestResource<Repository<B, E>>
where
    B: BaseParams,
    E: Extension,
{
    RestResource::new(
        Endpoint::Repositories,
        move || Repository::<B, E>::new(construct_type),
        move |d| {
            let mut repo = Repository::<B, E>::new(declared_type(d));
            Repository::<B, E>::fields().unpack_into(&mut repo, d);
            repo.ext.normalize();
            let key = repo.key().to_string();
            (repo, key)
        },
        |repo, d| Repository::<B, E>::fields().pack(repo, d),
    )
}

fn typed<B: BaseParams, E: Extension>(package_type: PackageType) -> ResourceDefinition<Client> {
    ResourceDefinition::new(
        Repository::<B, E>::schema(package_type),
        repository_ops::<B, E>(package_type, move |_| package_type),
    )
}

/// Every repository resource type: local, remote and virtual for each
/// package type, plus the legacy untyped local and virtual resources
pub fn repository_resources() -> ResourceMap<Client> {
    let mut resources = ResourceMap::new();
    for package_type in PackageType::ALL {
        resources.insert(
            resource_name(Rclass::Local, package_type),
            typed::<local::LocalRepositoryBaseParams, local::LocalExtension>(package_type),
        );
        resources.insert(
            resource_name(Rclass::Remote, package_type),
            typed::<remote::RemoteRepositoryBaseParams, remote::RemoteExtension>(package_type),
        );
        resources.insert(
            resource_name(Rclass::Virtual, package_type),
            typed::<virtual_repo::VirtualRepositoryBaseParams, virtual_repo::VirtualExtension>(
                package_type,
            ),
        );
    }
    resources.insert(legacy::LOCAL_RESOURCE, legacy::local_resource());
    resources.insert(legacy::VIRTUAL_RESOURCE, legacy::virtual_resource());
    resources
}

/// `skip_serializing_if` helper for integer fields the server omits when zero
pub(crate) fn is_zero(value: &i64) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Auth;
    use crate::transport::{Method, MockTransport};
    use crate::types::RetryConfig;
    use declarative::{Attributes, Context, Value};
    use std::sync::Arc;

    pub(crate) fn client(mock: &MockTransport) -> Client {
        Client::new("http://mock", Auth::ApiKey("k".into()), Arc::new(mock.clone()))
            .unwrap()
            .with_retry(RetryConfig::immediate(5))
    }

    fn config(pairs: &[(&str, Value)]) -> Attributes {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_registry_covers_every_class_and_type() {
        let resources = repository_resources();
        assert_eq!(resources.len(), 3 * 29 + 2);
        assert!(resources.contains("artifactory_local_generic_repository"));
        assert!(resources.contains("artifactory_remote_cargo_repository"));
        assert!(resources.contains("artifactory_virtual_maven_repository"));
        assert!(resources.contains("artifactory_local_repository"));
        assert!(
            resources
                .get("artifactory_virtual_repository")
                .unwrap()
                .deprecation
                .is_some()
        );
    }

    #[test]
    fn test_bad_key_fails_before_any_request() {
        let resources = repository_resources();
        let def = resources.get("artifactory_local_generic_repository").unwrap();
        let diags = def.schema.validate(&config(&[("key", "0bad".into())]));

        assert_eq!(diags.len(), 1);
        assert!(diags[0].summary.contains("repo key cannot start with a number"));
    }

    #[test]
    fn test_generic_local_create_body() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let resources = repository_resources();
        let def = resources.get("artifactory_local_generic_repository").unwrap();

        let mut d = ResourceData::new(
            Arc::clone(&def.schema),
            "",
            Attributes::new(),
            config(&[("key", "my-repo".into())]),
        );
        def.ops.create(&Context::default(), &client, &mut d).unwrap();

        let put = &mock.requests_with(Method::Put)[0];
        assert_eq!(put.url, "http://mock/artifactory/api/repositories/my-repo");
        let body = put.json();
        assert_eq!(body["key"], "my-repo");
        assert_eq!(body["rclass"], "local");
        assert_eq!(body["packageType"], "generic");
        assert_eq!(body["blackedOut"], false);
        assert!(body.get("maxUniqueSnapshots").is_none());

        assert_eq!(d.id(), "my-repo");
        assert_eq!(d.get_string("package_type", false), "generic");
        assert_eq!(d.get_string("repo_layout_ref", false), "simple-default");
    }

    #[test]
    fn test_read_of_deleted_repository_clears_state() {
        let mock = MockTransport::new();
        let resources = repository_resources();
        let def = resources.get("artifactory_local_generic_repository").unwrap();
        let mut d = ResourceData::from_state(Arc::clone(&def.schema), "my-repo", Attributes::new());

        def.ops.read(&Context::default(), &client(&mock), &mut d).unwrap();
        assert!(d.is_absent());
    }

    #[test]
    fn test_round_trip_on_common_fields() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let resources = repository_resources();
        let def = resources.get("artifactory_local_maven_repository").unwrap();
        let declared = config(&[
            ("key", "libs-release".into()),
            ("description", "releases".into()),
            ("includes_pattern", "com/acme/**".into()),
            ("property_sets", Value::string_list(["artifactory"])),
            ("handle_snapshots", false.into()),
            ("max_unique_snapshots", 10_i64.into()),
            ("checksum_policy_type", "client-checksums".into()),
        ]);

        let mut d = ResourceData::new(Arc::clone(&def.schema), "", Attributes::new(), declared.clone());
        def.ops.create(&Context::default(), &client, &mut d).unwrap();

        let state = d.state();
        for (key, value) in &declared {
            let expected = def.schema.get(key).unwrap().ty.coerce(value.clone());
            assert_eq!(&state[key], &expected, "{key}");
        }
        let body = mock.requests_with(Method::Put)[0].json();
        assert_eq!(body["maxUniqueSnapshots"], 10);
        assert_eq!(body["checksumPolicyType"], "client-checksums");
    }

    #[test]
    fn test_decode_selects_extension_from_payload() {
        let payload = serde_json::json!({
            "key": "images",
            "rclass": "local",
            "packageType": "docker",
            "dockerApiVersion": "V1",
            "maxUniqueTags": 5,
        });
        let repo: LocalRepository = serde_json::from_value(payload).unwrap();

        assert_eq!(repo.base.package_type, PackageType::Docker);
        match repo.ext {
            local::LocalExtension::Docker(settings) => {
                assert_eq!(settings.docker_api_version, "V1");
                assert_eq!(settings.max_unique_tags, 5);
            }
            other => panic!("unexpected extension {other:?}"),
        }
    }
}
