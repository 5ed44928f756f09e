//! Xray watches.
//!
//! The server nests a watch's identity under `general_data` and its
//! resources under `project_resources`; both are flattened into top-level
//! attributes.

use crate::client::Client;
use crate::crud::{Endpoint, RestResource};
use declarative::{Attribute, FieldSet, Marshal, ResourceDefinition, Schema, Validator};
use serde::{Deserialize, Serialize};

const WATCHES: &str = "xray/api/v2/watches";

const RESOURCE_TYPES: [&str; 6] = [
    "all-repos",
    "repository",
    "build",
    "project",
    "all-builds",
    "all-projects",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Watch {
    pub general_data: GeneralData,
    pub project_resources: ProjectResources,
    pub assigned_policies: Vec<AssignedPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub watch_recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralData {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectResources {
    pub resources: Vec<WatchResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bin_mgr_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignedPolicy {
    pub name: String,
    #[serde(rename = "type")]
    pub policy_type: String,
}

impl Marshal for Watch {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .embed(GeneralData::fields(), |w: &Self| &w.general_data, |w| &mut w.general_data)
            .embed(
                ProjectResources::fields(),
                |w: &Self| &w.project_resources,
                |w| &mut w.project_resources,
            )
            .blocks("assigned_policies", |w: &Self| &w.assigned_policies, |w| &mut w.assigned_policies)
            .attr("watch_recipients", |w: &Self| &w.watch_recipients, |w| &mut w.watch_recipients)
    }
}

impl Marshal for GeneralData {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("name", |g: &Self| &g.name, |g| &mut g.name)
            .attr("description", |g: &Self| &g.description, |g| &mut g.description)
            .attr("active", |g: &Self| &g.active, |g| &mut g.active)
    }
}

impl Marshal for ProjectResources {
    fn fields() -> FieldSet<Self> {
        FieldSet::new().blocks("resources", |p: &Self| &p.resources, |p| &mut p.resources)
    }
}

impl Marshal for WatchResource {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("type", |r: &Self| &r.resource_type, |r| &mut r.resource_type)
            .attr("name", |r: &Self| &r.name, |r| &mut r.name)
            .attr("bin_mgr_id", |r: &Self| &r.bin_mgr_id, |r| &mut r.bin_mgr_id)
    }
}

impl Marshal for AssignedPolicy {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("name", |p: &Self| &p.name, |p| &mut p.name)
            .attr("type", |p: &Self| &p.policy_type, |p| &mut p.policy_type)
    }
}

pub fn schema() -> Schema {
    Schema::new()
        .with(
            "name",
            Attribute::string()
                .required()
                .force_new()
                .description("Name of the watch (must be unique)"),
        )
        .with("description", Attribute::string().optional())
        .with(
            "active",
            Attribute::bool()
                .optional()
                .default(true)
                .description("Whether or not the watch will be active"),
        )
        .with(
            "resources",
            Attribute::block(
                Schema::new()
                    .with(
                        "type",
                        Attribute::string()
                            .required()
                            .validate(Validator::one_of(RESOURCE_TYPES)),
                    )
                    .with("name", Attribute::string().optional())
                    .with(
                        "bin_mgr_id",
                        Attribute::string()
                            .optional()
                            .default("default")
                            .description("The ID number of a binary manager resource"),
                    ),
            )
            .required()
            .description("Nested argument describing the resources to be watched"),
        )
        .with(
            "assigned_policies",
            Attribute::block(
                Schema::new()
                    .with("name", Attribute::string().required())
                    .with(
                        "type",
                        Attribute::string()
                            .required()
                            .validate(Validator::one_of(["security", "license"])),
                    ),
            )
            .required()
            .description("Nested argument describing policies that will be applied"),
        )
        .with(
            "watch_recipients",
            Attribute::string_set()
                .optional()
                .description("A list of email addressed that will get emailed when a violation is triggered."),
        )
}

pub fn resource() -> ResourceDefinition<Client> {
    ResourceDefinition::new(
        schema(),
        RestResource::marshalled(Endpoint::Xray(WATCHES), "name", Watch::default),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Auth;
    use crate::transport::{Method, MockTransport};
    use crate::types::RetryConfig;
    use declarative::{Attributes, Context, ResourceData, Value};
    use serde_json::json;
    use std::sync::Arc;

    fn client(mock: &MockTransport) -> Client {
        Client::new("http://mock", Auth::AccessToken("t".into()), Arc::new(mock.clone()))
            .unwrap()
            .with_retry(RetryConfig::immediate(3))
    }

    fn attrs(pairs: &[(&str, Value)]) -> Attributes {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    fn declared() -> Attributes {
        attrs(&[
            ("name", "release-watch".into()),
            (
                "resources",
                Value::List(vec![
                    Value::Map(attrs(&[("type", "repository".into()), ("name", "libs-release".into())])),
                    Value::Map(attrs(&[("type", "all-builds".into())])),
                ]),
            ),
            (
                "assigned_policies",
                Value::block(attrs(&[("name", "no-high-vulns".into()), ("type", "security".into())])),
            ),
            ("watch_recipients", Value::string_set(["sec@example.com"])),
        ])
    }

    #[test]
    fn test_create_nests_wire_shape() {
        let mock = MockTransport::new();
        let def = resource();
        assert!(def.schema.validate(&declared()).is_empty());

        let mut d = ResourceData::new(Arc::clone(&def.schema), "", Attributes::new(), declared());
        def.ops.create(&Context::default(), &client(&mock), &mut d).unwrap();

        let post = &mock.requests_with(Method::Post)[0];
        assert_eq!(post.url, "http://mock/xray/api/v2/watches");
        assert_eq!(
            post.json(),
            json!({
                "general_data": {"name": "release-watch", "active": true},
                "project_resources": {"resources": [
                    {"type": "repository", "name": "libs-release", "bin_mgr_id": "default"},
                    {"type": "all-builds", "bin_mgr_id": "default"},
                ]},
                "assigned_policies": [{"name": "no-high-vulns", "type": "security"}],
                "watch_recipients": ["sec@example.com"],
            })
        );

        assert_eq!(d.id(), "release-watch");
        assert!(d.get_bool("active", false));
        assert_eq!(d.get_blocks("resources").len(), 2);
        assert_eq!(d.get_set("watch_recipients", false), vec!["sec@example.com"]);
    }

    #[test]
    fn test_unknown_resource_type_rejected() {
        let mut bad = declared();
        bad.insert(
            "resources".into(),
            Value::block(attrs(&[("type", "everything".into())])),
        );
        let diags = schema().validate(&bad);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let def = resource();
        let ctx = Context::default();
        let mut d = ResourceData::new(Arc::clone(&def.schema), "", Attributes::new(), declared());
        def.ops.create(&ctx, &client, &mut d).unwrap();

        def.ops.delete(&ctx, &client, &mut d).unwrap();
        assert!(d.is_absent());
        assert!(mock.object("xray/api/v2/watches/release-watch").is_none());

        let mut stale = ResourceData::from_state(Arc::clone(&def.schema), "release-watch", Attributes::new());
        def.ops.delete(&ctx, &client, &mut stale).unwrap();
        assert!(stale.is_absent());
    }
}
