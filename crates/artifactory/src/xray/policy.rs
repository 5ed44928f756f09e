//! Xray policies.
//!
//! A policy is an ordered list of rules. Each rule matches on criteria
//! (a minimum severity for security policies, license lists for license
//! policies) and triggers actions when a watched resource violates it.

use crate::client::Client;
use crate::crud::{Endpoint, RestResource};
use declarative::{Attribute, FieldSet, Marshal, ResourceDefinition, Schema, Validator};
use serde::{Deserialize, Serialize};

const POLICIES: &str = "xray/api/v2/policies";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRule {
    pub name: String,
    pub priority: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<Criteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Actions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub min_severity: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_licenses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub banned_licenses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_unknown: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Actions {
    pub fail_build: bool,
    pub block_release_bundle_distribution: bool,
    pub notify_watch_recipients: bool,
    pub notify_deployer: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mails: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_download: Option<BlockDownload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockDownload {
    pub active: bool,
    pub unscanned: bool,
}

impl Marshal for Policy {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("name", |p: &Self| &p.name, |p| &mut p.name)
            .attr("description", |p: &Self| &p.description, |p| &mut p.description)
            .attr("type", |p: &Self| &p.policy_type, |p| &mut p.policy_type)
            .blocks("rules", |p: &Self| &p.rules, |p| &mut p.rules)
    }
}

impl Marshal for PolicyRule {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("name", |r: &Self| &r.name, |r| &mut r.name)
            .attr("priority", |r: &Self| &r.priority, |r| &mut r.priority)
            .block("criteria", |r: &Self| &r.criteria, |r| &mut r.criteria)
            .block("actions", |r: &Self| &r.actions, |r| &mut r.actions)
    }
}

impl Marshal for Criteria {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("min_severity", |c: &Self| &c.min_severity, |c| &mut c.min_severity)
            .attr("allowed_licenses", |c: &Self| &c.allowed_licenses, |c| &mut c.allowed_licenses)
            .attr("banned_licenses", |c: &Self| &c.banned_licenses, |c| &mut c.banned_licenses)
            .attr("allow_unknown", |c: &Self| &c.allow_unknown, |c| &mut c.allow_unknown)
    }
}

impl Marshal for Actions {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("fail_build", |a: &Self| &a.fail_build, |a| &mut a.fail_build)
            .attr(
                "block_release_bundle_distribution",
                |a: &Self| &a.block_release_bundle_distribution,
                |a| &mut a.block_release_bundle_distribution,
            )
            .attr(
                "notify_watch_recipients",
                |a: &Self| &a.notify_watch_recipients,
                |a| &mut a.notify_watch_recipients,
            )
            .attr("notify_deployer", |a: &Self| &a.notify_deployer, |a| &mut a.notify_deployer)
            .attr("mails", |a: &Self| &a.mails, |a| &mut a.mails)
            .attr("webhooks", |a: &Self| &a.webhooks, |a| &mut a.webhooks)
            .block("block_download", |a: &Self| &a.block_download, |a| &mut a.block_download)
    }
}

impl Marshal for BlockDownload {
    fn fields() -> FieldSet<Self> {
        FieldSet::new()
            .attr("active", |b: &Self| &b.active, |b| &mut b.active)
            .attr("unscanned", |b: &Self| &b.unscanned, |b| &mut b.unscanned)
    }
}

fn criteria_schema() -> Schema {
    Schema::new()
        .with(
            "min_severity",
            Attribute::string()
                .optional()
                .validate(Validator::one_of(["All Severities", "Critical", "High", "Medium", "Low"]))
                .description("The minimum security vulnerability severity that will be impacted by the policy."),
        )
        .with(
            "allowed_licenses",
            Attribute::string_set()
                .optional()
                .description("A list of OSS license names that may be attached to a component."),
        )
        .with(
            "banned_licenses",
            Attribute::string_set()
                .optional()
                .description("A list of OSS license names that may not be attached to a component."),
        )
        .with(
            "allow_unknown",
            Attribute::bool()
                .optional()
                .description("Whether or not a license with an unknown license should be allowed."),
        )
}

fn actions_schema() -> Schema {
    let flag = || Attribute::bool().optional();
    Schema::new()
        .with("fail_build", flag().description("Whether or not the related CI build should be marked as failed if a violation is triggered."))
        .with("block_release_bundle_distribution", flag())
        .with("notify_watch_recipients", flag())
        .with("notify_deployer", flag())
        .with("mails", Attribute::string_set().optional())
        .with("webhooks", Attribute::string_set().optional())
        .with(
            "block_download",
            Attribute::block(
                Schema::new()
                    .with("active", Attribute::bool().optional())
                    .with("unscanned", Attribute::bool().optional()),
            )
            .optional()
            .max_items(1),
        )
}

pub fn schema() -> Schema {
    Schema::new()
        .with(
            "name",
            Attribute::string()
                .required()
                .force_new()
                .description("Name of the policy (must be unique)"),
        )
        .with("description", Attribute::string().optional())
        .with(
            "type",
            Attribute::string()
                .required()
                .force_new()
                .validate(Validator::one_of(["security", "license"])),
        )
        .with(
            "rules",
            Attribute::block(
                Schema::new()
                    .with("name", Attribute::string().required())
                    .with("priority", Attribute::int().required().validate(Validator::IntAtLeast(1)))
                    .with("criteria", Attribute::block(criteria_schema()).required().max_items(1))
                    .with("actions", Attribute::block(actions_schema()).optional().max_items(1)),
            )
            .required()
            .description("Nested block describing the policy rules"),
        )
}

pub fn resource() -> ResourceDefinition<Client> {
    ResourceDefinition::new(
        schema(),
        RestResource::marshalled(Endpoint::Xray(POLICIES), "name", Policy::default),
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
        let criteria = attrs(&[("min_severity", "High".into())]);
        let block_download = attrs(&[("active", true.into()), ("unscanned", false.into())]);
        let actions = attrs(&[
            ("fail_build", true.into()),
            ("mails", Value::string_set(["sec@example.com"])),
            ("block_download", Value::block(block_download)),
        ]);
        let rule = attrs(&[
            ("name", "high-sev".into()),
            ("priority", 1_i64.into()),
            ("criteria", Value::block(criteria)),
            ("actions", Value::block(actions)),
        ]);
        attrs(&[
            ("name", "no-high-vulns".into()),
            ("type", "security".into()),
            ("rules", Value::List(vec![Value::Map(rule)])),
        ])
    }

    #[test]
    fn test_schema_accepts_nested_rules() {
        assert!(schema().validate(&declared()).is_empty());

        let mut bad = declared();
        bad.insert("type".into(), "quality".into());
        let diags = schema().validate(&bad);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("type"));
    }

    #[test]
    fn test_create_posts_to_collection() {
        let mock = MockTransport::new();
        let def = resource();
        let mut d = ResourceData::new(Arc::clone(&def.schema), "", Attributes::new(), declared());

        def.ops.create(&Context::default(), &client(&mock), &mut d).unwrap();

        let post = &mock.requests_with(Method::Post)[0];
        assert_eq!(post.url, "http://mock/xray/api/v2/policies");
        assert_eq!(
            post.json(),
            json!({
                "name": "no-high-vulns",
                "type": "security",
                "rules": [{
                    "name": "high-sev",
                    "priority": 1,
                    "criteria": {"min_severity": "High"},
                    "actions": {
                        "fail_build": true,
                        "block_release_bundle_distribution": false,
                        "notify_watch_recipients": false,
                        "notify_deployer": false,
                        "mails": ["sec@example.com"],
                        "block_download": {"active": true, "unscanned": false},
                    },
                }],
            })
        );
        assert_eq!(d.id(), "no-high-vulns");
        let rules = d.get_blocks("rules");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].get_string("name", false), "high-sev");
        assert_eq!(rules[0].get_blocks("actions")[0].get_list("mails", false), vec!["sec@example.com"]);
    }

    #[test]
    fn test_update_puts_item() {
        let mock = MockTransport::new();
        let client = client(&mock);
        let def = resource();
        let ctx = Context::default();
        let mut d = ResourceData::new(Arc::clone(&def.schema), "", Attributes::new(), declared());
        def.ops.create(&ctx, &client, &mut d).unwrap();

        let mut changed = declared();
        changed.insert("description".into(), "blocks high severity issues".into());
        let mut d = ResourceData::new(Arc::clone(&def.schema), "no-high-vulns", d.state(), changed);
        def.ops.update(&ctx, &client, &mut d).unwrap();

        let put = &mock.requests_with(Method::Put)[0];
        assert_eq!(put.url, "http://mock/xray/api/v2/policies/no-high-vulns");
        assert_eq!(
            mock.object("xray/api/v2/policies/no-high-vulns").unwrap()["description"],
            "blocks high severity issues"
        );
    }

    #[test]
    fn test_license_criteria_round_trip() {
        let policy: Policy = serde_json::from_value(json!({
            "name": "licenses",
            "type": "license",
            "rules": [{
                "name": "no-gpl",
                "priority": 1,
                "criteria": {"banned_licenses": ["GPL-3.0"], "allow_unknown": false},
            }],
            "author": "admin",
        }))
        .unwrap();

        let criteria = policy.rules[0].criteria.as_ref().unwrap();
        assert_eq!(criteria.banned_licenses, vec!["GPL-3.0"]);
        assert_eq!(criteria.allow_unknown, Some(false));
        assert!(policy.rules[0].actions.is_none());
    }
}
