//! Xray security and license policies, and the watches that apply them.

pub mod policy;
pub mod watch;

use crate::client::Client;
use declarative::ResourceMap;

pub const POLICY_RESOURCE: &str = "artifactory_xray_policy";
pub const WATCH_RESOURCE: &str = "artifactory_xray_watch";

pub fn xray_resources() -> ResourceMap<Client> {
    let mut resources = ResourceMap::new();
    resources.insert(POLICY_RESOURCE, policy::resource());
    resources.insert(WATCH_RESOURCE, watch::resource());
    resources
}
