//! Provider assembly: the resource table and client configuration.

use crate::client::Client;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::repository::repository_resources;
use crate::transport::Transport;
use crate::transport::agent::UreqTransport;
use crate::xray::xray_resources;
use declarative::{Context, ResourceMap};
use std::sync::Arc;

/// Every resource type this provider manages, keyed by type name
pub fn resources() -> ResourceMap<Client> {
    let mut resources = repository_resources();
    resources.extend(xray_resources());
    resources
}

/// The assembled provider
pub struct Provider {
    resources: ResourceMap<Client>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    pub fn new() -> Self {
        Self {
            resources: resources(),
        }
    }

    pub fn resources(&self) -> &ResourceMap<Client> {
        &self.resources
    }

    /// Build a client for the configured server over HTTP
    pub fn configure(&self, config: &ProviderConfig, ctx: &Context) -> Result<Client> {
        self.configure_with(config, Arc::new(UreqTransport::new(config.timeout())), ctx)
    }

    /// Build a client over the given transport
    pub fn configure_with(
        &self,
        config: &ProviderConfig,
        transport: Arc<dyn Transport>,
        ctx: &Context,
    ) -> Result<Client> {
        config.configure(transport, ctx)
    }
}
