pub mod apply;
pub mod import;
pub mod schema;
pub mod validate;

use crate::Context;
use crate::config::{self, ArtprovConfig};
use anyhow::{Context as _, Result};
use artifactory::{Client, Provider};
use declarative::State;
use std::path::PathBuf;

/// Host context handed to resource operations
pub fn host_context() -> declarative::Context {
    declarative::Context::new(env!("CARGO_PKG_VERSION"))
}

/// Configuration, state and provider for one command run
pub struct Session {
    pub config: ArtprovConfig,
    pub state_path: PathBuf,
    pub state: State,
    pub provider: Provider,
    pub host: declarative::Context,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config_path = config::resolve_config(&ctx.config);
        log::debug!("loading configuration from {}", config_path.display());
        let config = ArtprovConfig::load(&config_path)?;
        Self::with_config(config, config::expand_path(&ctx.state))
    }

    pub fn with_config(config: ArtprovConfig, state_path: PathBuf) -> Result<Self> {
        let state = State::load(&state_path)
            .with_context(|| format!("Could not load state from {}", state_path.display()))?;
        Ok(Self {
            config,
            state_path,
            state,
            provider: Provider::new(),
            host: host_context(),
        })
    }

    /// Configure a client for the declared server
    pub fn connect(&self) -> Result<Client> {
        self.provider
            .configure(&self.config.provider, &self.host)
            .context("Could not configure the Artifactory client")
    }

    pub fn save_state(&mut self) -> Result<()> {
        self.state
            .save(&self.state_path)
            .with_context(|| format!("Could not save state to {}", self.state_path.display()))
    }
}
