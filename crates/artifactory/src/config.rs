//! Provider configuration.
//!
//! Every connection field can be left out of the configuration file and
//! taken from the environment instead:
//!
//! | field          | variable                   |
//! |----------------|----------------------------|
//! | `url`          | `ARTIFACTORY_URL`          |
//! | `access_token` | `ARTIFACTORY_ACCESS_TOKEN` |
//! | `api_key`      | `ARTIFACTORY_API_KEY`      |
//! | `username`     | `ARTIFACTORY_USERNAME`     |
//! | `password`     | `ARTIFACTORY_PASSWORD`     |

use crate::client::{Auth, Client};
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::RetryConfig;
use declarative::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const USAGE_PATH: &str = "artifactory/api/system/usage";
const PARTNER_FEATURE: &str = "Partner/ACC-007450";
/// Reported when the host does not say which version it is
const DEFAULT_HOST_VERSION: &str = "0.11+compatible";

/// Retry settings as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 200,
            backoff_factor: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    /// Reject settings that cannot produce a usable backoff schedule
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(Error::Config(format!(
                "retry.backoff_factor must be a non-negative number, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// Connection settings for the provider
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub url: Option<String>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Tell the server which client is managing it
    pub report_usage: bool,
    pub retry: RetrySettings,
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: None,
            access_token: None,
            api_key: None,
            username: None,
            password: None,
            report_usage: true,
            retry: RetrySettings::default(),
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hidden = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("access_token", &hidden(&self.access_token))
            .field("api_key", &hidden(&self.api_key))
            .field("username", &self.username)
            .field("password", &hidden(&self.password))
            .field("report_usage", &self.report_usage)
            .field("retry", &self.retry)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ProviderConfig {
    /// Fill unset connection fields from the process environment
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_lookup(|name| std::env::var(name).ok())
    }

    /// Fill unset connection fields from `lookup`
    #[must_use]
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fields = [
            (&mut self.url, "ARTIFACTORY_URL"),
            (&mut self.access_token, "ARTIFACTORY_ACCESS_TOKEN"),
            (&mut self.api_key, "ARTIFACTORY_API_KEY"),
            (&mut self.username, "ARTIFACTORY_USERNAME"),
            (&mut self.password, "ARTIFACTORY_PASSWORD"),
        ];
        for (field, var) in fields {
            if field.as_deref().is_none_or(str::is_empty) {
                *field = lookup(var).filter(|v| !v.is_empty()).or(field.take());
            }
        }
        self
    }

    pub fn auth(&self) -> Result<Auth> {
        Auth::select(
            self.access_token.as_deref(),
            self.api_key.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        )
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            backoff_factor: self.retry.backoff_factor,
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Build the client and, unless disabled, report usage
    pub fn configure(&self, transport: Arc<dyn Transport>, ctx: &Context) -> Result<Client> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config("you must supply a URL".into()))?;
        let auth = self.auth()?;
        self.retry.validate()?;
        log::debug!("configuring client for {url} using {}", auth.kind());

        let client = Client::new(url, auth, transport)?.with_retry(self.retry_config());
        if self.report_usage {
            report_usage(&client, ctx)?;
        }
        Ok(client)
    }
}

/// POST the product and feature identifiers to the usage endpoint
pub fn report_usage(client: &Client, ctx: &Context) -> Result<()> {
    let host = if ctx.host_version.is_empty() {
        DEFAULT_HOST_VERSION
    } else {
        ctx.host_version.as_str()
    };
    let body = json!({
        "productId": crate::client::USER_AGENT,
        "features": [
            {"featureId": PARTNER_FEATURE},
            {"featureId": format!("Terraform/{host}")},
        ],
    });

    client
        .post(USAGE_PATH)
        .json(&body)?
        .cancel(&ctx.cancel)
        .send()
        .map_err(|e| Error::Usage(Box::new(e)))?;
    Ok(())
}
