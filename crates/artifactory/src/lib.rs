//! # artifactory
//!
//! Artifactory repositories and Xray policies and watches as declarative
//! resources.
//!
//! The crate plugs into [`declarative`]: [`provider::resources`] returns the
//! resource table, and every operation receives a configured [`Client`].
//!
//! ## Example
//!
//! ```no_run
//! use artifactory::{Provider, ProviderConfig};
//! use declarative::Context;
//!
//! let provider = Provider::new();
//! let config = ProviderConfig::default().with_env();
//! let client = provider.configure(&config, &Context::default()).expect("configured client");
//! let maven = provider.resources().get("artifactory_local_maven_repository");
//! ```
//!
//! ## Resources
//!
//! - `artifactory_{local,remote,virtual}_{package_type}_repository` for each
//!   of the 29 package types
//! - `artifactory_local_repository` and `artifactory_virtual_repository`,
//!   untyped and kept for older configurations
//! - `artifactory_xray_policy` and `artifactory_xray_watch`
//!
//! ## Testing
//!
//! [`transport::MockTransport`] is an in-memory server that records every
//! request, so resources can be exercised end to end without a network.

pub mod client;
pub mod config;
pub mod crud;
pub mod error;
pub mod provider;
pub mod repository;
pub mod retry;
pub mod transport;
pub mod types;
pub mod xray;

pub use client::{Auth, Client};
pub use config::{ProviderConfig, RetrySettings};
pub use error::{Error, ErrorCategory, Result};
pub use provider::{Provider, resources};
pub use types::{PackageType, Rclass, RetryConfig};
