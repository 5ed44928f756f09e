//! Core types for Artifactory resources.

use declarative::{Attr, ResourceData, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Repository class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rclass {
    #[default]
    Local,
    Remote,
    Virtual,
}

impl Rclass {
    pub const ALL: [Rclass; 3] = [Self::Local, Self::Remote, Self::Virtual];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Virtual => "virtual",
        }
    }
}

impl fmt::Display for Rclass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact format served by a repository.
///
/// Fixed at creation; changing it replaces the repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Alpine,
    Bower,
    Cargo,
    Chef,
    Cocoapods,
    Composer,
    Conan,
    Conda,
    Cran,
    Debian,
    Docker,
    Gems,
    #[default]
    Generic,
    Gitlfs,
    Go,
    Gradle,
    Helm,
    Ivy,
    Maven,
    Npm,
    Nuget,
    Opkg,
    P2,
    Puppet,
    Pypi,
    Rpm,
    Sbt,
    Vagrant,
    Vcs,
}

impl PackageType {
    /// Every supported package type, in alphabetical order.
    pub const ALL: [PackageType; 29] = [
        Self::Alpine,
        Self::Bower,
        Self::Cargo,
        Self::Chef,
        Self::Cocoapods,
        Self::Composer,
        Self::Conan,
        Self::Conda,
        Self::Cran,
        Self::Debian,
        Self::Docker,
        Self::Gems,
        Self::Generic,
        Self::Gitlfs,
        Self::Go,
        Self::Gradle,
        Self::Helm,
        Self::Ivy,
        Self::Maven,
        Self::Npm,
        Self::Nuget,
        Self::Opkg,
        Self::P2,
        Self::Puppet,
        Self::Pypi,
        Self::Rpm,
        Self::Sbt,
        Self::Vagrant,
        Self::Vcs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alpine => "alpine",
            Self::Bower => "bower",
            Self::Cargo => "cargo",
            Self::Chef => "chef",
            Self::Cocoapods => "cocoapods",
            Self::Composer => "composer",
            Self::Conan => "conan",
            Self::Conda => "conda",
            Self::Cran => "cran",
            Self::Debian => "debian",
            Self::Docker => "docker",
            Self::Gems => "gems",
            Self::Generic => "generic",
            Self::Gitlfs => "gitlfs",
            Self::Go => "go",
            Self::Gradle => "gradle",
            Self::Helm => "helm",
            Self::Ivy => "ivy",
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::Nuget => "nuget",
            Self::Opkg => "opkg",
            Self::P2 => "p2",
            Self::Puppet => "puppet",
            Self::Pypi => "pypi",
            Self::Rpm => "rpm",
            Self::Sbt => "sbt",
            Self::Vagrant => "vagrant",
            Self::Vcs => "vcs",
        }
    }

    /// Maven-layout build tools sharing the same repository settings.
    pub fn is_maven_family(&self) -> bool {
        matches!(self, Self::Maven | Self::Gradle | Self::Ivy | Self::Sbt)
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|pt| pt.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown package type: {s}"))
    }
}

impl Attr for PackageType {
    fn to_value(&self) -> Option<Value> {
        Some(Value::from(self.as_str()))
    }

    fn read(d: &ResourceData, key: &str, only_if_changed: bool) -> Self {
        d.get_string(key, only_if_changed).parse().unwrap_or_default()
    }

    fn read_opt(d: &ResourceData, key: &str, only_if_changed: bool) -> Option<Self> {
        d.get_string_ref(key, only_if_changed)
            .and_then(|s| s.parse().ok())
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(200),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        if delay.is_nan() || delay <= 0.0 {
            return Duration::ZERO;
        }
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Retries without waiting, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }
}
