//! Validators and attribute hooks shared by the repository schemas.

use crate::types::PackageType;
use declarative::{Validator, Value};
use regex::Regex;
use std::sync::LazyLock;

static LEADING_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9].*").expect("valid regex"));

/// Characters a repository key may not contain
pub const FORBIDDEN_KEY_CHARS: &str = " !@#$%^&*()_+={}[]:;<>,/?~`|\\";

/// Suffix the server appends to remote repository descriptions
pub const CACHE_SUFFIX: &str = " (local file cache)";

/// Repository keys must not start with a digit or contain shell
/// metacharacters.
pub fn repo_key() -> Validator {
    Validator::All(vec![
        Validator::StringDoesNotMatch {
            pattern: &LEADING_DIGIT,
            message: "repo key cannot start with a number",
        },
        Validator::StringDoesNotContainAny(FORBIDDEN_KEY_CHARS),
    ])
}

pub fn package_type() -> Validator {
    Validator::one_of(PackageType::ALL.iter().map(PackageType::as_str))
}

pub fn checksum_policy() -> Validator {
    Validator::one_of(["client-checksums", "server-generated-checksums"])
}

pub fn snapshot_version_behavior() -> Validator {
    Validator::one_of(["unique", "non-unique", "deployer"])
}

/// Store a digest of the secret instead of the secret
pub fn hash_secret(value: &Value) -> Value {
    match value.as_str() {
        Some(secret) => Value::from(blake3::hash(secret.as_bytes()).to_hex().to_string()),
        None => value.clone(),
    }
}

/// The server reports remote descriptions with a cache suffix appended
pub fn suppress_cache_description(_key: &str, old: &Value, new: &Value) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(old), Some(new)) => old.strip_suffix(CACHE_SUFFIX) == Some(new),
        _ => false,
    }
}
