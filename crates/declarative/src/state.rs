//! Persisted resource state
//!
//! State is a JSON document listing every managed instance with its remote
//! id and last-read attributes.

use crate::error::{Error, Result};
use crate::value::Attributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Current state file format version
pub const STATE_VERSION: u32 = 1;

/// `type.name` address of a resource instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
}

impl Address {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Stored state of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(flatten)]
    pub address: Address,
    /// Remote id
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// The whole state file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resources: Vec<InstanceState>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            last_updated: None,
            resources: Vec::new(),
        }
    }
}

impl State {
    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file {} does not exist, using empty state", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state: State = serde_json::from_str(&content)?;

        log::debug!(
            "Loaded {} instance(s) from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk, stamping `last_updated`
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Some(Utc::now());
        self.resources.sort_by(|a, b| a.address.cmp(&b.address));

        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| Error::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn get(&self, address: &Address) -> Option<&InstanceState> {
        self.resources.iter().find(|r| &r.address == address)
    }

    /// Insert or replace an instance
    pub fn upsert(&mut self, instance: InstanceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.address == instance.address)
        {
            Some(existing) => *existing = instance,
            None => self.resources.push(instance),
        }
    }

    pub fn remove(&mut self, address: &Address) -> Option<InstanceState> {
        let pos = self.resources.iter().position(|r| &r.address == address)?;
        Some(self.resources.remove(pos))
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use tempfile::TempDir;

    fn instance(name: &str) -> InstanceState {
        let mut attributes = Attributes::new();
        attributes.insert("key".into(), Value::from(name));
        attributes.insert("property_sets".into(), Value::string_set(["a"]));
        InstanceState {
            address: Address::new("artifactory_local_generic_repository", name),
            id: name.to_string(),
            attributes,
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let state = State::load(&tmp.path().join("nope.json")).unwrap();
        assert!(state.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("state.json");

        let mut state = State::default();
        state.upsert(instance("b-repo"));
        state.upsert(instance("a-repo"));
        state.save(&path).unwrap();

        let loaded = State::load(&path).unwrap();
        assert!(loaded.last_updated.is_some());
        assert_eq!(loaded.resources.len(), 2);
        assert_eq!(loaded.resources[0].address.name, "a-repo");
        // sets come back as lists; the schema turns them into sets again
        assert_eq!(
            loaded.resources[0].attributes["property_sets"],
            Value::string_list(["a"])
        );
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut state = State::default();
        state.upsert(instance("r"));
        let mut changed = instance("r");
        changed.id = "other".into();
        state.upsert(changed);

        let address = Address::new("artifactory_local_generic_repository", "r");
        assert_eq!(state.get(&address).map(|i| i.id.as_str()), Some("other"));
        assert!(state.remove(&address).is_some());
        assert!(state.is_empty());
    }

    #[test]
    fn test_address_display() {
        let address = Address::new("artifactory_xray_watch", "all");
        assert_eq!(address.to_string(), "artifactory_xray_watch.all");
    }
}
