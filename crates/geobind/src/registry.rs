//! Registry mapping schema versions to dataset bindings.
//!
//! Documents declare the schema they conform to; the registry resolves that
//! declaration to the binding configuration registered for the nearest
//! compatible version. Nearest means the registered version at or above the
//! target, or failing that the one just below it, and compatibility
//! requires matching major versions.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use diagnostics::{log_debug, log_info};

use crate::binding::{BindingConfig, DatasetBinding};
use crate::error::{Error, Result};

/// A `major.minor.patch` schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let mut next = || {
            parts
                .next()
                .ok_or_else(|| format!("'{s}' is not a major.minor.patch version"))?
                .parse::<u32>()
                .map_err(|err| format!("'{s}' is not a major.minor.patch version: {err}"))
        };
        let version = SchemaVersion::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(format!("'{s}' is not a major.minor.patch version"));
        }
        Ok(version)
    }
}

/// A parsed schema identifier: a classification path plus a version.
///
/// Both the compact form `objects/pointset/1.2.0` and the full document
/// form `/objects/pointset/1.2.0/pointset.schema.json` parse to the same
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaId {
    pub classification: String,
    pub version: SchemaVersion,
}

impl SchemaId {
    pub fn new(classification: &str, version: SchemaVersion) -> Self {
        Self {
            classification: classification.to_string(),
            version,
        }
    }

    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidSchemaId {
            id: id.to_string(),
            message: message.to_string(),
        };

        let mut segments: Vec<&str> = id.trim_matches('/').split('/').collect();
        if let Some(last) = segments.last() {
            if last.ends_with(".schema.json") {
                segments.pop();
            }
        }
        let version_segment = segments
            .pop()
            .ok_or_else(|| invalid("missing version segment"))?;
        let version = SchemaVersion::from_str(version_segment)
            .map_err(|message| invalid(&message))?;
        if segments.is_empty() {
            return Err(invalid("missing classification segments"));
        }
        Ok(Self {
            classification: segments.join("/"),
            version,
        })
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.classification, self.version)
    }
}

/// Bindings registered for one classification, ordered by version.
#[derive(Debug, Default)]
struct VersionTable {
    entries: BTreeMap<SchemaVersion, Arc<DatasetBinding>>,
}

impl VersionTable {
    fn register(&mut self, id: &SchemaId, binding: Arc<DatasetBinding>) -> Result<()> {
        if self.entries.contains_key(&id.version) {
            return Err(Error::DuplicateVersion {
                schema_id: id.to_string(),
            });
        }
        self.entries.insert(id.version, binding);
        Ok(())
    }

    fn resolve(&self, id: &SchemaId) -> Result<Arc<DatasetBinding>> {
        let at_or_above = self.entries.range(id.version..).next();
        let below = self.entries.range(..id.version).next_back();
        for candidate in [at_or_above, below] {
            if let Some((version, binding)) = candidate {
                if version.major == id.version.major {
                    log_debug!(
                        "resolved schema {target} to registered version {found}",
                        target: id.to_string(),
                        found: version.to_string()
                    );
                    return Ok(binding.clone());
                }
            }
        }
        Err(Error::NoCompatibleVersion {
            schema_id: id.to_string(),
        })
    }
}

/// Thread-safe registry of dataset bindings, keyed by schema id.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    classifications: RwLock<HashMap<String, VersionTable>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from JSON sources, each a map from schema id to
    /// binding configuration.
    pub fn initialize(sources: &[&str]) -> Result<Self> {
        let registry = Self::new();
        for source in sources {
            let configs: HashMap<String, BindingConfig> = serde_json::from_str(source)?;
            for (id, config) in &configs {
                registry.register(&SchemaId::parse(id)?, config)?;
            }
        }
        Ok(registry)
    }

    /// Compile and register a binding configuration for one schema version.
    /// Registering the same version twice is an error.
    pub fn register(&self, id: &SchemaId, config: &BindingConfig) -> Result<()> {
        let binding = Arc::new(DatasetBinding::from_config(config)?);
        let mut classifications = self
            .classifications
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        classifications
            .entry(id.classification.clone())
            .or_default()
            .register(id, binding)?;
        log_info!("registered binding for schema {id}", id: id.to_string());
        Ok(())
    }

    /// Find the binding for the nearest compatible registered version.
    pub fn resolve(&self, id: &SchemaId) -> Result<Arc<DatasetBinding>> {
        let classifications = self
            .classifications
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let table = classifications
            .get(&id.classification)
            .ok_or_else(|| Error::NoCompatibleVersion {
                schema_id: id.to_string(),
            })?;
        table.resolve(id)
    }
}
