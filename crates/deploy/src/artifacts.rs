//! Deployed artifacts and the append-only store that threads them between steps.

use std::collections::BTreeMap;

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DeployError;

/// Metadata key holding the contract identifier an artifact was deployed from.
pub const CONTRACT_KEY: &str = "contract";
/// Metadata key holding the hash of the deployment transaction.
pub const TX_HASH_KEY: &str = "tx_hash";
/// Metadata key holding the implementation address behind a proxy.
pub const IMPLEMENTATION_KEY: &str = "implementation";
/// Metadata key holding the hash of the implementation deployment transaction.
pub const IMPLEMENTATION_TX_HASH_KEY: &str = "implementation_tx_hash";
/// Metadata key holding the initializer signature invoked through a proxy.
pub const INITIALIZER_KEY: &str = "initializer";
/// Metadata key holding the libraries linked into the deployed bytecode.
pub const LIBRARIES_KEY: &str = "libraries";

/// The durable result of a successful deployment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Logical component name (the name of the step that produced it).
    pub name: String,
    /// On-chain address of the component.
    pub address: Address,
    /// Free-form deployment details.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl Artifact {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
            metadata: BTreeMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// The contract identifier recorded for this artifact, if any.
    pub fn contract(&self) -> Option<&str> {
        self.metadata.get(CONTRACT_KEY).and_then(Value::as_str)
    }
}

/// Mapping from component name to its [`Artifact`].
///
/// Keys are unique and the store only grows. Iteration follows insertion order,
/// which is the deployment order of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtifactStore {
    artifacts: Vec<Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an artifact under its name.
    ///
    /// Only the orchestrator writes to the store.
    pub(crate) fn put(&mut self, artifact: Artifact) -> Result<(), DeployError> {
        if self.contains(&artifact.name) {
            return Err(DeployError::DuplicateArtifact(artifact.name));
        }
        self.artifacts.push(artifact);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Artifact, DeployError> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.name == name)
            .ok_or_else(|| DeployError::UnknownArtifact(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.iter().any(|artifact| artifact.name == name)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    /// Component names in deployment order.
    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|artifact| artifact.name.as_str()).collect()
    }

    pub fn into_vec(self) -> Vec<Artifact> {
        self.artifacts
    }
}

impl<'a> IntoIterator for &'a ArtifactStore {
    type Item = &'a Artifact;
    type IntoIter = std::slice::Iter<'a, Artifact>;

    fn into_iter(self) -> Self::IntoIter {
        self.artifacts.iter()
    }
}
