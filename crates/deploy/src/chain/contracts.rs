//! Hardhat compilation artifacts and library linking.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;

use super::LinkedLibraries;

/// Contract name of the ERC-1967 proxy placed in front of upgradeable deployments.
pub const ERC1967_PROXY: &str = "ERC1967Proxy";

/// Directory Hardhat writes full compiler inputs/outputs to.
const BUILD_INFO_DIR: &str = "build-info";

/// Suffix of Hardhat debug files written next to every artifact.
const DEBUG_SUFFIX: &str = ".dbg.json";

/// Byte length of an address placeholder in unlinked bytecode.
const ADDRESS_LEN: usize = 20;

#[derive(Debug, Clone, Copy, Deserialize)]
struct LinkOffset {
    start: usize,
    length: usize,
}

/// The subset of a Hardhat artifact needed to deploy it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    bytecode: String,
    /// Source file → library name → placeholder offsets.
    #[serde(default)]
    link_references: BTreeMap<String, BTreeMap<String, Vec<LinkOffset>>>,
    #[serde(skip)]
    path: PathBuf,
}

/// Index of the contracts compiled into a Hardhat artifacts directory.
#[derive(Debug, Clone, Default)]
pub struct ContractRepository {
    root: PathBuf,
    /// More than one entry means the name is ambiguous.
    contracts: HashMap<String, Vec<HardhatArtifact>>,
}

impl ContractRepository {
    /// Walk `root` and index every artifact by contract name.
    ///
    /// Names defined by several artifacts only fail once they are looked up.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut contracts: HashMap<String, Vec<HardhatArtifact>> = HashMap::new();

        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir)
                .with_context(|| format!("Failed to read artifacts directory {}", dir.display()))?;

            for entry in entries {
                let path = entry
                    .with_context(|| format!("Failed to read entry in {}", dir.display()))?
                    .path();

                if path.is_dir() {
                    if path.file_name().is_some_and(|name| name == BUILD_INFO_DIR) {
                        continue;
                    }
                    pending.push(path);
                    continue;
                }

                let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
                    continue;
                };
                if !file_name.ends_with(".json") || file_name.ends_with(DEBUG_SUFFIX) {
                    continue;
                }

                let artifact = Self::read_artifact(&path)?;
                tracing::trace!(contract = %artifact.contract_name, path = %path.display(), "Indexed contract artifact");

                let defined = contracts.entry(artifact.contract_name.clone()).or_default();
                if !defined.is_empty() {
                    tracing::debug!(contract = %artifact.contract_name, path = %path.display(), "Contract name defined by more than one artifact");
                }
                defined.push(artifact);
            }
        }

        tracing::debug!(root = %root.display(), contracts = contracts.len(), "Loaded contract artifacts");

        Ok(Self { root, contracts })
    }

    fn read_artifact(path: &Path) -> Result<HardhatArtifact> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let mut artifact: HardhatArtifact = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;
        artifact.path = path.to_path_buf();
        Ok(artifact)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, contract: &str) -> bool {
        self.contracts.contains_key(contract)
    }

    /// Names of every indexed contract, sorted.
    pub fn contract_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.contracts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Creation bytecode of `contract` with every library placeholder replaced.
    ///
    /// Every library referenced by the bytecode must be supplied, and every
    /// supplied library must be referenced.
    pub fn linked_bytecode(&self, contract: &str, libraries: &LinkedLibraries) -> Result<Bytes> {
        let artifact = match self.contracts.get(contract).map(Vec::as_slice) {
            Some([artifact]) => artifact,
            Some(artifacts) if !artifacts.is_empty() => {
                let paths: Vec<_> = artifacts.iter().map(|a| a.path.display().to_string()).collect();
                anyhow::bail!(
                    "Contract {} is ambiguous: defined by {} artifacts ({})",
                    contract,
                    artifacts.len(),
                    paths.join(", ")
                );
            }
            _ => anyhow::bail!("No artifact for contract {} in {}", contract, self.root.display()),
        };

        let mut code = artifact
            .bytecode
            .strip_prefix("0x")
            .unwrap_or(&artifact.bytecode)
            .to_string();
        if code.is_empty() {
            anyhow::bail!("Contract {} has no creation bytecode (abstract or interface?)", contract);
        }

        let mut referenced = Vec::new();
        for (library, offsets) in artifact.link_references.values().flatten() {
            let address = libraries.get(library).with_context(|| {
                format!("Contract {} requires library {} but no address was supplied", contract, library)
            })?;
            let encoded = hex::encode(address.as_slice());

            for offset in offsets {
                if offset.length != ADDRESS_LEN {
                    anyhow::bail!(
                        "Unexpected link reference length {} for library {} in {}",
                        offset.length,
                        library,
                        contract
                    );
                }
                let range = offset.start * 2..(offset.start + offset.length) * 2;
                if range.end > code.len() {
                    anyhow::bail!(
                        "Link reference for library {} lies outside the bytecode of {}",
                        library,
                        contract
                    );
                }
                code.replace_range(range, &encoded);
            }
            referenced.push(library.as_str());
        }

        if let Some(unused) = libraries.keys().find(|name| !referenced.contains(&name.as_str())) {
            anyhow::bail!("Library {} is not referenced by contract {}", unused, contract);
        }

        let bytes = hex::decode(&code)
            .with_context(|| format!("Bytecode of {} still contains unlinked placeholders", contract))?;

        Ok(bytes.into())
    }
}
