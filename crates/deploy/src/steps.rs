//! Deployment step descriptors and the inputs handed to their argument builders.

use std::fmt;

use alloy_core::primitives::{Address, Bytes};

use crate::{
    Artifact, ArtifactStore, DeployError, DeploymentContext, DeploymentParameters,
    chain::{EncodedCall, LinkedLibraries},
};

/// Builds encoded constructor arguments for a plain deployment.
pub type ArgsBuilder = for<'a> fn(&StepInputs<'a>) -> Result<Bytes, DeployError>;

/// Builds an encoded call (proxy initializer or configuration call).
pub type CallBuilder = for<'a> fn(&StepInputs<'a>) -> Result<EncodedCall, DeployError>;

/// Links a library contract to the dependency artifact that provides its address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryLink {
    /// Library contract name as it appears in the bytecode link references.
    pub library: &'static str,
    /// Name of the dependency artifact deployed from that library.
    pub artifact: &'static str,
}

/// What a step does against the chain.
#[derive(Clone, Copy)]
pub enum StepAction {
    /// Deploy a contract; produces an artifact.
    Deploy {
        contract: &'static str,
        libraries: &'static [LibraryLink],
        constructor_args: ArgsBuilder,
    },
    /// Deploy a contract behind an ERC-1967 proxy and run its initializer;
    /// produces an artifact pointing at the proxy.
    DeployProxy {
        contract: &'static str,
        libraries: &'static [LibraryLink],
        initializer: CallBuilder,
    },
    /// Send a transaction to an already deployed artifact; produces nothing.
    Call {
        target: &'static str,
        call: CallBuilder,
    },
}

impl StepAction {
    pub fn produces_artifact(&self) -> bool {
        !matches!(self, StepAction::Call { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Deploy { .. } => "deploy",
            StepAction::DeployProxy { .. } => "deploy-proxy",
            StepAction::Call { .. } => "call",
        }
    }

    /// The contract deployed by this action, if it deploys one.
    pub fn contract(&self) -> Option<&'static str> {
        match self {
            StepAction::Deploy { contract, .. } | StepAction::DeployProxy { contract, .. } => {
                Some(contract)
            }
            StepAction::Call { .. } => None,
        }
    }

    pub fn libraries(&self) -> &'static [LibraryLink] {
        match self {
            StepAction::Deploy { libraries, .. } | StepAction::DeployProxy { libraries, .. } => {
                libraries
            }
            StepAction::Call { .. } => &[],
        }
    }
}

impl fmt::Debug for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepAction::Deploy {
                contract,
                libraries,
                ..
            } => f
                .debug_struct("Deploy")
                .field("contract", contract)
                .field("libraries", libraries)
                .finish_non_exhaustive(),
            StepAction::DeployProxy {
                contract,
                libraries,
                ..
            } => f
                .debug_struct("DeployProxy")
                .field("contract", contract)
                .field("libraries", libraries)
                .finish_non_exhaustive(),
            StepAction::Call { target, .. } => f
                .debug_struct("Call")
                .field("target", target)
                .finish_non_exhaustive(),
        }
    }
}

/// A named unit of orchestrated work with statically declared dependencies.
#[derive(Debug, Clone, Copy)]
pub struct StepDescriptor {
    pub name: &'static str,
    pub depends_on: &'static [&'static str],
    pub action: StepAction,
}

/// The artifacts a step declared as dependencies, resolved from the store.
#[derive(Debug, Clone)]
pub struct ResolvedDependencies<'a> {
    artifacts: Vec<&'a Artifact>,
}

impl<'a> ResolvedDependencies<'a> {
    pub(crate) fn resolve(
        names: &[&'static str],
        store: &'a ArtifactStore,
    ) -> Result<Self, DeployError> {
        let artifacts = names
            .iter()
            .map(|name| store.get(name))
            .collect::<Result<_, _>>()?;
        Ok(Self { artifacts })
    }

    /// Look up a declared dependency.
    ///
    /// Artifacts present in the store but not declared by the step stay invisible.
    pub fn get(&self, name: &str) -> Result<&'a Artifact, DeployError> {
        self.artifacts
            .iter()
            .copied()
            .find(|artifact| artifact.name == name)
            .ok_or_else(|| DeployError::UnknownArtifact(name.to_string()))
    }

    pub fn address(&self, name: &str) -> Result<Address, DeployError> {
        self.get(name).map(|artifact| artifact.address)
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Everything an argument builder may read.
#[derive(Debug, Clone)]
pub struct StepInputs<'a> {
    pub step: &'static str,
    pub dependencies: ResolvedDependencies<'a>,
    pub params: &'a DeploymentParameters,
    pub context: &'a DeploymentContext,
}

impl StepInputs<'_> {
    /// Resolve library links into the addresses to write into the bytecode.
    pub fn linked_libraries(&self, links: &[LibraryLink]) -> Result<LinkedLibraries, DeployError> {
        links
            .iter()
            .map(|link| Ok((link.library.to_string(), self.dependencies.address(link.artifact)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;

    use super::*;

    fn store() -> ArtifactStore {
        let mut store = ArtifactStore::new();
        store.put(Artifact::new("library", Address::with_last_byte(1))).unwrap();
        store.put(Artifact::new("registry", Address::with_last_byte(3))).unwrap();
        store
    }

    fn params() -> DeploymentParameters {
        DeploymentParameters {
            total_supply_cap: U256::from(1),
            max_claim_per_wallet: U256::from(1),
            start_time: 1,
            end_time: 2,
            base_price: U256::ZERO,
            growth_rate: U256::ZERO,
        }
    }

    fn context() -> DeploymentContext {
        DeploymentContext {
            owner: Address::with_last_byte(0xaa),
            stable_asset: Address::with_last_byte(0xbb),
            token_name: "MySocial".to_string(),
            token_symbol: "MYSO".to_string(),
        }
    }

    #[test]
    fn test_resolve_missing_dependency() {
        let store = store();
        let err = ResolvedDependencies::resolve(&["token"], &store).unwrap_err();
        assert!(matches!(err, DeployError::UnknownArtifact(name) if name == "token"));
    }

    #[test]
    fn test_undeclared_artifacts_are_hidden() {
        let store = store();
        let deps = ResolvedDependencies::resolve(&["library"], &store).unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps.address("library").unwrap(), Address::with_last_byte(1));
        assert!(deps.get("registry").is_err());
    }

    #[test]
    fn test_linked_libraries() {
        let store = store();
        let params = params();
        let context = context();
        let inputs = StepInputs {
            step: "token",
            dependencies: ResolvedDependencies::resolve(&["library"], &store).unwrap(),
            params: &params,
            context: &context,
        };

        let links = [LibraryLink {
            library: "BondingCurveLib",
            artifact: "library",
        }];
        let libraries = inputs.linked_libraries(&links).unwrap();
        assert_eq!(libraries.get("BondingCurveLib"), Some(&Address::with_last_byte(1)));

        let bad_links = [LibraryLink {
            library: "BondingCurveLib",
            artifact: "registry",
        }];
        assert!(inputs.linked_libraries(&bad_links).is_err());
    }

    #[test]
    fn test_action_accessors() {
        fn no_args(_: &StepInputs<'_>) -> Result<Bytes, DeployError> {
            Ok(Bytes::new())
        }

        let deploy = StepAction::Deploy {
            contract: "UsernameRegistry",
            libraries: &[],
            constructor_args: no_args,
        };
        assert!(deploy.produces_artifact());
        assert_eq!(deploy.kind(), "deploy");
        assert_eq!(deploy.contract(), Some("UsernameRegistry"));
        assert!(format!("{deploy:?}").contains("UsernameRegistry"));
    }
}
