//! The validated, ordered table of deployment steps.

use std::collections::HashSet;

use alloy_core::primitives::{Bytes, U256};
use alloy_sol_types::SolValue;

use crate::{
    DeployError,
    chain::EncodedCall,
    solidity::{initializeCall, setPresaleContractCall},
    steps::{LibraryLink, StepAction, StepDescriptor, StepInputs},
};

pub const LIBRARY_STEP: &str = "library";
pub const TOKEN_STEP: &str = "token";
pub const REGISTRY_STEP: &str = "registry";
pub const PRESALE_STEP: &str = "presale";
pub const WIRING_STEP: &str = "wiring";

pub const BONDING_CURVE_LIB: &str = "BondingCurveLib";
pub const TOKEN_CONTRACT: &str = "MySocialToken";
pub const REGISTRY_CONTRACT: &str = "UsernameRegistry";
pub const PRESALE_CONTRACT: &str = "MySocialTokenPresale";

const TOKEN_LIBRARIES: &[LibraryLink] = &[LibraryLink {
    library: BONDING_CURVE_LIB,
    artifact: LIBRARY_STEP,
}];

const STANDARD_STEPS: &[StepDescriptor] = &[
    StepDescriptor {
        name: LIBRARY_STEP,
        depends_on: &[],
        action: StepAction::Deploy {
            contract: BONDING_CURVE_LIB,
            libraries: &[],
            constructor_args: no_constructor_args,
        },
    },
    StepDescriptor {
        name: TOKEN_STEP,
        depends_on: &[LIBRARY_STEP],
        action: StepAction::DeployProxy {
            contract: TOKEN_CONTRACT,
            libraries: TOKEN_LIBRARIES,
            initializer: token_initializer,
        },
    },
    StepDescriptor {
        name: REGISTRY_STEP,
        depends_on: &[],
        action: StepAction::Deploy {
            contract: REGISTRY_CONTRACT,
            libraries: &[],
            constructor_args: no_constructor_args,
        },
    },
    StepDescriptor {
        name: PRESALE_STEP,
        depends_on: &[TOKEN_STEP],
        action: StepAction::Deploy {
            contract: PRESALE_CONTRACT,
            libraries: &[],
            constructor_args: presale_constructor_args,
        },
    },
    StepDescriptor {
        name: WIRING_STEP,
        depends_on: &[TOKEN_STEP, PRESALE_STEP],
        action: StepAction::Call {
            target: TOKEN_STEP,
            call: wire_presale,
        },
    },
];

fn no_constructor_args(_: &StepInputs<'_>) -> Result<Bytes, DeployError> {
    Ok(Bytes::new())
}

/// `initialize(name, symbol, owner)` run through the token proxy.
fn token_initializer(inputs: &StepInputs<'_>) -> Result<EncodedCall, DeployError> {
    Ok(EncodedCall::new(&initializeCall {
        name: inputs.context.token_name.clone(),
        symbol: inputs.context.token_symbol.clone(),
        owner: inputs.context.owner,
    }))
}

/// Constructor arguments of the presale contract, in declaration order:
/// `(token, stableAsset, totalPresaleTokens, maxClaimPerWallet, startTime,
/// endTime, basePrice, growthRate)`.
fn presale_constructor_args(inputs: &StepInputs<'_>) -> Result<Bytes, DeployError> {
    let token = inputs.dependencies.address(TOKEN_STEP)?;
    let params = inputs.params;

    let encoded = (
        token,
        inputs.context.stable_asset,
        params.total_supply_cap,
        params.max_claim_per_wallet,
        U256::from(params.start_time),
        U256::from(params.end_time),
        params.base_price,
        params.growth_rate,
    )
        .abi_encode_params();

    Ok(encoded.into())
}

/// `token.setPresaleContract(presale)`.
fn wire_presale(inputs: &StepInputs<'_>) -> Result<EncodedCall, DeployError> {
    Ok(EncodedCall::new(&setPresaleContractCall {
        presale: inputs.dependencies.address(PRESALE_STEP)?,
    }))
}

/// An ordered list of steps whose dependencies have been checked.
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    steps: Vec<StepDescriptor>,
}

impl DeploymentPlan {
    /// Validate `steps` and build a plan from them.
    ///
    /// Every dependency must be produced by a strictly earlier artifact-producing
    /// step, and library links and call targets must be declared dependencies.
    pub fn new(steps: impl IntoIterator<Item = StepDescriptor>) -> Result<Self, DeployError> {
        let steps: Vec<_> = steps.into_iter().collect();

        let mut seen = HashSet::new();
        let mut produced = HashSet::new();

        for step in &steps {
            if !seen.insert(step.name) {
                return Err(DeployError::DuplicatePlanStep(step.name));
            }

            for &dependency in step.depends_on {
                if !produced.contains(&dependency) {
                    return Err(DeployError::CyclicOrUnorderedDependency {
                        step: step.name,
                        dependency,
                    });
                }
            }

            let undeclared = step
                .action
                .libraries()
                .iter()
                .map(|link| link.artifact)
                .chain(match step.action {
                    StepAction::Call { target, .. } => Some(target),
                    _ => None,
                })
                .find(|name| !step.depends_on.contains(name));
            if let Some(dependency) = undeclared {
                return Err(DeployError::CyclicOrUnorderedDependency {
                    step: step.name,
                    dependency,
                });
            }

            if step.action.produces_artifact() {
                produced.insert(step.name);
            }
        }

        Ok(Self { steps })
    }

    /// The MySocial plan: library, token, registry, presale, then wiring.
    pub fn standard() -> Result<Self, DeployError> {
        Self::new(STANDARD_STEPS.iter().copied())
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Position of the step named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }
}
