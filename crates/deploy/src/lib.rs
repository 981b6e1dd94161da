//! mysocial-deploy - Deployment library for the MySocial contracts.
//!
//! This crate deploys the bonding curve library, the upgradeable token, the
//! username registry and the presale in dependency order, then wires the
//! presale into the token.
//!
//! ```text
//! DeployConfig ──▶ ParameterResolver ──▶ DeploymentParameters
//!                                              │
//! DeploymentPlan::standard() ──▶ Orchestrator::run ──▶ ArtifactStore
//!                                      │
//!                                 ChainClient (RpcChainClient)
//! ```

mod artifacts;
pub use artifacts::{
    Artifact, ArtifactStore, CONTRACT_KEY, IMPLEMENTATION_KEY, IMPLEMENTATION_TX_HASH_KEY,
    INITIALIZER_KEY, LIBRARIES_KEY, TX_HASH_KEY,
};

mod error;
pub use error::{DeployError, RunFailure};

mod params;
pub use params::{
    DeploymentParameters, FIXED_POINT_DECIMALS, ParameterResolver, RawParameters, StartTime,
    to_fixed_point,
};

mod context;
pub use context::DeploymentContext;

pub mod steps;
pub use steps::{StepAction, StepDescriptor, StepInputs};

pub mod plan;
pub use plan::DeploymentPlan;

mod orchestrator;
pub use orchestrator::Orchestrator;

pub mod chain;
pub use chain::{ChainClient, ContractRepository, RpcChainClient};

pub mod config;
pub use config::DeployConfig;

pub mod report;
pub use report::{DeploymentRecord, RunStatus};

pub mod solidity;
