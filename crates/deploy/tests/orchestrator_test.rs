//! Orchestrator runs against a recording in-memory chain.

use std::sync::Mutex;

use alloy_core::primitives::{Address, Bytes, TxHash, U256};
use alloy_sol_types::{SolCall, SolValue};
use anyhow::Result;
use mysocial_deploy::{
    DeployError, DeploymentContext, DeploymentParameters, DeploymentPlan, IMPLEMENTATION_KEY,
    IMPLEMENTATION_TX_HASH_KEY, INITIALIZER_KEY, LIBRARIES_KEY, Orchestrator, ParameterResolver,
    RawParameters, StartTime, TX_HASH_KEY,
    chain::{ChainClient, Deployment, EncodedCall, LinkedLibraries, ProxyDeployment},
    solidity::{initializeCall, setPresaleContractCall},
};

const PRESALE_START: u64 = 1737050400;
const SEVEN_DAYS: u64 = 604800;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Invocation {
    Deploy {
        contract: String,
        args: Bytes,
        libraries: LinkedLibraries,
    },
    DeployProxy {
        contract: String,
        init: EncodedCall,
        libraries: LinkedLibraries,
    },
    Call {
        target: Address,
        call: EncodedCall,
    },
}

/// Hands out sequential addresses and records every invocation.
#[derive(Default)]
struct MockChain {
    invocations: Mutex<Vec<Invocation>>,
    fail_contract: Option<&'static str>,
    fail_calls: bool,
}

impl MockChain {
    fn failing_deploy(contract: &'static str) -> Self {
        Self {
            fail_contract: Some(contract),
            ..Default::default()
        }
    }

    fn failing_calls() -> Self {
        Self {
            fail_calls: true,
            ..Default::default()
        }
    }

    fn record(&self, invocation: Invocation) -> u8 {
        let mut invocations = self.invocations.lock().unwrap();
        invocations.push(invocation);
        invocations.len() as u8
    }

    fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    fn check(&self, contract: &str) -> Result<()> {
        if self.fail_contract == Some(contract) {
            anyhow::bail!("execution reverted while deploying {contract}");
        }
        Ok(())
    }
}

impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        owner()
    }

    async fn deploy(
        &self,
        contract: &str,
        constructor_args: Bytes,
        libraries: &LinkedLibraries,
    ) -> Result<Deployment> {
        let index = self.record(Invocation::Deploy {
            contract: contract.to_string(),
            args: constructor_args,
            libraries: libraries.clone(),
        });
        self.check(contract)?;

        Ok(Deployment {
            address: Address::with_last_byte(index),
            tx_hash: TxHash::with_last_byte(index),
        })
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        init: EncodedCall,
        libraries: &LinkedLibraries,
    ) -> Result<ProxyDeployment> {
        let index = self.record(Invocation::DeployProxy {
            contract: contract.to_string(),
            init,
            libraries: libraries.clone(),
        });
        self.check(contract)?;

        Ok(ProxyDeployment {
            proxy: Address::with_last_byte(index),
            implementation: Address::with_last_byte(0x80 + index),
            tx_hash: TxHash::with_last_byte(index),
            implementation_tx_hash: TxHash::with_last_byte(0x80 + index),
        })
    }

    async fn call(&self, target: Address, call: EncodedCall) -> Result<TxHash> {
        let index = self.record(Invocation::Call { target, call });
        if self.fail_calls {
            anyhow::bail!("setPresaleContract reverted");
        }
        Ok(TxHash::with_last_byte(index))
    }
}

fn owner() -> Address {
    Address::repeat_byte(0xaa)
}

fn stable_asset() -> Address {
    Address::repeat_byte(0x5a)
}

fn context() -> DeploymentContext {
    DeploymentContext {
        owner: owner(),
        stable_asset: stable_asset(),
        token_name: "MySocial".to_string(),
        token_symbol: "MYSO".to_string(),
    }
}

fn params() -> DeploymentParameters {
    let raw = RawParameters {
        total_presale_tokens: "100000000".to_string(),
        max_claim_per_wallet: "10000000".to_string(),
        base_price: "0.0001".to_string(),
        growth_rate: "0.00001".to_string(),
        start: StartTime::At(PRESALE_START),
        duration_secs: SEVEN_DAYS,
    };
    ParameterResolver::resolve(&raw, 0).unwrap()
}

fn contract_of(invocation: &Invocation) -> Option<&str> {
    match invocation {
        Invocation::Deploy { contract, .. } | Invocation::DeployProxy { contract, .. } => {
            Some(contract.as_str())
        }
        Invocation::Call { .. } => None,
    }
}

#[tokio::test]
async fn test_full_run_deploys_in_dependency_order() {
    let orchestrator = Orchestrator::new(MockChain::default(), context());
    let plan = DeploymentPlan::standard().unwrap();

    let store = orchestrator.run(&plan, &params()).await.unwrap();

    assert_eq!(store.names(), vec!["library", "token", "registry", "presale"]);

    let invocations = orchestrator.client().invocations();
    let contracts: Vec<_> = invocations.iter().map(contract_of).collect();
    assert_eq!(
        contracts,
        vec![
            Some("BondingCurveLib"),
            Some("MySocialToken"),
            Some("UsernameRegistry"),
            Some("MySocialTokenPresale"),
            None,
        ]
    );

    // The library address is linked into the token.
    let library = store.get("library").unwrap().address;
    let Invocation::DeployProxy { libraries, .. } = &invocations[1] else {
        panic!("token is deployed through a proxy");
    };
    assert_eq!(libraries.get("BondingCurveLib"), Some(&library));

    // The wiring call targets the token with the presale address.
    let token = store.get("token").unwrap().address;
    let presale = store.get("presale").unwrap().address;
    let Invocation::Call { target, call } = &invocations[4] else {
        panic!("wiring is a call");
    };
    assert_eq!(*target, token);
    assert_eq!(call.calldata, Bytes::from(setPresaleContractCall { presale }.abi_encode()));
}

#[tokio::test]
async fn test_presale_receives_exact_parameters() {
    let orchestrator = Orchestrator::new(MockChain::default(), context());
    let plan = DeploymentPlan::standard().unwrap();

    let store = orchestrator.run(&plan, &params()).await.unwrap();
    let token = store.get("token").unwrap().address;

    let invocations = orchestrator.client().invocations();
    let Invocation::Deploy { contract, args, .. } = &invocations[3] else {
        panic!("presale is a plain deployment");
    };
    assert_eq!(contract, "MySocialTokenPresale");

    let wei = U256::from(10u64).pow(U256::from(18));
    let expected = (
        token,
        stable_asset(),
        U256::from(100_000_000u64) * wei,
        U256::from(10_000_000u64) * wei,
        U256::from(PRESALE_START),
        U256::from(PRESALE_START + SEVEN_DAYS),
        U256::from(100_000_000_000_000u64),
        U256::from(10_000_000_000_000u64),
    )
        .abi_encode_params();
    assert_eq!(&args[..], expected.as_slice());
}

#[tokio::test]
async fn test_token_initializer_and_metadata() {
    let orchestrator = Orchestrator::new(MockChain::default(), context());
    let plan = DeploymentPlan::standard().unwrap();

    let store = orchestrator.run(&plan, &params()).await.unwrap();

    let invocations = orchestrator.client().invocations();
    let Invocation::DeployProxy { init, .. } = &invocations[1] else {
        panic!("token is deployed through a proxy");
    };
    let expected = initializeCall {
        name: "MySocial".to_string(),
        symbol: "MYSO".to_string(),
        owner: owner(),
    };
    assert_eq!(init.calldata, Bytes::from(expected.abi_encode()));

    let token = store.get("token").unwrap();
    assert_eq!(token.contract(), Some("MySocialToken"));
    assert_eq!(
        token.metadata[IMPLEMENTATION_KEY],
        Address::with_last_byte(0x82).to_string()
    );
    assert_eq!(token.metadata[INITIALIZER_KEY], "initialize(string,string,address)");

    // Both transactions of a proxy deployment are recorded.
    assert_eq!(token.metadata[TX_HASH_KEY], TxHash::with_last_byte(2).to_string());
    assert_eq!(
        token.metadata[IMPLEMENTATION_TX_HASH_KEY],
        TxHash::with_last_byte(0x82).to_string()
    );
    assert!(token.metadata.contains_key(LIBRARIES_KEY));

    // Registry has no libraries, so none are recorded.
    assert!(!store.get("registry").unwrap().metadata.contains_key(LIBRARIES_KEY));
}

#[tokio::test]
async fn test_library_failure_stops_run() {
    let orchestrator = Orchestrator::new(MockChain::failing_deploy("BondingCurveLib"), context());
    let plan = DeploymentPlan::standard().unwrap();

    let failure = orchestrator.run(&plan, &params()).await.unwrap_err();

    assert_eq!(failure.step, "library");
    assert!(failure.artifacts.is_empty());
    assert!(matches!(&failure.error, DeployError::StepFailed { step, .. } if step == "library"));
    assert_eq!(failure.to_string(), "run stopped at step `library`");
    assert!(failure.error.to_string().contains("execution reverted"));

    // The cause stays reachable through the error chain.
    let source = std::error::Error::source(&failure).expect("failure has a source");
    assert!(source.to_string().contains("execution reverted"));
    let report = format!("{:#}", anyhow::Error::new(failure));
    assert!(report.contains("run stopped at step `library`: step `library` failed"));

    // Nothing after the library was attempted.
    assert_eq!(orchestrator.client().invocations().len(), 1);
}

#[tokio::test]
async fn test_presale_failure_keeps_earlier_artifacts() {
    let orchestrator =
        Orchestrator::new(MockChain::failing_deploy("MySocialTokenPresale"), context());
    let plan = DeploymentPlan::standard().unwrap();

    let failure = orchestrator.run(&plan, &params()).await.unwrap_err();

    assert_eq!(failure.step, "presale");
    assert_eq!(failure.artifacts.names(), vec!["library", "token", "registry"]);
    assert_eq!(orchestrator.client().invocations().len(), 4);
}

#[tokio::test]
async fn test_wiring_failure_reports_four_artifacts() {
    let orchestrator = Orchestrator::new(MockChain::failing_calls(), context());
    let plan = DeploymentPlan::standard().unwrap();

    let failure = orchestrator.run(&plan, &params()).await.unwrap_err();

    assert_eq!(failure.step, "wiring");
    assert_eq!(failure.artifacts.len(), 4);
    match &failure.error {
        DeployError::StepFailed { step, cause } => {
            assert_eq!(step, "wiring");
            assert!(cause.to_string().contains("setPresaleContract reverted"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
