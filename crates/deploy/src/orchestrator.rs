//! Runs a validated [`DeploymentPlan`] against a [`ChainClient`].

use serde_json::Value;

use crate::{
    Artifact, ArtifactStore, DeployError, DeploymentContext, DeploymentParameters, DeploymentPlan,
    RunFailure,
    artifacts::{
        CONTRACT_KEY, IMPLEMENTATION_KEY, IMPLEMENTATION_TX_HASH_KEY, INITIALIZER_KEY,
        LIBRARIES_KEY, TX_HASH_KEY,
    },
    chain::{ChainClient, LinkedLibraries},
    steps::{ResolvedDependencies, StepAction, StepDescriptor, StepInputs},
};

/// Drives one deployment run.
///
/// Steps run strictly in plan order, each awaited to completion. The first
/// failure stops the run; nothing already deployed is undone.
pub struct Orchestrator<C> {
    client: C,
    context: DeploymentContext,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(client: C, context: DeploymentContext) -> Self {
        Self { client, context }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// Execute every step of `plan` with the given parameters.
    ///
    /// Returns the populated store, or the failing step with the partial store.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        params: &DeploymentParameters,
    ) -> Result<ArtifactStore, RunFailure> {
        tracing::info!(
            steps = plan.len(),
            sender = %self.client.sender(),
            fingerprint = %params.fingerprint(),
            "Starting deployment run..."
        );

        let mut store = ArtifactStore::new();

        for step in plan.steps() {
            tracing::debug!(step = step.name, action = step.action.kind(), "Running step");

            let produced = match self.execute(step, &store, params).await {
                Ok(produced) => produced,
                Err(error) => {
                    tracing::error!(step = step.name, error = %error, "Deployment step failed");
                    return Err(RunFailure {
                        step: step.name,
                        error,
                        artifacts: store,
                    });
                }
            };

            if let Some(artifact) = produced {
                tracing::info!(
                    step = step.name,
                    address = %artifact.address,
                    "{} deployed to: {}",
                    artifact.contract().unwrap_or(step.name),
                    artifact.address
                );

                if let Err(error) = store.put(artifact) {
                    return Err(RunFailure {
                        step: step.name,
                        error,
                        artifacts: store,
                    });
                }
            }
        }

        tracing::info!(artifacts = store.len(), "✓ Deployment complete!");

        Ok(store)
    }

    /// Run a single step and build the artifact it produces, if any.
    async fn execute(
        &self,
        step: &StepDescriptor,
        store: &ArtifactStore,
        params: &DeploymentParameters,
    ) -> Result<Option<Artifact>, DeployError> {
        let inputs = StepInputs {
            step: step.name,
            dependencies: ResolvedDependencies::resolve(step.depends_on, store)?,
            params,
            context: &self.context,
        };

        match step.action {
            StepAction::Deploy {
                contract,
                libraries,
                constructor_args,
            } => {
                let libraries = inputs.linked_libraries(libraries)?;
                let args = constructor_args(&inputs)?;

                let deployment = self
                    .client
                    .deploy(contract, args, &libraries)
                    .await
                    .map_err(|cause| DeployError::step_failed(step.name, cause))?;

                let artifact = Artifact::new(step.name, deployment.address)
                    .with_metadata(CONTRACT_KEY, contract)
                    .with_metadata(TX_HASH_KEY, deployment.tx_hash.to_string());

                Ok(Some(with_libraries(artifact, &libraries)))
            }
            StepAction::DeployProxy {
                contract,
                libraries,
                initializer,
            } => {
                let libraries = inputs.linked_libraries(libraries)?;
                let init = initializer(&inputs)?;
                let signature = init.signature;

                let deployment = self
                    .client
                    .deploy_proxy(contract, init, &libraries)
                    .await
                    .map_err(|cause| DeployError::step_failed(step.name, cause))?;

                let artifact = Artifact::new(step.name, deployment.proxy)
                    .with_metadata(CONTRACT_KEY, contract)
                    .with_metadata(TX_HASH_KEY, deployment.tx_hash.to_string())
                    .with_metadata(IMPLEMENTATION_KEY, deployment.implementation.to_string())
                    .with_metadata(
                        IMPLEMENTATION_TX_HASH_KEY,
                        deployment.implementation_tx_hash.to_string(),
                    )
                    .with_metadata(INITIALIZER_KEY, signature);

                Ok(Some(with_libraries(artifact, &libraries)))
            }
            StepAction::Call { target, call } => {
                let target = inputs.dependencies.address(target)?;
                let call = call(&inputs)?;
                let signature = call.signature;

                let tx_hash = self
                    .client
                    .call(target, call)
                    .await
                    .map_err(|cause| DeployError::step_failed(step.name, cause))?;

                tracing::info!(step = step.name, %target, %tx_hash, "{} executed", signature);

                Ok(None)
            }
        }
    }
}

fn with_libraries(artifact: Artifact, libraries: &LinkedLibraries) -> Artifact {
    if libraries.is_empty() {
        return artifact;
    }

    let linked = libraries
        .iter()
        .map(|(name, address)| (name.clone(), Value::String(address.to_string())))
        .collect::<serde_json::Map<_, _>>();

    artifact.with_metadata(LIBRARIES_KEY, linked)
}
