//! Deployment record and operator-facing tables.

use std::path::Path;

use alloy_core::primitives::{Address, utils::format_ether};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Table, presets::UTF8_FULL};
use serde::{Deserialize, Serialize};

use crate::{
    Artifact, ArtifactStore, DeploymentParameters, DeploymentPlan, RunFailure,
    artifacts::IMPLEMENTATION_KEY,
    steps::StepAction,
};

/// Outcome of a deployment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RunStatus {
    Complete,
    Failed,
}

/// What a run deployed, written next to the project after every run.
///
/// A failed run is recorded too so the operator can resume by hand from the
/// addresses already on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub chain_id: u64,
    pub deployer: Address,
    pub status: RunStatus,
    /// Step that was running when a failed run stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub parameters: DeploymentParameters,
    /// See [`DeploymentParameters::fingerprint`].
    pub fingerprint: String,
    pub recorded_at: DateTime<Utc>,
    /// Artifacts in deployment order.
    pub artifacts: Vec<Artifact>,
    /// Version of the tool that wrote the record.
    pub tool_version: String,
}

impl DeploymentRecord {
    fn new(
        chain_id: u64,
        deployer: Address,
        parameters: &DeploymentParameters,
        status: RunStatus,
        artifacts: &ArtifactStore,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            chain_id,
            deployer,
            status,
            failed_step: None,
            error: None,
            parameters: *parameters,
            fingerprint: parameters.fingerprint(),
            recorded_at,
            artifacts: artifacts.iter().cloned().collect(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn complete(
        chain_id: u64,
        deployer: Address,
        parameters: &DeploymentParameters,
        artifacts: &ArtifactStore,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            chain_id,
            deployer,
            parameters,
            RunStatus::Complete,
            artifacts,
            recorded_at,
        )
    }

    pub fn failed(
        chain_id: u64,
        deployer: Address,
        parameters: &DeploymentParameters,
        failure: &RunFailure,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            failed_step: Some(failure.step.to_string()),
            error: Some(failure.error.to_string()),
            ..Self::new(
                chain_id,
                deployer,
                parameters,
                RunStatus::Failed,
                &failure.artifacts,
                recorded_at,
            )
        }
    }

    /// Address of the artifact named `name`, if the run deployed it.
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.artifacts
            .iter()
            .find(|artifact| artifact.name == name)
            .map(|artifact| artifact.address)
    }

    /// Save the record as formatted JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create deployments directory {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        std::fs::write(path, json).context(format!(
            "Failed to write deployment record to {}",
            path.display()
        ))?;

        tracing::info!(path = %path.display(), status = %self.status, "Deployment record saved");

        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path).context(format!(
            "Failed to read deployment record from {}",
            path.display()
        ))?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }
}

/// Component name → address, in deployment order.
pub fn artifact_table<'a>(artifacts: impl IntoIterator<Item = &'a Artifact>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Component", "Contract", "Address", "Implementation"]);

    for artifact in artifacts {
        let implementation = artifact
            .metadata
            .get(IMPLEMENTATION_KEY)
            .and_then(|value| value.as_str())
            .unwrap_or("-");

        table.add_row(vec![
            artifact.name.clone(),
            artifact.contract().unwrap_or("-").to_string(),
            artifact.address.to_string(),
            implementation.to_string(),
        ]);
    }

    table
}

/// The steps of `plan` with what each one does.
pub fn plan_table(plan: &DeploymentPlan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Action", "Contract / Target", "Depends on"]);

    for (index, step) in plan.steps().iter().enumerate() {
        let subject = match step.action.contract() {
            Some(contract) => contract.to_string(),
            None => match step.action {
                StepAction::Call { target, .. } => format!("→ {target}"),
                _ => "-".to_string(),
            },
        };
        let depends_on = if step.depends_on.is_empty() {
            "-".to_string()
        } else {
            step.depends_on.join(", ")
        };

        table.add_row(vec![
            (index + 1).to_string(),
            step.name.to_string(),
            step.action.kind().to_string(),
            subject,
            depends_on,
        ]);
    }

    table
}

/// Resolved parameters in both human and on-chain units.
pub fn parameters_table(params: &DeploymentParameters) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Parameter", "Value", "Raw"]);

    let amounts = [
        ("totalPresaleTokens", params.total_supply_cap),
        ("maxClaimPerWallet", params.max_claim_per_wallet),
        ("basePrice", params.base_price),
        ("growthRate", params.growth_rate),
    ];
    for (name, amount) in amounts {
        table.add_row(vec![name.to_string(), format_ether(amount), amount.to_string()]);
    }

    for (name, timestamp) in [("startTime", params.start_time), ("endTime", params.end_time)] {
        table.add_row(vec![
            name.to_string(),
            format_timestamp(timestamp),
            timestamp.to_string(),
        ]);
    }

    table.add_row(vec![
        "fingerprint".to_string(),
        params.fingerprint(),
        String::new(),
    ]);

    table
}

fn format_timestamp(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|datetime| datetime.to_rfc3339())
        .unwrap_or_else(|| "out of range".to_string())
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;
    use tempdir::TempDir;

    use super::*;
    use crate::{DeployError, artifacts::CONTRACT_KEY};

    fn params() -> DeploymentParameters {
        DeploymentParameters {
            total_supply_cap: U256::from(100_000_000u128 * 10u128.pow(18)),
            max_claim_per_wallet: U256::from(10_000_000u128 * 10u128.pow(18)),
            start_time: 1737050400,
            end_time: 1737050400 + 604800,
            base_price: U256::from(100_000_000_000_000u128),
            growth_rate: U256::from(10_000_000_000_000u128),
        }
    }

    fn store() -> ArtifactStore {
        let mut store = ArtifactStore::new();
        store
            .put(
                Artifact::new("library", Address::with_last_byte(1))
                    .with_metadata(CONTRACT_KEY, "BondingCurveLib"),
            )
            .unwrap();
        store
            .put(
                Artifact::new("token", Address::with_last_byte(2))
                    .with_metadata(CONTRACT_KEY, "MySocialToken")
                    .with_metadata(IMPLEMENTATION_KEY, Address::with_last_byte(9).to_string()),
            )
            .unwrap();
        store
    }

    fn recorded_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1737000000, 0).unwrap()
    }

    #[test]
    fn test_record_save_and_load() {
        let dir = TempDir::new("report").unwrap();
        let path = dir.path().join("deployments").join("mysocial.json");

        let record = DeploymentRecord::complete(
            84531,
            Address::with_last_byte(0xaa),
            &params(),
            &store(),
            recorded_at(),
        );
        record.save_to_file(&path).unwrap();

        let loaded = DeploymentRecord::load_from_file(&path).unwrap();
        assert_eq!(loaded, record);
        assert_eq!(loaded.status, RunStatus::Complete);
        assert_eq!(loaded.address_of("token"), Some(Address::with_last_byte(2)));
        assert_eq!(loaded.fingerprint, params().fingerprint());
    }

    #[test]
    fn test_failed_record_names_step() {
        let failure = RunFailure {
            step: "presale",
            error: DeployError::step_failed("presale", anyhow::anyhow!("execution reverted")),
            artifacts: store(),
        };

        let record = DeploymentRecord::failed(
            84531,
            Address::with_last_byte(0xaa),
            &params(),
            &failure,
            recorded_at(),
        );

        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.failed_step.as_deref(), Some("presale"));
        assert!(record.error.as_deref().unwrap().contains("execution reverted"));
        assert_eq!(record.artifacts.len(), 2);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
    }

    #[test]
    fn test_load_missing_record() {
        let dir = TempDir::new("report").unwrap();
        assert!(DeploymentRecord::load_from_file(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_tables_render() {
        let artifacts = artifact_table(&store()).to_string();
        assert!(artifacts.contains("BondingCurveLib"));
        assert!(artifacts.contains(&Address::with_last_byte(9).to_string()));

        let plan = plan_table(&DeploymentPlan::standard().unwrap()).to_string();
        assert!(plan.contains("deploy-proxy"));
        assert!(plan.contains("→ token"));

        let parameters = parameters_table(&params()).to_string();
        assert!(parameters.contains("0.0001"));
        assert!(parameters.contains("2025-01-16T18:00:00+00:00"));
    }
}
