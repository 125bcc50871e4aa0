//! Per-attempt evidence snapshot.

use crate::artifact::{ArtifactCategory, Collected, EvidenceArtifact};
use crate::device::DeviceIdentitySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything one provisioning attempt collected, ready for the provisioner
/// that builds the attestation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    /// Unique identifier for this attempt.
    pub attempt_id: String,
    /// When the collection started.
    pub collected_at: DateTime<Utc>,
    /// When the collection completed.
    pub completed_at: Option<DateTime<Utc>>,
    pub platform_certificates: Collected<Vec<EvidenceArtifact>>,
    pub base_rims: Collected<Vec<EvidenceArtifact>>,
    pub support_rim_event_logs: Collected<Vec<EvidenceArtifact>>,
    pub support_rim_pcrs: Collected<Vec<EvidenceArtifact>>,
    /// JSON text produced by the hardware manifest plugins.
    pub hardware_manifest: Collected<String>,
    /// Component JSON read from the paccor output file.
    pub paccor_output: Collected<String>,
    /// Event log bytes read from the configured file.
    #[serde(skip)]
    pub event_log: Collected<Vec<u8>>,
    pub device: DeviceIdentitySnapshot,
}

impl Default for EvidenceSnapshot {
    fn default() -> Self {
        Self {
            attempt_id: uuid::Uuid::new_v4().to_string(),
            collected_at: Utc::now(),
            completed_at: None,
            platform_certificates: Collected::NotCollected,
            base_rims: Collected::NotCollected,
            support_rim_event_logs: Collected::NotCollected,
            support_rim_pcrs: Collected::NotCollected,
            hardware_manifest: Collected::NotCollected,
            paccor_output: Collected::NotCollected,
            event_log: Collected::NotCollected,
            device: DeviceIdentitySnapshot::default(),
        }
    }
}

impl EvidenceSnapshot {
    /// Artifacts for one category.
    pub fn artifacts(&self, category: ArtifactCategory) -> &Collected<Vec<EvidenceArtifact>> {
        match category {
            ArtifactCategory::PlatformCert => &self.platform_certificates,
            ArtifactCategory::BaseRim => &self.base_rims,
            ArtifactCategory::SupportRimEventLog => &self.support_rim_event_logs,
            ArtifactCategory::SupportRimPcr => &self.support_rim_pcrs,
        }
    }

    /// Store the artifacts of one category.
    pub fn set_artifacts(
        &mut self,
        category: ArtifactCategory,
        artifacts: Collected<Vec<EvidenceArtifact>>,
    ) {
        let slot = match category {
            ArtifactCategory::PlatformCert => &mut self.platform_certificates,
            ArtifactCategory::BaseRim => &mut self.base_rims,
            ArtifactCategory::SupportRimEventLog => &mut self.support_rim_event_logs,
            ArtifactCategory::SupportRimPcr => &mut self.support_rim_pcrs,
        };
        *slot = artifacts;
    }

    /// Operator-facing summary without any raw evidence bytes.
    pub fn summary(&self) -> SnapshotSummary {
        let categories = ArtifactCategory::ALL
            .iter()
            .map(|&category| {
                let artifacts = self.artifacts(category);
                CategorySummary {
                    category,
                    collected: artifacts.is_collected(),
                    files: artifacts
                        .as_ref()
                        .into_option()
                        .map(|list| {
                            list.iter()
                                .map(|a| (a.source_path.display().to_string(), a.content_hash.clone()))
                                .collect()
                        })
                        .unwrap_or_default(),
                }
            })
            .collect();

        SnapshotSummary {
            attempt_id: self.attempt_id.clone(),
            collected_at: self.collected_at,
            completed_at: self.completed_at,
            categories,
            hardware_manifest_sha256: self
                .hardware_manifest
                .as_ref()
                .into_option()
                .map(|json| hirs_common::hash::sha256_str(json)),
            paccor_output_sha256: self
                .paccor_output
                .as_ref()
                .into_option()
                .map(|json| hirs_common::hash::sha256_str(json)),
            event_log_size_bytes: self
                .event_log
                .as_ref()
                .into_option()
                .map(|bytes| bytes.len() as u64),
            device: self.device.clone(),
        }
    }
}

/// Per-category part of a [`SnapshotSummary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: ArtifactCategory,
    pub collected: bool,
    /// (source path, sha256) of each file.
    pub files: Vec<(String, String)>,
}

/// Serializable summary of an attempt for logs and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub attempt_id: String,
    pub collected_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub categories: Vec<CategorySummary>,
    pub hardware_manifest_sha256: Option<String>,
    pub paccor_output_sha256: Option<String>,
    pub event_log_size_bytes: Option<u64>,
    pub device: DeviceIdentitySnapshot,
}
