//! One provisioning attempt's evidence collection.
//!
//! Order is fixed: settings, hardware manifest collectors, EFI artifacts, then
//! device facts. Only configuration problems abort an attempt; every other
//! source that fails is reported as not collected.

use crate::config::{RawSettings, Settings};
use crate::device::DeviceIdentityCollector;
use crate::efi::EfiScanner;
use crate::plugins::{HardwareManifestCollectors, PluginCatalog};
use hirs_common::Result;
use hirs_evidence_schema::{ArtifactCategory, Collected, EvidenceSnapshot};
use std::path::Path;
use tracing::{debug, info, info_span, warn};

pub struct Orchestrator {
    settings: Settings,
    collectors: HardwareManifestCollectors,
    efi: EfiScanner,
    device: DeviceIdentityCollector,
}

impl Orchestrator {
    /// Load settings from `config_path` (plus `HIRS_*` environment
    /// overrides) and prepare every collection component.
    pub fn bootstrap(config_path: &Path) -> Result<Self> {
        Self::bootstrap_with_catalog(config_path, &PluginCatalog::with_builtins())
    }

    pub fn bootstrap_with_catalog(config_path: &Path, catalog: &PluginCatalog) -> Result<Self> {
        let raw = RawSettings::load(config_path)?.with_env_overrides();
        let (settings, collectors) = Settings::complete_setup(&raw, catalog)?;
        let efi = EfiScanner::from_settings(&settings);
        let device = DeviceIdentityCollector::new(&settings);
        Ok(Self::from_parts(settings, collectors, efi, device))
    }

    pub fn from_parts(
        settings: Settings,
        collectors: HardwareManifestCollectors,
        efi: EfiScanner,
        device: DeviceIdentityCollector,
    ) -> Self {
        Self {
            settings,
            collectors,
            efi,
            device,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Gather all evidence for one attempt.
    pub fn collect(&mut self) -> EvidenceSnapshot {
        let mut snapshot = EvidenceSnapshot::default();
        let attempt = info_span!("provision", attempt_id = %snapshot.attempt_id);
        let _attempt = attempt.enter();
        info!(
            "Collecting evidence using settings from {}",
            self.settings.source()
        );

        {
            let _span = info_span!("hardware_manifest").entered();
            snapshot.hardware_manifest = self.hardware_manifest();
            snapshot.paccor_output = self
                .settings
                .paccor_output()
                .map(str::to_string)
                .into();
        }

        snapshot.event_log = self.settings.event_log().map(<[u8]>::to_vec).into();

        {
            let _span = info_span!("efi").entered();
            if self.efi.has_root() {
                for category in ArtifactCategory::ALL {
                    snapshot.set_artifacts(category, self.efi.scan(category));
                }
            } else {
                debug!("No EFI prefix configured; skipping EFI artifact scan.");
            }
        }

        {
            let _span = info_span!("device_identity", platform = %self.device.platform()).entered();
            snapshot.device = self.device.collect(self.settings.aca_address());
        }

        snapshot.completed_at = Some(chrono::Utc::now());
        log_outcome(&snapshot);
        snapshot
    }

    fn hardware_manifest(&mut self) -> Collected<String> {
        if self.collectors.is_empty() {
            debug!("No hardware manifest collectors loaded.");
            return Collected::NotCollected;
        }
        let json = self.collectors.run_all();
        if json.is_empty() {
            warn!("Hardware manifest collectors produced no data.");
            Collected::NotCollected
        } else {
            Collected::Collected(json)
        }
    }
}

fn log_outcome(snapshot: &EvidenceSnapshot) {
    for category in ArtifactCategory::ALL {
        match snapshot.artifacts(category) {
            Collected::Collected(files) => info!("{}: {} file(s)", category, files.len()),
            Collected::NotCollected => info!("{}: not collected", category),
        }
    }
    info!(
        "hardware manifest: {}, paccor output: {}, event log: {}",
        collected_label(snapshot.hardware_manifest.is_collected()),
        collected_label(snapshot.paccor_output.is_collected()),
        collected_label(snapshot.event_log.is_collected()),
    );
}

fn collected_label(collected: bool) -> &'static str {
    if collected {
        "collected"
    } else {
        "not collected"
    }
}
