//! HIRS provisioner evidence collection.
//!
//! Resolves provisioner settings, runs hardware manifest collectors, scans EFI
//! storage for platform certificates and RIMs, and gathers device identity
//! facts into an [`hirs_evidence_schema::EvidenceSnapshot`].

pub mod config;
pub mod device;
pub mod efi;
pub mod executor;
pub mod orchestrator;
pub mod plugins;

pub use config::{AcaAddress, RawSettings, Settings};
pub use orchestrator::Orchestrator;
