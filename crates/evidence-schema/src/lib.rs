//! Evidence data model for the HIRS provisioner.
//!
//! This crate defines what a provisioning attempt hands to the downstream
//! provisioner: EFI-resident artifacts, device identity facts and the
//! per-attempt snapshot tying them together.

pub mod artifact;
pub mod device;
pub mod snapshot;

pub use artifact::{ArtifactCategory, Collected, EvidenceArtifact};
pub use device::{
    or_not_specified, DeviceIdentitySnapshot, FirmwareInfo, HardwareInfo, NetworkInfo, OsInfo,
    NOT_SPECIFIED,
};
pub use snapshot::{CategorySummary, EvidenceSnapshot, SnapshotSummary};
