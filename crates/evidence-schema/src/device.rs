//! Device identity facts.

use serde::{Deserialize, Serialize};

/// Value reported for a fact that could not be determined.
pub const NOT_SPECIFIED: &str = "Not Specified";

/// Normalise a raw fact: trim it and fall back to [`NOT_SPECIFIED`] when blank.
pub fn or_not_specified(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => NOT_SPECIFIED.to_string(),
    }
}

/// Firmware (BIOS/UEFI) facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareInfo {
    pub vendor: String,
    pub version: String,
    pub release_date: String,
}

impl Default for FirmwareInfo {
    fn default() -> Self {
        Self {
            vendor: NOT_SPECIFIED.to_string(),
            version: NOT_SPECIFIED.to_string(),
            release_date: NOT_SPECIFIED.to_string(),
        }
    }
}

/// System product facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareInfo {
    pub manufacturer: String,
    pub product_name: String,
    pub product_version: String,
    pub serial_number: String,
}

impl Default for HardwareInfo {
    fn default() -> Self {
        Self {
            manufacturer: NOT_SPECIFIED.to_string(),
            product_name: NOT_SPECIFIED.to_string(),
            product_version: NOT_SPECIFIED.to_string(),
            serial_number: NOT_SPECIFIED.to_string(),
        }
    }
}

/// Network identity of the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub mac_address: String,
    /// Absent when no usable address was found.
    pub ip_address: Option<String>,
    pub hostname: String,
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self {
            mac_address: NOT_SPECIFIED.to_string(),
            ip_address: None,
            hostname: NOT_SPECIFIED.to_string(),
        }
    }
}

/// Operating system facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsInfo {
    pub name: String,
    pub version: String,
    pub architecture: String,
    pub distribution: String,
    pub distribution_release: String,
}

impl Default for OsInfo {
    fn default() -> Self {
        Self {
            name: NOT_SPECIFIED.to_string(),
            version: NOT_SPECIFIED.to_string(),
            architecture: NOT_SPECIFIED.to_string(),
            distribution: NOT_SPECIFIED.to_string(),
            distribution_release: NOT_SPECIFIED.to_string(),
        }
    }
}

/// Everything the provisioner reports about the device it runs on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentitySnapshot {
    pub firmware: FirmwareInfo,
    pub hardware: HardwareInfo,
    pub network: NetworkInfo,
    pub os: OsInfo,
}
