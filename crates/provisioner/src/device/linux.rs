//! Linux facts from the DMI virtual filesystem and `/etc/os-release`.

use super::DeviceFacts;
use crate::config::LinuxDmiPaths;
use hirs_common::Platform;
use hirs_evidence_schema::{or_not_specified, FirmwareInfo, HardwareInfo, OsInfo};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files read for OS facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsReleasePaths {
    pub os_release: PathBuf,
    pub kernel_release: PathBuf,
}

impl Default for OsReleasePaths {
    fn default() -> Self {
        Self {
            os_release: PathBuf::from("/etc/os-release"),
            kernel_release: PathBuf::from("/proc/sys/kernel/osrelease"),
        }
    }
}

pub struct LinuxFacts {
    dmi: LinuxDmiPaths,
    release: OsReleasePaths,
}

impl LinuxFacts {
    pub fn new(dmi: LinuxDmiPaths, release: OsReleasePaths) -> Self {
        Self { dmi, release }
    }
}

impl DeviceFacts for LinuxFacts {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn firmware(&self) -> FirmwareInfo {
        FirmwareInfo {
            vendor: file_to_string(&self.dmi.bios_vendor),
            version: file_to_string(&self.dmi.bios_version),
            release_date: file_to_string(&self.dmi.bios_date),
        }
    }

    fn hardware(&self) -> HardwareInfo {
        HardwareInfo {
            manufacturer: file_to_string(&self.dmi.sys_vendor),
            product_name: file_to_string(&self.dmi.product_name),
            product_version: file_to_string(&self.dmi.product_version),
            serial_number: file_to_string(&self.dmi.product_serial),
        }
    }

    fn os(&self) -> OsInfo {
        let release = fs::read_to_string(&self.release.os_release)
            .map_err(|e| debug!("{}: {}", self.release.os_release.display(), e))
            .unwrap_or_default();

        OsInfo {
            name: Platform::Linux.os_name().to_string(),
            version: file_to_string(&self.release.kernel_release),
            architecture: std::env::consts::ARCH.to_string(),
            distribution: or_not_specified(os_release_value(&release, "NAME").as_deref()),
            distribution_release: or_not_specified(
                os_release_value(&release, "VERSION_ID").as_deref(),
            ),
        }
    }
}

/// Trimmed file content, or "Not Specified" when unreadable or blank.
fn file_to_string(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => or_not_specified(Some(&content)),
        Err(e) => {
            debug!("{}: {}", path.display(), e);
            or_not_specified(None)
        }
    }
}

/// Value of `key` in os-release `KEY=value` content, quotes removed.
fn os_release_value(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
}
