//! Device identity facts for the identity claim.
//!
//! The platform strategy is picked once from the OS family. Network facts are
//! resolved the same way on every platform, through [`NetworkProbe`].

mod linux;
mod network;
mod windows;

pub use linux::{LinuxFacts, OsReleasePaths};
pub use network::{resolve_network, InterfaceInfo, NetworkProbe, SystemNetwork};
pub use windows::WindowsFacts;

use crate::config::{AcaAddress, Settings};
use crate::executor::LocalRunner;
use hirs_common::{Error, Platform};
use hirs_evidence_schema::{DeviceIdentitySnapshot, FirmwareInfo, HardwareInfo, OsInfo};
use tracing::{debug, warn};

/// Platform-specific source of firmware, hardware and OS facts.
pub trait DeviceFacts: Send {
    fn platform(&self) -> Platform;

    fn firmware(&self) -> FirmwareInfo;

    fn hardware(&self) -> HardwareInfo;

    fn os(&self) -> OsInfo;
}

/// Strategy for platforms without a concrete implementation.
///
/// Only the OS family and architecture are known; everything else stays
/// "Not Specified".
#[derive(Debug, Clone, Copy)]
pub struct UnsupportedPlatform {
    platform: Platform,
}

impl UnsupportedPlatform {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

impl DeviceFacts for UnsupportedPlatform {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn firmware(&self) -> FirmwareInfo {
        FirmwareInfo::default()
    }

    fn hardware(&self) -> HardwareInfo {
        HardwareInfo::default()
    }

    fn os(&self) -> OsInfo {
        OsInfo {
            name: self.platform.os_name().to_string(),
            architecture: std::env::consts::ARCH.to_string(),
            ..OsInfo::default()
        }
    }
}

/// Pick the fact source for `platform`.
pub fn select_strategy(platform: Platform, settings: &Settings) -> Box<dyn DeviceFacts> {
    if !platform.is_supported() {
        warn!(
            "{}; device facts will be defaulted.",
            Error::UnsupportedPlatform(platform.to_string())
        );
        return Box::new(UnsupportedPlatform::new(platform));
    }
    if platform.is_windows() {
        Box::new(WindowsFacts::new(Box::new(LocalRunner::new(
            settings.operation_timeout(),
        ))))
    } else {
        Box::new(LinuxFacts::new(
            settings.linux_dmi().clone(),
            OsReleasePaths::default(),
        ))
    }
}

/// Gathers the device identity snapshot.
pub struct DeviceIdentityCollector {
    strategy: Box<dyn DeviceFacts>,
    network: Box<dyn NetworkProbe>,
}

impl DeviceIdentityCollector {
    /// Strategy for the running platform, real network probe.
    pub fn new(settings: &Settings) -> Self {
        Self::with_parts(
            select_strategy(Platform::current(), settings),
            Box::new(SystemNetwork::new()),
        )
    }

    pub fn with_parts(strategy: Box<dyn DeviceFacts>, network: Box<dyn NetworkProbe>) -> Self {
        Self { strategy, network }
    }

    pub fn platform(&self) -> Platform {
        self.strategy.platform()
    }

    /// Collect all facts. Never fails; unknown values are "Not Specified".
    pub fn collect(&self, aca: Option<&AcaAddress>) -> DeviceIdentitySnapshot {
        let firmware = self.strategy.firmware();
        debug!(
            "Firmware: vendor={}, version={}, date={}",
            firmware.vendor, firmware.version, firmware.release_date
        );

        let hardware = self.strategy.hardware();
        debug!(
            "Hardware: manufacturer={}, product={}, version={}, serial={}",
            hardware.manufacturer,
            hardware.product_name,
            hardware.product_version,
            hardware.serial_number
        );

        let network = resolve_network(self.network.as_ref(), aca);
        debug!(
            "Network: hostname={}, ip={}, mac={}",
            network.hostname,
            network.ip_address.as_deref().unwrap_or("none"),
            network.mac_address
        );

        let os = self.strategy.os();
        debug!(
            "OS: {} {} ({}) {} {}",
            os.name, os.version, os.architecture, os.distribution, os.distribution_release
        );

        DeviceIdentitySnapshot {
            firmware,
            hardware,
            network,
            os,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeNetwork, StaticFacts};
    use super::*;
    use crate::config::RawSettings;
    use crate::plugins::PluginCatalog;
    use hirs_evidence_schema::NOT_SPECIFIED;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        let raw = RawSettings::from_json_str("{}").unwrap();
        Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap().0
    }

    #[test]
    fn test_strategy_follows_platform() {
        let settings = settings();
        for platform in [
            Platform::Windows,
            Platform::Linux,
            Platform::MacOs,
            Platform::Other,
        ] {
            assert_eq!(select_strategy(platform, &settings).platform(), platform);
        }
    }

    #[test]
    fn test_strategy_for_unsupported_platforms_reports_defaults() {
        let settings = settings();
        for platform in [Platform::MacOs, Platform::Other] {
            let facts = select_strategy(platform, &settings);
            assert_eq!(facts.firmware(), FirmwareInfo::default());
            assert_eq!(facts.hardware(), HardwareInfo::default());
            assert_eq!(facts.os().name, platform.os_name());
        }
    }

    #[test]
    fn test_unsupported_platform_is_defaulted() {
        let facts = UnsupportedPlatform::new(Platform::MacOs);
        assert_eq!(facts.platform(), Platform::MacOs);
        assert_eq!(facts.firmware(), FirmwareInfo::default());
        assert_eq!(facts.hardware(), HardwareInfo::default());

        let os = facts.os();
        assert_eq!(os.name, "OSX");
        assert_eq!(os.architecture, std::env::consts::ARCH);
        assert_eq!(os.version, NOT_SPECIFIED);
    }

    #[test]
    fn test_collect_combines_strategy_and_network() {
        let network = FakeNetwork {
            hostname: Some("prov-host".to_string()),
            ..FakeNetwork::default()
        };
        let collector =
            DeviceIdentityCollector::with_parts(Box::new(StaticFacts), Box::new(network));

        let snapshot = collector.collect(None);
        assert_eq!(snapshot.hardware.serial_number, "CZC1234");
        assert_eq!(snapshot.os.distribution, "Rocky Linux");
        assert_eq!(snapshot.network.hostname, "prov-host");
        assert_eq!(snapshot.network.ip_address, None);
        assert_eq!(snapshot.network.mac_address, NOT_SPECIFIED);
    }
}
