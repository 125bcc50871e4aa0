//! Provisioner settings.
//!
//! Settings are read once from a JSON (or YAML) file, overlaid with `HIRS_*`
//! environment variables, and then resolved by [`Settings::complete_setup`]
//! into an immutable [`Settings`] plus the loaded hardware manifest
//! collectors. Only an unreadable or malformed source is fatal; every other
//! problem is logged and leaves the affected setting unset.

use crate::plugins::{
    self, CollectorSpecs, HardwareManifestCollectors, PluginCatalog, PluginValidator,
    SwidTagValidator,
};
use hirs_common::{Error, Platform, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Settings file used when none is given on the command line.
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Prefix of environment variables overriding file settings.
pub const ENV_PREFIX: &str = "HIRS_";

/// Default deadline for a single plugin call or instrumentation query.
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

const EFI_LINUX_DEFAULT_PREFIX: &str = "/boot/efi";
const LINUX_DMI_DIR: &str = "/sys/class/dmi/id";

/// Keys recognized in the settings source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    PaccorOutputFile,
    AcaAddressPort,
    EfiPrefix,
    AutoDetectTpm,
    EventLogFile,
    HardwareManifestCollectors,
    HardwareManifestCollectionSwidEnforced,
    HardwareManifestSwidtagDir,
    CollectionTimeoutSeconds,
    LinuxBiosVendorFile,
    LinuxBiosVersionFile,
    LinuxBiosDateFile,
    LinuxSysVendorFile,
    LinuxProductNameFile,
    LinuxProductVersionFile,
    LinuxProductSerialFile,
}

impl SettingKey {
    pub const ALL: [SettingKey; 16] = [
        SettingKey::PaccorOutputFile,
        SettingKey::AcaAddressPort,
        SettingKey::EfiPrefix,
        SettingKey::AutoDetectTpm,
        SettingKey::EventLogFile,
        SettingKey::HardwareManifestCollectors,
        SettingKey::HardwareManifestCollectionSwidEnforced,
        SettingKey::HardwareManifestSwidtagDir,
        SettingKey::CollectionTimeoutSeconds,
        SettingKey::LinuxBiosVendorFile,
        SettingKey::LinuxBiosVersionFile,
        SettingKey::LinuxBiosDateFile,
        SettingKey::LinuxSysVendorFile,
        SettingKey::LinuxProductNameFile,
        SettingKey::LinuxProductVersionFile,
        SettingKey::LinuxProductSerialFile,
    ];

    /// Name of the key in the settings file.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::PaccorOutputFile => "paccor_output_file",
            SettingKey::AcaAddressPort => "aca_address_port",
            SettingKey::EfiPrefix => "efi_prefix",
            SettingKey::AutoDetectTpm => "auto_detect_tpm",
            SettingKey::EventLogFile => "event_log_file",
            SettingKey::HardwareManifestCollectors => "hardware_manifest_collectors",
            SettingKey::HardwareManifestCollectionSwidEnforced => {
                "hardware_manifest_collection_swid_enforced"
            }
            SettingKey::HardwareManifestSwidtagDir => "hardware_manifest_swidtag_dir",
            SettingKey::CollectionTimeoutSeconds => "collection_timeout_seconds",
            SettingKey::LinuxBiosVendorFile => "linux_bios_vendor_file",
            SettingKey::LinuxBiosVersionFile => "linux_bios_version_file",
            SettingKey::LinuxBiosDateFile => "linux_bios_date_file",
            SettingKey::LinuxSysVendorFile => "linux_sys_vendor_file",
            SettingKey::LinuxProductNameFile => "linux_product_name_file",
            SettingKey::LinuxProductVersionFile => "linux_product_version_file",
            SettingKey::LinuxProductSerialFile => "linux_product_serial_file",
        }
    }

    /// Environment variable overriding this key, e.g. `HIRS_EFI_PREFIX`.
    pub fn env_var(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.as_str().to_uppercase())
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unresolved key/value pairs from the settings source and its overrides.
#[derive(Debug, Clone, Default)]
pub struct RawSettings {
    source: String,
    values: BTreeMap<String, Value>,
}

impl RawSettings {
    /// Read a settings file. `.yaml`/`.yml` files are parsed as YAML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read settings file {}: {}",
                path.display(),
                e
            ))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let value: Value = match extension.as_deref() {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                Error::Config(format!("malformed settings file {}: {}", path.display(), e))
            })?,
            _ => serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("malformed settings file {}: {}", path.display(), e))
            })?,
        };

        debug!("Reading settings file: {}", path.display());
        Self::from_value(value, path.display().to_string())
    }

    /// Parse settings from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("malformed settings: {}", e)))?;
        Self::from_value(value, "<inline>")
    }

    fn from_value(value: Value, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        match value {
            Value::Object(map) => Ok(Self {
                source,
                values: map.into_iter().collect(),
            }),
            _ => Err(Error::Config(format!(
                "settings in {} must be a key/value object",
                source
            ))),
        }
    }

    /// Overlay `HIRS_*` variables from the process environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(std::env::vars())
    }

    /// Overlay `HIRS_*` variables from `vars`. Unrecognized names are ignored.
    pub fn with_overrides<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(name, _)| name.starts_with(ENV_PREFIX))
            .collect();

        for key in SettingKey::ALL {
            let var = key.env_var();
            if let Some(value) = vars.get(&var) {
                debug!("{} overridden by {}", key, var);
                self.values
                    .insert(key.as_str().to_string(), Value::String(value.clone()));
            }
        }
        self
    }

    /// Where these settings came from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Value of `key` as text. Booleans and numbers are stringified; objects
    /// and arrays are a malformed source.
    pub fn get(&self, key: SettingKey) -> Result<Option<String>> {
        match self.values.get(key.as_str()) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(Error::Config(format!(
                "{} must be a string, number or boolean",
                key
            ))),
        }
    }

    /// Like [`RawSettings::get`], treating whitespace-only values as unset.
    pub fn get_nonblank(&self, key: SettingKey) -> Result<Option<String>> {
        Ok(self.get(key)?.filter(|v| !v.trim().is_empty()))
    }
}

/// Attestation CA endpoint, `scheme://host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcaAddress {
    scheme: String,
    host: String,
    port: u16,
    path: String,
}

impl AcaAddress {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host name or address, without IPv6 brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// `scheme://host:port` with an optional path; IPv6 hosts in brackets.
static ACA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<scheme>[A-Za-z][A-Za-z0-9+.\-]*)://",
        r"(?:\[(?P<ipv6>[0-9A-Fa-f:.]+)\]|(?P<host>[^\s:/?#\[\]@]+))",
        r":(?P<port>\d{1,5})(?P<path>[/?#]\S*)?$",
    ))
    .unwrap()
});

impl FromStr for AcaAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let caps = ACA_URI.captures(s.trim()).ok_or_else(|| {
            Error::Config(format!(
                "{} is not an absolute URI of the form scheme://host:port",
                s
            ))
        })?;

        let host = caps
            .name("ipv6")
            .or_else(|| caps.name("host"))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let port: u16 = caps["port"]
            .parse()
            .map_err(|_| Error::Config(format!("{}: port {} is out of range", s, &caps["port"])))?;

        Ok(Self {
            scheme: caps["scheme"].to_ascii_lowercase(),
            host,
            port,
            path: caps
                .name("path")
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
    }
}

impl fmt::Display for AcaAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}{}", self.scheme, self.host, self.port, self.path)
        } else {
            write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
        }
    }
}

/// DMI files read for firmware and hardware facts on Linux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxDmiPaths {
    pub bios_vendor: PathBuf,
    pub bios_version: PathBuf,
    pub bios_date: PathBuf,
    pub sys_vendor: PathBuf,
    pub product_name: PathBuf,
    pub product_version: PathBuf,
    pub product_serial: PathBuf,
}

impl Default for LinuxDmiPaths {
    fn default() -> Self {
        let dir = Path::new(LINUX_DMI_DIR);
        Self {
            bios_vendor: dir.join("bios_vendor"),
            bios_version: dir.join("bios_version"),
            bios_date: dir.join("bios_date"),
            sys_vendor: dir.join("sys_vendor"),
            product_name: dir.join("product_name"),
            product_version: dir.join("product_version"),
            product_serial: dir.join("product_serial"),
        }
    }
}

/// Resolved, read-only provisioner configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    source: String,
    paccor_output: Option<String>,
    aca_address: Option<AcaAddress>,
    efi_prefix: Option<PathBuf>,
    auto_detect_tpm: bool,
    event_log: Option<Vec<u8>>,
    hardware_manifest_collectors: CollectorSpecs,
    collectors_loaded: bool,
    swid_enforced: bool,
    swidtag_dir: Option<PathBuf>,
    operation_timeout: Duration,
    linux_dmi: LinuxDmiPaths,
}

impl Settings {
    fn unresolved(source: &str) -> Self {
        Self {
            source: source.to_string(),
            paccor_output: None,
            aca_address: None,
            efi_prefix: None,
            auto_detect_tpm: false,
            event_log: None,
            hardware_manifest_collectors: CollectorSpecs::default(),
            collectors_loaded: false,
            swid_enforced: false,
            swidtag_dir: None,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            linux_dmi: LinuxDmiPaths::default(),
        }
    }

    /// Resolve raw settings, validating plugins against SWID tags in
    /// `hardware_manifest_swidtag_dir`.
    pub fn complete_setup(
        raw: &RawSettings,
        catalog: &PluginCatalog,
    ) -> Result<(Settings, HardwareManifestCollectors)> {
        log_failure(raw, || {
            let swidtag_dir = swidtag_dir_setting(raw)?;
            let validator = SwidTagValidator::new(swidtag_dir.clone());
            Self::resolve(raw, catalog, &validator, swidtag_dir)
        })
    }

    /// Resolve raw settings with a caller-supplied plugin validator.
    pub fn complete_setup_with_validator(
        raw: &RawSettings,
        catalog: &PluginCatalog,
        validator: &dyn PluginValidator,
    ) -> Result<(Settings, HardwareManifestCollectors)> {
        log_failure(raw, || {
            Self::resolve(raw, catalog, validator, swidtag_dir_setting(raw)?)
        })
    }

    fn resolve(
        raw: &RawSettings,
        catalog: &PluginCatalog,
        validator: &dyn PluginValidator,
        swidtag_dir: Option<PathBuf>,
    ) -> Result<(Settings, HardwareManifestCollectors)> {
        let mut settings = Settings::unresolved(raw.source());
        settings.swidtag_dir = swidtag_dir;
        settings.read_operational_settings(raw)?;

        let collectors = settings.configure_hardware_manifest_management(raw, catalog, validator)?;
        settings.ingest_paccor_data_from_file(raw)?;
        settings.parse_aca_address(raw)?;
        settings.check_auto_detect_tpm(raw)?;
        settings.check_efi_prefix(raw)?;
        settings.ingest_event_log_from_file(raw)?;

        Ok((settings, collectors))
    }

    fn read_operational_settings(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::CollectionTimeoutSeconds;
        if let Some(value) = raw.get_nonblank(key)? {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.operation_timeout = Duration::from_secs(secs),
                _ => warn!(
                    "{} must be a positive number of seconds. Using default of {}.",
                    key, DEFAULT_OPERATION_TIMEOUT_SECS
                ),
            }
        }

        let dmi = &mut self.linux_dmi;
        let overrides = [
            (SettingKey::LinuxBiosVendorFile, &mut dmi.bios_vendor),
            (SettingKey::LinuxBiosVersionFile, &mut dmi.bios_version),
            (SettingKey::LinuxBiosDateFile, &mut dmi.bios_date),
            (SettingKey::LinuxSysVendorFile, &mut dmi.sys_vendor),
            (SettingKey::LinuxProductNameFile, &mut dmi.product_name),
            (SettingKey::LinuxProductVersionFile, &mut dmi.product_version),
            (SettingKey::LinuxProductSerialFile, &mut dmi.product_serial),
        ];
        for (key, slot) in overrides {
            if let Some(value) = raw.get_nonblank(key)? {
                *slot = PathBuf::from(value.trim());
            }
        }
        Ok(())
    }

    fn configure_hardware_manifest_management(
        &mut self,
        raw: &RawSettings,
        catalog: &PluginCatalog,
        validator: &dyn PluginValidator,
    ) -> Result<HardwareManifestCollectors> {
        let Some(spec) = raw.get_nonblank(SettingKey::HardwareManifestCollectors)? else {
            debug!("Hardware Manifest Plugin Manager will not be used. No collectors were identified in settings.");
            return Ok(HardwareManifestCollectors::empty(self.operation_timeout));
        };

        debug!("Configuring Hardware Manifest Plugin Manager");
        let specs = plugins::parse_spec(&spec);

        let key = SettingKey::HardwareManifestCollectionSwidEnforced;
        if let Some(flag) = raw.get_nonblank(key)? {
            match parse_bool(&flag) {
                Some(enforced) => self.swid_enforced = enforced,
                None => {
                    error!(
                        "{} did not contain a readable true/false setting. SWID enforcement stays enabled.",
                        key
                    );
                    self.swid_enforced = true;
                }
            }
            debug!(
                "SWID enforcement of Hardware Manifest Plugins is {}abled in settings.",
                if self.swid_enforced { "en" } else { "dis" }
            );
        }

        let collectors = plugins::load_plugins(
            catalog,
            specs,
            self.swid_enforced,
            validator,
            self.operation_timeout,
        );
        self.hardware_manifest_collectors = collectors.specs().clone();
        self.collectors_loaded = !collectors.is_empty();
        debug!("Finished configuring the Hardware Manifest Plugin Manager.");
        Ok(collectors)
    }

    fn ingest_paccor_data_from_file(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::PaccorOutputFile;
        let Some(file) = raw.get_nonblank(key)? else {
            debug!("{} not set in the settings file.", key);
            return Ok(());
        };

        debug!("Checking location of the paccor output file.");
        let path = absolute(Path::new(file.trim()));
        if !path.is_file() {
            warn!("{}", missing_file(key, &path));
            return Ok(());
        }
        if self.collectors_loaded {
            warn!("Hardware manifest collectors were loaded and a paccor output file is configured. Fresh data is preferred over data from a file. If you want to use the file data, clear the collectors field from the settings file.");
            return Ok(());
        }

        debug!("Retrieving JSON-formatted components from {}.", key);
        match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => warn!(
                "{}: paccor output was empty. Cannot perform Platform Attribute validation.",
                key
            ),
            Ok(content) => self.paccor_output = Some(content),
            Err(e) => warn!("{}: could not read {}: {}", key, path.display(), e),
        }
        Ok(())
    }

    fn parse_aca_address(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::AcaAddressPort;
        if let Some(value) = raw.get_nonblank(key)? {
            debug!("Parsing the ACA Address.");
            match value.parse::<AcaAddress>() {
                Ok(address) => {
                    debug!("  Found {}", address);
                    self.aca_address = Some(address);
                }
                Err(e) => error!("{}: {}", key, e),
            }
        }
        if !self.has_aca_address() {
            error!(
                "{} not set in the settings file. No HIRS ACA server to talk to. Looking for the format: \"https://<aca_server>:<port>\"",
                key
            );
        }
        Ok(())
    }

    fn check_auto_detect_tpm(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::AutoDetectTpm;
        match raw.get_nonblank(key)? {
            Some(value) => {
                debug!("Checking Auto Detect TPM setting.");
                match parse_bool(&value) {
                    Some(enabled) => {
                        self.auto_detect_tpm = enabled;
                        debug!(" Auto Detect TPM is {}abled.", if enabled { "en" } else { "dis" });
                    }
                    None => {
                        self.auto_detect_tpm = false;
                        warn!("{} did not contain a readable true/false setting. Setting to default of false.", key);
                    }
                }
            }
            None => {
                self.auto_detect_tpm = false;
                debug!("{} not set in the settings file. Setting to default of false.", key);
            }
        }
        Ok(())
    }

    fn check_efi_prefix(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::EfiPrefix;
        match raw.get(key)? {
            Some(value) if value.trim().is_empty() => {
                let default = Path::new(EFI_LINUX_DEFAULT_PREFIX);
                if Platform::current().is_linux() && default.is_dir() {
                    self.efi_prefix = Some(default.to_path_buf());
                }
            }
            Some(value) => {
                debug!("Checking EFI Prefix setting.");
                let path = PathBuf::from(value.trim());
                if path.is_dir() {
                    self.efi_prefix = Some(path);
                } else {
                    warn!("{}: {} did not exist.", key, path.display());
                }
            }
            None => {}
        }

        match &self.efi_prefix {
            Some(path) => debug!("  Will scan for artifacts in {}", path.display()),
            None => warn!(
                "{} not set in the settings file. Will not attempt to scan for artifacts in EFI.",
                key
            ),
        }
        Ok(())
    }

    fn ingest_event_log_from_file(&mut self, raw: &RawSettings) -> Result<()> {
        let key = SettingKey::EventLogFile;
        let Some(file) = raw.get_nonblank(key)? else {
            debug!("{} not set in the settings file.", key);
            return Ok(());
        };

        debug!("Checking location of the event log.");
        let path = absolute(Path::new(file.trim()));
        if !path.is_file() {
            warn!("{}", missing_file(key, &path));
            return Ok(());
        }

        debug!("Retrieving the Event Log.");
        match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => warn!("{}: the event log was empty.", key),
            Ok(bytes) => self.event_log = Some(bytes),
            Err(e) => warn!("{}: could not read {}: {}", key, path.display(), e),
        }
        Ok(())
    }

    /// Where these settings were read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn paccor_output(&self) -> Option<&str> {
        self.paccor_output.as_deref()
    }

    pub fn aca_address(&self) -> Option<&AcaAddress> {
        self.aca_address.as_ref()
    }

    pub fn efi_prefix(&self) -> Option<&Path> {
        self.efi_prefix.as_deref()
    }

    pub fn event_log(&self) -> Option<&[u8]> {
        self.event_log.as_deref()
    }

    /// Collectors that were loaded, with their argument strings.
    pub fn hardware_manifest_collectors(&self) -> &CollectorSpecs {
        &self.hardware_manifest_collectors
    }

    pub fn swidtag_dir(&self) -> Option<&Path> {
        self.swidtag_dir.as_deref()
    }

    /// Deadline for one plugin call or instrumentation query.
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub fn linux_dmi(&self) -> &LinuxDmiPaths {
        &self.linux_dmi
    }

    pub fn has_paccor_output(&self) -> bool {
        self.paccor_output.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn has_aca_address(&self) -> bool {
        self.aca_address.is_some()
    }

    pub fn has_efi_prefix(&self) -> bool {
        self.efi_prefix.is_some()
    }

    pub fn is_auto_detect_tpm_enabled(&self) -> bool {
        self.auto_detect_tpm
    }

    pub fn has_event_log(&self) -> bool {
        self.event_log.as_ref().is_some_and(|e| !e.is_empty())
    }

    pub fn is_swid_enforced(&self) -> bool {
        self.swid_enforced
    }
}

/// Case-insensitive `true`/`false`.
fn log_failure<T>(raw: &RawSettings, resolve: impl FnOnce() -> Result<T>) -> Result<T> {
    let result = resolve();
    if let Err(ref e) = result {
        error!("Error reading the settings file {}: {}", raw.source(), e);
    }
    result
}

fn swidtag_dir_setting(raw: &RawSettings) -> Result<Option<PathBuf>> {
    Ok(raw
        .get_nonblank(SettingKey::HardwareManifestSwidtagDir)?
        .map(|d| PathBuf::from(d.trim())))
}

fn missing_file(key: SettingKey, path: &Path) -> Error {
    Error::MissingEvidence(format!("{}: {} does not exist", key, path.display()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|dir| dir.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::{AcceptOnly, FakePlugin};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::tempdir;

    fn resolve(value: serde_json::Value) -> Settings {
        let raw = RawSettings::from_json_str(&value.to_string()).unwrap();
        Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap().0
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let err = RawSettings::load(&dir.path().join("appsettings.json")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_load_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("appsettings.json");
        fs::write(&path, "{ \"aca_address_port\": ").unwrap();
        assert!(matches!(RawSettings::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_non_object_root_is_config_error() {
        assert!(matches!(
            RawSettings::from_json_str("[1, 2]"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "aca_address_port: https://aca.example.com:8443\nauto_detect_tpm: true\n")
            .unwrap();
        let raw = RawSettings::load(&path).unwrap();
        let (settings, _) = Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap();
        assert_eq!(settings.aca_address().unwrap().port(), 8443);
        assert!(settings.is_auto_detect_tpm_enabled());
    }

    #[test]
    fn test_absent_keys_yield_defaults() {
        let settings = resolve(json!({}));
        assert!(!settings.is_auto_detect_tpm_enabled());
        assert!(!settings.has_efi_prefix());
        assert!(!settings.has_aca_address());
        assert!(!settings.has_paccor_output());
        assert!(!settings.has_event_log());
        assert!(!settings.is_swid_enforced());
        assert!(settings.hardware_manifest_collectors().is_empty());
        assert_eq!(
            settings.operation_timeout(),
            Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS)
        );
        assert_eq!(settings.linux_dmi(), &LinuxDmiPaths::default());
    }

    #[test]
    fn test_present_but_empty_keys_do_not_fail() {
        let raw = RawSettings::from_json_str(
            &json!({
                "paccor_output_file": "",
                "aca_address_port": "",
                "efi_prefix": "",
                "auto_detect_tpm": "",
                "event_log_file": "",
                "hardware_manifest_collectors": "",
                "hardware_manifest_collection_swid_enforced": "",
            })
            .to_string(),
        )
        .unwrap();
        let (settings, collectors) = Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap();
        assert!(!settings.is_auto_detect_tpm_enabled());
        assert!(!settings.has_aca_address());
        assert!(!settings.has_event_log());
        assert!(collectors.is_empty());
    }

    #[test]
    fn test_non_scalar_value_propagates() {
        let raw = RawSettings::from_json_str(&json!({ "efi_prefix": ["a", "b"] }).to_string())
            .unwrap();
        let err = Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_aca_address_parsing() {
        let address: AcaAddress = "https://aca.example.com:8443".parse().unwrap();
        assert_eq!(address.scheme(), "https");
        assert_eq!(address.host(), "aca.example.com");
        assert_eq!(address.port(), 8443);
        assert_eq!(address.to_string(), "https://aca.example.com:8443");

        let v6: AcaAddress = "https://[fe80::1]:8443/HIRS_AttestationCA".parse().unwrap();
        assert_eq!(v6.host(), "fe80::1");
        assert_eq!(v6.to_string(), "https://[fe80::1]:8443/HIRS_AttestationCA");

        assert!("aca.example.com:8443".parse::<AcaAddress>().is_err());
        assert!("https://aca.example.com".parse::<AcaAddress>().is_err());
        assert!("https://aca.example.com:99999".parse::<AcaAddress>().is_err());
    }

    #[test]
    fn test_invalid_aca_address_is_left_unset() {
        let settings = resolve(json!({ "aca_address_port": "not a uri" }));
        assert!(!settings.has_aca_address());
    }

    #[test]
    fn test_auto_detect_tpm_values() {
        assert!(resolve(json!({ "auto_detect_tpm": true })).is_auto_detect_tpm_enabled());
        assert!(resolve(json!({ "auto_detect_tpm": "TRUE" })).is_auto_detect_tpm_enabled());
        assert!(!resolve(json!({ "auto_detect_tpm": "false" })).is_auto_detect_tpm_enabled());
        assert!(!resolve(json!({ "auto_detect_tpm": "maybe" })).is_auto_detect_tpm_enabled());
    }

    #[test]
    fn test_efi_prefix_must_exist() {
        let dir = tempdir().unwrap();
        let settings = resolve(json!({ "efi_prefix": dir.path() }));
        assert_eq!(settings.efi_prefix(), Some(dir.path()));

        let missing = dir.path().join("missing");
        let settings = resolve(json!({ "efi_prefix": missing }));
        assert!(!settings.has_efi_prefix());
    }

    #[test]
    fn test_event_log_ingestion() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("binary_bios_measurements");
        fs::write(&log, [0x01, 0x02, 0x03]).unwrap();
        let settings = resolve(json!({ "event_log_file": log }));
        assert_eq!(settings.event_log(), Some(&[0x01u8, 0x02, 0x03][..]));

        let empty = dir.path().join("empty");
        fs::write(&empty, b"").unwrap();
        let settings = resolve(json!({ "event_log_file": empty }));
        assert!(!settings.has_event_log());

        let settings = resolve(json!({ "event_log_file": dir.path().join("missing") }));
        assert!(!settings.has_event_log());
    }

    #[test]
    fn test_paccor_output_ingested_without_collectors() {
        let dir = tempdir().unwrap();
        let paccor = dir.path().join("paccor.json");
        fs::write(&paccor, r#"{"COMPONENTS":[]}"#).unwrap();
        let settings = resolve(json!({ "paccor_output_file": paccor }));
        assert_eq!(settings.paccor_output(), Some(r#"{"COMPONENTS":[]}"#));
    }

    #[test]
    fn test_collectors_take_precedence_over_paccor_file() {
        let dir = tempdir().unwrap();
        let paccor = dir.path().join("paccor.json");
        fs::write(&paccor, r#"{"COMPONENTS":[]}"#).unwrap();

        let mut catalog = PluginCatalog::new();
        catalog.register("fresh", || Box::new(FakePlugin::new("fresh", r#"{"fresh":true}"#)));
        let raw = RawSettings::from_json_str(
            &json!({
                "paccor_output_file": paccor,
                "hardware_manifest_collectors": "fresh --all",
            })
            .to_string(),
        )
        .unwrap();

        let (settings, mut collectors) =
            Settings::complete_setup_with_validator(&raw, &catalog, &AcceptOnly::all()).unwrap();
        assert!(!settings.has_paccor_output());
        assert_eq!(settings.hardware_manifest_collectors().get("fresh"), Some("--all"));
        assert_eq!(collectors.run_all(), r#"{"fresh":true}"#);
    }

    #[test]
    fn test_paccor_file_used_when_no_collector_loads() {
        let dir = tempdir().unwrap();
        let paccor = dir.path().join("paccor.json");
        fs::write(&paccor, r#"{"COMPONENTS":[]}"#).unwrap();

        let raw = RawSettings::from_json_str(
            &json!({
                "paccor_output_file": paccor,
                "hardware_manifest_collectors": "not_installed --all",
            })
            .to_string(),
        )
        .unwrap();
        let (settings, collectors) = Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap();
        assert!(collectors.is_empty());
        assert!(settings.hardware_manifest_collectors().is_empty());
        assert_eq!(settings.paccor_output(), Some(r#"{"COMPONENTS":[]}"#));
    }

    #[test]
    fn test_swidtag_dir_drives_enforcement() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("fresh.swidtag"),
            r#"<SoftwareIdentity name="fresh" tagId="fresh-1.0" version="1.0"/>"#,
        )
        .unwrap();

        let mut catalog = PluginCatalog::new();
        catalog.register("fresh", || Box::new(FakePlugin::new("fresh", "{}")));
        catalog.register("unsigned", || Box::new(FakePlugin::new("unsigned", "{}")));
        let raw = RawSettings::from_json_str(
            &json!({
                "hardware_manifest_collectors": "fresh,unsigned",
                "hardware_manifest_collection_swid_enforced": "true",
                "hardware_manifest_swidtag_dir": format!(" {} ", dir.path().display()),
            })
            .to_string(),
        )
        .unwrap();

        let (settings, collectors) = Settings::complete_setup(&raw, &catalog).unwrap();
        assert_eq!(settings.swidtag_dir(), Some(dir.path()));
        assert_eq!(collectors.names(), vec!["fresh"]);
    }

    #[test]
    fn test_missing_file_is_reported_as_missing_evidence() {
        let err = missing_file(SettingKey::EventLogFile, Path::new("/var/log/absent"));
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "Missing evidence: event_log_file: /var/log/absent does not exist"
        );
    }

    #[test]
    fn test_unreadable_swid_flag_fails_closed() {
        let mut catalog = PluginCatalog::new();
        catalog.register("fresh", || Box::new(FakePlugin::new("fresh", "{}")));
        let raw = RawSettings::from_json_str(
            &json!({
                "hardware_manifest_collectors": "fresh",
                "hardware_manifest_collection_swid_enforced": "yes please",
            })
            .to_string(),
        )
        .unwrap();
        let (settings, collectors) =
            Settings::complete_setup_with_validator(&raw, &catalog, &AcceptOnly::none()).unwrap();
        assert!(settings.is_swid_enforced());
        assert!(collectors.is_empty());
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let raw = RawSettings::from_json_str(
            &json!({ "aca_address_port": "https://file.example.com:8443" }).to_string(),
        )
        .unwrap()
        .with_overrides(vec![
            (
                "HIRS_ACA_ADDRESS_PORT".to_string(),
                "https://env.example.com:9443".to_string(),
            ),
            ("HIRS_UNKNOWN".to_string(), "ignored".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);
        let (settings, _) = Settings::complete_setup(&raw, &PluginCatalog::new()).unwrap();
        assert_eq!(settings.aca_address().unwrap().host(), "env.example.com");
        assert_eq!(raw.get(SettingKey::EfiPrefix).unwrap(), None);
    }

    #[test]
    fn test_operational_overrides() {
        let settings = resolve(json!({
            "collection_timeout_seconds": 5,
            "linux_product_serial_file": "/tmp/serial",
            "hardware_manifest_swidtag_dir": "/opt/hirs/swidtags",
        }));
        assert_eq!(settings.operation_timeout(), Duration::from_secs(5));
        assert_eq!(settings.linux_dmi().product_serial, PathBuf::from("/tmp/serial"));
        assert_eq!(
            settings.linux_dmi().bios_vendor,
            PathBuf::from("/sys/class/dmi/id/bios_vendor")
        );
        assert_eq!(settings.swidtag_dir(), Some(Path::new("/opt/hirs/swidtags")));

        let settings = resolve(json!({ "collection_timeout_seconds": "0" }));
        assert_eq!(
            settings.operation_timeout(),
            Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS)
        );
    }
}
