//! Windows facts from CIM classes, queried through PowerShell.

use super::DeviceFacts;
use crate::executor::CommandRunner;
use hirs_common::{Error, Platform, Result};
use hirs_evidence_schema::{or_not_specified, FirmwareInfo, HardwareInfo, OsInfo};
use serde_json::Value;
use tracing::warn;

const POWERSHELL: &str = "powershell.exe";

const BIOS_QUERY: &str = "Get-CimInstance -ClassName Win32_BIOS | Select-Object -First 1 Manufacturer,Version,@{Name='ReleaseDate';Expression={if ($_.ReleaseDate) { $_.ReleaseDate.ToString('yyyy-MM-dd') }}} | ConvertTo-Json -Compress";

const PRODUCT_QUERY: &str = "Get-CimInstance -ClassName Win32_ComputerSystemProduct | Select-Object -First 1 Vendor,Name,Version,IdentifyingNumber | ConvertTo-Json -Compress";

const OS_QUERY: &str = "Get-CimInstance -ClassName Win32_OperatingSystem | Select-Object -First 1 Caption,Version,BuildNumber | ConvertTo-Json -Compress";

pub struct WindowsFacts {
    runner: Box<dyn CommandRunner>,
}

impl WindowsFacts {
    pub fn new(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Run a CIM query and return its single JSON object.
    fn query(&self, script: &str) -> Result<Value> {
        let args = [
            "-NoProfile".to_string(),
            "-NonInteractive".to_string(),
            "-Command".to_string(),
            script.to_string(),
        ];
        let output = self.runner.run(POWERSHELL, &args)?;
        if !output.success() {
            return Err(Error::CommandExecution {
                cmd: script.to_string(),
                reason: output.stderr.trim().to_string(),
            });
        }

        let value: Value = serde_json::from_str(output.stdout.trim())?;
        // ConvertTo-Json emits an array when several instances are returned.
        Ok(match value {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            other => other,
        })
    }

    /// Query result, or `Null` (every field "Not Specified") on failure.
    fn query_or_empty(&self, class: &str, script: &str) -> Value {
        self.query(script).unwrap_or_else(|e| {
            warn!("{} query failed: {}", class, e);
            Value::Null
        })
    }
}

/// String field of a CIM object, defaulted to "Not Specified".
fn field(object: &Value, name: &str) -> String {
    let value = match object.get(name) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    or_not_specified(value.as_deref())
}

impl DeviceFacts for WindowsFacts {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn firmware(&self) -> FirmwareInfo {
        let bios = self.query_or_empty("Win32_BIOS", BIOS_QUERY);
        FirmwareInfo {
            vendor: field(&bios, "Manufacturer"),
            version: field(&bios, "Version"),
            release_date: field(&bios, "ReleaseDate"),
        }
    }

    fn hardware(&self) -> HardwareInfo {
        let product = self.query_or_empty("Win32_ComputerSystemProduct", PRODUCT_QUERY);
        HardwareInfo {
            manufacturer: field(&product, "Vendor"),
            product_name: field(&product, "Name"),
            product_version: field(&product, "Version"),
            serial_number: field(&product, "IdentifyingNumber"),
        }
    }

    fn os(&self) -> OsInfo {
        let os = self.query_or_empty("Win32_OperatingSystem", OS_QUERY);
        OsInfo {
            name: Platform::Windows.os_name().to_string(),
            version: field(&os, "Version"),
            architecture: std::env::consts::ARCH.to_string(),
            distribution: field(&os, "Caption"),
            distribution_release: field(&os, "BuildNumber"),
        }
    }
}
