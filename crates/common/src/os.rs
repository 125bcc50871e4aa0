//! Operating system family detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating system family the provisioner is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Other,
}

impl Platform {
    /// Platform of the running process.
    pub fn current() -> Self {
        Self::from_target_os(std::env::consts::OS)
    }

    /// Map a `std::env::consts::OS` value onto a platform family.
    pub fn from_target_os(os: &str) -> Self {
        match os {
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            _ => Platform::Other,
        }
    }

    /// Name reported as the OS name in device facts.
    pub fn os_name(&self) -> &'static str {
        match self {
            Platform::Windows => "WINDOWS",
            Platform::Linux => "LINUX",
            Platform::MacOs => "OSX",
            Platform::Other => std::env::consts::OS,
        }
    }

    /// Check if the platform is Linux.
    pub fn is_linux(&self) -> bool {
        matches!(self, Platform::Linux)
    }

    /// Check if the platform is Windows.
    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    /// Whether a device-facts strategy exists for this platform.
    pub fn is_supported(&self) -> bool {
        matches!(self, Platform::Windows | Platform::Linux)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::Linux => write!(f, "linux"),
            Platform::MacOs => write!(f, "macos"),
            Platform::Other => write!(f, "other"),
        }
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" => Ok(Platform::Windows),
            "linux" => Ok(Platform::Linux),
            "macos" | "osx" => Ok(Platform::MacOs),
            "other" => Ok(Platform::Other),
            _ => Err(crate::Error::UnsupportedPlatform(s.to_string())),
        }
    }
}
