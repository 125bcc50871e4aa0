//! EFI-resident evidence artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Category of an artifact found under the EFI root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactCategory {
    /// Base or delta platform certificate.
    PlatformCert,
    /// Base reference integrity manifest (SWID tag).
    BaseRim,
    /// Support RIM holding a reference event log.
    SupportRimEventLog,
    /// Support RIM holding reference PCR values.
    SupportRimPcr,
}

impl ArtifactCategory {
    pub const ALL: [ArtifactCategory; 4] = [
        ArtifactCategory::PlatformCert,
        ArtifactCategory::BaseRim,
        ArtifactCategory::SupportRimEventLog,
        ArtifactCategory::SupportRimPcr,
    ];
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactCategory::PlatformCert => "platform-cert",
            ArtifactCategory::BaseRim => "base-rim",
            ArtifactCategory::SupportRimEventLog => "support-rim-event-log",
            ArtifactCategory::SupportRimPcr => "support-rim-pcr",
        };
        f.write_str(name)
    }
}

/// Result of looking for one kind of evidence.
///
/// `NotCollected` means nothing was found (or the source was never
/// consulted); `Collected` carries what was found, even if that is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Collected<T> {
    NotCollected,
    Collected(T),
}

impl<T> Collected<T> {
    pub fn is_collected(&self) -> bool {
        matches!(self, Collected::Collected(_))
    }

    pub fn as_ref(&self) -> Collected<&T> {
        match self {
            Collected::NotCollected => Collected::NotCollected,
            Collected::Collected(value) => Collected::Collected(value),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Collected<U> {
        match self {
            Collected::NotCollected => Collected::NotCollected,
            Collected::Collected(value) => Collected::Collected(f(value)),
        }
    }

    /// Convert into an `Option`, losing nothing since `NotCollected` maps to `None`.
    pub fn into_option(self) -> Option<T> {
        match self {
            Collected::NotCollected => None,
            Collected::Collected(value) => Some(value),
        }
    }
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Collected::NotCollected
    }
}

impl<T> From<Option<T>> for Collected<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Collected::Collected(value),
            None => Collected::NotCollected,
        }
    }
}

/// A file read from firmware storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceArtifact {
    /// Category the file was found under.
    pub category: ArtifactCategory,
    /// Path the bytes were read from.
    pub source_path: PathBuf,
    /// Size in bytes.
    pub size_bytes: u64,
    /// SHA256 hash of the content.
    pub content_hash: String,
    /// When the file was read.
    pub collected_at: DateTime<Utc>,
    /// Raw file content (kept in memory, not part of the serialized metadata).
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl EvidenceArtifact {
    /// Create an artifact from bytes read at `source_path`.
    pub fn new(category: ArtifactCategory, source_path: impl AsRef<Path>, content: Vec<u8>) -> Self {
        Self {
            category,
            source_path: source_path.as_ref().to_path_buf(),
            size_bytes: content.len() as u64,
            content_hash: hirs_common::hash::sha256_bytes(&content),
            collected_at: Utc::now(),
            content,
        }
    }

    /// File name component of the source path.
    pub fn file_name(&self) -> Option<&str> {
        self.source_path.file_name().and_then(|n| n.to_str())
    }
}
