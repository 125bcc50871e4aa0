//! Platform certificates and reference integrity manifests stored under EFI.
//!
//! Artifacts live under `<efi_prefix>/EFI/tcg/<subfolder>`. Older firmware
//! layouts use `<efi_prefix>/boot/tcg/<subfolder>`, which is searched only when
//! the primary subfolder does not exist.

use crate::config::Settings;
use hirs_evidence_schema::{ArtifactCategory, Collected, EvidenceArtifact};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const EFI_ARTIFACT_PATH: &str = "EFI/tcg";
const EFI_ARTIFACT_PATH_COMPAT: &str = "boot/tcg";

/// How file names are matched, always case-insensitively.
#[derive(Debug, Clone, Copy)]
enum NamePattern {
    ContainsAny(&'static [&'static str]),
    EndsWith(&'static str),
}

impl NamePattern {
    fn matches(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        match self {
            NamePattern::ContainsAny(needles) => needles.iter().any(|n| name.contains(n)),
            NamePattern::EndsWith(suffix) => name.ends_with(suffix),
        }
    }
}

/// Where one artifact category is looked for.
struct SearchRule {
    subfolders: &'static [&'static str],
    pattern: NamePattern,
}

fn search_rule(category: ArtifactCategory) -> SearchRule {
    match category {
        ArtifactCategory::PlatformCert => SearchRule {
            subfolders: &["cert", "pccert", "platform"],
            pattern: NamePattern::ContainsAny(&["base", "delta"]),
        },
        ArtifactCategory::BaseRim => SearchRule {
            subfolders: &["manifest", "swidtag"],
            pattern: NamePattern::EndsWith("swidtag"),
        },
        ArtifactCategory::SupportRimEventLog => SearchRule {
            subfolders: &["manifest", "rim"],
            pattern: NamePattern::EndsWith("rimel"),
        },
        ArtifactCategory::SupportRimPcr => SearchRule {
            subfolders: &["manifest", "rim"],
            pattern: NamePattern::EndsWith("rimpcr"),
        },
    }
}

/// Scans an EFI root for attestation artifacts.
///
/// Every call reads the filesystem afresh; nothing is cached between
/// categories or attempts.
#[derive(Debug, Clone, Default)]
pub struct EfiScanner {
    root: Option<PathBuf>,
}

impl EfiScanner {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.efi_prefix().map(Path::to_path_buf))
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    /// Base and delta platform certificates.
    pub fn platform_certificates(&self) -> Collected<Vec<EvidenceArtifact>> {
        self.scan(ArtifactCategory::PlatformCert)
    }

    /// Base RIM SWID tags.
    pub fn base_rims(&self) -> Collected<Vec<EvidenceArtifact>> {
        self.scan(ArtifactCategory::BaseRim)
    }

    /// Support RIM event logs.
    pub fn support_rim_event_logs(&self) -> Collected<Vec<EvidenceArtifact>> {
        self.scan(ArtifactCategory::SupportRimEventLog)
    }

    /// Support RIM PCR values.
    pub fn support_rim_pcrs(&self) -> Collected<Vec<EvidenceArtifact>> {
        self.scan(ArtifactCategory::SupportRimPcr)
    }

    /// Collect every file of `category`. `NotCollected` when no EFI root is
    /// configured or no file matched.
    pub fn scan(&self, category: ArtifactCategory) -> Collected<Vec<EvidenceArtifact>> {
        let Some(root) = &self.root else {
            warn!("Scan for {} was requested without an EFI prefix configured.", category);
            return Collected::NotCollected;
        };

        let rule = search_rule(category);
        let mut artifacts = Vec::new();

        for subfolder in rule.subfolders {
            let Some(dir) = resolve_subfolder(root, subfolder) else {
                continue;
            };
            for path in matching_files(&dir, rule.pattern) {
                match fs::read(&path) {
                    Ok(content) => {
                        debug!("{}: Gathering {}", category, path.display());
                        artifacts.push(EvidenceArtifact::new(category, &path, content));
                    }
                    Err(e) => warn!("{}: could not read {}: {}", category, path.display(), e),
                }
            }
        }

        debug!("Found {} {} files.", artifacts.len(), category);
        if artifacts.is_empty() {
            Collected::NotCollected
        } else {
            Collected::Collected(artifacts)
        }
    }
}

/// Primary directory for `subfolder`, or the compatibility one when the
/// primary does not exist.
fn resolve_subfolder(root: &Path, subfolder: &str) -> Option<PathBuf> {
    let primary = root.join(EFI_ARTIFACT_PATH).join(subfolder);
    if primary.is_dir() {
        return Some(primary);
    }
    let compat = root.join(EFI_ARTIFACT_PATH_COMPAT).join(subfolder);
    if compat.is_dir() {
        debug!("Using compatibility path {}", compat.display());
        return Some(compat);
    }
    None
}

fn matching_files(dir: &Path, pattern: NamePattern) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error walking {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| pattern.matches(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect()
}
