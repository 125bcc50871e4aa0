//! SWID tag based collector validation.

use super::PluginValidator;
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;
use tracing::{debug, error};

/// Name attribute of the (optionally namespaced) `SoftwareIdentity` element.
static SOFTWARE_IDENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(?:[\w.\-]+:)?SoftwareIdentity\b[^>]*?\sname\s*=\s*"([^"]*)""#).unwrap()
});

/// Accepts a collector when `<dir>/<name>.swidtag` declares a
/// `SoftwareIdentity` with the same name.
pub struct SwidTagValidator {
    dir: Option<PathBuf>,
}

impl SwidTagValidator {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

fn tag_name(content: &str) -> Option<String> {
    SOFTWARE_IDENTITY
        .captures(content)
        .map(|caps| caps[1].to_string())
}

impl PluginValidator for SwidTagValidator {
    fn validate(&self, name: &str) -> bool {
        let Some(dir) = &self.dir else {
            error!(
                "SWID enforcement is enabled but no SWID tag directory is configured; cannot validate {}.",
                name
            );
            return false;
        };
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name.contains("..") {
            error!("Refusing to validate collector with unsafe name {:?}.", name);
            return false;
        }

        let path = dir.join(format!("{}.swidtag", name));
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                error!("Could not read SWID tag {} for {}: {}", path.display(), name, e);
                return false;
            }
        };

        match tag_name(&content) {
            Some(tag_name) if tag_name == name => {
                debug!("SWID tag {} validated {}", path.display(), name);
                true
            }
            Some(tag_name) => {
                error!(
                    "SWID tag {} names {} rather than {}.",
                    path.display(),
                    tag_name,
                    name
                );
                false
            }
            None => {
                error!("{} does not contain a SoftwareIdentity element.", path.display());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    const TAG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<SoftwareIdentity xmlns="http://standards.iso.org/iso/19770/-2/2015/schema.xsd"
    corpus="false" name="lshw" tagId="lshw-1.0" version="1.0">
  <Entity name="Example" regid="example.com" role="tagCreator"/>
</SoftwareIdentity>
"#;

    #[test]
    fn test_matching_tag_validates() {
        let dir = TempDir::new().unwrap();
        dir.child("lshw.swidtag").write_str(TAG).unwrap();
        let validator = SwidTagValidator::new(Some(dir.path().to_path_buf()));
        assert!(validator.validate("lshw"));
    }

    #[test]
    fn test_missing_or_mismatched_tag_fails() {
        let dir = TempDir::new().unwrap();
        dir.child("other.swidtag").write_str(TAG).unwrap();
        dir.child("empty.swidtag").write_str("<Entity name=\"empty\"/>").unwrap();
        let validator = SwidTagValidator::new(Some(dir.path().to_path_buf()));

        assert!(!validator.validate("absent"));
        assert!(!validator.validate("other"));
        assert!(!validator.validate("empty"));
        assert!(!validator.validate("../lshw"));
    }

    #[test]
    fn test_namespaced_identity_element() {
        let tag = r#"<swid:SoftwareIdentity xmlns:swid="http://standards.iso.org/iso/19770/-2/2015/schema.xsd" name="paccor"/>"#;
        assert_eq!(tag_name(tag).as_deref(), Some("paccor"));
        assert_eq!(tag_name("<SoftwareIdentityX name=\"x\"/>"), None);
    }

    #[test]
    fn test_no_directory_fails_closed() {
        assert!(!SwidTagValidator::new(None).validate("lshw"));
    }
}
