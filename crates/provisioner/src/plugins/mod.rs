//! Hardware manifest collector plugins.
//!
//! Collectors are named in settings as a comma separated list, each name
//! optionally followed by command-line style arguments:
//!
//! ```text
//! collector1 -a --b=c,collector2,collector3
//! ```
//!
//! Names are resolved against a [`PluginCatalog`] built at startup. When SWID
//! enforcement is enabled a collector must also pass a [`PluginValidator`]
//! before it is loaded.

mod command;
mod registry;
mod swid;

pub use command::CommandCollector;
pub use registry::{load_plugins, HardwareManifestCollectors, PluginCatalog, PluginFactory};
pub use swid::SwidTagValidator;

use hirs_common::Result;
use tracing::warn;

/// A pluggable source of hardware inventory evidence.
pub trait HardwareManifestPlugin: Send {
    /// Name used to select this collector in settings.
    fn name(&self) -> &str;

    /// Pass the collector its shell-split arguments.
    fn configure(&mut self, args: &[String]) -> Result<()>;

    /// Produce the hardware manifest as JSON text.
    fn gather(&mut self) -> Result<String>;
}

/// Decides whether a collector may be loaded when SWID enforcement is on.
pub trait PluginValidator {
    fn validate(&self, name: &str) -> bool;
}

/// One `name args...` entry of the collectors setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorSpec {
    pub name: String,
    pub args: String,
}

/// Ordered, name-unique collector specifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorSpecs(Vec<CollectorSpec>);

impl CollectorSpecs {
    /// Argument string configured for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.args.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectorSpec> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every entry whose name is not in `loaded`.
    pub fn retain_loaded(&mut self, loaded: &[&str]) {
        self.0.retain(|spec| loaded.contains(&spec.name.as_str()));
    }

    fn push(&mut self, spec: CollectorSpec) {
        if self.contains(&spec.name) {
            warn!(
                "Hardware manifest collector {} is listed more than once. Keeping the first entry.",
                spec.name
            );
            return;
        }
        self.0.push(spec);
    }
}

/// Parse the `hardware_manifest_collectors` setting.
///
/// Entries are separated by commas; within an entry the name ends at the
/// first whitespace and the remainder is its argument string.
pub fn parse_spec(raw: &str) -> CollectorSpecs {
    let mut specs = CollectorSpecs::default();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, args) = match entry.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim_start()),
            None => (entry, ""),
        };
        specs.push(CollectorSpec {
            name: name.to_string(),
            args: args.to_string(),
        });
    }
    specs
}

/// Split a collector argument string the way a POSIX shell would.
pub fn split_args(args: &str) -> Option<Vec<String>> {
    shlex::split(args)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use hirs_common::Error;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// In-memory collector recording what it was asked to do.
    pub struct FakePlugin {
        name: String,
        output: String,
        fail_configure: bool,
        fail_gather: bool,
        panic_gather: bool,
        delay: Option<std::time::Duration>,
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl FakePlugin {
        pub fn new(name: &str, output: &str) -> Self {
            Self {
                name: name.to_string(),
                output: output.to_string(),
                fail_configure: false,
                fail_gather: false,
                panic_gather: false,
                delay: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn recording(name: &str, output: &str, calls: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                calls,
                ..Self::new(name, output)
            }
        }

        pub fn failing_configure(mut self) -> Self {
            self.fail_configure = true;
            self
        }

        pub fn failing_gather(mut self) -> Self {
            self.fail_gather = true;
            self
        }

        pub fn panicking(mut self) -> Self {
            self.panic_gather = true;
            self
        }

        pub fn slow(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl HardwareManifestPlugin for FakePlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn configure(&mut self, args: &[String]) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:configure:{}", self.name, args.join("|")));
            if self.fail_configure {
                return Err(Error::plugin(&self.name, "bad arguments"));
            }
            Ok(())
        }

        fn gather(&mut self) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:gather", self.name));
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.panic_gather {
                panic!("collector {} crashed", self.name);
            }
            if self.fail_gather {
                return Err(Error::plugin(&self.name, "device busy"));
            }
            Ok(self.output.clone())
        }
    }

    /// Validator accepting a fixed set of names.
    pub struct AcceptOnly {
        names: Option<HashSet<String>>,
    }

    impl AcceptOnly {
        pub fn all() -> Self {
            Self { names: None }
        }

        pub fn none() -> Self {
            Self {
                names: Some(HashSet::new()),
            }
        }

        pub fn names(names: &[&str]) -> Self {
            Self {
                names: Some(names.iter().map(|n| n.to_string()).collect()),
            }
        }
    }

    impl PluginValidator for AcceptOnly {
        fn validate(&self, name: &str) -> bool {
            self.names.as_ref().map_or(true, |names| names.contains(name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_spec_names_and_args() {
        let specs = parse_spec("a -x,b");
        assert_eq!(specs.names(), vec!["a", "b"]);
        assert_eq!(specs.get("a"), Some("-x"));
        assert_eq!(specs.get("b"), Some(""));
    }

    #[test]
    fn test_parse_spec_keeps_remainder_verbatim() {
        let specs = parse_spec(" lshw --class \"system board\" -q , paccor ");
        assert_eq!(specs.get("lshw"), Some("--class \"system board\" -q"));
        assert_eq!(specs.get("paccor"), Some(""));
    }

    #[test]
    fn test_parse_spec_skips_empty_and_duplicate_entries() {
        let specs = parse_spec("a -x,,a -y, ,b");
        assert_eq!(specs.len(), 2);
        assert_eq!(specs.get("a"), Some("-x"));
    }

    #[test]
    fn test_retain_loaded() {
        let mut specs = parse_spec("a -x,b,c --z");
        specs.retain_loaded(&["c", "a"]);
        assert_eq!(specs.names(), vec!["a", "c"]);
        assert!(!specs.contains("b"));
    }

    #[test]
    fn test_split_args() {
        assert_eq!(
            split_args("-a --b=c \"d e\"").unwrap(),
            vec!["-a", "--b=c", "d e"]
        );
        assert_eq!(split_args("").unwrap(), Vec::<String>::new());
        assert!(split_args("\"unterminated").is_none());
    }
}
