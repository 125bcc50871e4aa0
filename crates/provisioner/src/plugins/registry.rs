//! Plugin catalog, loading and invocation.

use super::{split_args, CollectorSpecs, CommandCollector, HardwareManifestPlugin, PluginValidator};
use hirs_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, dispatcher, error, warn, Span};

/// Creates a fresh collector instance bound to the per-operation deadline.
pub type PluginFactory = Box<dyn Fn(Duration) -> Box<dyn HardwareManifestPlugin> + Send + Sync>;

/// Collectors known to this build, by name.
#[derive(Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the collectors shipped with the provisioner.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register_with_deadline(CommandCollector::NAME, |timeout| {
            Box::new(CommandCollector::new(timeout))
        });
        catalog
    }

    /// Register a collector under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn HardwareManifestPlugin> + Send + Sync + 'static,
    {
        self.register_with_deadline(name, move |_| factory());
    }

    /// Register a collector whose own work (child processes, queries) must
    /// honour the configured deadline.
    pub fn register_with_deadline<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(Duration) -> Box<dyn HardwareManifestPlugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the collector registered as `name`.
    pub fn instantiate(&self, name: &str, timeout: Duration) -> Option<Box<dyn HardwareManifestPlugin>> {
        self.factories.get(name).map(|factory| factory(timeout))
    }
}

/// Load the collectors named in `specs`.
///
/// Unknown names, collectors failing validation, and collectors whose
/// reported name differs from the requested one are dropped. The returned
/// set's argument mapping holds only the collectors that were loaded.
pub fn load_plugins(
    catalog: &PluginCatalog,
    specs: CollectorSpecs,
    swid_enforced: bool,
    validator: &dyn PluginValidator,
    timeout: Duration,
) -> HardwareManifestCollectors {
    let mut plugins: Vec<Box<dyn HardwareManifestPlugin>> = Vec::new();

    for name in specs.names() {
        if !catalog.contains(name) {
            warn!("No hardware manifest collector named {} is available.", name);
            continue;
        }
        if swid_enforced && !validator.validate(name) {
            error!(
                "{}",
                Error::ValidationFailure {
                    plugin: name.to_string(),
                    reason: "SWID tag validation did not pass".to_string(),
                }
            );
            continue;
        }
        let Some(plugin) = catalog.instantiate(name, timeout) else {
            continue;
        };
        if plugin.name() != name {
            warn!(
                "Hardware manifest collector registered as {} reports name {}. Skipping.",
                name,
                plugin.name()
            );
            continue;
        }
        debug!("Loaded hardware manifest collector {}", name);
        plugins.push(plugin);
    }

    let mut specs = specs;
    let loaded: Vec<String> = plugins.iter().map(|p| p.name().to_string()).collect();
    let loaded: Vec<&str> = loaded.iter().map(String::as_str).collect();
    specs.retain_loaded(&loaded);

    HardwareManifestCollectors {
        plugins: plugins.into_iter().map(Some).collect(),
        specs,
        timeout,
        overrunning: Vec::new(),
    }
}

/// The loaded collectors and their argument strings.
pub struct HardwareManifestCollectors {
    // A slot is emptied when its collector overran the deadline and had to be abandoned.
    plugins: Vec<Option<Box<dyn HardwareManifestPlugin>>>,
    specs: CollectorSpecs,
    timeout: Duration,
    // Threads of abandoned collectors, by name, until they finish.
    overrunning: Vec<(String, JoinHandle<()>)>,
}

impl fmt::Debug for HardwareManifestCollectors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HardwareManifestCollectors")
            .field("names", &self.names())
            .field("specs", &self.specs)
            .field("timeout", &self.timeout)
            .field(
                "overrunning",
                &self.overrunning.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl HardwareManifestCollectors {
    /// No collectors.
    pub fn empty(timeout: Duration) -> Self {
        Self {
            plugins: Vec::new(),
            specs: CollectorSpecs::default(),
            timeout,
            overrunning: Vec::new(),
        }
    }

    /// Argument strings of the loaded collectors.
    pub fn specs(&self) -> &CollectorSpecs {
        &self.specs
    }

    /// Names of the collectors still available, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.plugins
            .iter()
            .flatten()
            .map(|plugin| plugin.name())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.iter().all(Option::is_none)
    }

    /// Configure and gather every collector in registration order, one at a
    /// time.
    ///
    /// A collector failing in either step contributes nothing. A collector
    /// that overruns the deadline is abandoned, and no other collector starts
    /// while its thread is still alive, in this attempt or a later one.
    /// Contributions are concatenated as-is; with more than one contributor
    /// the result is not guaranteed to be a single well-formed JSON document.
    pub fn run_all(&mut self) -> String {
        self.overrunning.retain(|(_, handle)| !handle.is_finished());
        if let Some((name, _)) = self.overrunning.first() {
            warn!(
                "Hardware manifest collector {} from an earlier attempt is still running. Skipping hardware manifest collection.",
                name
            );
            return String::new();
        }

        debug!("Gathering data from loaded hardware manifest collectors.");
        let mut manifest_json = String::new();
        let mut contributors = 0usize;

        for slot in self.plugins.iter_mut() {
            let Some(plugin) = slot.take() else {
                continue;
            };
            let name = plugin.name().to_string();
            let args = self.specs.get(&name).unwrap_or_default();

            let Some(tokens) = split_args(args) else {
                warn!("Could not split the arguments configured for {}: {}", name, args);
                *slot = Some(plugin);
                continue;
            };

            let invocation = invoke(plugin, tokens, self.timeout);
            *slot = invocation.plugin;

            match invocation.outcome {
                Ok(json) if json.trim().is_empty() => {
                    debug!("  {} produced no data", name);
                }
                Ok(json) => {
                    contributors += 1;
                    manifest_json.push_str(json.trim());
                }
                Err(e) => {
                    warn!("Problem retrieving hardware manifest from {}: {}", name, e);
                }
            }

            if let Some(handle) = invocation.overrunning {
                warn!(
                    "{} is still running after its deadline. Skipping the remaining hardware manifest collectors.",
                    name
                );
                self.overrunning.push((name, handle));
                break;
            }
        }

        if contributors > 1 {
            warn!(
                "{} hardware manifest collectors contributed data; their JSON output was concatenated without merging.",
                contributors
            );
        }
        manifest_json
    }
}

/// Result of running one collector.
struct Invocation {
    /// The collector, unless it panicked or overran.
    plugin: Option<Box<dyn HardwareManifestPlugin>>,
    outcome: Result<String>,
    /// Thread still running the collector after the deadline.
    overrunning: Option<JoinHandle<()>>,
}

impl Invocation {
    fn failed(plugin: &str, reason: impl ToString) -> Self {
        Self {
            plugin: None,
            outcome: Err(Error::plugin(plugin, reason)),
            overrunning: None,
        }
    }
}

/// Run one collector's configure and gather off-thread under `timeout`.
fn invoke(
    mut plugin: Box<dyn HardwareManifestPlugin>,
    tokens: Vec<String>,
    timeout: Duration,
) -> Invocation {
    let name = plugin.name().to_string();
    let (tx, rx) = mpsc::channel();

    let dispatch = dispatcher::get_default(|current| current.clone());
    let span = Span::current();
    let thread_name = name.clone();
    let spawned = thread::Builder::new()
        .name(format!("collector-{}", name))
        .spawn(move || {
            dispatcher::with_default(&dispatch, || {
                let _span = span.enter();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    debug!("  Configuring {}", thread_name);
                    plugin.configure(&tokens)?;
                    debug!("  Gathering from {}", thread_name);
                    plugin.gather()
                }));
                let message = match outcome {
                    Ok(result) => (Some(plugin), result),
                    Err(_) => (None, Err(Error::plugin(&thread_name, "collector panicked"))),
                };
                let _ = tx.send(message);
            })
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => return Invocation::failed(&name, e),
    };

    match rx.recv_timeout(timeout) {
        Ok((plugin, outcome)) => Invocation {
            plugin,
            outcome,
            overrunning: None,
        },
        Err(RecvTimeoutError::Timeout) => Invocation {
            plugin: None,
            outcome: Err(Error::plugin(
                &name,
                format!(
                    "no result within {}ms, collector abandoned",
                    timeout.as_millis()
                ),
            )),
            overrunning: Some(handle),
        },
        Err(RecvTimeoutError::Disconnected) => {
            Invocation::failed(&name, "collector exited without a result")
        }
    }
}
