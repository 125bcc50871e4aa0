//! Built-in collector running an external inventory program.

use super::HardwareManifestPlugin;
use crate::config::DEFAULT_OPERATION_TIMEOUT_SECS;
use crate::executor::{CommandRunner, LocalRunner};
use hirs_common::{Error, Result};
use std::time::Duration;
use tracing::debug;

/// Runs a program whose standard output is the hardware manifest JSON.
///
/// The first configured argument is the program, the rest are passed to it:
///
/// ```text
/// hardware_manifest_collectors: "command /opt/paccor/scripts/allcomponents.sh"
/// ```
pub struct CommandCollector {
    program: Option<String>,
    args: Vec<String>,
    runner: Box<dyn CommandRunner>,
}

impl CommandCollector {
    pub const NAME: &'static str = "command";

    /// Collector whose program is killed once `timeout` passes.
    pub fn new(timeout: Duration) -> Self {
        Self::with_runner(Box::new(LocalRunner::new(timeout)))
    }

    pub fn with_runner(runner: Box<dyn CommandRunner>) -> Self {
        Self {
            program: None,
            args: Vec::new(),
            runner,
        }
    }
}

impl Default for CommandCollector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS))
    }
}

impl HardwareManifestPlugin for CommandCollector {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn configure(&mut self, args: &[String]) -> Result<()> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| Error::plugin(Self::NAME, "expects a program to run"))?;
        self.program = Some(program.clone());
        self.args = rest.to_vec();
        Ok(())
    }

    fn gather(&mut self) -> Result<String> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| Error::plugin(Self::NAME, "gather called before configure"))?;

        let output = self.runner.run(program, &self.args)?;
        if !output.success() {
            return Err(Error::plugin(
                Self::NAME,
                format!(
                    "{} exited with {:?}: {}",
                    program,
                    output.exit_code,
                    output.stderr.trim()
                ),
            ));
        }

        let json = output.stdout.trim().to_string();
        serde_json::from_str::<serde_json::Value>(&json).map_err(|e| {
            Error::plugin(Self::NAME, format!("{} did not produce JSON: {}", program, e))
        })?;
        debug!("{} produced {} bytes of JSON", program, json.len());
        Ok(json)
    }
}
