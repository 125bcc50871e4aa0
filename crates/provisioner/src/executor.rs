//! Local command execution.

use hirs_common::{Error, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Trait for command execution.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and collect its output.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands on this machine, killing them once the deadline passes.
pub struct LocalRunner {
    timeout: Duration,
}

impl LocalRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for LocalRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let cmd = command_line(program, args);
        debug!("Local exec: {}", cmd);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::CommandExecution {
                cmd: cmd.clone(),
                reason: e.to_string(),
            })?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::CommandTimeout { cmd });
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(Error::CommandExecution {
                        cmd,
                        reason: e.to_string(),
                    })
                }
            }
        };

        Ok(CommandOutput {
            exit_code: status.code(),
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        String::from_utf8_lossy(&buffer).to_string()
    })
}

fn join_reader(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Runner answering from canned responses keyed by a substring of the
    /// command line.
    #[derive(Default)]
    pub struct ScriptedRunner {
        responses: Vec<(String, CommandOutput)>,
        pub seen: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(mut self, needle: &str, stdout: &str) -> Self {
            self.responses.push((
                needle.to_string(),
                CommandOutput {
                    exit_code: Some(0),
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                },
            ));
            self
        }

        pub fn fail(mut self, needle: &str, code: i32, stderr: &str) -> Self {
            self.responses.push((
                needle.to_string(),
                CommandOutput {
                    exit_code: Some(code),
                    stdout: String::new(),
                    stderr: stderr.to_string(),
                },
            ));
            self
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let cmd = command_line(program, args);
            self.seen.lock().unwrap().push(cmd.clone());
            self.responses
                .iter()
                .find(|(needle, _)| cmd.contains(needle.as_str()))
                .map(|(_, output)| output.clone())
                .ok_or(Error::CommandExecution {
                    cmd,
                    reason: "no such command".to_string(),
                })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_local_runner_captures_output() {
        let runner = LocalRunner::new(Duration::from_secs(10));
        let output = runner.run("sh", &sh("echo out; echo err >&2; exit 3")).unwrap();
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
    }

    #[test]
    fn test_local_runner_enforces_deadline() {
        let runner = LocalRunner::new(Duration::from_millis(100));
        let err = runner.run("sh", &sh("sleep 5")).unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
    }

    #[test]
    fn test_local_runner_missing_program() {
        let runner = LocalRunner::new(Duration::from_secs(1));
        let err = runner
            .run("/nonexistent/hirs-collector", &[])
            .unwrap_err();
        assert!(matches!(err, Error::CommandExecution { .. }));
    }
}
