// Copyright 2025 Jayashankar
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Captured result of an external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turn a non-zero exit into [`Error::Command`].
    pub fn check(self, program: &str, args: &[String]) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let mut stderr = self.stderr.trim().to_string();
        if stderr.is_empty() {
            stderr = self.stdout.trim().to_string();
        }
        if stderr.is_empty() {
            stderr = match self.code {
                Some(code) => format!("exited with status {}", code),
                None => "terminated by signal".to_string(),
            };
        }
        Err(Error::Command {
            command: display_command(program, args),
            stderr,
        })
    }
}

/// Runs external programs. Swapped for a scripted fake in tests.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

pub fn display_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs commands with `std::process`, optionally killing them after a timeout.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    /// `timeout_secs == 0` waits for the command however long it takes.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let command_line = display_command(program, args);
        debug!(command = %command_line, "Running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::CommandNotFound {
                        command: program.to_string(),
                        hint: get_install_hint(program),
                    }
                } else {
                    Error::Command {
                        command: command_line.clone(),
                        stderr: e.to_string(),
                    }
                }
            })?;

        // Pipes are drained while waiting so a chatty child cannot fill them and stall
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match self.timeout {
            Some(timeout) => {
                let start = Instant::now();
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) => {
                            if start.elapsed() >= timeout {
                                // Reap the child so it does not linger as a zombie
                                let _ = child.kill();
                                let _ = child.wait();
                                return Err(Error::CommandTimeout {
                                    command: command_line,
                                    seconds: timeout.as_secs(),
                                });
                            }
                            thread::sleep(Duration::from_millis(100));
                        }
                        Err(e) => {
                            return Err(Error::Command {
                                command: command_line,
                                stderr: e.to_string(),
                            });
                        }
                    }
                }
            }
            None => child.wait().map_err(|e| Error::Command {
                command: command_line.clone(),
                stderr: e.to_string(),
            })?,
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        debug!(command = %command_line, status = ?status.code(), "Command finished");

        Ok(CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

/// Read a child's pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn get_install_hint(command: &str) -> String {
    match command {
        "certbot" => "Install certbot: sudo apt install certbot".to_string(),
        "systemctl" => "systemd is required to reload nginx-sp, or set service_manager in the config"
            .to_string(),
        "service" => "Install the init scripts package or set service_manager in the config"
            .to_string(),
        _ => format!("Please install the '{}' command", command),
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Records every invocation and answers from a queue of scripted results
    /// matched by substring of the full command line. Unmatched commands succeed.
    #[derive(Default)]
    pub struct FakeRunner {
        pub calls: RefCell<Vec<String>>,
        rules: RefCell<Vec<(String, VecDeque<bool>)>>,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the next results for commands containing `pattern`.
        pub fn on(self, pattern: &str, results: &[bool]) -> Self {
            self.rules
                .borrow_mut()
                .push((pattern.to_string(), results.iter().copied().collect()));
            self
        }

        pub fn calls_matching(&self, pattern: &str) -> Vec<String> {
            self.calls
                .borrow()
                .iter()
                .filter(|c| c.contains(pattern))
                .cloned()
                .collect()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            let line = display_command(program, args);
            self.calls.borrow_mut().push(line.clone());

            let mut success = true;
            for (pattern, results) in self.rules.borrow_mut().iter_mut() {
                if line.contains(pattern.as_str()) {
                    if let Some(next) = results.pop_front() {
                        success = next;
                    }
                    break;
                }
            }

            Ok(CommandOutput {
                success,
                code: Some(if success { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if success {
                    String::new()
                } else {
                    format!("scripted failure: {}", line)
                },
            })
        }
    }
}
