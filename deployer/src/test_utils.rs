//! Shared test utilities for the deployer crate.

use crate::deps::{CommandExecutor, command_line};
use crate::error::Result;
use crate::probe::{HttpProber, ProbeError};
use crate::prompt::OperatorPrompt;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A `CommandExecutor` that succeeds unless told otherwise.
///
/// Every invocation is recorded as a command line such as
/// `systemctl restart nginx`, so scenarios can assert on what ran and what
/// did not.
#[derive(Debug, Default)]
pub struct StubExecutor {
    failures: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl StubExecutor {
    /// Creates an executor on which every command succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `command` fail with `stderr`.
    #[must_use]
    pub fn fail_on(mut self, command: &str, stderr: &str) -> Self {
        self.failures.insert(command.to_owned(), stderr.to_owned());
        self
    }

    /// Command lines invoked so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Returns `true` if `command` was invoked.
    #[must_use]
    pub fn was_invoked(&self, command: &str) -> bool {
        self.calls.borrow().iter().any(|call| call == command)
    }
}

impl CommandExecutor for StubExecutor {
    fn run<'a>(&self, cmd: &str, args: &'a [&'a str]) -> Result<Output> {
        let line = command_line(cmd, args);
        let output = match self.failures.get(&line) {
            Some(stderr) => failure_output(stderr),
            None => success_output(),
        };
        self.calls.borrow_mut().push(line);
        Ok(output)
    }
}

/// An `HttpProber` answering 200 unless a URL is scripted otherwise.
#[derive(Debug, Default)]
pub struct StubProber {
    responses: HashMap<String, std::result::Result<u16, ProbeError>>,
    requested: RefCell<Vec<String>>,
}

impl StubProber {
    /// Creates a prober on which every URL answers 200.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `url` unreachable.
    #[must_use]
    pub fn unreachable(mut self, url: &str) -> Self {
        self.responses.insert(
            url.to_owned(),
            Err(ProbeError::Unreachable {
                url: url.to_owned(),
                reason: "connection refused".to_owned(),
            }),
        );
        self
    }

    /// URLs requested so far, in order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl HttpProber for StubProber {
    fn probe(&self, url: &str) -> std::result::Result<u16, ProbeError> {
        self.requested.borrow_mut().push(url.to_owned());
        self.responses.get(url).cloned().unwrap_or(Ok(200))
    }
}

/// An `OperatorPrompt` that returns a fixed answer and remembers being asked.
#[derive(Debug)]
pub struct ScriptedPrompt {
    answer: bool,
    asked: Cell<bool>,
}

impl ScriptedPrompt {
    /// Creates a prompt that always answers `answer`.
    #[must_use]
    pub const fn answering(answer: bool) -> Self {
        Self {
            answer,
            asked: Cell::new(false),
        }
    }

    /// Returns `true` if the operator was asked anything.
    #[must_use]
    pub fn was_asked(&self) -> bool {
        self.asked.get()
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn confirm(&self, _question: &str) -> Result<bool> {
        self.asked.set(true);
        Ok(self.answer)
    }
}
