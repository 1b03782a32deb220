//! External command execution (made for wheelsmith)
//!
//! Every side effect of a build run goes through a [`CommandRunner`]. The
//! system runner spawns real processes; the recording runner backs dry runs
//! and tests.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use serde::{Deserialize, Serialize};

use crate::error::StepError;

/// One external invocation: program, arguments, working directory and
/// environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: PathBuf,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(String, OsString)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        let key = key.into();
        self.env.retain(|(k, _)| *k != key);
        self.env.push((key, value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn get_env(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// Lossy argv (program first), for display and JSON output.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect()
    }

    /// Serializable view of the invocation.
    pub fn to_record(&self) -> CommandRecord {
        CommandRecord {
            argv: self.argv(),
            cwd: self.cwd.clone(),
            env: self
                .env
                .iter()
                .filter(|(k, _)| k != "PATH")
                .map(|(k, v)| (k.clone(), v.to_string_lossy().into_owned()))
                .collect(),
        }
    }
}

/// Shell-style echo line, `+ prog arg ...`.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("+")?;
        for word in self.argv() {
            write!(f, " {}", shell_quote(&word))?;
        }
        Ok(())
    }
}

fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// JSON form of a [`CommandSpec`]; `PATH` is left out since it repeats the host path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub argv: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<(String, String)>,
}

/// Executes commands on behalf of a build run.
pub trait CommandRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<(), StepError>;
}

/// Spawns real processes with inherited stdio and waits for each to exit.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<(), StepError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let status = cmd.status().map_err(|source| StepError::Spawn {
            command: spec.to_string(),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(StepError::Failed {
                command: spec.to_string(),
                code: exit_code(status),
            })
        }
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

enum FailRule {
    At { index: usize, code: i32 },
    Matching { needle: String, code: i32 },
}

type Hook = Box<dyn FnMut(&CommandSpec)>;

/// Records commands instead of running them.
///
/// A failure rule makes one recorded command report a non-zero exit, and a
/// hook can simulate the side effects of successful commands.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Vec<CommandSpec>,
    fail: Option<FailRule>,
    hook: Option<Hook>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the command at zero-based position `index` with `code`.
    pub fn fail_at(mut self, index: usize, code: i32) -> Self {
        self.fail = Some(FailRule::At { index, code });
        self
    }

    /// Fail the first command whose echo line contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, code: i32) -> Self {
        self.fail = Some(FailRule::Matching {
            needle: needle.into(),
            code,
        });
        self
    }

    pub fn with_hook(mut self, hook: impl FnMut(&CommandSpec) + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<CommandSpec> {
        self.commands
    }

    fn failure_for(&mut self, index: usize, echo: &str) -> Option<i32> {
        let code = match &self.fail {
            Some(FailRule::At { index: at, code }) if *at == index => *code,
            Some(FailRule::Matching { needle, code }) if echo.contains(needle.as_str()) => *code,
            _ => return None,
        };
        self.fail = None;
        Some(code)
    }
}

impl fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("commands", &self.commands)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&mut self, spec: &CommandSpec) -> Result<(), StepError> {
        let index = self.commands.len();
        let echo = spec.to_string();
        self.commands.push(spec.clone());

        if let Some(code) = self.failure_for(index, &echo) {
            return Err(StepError::Failed {
                command: echo,
                code,
            });
        }

        if let Some(hook) = self.hook.as_mut() {
            hook(spec);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_quotes_only_when_needed() {
        let spec = CommandSpec::new("/opt/python/cp36-cp36m/bin/pip")
            .args(["install", "-U", "wheel==0.31.1", "two words"]);
        assert_eq!(
            spec.to_string(),
            "+ /opt/python/cp36-cp36m/bin/pip install -U wheel==0.31.1 'two words'"
        );
    }

    #[test]
    fn env_override_replaces_previous_value() {
        let spec = CommandSpec::new("python").env("PATH", "/a").env("PATH", "/b");
        assert_eq!(spec.get_env("PATH"), Some(OsStr::new("/b")));
        assert!(spec.to_record().env.is_empty());
    }

    #[test]
    fn recording_runner_fails_once_at_index() {
        let mut runner = RecordingRunner::new().fail_at(1, 9);
        assert!(runner.run(&CommandSpec::new("a")).is_ok());
        let err = runner.run(&CommandSpec::new("b")).expect_err("second fails");
        assert_eq!(err.exit_code(), 9);
        assert!(runner.run(&CommandSpec::new("c")).is_ok());
        assert_eq!(runner.commands().len(), 3);
    }

    #[test]
    fn recording_runner_matches_on_echo() {
        let mut runner = RecordingRunner::new().fail_when("auditwheel", 2);
        assert!(runner.run(&CommandSpec::new("pip")).is_ok());
        assert!(runner
            .run(&CommandSpec::new("auditwheel").arg("repair"))
            .is_err());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_code() {
        let mut runner = SystemRunner;
        let ok = CommandSpec::new("sh").args(["-c", "exit 0"]);
        assert!(runner.run(&ok).is_ok());

        let failing = CommandSpec::new("sh").args(["-c", "exit 42"]);
        let err = runner.run(&failing).expect_err("non-zero exit");
        assert_eq!(err.exit_code(), 42);
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_missing_program() {
        let mut runner = SystemRunner;
        let spec = CommandSpec::new("/nonexistent/wheelsmith/bin/pip");
        let err = runner.run(&spec).expect_err("spawn fails");
        assert!(matches!(err, StepError::Spawn { .. }));
        assert_eq!(err.exit_code(), 127);
    }
}
