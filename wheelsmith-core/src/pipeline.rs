//! The build run: toolchain, per-interpreter builds, wheel repair (made for wheelsmith)

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::BuildPlan;
use crate::discovery::{ArtifactDiscovery, DirDiscovery};
use crate::error::StepError;
use crate::interpreter::Interpreter;
use crate::runner::{CommandRunner, CommandSpec, RecordingRunner};
use crate::search_path::SearchPath;
use crate::toolchain::{cargo_bin_dir, InstallerFetch, NoFetch};
use crate::wheel::{WheelName, WHEEL_EXTENSION};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterBuild {
    pub tag: String,
    pub root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    #[serde(default)]
    pub wheel: Option<WheelName>,
    pub portable: bool,
}

/// What a build run did and what it left in the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Pinned toolchain, absent when the toolchain step was skipped.
    #[serde(default)]
    pub toolchain: Option<String>,
    pub interpreters: Vec<InterpreterBuild>,
    pub repaired: Vec<PathBuf>,
    pub artifacts: Vec<ArtifactSummary>,
}

impl BuildReport {
    pub fn portable_artifacts(&self) -> impl Iterator<Item = &ArtifactSummary> {
        self.artifacts.iter().filter(|a| a.portable)
    }

    /// Built interpreters with no portable wheel carrying their tag.
    pub fn interpreters_without_portable_artifact(&self) -> Vec<String> {
        self.interpreters
            .iter()
            .filter(|built| {
                !self.portable_artifacts().any(|a| {
                    a.wheel
                        .as_ref()
                        .is_some_and(|w| w.interpreter_tag() == built.tag)
                })
            })
            .map(|built| built.tag.clone())
            .collect()
    }
}

/// Summaries of every artifact currently in `dir`, in file-name order.
pub fn summarize_artifacts(dir: &Path) -> Result<Vec<ArtifactSummary>> {
    let found = DirDiscovery::new(dir).discover()?;
    Ok(found
        .into_iter()
        .map(|artifact| {
            let wheel = WheelName::from_path(&artifact.path).ok();
            let portable = wheel.as_ref().is_some_and(WheelName::is_portable);
            ArtifactSummary {
                path: artifact.path,
                wheel,
                portable,
            }
        })
        .collect())
}

/// One build run over a [`BuildPlan`].
///
/// The session owns the lookup path; every command receives it as `PATH`.
#[derive(Debug)]
pub struct BuildSession<'a, R, F> {
    plan: &'a BuildPlan,
    runner: R,
    fetch: F,
    path: SearchPath,
    cargo_bin: Option<PathBuf>,
    report: BuildReport,
}

impl<'a, R: CommandRunner, F: InstallerFetch> BuildSession<'a, R, F> {
    pub fn new(plan: &'a BuildPlan, runner: R, fetch: F) -> Self {
        Self {
            plan,
            runner,
            fetch,
            path: SearchPath::from_env(),
            cargo_bin: None,
            report: BuildReport::default(),
        }
    }

    /// Start from `path` instead of the process `PATH`.
    pub fn with_search_path(mut self, path: SearchPath) -> Self {
        self.path = path;
        self
    }

    /// Use `dir` as the toolchain bin directory instead of `$CARGO_HOME/bin` / `$HOME/.cargo/bin`.
    pub fn with_cargo_bin(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cargo_bin = Some(dir.into());
        self
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.path
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<BuildReport> {
        if self.plan.skip_toolchain {
            info!("skipping toolchain install");
        } else {
            self.install_toolchain()?;
            self.pin_toolchain()?;
        }
        self.build_all()?;
        self.repair_all()?;

        self.report.artifacts = summarize_artifacts(&self.plan.resolved_output_dir())?;
        Ok(self.report.clone())
    }

    /// Fetch and run the toolchain installer, then put its bin directory on the path.
    pub fn install_toolchain(&mut self) -> Result<()> {
        let plan = self.plan;
        let toolchain = &plan.toolchain;
        info!(channel = %toolchain.channel, "installing toolchain");

        let path = self.path.to_os_string()?;
        let mut attempt = 0;
        loop {
            let outcome = self.fetch.fetch(&toolchain.installer_url).and_then(|script| {
                let spec = toolchain.install_command(script.path()).env("PATH", &path);
                info!("{spec}");
                self.runner.run(&spec).map_err(anyhow::Error::from)
            });
            match outcome {
                Ok(()) => break,
                Err(err) if attempt < plan.retries => {
                    attempt += 1;
                    warn!(attempt, retries = plan.retries, "toolchain install failed: {err:#}");
                }
                Err(err) => return Err(err.context("toolchain install failed")),
            }
        }

        let bin = match &self.cargo_bin {
            Some(dir) => dir.clone(),
            None => cargo_bin_dir()?,
        };
        self.path.prepend(bin);
        Ok(())
    }

    /// Make the exact dated build the default toolchain.
    pub fn pin_toolchain(&mut self) -> Result<()> {
        let spec = self
            .plan
            .toolchain
            .pin_command()
            .env("PATH", self.path.to_os_string()?);
        run_step(&mut self.runner, &spec, 0).context("toolchain pin failed")?;
        self.report.toolchain = Some(self.plan.toolchain.pinned.clone());
        Ok(())
    }

    /// Build every configured interpreter in list order.
    pub fn build_all(&mut self) -> Result<()> {
        let plan = self.plan;
        for interp in &plan.interpreters {
            self.build_interpreter(interp)?;
        }
        Ok(())
    }

    /// Install packaging dependencies and build one wheel under `interp`.
    ///
    /// The interpreter's bin directory is on the path only for the duration of
    /// this call, failure included.
    pub fn build_interpreter(&mut self, interp: &Interpreter) -> Result<()> {
        let tag = interp.tag();
        info!(interpreter = %tag, "building");

        let scope = self.path.scoped(&interp.bin_dir());
        let path = scope.to_os_string()?;

        let install = install_command(self.plan, interp, &path);
        run_step(&mut self.runner, &install, self.plan.retries)
            .with_context(|| format!("dependency install failed for {tag}"))?;

        let build = build_command(self.plan, interp, &path);
        run_step(&mut self.runner, &build, 0)
            .with_context(|| format!("wheel build failed for {tag}"))?;

        drop(scope);
        self.report.interpreters.push(InterpreterBuild {
            tag,
            root: interp.root().to_path_buf(),
        });
        Ok(())
    }

    /// Repair every wheel present in the output directory, in file-name order.
    ///
    /// The set is fixed before the first repair runs, so wheels written by the
    /// repair tool are not picked up again. Wheels repaired before a failure stay.
    pub fn repair_all(&mut self) -> Result<()> {
        let out_dir = self.plan.resolved_output_dir();
        let artifacts = DirDiscovery::new(&out_dir).discover()?;
        info!(count = artifacts.len(), dir = %out_dir.display(), "repairing wheels");

        let path = self.path.to_os_string()?;
        for artifact in artifacts {
            let spec = repair_command(self.plan, &artifact.path, &out_dir, &path);
            run_step(&mut self.runner, &spec, 0)
                .with_context(|| format!("repair failed for {}", artifact.file_name()))?;
            self.report.repaired.push(artifact.path);
        }
        Ok(())
    }
}

fn run_step<R: CommandRunner>(
    runner: &mut R,
    spec: &CommandSpec,
    retries: u32,
) -> Result<(), StepError> {
    let mut attempt = 0;
    loop {
        info!("{spec}");
        match runner.run(spec) {
            Ok(()) => return Ok(()),
            Err(err) if attempt < retries => {
                attempt += 1;
                warn!(attempt, retries, "{err}; retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

/// `<bin>/pip install -U <requirements...>` in the project root.
pub fn install_command(plan: &BuildPlan, interp: &Interpreter, path: &OsString) -> CommandSpec {
    CommandSpec::new(interp.pip())
        .args(["install", "-U"])
        .args(plan.requirements.iter().map(ToString::to_string))
        .current_dir(&plan.project_root)
        .env("PATH", path)
}

/// `<bin>/python <entry point> <build command>` in the project root.
pub fn build_command(plan: &BuildPlan, interp: &Interpreter, path: &OsString) -> CommandSpec {
    CommandSpec::new(interp.python())
        .arg(&plan.build_entry_point)
        .args(plan.build_command.split_whitespace())
        .current_dir(&plan.project_root)
        .env("PATH", path)
        .env("PYTHON_SYS_EXECUTABLE", interp.python())
}

/// `<repair program> repair <wheel> -w <output dir>`.
pub fn repair_command(plan: &BuildPlan, wheel: &Path, out_dir: &Path, path: &OsString) -> CommandSpec {
    CommandSpec::new(&plan.repair_program)
        .arg("repair")
        .arg(wheel)
        .arg("-w")
        .arg(out_dir)
        .current_dir(&plan.project_root)
        .env("PATH", path)
}

/// Every command a build run would execute, without executing anything.
///
/// When the output directory does not exist yet, the repair step is shown once
/// with a `*.whl` pattern in place of concrete wheel paths.
pub fn plan_commands(plan: &BuildPlan, path: SearchPath) -> Result<Vec<CommandSpec>> {
    let mut session = BuildSession::new(plan, RecordingRunner::new(), NoFetch)
        .with_search_path(path)
        .with_cargo_bin(Path::new("$HOME").join(".cargo").join("bin"));

    if !plan.skip_toolchain {
        session.install_toolchain()?;
        session.pin_toolchain()?;
    }
    session.build_all()?;

    let out_dir = plan.resolved_output_dir();
    if out_dir.is_dir() {
        session.repair_all()?;
        return Ok(session.into_runner().into_commands());
    }

    let pattern = out_dir.join(format!("*.{WHEEL_EXTENSION}"));
    let path = session.search_path().to_os_string()?;
    let mut commands = session.into_runner().into_commands();
    commands.push(repair_command(plan, &pattern, &out_dir, &path));
    Ok(commands)
}
