//! Build plan: every constant of a build run, with layered overrides (made for wheelsmith)

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{self, Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::interpreter::Interpreter;
use crate::toolchain::Toolchain;

pub const CONFIG_FILE_NAME: &str = "wheelsmith.toml";
pub const INTERPRETERS_ENV: &str = "WHEELSMITH_INTERPRETERS";
pub const PROJECT_ROOT_ENV: &str = "WHEELSMITH_PROJECT_ROOT";

/// A packaging dependency for `pip install -U`, optionally pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub pin: Option<String>,
}

impl Requirement {
    pub fn latest(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pin: None,
        }
    }

    pub fn pinned(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pin: Some(version.into()),
        }
    }

    /// Packaging dependencies of the manylinux recipe. `wheel` stays on 0.31.1:
    /// newer releases write metadata auditwheel cannot repair.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::latest("setuptools"),
            Self::pinned("wheel", "0.31.1"),
            Self::latest("setuptools-rust"),
        ]
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.pin {
            Some(version) => write!(f, "{}=={}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Requirement {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(anyhow!("invalid requirement: `{raw}`"));
        }
        match raw.split_once("==") {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => {
                Ok(Self::pinned(name, version))
            }
            Some(_) => Err(anyhow!("invalid pinned requirement: `{raw}`")),
            None => Ok(Self::latest(raw)),
        }
    }
}

impl Serialize for Requirement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Requirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Everything a build run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub toolchain: Toolchain,
    pub skip_toolchain: bool,
    pub project_root: PathBuf,
    pub interpreters: Vec<Interpreter>,
    pub requirements: Vec<Requirement>,
    pub build_entry_point: PathBuf,
    pub build_command: String,
    /// Relative paths resolve against `project_root`.
    pub output_dir: PathBuf,
    pub repair_program: PathBuf,
    /// Extra attempts for the network-bound steps (installer, dependency install).
    pub retries: u32,
}

impl Default for BuildPlan {
    fn default() -> Self {
        Self {
            toolchain: Toolchain::default(),
            skip_toolchain: false,
            project_root: PathBuf::from("/io"),
            interpreters: Interpreter::defaults(),
            requirements: Requirement::defaults(),
            build_entry_point: PathBuf::from("setup.py"),
            build_command: "bdist_wheel".to_string(),
            output_dir: PathBuf::from("dist"),
            repair_program: PathBuf::from("auditwheel"),
            retries: 0,
        }
    }
}

/// On-disk form of a plan; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    pub toolchain: Option<Toolchain>,
    pub skip_toolchain: Option<bool>,
    pub project_root: Option<PathBuf>,
    pub interpreters: Option<Vec<PathBuf>>,
    pub requirements: Option<Vec<Requirement>>,
    pub build_entry_point: Option<PathBuf>,
    pub build_command: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub repair_program: Option<PathBuf>,
    pub retries: Option<u32>,
}

impl PlanFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid plan file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read plan file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }
}

impl BuildPlan {
    /// Overlay the keys present in `file`.
    pub fn apply_file(&mut self, file: PlanFile) {
        if let Some(toolchain) = file.toolchain {
            self.toolchain = toolchain;
        }
        if let Some(skip) = file.skip_toolchain {
            self.skip_toolchain = skip;
        }
        if let Some(root) = file.project_root {
            self.project_root = root;
        }
        if let Some(roots) = file.interpreters {
            self.interpreters = roots.into_iter().map(Interpreter::new).collect();
        }
        if let Some(reqs) = file.requirements {
            self.requirements = reqs;
        }
        if let Some(entry) = file.build_entry_point {
            self.build_entry_point = entry;
        }
        if let Some(cmd) = file.build_command {
            self.build_command = cmd;
        }
        if let Some(dir) = file.output_dir {
            self.output_dir = dir;
        }
        if let Some(program) = file.repair_program {
            self.repair_program = program;
        }
        if let Some(retries) = file.retries {
            self.retries = retries;
        }
    }

    /// Apply `WHEELSMITH_PROJECT_ROOT` and `WHEELSMITH_INTERPRETERS` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(root) = project_root_override(env::var_os(PROJECT_ROOT_ENV)) {
            self.project_root = root;
        }
        if let Ok(raw) = env::var(INTERPRETERS_ENV) {
            self.interpreters = interpreters_from_list(&raw)?;
        }
        Ok(())
    }

    /// Output directory with relative paths resolved against the project root.
    pub fn resolved_output_dir(&self) -> PathBuf {
        if self.output_dir.is_absolute() {
            self.output_dir.clone()
        } else {
            self.project_root.join(&self.output_dir)
        }
    }

    /// Resolve a relative project root and interpreter roots against the current directory.
    ///
    /// Commands run inside the project root, so paths handed to them must not be relative.
    pub fn make_absolute(&mut self) -> Result<()> {
        self.project_root = path::absolute(&self.project_root).with_context(|| {
            format!("cannot resolve project root {}", self.project_root.display())
        })?;
        self.interpreters = self
            .interpreters
            .iter()
            .map(|interp| {
                path::absolute(interp.root())
                    .map(Interpreter::new)
                    .with_context(|| {
                        format!("cannot resolve interpreter root {}", interp.root().display())
                    })
            })
            .collect::<Result<_>>()?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.skip_toolchain {
            self.toolchain.validate()?;
        }
        if self.interpreters.is_empty() {
            return Err(anyhow!("no interpreters configured"));
        }
        if self.requirements.is_empty() {
            return Err(anyhow!("no packaging requirements configured"));
        }
        for req in &self.requirements {
            req.to_string().parse::<Requirement>()?;
        }
        if self.build_command.trim().is_empty() {
            return Err(anyhow!("build command must not be empty"));
        }
        Ok(())
    }
}

/// Project root named by a `WHEELSMITH_PROJECT_ROOT` value; empty means unset.
pub fn project_root_override(raw: Option<OsString>) -> Option<PathBuf> {
    raw.filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Parse a `:`/`;` separated list of interpreter roots, keeping the ones that exist.
pub fn interpreters_from_list(raw: &str) -> Result<Vec<Interpreter>> {
    let roots: Vec<Interpreter> = raw
        .split([':', ';'])
        .filter(|s| !s.is_empty())
        .map(Interpreter::new)
        .filter(|i| i.root().exists())
        .collect();

    if roots.is_empty() {
        Err(anyhow!("{INTERPRETERS_ENV} is set but no paths exist"))
    } else {
        Ok(roots)
    }
}

/// Plan file to read: the explicit path, else `<project root>/wheelsmith.toml` when present.
pub fn locate_plan_file(explicit: Option<&Path>, project_root: &Path) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let candidate = project_root.join(CONFIG_FILE_NAME);
    candidate.is_file().then_some(candidate)
}
