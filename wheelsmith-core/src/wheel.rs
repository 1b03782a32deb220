//! Wheel file names (made for wheelsmith)
//!
//! `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const WHEEL_EXTENSION: &str = "whl";

/// Platform tag prefixes that mark a wheel as redistributable across hosts.
const PORTABLE_PLATFORMS: [&str; 3] = ["manylinux", "musllinux", "any"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelName {
    pub distribution: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
    pub python_tag: String,
    pub abi_tag: String,
    pub platform_tag: String,
}

fn wheel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?ix)^
            (?P<dist>[A-Za-z0-9_.]+)
            -(?P<ver>[A-Za-z0-9_.!+]+)
            (?:-(?P<build>\d[A-Za-z0-9_]*))?
            -(?P<py>[A-Za-z0-9_.]+)
            -(?P<abi>[A-Za-z0-9_.]+)
            -(?P<plat>[A-Za-z0-9_.]+)
            \.whl$",
        )
        .expect("wheel name pattern compiles")
    })
}

impl WheelName {
    pub fn parse(file_name: &str) -> Result<Self> {
        let caps = wheel_pattern()
            .captures(file_name)
            .ok_or_else(|| anyhow!("not a wheel file name: {file_name}"))?;

        let part = |name: &str| caps.name(name).map(|m| m.as_str().to_string());
        Ok(Self {
            distribution: part("dist").unwrap_or_default(),
            version: part("ver").unwrap_or_default(),
            build: part("build"),
            python_tag: part("py").unwrap_or_default(),
            abi_tag: part("abi").unwrap_or_default(),
            platform_tag: part("plat").unwrap_or_default(),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow!("not a wheel file name: {}", path.display()))?;
        Self::parse(name)
    }

    /// True when every platform in the (possibly compressed, `.`-joined) tag is portable.
    pub fn is_portable(&self) -> bool {
        self.platform_tag
            .split('.')
            .all(|plat| PORTABLE_PLATFORMS.iter().any(|p| plat.starts_with(p)))
    }

    /// `{python}-{abi}`, the interpreter part of the compatibility tag.
    pub fn interpreter_tag(&self) -> String {
        format!("{}-{}", self.python_tag, self.abi_tag)
    }
}

impl fmt::Display for WheelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.distribution, self.version)?;
        if let Some(build) = &self.build {
            write!(f, "-{build}")?;
        }
        write!(
            f,
            "-{}-{}-{}.{WHEEL_EXTENSION}",
            self.python_tag, self.abi_tag, self.platform_tag
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_specific_wheel() {
        let name = WheelName::parse("rusty_ext-0.4.1-cp36-cp36m-linux_x86_64.whl").expect("parse");
        assert_eq!(name.distribution, "rusty_ext");
        assert_eq!(name.version, "0.4.1");
        assert_eq!(name.build, None);
        assert_eq!(name.interpreter_tag(), "cp36-cp36m");
        assert!(!name.is_portable());
    }

    #[test]
    fn parses_build_tag_and_compressed_platforms() {
        let name = WheelName::parse(
            "rusty_ext-0.4.1-1-cp27-cp27mu-manylinux1_x86_64.manylinux2010_x86_64.whl",
        )
        .expect("parse");
        assert_eq!(name.build.as_deref(), Some("1"));
        assert!(name.is_portable());
    }

    #[test]
    fn rejects_non_wheels() {
        assert!(WheelName::parse("rusty_ext-0.4.1.tar.gz").is_err());
        assert!(WheelName::parse("rusty_ext-cp36-linux_x86_64.whl").is_err());
    }
}
