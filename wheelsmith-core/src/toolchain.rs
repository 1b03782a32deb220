//! Compiler toolchain install and pin (made for wheelsmith)

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;

use crate::runner::CommandSpec;

pub const DEFAULT_INSTALLER_URL: &str = "https://sh.rustup.rs";
pub const DEFAULT_CHANNEL: &str = "nightly";
pub const DEFAULT_PINNED: &str = "nightly-2019-02-04";

/// Which toolchain to install and the exact dated build to pin it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toolchain {
    pub installer_url: String,
    pub channel: String,
    pub pinned: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            installer_url: DEFAULT_INSTALLER_URL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            pinned: DEFAULT_PINNED.to_string(),
        }
    }
}

impl Toolchain {
    /// The pin must name a dated build of the selected channel, e.g. `nightly-2019-02-04`.
    pub fn validate(&self) -> Result<()> {
        let pattern = format!(r"^{}-\d{{4}}-\d{{2}}-\d{{2}}$", regex::escape(&self.channel));
        let re = Regex::new(&pattern)?;
        if !re.is_match(&self.pinned) {
            return Err(anyhow!(
                "toolchain pin `{}` is not a dated `{}` build (expected {}-YYYY-MM-DD)",
                self.pinned,
                self.channel,
                self.channel
            ));
        }
        if !self.installer_url.starts_with("https://") {
            return Err(anyhow!(
                "toolchain installer must be fetched over https: {}",
                self.installer_url
            ));
        }
        Ok(())
    }

    /// Non-interactive installer run selecting the configured channel.
    pub fn install_command(&self, script: &Path) -> CommandSpec {
        CommandSpec::new("sh")
            .arg(script)
            .args(["-y", "--no-modify-path", "--default-toolchain"])
            .arg(&self.channel)
    }

    pub fn pin_command(&self) -> CommandSpec {
        CommandSpec::new("rustup").args(["default", self.pinned.as_str()])
    }
}

/// Directory holding `rustup`/`cargo` after install: `$CARGO_HOME/bin`, else `$HOME/.cargo/bin`.
pub fn cargo_bin_dir() -> Result<PathBuf> {
    if let Some(cargo_home) = env::var_os("CARGO_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(cargo_home).join("bin"));
    }
    let home = env::var_os("HOME")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| anyhow!("HOME is not set; cannot locate the installed toolchain"))?;
    Ok(cargo_bin_dir_in(Path::new(&home)))
}

pub fn cargo_bin_dir_in(home: &Path) -> PathBuf {
    home.join(".cargo").join("bin")
}

/// A downloaded installer script, kept on disk while the handle lives.
#[derive(Debug)]
pub struct InstallerScript {
    path: PathBuf,
    _file: Option<NamedTempFile>,
}

impl InstallerScript {
    /// A script that was never downloaded, used when commands are only planned.
    pub fn placeholder() -> Self {
        Self {
            path: PathBuf::from("rustup-init.sh"),
            _file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Source of the toolchain installer script.
pub trait InstallerFetch {
    fn fetch(&self, url: &str) -> Result<InstallerScript>;
}

/// Downloads the installer over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpFetch {
    timeout: Duration,
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

impl InstallerFetch for HttpFetch {
    fn fetch(&self, url: &str) -> Result<InstallerScript> {
        info!(url, "fetching toolchain installer");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .https_only(true)
            .build()
            .context("failed to build HTTP client")?;
        let body = client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.bytes())
            .with_context(|| format!("failed to download toolchain installer from {url}"))?;

        let mut file = tempfile::Builder::new()
            .prefix("rustup-init")
            .suffix(".sh")
            .tempfile()
            .context("failed to create installer temp file")?;
        file.write_all(&body)?;
        file.flush()?;

        Ok(InstallerScript {
            path: file.path().to_path_buf(),
            _file: Some(file),
        })
    }
}

/// Fetcher for dry runs: hands out a placeholder without touching the network.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFetch;

impl InstallerFetch for NoFetch {
    fn fetch(&self, _url: &str) -> Result<InstallerScript> {
        Ok(InstallerScript::placeholder())
    }
}
