//! Session-owned executable lookup path (made for wheelsmith)
//!
//! The process environment is never touched. A [`SearchPath`] is read once from
//! `PATH`, edited in memory, and handed to every spawned command as an explicit
//! `PATH` override.

use std::env;
use std::ffi::{OsStr, OsString};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Current value of the process `PATH`; empty when unset.
    pub fn from_env() -> Self {
        env::var_os("PATH")
            .map(|raw| Self::parse(&raw))
            .unwrap_or_default()
    }

    pub fn parse(raw: &OsStr) -> Self {
        Self::new(env::split_paths(raw).filter(|p| !p.as_os_str().is_empty()))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn prepend(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.insert(0, dir.into());
    }

    /// Render as a `PATH` value.
    pub fn to_os_string(&self) -> Result<OsString> {
        env::join_paths(&self.dirs).context("search path entry contains a path separator")
    }

    /// Prepend `dir` until the returned guard is dropped.
    pub fn scoped(&mut self, dir: &Path) -> PathScope<'_> {
        let saved = self.dirs.clone();
        self.prepend(dir);
        debug!(dir = %dir.display(), "search path scope opened");
        PathScope { path: self, saved }
    }
}

/// Restores the saved search path on drop, including on early `?` returns.
#[derive(Debug)]
pub struct PathScope<'a> {
    path: &'a mut SearchPath,
    saved: Vec<PathBuf>,
}

impl Deref for PathScope<'_> {
    type Target = SearchPath;

    fn deref(&self) -> &SearchPath {
        self.path
    }
}

impl DerefMut for PathScope<'_> {
    fn deref_mut(&mut self) -> &mut SearchPath {
        self.path
    }
}

impl Drop for PathScope<'_> {
    fn drop(&mut self) {
        self.path.dirs = std::mem::take(&mut self.saved);
        debug!("search path scope restored");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_entries() {
        let raw = env::join_paths(["/usr/bin", "", "/bin"]).expect("join");
        let path = SearchPath::parse(&raw);
        assert_eq!(
            path.dirs(),
            &[PathBuf::from("/usr/bin"), PathBuf::from("/bin")]
        );
    }

    #[test]
    fn scope_prepends_then_restores() {
        let mut path = SearchPath::new(["/usr/bin", "/bin"]);
        let before = path.clone();

        {
            let scope = path.scoped(Path::new("/opt/python/cp36-cp36m/bin"));
            assert_eq!(
                scope.dirs().first(),
                Some(&PathBuf::from("/opt/python/cp36-cp36m/bin"))
            );
            assert_eq!(scope.dirs().len(), 3);
        }

        assert_eq!(path, before);
    }

    #[test]
    fn nested_edits_inside_scope_are_discarded() {
        let mut path = SearchPath::new(["/bin"]);
        {
            let mut scope = path.scoped(Path::new("/a"));
            scope.prepend("/b");
        }
        assert_eq!(path, SearchPath::new(["/bin"]));
    }

    #[test]
    fn scope_restores_on_error_return() {
        fn failing(path: &mut SearchPath) -> Result<()> {
            let _scope = path.scoped(Path::new("/opt/python/cp27-cp27m/bin"));
            anyhow::bail!("pip failed");
        }

        let mut path = SearchPath::new(["/usr/bin"]);
        assert!(failing(&mut path).is_err());
        assert_eq!(path, SearchPath::new(["/usr/bin"]));
    }

    #[test]
    fn renders_back_to_path_value() {
        let path = SearchPath::new(["/a", "/b"]);
        let rendered = path.to_os_string().expect("join");
        assert_eq!(SearchPath::parse(&rendered), path);
    }
}
