//! Interpreter installations (made for wheelsmith)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Installation roots used when nothing else is configured (manylinux image layout).
pub const DEFAULT_INTERPRETERS: [&str; 4] = [
    "/opt/python/cp27-cp27m",
    "/opt/python/cp27-cp27mu",
    "/opt/python/cp35-cp35m",
    "/opt/python/cp36-cp36m",
];

/// One self-contained interpreter installation: a root holding a `bin/` directory
/// with `python` and `pip`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interpreter {
    root: PathBuf,
}

impl Interpreter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn defaults() -> Vec<Self> {
        DEFAULT_INTERPRETERS.iter().copied().map(Self::new).collect()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn python(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    pub fn pip(&self) -> PathBuf {
        self.bin_dir().join("pip")
    }

    /// Short label, the root's directory name (`cp36-cp36m`).
    pub fn tag(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }

    pub fn exists(&self) -> bool {
        self.python().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_executables_from_root() {
        let interp = Interpreter::new("/opt/python/cp35-cp35m");
        assert_eq!(interp.bin_dir(), PathBuf::from("/opt/python/cp35-cp35m/bin"));
        assert_eq!(
            interp.pip(),
            PathBuf::from("/opt/python/cp35-cp35m/bin/pip")
        );
        assert_eq!(interp.tag(), "cp35-cp35m");
    }

    #[test]
    fn defaults_cover_four_interpreters() {
        let tags: Vec<String> = Interpreter::defaults().iter().map(Interpreter::tag).collect();
        assert_eq!(
            tags,
            vec!["cp27-cp27m", "cp27-cp27mu", "cp35-cp35m", "cp36-cp36m"]
        );
    }
}
