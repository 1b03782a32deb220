//! Artifact and interpreter discovery (made for wheelsmith)

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use walkdir::WalkDir;

use crate::interpreter::Interpreter;
use crate::wheel::WHEEL_EXTENSION;

/// Path to a packaging artifact in the output directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArtifactRef {
    pub path: PathBuf,
}

impl ArtifactRef {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Trait for enumerating artifacts from some backing store.
pub trait ArtifactDiscovery {
    fn discover(&self) -> Result<Vec<ArtifactRef>>;
}

/// Flat listing of one directory, keeping files with the artifact extension.
#[derive(Debug, Clone)]
pub struct DirDiscovery {
    dir: PathBuf,
    extension: String,
}

impl DirDiscovery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: WHEEL_EXTENSION.to_string(),
        }
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }
}

impl ArtifactDiscovery for DirDiscovery {
    fn discover(&self) -> Result<Vec<ArtifactRef>> {
        if !self.dir.is_dir() {
            return Err(anyhow!(
                "output directory does not exist: {}",
                self.dir.display()
            ));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry?;
            if entry.file_type().is_file() && has_extension(entry.path(), &self.extension) {
                found.push(ArtifactRef {
                    path: entry.path().to_path_buf(),
                });
            }
        }

        found.sort();
        Ok(found)
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.eq_ignore_ascii_case(wanted),
        None => false,
    }
}

/// Every `<prefix>/<name>` holding a `bin/python`, sorted by path.
pub fn discover_interpreters(prefix: &Path) -> Result<Vec<Interpreter>> {
    if !prefix.is_dir() {
        return Err(anyhow!(
            "interpreter prefix does not exist: {}",
            prefix.display()
        ));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(prefix)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let interp = Interpreter::new(entry.path());
        if interp.exists() {
            found.push(interp);
        }
    }

    found.sort_by(|a, b| a.root().cmp(b.root()));
    Ok(found)
}
