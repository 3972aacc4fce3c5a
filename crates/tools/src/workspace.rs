//! Workspace confinement for the file and command tools.
//!
//! Every path a tool touches must resolve inside the workspace root.
//! Relative paths are joined to the root; `..` components are rejected
//! outright, and the nearest existing ancestor is canonicalized so a
//! symlink cannot point the tool outside.

use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` against the root, refusing anything that escapes it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        if path.trim().is_empty() {
            return Err("path must not be empty".into());
        }
        let input = Path::new(path);
        if input.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(format!("path traversal is not allowed: {path}"));
        }

        let full = if input.is_absolute() {
            input.to_path_buf()
        } else {
            self.root.join(input)
        };

        if !canonical_prefix(&full).starts_with(&self.root) {
            return Err(format!(
                "{path} is outside the workspace {}",
                self.root.display()
            ));
        }
        Ok(full)
    }
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
fn canonical_prefix(path: &Path) -> PathBuf {
    let mut existing = path.to_path_buf();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
    let mut resolved = existing.canonicalize().unwrap_or(existing);
    for name in rest.into_iter().rev() {
        resolved.push(name);
    }
    resolved
}
