//! Path confinement for the filesystem tool servers.

use std::path::{Component, Path, PathBuf};

use crate::domain::errors::ToolError;

/// Resolves user-supplied paths against a root and refuses anything that
/// would leave it.
///
/// `..` is folded lexically before the check, and the nearest existing
/// ancestor is canonicalized so a symlink inside the root cannot point the
/// tool somewhere else.
#[derive(Debug, Clone)]
pub struct PathJail {
    root: PathBuf,
    canonical_root: PathBuf,
    outside_message: String,
    home_alias: bool,
}

impl PathJail {
    pub fn new(root: impl Into<PathBuf>, outside_message: impl Into<String>) -> Self {
        let root = normalize(&root.into()).unwrap_or_default();
        let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());
        Self {
            root,
            canonical_root,
            outside_message: outside_message.into(),
            home_alias: false,
        }
    }

    /// Treat `~` and `~/...` as the root.
    pub fn with_home_alias(mut self) -> Self {
        self.home_alias = true;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `raw` to an absolute path inside the root.
    ///
    /// With the home alias, absolute paths are taken as-is and relative ones
    /// are joined to the root. Without it every path is relative to the root
    /// and leading slashes are ignored.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, ToolError> {
        let raw = raw.trim();
        let joined = if self.home_alias {
            if raw.is_empty() || raw == "~" {
                self.root.clone()
            } else if let Some(rest) = raw.strip_prefix("~/") {
                self.root.join(rest)
            } else if Path::new(raw).is_absolute() {
                PathBuf::from(raw)
            } else {
                self.root.join(raw)
            }
        } else {
            self.root.join(raw.trim_start_matches('/'))
        };

        let resolved = normalize(&joined).ok_or_else(|| self.outside())?;
        if !resolved.starts_with(&self.root) {
            return Err(self.outside());
        }

        if let Some(canonical) = canonical_ancestor(&resolved) {
            if !canonical.starts_with(&self.canonical_root) {
                return Err(self.outside());
            }
        }

        Ok(resolved)
    }

    /// Whether `path` is the root itself
    pub fn is_root(&self, path: &Path) -> bool {
        path == self.root
    }

    fn outside(&self) -> ToolError {
        ToolError::PathOutsideRoot(self.outside_message.clone())
    }
}

/// Fold `.` and `..` without touching the filesystem. `None` when `..`
/// climbs above the filesystem root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }
    Some(out)
}

/// Canonical form of the closest ancestor of `path` that exists
fn canonical_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .find(|p| p.symlink_metadata().is_ok())
        .and_then(|p| p.canonicalize().ok())
}
