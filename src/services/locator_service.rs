//! src/services/locator_service.rs
//!
//! Expands upload patterns into the concrete list of files to push.

use crate::{
    config::{Packaging, SyncConfig},
    errors::{SyncError, SyncResult},
    models::object::LocatedFile,
};
use glob::{MatchOptions, Pattern};
use std::{
    io,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info};

/// Directory under the asset root whose layout mirrors the bucket.
const PUBLIC_DIR: &str = "public";
const GZIP_EXTENSION: &str = "gz";

/// Finds asset files under a project root.
#[derive(Clone, Debug)]
pub struct AssetLocator {
    root: PathBuf,
    packaging: Packaging,
    package_path: String,
}

impl AssetLocator {
    pub fn new(root: impl Into<PathBuf>, packaging: Packaging, package_path: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            packaging,
            package_path: package_path.into(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(&config.asset_root, config.packaging, &config.package_path)
    }

    /// Patterns searched for every run, before any caller-supplied ones.
    ///
    /// Gzip packaging pushes only `*.gz` packages; raw packaging pushes the
    /// css and js. Images are always included.
    pub fn default_patterns(&self) -> Vec<String> {
        let package_dir = format!("{}/{}", PUBLIC_DIR, self.package_path);
        let mut patterns = match self.packaging {
            Packaging::Gzip => vec![format!("{}/**/*.gz", package_dir)],
            Packaging::Raw => vec![
                format!("{}/**/*.css", package_dir),
                format!("{}/**/*.js", package_dir),
            ],
        };
        patterns.push(format!("{}/images/**/*", PUBLIC_DIR));
        patterns
    }

    /// Expand the default patterns followed by `extra_patterns`, in order.
    ///
    /// Files matched by more than one pattern are returned once per match.
    pub fn locate(&self, extra_patterns: &[String]) -> SyncResult<Vec<LocatedFile>> {
        let root = self
            .root
            .canonicalize()
            .map_err(|err| SyncError::local_read(&self.root, err))?;

        let mut patterns = self.default_patterns();
        patterns.extend(extra_patterns.iter().cloned());

        let mut located = Vec::new();
        for pattern in &patterns {
            info!("Pushing files from {}", pattern);
            located.extend(self.expand(&root, pattern)?);
        }
        Ok(located)
    }

    fn expand(&self, root: &Path, pattern: &str) -> SyncResult<Vec<LocatedFile>> {
        let full_pattern = format!(
            "{}/{}",
            Pattern::escape(&root.to_string_lossy()),
            pattern.trim_start_matches('/')
        );
        debug!("expanding {}", full_pattern);

        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        let paths = glob::glob_with(&full_pattern, options).map_err(|source| SyncError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
        let dotted = dotted_components(pattern);

        let mut located = Vec::new();
        for entry in paths {
            let path = entry.map_err(|err| {
                let path = err.path().to_path_buf();
                SyncError::local_read(path, io::Error::from(err))
            })?;
            if path.is_dir() {
                continue;
            }
            let relative = match path.strip_prefix(root) {
                Ok(relative) if relative.components().all(|c| matches!(c, Component::Normal(_))) => {
                    relative
                }
                _ => {
                    return Err(SyncError::OutsideRoot {
                        pattern: pattern.to_string(),
                        path: path.clone(),
                    });
                }
            };
            if !hidden_components_allowed(relative, &dotted) {
                debug!("skipping hidden {}", path.display());
                continue;
            }
            located.push(locate_file(root, path));
        }
        Ok(located)
    }
}

/// Pattern components that spell a leading dot, e.g. `.*` or `.well-known`.
fn dotted_components(pattern: &str) -> Vec<Pattern> {
    pattern
        .split('/')
        .filter(|component| component.starts_with('.') && *component != "." && *component != "..")
        .filter_map(|component| Pattern::new(component).ok())
        .collect()
}

/// A dot-leading path component is only kept when a dotted pattern component
/// matches it, so `*` and `**` never pull in hidden entries.
fn hidden_components_allowed(relative: &Path, dotted: &[Pattern]) -> bool {
    relative.components().all(|component| {
        let name = component.as_os_str().to_string_lossy();
        !name.starts_with('.') || dotted.iter().any(|pattern| pattern.matches(&name))
    })
}

/// Compute the remote key for `path`: relative to `root/public/` (or to
/// `root` for files outside it), with a trailing `.gz` stripped and flagged.
/// `path` must lie below `root`.
fn locate_file(root: &Path, path: PathBuf) -> LocatedFile {
    let public = root.join(PUBLIC_DIR);
    let relative = path
        .strip_prefix(&public)
        .or_else(|_| path.strip_prefix(root))
        .unwrap_or(path.as_path());

    let mut remote_key = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let gzip = path.extension().is_some_and(|ext| ext == GZIP_EXTENSION);
    if gzip {
        remote_key.truncate(remote_key.len() - (GZIP_EXTENSION.len() + 1));
    }

    LocatedFile {
        local_path: path,
        remote_key,
        gzip,
    }
}
