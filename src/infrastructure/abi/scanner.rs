//! Artifact scanner - locates compiled artifacts by contract name

use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Artifact file scanner
pub struct ArtifactScanner;

impl ArtifactScanner {
    /// Resolve an artifact reference: an existing `.json` path or a contract name
    pub fn resolve(reference: &str, roots: &[PathBuf]) -> Result<PathBuf> {
        let as_path = Path::new(reference);
        if as_path.extension().and_then(|s| s.to_str()) == Some("json") {
            if as_path.is_file() {
                return Ok(as_path.to_path_buf());
            }
            for root in roots {
                let candidate = root.join(as_path);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
            bail!("artifact file {reference} not found");
        }

        let found = Self::find(reference, roots);
        match found.len() {
            0 => bail!(
                "no artifact named {reference} under {}",
                display_roots(roots)
            ),
            1 => Ok(found[0].clone()),
            _ => bail!(
                "artifact name {reference} is ambiguous: {}",
                found
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// All `<name>.json` files in `out/` or `artifacts/` trees under `roots`
    pub fn find(name: &str, roots: &[PathBuf]) -> Vec<PathBuf> {
        let file_name = format!("{name}.json");
        let mut found = Vec::new();

        for root in roots {
            for entry in WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| !Self::is_ignored_dir(e.path()))
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_str() != Some(file_name.as_str()) {
                    continue;
                }
                let path = entry.path();
                let relative = path.strip_prefix(root).unwrap_or(path);
                if !Self::path_contains_any(relative, &["out", "artifacts"]) {
                    continue;
                }
                if Self::path_contains_any(relative, &["build-info"]) {
                    continue;
                }
                debug!(path = %path.display(), "artifact candidate");
                found.push(path.to_path_buf());
            }
        }

        found.sort();
        found.dedup();
        found
    }

    /// Check if a path should be ignored
    fn is_ignored_dir(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| {
                matches!(
                    name,
                    ".git" | "target" | "node_modules" | "cache" | "dist"
                )
            })
            .unwrap_or(false)
    }

    /// Check if path contains any of the given names
    fn path_contains_any(path: &Path, names: &[&str]) -> bool {
        path.components().any(|component| {
            if let Component::Normal(value) = component {
                if let Some(value) = value.to_str() {
                    return names.iter().any(|name| *name == value);
                }
            }
            false
        })
    }
}

fn display_roots(roots: &[PathBuf]) -> String {
    if roots.is_empty() {
        return "(no artifact roots configured)".to_string();
    }
    roots
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
