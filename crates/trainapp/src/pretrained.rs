//! Resolution of pretrained weight locations.
//!
//! Resolution only checks that the file exists; nothing is downloaded or
//! cached.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppError, Result};

/// Resolve the local path of a pretrained weights file.
///
/// An `explicit` path wins and is resolved against the current working
/// directory. Otherwise the app's declared `location` is used: relative
/// locations resolve against `asset_dir`, and URL locations (`scheme://...`)
/// resolve to their final path segment inside `asset_dir`.
pub fn resolve_pretrained(
    app_name: &str,
    explicit: Option<&Path>,
    location: Option<&str>,
    asset_dir: &Path,
) -> Result<PathBuf> {
    let path = match explicit {
        Some(path) => absolute(path)?,
        None => {
            let location = location.ok_or_else(|| {
                AppError::FileNotFound(format!(
                    "{app_name} declares no pretrained location; pass --pretrained"
                ))
            })?;
            let relative = match url_file_name(location) {
                Some(name) => PathBuf::from(name),
                None => PathBuf::from(location),
            };
            if relative.is_absolute() {
                relative
            } else {
                absolute(&asset_dir.join(relative))?
            }
        }
    };

    debug!(path = %path.display(), "resolved pretrained path");
    if path.is_file() {
        Ok(path)
    } else {
        Err(AppError::FileNotFound(path.display().to_string()))
    }
}

/// The final path segment of a URL, or `None` if `location` is not a URL.
fn url_file_name(location: &str) -> Option<&str> {
    let (scheme, rest) = location.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
        return None;
    }
    let path = rest.split(['?', '#']).next().unwrap_or(rest);
    path.rsplit('/').find(|s| !s.is_empty())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
