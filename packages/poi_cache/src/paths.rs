#![allow(clippy::module_name_repetitions)]
//! Default file locations for the OSM extract and the POI cache.
//!
//! All paths are relative to the project root's `data/` directory.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/osm/` directory for bulk extracts.
#[must_use]
pub fn osm_dir() -> PathBuf {
    data_dir().join("osm")
}

/// Returns the `data/cache/` directory for built caches.
#[must_use]
pub fn cache_dir() -> PathBuf {
    data_dir().join("cache")
}

/// Returns the default bulk extract path.
#[must_use]
pub fn default_extract_path() -> PathBuf {
    osm_dir().join("italy-latest.osm.pbf")
}

/// Returns the default POI cache path.
#[must_use]
pub fn default_cache_path() -> PathBuf {
    cache_dir().join("pois_highway.parquet")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Renders a path for use inside a single-quoted SQL string literal.
#[must_use]
pub fn sql_literal(path: &Path) -> String {
    path.display().to_string().replace('\'', "''")
}
