//! Locating the worker jar.
//!
//! The jar can come from, in order of preference:
//! 1. the embedded copy, when `worker.embedded` is set and the crate was built
//!    with the `embedded-worker` feature
//! 2. the configured `worker.artifact` path
//! 3. the `TIKA_SERVER_JAR` environment variable
//! 4. conventional locations relative to the working directory
//!    (`tika-server-<version>.jar`, `lib/…`, `target/resources/…`)
//! 5. the embedded copy, as a last resort
//!
//! # Build Requirements
//!
//! To embed the jar, point `ISOTIKA_EMBED_JAR` at it (or place it at
//! `resources/tika-server.jar`) and build with `--features embedded-worker`.

use std::env;
use std::path::PathBuf;

use tracing::debug;

use super::error::{WorkerError, WorkerResult};
use crate::config::WorkerSettings;

/// Environment variable naming the worker jar.
pub const ARTIFACT_ENV: &str = "TIKA_SERVER_JAR";

/// Embedded worker jar (included at compile time).
#[cfg(feature = "embedded-worker")]
static EMBEDDED_ARTIFACT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tika-server.jar"));

/// Resolve the worker jar for the given settings.
pub fn resolve_artifact(settings: &WorkerSettings) -> WorkerResult<PathBuf> {
    if settings.embedded && is_embedded_available() {
        return extract_artifact(&settings.version);
    }

    if let Some(path) = settings
        .resolved_artifact()
        .map_err(|e| WorkerError::ArtifactNotFound(e.to_string()))?
    {
        if path.is_file() {
            return Ok(path);
        }
        return Err(WorkerError::ArtifactNotFound(format!(
            "configured artifact {} does not exist",
            path.display()
        )));
    }

    if let Ok(path) = env::var(ARTIFACT_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            debug!(path = %path.display(), "using artifact from {}", ARTIFACT_ENV);
            return Ok(path);
        }
    }

    for candidate in candidate_paths(settings) {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found artifact");
            return Ok(candidate);
        }
    }

    if is_embedded_available() {
        return extract_artifact(&settings.version);
    }

    Err(WorkerError::ArtifactNotFound(format!(
        "{} not found. Set worker.artifact in config, export {}, or build with --features embedded-worker",
        settings.artifact_file_name(),
        ARTIFACT_ENV
    )))
}

/// Conventional jar locations, relative to the working directory.
pub fn candidate_paths(settings: &WorkerSettings) -> Vec<PathBuf> {
    let name = settings.artifact_file_name();
    vec![
        PathBuf::from(&name),
        PathBuf::from("lib").join(&name),
        PathBuf::from("target").join("resources").join(&name),
    ]
}

/// Get the path where the embedded jar should be extracted.
#[cfg(feature = "embedded-worker")]
fn get_extraction_path(version: &str) -> WorkerResult<PathBuf> {
    let cache_dir = dirs::cache_dir().ok_or_else(|| {
        WorkerError::ArtifactNotFound("could not determine cache directory".to_string())
    })?;

    let isotika_cache = cache_dir.join("isotika");
    std::fs::create_dir_all(&isotika_cache)?;

    // Include crate version in path for cache invalidation
    Ok(isotika_cache.join(format!(
        "tika-server-{}-{}.jar",
        version,
        env!("CARGO_PKG_VERSION")
    )))
}

/// Extract the embedded jar into the user's cache directory.
///
/// An existing file of the right size is reused.
#[cfg(feature = "embedded-worker")]
pub fn extract_artifact(version: &str) -> WorkerResult<PathBuf> {
    use std::fs;

    let path = get_extraction_path(version)?;

    if let Ok(metadata) = fs::metadata(&path) {
        if metadata.len() as usize == EMBEDDED_ARTIFACT.len() {
            return Ok(path);
        }
    }

    fs::write(&path, EMBEDDED_ARTIFACT)?;
    debug!(path = %path.display(), size = EMBEDDED_ARTIFACT.len(), "extracted embedded artifact");
    Ok(path)
}

/// Extract the embedded jar (stub for when feature is disabled).
#[cfg(not(feature = "embedded-worker"))]
pub fn extract_artifact(_version: &str) -> WorkerResult<PathBuf> {
    Err(WorkerError::ArtifactNotFound(
        "embedded artifact not available. Build with --features embedded-worker or set worker.artifact"
            .to_string(),
    ))
}

/// Check if the embedded jar is available.
pub fn is_embedded_available() -> bool {
    cfg!(feature = "embedded-worker")
}
