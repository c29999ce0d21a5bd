use std::{fs, path::Path};

use super::types::ConfigError;

/// Reads the bearer token the web client keeps in persisted storage.
///
/// An empty file is treated as "not logged in" rather than as an error.
pub(super) fn load_persisted_token(path: &str) -> Result<Option<String>, ConfigError> {
    let raw = fs::read_to_string(Path::new(path))
        .map_err(|source| ConfigError::TokenFile { path: path.to_string(), source })?;

    let trimmed = raw.trim();
    let token = trimmed.strip_prefix("Bearer ").unwrap_or(trimmed).trim();
    if token.is_empty() {
        tracing::warn!(path, "Persisted token file is empty");
        return Ok(None);
    }

    Ok(Some(token.to_string()))
}
