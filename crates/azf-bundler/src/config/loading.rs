use std::path::Path;

use serde_json::Value;

use crate::error::{Error, Result};

/// Read a JSON config file into a raw value.
///
/// The value is not validated here; pass it to
/// [`parse_build_config`](super::parse_build_config) or
/// [`parse_watch_config`](super::parse_watch_config).
///
/// # Errors
///
/// - [`Error::FileSystem`] if the file cannot be read
/// - [`Error::InvalidJson`] if the contents are not JSON
pub async fn load_config(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| Error::fs(path, source))?;

    tracing::debug!(path = %path.display(), "loaded config file");

    serde_json::from_str(&contents).map_err(|source| Error::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}
