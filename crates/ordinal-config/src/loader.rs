use std::path::Path;

use ordinal_common::{Error, Result};
use tracing::debug;

use crate::model::ConfigOverlay;

/// Reads optional config files. Flags and environment variables are layered
/// on top by the caller.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a YAML or TOML file, chosen by extension.
    pub fn from_path(path: &Path) -> Result<ConfigOverlay> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read config {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let overlay = match ext {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .map_err(|e| Error::Config(format!("YAML parse error: {e}")))?,
            "toml" => toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("TOML parse error: {e}")))?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other}"
                )));
            }
        };

        debug!("loaded config from {}", path.display());
        Ok(overlay)
    }
}
