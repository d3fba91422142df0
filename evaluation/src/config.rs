//! YAML configuration loading.

use pplgate_core::EvalConfig;
use std::path::Path;

/// Load, resolve and validate an [`EvalConfig`] from a YAML file.
///
/// Relative dataset paths are resolved against the directory holding the file.
pub fn load_config(path: &Path) -> anyhow::Result<EvalConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let mut config: EvalConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    config.validate()?;
    Ok(config)
}
