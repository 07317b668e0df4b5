use anyhow::{bail, Context, Result};
use std::path::Path;

use super::Config;

/// Maximum size for a config file (1 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 1024 * 1024;

/// Parse a JSON5 configuration string, falling back to strict JSON for a
/// clearer error message.
pub fn parse_config_json5(content: &str) -> Result<Config> {
    match json5::from_str(content) {
        Ok(config) => Ok(config),
        Err(json5_err) => serde_json::from_str(content)
            .with_context(|| format!("invalid JSON5 config: {json5_err}")),
    }
}

/// Read and parse a configuration file, choosing the format by extension.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Cannot stat config file '{}'", path.display()))?;
    if metadata.len() > MAX_CONFIG_FILE_BYTES {
        bail!(
            "Config file '{}' is {} bytes, exceeds limit of {} bytes",
            path.display(),
            metadata.len(),
            MAX_CONFIG_FILE_BYTES,
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("invalid YAML in '{}'", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("invalid TOML in '{}'", path.display()))?,
        _ => parse_config_json5(&content)
            .with_context(|| format!("invalid JSON in '{}'", path.display()))?,
    };

    Ok(config)
}

/// Write configuration to a JSON file.
pub fn write_config_file(path: &Path, config: &Config) -> Result<()> {
    if path.exists() {
        bail!("Refusing to overwrite existing config file '{}'", path.display());
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
