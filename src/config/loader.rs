//! Reading the project configuration file.

use std::path::Path;

use super::{
    ConfigError,
    EngineSettings,
};

/// Name of the configuration file looked up in the project root.
pub const CONFIG_FILE_NAME: &str = ".page-i18n.json";

/// Loads settings from `<project_root>/.page-i18n.json`.
///
/// # Returns
/// - `Ok(Some(settings))`: the file exists and parsed
/// - `Ok(None)`: there is no configuration file
///
/// # Errors
/// - The file exists but cannot be read
/// - The file is not valid JSON for [`EngineSettings`]
pub(super) fn load_from_project(project_root: &Path) -> Result<Option<EngineSettings>, ConfigError> {
    let config_path = project_root.join(CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!("Configuration file not found: {:?}", config_path);
        return Ok(None);
    }

    tracing::debug!("Loading configuration from: {:?}", config_path);

    let content = std::fs::read_to_string(&config_path)?;
    let settings: EngineSettings = serde_json::from_str(&content)?;

    Ok(Some(settings))
}
