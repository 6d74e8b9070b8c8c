//! Holds the validated settings for a project.

use std::path::PathBuf;

use super::{
    ConfigError,
    EngineSettings,
    loader,
};

/// Owns the current settings and the project root they were loaded from.
#[derive(Default, Debug, Clone)]
pub struct ConfigManager {
    /// Last settings that passed validation
    current_settings: EngineSettings,

    /// Directory holding `.page-i18n.json` and the dictionaries
    project_root: Option<PathBuf>,
}

impl ConfigManager {
    #[must_use]
    pub fn new() -> Self {
        Self { current_settings: EngineSettings::default(), project_root: None }
    }

    /// Loads and validates the settings of `project_root`.
    ///
    /// Without a root, or without a configuration file, the defaults apply.
    /// On error the previous settings are kept.
    ///
    /// # Errors
    /// - The configuration file cannot be read or parsed
    /// - The settings fail validation
    pub fn load_settings(&mut self, project_root: Option<PathBuf>) -> Result<(), ConfigError> {
        tracing::debug!("Loading settings for project: {:?}", project_root);

        let settings = if let Some(root) = &project_root {
            loader::load_from_project(root)?.map_or_else(EngineSettings::default, |loaded| {
                tracing::debug!("Loaded project settings: {:?}", loaded);
                loaded
            })
        } else {
            EngineSettings::default()
        };

        settings.validate().map_err(ConfigError::ValidationErrors)?;

        self.current_settings = settings;
        self.project_root = project_root;
        tracing::debug!("Settings loaded successfully: {:?}", self.current_settings);

        Ok(())
    }

    #[must_use]
    pub const fn get_settings(&self) -> &EngineSettings {
        &self.current_settings
    }

    #[must_use]
    pub const fn project_root(&self) -> Option<&PathBuf> {
        self.project_root.as_ref()
    }
}
