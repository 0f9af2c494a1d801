//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/guardian-tree/config.toml`
//! 3. Local config: `<dir>/.gtree.toml` (usually the working directory)
//! 4. Environment variables: `GTREE_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::ProviderKind;

/// Unified configuration for gtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Language key for language-keyed titles (default: "en")
    pub language: String,
    /// Prefix of node URLs (default: "/api")
    pub api_base: String,
    /// Node vocabulary of structure files (default: report)
    pub provider: ProviderKind,
    /// Pretty-print JSON when saving (default: true)
    pub pretty: bool,
    /// Structure file used when a command gets none
    pub default_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: "en".into(),
            api_base: "/api".into(),
            provider: ProviderKind::default(),
            pretty: true,
            default_file: None,
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub language: Option<String>,
    pub api_base: Option<String>,
    pub provider: Option<ProviderKind>,
    pub pretty: Option<bool>,
    pub default_file: Option<PathBuf>,
}

/// Get the XDG config directory for gtree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "guardian-tree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".gtree.toml")
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins for every field it specifies.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            language: overlay
                .language
                .clone()
                .unwrap_or_else(|| self.language.clone()),
            api_base: overlay
                .api_base
                .clone()
                .unwrap_or_else(|| self.api_base.clone()),
            provider: overlay.provider.unwrap_or(self.provider),
            pretty: overlay.pretty.unwrap_or(self.pretty),
            default_file: overlay
                .default_file
                .clone()
                .or_else(|| self.default_file.clone()),
        }
    }

    /// Expand `~` and `$VAR` in path-like fields.
    fn expand_paths(&mut self) {
        if let Some(file) = &self.default_file {
            let raw = file.to_string_lossy();
            let expanded = shellexpand::full(raw.as_ref())
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            self.default_file = Some(PathBuf::from(expanded));
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.gtree.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply GTREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("GTREE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("language") {
            settings.language = val;
        }
        if let Ok(val) = config.get_string("api_base") {
            settings.api_base = val;
        }
        if let Ok(val) = config.get::<ProviderKind>("provider") {
            settings.provider = val;
        }
        if let Ok(val) = config.get_bool("pretty") {
            settings.pretty = val;
        }
        if let Ok(val) = config.get_string("default_file") {
            settings.default_file = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# gtree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/guardian-tree/config.toml
#   Local:  ./.gtree.toml
#   Env:    GTREE_* environment variables (e.g. GTREE_LANGUAGE=de)

# Language key used for language-keyed titles
language = "en"

# Prefix of node URLs
api_base = "/api"

# Node vocabulary: "report", "test-guide" or "generic"
provider = "report"

# Pretty-print JSON when writing structure files
pretty = true

# Structure file used when a command gets none
# default_file = "~/reports/structure.json"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_overlay_when_merging_then_specified_fields_win() {
        let base = Settings::default();
        let overlay = RawSettings {
            language: Some("de".into()),
            provider: Some(ProviderKind::TestGuide),
            ..RawSettings::default()
        };
        let merged = base.merge_with(&overlay);
        assert_eq!(merged.language, "de");
        assert_eq!(merged.provider, ProviderKind::TestGuide);
        assert_eq!(merged.api_base, "/api");
        assert!(merged.pretty);
    }

    #[test]
    fn given_template_when_parsing_then_matches_defaults() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert_eq!(Settings::default().merge_with(&raw), Settings::default());
    }

    #[test]
    fn given_settings_when_serializing_then_round_trips_through_toml() {
        let settings = Settings {
            provider: ProviderKind::Generic,
            ..Settings::default()
        };
        let text = settings.to_toml().unwrap();
        assert!(text.contains("provider = \"generic\""));
        let back: Settings = toml::from_str(&text).unwrap();
        assert_eq!(back, settings);
    }
}
