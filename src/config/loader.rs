//! Configuration loading and discovery for `resbake.toml`
//!
//! Provides functions to find, load, validate and override settings.

use super::schema::{BakeSettings, BakeTarget};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "resbake.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse resbake.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override output directory
    pub out: Option<PathBuf>,
    /// Force rebaking of everything
    pub force: Option<bool>,
    /// Force fully sequential execution
    pub single_thread: Option<bool>,
    /// Override the engine side being baked
    pub target: Option<BakeTarget>,
}

/// Find `resbake.toml` by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find `resbake.toml` by walking up from a specific directory.
///
/// Internal implementation that allows specifying the start directory,
/// useful for testing.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load settings from an explicit path, or from discovery when `None`.
///
/// With no config file found anywhere, falls back to [`default_config`].
/// Relative input/output paths in the file are resolved against the
/// config file's directory.
pub fn load_config(path: Option<&Path>) -> Result<BakeSettings, ConfigError> {
    let resolved = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    let Some(config_path) = resolved else {
        return Ok(default_config());
    };

    let text = fs::read_to_string(&config_path)?;
    let mut settings: BakeSettings = toml::from_str(&text)?;

    if let Some(root) = config_path.parent() {
        resolve_paths(&mut settings, root);
    }

    let problems = settings.validate();
    if !problems.is_empty() {
        return Err(ConfigError::Validation(problems));
    }

    Ok(settings)
}

/// Apply CLI overrides on top of loaded settings and re-validate.
pub fn apply_overrides(
    mut settings: BakeSettings,
    overrides: &CliOverrides,
) -> Result<BakeSettings, ConfigError> {
    if let Some(out) = &overrides.out {
        settings.output = out.clone();
    }
    if let Some(force) = overrides.force {
        settings.force_baking = force;
    }
    if let Some(single) = overrides.single_thread {
        settings.single_thread = single;
    }
    if let Some(target) = overrides.target {
        settings.target = target;
    }

    let problems = settings.validate();
    if !problems.is_empty() {
        return Err(ConfigError::Validation(problems));
    }

    Ok(settings)
}

/// Settings with sensible defaults and no packs. Used by tests and as the
/// fallback when no config file exists.
pub fn default_config() -> BakeSettings {
    BakeSettings::default()
}

fn resolve_paths(settings: &mut BakeSettings, root: &Path) {
    if settings.output.is_relative() {
        settings.output = root.join(&settings.output);
    }
    for pack in &mut settings.packs {
        for dir in &mut pack.input_dirs {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
        for file in &mut pack.input_files {
            if file.is_relative() {
                *file = root.join(&*file);
            }
        }
    }
}
