use crate::error::ConfigError;
use crate::lint::LintConfig;
use crate::workspace::DEFAULT_CACHE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

pub const LIBRARY_PATH_ENV: &str = "UCX_LIBRARY_PATH";

/// Engine settings.
///
/// Layered from lowest to highest priority: defaults, the client's
/// `initializationOptions`, the environment, then command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Root of the native class library corpus. No library is loaded when
    /// unset.
    pub library_path: Option<PathBuf>,
    pub document_cache_size: usize,
    pub lint: LintConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            document_cache_size: DEFAULT_CACHE_SIZE,
            lint: LintConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Overlay `initializationOptions`. `null` leaves the config untouched;
    /// fields missing from the object keep their current values.
    pub fn merge_initialization_options(
        &mut self,
        options: &serde_json::Value,
    ) -> Result<(), ConfigError> {
        if options.is_null() {
            return Ok(());
        }
        let overlay: PartialConfig = serde_json::from_value(options.clone())?;

        if let Some(path) = overlay.library_path {
            self.library_path = Some(path);
        }
        if let Some(size) = overlay.document_cache_size {
            self.document_cache_size = size;
        }
        if let Some(lint) = overlay.lint {
            if let Some(enabled) = lint.undefined_function {
                self.lint.undefined_function = enabled;
            }
            if let Some(enabled) = lint.syntax_errors {
                self.lint.syntax_errors = enabled;
            }
        }
        self.validate()
    }

    /// Apply `UCX_LIBRARY_PATH` when set and non-empty.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(LIBRARY_PATH_ENV).filter(|p| !p.is_empty()) {
            info!("Using library path from {}: {}", LIBRARY_PATH_ENV, path);
            self.library_path = Some(PathBuf::from(path));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.document_cache_size == 0 {
            return Err(ConfigError::ZeroCacheSize);
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialConfig {
    library_path: Option<PathBuf>,
    document_cache_size: Option<usize>,
    lint: Option<PartialLintConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialLintConfig {
    undefined_function: Option<bool>,
    syntax_errors: Option<bool>,
}
