//! Configuration management for Docent.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Command-line flags
//! - Config files (.docent/config.yaml)
//!
//! The configuration is workspace-centric, with index state stored in `.docent/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Backend preferences accepted by [`AppConfig::validate`].
pub const KNOWN_BACKENDS: [&str; 4] = ["auto", "exact", "dense", "lexical"];

/// Document file used when nothing else is configured.
pub const DEFAULT_DOCUMENT: &str = "knowledge.md";

/// Main application configuration.
///
/// Holds the global options that affect every command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .docent/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Knowledge document the index is built from
    pub document: PathBuf,

    /// Similarity backend preference ("auto", "exact", "dense", "lexical")
    pub backend: String,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    document: Option<DocumentConfig>,
    retrieval: Option<BackendSection>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BackendSection {
    backend: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            document: PathBuf::from(DEFAULT_DOCUMENT),
            backend: "auto".to_string(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `DOCENT_WORKSPACE`: Override workspace path
    /// - `DOCENT_CONFIG`: Path to config file
    /// - `DOCENT_DOCUMENT`: Knowledge document path
    /// - `DOCENT_BACKEND`: Similarity backend preference
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docent_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("DOCENT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("DOCENT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.docent_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(document) = std::env::var("DOCENT_DOCUMENT") {
            config.document = PathBuf::from(document);
        }

        if let Ok(backend) = std::env::var("DOCENT_BACKEND") {
            config.backend = backend;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(path) = config_file.document.and_then(|doc| doc.path) {
            result.document = PathBuf::from(path);
        }

        if let Some(backend) = config_file.retrieval.and_then(|r| r.backend) {
            result.backend = backend;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        document: Option<PathBuf>,
        backend: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(document) = document {
            self.document = document;
        }

        if let Some(backend) = backend {
            self.backend = backend;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .docent directory.
    pub fn docent_dir(&self) -> PathBuf {
        self.workspace.join(".docent")
    }

    /// Ensure the .docent directory exists.
    pub fn ensure_docent_dir(&self) -> AppResult<()> {
        let docent_dir = self.docent_dir();
        if !docent_dir.exists() {
            std::fs::create_dir_all(&docent_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .docent directory: {}", e))
            })?;
            tracing::debug!("Created {}", docent_dir.display());
        }
        Ok(())
    }

    /// Resolve the document path against the workspace.
    pub fn document_path(&self) -> PathBuf {
        if self.document.is_absolute() {
            self.document.clone()
        } else {
            self.workspace.join(&self.document)
        }
    }

    /// Validate configuration values that cannot be checked by the type system.
    pub fn validate(&self) -> AppResult<()> {
        if !KNOWN_BACKENDS.contains(&self.backend.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown backend: {}. Supported: {}",
                self.backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend, "auto");
        assert_eq!(config.document, PathBuf::from(DEFAULT_DOCUMENT));
        assert!(!config.verbose);
        assert!(!config.no_color);
    }

    #[test]
    fn test_docent_dir() {
        let config = AppConfig::default();
        assert!(config.docent_dir().ends_with(".docent"));
    }

    #[test]
    fn test_ensure_docent_dir_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig {
            workspace: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        config.ensure_docent_dir().unwrap();
        config.ensure_docent_dir().unwrap();
        assert!(temp_dir.path().join(".docent").is_dir());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some(PathBuf::from("about.md")),
            Some("lexical".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.backend, "lexical");
        assert_eq!(overridden.document, PathBuf::from("about.md"));
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            "document:\n  path: docs/profile.md\nretrieval:\n  backend: dense\nlogging:\n  level: warn\n  color: false\n",
        )
        .unwrap();

        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..Default::default()
        };
        let merged = config.merge_yaml(&path).unwrap();

        assert_eq!(merged.document, PathBuf::from("docs/profile.md"));
        assert_eq!(merged.backend, "dense");
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(merged.document_path(), temp.path().join("docs/profile.md"));
    }

    #[test]
    fn test_merge_invalid_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "retrieval: [unterminated").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_unknown_backend() {
        let config = AppConfig {
            backend: "faiss".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_known_backends() {
        for backend in KNOWN_BACKENDS {
            let config = AppConfig {
                backend: backend.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_ok());
        }
    }
}
