//! Configuration handling for doc-anchors
//!
//! Configuration is stored in `.docanchor/config.toml` (project) and
//! `~/.config/docanchor/config.toml` (global). The active link environment is
//! taken from `DOCANCHOR_ENV` first, then the project, then the global file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    get_default_route_map, AssignOptions, Environment, GatePolicy, PipelineOptions, RouteMap,
    TocOptions, DEFAULT_ANCHOR_MAX_LENGTH, ENVIRONMENT_VAR,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Anchor assignment settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AnchorConfig {
    /// Slug length bound for generated anchors (0 disables truncation)
    pub max_length: usize,

    /// Prefix for every generated anchor
    pub prefix: Option<String>,

    /// Keep `id` attributes already present on headings
    pub preserve_existing: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_ANCHOR_MAX_LENGTH,
            prefix: None,
            preserve_existing: true,
        }
    }
}

/// Table-of-contents settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TocConfig {
    /// Deepest heading level listed in the outline
    pub max_level: u8,

    /// What to do with unresolved outline entries
    pub gate: GatePolicy,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            max_level: 6,
            gate: GatePolicy::Warn,
        }
    }
}

/// Registry backfill settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackfillConfig {
    /// Directory holding source documents, relative to the project root
    pub documents_dir: PathBuf,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("docs"),
        }
    }
}

/// Project-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProjectConfig {
    /// Environment links are built for
    pub environment: Option<Environment>,

    pub anchors: AnchorConfig,

    pub toc: TocConfig,

    /// Route template overrides by environment
    pub routes: BTreeMap<Environment, String>,

    pub backfill: BackfillConfig,
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Environment used outside any project setting
    pub environment: Option<Environment>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone)]
pub struct Config {
    pub project: ProjectConfig,
    pub global: GlobalConfig,
    pub project_root: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from default locations
    pub fn load() -> Result<Self> {
        let global = Self::load_global()?;
        let (project, project_root) = Self::load_project()?;

        Ok(Self {
            project,
            global,
            project_root,
        })
    }

    /// Loads configuration for a specific project
    pub fn for_project(project_root: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let project = Self::load_project_config(project_root)?;

        Ok(Self {
            project,
            global,
            project_root: Some(project_root.to_path_buf()),
        })
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("dev", "docanchor", "docanchor")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    fn load_project() -> Result<(ProjectConfig, Option<PathBuf>)> {
        match Self::find_project_root() {
            Some(root) => {
                let config = Self::load_project_config(&root)?;
                Ok((config, Some(root)))
            }
            None => Ok((ProjectConfig::default(), None)),
        }
    }

    fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
        let config_path = project_root.join(".docanchor").join("config.toml");

        if !config_path.exists() {
            return Ok(ProjectConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read project config: {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse project config")?;

        config.validate()?;
        Ok(config)
    }

    /// Finds the project root by looking for a `.docanchor/` directory
    pub fn find_project_root() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;

        loop {
            if current.join(".docanchor").is_dir() {
                return Some(current);
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Returns true if we're in a doc-anchors project
    pub fn is_in_project(&self) -> bool {
        self.project_root.is_some()
    }

    /// Returns the project root, or an error if not in a project
    pub fn require_project_root(&self) -> Result<&Path> {
        self.project_root.as_deref().ok_or_else(|| {
            anyhow::anyhow!("Not in a doc-anchors project. Run 'docanchor init' first.")
        })
    }

    /// Active environment: `DOCANCHOR_ENV`, then project, then global, then default
    pub fn effective_environment(&self) -> Result<Environment> {
        if let Ok(value) = std::env::var(ENVIRONMENT_VAR) {
            return value
                .parse()
                .map_err(|e: String| ConfigError::Invalid(format!("{}: {}", ENVIRONMENT_VAR, e)))
                .map_err(Into::into);
        }

        Ok(self
            .project
            .environment
            .or(self.global.environment)
            .unwrap_or_default())
    }

    /// Route map for `environment`, with project overrides applied
    pub fn route_map_for(&self, environment: Environment) -> RouteMap {
        self.project
            .routes
            .iter()
            .fold(get_default_route_map(environment), |map, (env, template)| {
                map.with_route(*env, template.clone())
            })
    }

    /// Route map for the active environment
    pub fn route_map(&self) -> Result<RouteMap> {
        Ok(self.route_map_for(self.effective_environment()?))
    }

    pub fn assign_options(&self) -> AssignOptions {
        let anchors = &self.project.anchors;
        AssignOptions {
            prefix: anchors.prefix.clone(),
            max_length: anchors.max_length,
            preserve_existing: anchors.preserve_existing,
        }
    }

    pub fn toc_options(&self) -> TocOptions {
        TocOptions {
            max_level: self.project.toc.max_level,
            assign: self.assign_options(),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            toc: self.toc_options(),
            gate: self.project.toc.gate,
        }
    }

    /// Saves the project configuration
    pub fn save_project(&self) -> Result<()> {
        let root = self.require_project_root()?;
        let config_path = root.join(".docanchor").join("config.toml");

        let content =
            toml::to_string_pretty(&self.project).context("Failed to serialize project config")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write project config: {}", config_path.display()))
    }
}

impl ProjectConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=6).contains(&self.toc.max_level) {
            return Err(ConfigError::Invalid(format!(
                "toc.max_level must be between 1 and 6, got {}",
                self.toc.max_level
            )));
        }

        for (env, template) in &self.routes {
            if !template.contains("{doc_uid}") && !template.contains("{doc_slug}") {
                return Err(ConfigError::Invalid(format!(
                    "route for {} must contain {{doc_uid}} or {{doc_slug}}",
                    env
                )));
            }
        }

        Ok(())
    }
}
