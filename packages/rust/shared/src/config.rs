//! Application configuration for roamweb.
//!
//! The site config lives in `roamweb.toml` next to where the tool is run.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RoamWebError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "roamweb.toml";

// ---------------------------------------------------------------------------
// Config structs (matching roamweb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site identity shown in every page.
    #[serde(default)]
    pub site: SiteConfig,

    /// Input and output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Notes that must never be published.
    #[serde(default)]
    pub exclude: ExcludeConfig,

    /// Listing and graph sizes.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    #[serde(default = "default_title")]
    pub title: String,

    /// Prefix prepended to every absolute link (empty for root hosting).
    #[serde(default)]
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            base_url: String::new(),
        }
    }
}

fn default_title() -> String {
    "My Notes".into()
}

/// `[paths]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the org-roam notes.
    #[serde(default = "default_roam_dir")]
    pub roam_dir: PathBuf,

    /// Path to the org-roam SQLite database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Directory the static site is written to.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            roam_dir: default_roam_dir(),
            db_path: default_db_path(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_roam_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./org-roam.db")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./dist")
}

/// `[exclude]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludeConfig {
    /// Any note carrying one of these tags is excluded.
    #[serde(default = "default_excluded_tags")]
    pub tags: Vec<String>,

    /// Glob patterns matched against the base name of a note's source file.
    #[serde(default)]
    pub files: Vec<String>,

    /// Literal node IDs to exclude.
    #[serde(default)]
    pub ids: Vec<String>,
}

impl Default for ExcludeConfig {
    fn default() -> Self {
        Self {
            tags: default_excluded_tags(),
            files: Vec::new(),
            ids: Vec::new(),
        }
    }
}

fn default_excluded_tags() -> Vec<String> {
    vec!["private".into(), "draft".into()]
}

/// `[display]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Number of notes listed on the home page.
    #[serde(default = "default_recent_count")]
    pub recent_count: usize,

    /// Hop distance of the per-note local graph.
    #[serde(default = "default_local_graph_depth")]
    pub local_graph_depth: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            recent_count: default_recent_count(),
            local_graph_depth: default_local_graph_depth(),
        }
    }
}

fn default_recent_count() -> usize {
    20
}
fn default_local_graph_depth() -> usize {
    2
}

impl AppConfig {
    /// Make `roam_dir` and `output_dir` absolute against `cwd`.
    ///
    /// A relative `db_path` is taken to live inside `roam_dir`, keeping only its
    /// file name.
    pub fn resolve_paths(&mut self, cwd: &Path) {
        if self.paths.roam_dir.is_relative() {
            self.paths.roam_dir = cwd.join(&self.paths.roam_dir);
        }
        if self.paths.db_path.is_relative() {
            let file_name = self
                .paths
                .db_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path);
            self.paths.db_path = self.paths.roam_dir.join(file_name);
        }
        if self.paths.output_dir.is_relative() {
            self.paths.output_dir = cwd.join(&self.paths.output_dir);
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the config from `path`. Returns defaults if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| RoamWebError::io(path, e))?;

    let mut config: AppConfig = toml::from_str(&content).map_err(|e| {
        RoamWebError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    config.paths.roam_dir = expand_path(&config.paths.roam_dir);
    config.paths.db_path = expand_path(&config.paths.db_path);
    config.paths.output_dir = expand_path(&config.paths.output_dir);

    Ok(config)
}

/// Write a default config file to `path`.
///
/// Refuses to overwrite an existing file.
pub fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(RoamWebError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| RoamWebError::config(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| RoamWebError::io(path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("recent_count"));
        assert!(toml_str.contains("draft"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[site]
title = "Garden"

[exclude]
ids = ["abc"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.site.title, "Garden");
        assert_eq!(config.exclude.ids, vec!["abc".to_string()]);
        assert_eq!(config.exclude.tags, vec!["private", "draft"]);
        assert_eq!(config.display.recent_count, 20);
        assert_eq!(config.display.local_graph_depth, 2);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[display]\nrecent_count = \"many\"\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().starts_with("config error"));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        init_config(&path).expect("first init");
        let loaded = load_config_from(&path).expect("reload");
        assert_eq!(loaded, AppConfig::default());

        assert!(init_config(&path).is_err());
    }

    #[test]
    fn relative_db_path_lives_in_roam_dir() {
        let mut config = AppConfig::default();
        config.paths.roam_dir = PathBuf::from("notes");
        config.paths.db_path = PathBuf::from("./cache/org-roam.db");
        config.resolve_paths(Path::new("/work"));

        assert_eq!(config.paths.roam_dir, PathBuf::from("/work/notes"));
        assert_eq!(config.paths.db_path, PathBuf::from("/work/notes/org-roam.db"));
        assert_eq!(config.paths.output_dir, PathBuf::from("/work/./dist"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_path(Path::new("~/roam"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("roam"));
        }
        assert_eq!(expand_path(Path::new("/abs/roam")), PathBuf::from("/abs/roam"));
    }
}
