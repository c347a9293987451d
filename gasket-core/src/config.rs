//! Per-working-copy YAML project config.
//!
//! # Storage layout
//!
//! ```text
//! <local>/
//!   .gasket/
//!     project.yaml    (this module)
//!     manifest.json   (gasket-sync manifest store)
//!   <root_dir>/...    (script files)
//! ```
//!
//! Every function takes the working-copy path explicitly; nothing here reads
//! the process working directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};
use crate::types::ProjectId;

/// Name of the hidden control directory beside the working copy.
pub const CONTROL_DIR: &str = ".gasket";

const CONFIG_FILE: &str = "project.yaml";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Extension used for server script files on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptExtension {
    #[default]
    Js,
    Gs,
}

impl ScriptExtension {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptExtension::Js => "js",
            ScriptExtension::Gs => "gs",
        }
    }
}

impl std::str::FromStr for ScriptExtension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "js" => Ok(Self::Js),
            "gs" => Ok(Self::Gs),
            other => Err(format!("unknown script extension '{other}'; expected: js, gs")),
        }
    }
}

/// Contents of `.gasket/project.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_id: ProjectId,
    #[serde(default)]
    pub script_extension: ScriptExtension,
    /// Subdirectory (relative to the working copy) holding the script files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_dir: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            script_extension: ScriptExtension::default(),
            root_dir: None,
        }
    }

    /// Directory whose contents are mirrored to the remote project.
    pub fn source_root(&self, local: &Path) -> PathBuf {
        match &self.root_dir {
            Some(dir) => local.join(dir),
            None => local.to_path_buf(),
        }
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<local>/.gasket/`; pure, no I/O.
pub fn control_dir_at(local: &Path) -> PathBuf {
    local.join(CONTROL_DIR)
}

/// `<local>/.gasket/project.yaml`; pure, no I/O.
pub fn config_path_at(local: &Path) -> PathBuf {
    control_dir_at(local).join(CONFIG_FILE)
}

// ---------------------------------------------------------------------------
// Load / save / init
// ---------------------------------------------------------------------------

/// Load the project config for the working copy at `local`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(local: &Path) -> Result<ProjectConfig, ConfigError> {
    let path = config_path_at(local);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConfigError::NotFound { path });
        }
        Err(err) => return Err(io_err(&path, err)),
    };
    let config: ProjectConfig =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: e,
        })?;
    validate(&path, &config)?;
    Ok(config)
}

/// Atomically save the project config.
///
/// Write flow: serialize → `project.yaml.tmp` sibling → `rename`.
pub fn save_at(local: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    let path = config_path_at(local);
    validate(&path, config)?;
    let dir = control_dir_at(local);
    std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }
    Ok(())
}

/// Link the working copy at `local` to `project_id`.
///
/// Idempotent: if a config already exists it is loaded and returned unchanged.
pub fn init_at(
    local: &Path,
    project_id: ProjectId,
    script_extension: ScriptExtension,
) -> Result<ProjectConfig, ConfigError> {
    if config_path_at(local).exists() {
        return load_at(local);
    }
    let config = ProjectConfig {
        project_id,
        script_extension,
        root_dir: None,
    };
    save_at(local, &config)?;
    Ok(config)
}

fn validate(path: &Path, config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project_id.0.trim().is_empty() {
        return Err(ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: "project_id must not be empty".to_string(),
        });
    }
    if let Some(root) = &config.root_dir {
        let escapes = root
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: format!(
                    "root_dir '{}' must be a relative path inside the working copy",
                    root.display()
                ),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
