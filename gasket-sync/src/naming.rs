//! Logical filename ⇄ on-disk path mapping.
//!
//! The engine never invents paths itself; the executor and the working copy
//! ask a [`FilenameMapper`] for every translation.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use gasket_core::{config::ScriptExtension, FileType};

/// Logical name of the project manifest file.
pub const MANIFEST_NAME: &str = "appsscript";

/// A logical filename that cannot be mapped to a local path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot map '{filename}' to a local path: {reason}")]
pub struct NamingError {
    pub filename: String,
    pub reason: String,
}

/// Translates between remote logical filenames and local relative paths.
pub trait FilenameMapper: Send + Sync {
    /// Relative path (under the source root) for a logical filename.
    fn local_path(&self, filename: &str, file_type: FileType) -> Result<PathBuf, NamingError>;

    /// Logical filename and type for a relative path, or `None` if the file
    /// is not part of the project.
    fn logical_name(&self, relative: &Path) -> Option<(String, FileType)>;

    /// Name to use when writing `filename` to the remote store.
    fn remote_name(&self, filename: &str, _file_type: FileType) -> String {
        filename.to_string()
    }
}

/// Maps by extension: scripts get the configured extension, HTML `.html`,
/// and the project manifest `appsscript.json` at the root.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionMapper {
    script_extension: ScriptExtension,
}

impl ExtensionMapper {
    pub fn new(script_extension: ScriptExtension) -> Self {
        Self { script_extension }
    }

    fn extension_for(&self, file_type: FileType) -> &'static str {
        match file_type {
            FileType::ServerJs => self.script_extension.as_str(),
            FileType::Html => "html",
            FileType::Json => "json",
        }
    }
}

impl FilenameMapper for ExtensionMapper {
    fn local_path(&self, filename: &str, file_type: FileType) -> Result<PathBuf, NamingError> {
        let fail = |reason: &str| NamingError {
            filename: filename.to_string(),
            reason: reason.to_string(),
        };
        if filename.is_empty() {
            return Err(fail("empty filename"));
        }
        if filename.contains('\\') || filename.contains('\0') {
            return Err(fail("contains a backslash or NUL"));
        }
        let mut path = PathBuf::new();
        for segment in filename.split('/') {
            match segment {
                "" | "." | ".." => return Err(fail("empty or relative path segment")),
                s if s.starts_with('.') => return Err(fail("hidden path segment")),
                s => path.push(s),
            }
        }
        if file_type == FileType::Json && filename != MANIFEST_NAME {
            return Err(fail("only the project manifest may be JSON"));
        }
        let file_name = format!(
            "{}.{}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            self.extension_for(file_type)
        );
        path.set_file_name(file_name);
        Ok(path)
    }

    fn logical_name(&self, relative: &Path) -> Option<(String, FileType)> {
        let ext = relative.extension()?.to_str()?.to_ascii_lowercase();
        let file_type = if ext == self.script_extension.as_str() {
            FileType::ServerJs
        } else if ext == "html" {
            FileType::Html
        } else if ext == "json" {
            FileType::Json
        } else {
            return None;
        };

        let mut segments = Vec::new();
        for component in relative.with_extension("").components() {
            match component {
                Component::Normal(part) => segments.push(part.to_str()?.to_string()),
                _ => return None,
            }
        }
        let name = segments.join("/");
        if name.is_empty() || (file_type == FileType::Json && name != MANIFEST_NAME) {
            return None;
        }
        Some((name, file_type))
    }
}
