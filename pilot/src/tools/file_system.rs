use std::fs;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::{Tool, str_param};
use crate::core::action::Parameters;

/// Body written into every file this tool creates.
pub const PLACEHOLDER_BODY: &str = "This file was created by taskpilot.\n";

#[derive(Debug, Error)]
pub enum FileSystemError {
    #[error("'file_path' parameter is required")]
    MissingPath,
    #[error("'{0}' is outside the working directory; use a relative path without '..'")]
    OutsideWorkdir(String),
    #[error("unsupported operation '{0}' for file_system_manager")]
    UnsupportedOperation(String),
    #[error("create file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Creates files under a working directory.
#[derive(Debug, Clone)]
pub struct FileSystemTool {
    workdir: PathBuf,
}

impl FileSystemTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn create_file(&self, file_path: &str) -> Result<String, FileSystemError> {
        let relative = Path::new(file_path);
        let escapes = relative
            .components()
            .any(|part| !matches!(part, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(FileSystemError::OutsideWorkdir(file_path.to_string()));
        }
        let target = self.workdir.join(relative);
        let io_err = |source| FileSystemError::Io {
            path: target.clone(),
            source,
        };
        if let Some(parent) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&target, PLACEHOLDER_BODY).map_err(io_err)?;
        debug!(path = %target.display(), "file created");
        Ok(format!("Successfully created file: {file_path}"))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl Tool for FileSystemTool {
    fn description(&self) -> &str {
        "Create a file. Parameters: file_path (string, required, relative to the working \
         directory), operation (\"create_file\", optional)."
    }

    fn run(&self, parameters: &Parameters) -> anyhow::Result<String> {
        match parameters.get("operation").and_then(|op| op.as_str()) {
            None | Some("create_file") => {}
            Some(other) => {
                return Err(FileSystemError::UnsupportedOperation(other.to_string()).into());
            }
        }
        let file_path = str_param(parameters, "file_path").ok_or(FileSystemError::MissingPath)?;
        Ok(self.create_file(file_path)?)
    }
}
