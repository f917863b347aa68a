use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use super::{Tool, str_param};
use crate::core::action::Parameters;
use crate::io::config::ToolsConfig;
use crate::io::process::run_bounded;

const OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum GitCloneError {
    #[error("'repo_url' parameter is required for the clone operation")]
    MissingUrl,
    #[error("'{name}' must not start with '-': {value}")]
    OptionLike { name: &'static str, value: String },
    #[error("unsupported operation '{0}' for git_client")]
    UnsupportedOperation(String),
    #[error("'{0}' command not found; ensure git is installed and on PATH")]
    NotFound(String),
    #[error("git clone timed out after {0:?}")]
    TimedOut(Duration),
    #[error("git clone failed with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
    #[error("run git: {0:#}")]
    Spawn(anyhow::Error),
}

/// Clones repositories with the git command-line client.
#[derive(Debug, Clone)]
pub struct GitCloneTool {
    program: String,
    workdir: PathBuf,
    timeout: Duration,
}

impl GitCloneTool {
    pub fn new(program: impl Into<String>, workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
            timeout,
        }
    }

    pub fn from_config(cfg: &ToolsConfig) -> Self {
        Self::new(
            cfg.git_program.clone(),
            cfg.workdir.clone(),
            Duration::from_secs(cfg.git_timeout_secs),
        )
    }

    fn clone_repo(&self, repo_url: &str, directory: Option<&str>) -> Result<String, GitCloneError> {
        reject_option_like("repo_url", repo_url)?;
        if let Some(directory) = directory {
            reject_option_like("directory", directory)?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.arg("clone")
            .arg("--")
            .arg(repo_url)
            .current_dir(&self.workdir);
        if let Some(directory) = directory {
            cmd.arg(directory);
        }

        info!(repo_url, "cloning repository");
        let output = run_bounded(cmd, None, self.timeout, OUTPUT_LIMIT_BYTES).map_err(|err| {
            let missing = err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == ErrorKind::NotFound);
            if missing {
                GitCloneError::NotFound(self.program.clone())
            } else {
                GitCloneError::Spawn(err)
            }
        })?;

        if output.timed_out {
            return Err(GitCloneError::TimedOut(self.timeout));
        }
        if !output.status.success() {
            return Err(GitCloneError::Failed {
                status: output.status.code(),
                stderr: output.stderr_summary(),
            });
        }
        Ok(format!(
            "Successfully cloned repository: {repo_url}\n{}",
            output.stdout_text()
        ))
    }
}

/// Values starting with `-` would be read by git as options.
fn reject_option_like(name: &'static str, value: &str) -> Result<(), GitCloneError> {
    if value.trim_start().starts_with('-') {
        return Err(GitCloneError::OptionLike {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

impl Tool for GitCloneTool {
    fn description(&self) -> &str {
        "Clone a git repository. Parameters: repo_url (string, required), \
         directory (string, optional), operation (\"clone\", optional)."
    }

    fn run(&self, parameters: &Parameters) -> anyhow::Result<String> {
        match parameters.get("operation").and_then(|op| op.as_str()) {
            None | Some("clone") => {}
            Some(other) => {
                return Err(GitCloneError::UnsupportedOperation(other.to_string()).into());
            }
        }
        let repo_url = str_param(parameters, "repo_url").ok_or(GitCloneError::MissingUrl)?;
        Ok(self.clone_repo(repo_url, str_param(parameters, "directory"))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::params;

    #[test]
    fn requires_repo_url() {
        let tool = GitCloneTool::new("git", ".", Duration::from_secs(5));
        let err = tool.run(&params(&[])).unwrap_err();
        assert!(matches!(err.downcast_ref::<GitCloneError>(), Some(GitCloneError::MissingUrl)));
    }

    #[test]
    fn rejects_other_operations() {
        let tool = GitCloneTool::new("git", ".", Duration::from_secs(5));
        let err = tool
            .run(&params(&[("operation", "push"), ("repo_url", "https://example.test/r.git")]))
            .unwrap_err();
        assert!(err.to_string().contains("push"));
    }

    #[test]
    fn missing_client_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = GitCloneTool::new("definitely-not-git", temp.path(), Duration::from_secs(5));
        let err = tool
            .run(&params(&[("repo_url", "https://example.test/r.git")]))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<GitCloneError>(), Some(GitCloneError::NotFound(_))));
    }

    #[test]
    fn option_like_arguments_never_reach_git() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("injected");
        let tool = GitCloneTool::new("git", temp.path(), Duration::from_secs(5));
        let upload_pack = format!("--upload-pack=touch {}; git-upload-pack", marker.display());

        let err = tool
            .run(&params(&[
                ("repo_url", upload_pack.as_str()),
                ("directory", "file:///nowhere/source"),
            ]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitCloneError>(),
            Some(GitCloneError::OptionLike { name: "repo_url", .. })
        ));

        let err = tool
            .run(&params(&[
                ("repo_url", "https://example.test/r.git"),
                ("directory", "--template=/tmp/evil"),
            ]))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitCloneError>(),
            Some(GitCloneError::OptionLike { name: "directory", .. })
        ));
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn repository_arguments_follow_end_of_options() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = GitCloneTool::new("echo", temp.path(), Duration::from_secs(5));

        let out = tool
            .run(&params(&[
                ("repo_url", "https://example.test/r.git"),
                ("directory", "copy"),
            ]))
            .expect("run");

        assert!(out.ends_with("clone -- https://example.test/r.git copy\n"), "{out}");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = GitCloneTool::new("false", temp.path(), Duration::from_secs(5));
        let err = tool
            .run(&params(&[("repo_url", "https://example.test/r.git")]))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<GitCloneError>(), Some(GitCloneError::Failed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn clones_local_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let source = temp.path().join("source");
        let init = Command::new("git")
            .arg("init")
            .arg("--quiet")
            .arg(&source)
            .status();
        if !matches!(init, Ok(status) if status.success()) {
            return;
        }
        let tool = GitCloneTool::new("git", temp.path(), Duration::from_secs(30));

        let out = tool
            .run(&params(&[
                ("repo_url", source.to_str().expect("utf8 path")),
                ("directory", "copy"),
            ]))
            .expect("clone");

        assert!(out.starts_with("Successfully cloned repository: "));
        assert!(temp.path().join("copy/.git").is_dir());
    }
}
