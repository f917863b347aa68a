//! Settings stored in `taskpilot.toml`.
//!
//! The file is read once at startup into an explicit [`Settings`] value that
//! is passed to whatever needs it. [`AppConfig`] is the typed view used by the
//! rest of the crate.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use toml::{Table, Value};
use tracing::debug;

use crate::error::ConfigurationError;

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "taskpilot.toml";

/// Raw settings table with dotted-key lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    table: Table,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// A missing file yields empty settings, so every key falls back to its
    /// default.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        if !path.exists() {
            debug!(path = %path.display(), "settings file missing, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let table = toml::from_str::<Table>(&contents).map_err(|source| {
            ConfigurationError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(Self { table })
    }

    /// Look up a value by dotted key, e.g. `logging.level`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.table.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }

    /// Look up and deserialize a value, falling back to `default` when absent.
    ///
    /// A present value of the wrong type is an error, not a silent fallback.
    pub fn get_or<T: DeserializeOwned>(
        &self,
        key: &str,
        default: T,
    ) -> Result<T, ConfigurationError> {
        self.get_opt(key).map(|value| value.unwrap_or(default))
    }

    /// Look up and deserialize an optional value.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigurationError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => value
                .clone()
                .try_into()
                .map(Some)
                .map_err(|err| ConfigurationError::Invalid {
                    key: key.to_string(),
                    reason: err.to_string(),
                }),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigurationError;

    fn from_str(contents: &str) -> Result<Self, Self::Err> {
        let table = toml::from_str::<Table>(contents).map_err(|source| {
            ConfigurationError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            }
        })?;
        Ok(Self { table })
    }
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    /// Explicit plan location; the platform data directory is used when unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub max_turns: u32,
    /// Recoverable turn failures in a row before a session gives up.
    pub max_consecutive_failures: u32,
    /// Mark the active task `Completed` when the model completes it.
    pub complete_task_on_finish: bool,
}

/// Which model backend drives the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `codex exec` subprocess.
    Codex,
    /// Hosted chat-completions endpoint.
    Hub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub program: String,
    /// Directory for the action schema and backend output files.
    pub state_dir: PathBuf,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
    pub model_id: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Directory that relative tool paths resolve against.
    pub workdir: PathBuf,
    pub git_program: String,
    pub git_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub endpoint: String,
    /// Environment variable holding the hosting-platform token.
    pub token_env: String,
}

/// Typed application configuration built from [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub plan: PlanConfig,
    pub agent: AgentConfig,
    pub backend: BackendConfig,
    pub tools: ToolsConfig,
    pub hub: HubConfig,
}

impl AppConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let cfg = Self {
            logging: LoggingConfig {
                level: settings.get_or("logging.level", "warn".to_string())?,
                format: parse_log_format(&settings.get_or("logging.format", "text".to_string())?)?,
                file: settings.get_opt("logging.file")?,
            },
            plan: PlanConfig {
                path: settings.get_opt("plan.path")?,
            },
            agent: AgentConfig {
                max_turns: settings.get_or("agent.max_turns", 10)?,
                max_consecutive_failures: settings.get_or("agent.max_consecutive_failures", 3)?,
                complete_task_on_finish: settings.get_or("agent.complete_task_on_finish", true)?,
            },
            backend: BackendConfig {
                kind: parse_backend_kind(&settings.get_or("backend.kind", "codex".to_string())?)?,
                program: settings.get_or("backend.program", "codex".to_string())?,
                state_dir: settings.get_or("backend.state_dir", PathBuf::from(".taskpilot"))?,
                timeout_secs: settings.get_or("backend.timeout_secs", 600)?,
                output_limit_bytes: settings.get_or("backend.output_limit_bytes", 100_000)?,
                model_id: settings.get_opt("backend.model_id")?,
                endpoint: settings
                    .get_or("backend.endpoint", "https://router.huggingface.co".to_string())?,
            },
            tools: ToolsConfig {
                workdir: settings.get_or("tools.workdir", PathBuf::from("."))?,
                git_program: settings.get_or("tools.git_program", "git".to_string())?,
                git_timeout_secs: settings.get_or("tools.git_timeout_secs", 300)?,
            },
            hub: HubConfig {
                endpoint: settings.get_or("hub.endpoint", "https://huggingface.co".to_string())?,
                token_env: settings.get_or("hub.token_env", "HF_TOKEN".to_string())?,
            },
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.agent.max_turns == 0 {
            return Err(invalid("agent.max_turns", "must be > 0"));
        }
        if self.agent.max_consecutive_failures == 0 {
            return Err(invalid("agent.max_consecutive_failures", "must be > 0"));
        }
        if self.backend.timeout_secs == 0 {
            return Err(invalid("backend.timeout_secs", "must be > 0"));
        }
        if self.backend.output_limit_bytes == 0 {
            return Err(invalid("backend.output_limit_bytes", "must be > 0"));
        }
        if self.backend.program.trim().is_empty() {
            return Err(invalid("backend.program", "must not be empty"));
        }
        if self.tools.git_timeout_secs == 0 {
            return Err(invalid("tools.git_timeout_secs", "must be > 0"));
        }
        if self.hub.token_env.trim().is_empty() {
            return Err(invalid("hub.token_env", "must not be empty"));
        }
        Ok(())
    }

    /// Read the hosting-platform token from the configured environment variable.
    pub fn hub_token(&self) -> Option<String> {
        std::env::var(&self.hub.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// Like [`AppConfig::hub_token`], but a missing token is a configuration error.
    pub fn require_hub_token(&self) -> Result<String, ConfigurationError> {
        self.hub_token()
            .ok_or_else(|| ConfigurationError::MissingCredential {
                var: self.hub.token_env.clone(),
            })
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, ConfigurationError> {
    match raw {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(invalid(
            "logging.format",
            &format!("expected \"text\" or \"json\", got \"{other}\""),
        )),
    }
}

fn parse_backend_kind(raw: &str) -> Result<BackendKind, ConfigurationError> {
    match raw {
        "codex" => Ok(BackendKind::Codex),
        "hub" => Ok(BackendKind::Hub),
        other => Err(invalid(
            "backend.kind",
            &format!("expected \"codex\" or \"hub\", got \"{other}\""),
        )),
    }
}

fn invalid(key: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(settings, Settings::default());

        let cfg = AppConfig::from_settings(&settings).expect("config");
        assert_eq!(cfg.logging.level, "warn");
        assert_eq!(cfg.logging.format, LogFormat::Text);
        assert_eq!(cfg.agent.max_turns, 10);
        assert_eq!(cfg.backend.kind, BackendKind::Codex);
        assert_eq!(cfg.hub.token_env, "HF_TOKEN");
    }

    #[test]
    fn dotted_lookup_reads_nested_tables() {
        let settings: Settings = r#"
            [logging]
            level = "debug"
            format = "json"

            [agent]
            max_turns = 4
        "#
        .parse()
        .expect("parse");

        assert_eq!(
            settings.get("logging.level").and_then(Value::as_str),
            Some("debug")
        );
        assert!(settings.get("logging.missing").is_none());
        assert!(settings.get("logging.level.deeper").is_none());
        assert_eq!(settings.get_or("agent.max_turns", 1u32).expect("get"), 4);
        assert_eq!(settings.get_or("agent.unset", 7u32).expect("get"), 7);

        let cfg = AppConfig::from_settings(&settings).expect("config");
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.agent.max_turns, 4);
    }

    #[test]
    fn wrong_type_is_reported_with_key() {
        let settings: Settings = "[agent]\nmax_turns = \"many\"\n".parse().expect("parse");
        let err = AppConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Invalid { ref key, .. } if key == "agent.max_turns"
        ));
    }

    #[test]
    fn rejects_zero_limits_and_unknown_enums() {
        let settings: Settings = "[agent]\nmax_turns = 0\n".parse().expect("parse");
        assert!(AppConfig::from_settings(&settings).is_err());

        let settings: Settings = "[backend]\nkind = \"carrier-pigeon\"\n".parse().expect("parse");
        let err = AppConfig::from_settings(&settings).unwrap_err();
        assert!(err.to_string().contains("backend.kind"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("taskpilot.toml");
        fs::write(&path, "[logging\nlevel = ").expect("write");
        let err = Settings::load(&path).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let settings: Settings = "[hub]\ntoken_env = \"TASKPILOT_TEST_UNSET_TOKEN\"\n"
            .parse()
            .expect("parse");
        let cfg = AppConfig::from_settings(&settings).expect("config");
        let err = cfg.require_hub_token().unwrap_err();
        assert!(err.to_string().contains("TASKPILOT_TEST_UNSET_TOKEN"));
    }
}
