//! Model backends: turn a prompt into one JSON value.
//!
//! The [`ModelBackend`] trait decouples the control loop from how the model is
//! reached. [`CodexBackend`] runs `codex exec` as a subprocess;
//! [`HubInferenceBackend`] calls a hosted chat-completions endpoint. Tests use
//! scripted backends that return canned values.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Context;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::{ConfigurationError, ModelError};
use crate::io::config::BackendConfig;
use crate::io::process::{ProcessOutput, run_bounded};

/// Flat form of the action contract accepted by strict structured output:
/// every property required, absent fields as `null`, `parameters` as JSON text.
const CODEX_OUTPUT_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/action/codex_output.schema.json"
));

const SCHEMA_FILE: &str = "action.schema.json";
const OUTPUT_FILE: &str = "last_message.json";
const LOG_FILE: &str = "backend.log";

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*\n(.*?)\n?\s*```\s*$").expect("fence pattern is valid")
});

/// Source of structured model output.
pub trait ModelBackend {
    /// Send `prompt` and return the parsed JSON reply.
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError>;
}

impl<B: ModelBackend + ?Sized> ModelBackend for Box<B> {
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError> {
        (**self).get_structured_response(prompt)
    }
}

impl<B: ModelBackend + ?Sized> ModelBackend for &B {
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError> {
        (**self).get_structured_response(prompt)
    }
}

/// Parse model text as JSON, tolerating a surrounding markdown code fence.
pub fn parse_json_response(text: &str) -> Result<Value, ModelError> {
    let body = match FENCE_RE.captures(text) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => text,
    };
    let body = body.trim();
    if body.is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(serde_json::from_str(body)?)
}

/// Turn a reply shaped by the strict output schema back into the action
/// contract: `null` fields are dropped and `parameters` text is parsed.
///
/// Anything unexpected is passed through for the action validator to reject.
pub fn normalize_codex_reply(reply: Value) -> Value {
    let Value::Object(mut object) = reply else {
        return reply;
    };
    object.retain(|_, value| !value.is_null());
    let parsed = match object.get("parameters") {
        Some(Value::String(text)) => serde_json::from_str::<Value>(text)
            .ok()
            .filter(Value::is_object),
        _ => None,
    };
    if let Some(parsed) = parsed {
        object.insert("parameters".to_string(), parsed);
    }
    Value::Object(object)
}

/// Backend that spawns `codex exec` with the strict action schema as its
/// output schema.
#[derive(Debug, Clone)]
pub struct CodexBackend {
    program: String,
    workdir: PathBuf,
    state_dir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CodexBackend {
    /// Prepare the state directory and write the output schema into it.
    pub fn new(cfg: &BackendConfig, workdir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        fs::create_dir_all(&cfg.state_dir)
            .with_context(|| format!("create backend state dir {}", cfg.state_dir.display()))?;
        let schema_path = cfg.state_dir.join(SCHEMA_FILE);
        fs::write(&schema_path, CODEX_OUTPUT_SCHEMA)
            .with_context(|| format!("write output schema {}", schema_path.display()))?;
        Ok(Self {
            program: cfg.program.clone(),
            workdir: workdir.into(),
            state_dir: cfg.state_dir.clone(),
            timeout: Duration::from_secs(cfg.timeout_secs),
            output_limit_bytes: cfg.output_limit_bytes,
        })
    }

    fn schema_path(&self) -> PathBuf {
        self.state_dir.join(SCHEMA_FILE)
    }

    fn output_path(&self) -> PathBuf {
        self.state_dir.join(OUTPUT_FILE)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("exec")
            .arg("--sandbox")
            .arg("read-only")
            .arg("--skip-git-repo-check")
            .arg("--output-schema")
            .arg(absolute(&self.schema_path()))
            .arg("--output-last-message")
            .arg(absolute(&self.output_path()))
            .arg("-")
            .current_dir(&self.workdir);
        cmd
    }
}

impl ModelBackend for CodexBackend {
    #[instrument(skip_all, fields(program = %self.program, timeout_secs = self.timeout.as_secs()))]
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError> {
        let output_path = self.output_path();
        if output_path.exists()
            && let Err(err) = fs::remove_file(&output_path)
        {
            warn!(%err, path = %output_path.display(), "could not remove stale backend output");
        }

        info!("invoking codex exec");
        let output = run_bounded(
            self.command(),
            Some(prompt.as_bytes().to_vec()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|source| ModelError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        write_log(&self.state_dir.join(LOG_FILE), &output);

        if output.timed_out {
            return Err(ModelError::TimedOut(self.timeout));
        }
        if !output.status.success() {
            warn!(
                code = ?output.status.code(),
                stderr = %output.stderr_summary(),
                "codex exec failed"
            );
            return Err(ModelError::Failed {
                status: output.status.code(),
            });
        }

        let text = fs::read_to_string(&output_path)
            .map_err(|_| ModelError::MissingOutput(output_path.clone()))?;
        debug!(bytes = text.len(), "read backend output");
        parse_json_response(&text).map(normalize_codex_reply)
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

fn write_log(path: &Path, output: &ProcessOutput) {
    let mut buf = String::from("=== stdout ===\n");
    buf.push_str(&output.stdout_text());
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr_summary());
    buf.push('\n');
    if let Err(err) = fs::write(path, buf) {
        warn!(%err, path = %path.display(), "could not write backend log");
    }
}

/// Backend that calls an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct HubInferenceBackend {
    agent: ureq::Agent,
    url: String,
    model_id: String,
    token: Option<String>,
}

impl HubInferenceBackend {
    pub fn new(cfg: &BackendConfig, token: Option<String>) -> Result<Self, ConfigurationError> {
        let model_id = cfg
            .model_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ConfigurationError::Invalid {
                key: "backend.model_id".to_string(),
                reason: "required when backend.kind = \"hub\"".to_string(),
            })?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build();
        Ok(Self {
            agent,
            url: format!("{}/v1/chat/completions", cfg.endpoint.trim_end_matches('/')),
            model_id,
            token,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model_id,
            "messages": [{"role": "user", "content": prompt}],
            "response_format": {"type": "json_object"},
        })
    }
}

impl ModelBackend for HubInferenceBackend {
    #[instrument(skip_all, fields(model = %self.model_id))]
    fn get_structured_response(&self, prompt: &str) -> Result<Value, ModelError> {
        let mut request = self.agent.post(&self.url);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        info!(url = %self.url, "requesting chat completion");
        let response = match request.send_json(self.request_body(prompt)) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(ModelError::Http(format!("status {code}: {}", body.trim())));
            }
            Err(err) => return Err(ModelError::Http(err.to_string())),
        };
        let body: Value = response
            .into_json()
            .map_err(|err| ModelError::Http(format!("read response: {err}")))?;

        parse_json_response(extract_message_content(&body)?)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions reply.
pub fn extract_message_content(body: &Value) -> Result<&str, ModelError> {
    if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
        return Err(ModelError::Backend(message.to_string()));
    }
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or(ModelError::EmptyResponse)
}
