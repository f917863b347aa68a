//! Model-hosting platform operations: token check and repository creation.

use std::cell::RefCell;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;

use super::{Tool, str_param};
use crate::core::action::Parameters;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum HubError {
    #[error("unsupported operation '{0}' for huggingface_hub")]
    UnsupportedOperation(String),
    #[error("'{0}' parameter is required for the {1} operation")]
    MissingParameter(&'static str, &'static str),
    #[error("no token given and no hub credential configured")]
    MissingToken,
    #[error("invalid repo_type '{0}'; expected model, dataset or space")]
    InvalidRepoType(String),
    #[error("hub request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("hub request failed: {0}")]
    Transport(String),
    #[error("unexpected hub response: {0}")]
    Response(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        match raw {
            "model" => Ok(Self::Model),
            "dataset" => Ok(Self::Dataset),
            "space" => Ok(Self::Space),
            other => Err(HubError::InvalidRepoType(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Dataset => "dataset",
            Self::Space => "space",
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRepoRequest {
    /// `name` or `namespace/name`.
    pub repo_id: String,
    pub repo_type: RepoType,
    pub private: bool,
}

/// Remote operations the hub tool needs.
pub trait HubApi {
    /// Account name the token belongs to.
    fn whoami(&self, token: &str) -> Result<String, HubError>;
    /// Create a repository and return its URL.
    fn create_repo(&self, token: &str, request: &CreateRepoRequest) -> Result<String, HubError>;
}

/// [`HubApi`] over the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpHubApi {
    agent: ureq::Agent,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRepo {
    url: String,
}

impl HttpHubApi {
    pub fn new(endpoint: &str) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn send(
        &self,
        request: ureq::Request,
        body: Option<Value>,
    ) -> Result<ureq::Response, HubError> {
        let result = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let message = response
                    .into_json::<Value>()
                    .ok()
                    .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| "no error message".to_string());
                Err(HubError::Status { status, message })
            }
            Err(err) => Err(HubError::Transport(err.to_string())),
        }
    }
}

impl HubApi for HttpHubApi {
    fn whoami(&self, token: &str) -> Result<String, HubError> {
        let request = self
            .agent
            .get(&format!("{}/api/whoami-v2", self.endpoint))
            .set("Authorization", &format!("Bearer {token}"));
        let body: WhoAmI = self
            .send(request, None)?
            .into_json()
            .map_err(|err| HubError::Response(err.to_string()))?;
        Ok(body.name)
    }

    fn create_repo(&self, token: &str, request: &CreateRepoRequest) -> Result<String, HubError> {
        let (organization, name) = match request.repo_id.split_once('/') {
            Some((org, name)) => (Some(org), name),
            None => (None, request.repo_id.as_str()),
        };
        let mut body = json!({"name": name, "private": request.private});
        if let Some(org) = organization {
            body["organization"] = json!(org);
        }
        if request.repo_type != RepoType::Model {
            body["type"] = json!(request.repo_type.as_str());
        }
        let http = self
            .agent
            .post(&format!("{}/api/repos/create", self.endpoint))
            .set("Authorization", &format!("Bearer {token}"));
        let created: CreatedRepo = self
            .send(http, Some(body))?
            .into_json()
            .map_err(|err| HubError::Response(err.to_string()))?;
        Ok(created.url)
    }
}

/// `huggingface_hub` tool: `login` and `create_repo`.
///
/// A token verified by `login` is kept for later calls of the same tool.
pub struct HubTool<A = HttpHubApi> {
    api: A,
    configured_token: Option<String>,
    session_token: RefCell<Option<String>>,
}

impl<A: HubApi> HubTool<A> {
    /// `token` is the configured credential, used when neither the call nor a
    /// previous `login` supplies one.
    pub fn new(api: A, token: Option<String>) -> Self {
        Self {
            api,
            configured_token: token,
            session_token: RefCell::new(None),
        }
    }

    fn token(&self, parameters: &Parameters) -> Result<String, HubError> {
        str_param(parameters, "token")
            .map(str::to_string)
            .or_else(|| self.session_token.borrow().clone())
            .or_else(|| self.configured_token.clone())
            .ok_or(HubError::MissingToken)
    }

    fn login(&self, parameters: &Parameters) -> Result<String, HubError> {
        let token = self.token(parameters)?;
        let user = self.api.whoami(&token)?;
        *self.session_token.borrow_mut() = Some(token);
        info!(%user, "hub token verified");
        Ok(format!("Successfully logged in to the Hugging Face Hub as {user}."))
    }

    fn create_repo(&self, parameters: &Parameters) -> Result<String, HubError> {
        let repo_id = str_param(parameters, "repo_id")
            .ok_or(HubError::MissingParameter("repo_id", "create_repo"))?;
        let repo_type = str_param(parameters, "repo_type")
            .map(RepoType::parse)
            .transpose()?
            .unwrap_or_default();
        let request = CreateRepoRequest {
            repo_id: repo_id.to_string(),
            repo_type,
            private: parameters
                .get("private")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        let url = self.api.create_repo(&self.token(parameters)?, &request)?;
        info!(repo_id, %repo_type, "hub repository created");
        Ok(format!("Successfully created repository: {url}"))
    }
}

impl<A: HubApi> Tool for HubTool<A> {
    fn description(&self) -> &str {
        "Hugging Face Hub operations. Parameters: operation (\"login\" or \"create_repo\", \
         required), token (string, optional), repo_id (string, required for create_repo), \
         repo_type (\"model\", \"dataset\" or \"space\"), private (bool)."
    }

    fn run(&self, parameters: &Parameters) -> anyhow::Result<String> {
        let result = match parameters.get("operation").and_then(Value::as_str) {
            Some("login") => self.login(parameters),
            Some("create_repo") => self.create_repo(parameters),
            Some(other) => Err(HubError::UnsupportedOperation(other.to_string())),
            None => Err(HubError::MissingParameter("operation", "huggingface_hub")),
        };
        Ok(result?)
    }
}
