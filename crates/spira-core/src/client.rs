//! Blocking Spira REST client.
//!
//! Every call is `{url}/services/v7_0/RestService.svc/{path}` with the
//! username and api key passed as query parameters.

use serde_json::{Value, json};
use std::time::Duration;

use crate::config::CredentialsConfig;
use crate::error::{FetchError, TaskError};
use crate::model::artifact::{Artifact, Category};
use crate::model::project::Project;
use crate::sync::dispatch::{CollectionFetcher, CollectionRequest, FetchResponse};

pub const REST_SERVICE_PATH: &str = "/services/v7_0/RestService.svc/";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and type ids the server treats as defaults for a new task.
const NEW_TASK_STATUS_ID: i64 = 1;
const NEW_TASK_TYPE_ID: i64 = 1;

#[derive(Clone)]
pub struct SpiraClient {
    agent: ureq::Agent,
    credentials: CredentialsConfig,
}

impl std::fmt::Debug for SpiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpiraClient")
            .field("url", &self.credentials.url)
            .field("username", &self.credentials.username)
            .finish_non_exhaustive()
    }
}

impl SpiraClient {
    #[must_use]
    pub fn new(credentials: CredentialsConfig) -> Self {
        Self::with_timeout(credentials, DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(credentials: CredentialsConfig, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("spira/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, credentials }
    }

    /// Full endpoint URL without the credential query.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{REST_SERVICE_PATH}{}",
            self.credentials.url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn get(&self, path: &str) -> Result<FetchResponse, FetchError> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "GET");
        let request = self
            .agent
            .get(&url)
            .set("accept", "application/json")
            .query("username", &self.credentials.username)
            .query("api-key", &self.credentials.api_key);
        into_fetch_response(request.call())
    }

    fn post(&self, path: &str, body: &Value) -> Result<FetchResponse, FetchError> {
        let url = self.endpoint(path);
        tracing::debug!(%url, "POST");
        let request = self
            .agent
            .post(&url)
            .set("accept", "application/json")
            .query("username", &self.credentials.username)
            .query("api-key", &self.credentials.api_key);
        into_fetch_response(request.send_json(body))
    }

    /// Projects visible to the configured user.
    ///
    /// # Errors
    ///
    /// Any transport failure, error status or undecodable body.
    pub fn projects(&self) -> Result<Vec<Project>, FetchError> {
        let response = self.get("projects")?;
        if response.status >= 400 {
            return Err(FetchError::Status(response.status));
        }
        let body = response.body.ok_or(FetchError::MissingBody)?;
        serde_json::from_value(body).map_err(|err| FetchError::Decode(err.to_string()))
    }

    /// Credentials are valid when the project list can be read.
    ///
    /// # Errors
    ///
    /// The error of the underlying [`SpiraClient::projects`] call.
    pub fn verify(&self) -> Result<usize, FetchError> {
        self.projects().map(|projects| projects.len())
    }

    /// Id of the configured user, looked up by username.
    ///
    /// # Errors
    ///
    /// Any transport failure or error status, or a body without a positive
    /// `UserId`.
    pub fn current_user_id(&self) -> Result<i64, FetchError> {
        let response = self.get(&format!("users/usernames/{}", self.credentials.username.trim()))?;
        if response.status >= 400 {
            return Err(FetchError::Status(response.status));
        }
        let body = response.body.ok_or(FetchError::MissingBody)?;
        body.get("UserId")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or_else(|| FetchError::Decode("user record has no UserId".to_string()))
    }

    /// Create a task owned by `owner_id`, with default status and type, in
    /// `project_id`.
    ///
    /// # Errors
    ///
    /// Fails on an empty name, a failed request, or when the server's
    /// task does not carry the requested name.
    pub fn create_task(&self, project_id: i64, owner_id: i64, name: &str) -> Result<Artifact, TaskError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TaskError::EmptyName);
        }

        let payload = json!({
            "Name": name,
            "OwnerId": owner_id,
            "TaskStatusId": NEW_TASK_STATUS_ID,
            "TaskTypeId": NEW_TASK_TYPE_ID,
        });
        let response = self.post(&format!("projects/{project_id}/tasks"), &payload)?;
        if response.status >= 400 {
            return Err(FetchError::Status(response.status).into());
        }
        let body = response.body.ok_or(FetchError::MissingBody)?;

        let actual = body.get("Name").and_then(Value::as_str).unwrap_or_default();
        if actual != name {
            return Err(TaskError::NameMismatch {
                expected: name.to_string(),
                actual: actual.to_string(),
            });
        }
        let task = Artifact::from_record(Category::Task, &body)?;
        tracing::info!(task = %task.composite_key(), project_id, owner_id, "task created");
        Ok(task)
    }
}

impl CollectionFetcher for SpiraClient {
    fn fetch(&self, request: &CollectionRequest) -> Result<FetchResponse, FetchError> {
        self.get(request.category.collection())
    }
}

/// Error statuses become responses so callers decide how to classify them.
fn into_fetch_response(
    result: Result<ureq::Response, ureq::Error>,
) -> Result<FetchResponse, FetchError> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(status, _)) => return Ok(FetchResponse::status(status)),
        Err(ureq::Error::Transport(transport)) => {
            return Err(FetchError::Transport(transport.to_string()));
        }
    };

    let status = response.status();
    let text = response
        .into_string()
        .map_err(|err| FetchError::Decode(err.to_string()))?;
    if text.trim().is_empty() {
        return Ok(FetchResponse { status, body: None });
    }
    let body = serde_json::from_str(&text).map_err(|err| FetchError::Decode(err.to_string()))?;
    Ok(FetchResponse {
        status,
        body: Some(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> SpiraClient {
        SpiraClient::new(CredentialsConfig {
            url: url.into(),
            username: "fredbloggs".into(),
            api_key: "{SECRET}".into(),
        })
    }

    #[test]
    fn endpoint_joins_base_and_collection() {
        assert_eq!(
            client("https://demo.spiraservice.net/acme").endpoint("tasks"),
            "https://demo.spiraservice.net/acme/services/v7_0/RestService.svc/tasks"
        );
        assert_eq!(
            client("https://demo/SpiraPlan/").endpoint("/projects/3/tasks"),
            "https://demo/SpiraPlan/services/v7_0/RestService.svc/projects/3/tasks"
        );
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", client("https://demo"));
        assert!(rendered.contains("fredbloggs"));
        assert!(!rendered.contains("SECRET"));
    }

    #[test]
    fn empty_task_name_is_rejected_before_any_request() {
        let result = client("http://127.0.0.1:9").create_task(1, 5, "   ");
        assert_eq!(result, Err(TaskError::EmptyName));
    }

    #[test]
    fn unreachable_server_is_a_transport_error() {
        let client = SpiraClient::with_timeout(
            CredentialsConfig {
                url: "http://127.0.0.1:1".into(),
                ..CredentialsConfig::default()
            },
            Duration::from_millis(500),
        );
        let result = client.fetch(&CollectionRequest {
            cycle: crate::sync::cycle::CycleId::new(1),
            category: Category::Task,
        });
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }
}
