//! The REST client.
//!
//! One `ApiClient` per backend; all calls are plain request/response with
//! no retry policy; callers decide what is worth retrying.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;
use crate::types::{
    CreateSessionRequest, CreatedSession, ExportFormat, PreprocessedDocument, Project,
    ProjectProgress, ProjectUpdate, QualityIssue,
};
use verso_core::Role;

/// Typed client for the project/document service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Run a request and decode a JSON body, mapping non-success statuses
    /// to [`ApiError::Status`] with the server's own message when present.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Run a request where only the status matters.
    async fn execute_empty(&self, builder: RequestBuilder) -> Result<(), ApiError> {
        let response = builder.send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = Self::error_message(status, response).await;
        log::warn!("api error {status}: {message}");
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// Pull the human-readable message out of an error body. The service
    /// uses `detail` (FastAPI convention) or `message`; fall back to the
    /// raw body, then to the status text.
    async fn error_message(status: StatusCode, response: reqwest::Response) -> String {
        let body = response.text().await.unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
            for key in ["detail", "message"] {
                if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                    return message.to_string();
                }
            }
        }
        if !body.is_empty() {
            body
        } else {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Projects
    // ───────────────────────────────────────────────────────────────

    pub async fn list_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.execute(self.request(Method::GET, "projects")).await
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.execute(self.request(Method::GET, &format!("projects/{project_id}")))
            .await
    }

    pub async fn create_project<B: Serialize>(&self, body: &B) -> Result<Project, ApiError> {
        self.execute(self.request(Method::POST, "projects").json(body))
            .await
    }

    pub async fn update_project(
        &self,
        project_id: &str,
        update: &ProjectUpdate,
    ) -> Result<Project, ApiError> {
        self.execute(
            self.request(Method::PUT, &format!("projects/{project_id}"))
                .json(update),
        )
        .await
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<(), ApiError> {
        self.execute_empty(self.request(Method::DELETE, &format!("projects/{project_id}")))
            .await
    }

    pub async fn project_progress(&self, project_id: &str) -> Result<ProjectProgress, ApiError> {
        self.execute(self.request(Method::GET, &format!("projects/{project_id}/progress")))
            .await
    }

    /// Persist the translation column outside the realtime channel
    /// (auto-save path driven by the session's change callback).
    pub async fn save_translation(
        &self,
        project_id: &str,
        lines: &[String],
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "translationContent": lines });
        self.execute_empty(
            self.request(Method::PUT, &format!("projects/{project_id}/translation"))
                .json(&body),
        )
        .await
    }

    // ───────────────────────────────────────────────────────────────
    // Documents & collaboration
    // ───────────────────────────────────────────────────────────────

    pub async fn preprocess_document(
        &self,
        filename: &str,
        file_content: &str,
    ) -> Result<PreprocessedDocument, ApiError> {
        let body = serde_json::json!({
            "file_content": file_content,
            "filename": filename,
        });
        self.execute(
            self.request(Method::POST, "documents/preprocess")
                .json(&body),
        )
        .await
    }

    /// Create a collaboration session; the returned id parameterizes the
    /// WebSocket join URL (see `verso_collab::connection::session_url`).
    pub async fn create_collaboration_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, ApiError> {
        self.execute(
            self.request(Method::POST, "collaboration/create-session")
                .json(request),
        )
        .await
    }

    pub async fn run_quality_check(
        &self,
        project_id: &str,
    ) -> Result<Vec<QualityIssue>, ApiError> {
        self.execute(self.request(
            Method::POST,
            &format!("projects/{project_id}/quality-check"),
        ))
        .await
    }

    pub async fn invite_collaborator(
        &self,
        project_id: &str,
        email: &str,
        role: Role,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({ "email": email, "role": role });
        self.execute_empty(
            self.request(
                Method::POST,
                &format!("projects/{project_id}/collaborators"),
            )
            .json(&body),
        )
        .await
    }

    /// Download the rendered document; the caller writes the bytes out.
    pub async fn export_project(
        &self,
        project_id: &str,
        format: ExportFormat,
    ) -> Result<Vec<u8>, ApiError> {
        let response = self
            .request(
                Method::GET,
                &format!("projects/{project_id}/export?format={}", format.as_str()),
            )
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
