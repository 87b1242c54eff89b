//! Request/response bodies for the project service.
//!
//! The project endpoints speak camelCase JSON; the collaboration
//! endpoints speak snake_case. The serde attributes below pin each shape
//! to what the service actually sends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use verso_core::{DocumentMeta, Role};

/// A translation project as returned by the project endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub original_content: Vec<String>,
    #[serde(default)]
    pub translation_content: Vec<String>,
    pub metadata: ProjectMeta,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    InProgress,
    Review,
    Completed,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub language_pair: String,
    pub total_lines: usize,
    #[serde(default)]
    pub completed_lines: usize,
    /// Report produced by document preprocessing; passed through opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_report: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub status: CollaboratorStatus,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollaboratorStatus {
    Active,
    Inactive,
}

/// Partial update for `PUT /projects/{id}`. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_content: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectProgress {
    pub total_lines: usize,
    pub translated_lines: usize,
    pub reviewed_lines: usize,
    pub completion_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub id: String,
    pub line_number: usize,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub is_resolved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Alignment,
    Translation,
    Formatting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Body for `POST /collaboration/create-session` (snake_case endpoint).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSessionRequest {
    pub document_id: String,
    pub en_content: Vec<String>,
    pub cn_content: Vec<String>,
    pub metadata: DocumentMeta,
    pub creator_id: String,
}

/// Response of the session-creation endpoint; the id keys the WebSocket
/// join URL.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreatedSession {
    pub session_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of `POST /documents/preprocess`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreprocessedDocument {
    pub cleaned_content: String,
    #[serde(default)]
    pub processing_report: serde_json::Value,
}

/// Export container formats offered by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Txt,
    Html,
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Html => "html",
            ExportFormat::Pdf => "pdf",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_wire_shape() {
        let json = r#"{
            "id": "p1",
            "name": "Chapter 1",
            "status": "in_progress",
            "originalContent": ["Hello"],
            "translationContent": ["你好"],
            "metadata": {
                "title": "Chapter 1",
                "languagePair": "en-zh",
                "totalLines": 1,
                "completedLines": 1
            },
            "collaborators": [],
            "createdAt": "2025-03-01T00:00:00Z",
            "updatedAt": "2025-03-02T00:00:00Z",
            "createdBy": "u1"
        }"#;

        let project: Project = serde_json::from_str(json).unwrap();
        assert_eq!(project.status, ProjectStatus::InProgress);
        assert_eq!(project.metadata.total_lines, 1);
        assert_eq!(project.translation_content, vec!["你好"]);
    }

    #[test]
    fn test_quality_issue_wire_shape() {
        let json = r#"{
            "id": "q1",
            "lineNumber": 4,
            "type": "alignment",
            "severity": "high",
            "description": "source and translation diverge in length"
        }"#;
        let issue: QualityIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.kind, IssueKind::Alignment);
        assert_eq!(issue.severity, Severity::High);
        assert!(!issue.is_resolved);
    }

    #[test]
    fn test_project_update_serializes_only_set_fields() {
        let update = ProjectUpdate {
            translation_content: Some(vec!["一".to_string()]),
            ..ProjectUpdate::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        assert_eq!(value["translationContent"][0], "一");
        assert!(value.get("name").is_none());
        assert!(value.get("status").is_none());
    }

    #[test]
    fn test_create_session_request_is_snake_case() {
        let request = CreateSessionRequest {
            document_id: "d1".to_string(),
            en_content: vec!["Hello".to_string()],
            cn_content: vec!["你好".to_string()],
            metadata: serde_json::from_str(
                r#"{"title":"Doc","total_lines":1,"created_at":"2025-03-01T00:00:00Z"}"#,
            )
            .unwrap(),
            creator_id: "u1".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["document_id"], "d1");
        assert_eq!(value["en_content"][0], "Hello");
        assert_eq!(value["metadata"]["language_pair"], "en-zh");
    }

    #[test]
    fn test_export_format_names() {
        assert_eq!(ExportFormat::Txt.as_str(), "txt");
        assert_eq!(ExportFormat::Html.as_str(), "html");
        assert_eq!(ExportFormat::Pdf.as_str(), "pdf");
    }
}
