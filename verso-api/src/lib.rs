//! # verso-api — REST client for the project/document service
//!
//! Thin typed proxies over the workbench's surrounding service: project
//! CRUD, document preprocessing, collaboration-session creation, quality
//! checks, collaborator invites, and export. Request/response only: no
//! realtime concerns (those live in `verso-collab`) and no caching or
//! retry policy of its own.

pub mod client;
pub mod error;
pub mod types;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{
    Collaborator, CreateSessionRequest, CreatedSession, ExportFormat, IssueKind,
    PreprocessedDocument, Project, ProjectMeta, ProjectProgress, ProjectStatus, ProjectUpdate,
    QualityIssue, Severity,
};
