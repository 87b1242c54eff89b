//! Domain types shared across the workbench.
//!
//! Wire compatibility note: the collaboration protocol predates this crate
//! and uses `"en"`/`"cn"` as the column discriminators and lowercase role
//! names. The serde renames below pin those strings; the Rust names describe
//! the *meaning* (source text vs. translation) rather than the languages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a participant within a collaborative session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Translator,
    Reviewer,
    Admin,
}

impl Role {
    /// Lowercase wire name, as carried in join URLs and roster payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Translator => "translator",
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
        }
    }
}

/// One of the two line-aligned content columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    /// Original-language text (wire name `"en"`).
    #[serde(rename = "en")]
    Source,
    /// Translated text (wire name `"cn"`).
    #[serde(rename = "cn")]
    Target,
}

impl Column {
    /// Wire discriminator used in `edit_type` fields.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Column::Source => "en",
            Column::Target => "cn",
        }
    }

    /// Human-readable label for denial messages and UI.
    pub fn label(&self) -> &'static str {
        match self {
            Column::Source => "source text",
            Column::Target => "translation",
        }
    }
}

/// A participant's presence record within a session roster.
///
/// Entries are never removed once seen; a departed user is only marked
/// offline, which keeps edit and comment attribution stable for the whole
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            is_online: true,
            avatar_url: None,
        }
    }

    /// Display name for a user id when no roster entry is available.
    ///
    /// Mirrors the `User-{id prefix}` fallback used for edit indicators.
    pub fn fallback_name(id: &str) -> String {
        let prefix: String = id.chars().take(8).collect();
        format!("User-{prefix}")
    }

    /// Uppercase initials for avatar rendering (at most two characters).
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(|c| c.to_uppercase())
            .collect()
    }
}

/// Classification of a line comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentType {
    Suggestion,
    Question,
    Approval,
    Correction,
}

/// A comment attached to one line of the document.
///
/// Comments are immutable after creation except for the `is_resolved` flag.
/// Ids are server-assigned; the client never fabricates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub line_number: usize,
    pub content: String,
    pub comment_type: CommentType,
    pub author_id: String,
    pub author_name: String,
    #[serde(default)]
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// Metadata describing the document behind a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "DocumentMeta::default_language_pair")]
    pub language_pair: String,
    pub total_lines: usize,
    pub created_at: DateTime<Utc>,
}

impl DocumentMeta {
    fn default_language_pair() -> String {
        "en-zh".to_string()
    }
}
