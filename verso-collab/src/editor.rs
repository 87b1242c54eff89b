//! Per-line editor state machine.
//!
//! One `LineEditor` backs one rendered line of one column. It owns only
//! the transient draft buffer and the display/editing mode; persistence is
//! the session's job; a commit hands the new content back to the caller,
//! who forwards it to [`crate::session::CollabSession::apply_local_edit`].
//!
//! While a line is being edited, upstream changes to the same line update
//! the session model but not the draft: the in-progress edit wins visually
//! and will overwrite on commit, consistent with the session's
//! last-writer-wins policy.

use verso_core::{Column, Comment, PermissionOracle, Role};

/// Display mode of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Display,
    Editing,
}

/// Result of leaving edit mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Commit {
    /// The draft differed; the caller must forward it to the session.
    Changed(String),
    /// Nothing changed; equivalent to a cancel, no traffic.
    Unchanged,
}

/// UI state machine for a single (line, column) slot.
#[derive(Debug, Clone)]
pub struct LineEditor {
    line_number: usize,
    column: Column,
    editable: bool,
    state: LineState,
    committed: String,
    draft: String,
}

impl LineEditor {
    pub fn new(
        line_number: usize,
        column: Column,
        content: impl Into<String>,
        editable: bool,
    ) -> Self {
        let committed = content.into();
        Self {
            line_number,
            column,
            editable,
            state: LineState::Display,
            draft: committed.clone(),
            committed,
        }
    }

    /// Construct with editability derived from the permission oracle.
    pub fn for_role(
        line_number: usize,
        column: Column,
        content: impl Into<String>,
        role: Role,
        oracle: &dyn PermissionOracle,
    ) -> Self {
        Self::new(line_number, column, content, oracle.can_edit(role, column))
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn column(&self) -> Column {
        self.column
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    pub fn is_editing(&self) -> bool {
        self.state == LineState::Editing
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// What the line should currently render: the draft while editing,
    /// the committed content otherwise.
    pub fn display_text(&self) -> &str {
        match self.state {
            LineState::Editing => &self.draft,
            LineState::Display => &self.committed,
        }
    }

    /// Enter edit mode. Read-only lines never enter editing.
    pub fn begin_edit(&mut self) -> bool {
        if !self.editable || self.state == LineState::Editing {
            return false;
        }
        self.draft = self.committed.clone();
        self.state = LineState::Editing;
        true
    }

    /// Replace the draft buffer (keystroke updates).
    pub fn input(&mut self, text: impl Into<String>) {
        if self.state == LineState::Editing {
            self.draft = text.into();
        }
    }

    /// Leave edit mode, keeping the draft if it changed.
    pub fn commit(&mut self) -> Commit {
        if self.state != LineState::Editing {
            return Commit::Unchanged;
        }
        self.state = LineState::Display;
        if self.draft != self.committed {
            self.committed = self.draft.clone();
            Commit::Changed(self.committed.clone())
        } else {
            Commit::Unchanged
        }
    }

    /// Discard the draft and leave edit mode. No traffic.
    pub fn cancel(&mut self) {
        self.draft = self.committed.clone();
        self.state = LineState::Display;
    }

    /// Losing focus is an implicit commit.
    pub fn blur(&mut self) -> Commit {
        self.commit()
    }

    /// Pull the latest committed content from the session model.
    ///
    /// Applied only in display state, so a remote edit to a line the user
    /// is not touching always shows up; while editing, the draft wins.
    pub fn sync_from_model(&mut self, content: &str) {
        if self.state == LineState::Display && self.committed != content {
            self.committed = content.to_string();
            self.draft = self.committed.clone();
        }
    }

    /// Badge count for the comment affordance on this line: unresolved
    /// comments if any remain, otherwise the total; `None` hides the badge.
    pub fn comment_badge<'a>(
        &self,
        comments: impl IntoIterator<Item = &'a Comment>,
    ) -> Option<usize> {
        let mut total = 0usize;
        let mut unresolved = 0usize;
        for comment in comments {
            if comment.line_number != self.line_number {
                continue;
            }
            total += 1;
            if !comment.is_resolved {
                unresolved += 1;
            }
        }
        match (total, unresolved) {
            (0, _) => None,
            (total, 0) => Some(total),
            (_, unresolved) => Some(unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use verso_core::{ColumnRules, CommentType};

    fn comment(id: &str, line: usize, resolved: bool) -> Comment {
        Comment {
            id: id.to_string(),
            session_id: None,
            line_number: line,
            content: "note".to_string(),
            comment_type: CommentType::Suggestion,
            author_id: "u1".to_string(),
            author_name: "Ada".to_string(),
            is_resolved: resolved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_read_only_never_enters_editing() {
        let mut editor = LineEditor::for_role(
            0,
            Column::Source,
            "original",
            Role::Translator,
            &ColumnRules,
        );
        assert!(!editor.is_editable());
        assert!(!editor.begin_edit());
        assert_eq!(editor.state(), LineState::Display);
    }

    #[test]
    fn test_editable_by_role() {
        let editor =
            LineEditor::for_role(0, Column::Target, "", Role::Translator, &ColumnRules);
        assert!(editor.is_editable());

        let editor = LineEditor::for_role(0, Column::Target, "", Role::Reviewer, &ColumnRules);
        assert!(!editor.is_editable());
    }

    #[test]
    fn test_commit_changed_draft() {
        let mut editor = LineEditor::new(2, Column::Target, "old", true);
        assert!(editor.begin_edit());
        editor.input("new");
        assert_eq!(editor.display_text(), "new");

        assert_eq!(editor.commit(), Commit::Changed("new".to_string()));
        assert_eq!(editor.state(), LineState::Display);
        assert_eq!(editor.display_text(), "new");
    }

    #[test]
    fn test_commit_unchanged_is_noop() {
        let mut editor = LineEditor::new(0, Column::Target, "same", true);
        editor.begin_edit();
        editor.input("same");
        assert_eq!(editor.commit(), Commit::Unchanged);
    }

    #[test]
    fn test_cancel_reverts_draft() {
        let mut editor = LineEditor::new(0, Column::Target, "keep", true);
        editor.begin_edit();
        editor.input("discard me");
        editor.cancel();

        assert_eq!(editor.state(), LineState::Display);
        assert_eq!(editor.display_text(), "keep");
        // Re-entering starts from committed content, not the stale draft.
        editor.begin_edit();
        assert_eq!(editor.display_text(), "keep");
    }

    #[test]
    fn test_blur_is_implicit_commit() {
        let mut editor = LineEditor::new(0, Column::Target, "a", true);
        editor.begin_edit();
        editor.input("b");
        assert_eq!(editor.blur(), Commit::Changed("b".to_string()));
    }

    #[test]
    fn test_sync_from_model_in_display() {
        let mut editor = LineEditor::new(0, Column::Target, "old", true);
        editor.sync_from_model("remote update");
        assert_eq!(editor.display_text(), "remote update");
    }

    #[test]
    fn test_sync_ignored_while_editing_then_commit_wins() {
        let mut editor = LineEditor::new(0, Column::Target, "base", true);
        editor.begin_edit();
        editor.input("local draft");

        // Concurrent remote edit arrives while editing: draft untouched.
        editor.sync_from_model("remote winner?");
        assert_eq!(editor.display_text(), "local draft");

        // The local commit supersedes it: last writer wins.
        assert_eq!(editor.commit(), Commit::Changed("local draft".to_string()));
        assert_eq!(editor.display_text(), "local draft");
    }

    #[test]
    fn test_comment_badge_counts() {
        let editor = LineEditor::new(3, Column::Target, "", true);

        assert_eq!(editor.comment_badge(std::iter::empty()), None);

        let comments = [
            comment("c1", 3, false),
            comment("c2", 3, true),
            comment("c3", 7, false), // other line: ignored
        ];
        assert_eq!(editor.comment_badge(comments.iter()), Some(1));

        let all_resolved = [comment("c1", 3, true), comment("c2", 3, true)];
        assert_eq!(editor.comment_badge(all_resolved.iter()), Some(2));
    }
}
