//! Read-only projections of session state for the presence and comment
//! panels.
//!
//! These types own nothing but local filter/sort selections; all document
//! and roster state lives in the session. Mutating actions (resolve a
//! comment, invite a collaborator) are forwarded to the session or the
//! REST client by the host, never performed here.

use std::collections::HashMap;

use verso_core::{Comment, User};

/// Projection of the roster into the collaboration indicator.
#[derive(Debug, Clone, Default)]
pub struct PresenceList {
    /// When false, departed users are hidden instead of greyed out.
    pub show_offline: bool,
}

impl PresenceList {
    pub fn new() -> Self {
        Self { show_offline: true }
    }

    /// Number of users currently online.
    pub fn online_count(roster: &HashMap<String, User>) -> usize {
        roster.values().filter(|user| user.is_online).count()
    }

    /// Roster entries for the avatar list: online users first, each group
    /// ordered by display name.
    pub fn entries<'a>(&self, roster: &'a HashMap<String, User>) -> Vec<&'a User> {
        let mut users: Vec<&User> = roster
            .values()
            .filter(|user| self.show_offline || user.is_online)
            .collect();
        users.sort_by(|a, b| {
            b.is_online
                .cmp(&a.is_online)
                .then_with(|| a.name.cmp(&b.name))
        });
        users
    }
}

/// Projection of the comment set into the side panel.
#[derive(Debug, Clone, Default)]
pub struct CommentPanel {
    /// Restrict to one line (the selected line), or show all.
    pub line_filter: Option<usize>,
    /// Include resolved comments in `visible`.
    pub show_resolved: bool,
}

impl CommentPanel {
    pub fn new() -> Self {
        Self {
            line_filter: None,
            show_resolved: true,
        }
    }

    /// Comments matching the current filter, ordered by line then by
    /// creation time (the set itself is unordered).
    pub fn visible<'a>(&self, comments: impl IntoIterator<Item = &'a Comment>) -> Vec<&'a Comment> {
        let mut visible: Vec<&Comment> = comments
            .into_iter()
            .filter(|comment| self.show_resolved || !comment.is_resolved)
            .filter(|comment| {
                self.line_filter
                    .map_or(true, |line| comment.line_number == line)
            })
            .collect();
        visible.sort_by(|a, b| {
            a.line_number
                .cmp(&b.line_number)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        visible
    }

    /// Split into (open, resolved), both filter-respecting and ordered.
    pub fn grouped<'a>(
        &self,
        comments: impl IntoIterator<Item = &'a Comment>,
    ) -> (Vec<&'a Comment>, Vec<&'a Comment>) {
        self.visible(comments)
            .into_iter()
            .partition(|comment| !comment.is_resolved)
    }

    /// Open-comment count across the whole set (the toggle-button label).
    pub fn unresolved_count<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> usize {
        comments
            .into_iter()
            .filter(|comment| !comment.is_resolved)
            .count()
    }
}
