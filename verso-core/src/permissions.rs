//! Role-based edit permissions.
//!
//! The oracle is a pure function of (role, column) with no session state.
//! Every local edit is checked against it before any state mutation or
//! network traffic; a denial must surface to the user, never silently drop.

use crate::model::{Column, Role};

/// Decides whether a role may edit a column.
///
/// The realtime session consults this before applying any local edit, and
/// line editors consult it to decide whether a line can enter editing at
/// all. Implementations must be side-effect free.
pub trait PermissionOracle {
    fn can_edit(&self, role: Role, column: Column) -> bool;

    /// User-facing denial message. Only consulted when `can_edit` is false.
    fn deny_reason(&self, role: Role, column: Column) -> String {
        format!("{} role may not edit the {}", role.as_str(), column.label())
    }
}

/// The production rule table:
///
/// - the source column is editable by admins only;
/// - the translation column is editable by everyone except reviewers
///   (reviewers annotate, they do not rewrite).
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnRules;

impl PermissionOracle for ColumnRules {
    fn can_edit(&self, role: Role, column: Column) -> bool {
        match column {
            Column::Source => role == Role::Admin,
            Column::Target => role != Role::Reviewer,
        }
    }

    fn deny_reason(&self, _role: Role, column: Column) -> String {
        match column {
            Column::Source => "Only admins may edit the source text".to_string(),
            Column::Target => "Reviewers may not edit the translation".to_string(),
        }
    }
}
