//! # verso-core — shared domain model for the verso workbench
//!
//! Session-scoped types for collaborative bilingual editing: users and
//! roles, the two aligned content columns, line comments, document
//! metadata, and the role-based permission oracle.
//!
//! This crate is deliberately free of I/O and async: everything here is
//! plain data consumed by `verso-collab` (the realtime engine) and
//! `verso-api` (the REST client).

pub mod model;
pub mod permissions;

// Re-exports for convenience
pub use model::{Column, Comment, CommentType, DocumentMeta, Role, User};
pub use permissions::{ColumnRules, PermissionOracle};
