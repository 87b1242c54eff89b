//! # verso-collab — realtime collaboration engine for the verso workbench
//!
//! Client-side machinery for multi-user bilingual document editing over a
//! WebSocket channel: optimistic local edits, last-writer-wins remote
//! edits, echo-gated comments, and presence.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   ConnectionEvent    ┌───────────────────┐
//! │ Connection     │ ───────────────────► │ CollabSession     │
//! │ Manager        │ ◄─────────────────── │ (state machine)   │
//! │ (WebSocket)    │    ClientMessage     └────────┬──────────┘
//! └────────────────┘                               │ SessionEvent
//!                                         ┌────────┴──────────┐
//!                                         ▼                   ▼
//!                                  ┌────────────┐     ┌──────────────┐
//!                                  │ LineEditor │     │ Presence /   │
//!                                  │ (per line) │     │ CommentPanel │
//!                                  └────────────┘     └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON `{type, data}` wire envelope and typed messages
//! - [`connection`] — channel lifecycle with bounded reconnect
//! - [`session`] — the collaborative session state machine
//! - [`editor`] — per-line display/editing state machine
//! - [`surfaces`] — read-only roster and comment projections
//!
//! ## Wiring
//!
//! The host owns the event loop: it pumps connection events into the
//! session and drains session events into its renderer.
//!
//! ```no_run
//! use verso_collab::connection::{ConnectionConfig, ConnectionManager, session_url};
//! use verso_collab::session::{CollabSession, SessionConfig};
//! use verso_core::{ColumnRules, Role, User};
//!
//! # async fn wire(source: Vec<String>, target: Vec<String>) {
//! let me = User::new("u1", "Ada", Role::Translator);
//! let mut conn = ConnectionManager::new(ConnectionConfig::default());
//! let mut events = conn.take_event_rx().expect("fresh manager");
//! conn.connect(session_url("ws://localhost:8000/api/v1/collaboration/ws", "s1", &me));
//!
//! let mut session = CollabSession::new(
//!     "s1", me, source, target,
//!     Box::new(conn), Box::new(ColumnRules),
//!     SessionConfig::default(),
//! ).expect("aligned columns");
//!
//! while let Some(event) = events.recv().await {
//!     session.handle_connection_event(event);
//!     for ui_event in session.drain_events() {
//!         // hand to the renderer
//!         let _ = ui_event;
//!     }
//! }
//! # }
//! ```

pub mod connection;
pub mod editor;
pub mod protocol;
pub mod session;
pub mod surfaces;

// Re-exports for convenience
pub use connection::{
    session_url, ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState,
};
pub use editor::{Commit, LineEditor, LineState};
pub use protocol::{
    ClientMessage, CommentDraft, ContentSyncPayload, CursorPayload, EditPayload, Envelope,
    ProtocolError, ServerMessage,
};
pub use session::{
    CollabSession, MessageSink, RemoteCursor, SessionConfig, SessionError, SessionEvent,
};
pub use surfaces::{CommentPanel, PresenceList};
