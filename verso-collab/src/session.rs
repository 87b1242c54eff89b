//! Collaborative session state machine.
//!
//! Holds the dual-column line content, the comment set, the presence
//! roster, and remote cursors for one open document, and reconciles three
//! input streams:
//!
//! - local edits: permission-checked, applied optimistically, then
//!   serialized outward (a failed transmit never rolls the local state
//!   back; the server's join-time `content_sync` is the resync path)
//! - remote messages: applied idempotently, echoes of our own edits
//!   discarded, conflicting line writes resolved last-writer-wins
//! - connection lifecycle: surfaced as events for the persistent
//!   connected/reconnecting/disconnected indicator
//!
//! Comments are the deliberate asymmetry: local submissions are NOT
//! inserted optimistically; the set changes only when the server echo
//! arrives.
//!
//! All mutation funnels through this type (single-writer discipline); UI
//! components only read projections and forward intents. Nothing here
//! panics on a bad inbound message: decode and validation failures are
//! logged and dropped per message.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use thiserror::Error;

use verso_core::{Column, Comment, CommentType, PermissionOracle, User};

use crate::connection::{ConnectionEvent, ConnectionState};
use crate::protocol::{
    ClientMessage, CommentDraft, ContentSyncPayload, CursorPayload, EditPayload, Envelope,
    ServerMessage, SessionStatePayload, UserJoinPayload, UserLeavePayload,
};

/// Outbound side of the collaboration channel, as seen by the session.
///
/// `ConnectionManager` is the production implementation; tests substitute a
/// recording sink. `send` must return immediately; the session never
/// waits on transmission.
pub trait MessageSink {
    fn send(&self, msg: &ClientMessage) -> bool;

    /// Tear down the underlying channel, if any. Default: nothing to close.
    fn close(&mut self) {}
}

/// Session tuning knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a "recently edited by …" marker stays visible.
    pub indicator_ttl: Duration,
    /// Minimum spacing between outbound cursor updates.
    pub cursor_min_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            indicator_ttl: Duration::from_secs(3),
            cursor_min_interval: Duration::from_millis(100),
        }
    }
}

/// Events for the rendering layer, drained after each call into the
/// session. The session never calls back into UI code directly.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Persistent connection indicator should change.
    ConnectionChanged(ConnectionState),
    /// One line of one column changed (local or remote).
    LineChanged { line: usize, column: Column },
    /// A whole column was replaced by a `content_sync`.
    ContentReplaced { column: Column },
    /// A remote participant just edited this line.
    RemoteEditIndicator { line: usize, editor: String },
    /// The recently-edited marker for this line expired.
    IndicatorCleared { line: usize },
    CommentAdded { id: String },
    CommentResolved { id: String, resolved: bool },
    RosterChanged,
    CursorMoved { user_id: String, line: usize },
    /// A local edit was rejected by the permission oracle. Must surface
    /// to the user; never a silent drop.
    EditDenied {
        line: usize,
        column: Column,
        reason: String,
    },
    /// The server confirmed one of our edits.
    EditConfirmed { line: usize, column: Column },
    /// Transient toast: a server-sent application error.
    Notice { message: String },
}

/// Errors returned to the caller of local operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("{reason}")]
    EditDenied { reason: String },
    #[error("line {line} out of range (document has {len} lines)")]
    LineOutOfRange { line: usize, len: usize },
    #[error("column length mismatch: {source_len} source lines, {target_len} target lines")]
    ColumnLengthMismatch {
        source_len: usize,
        target_len: usize,
    },
}

/// A transient "recently edited by …" marker.
#[derive(Debug, Clone)]
struct EditIndicator {
    editor: String,
    at: Instant,
}

/// Last-seen caret of a remote participant.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCursor {
    pub line: usize,
    pub position: usize,
}

/// The root aggregate for one collaborative editing session.
///
/// Exclusively owned by the view that created it; dependencies (message
/// sink, permission oracle) are injected at construction. Invariant held
/// at all times: both columns have the same number of lines.
pub struct CollabSession {
    session_id: String,
    local_user: User,
    source_lines: Vec<String>,
    target_lines: Vec<String>,
    comments: HashMap<String, Comment>,
    roster: HashMap<String, User>,
    cursors: HashMap<String, RemoteCursor>,
    indicators: HashMap<usize, EditIndicator>,
    events: VecDeque<SessionEvent>,
    sink: Box<dyn MessageSink>,
    oracle: Box<dyn PermissionOracle>,
    on_change: Option<Box<dyn FnMut(usize, &str, Column)>>,
    last_cursor_sent: Option<Instant>,
    config: SessionConfig,
}

impl CollabSession {
    /// Build a session around the initial two-column snapshot.
    ///
    /// Fails if the columns are not line-aligned; the invariant is
    /// established here and preserved by every later operation.
    pub fn new(
        session_id: impl Into<String>,
        local_user: User,
        source_lines: Vec<String>,
        target_lines: Vec<String>,
        sink: Box<dyn MessageSink>,
        oracle: Box<dyn PermissionOracle>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        if source_lines.len() != target_lines.len() {
            return Err(SessionError::ColumnLengthMismatch {
                source_len: source_lines.len(),
                target_len: target_lines.len(),
            });
        }
        Ok(Self {
            session_id: session_id.into(),
            local_user,
            source_lines,
            target_lines,
            comments: HashMap::new(),
            roster: HashMap::new(),
            cursors: HashMap::new(),
            indicators: HashMap::new(),
            events: VecDeque::new(),
            sink,
            oracle,
            on_change: None,
            last_cursor_sent: None,
            config,
        })
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn local_user(&self) -> &User {
        &self.local_user
    }

    pub fn line_count(&self) -> usize {
        self.source_lines.len()
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }

    pub fn target_lines(&self) -> &[String] {
        &self.target_lines
    }

    pub fn line(&self, line: usize, column: Column) -> Option<&str> {
        let lines = match column {
            Column::Source => &self.source_lines,
            Column::Target => &self.target_lines,
        };
        lines.get(line).map(String::as_str)
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.values()
    }

    pub fn comment(&self, id: &str) -> Option<&Comment> {
        self.comments.get(id)
    }

    pub fn roster(&self) -> &HashMap<String, User> {
        &self.roster
    }

    pub fn cursors(&self) -> &HashMap<String, RemoteCursor> {
        &self.cursors
    }

    /// Who recently edited this line, if the marker is still fresh.
    pub fn recent_editor(&self, line: usize) -> Option<&str> {
        self.indicators
            .get(&line)
            .filter(|marker| marker.at.elapsed() < self.config.indicator_ttl)
            .map(|marker| marker.editor.as_str())
    }

    /// Pop the next pending UI event.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    /// Drain all pending UI events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    /// Register the change callback invoked after every applied local
    /// edit (auto-save and dirty tracking live outside the core).
    pub fn set_on_change(&mut self, callback: impl FnMut(usize, &str, Column) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    /// Close the underlying channel. The session state stays readable.
    pub fn disconnect(&mut self) {
        self.sink.close();
    }

    // ───────────────────────────────────────────────────────────────
    // Local operations
    // ───────────────────────────────────────────────────────────────

    /// Apply a local edit: permission check, optimistic in-place update,
    /// then exactly one outbound `edit` frame and the change callback.
    ///
    /// Submitting content identical to the current line is a no-op: no
    /// frame, no callback, no event. A denied edit mutates nothing and
    /// surfaces both as an error and as an [`SessionEvent::EditDenied`].
    pub fn apply_local_edit(
        &mut self,
        line: usize,
        content: &str,
        column: Column,
    ) -> Result<(), SessionError> {
        let len = self.source_lines.len();
        if line >= len {
            return Err(SessionError::LineOutOfRange { line, len });
        }

        let role = self.local_user.role;
        if !self.oracle.can_edit(role, column) {
            let reason = self.oracle.deny_reason(role, column);
            self.events.push_back(SessionEvent::EditDenied {
                line,
                column,
                reason: reason.clone(),
            });
            return Err(SessionError::EditDenied { reason });
        }

        let lines = match column {
            Column::Source => &mut self.source_lines,
            Column::Target => &mut self.target_lines,
        };
        if lines[line] == content {
            return Ok(());
        }

        // Optimistic: the model reflects the edit before transmission.
        lines[line] = content.to_string();
        self.events.push_back(SessionEvent::LineChanged { line, column });

        let msg = ClientMessage::Edit {
            line_number: line,
            content: content.to_string(),
            edit_type: column,
        };
        if !self.sink.send(&msg) {
            // Not rolled back; the next content_sync reconciles.
            log::warn!("edit for line {line} not transmitted; awaiting resync");
        }

        if let Some(callback) = self.on_change.as_mut() {
            callback(line, content, column);
        }
        Ok(())
    }

    /// Submit a comment. The local comment set is NOT touched; it grows
    /// only when the server echoes the comment back with its id.
    pub fn add_local_comment(
        &mut self,
        line: usize,
        content: &str,
        comment_type: CommentType,
    ) -> Result<(), SessionError> {
        let len = self.source_lines.len();
        if line >= len {
            return Err(SessionError::LineOutOfRange { line, len });
        }
        let msg = ClientMessage::Comment(CommentDraft {
            line_number: line,
            content: content.to_string(),
            comment_type,
        });
        if !self.sink.send(&msg) {
            log::warn!("comment for line {line} not transmitted");
        }
        Ok(())
    }

    /// Toggle a comment's resolution flag, the only permitted mutation
    /// of a comment after creation. Local-only; persistence of the flag
    /// belongs to the surrounding service.
    pub fn set_comment_resolved(&mut self, id: &str, resolved: bool) -> bool {
        match self.comments.get_mut(id) {
            Some(comment) => {
                comment.is_resolved = resolved;
                self.events.push_back(SessionEvent::CommentResolved {
                    id: id.to_string(),
                    resolved,
                });
                true
            }
            None => false,
        }
    }

    /// Broadcast the local caret position, throttled to at most one
    /// update per `cursor_min_interval`. Returns whether a frame went out.
    pub fn send_cursor(&mut self, line: usize, position: usize) -> bool {
        if let Some(last) = self.last_cursor_sent {
            if last.elapsed() < self.config.cursor_min_interval {
                return false;
            }
        }
        let sent = self.sink.send(&ClientMessage::Cursor {
            line_number: line,
            position,
        });
        if sent {
            self.last_cursor_sent = Some(Instant::now());
        }
        sent
    }

    /// Sweep expired recently-edited markers. The host calls this from
    /// its render tick; each cleared line yields an event.
    pub fn expire_indicators(&mut self) {
        let ttl = self.config.indicator_ttl;
        let expired: Vec<usize> = self
            .indicators
            .iter()
            .filter(|(_, marker)| marker.at.elapsed() >= ttl)
            .map(|(line, _)| *line)
            .collect();
        for line in expired {
            self.indicators.remove(&line);
            self.events.push_back(SessionEvent::IndicatorCleared { line });
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Inbound dispatch
    // ───────────────────────────────────────────────────────────────

    /// Feed one connection event into the state machine.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Open => {
                // The server replays session_state + content_sync on every
                // join, so a reopen needs no explicit resync request.
                self.events
                    .push_back(SessionEvent::ConnectionChanged(ConnectionState::Connected));
            }
            ConnectionEvent::Closed => {
                self.events.push_back(SessionEvent::ConnectionChanged(
                    ConnectionState::Disconnected,
                ));
            }
            ConnectionEvent::Reconnecting { .. } => {
                self.events.push_back(SessionEvent::ConnectionChanged(
                    ConnectionState::Reconnecting,
                ));
            }
            ConnectionEvent::GaveUp => {
                self.events
                    .push_back(SessionEvent::ConnectionChanged(ConnectionState::Failed));
            }
            ConnectionEvent::TransportError(error) => {
                log::warn!("transport error: {error}");
            }
            ConnectionEvent::Message(envelope) => self.handle_envelope(&envelope),
        }
    }

    /// Decode and dispatch one inbound envelope. All failures are
    /// per-message: logged, dropped, never fatal.
    pub fn handle_envelope(&mut self, envelope: &Envelope) {
        match ServerMessage::from_envelope(envelope) {
            Ok(message) => self.handle_message(message),
            Err(e) => log::warn!("dropping inbound message: {e}"),
        }
    }

    /// Dispatch a typed inbound message.
    pub fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Edit(edit) => self.apply_remote_edit(edit),
            ServerMessage::Comment(comment) => self.apply_remote_comment(comment),
            ServerMessage::UserJoin(join) => self.apply_user_join(join),
            ServerMessage::UserLeave(leave) => self.apply_user_leave(leave),
            ServerMessage::SessionState(state) => self.apply_session_state(state),
            ServerMessage::ContentSync(sync) => self.apply_content_sync(sync),
            ServerMessage::Cursor(cursor) => self.apply_cursor(cursor),
            ServerMessage::EditConfirmed(confirmed) => {
                self.events.push_back(SessionEvent::EditConfirmed {
                    line: confirmed.line_number,
                    column: confirmed.edit_type,
                });
            }
            ServerMessage::Error(error) => {
                log::warn!("server error: {}", error.message);
                self.events.push_back(SessionEvent::Notice {
                    message: error.message,
                });
            }
            ServerMessage::Unknown(msg_type) => {
                log::debug!("ignoring unrecognized message type `{msg_type}`");
            }
        }
    }

    /// Apply another participant's edit: last writer wins, no merge.
    ///
    /// Echoes of our own edits are discarded; the optimistic local
    /// update already reflects them, and re-applying would flicker.
    fn apply_remote_edit(&mut self, edit: EditPayload) {
        let Some(user_id) = edit.user_id else {
            log::warn!("dropping remote edit without origin user_id");
            return;
        };
        if user_id == self.local_user.id {
            return;
        }
        let len = self.source_lines.len();
        if edit.line_number >= len {
            log::warn!(
                "dropping remote edit for line {} (document has {len} lines)",
                edit.line_number
            );
            return;
        }

        let lines = match edit.edit_type {
            Column::Source => &mut self.source_lines,
            Column::Target => &mut self.target_lines,
        };
        lines[edit.line_number] = edit.content;

        let editor = edit
            .user_name
            .or_else(|| self.roster.get(&user_id).map(|user| user.name.clone()))
            .unwrap_or_else(|| User::fallback_name(&user_id));
        self.indicators.insert(
            edit.line_number,
            EditIndicator {
                editor: editor.clone(),
                at: Instant::now(),
            },
        );

        self.events.push_back(SessionEvent::LineChanged {
            line: edit.line_number,
            column: edit.edit_type,
        });
        self.events.push_back(SessionEvent::RemoteEditIndicator {
            line: edit.line_number,
            editor,
        });
    }

    /// Insert a server-delivered comment, keyed by id. Ids are
    /// server-assigned; a collision replaces (never content-level dedup).
    fn apply_remote_comment(&mut self, comment: Comment) {
        if comment.line_number >= self.source_lines.len() {
            log::warn!(
                "dropping comment {} for out-of-range line {}",
                comment.id,
                comment.line_number
            );
            return;
        }
        let id = comment.id.clone();
        if self.comments.insert(id.clone(), comment).is_some() {
            log::warn!("comment id {id} collided; replaced");
        }
        self.events.push_back(SessionEvent::CommentAdded { id });
    }

    /// Upsert a roster entry and mark it online.
    fn apply_user_join(&mut self, join: UserJoinPayload) {
        match self.roster.get_mut(&join.user_id) {
            Some(user) => user.is_online = true,
            None => {
                self.roster.insert(
                    join.user_id.clone(),
                    User::new(join.user_id, join.user_name, join.user_role),
                );
            }
        }
        self.events.push_back(SessionEvent::RosterChanged);
    }

    /// Mark a participant offline. The entry is never removed; edit and
    /// comment attribution must survive the disconnect.
    fn apply_user_leave(&mut self, leave: UserLeavePayload) {
        if let Some(user) = self.roster.get_mut(&leave.user_id) {
            user.is_online = false;
            self.events.push_back(SessionEvent::RosterChanged);
        }
        self.cursors.remove(&leave.user_id);
    }

    /// Replace the roster wholesale from the join-time snapshot.
    fn apply_session_state(&mut self, state: SessionStatePayload) {
        self.roster = state
            .active_users
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        self.events.push_back(SessionEvent::RosterChanged);
    }

    /// Replace columns wholesale. Each column is independent; applying the
    /// same payload twice is idempotent. A mismatched pair is padded with
    /// empty lines so the length invariant survives a misbehaving server.
    fn apply_content_sync(&mut self, sync: ContentSyncPayload) {
        if let Some(source) = sync.source {
            self.source_lines = source;
            self.events
                .push_back(SessionEvent::ContentReplaced { column: Column::Source });
        }
        if let Some(target) = sync.target {
            self.target_lines = target;
            self.events
                .push_back(SessionEvent::ContentReplaced { column: Column::Target });
        }

        let source_len = self.source_lines.len();
        let target_len = self.target_lines.len();
        if source_len != target_len {
            log::warn!(
                "content_sync columns misaligned ({source_len} vs {target_len}); padding"
            );
            let len = source_len.max(target_len);
            self.source_lines.resize_with(len, String::new);
            self.target_lines.resize_with(len, String::new);
        }
    }

    /// Track a remote caret. Our own relayed cursor is discarded.
    fn apply_cursor(&mut self, cursor: CursorPayload) {
        if cursor.user_id == self.local_user.id {
            return;
        }
        if cursor.line_number >= self.source_lines.len() {
            return;
        }
        self.cursors.insert(
            cursor.user_id.clone(),
            RemoteCursor {
                line: cursor.line_number,
                position: cursor.position,
            },
        );
        self.events.push_back(SessionEvent::CursorMoved {
            user_id: cursor.user_id,
            line: cursor.line_number,
        });
    }
}
