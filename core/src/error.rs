//! Error types for the todo sync client.
//!
//! # Design
//! `ApiError` covers the wire: a request that could not be sent, or a
//! response that was not what the operation expected. `NotFound` keeps a
//! dedicated variant because callers distinguish "the todo is gone" from
//! "the server misbehaved".
//!
//! `SyncError` is what controller operations report. It wraps `ApiError`
//! together with the operation that failed, and knows the human-readable
//! message that ends up in the list's `last_error`.

use std::fmt;

use crate::types::TodoId;

/// Message shown when a title is empty or whitespace-only.
pub const EMPTY_TITLE_MESSAGE: &str = "Todo title cannot be empty.";

/// Errors produced while building, sending, or parsing a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response (connection refused, I/O...).
    #[error("transport failed: {0}")]
    Transport(String),
}

/// A request-issuing controller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Load,
    Create,
    Toggle,
    Rename,
    Delete,
}

impl Operation {
    /// The generic message surfaced when this operation's request fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::Load => "Failed to load todos. Please check if the backend is running.",
            Operation::Create => "Failed to add todo. Please try again.",
            Operation::Toggle => "Failed to update todo status. Please try again.",
            Operation::Rename => "Failed to update todo title. Please try again.",
            Operation::Delete => "Failed to delete todo. Please try again.",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Load => "load",
            Operation::Create => "create",
            Operation::Toggle => "toggle",
            Operation::Rename => "rename",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Slot in the in-flight set. At most one request per slot is outstanding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKey {
    Load,
    Create,
    Todo(TodoId),
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKey::Load => f.write_str("initial load"),
            OpKey::Create => f.write_str("create"),
            OpKey::Todo(id) => write!(f, "todo {id}"),
        }
    }
}

/// Outcome of a controller operation that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The title was empty after trimming. No request was sent.
    #[error("{}", EMPTY_TITLE_MESSAGE)]
    EmptyTitle,

    /// The id does not name an item in the local collection.
    #[error("todo {0} is not in the list")]
    UnknownTodo(TodoId),

    /// `save_edit` was called without an edit session for that id.
    #[error("no edit session is open for todo {0}")]
    NoEditSession(TodoId),

    /// A request for the same slot is still outstanding.
    #[error("a request for {0} is already in flight")]
    InFlight(OpKey),

    /// The request failed on the wire or the server rejected it.
    #[error("{op} failed: {source}")]
    Request {
        op: Operation,
        #[source]
        source: ApiError,
    },
}

impl SyncError {
    /// Text stored in `last_error` for failures that are user-visible.
    ///
    /// Rejections (`UnknownTodo`, `NoEditSession`, `InFlight`) leave the
    /// list state untouched and have no user message.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            SyncError::EmptyTitle => Some(EMPTY_TITLE_MESSAGE),
            SyncError::Request { op, .. } => Some(op.failure_message()),
            SyncError::UnknownTodo(_) | SyncError::NoEditSession(_) | SyncError::InFlight(_) => None,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),
}
