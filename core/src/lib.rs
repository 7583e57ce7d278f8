//! Client-side synchronization of a todo list with a remote collection.
//!
//! # Overview
//! `TodoListController` keeps a local mirror of the server's todos. It loads
//! the collection once, then patches the mirror from each successful
//! create, toggle, rename or delete. The server is the only source of truth
//! for ids and ordering; its responses always replace local entries.
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces an `HttpRequest`,
//!   `parse_*` consumes an `HttpResponse` (host-does-IO).
//! - `Transport` performs the round-trip; `UreqTransport` is the real one.
//! - `TodoState` is the single state record; its transitions are applied
//!   atomically through a `tokio::sync::watch` channel.
//! - At most one request is in flight per item, plus one create and one
//!   initial load.

pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod state;
pub mod transport;
pub mod types;
pub mod view;

pub use client::TodoClient;
pub use config::ClientConfig;
pub use controller::TodoListController;
pub use error::{ApiError, ConfigError, OpKey, Operation, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use state::{EditSession, TodoState};
pub use transport::{Transport, UreqTransport};
pub use types::{CreateTodo, Todo, TodoId, UpdateTodo};
pub use view::{ListBody, ListView, Row};
