//! The list's complete client-side state and its transitions.
//!
//! # Design
//! Every field the interaction surface can observe lives in one record.
//! The controller only ever changes it through the methods below, each run
//! inside a single `watch::Sender::send_modify`, so a subscriber sees either
//! the state before a transition or after it, never half of one.
//!
//! Invariants kept by the transitions:
//! - `busy()` is true exactly while `in_flight` is non-empty.
//! - An `EditSession` always targets an id present in `todos`.
//! - Server responses replace local entries whole; fields are never merged.

use std::collections::BTreeSet;

use crate::error::{OpKey, SyncError};
use crate::types::{Todo, TodoId};

/// In-progress rename of one todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub target: TodoId,
    pub draft: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoState {
    /// Mirror of the server collection, in server order.
    pub todos: Vec<Todo>,
    /// Text of the new-todo input.
    pub draft: String,
    pub last_error: Option<String>,
    pub edit: Option<EditSession>,
    in_flight: BTreeSet<OpKey>,
    activated: bool,
}

impl TodoState {
    pub fn busy(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_in_flight(&self, key: &OpKey) -> bool {
        self.in_flight.contains(key)
    }

    /// Number of outstanding requests.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    pub fn find(&self, id: &TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| &t.id == id)
    }

    pub fn is_editing(&self, id: &TodoId) -> bool {
        self.edit.as_ref().is_some_and(|s| &s.target == id)
    }

    /// Claim `key` for a new request and clear the previous error.
    ///
    /// Fails without touching the state if `key` is already claimed.
    pub(crate) fn begin(&mut self, key: OpKey) -> Result<(), SyncError> {
        if self.in_flight.contains(&key) {
            return Err(SyncError::InFlight(key));
        }
        if key == OpKey::Load {
            self.activated = true;
        }
        self.in_flight.insert(key);
        self.last_error = None;
        Ok(())
    }

    pub(crate) fn release(&mut self, key: &OpKey) {
        self.in_flight.remove(key);
    }

    /// Record a user-visible failure; the collection is left as it was.
    pub(crate) fn fail(&mut self, message: &str) {
        self.last_error = Some(message.to_string());
    }

    pub(crate) fn loaded(&mut self, todos: Vec<Todo>) {
        self.todos = todos;
        self.drop_dangling_edit();
    }

    pub(crate) fn created(&mut self, todo: Todo) {
        self.todos.push(todo);
        self.draft.clear();
    }

    /// Replace the entry with the same id. An id no longer present is ignored.
    pub(crate) fn replaced(&mut self, todo: Todo) {
        if let Some(slot) = self.todos.iter_mut().find(|t| t.id == todo.id) {
            *slot = todo;
        }
    }

    pub(crate) fn renamed(&mut self, todo: Todo) {
        if self.is_editing(&todo.id) {
            self.edit = None;
        }
        self.replaced(todo);
    }

    /// Remove every entry with `id`. Removing an absent id is a no-op.
    pub(crate) fn removed(&mut self, id: &TodoId) {
        self.todos.retain(|t| &t.id != id);
        self.drop_dangling_edit();
    }

    pub(crate) fn set_draft(&mut self, text: String) {
        self.draft = text;
    }

    pub(crate) fn open_edit(&mut self, id: &TodoId) -> Result<(), SyncError> {
        let title = self
            .find(id)
            .map(|t| t.title.clone())
            .ok_or_else(|| SyncError::UnknownTodo(id.clone()))?;
        self.edit = Some(EditSession {
            target: id.clone(),
            draft: title,
        });
        Ok(())
    }

    /// Returns false if no session is open.
    pub(crate) fn set_edit_draft(&mut self, text: String) -> bool {
        match self.edit.as_mut() {
            Some(session) => {
                session.draft = text;
                true
            }
            None => false,
        }
    }

    pub(crate) fn close_edit(&mut self) {
        self.edit = None;
    }

    fn drop_dangling_edit(&mut self) {
        let dangling = match &self.edit {
            Some(session) => self.find(&session.target).is_none(),
            None => false,
        };
        if dangling {
            self.edit = None;
        }
    }
}
