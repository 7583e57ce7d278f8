//! `TodoListController`: the local mirror of the todo collection and the
//! operations that keep it in step with the server.
//!
//! # Design
//! The controller owns a `watch` channel whose value is the whole
//! `TodoState`. Operations take `&self`, so several can be pending at once
//! from one task; each claims an in-flight slot (`OpKey`) before its request
//! goes out and gives it back when the request settles. The slot is held by
//! an `InFlight` guard, so dropping an operation future mid-request still
//! releases it and `busy` cannot stick.
//!
//! Failures never escape as panics. Each operation records its user-visible
//! message in `last_error` and also returns the `SyncError` to the caller.

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::TodoClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, OpKey, Operation, SyncError, EMPTY_TITLE_MESSAGE};
use crate::http::{HttpRequest, HttpResponse};
use crate::state::TodoState;
use crate::transport::{Transport, UreqTransport};
use crate::types::{CreateTodo, Todo, TodoId, UpdateTodo};
use crate::view::ListView;

pub struct TodoListController<T> {
    client: TodoClient,
    transport: T,
    state: watch::Sender<TodoState>,
}

impl<T: Transport> TodoListController<T> {
    pub fn new(client: TodoClient, transport: T) -> Self {
        let (state, _) = watch::channel(TodoState::default());
        Self {
            client,
            transport,
            state,
        }
    }

    /// A copy of the current state.
    pub fn state(&self) -> TodoState {
        self.state.borrow().clone()
    }

    /// Receive every state snapshot published after this call.
    pub fn subscribe(&self) -> watch::Receiver<TodoState> {
        self.state.subscribe()
    }

    pub fn view(&self) -> ListView {
        self.state.borrow().view()
    }

    pub fn busy(&self) -> bool {
        self.state.borrow().busy()
    }

    /// Fetch the full collection. Only the first call issues a request;
    /// the list is patched incrementally from then on.
    pub async fn activate(&self) -> Result<(), SyncError> {
        let mut claimed = false;
        self.state.send_if_modified(|s| {
            claimed = !s.is_activated() && s.begin(OpKey::Load).is_ok();
            claimed
        });
        if !claimed {
            debug!("controller already activated, skipping initial load");
            return Ok(());
        }
        let guard = InFlight::new(&self.state, OpKey::Load);

        let request = Ok(self.client.build_list_todos());
        match self.round_trip(request, TodoClient::parse_list_todos).await {
            Ok(todos) => {
                debug!(count = todos.len(), "loaded todos");
                guard.settle(|s| s.loaded(todos));
                Ok(())
            }
            Err(source) => Err(self.failed(guard, Operation::Load, source)),
        }
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|s| s.set_draft(text));
    }

    /// Create a todo from the new-todo input.
    pub async fn submit_draft(&self) -> Result<Todo, SyncError> {
        let draft = self.state.borrow().draft.clone();
        self.create(&draft).await
    }

    /// Create a todo titled `title` (trimmed) and append the server's copy.
    pub async fn create(&self, title: &str) -> Result<Todo, SyncError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(self.reject_empty_title());
        }
        let guard = self.claim(OpKey::Create)?;

        let request = self.client.build_create_todo(&CreateTodo::open(title));
        match self.round_trip(request, TodoClient::parse_create_todo).await {
            Ok(todo) => {
                debug!(id = %todo.id, "created todo");
                guard.settle(|s| s.created(todo.clone()));
                Ok(todo)
            }
            Err(source) => Err(self.failed(guard, Operation::Create, source)),
        }
    }

    /// Flip `completed` on the server and adopt whatever it returns.
    pub async fn toggle(&self, id: &TodoId) -> Result<Todo, SyncError> {
        let current = self.state.borrow().find(id).map(|t| t.completed);
        let Some(completed) = current else {
            warn!(%id, "toggle requested for a todo not in the list");
            return Err(SyncError::UnknownTodo(id.clone()));
        };
        let guard = self.claim(OpKey::Todo(id.clone()))?;

        let request = self.client.build_update_todo(id, &UpdateTodo::completed(!completed));
        match self.round_trip(request, TodoClient::parse_update_todo).await {
            Ok(todo) => {
                debug!(%id, completed = todo.completed, "toggled todo");
                guard.settle(|s| s.replaced(todo.clone()));
                Ok(todo)
            }
            Err(source) => Err(self.failed(guard, Operation::Toggle, source)),
        }
    }

    /// Open an edit session for `id`, seeded with its current title.
    /// Replaces any session already open.
    pub fn start_edit(&self, id: &TodoId) -> Result<(), SyncError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|s| {
            outcome = s.open_edit(id);
            outcome.is_ok()
        });
        outcome
    }

    /// Update the draft of the open edit session. Returns false if none is open.
    pub fn set_edit_draft(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut updated = false;
        self.state.send_if_modified(|s| {
            updated = s.set_edit_draft(text);
            updated
        });
        updated
    }

    pub fn cancel_edit(&self) {
        self.state.send_if_modified(|s| {
            let open = s.edit.is_some();
            s.close_edit();
            open
        });
    }

    /// Send the edit session's draft (trimmed) as the new title of `id`.
    ///
    /// The session stays open on validation or request failure so the user
    /// can correct the draft or cancel.
    pub async fn save_edit(&self, id: &TodoId) -> Result<Todo, SyncError> {
        let draft = self
            .state
            .borrow()
            .edit
            .as_ref()
            .filter(|session| &session.target == id)
            .map(|session| session.draft.trim().to_string());
        let Some(title) = draft else {
            warn!(%id, "save requested without an edit session");
            return Err(SyncError::NoEditSession(id.clone()));
        };
        if title.is_empty() {
            return Err(self.reject_empty_title());
        }
        let guard = self.claim(OpKey::Todo(id.clone()))?;

        let request = self.client.build_update_todo(id, &UpdateTodo::title(title));
        match self.round_trip(request, TodoClient::parse_update_todo).await {
            Ok(todo) => {
                debug!(%id, "renamed todo");
                guard.settle(|s| s.renamed(todo.clone()));
                Ok(todo)
            }
            Err(source) => Err(self.failed(guard, Operation::Rename, source)),
        }
    }

    /// Delete `id` on the server, then drop it from the list.
    pub async fn delete(&self, id: &TodoId) -> Result<(), SyncError> {
        let guard = self.claim(OpKey::Todo(id.clone()))?;

        let request = Ok(self.client.build_delete_todo(id));
        match self.round_trip(request, TodoClient::parse_delete_todo).await {
            Ok(()) => {
                debug!(%id, "deleted todo");
                guard.settle(|s| s.removed(id));
                Ok(())
            }
            Err(source) => Err(self.failed(guard, Operation::Delete, source)),
        }
    }

    async fn round_trip<R>(
        &self,
        request: Result<HttpRequest, ApiError>,
        parse: impl FnOnce(&TodoClient, HttpResponse) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let request = request?;
        debug!(method = %request.method, path = %request.path, "issuing request");
        let response = self.transport.execute(request).await?;
        parse(&self.client, response)
    }

    fn claim(&self, key: OpKey) -> Result<InFlight<'_>, SyncError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|s| {
            outcome = s.begin(key.clone());
            outcome.is_ok()
        });
        if let Err(err) = &outcome {
            warn!(error = %err, "operation rejected");
        }
        outcome.map(|()| InFlight::new(&self.state, key))
    }

    fn failed(&self, guard: InFlight<'_>, op: Operation, source: ApiError) -> SyncError {
        warn!(%op, error = %source, "request failed");
        guard.settle(|s| s.fail(op.failure_message()));
        SyncError::Request { op, source }
    }

    fn reject_empty_title(&self) -> SyncError {
        self.state.send_modify(|s| s.fail(EMPTY_TITLE_MESSAGE));
        SyncError::EmptyTitle
    }
}

impl TodoListController<UreqTransport> {
    /// Controller talking to `config.base_url` over real HTTP.
    pub fn connect(config: &ClientConfig) -> Self {
        Self::new(TodoClient::new(&config.base_url), UreqTransport::new())
    }
}

/// A claimed in-flight slot. Released by `settle`, or on drop.
struct InFlight<'a> {
    state: &'a watch::Sender<TodoState>,
    key: Option<OpKey>,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a watch::Sender<TodoState>, key: OpKey) -> Self {
        Self { state, key: Some(key) }
    }

    /// Apply the outcome and release the slot as one snapshot.
    fn settle(mut self, apply: impl FnOnce(&mut TodoState)) {
        if let Some(key) = self.key.take() {
            self.state.send_modify(|s| {
                apply(s);
                s.release(&key);
            });
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            debug!(%key, "request abandoned before settling");
            self.state.send_modify(|s| s.release(&key));
        }
    }
}
