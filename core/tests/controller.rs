//! Controller behavior against a scripted transport.
//!
//! # Design
//! `ScriptedTransport` records every request it receives and answers from a
//! queue. A reply can be held open on a oneshot channel so a test can look
//! at the controller while the request is still pending.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::oneshot;
use todo_sync::{
    ApiError, HttpMethod, HttpRequest, HttpResponse, ListBody, OpKey, Operation, SyncError, Todo, TodoClient,
    TodoId, TodoListController, Transport,
};

const BASE_URL: &str = "http://localhost:8080/api/v1/todos";

enum Reply {
    Ready(Result<HttpResponse, ApiError>),
    Held(oneshot::Receiver<HttpResponse>),
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn reply(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Ready(Ok(HttpResponse::new(status, body))));
    }

    fn fail(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Reply::Ready(Err(ApiError::Transport(message.to_string()))));
    }

    /// Queue a reply that is only delivered once the returned sender fires.
    fn hold(&self) -> oneshot::Sender<HttpResponse> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().unwrap().push_back(Reply::Held(rx));
        tx
    }

    fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Ready(result)) => result,
            Some(Reply::Held(rx)) => rx
                .await
                .map_err(|_| ApiError::Transport("held reply dropped".to_string())),
            None => panic!("no scripted reply left"),
        }
    }
}

fn setup() -> (Arc<ScriptedTransport>, TodoListController<Arc<ScriptedTransport>>) {
    let transport = Arc::new(ScriptedTransport::default());
    let controller = TodoListController::new(TodoClient::new(BASE_URL), Arc::clone(&transport));
    (transport, controller)
}

fn todo(id: u64, title: &str, completed: bool) -> Todo {
    Todo {
        id: TodoId::from(id),
        title: title.to_string(),
        completed,
    }
}

fn body(req: &HttpRequest) -> serde_json::Value {
    serde_json::from_str(req.body.as_deref().unwrap()).unwrap()
}

/// Poll `op` until it is parked on its request.
async fn park<F: Future>(op: &mut std::pin::Pin<&mut F>) {
    tokio::select! {
        biased;
        _ = op.as_mut() => panic!("operation settled while its reply was held"),
        _ = tokio::task::yield_now() => {}
    }
}

/// Controller loaded with the given todos.
async fn loaded(todos: &[Todo]) -> (Arc<ScriptedTransport>, TodoListController<Arc<ScriptedTransport>>) {
    let (transport, controller) = setup();
    transport.reply(200, &serde_json::to_string(todos).unwrap());
    controller.activate().await.unwrap();
    (transport, controller)
}

// ---------------------------------------------------------------------------
// Initial load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn activate_loads_the_collection_once() {
    let (transport, controller) = setup();
    transport.reply(200, r#"[{"id":1,"title":"buy milk","completed":false}]"#);

    controller.activate().await.unwrap();
    controller.activate().await.unwrap();

    assert_eq!(controller.state().todos, vec![todo(1, "buy milk", false)]);
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(requests[0].path, BASE_URL);
}

#[tokio::test]
async fn failed_load_sets_error_and_keeps_list_empty() {
    let (transport, controller) = setup();
    transport.fail("connection refused");

    let err = controller.activate().await.unwrap_err();
    assert!(matches!(err, SyncError::Request { op: Operation::Load, .. }));

    let state = controller.state();
    assert!(state.todos.is_empty());
    assert!(!state.busy());
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to load todos. Please check if the backend is running.")
    );
    // An error suppresses the empty-list message.
    assert_eq!(controller.view().body, ListBody::Rows(Vec::new()));
}

#[tokio::test]
async fn empty_load_shows_the_empty_message() {
    let (_transport, controller) = loaded(&[]).await;
    assert!(matches!(controller.view().body, ListBody::Empty(_)));
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn blank_titles_send_nothing_and_set_validation_error() {
    let (transport, controller) = loaded(&[]).await;

    for title in ["", " ", "\t\n  "] {
        let err = controller.create(title).await.unwrap_err();
        assert!(matches!(err, SyncError::EmptyTitle));
        assert_eq!(controller.state().last_error.as_deref(), Some("Todo title cannot be empty."));
        assert!(!controller.busy());
    }
    assert_eq!(transport.requests().len(), 1, "only the initial load was sent");
}

#[tokio::test]
async fn create_appends_server_copy_and_clears_draft() {
    let (transport, controller) = loaded(&[todo(1, "first", false)]).await;
    transport.reply(201, r#"{"id":"srv-42","title":"second","completed":false}"#);

    controller.set_draft("  second  ");
    let created = controller.submit_draft().await.unwrap();

    assert_eq!(created.id, TodoId::from("srv-42"));
    let state = controller.state();
    assert_eq!(state.todos.len(), 2);
    assert_eq!(state.todos[1].id, TodoId::from("srv-42"));
    assert!(state.draft.is_empty());
    assert!(state.last_error.is_none());

    let request = &transport.requests()[1];
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(body(request), serde_json::json!({"title": "second", "completed": false}));
}

#[tokio::test]
async fn failed_create_keeps_list_and_draft() {
    let (transport, controller) = loaded(&[todo(1, "first", false)]).await;
    transport.reply(500, "boom");

    controller.set_draft("second");
    let err = controller.submit_draft().await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::Request {
            op: Operation::Create,
            source: ApiError::HttpError { status: 500, .. }
        }
    ));

    let state = controller.state();
    assert_eq!(state.todos, vec![todo(1, "first", false)]);
    assert_eq!(state.draft, "second");
    assert_eq!(state.last_error.as_deref(), Some("Failed to add todo. Please try again."));
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggle_replaces_the_item_with_the_server_copy() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false), todo(2, "walk dog", false)]).await;
    transport.reply(200, r#"{"id":1,"title":"buy milk","completed":true}"#);

    controller.toggle(&TodoId::from(1)).await.unwrap();

    let request = &transport.requests()[1];
    assert_eq!(request.method, HttpMethod::Put);
    assert_eq!(request.path, format!("{BASE_URL}/1"));
    assert_eq!(body(request), serde_json::json!({"completed": true}));
    assert_eq!(
        controller.state().todos,
        vec![todo(1, "buy milk", true), todo(2, "walk dog", false)]
    );
}

#[tokio::test]
async fn toggle_adopts_server_fields_without_merging() {
    let (transport, controller) = loaded(&[todo(1, "local title", false)]).await;
    transport.reply(200, r#"{"id":1,"title":"server title","completed":true}"#);

    controller.toggle(&TodoId::from(1)).await.unwrap();
    assert_eq!(controller.state().todos, vec![todo(1, "server title", true)]);
}

#[tokio::test]
async fn failed_toggle_leaves_item_unchanged() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false)]).await;
    transport.reply(404, "");

    controller.toggle(&TodoId::from(1)).await.unwrap_err();

    let state = controller.state();
    assert_eq!(state.todos, vec![todo(1, "buy milk", false)]);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to update todo status. Please try again.")
    );
}

#[tokio::test]
async fn toggle_of_unknown_id_sends_nothing() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    let err = controller.toggle(&TodoId::from(9)).await.unwrap_err();
    assert!(matches!(err, SyncError::UnknownTodo(_)));
    assert_eq!(transport.requests().len(), 1);
}

// ---------------------------------------------------------------------------
// Edit sessions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_edit_renames_and_closes_the_session() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false)]).await;
    let id = TodoId::from(1);

    controller.start_edit(&id).unwrap();
    assert_eq!(controller.state().edit.unwrap().draft, "buy milk");

    controller.set_edit_draft(" buy oat milk ");
    transport.reply(200, r#"{"id":1,"title":"buy oat milk","completed":false}"#);
    controller.save_edit(&id).await.unwrap();

    assert_eq!(body(&transport.requests()[1]), serde_json::json!({"title": "buy oat milk"}));
    let state = controller.state();
    assert!(state.edit.is_none());
    assert_eq!(state.todos, vec![todo(1, "buy oat milk", false)]);
}

#[tokio::test]
async fn blank_edit_draft_keeps_the_session_open() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false)]).await;
    let id = TodoId::from(1);

    controller.start_edit(&id).unwrap();
    controller.set_edit_draft("   ");
    let err = controller.save_edit(&id).await.unwrap_err();

    assert!(matches!(err, SyncError::EmptyTitle));
    let state = controller.state();
    assert!(state.is_editing(&id));
    assert_eq!(state.last_error.as_deref(), Some("Todo title cannot be empty."));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn failed_save_keeps_the_session_for_retry() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false)]).await;
    let id = TodoId::from(1);
    controller.start_edit(&id).unwrap();
    controller.set_edit_draft("renamed");

    transport.fail("timed out");
    controller.save_edit(&id).await.unwrap_err();
    let state = controller.state();
    assert_eq!(state.edit.as_ref().unwrap().draft, "renamed");
    assert_eq!(
        state.last_error.as_deref(),
        Some("Failed to update todo title. Please try again.")
    );
    assert_eq!(state.todos, vec![todo(1, "buy milk", false)]);

    transport.reply(200, r#"{"id":1,"title":"renamed","completed":false}"#);
    controller.save_edit(&id).await.unwrap();
    let state = controller.state();
    assert!(state.edit.is_none());
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn cancel_edit_discards_the_session() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    controller.start_edit(&TodoId::from(1)).unwrap();
    controller.set_edit_draft("changed");
    controller.cancel_edit();

    assert!(controller.state().edit.is_none());
    assert!(!controller.set_edit_draft("ignored"));
    let err = controller.save_edit(&TodoId::from(1)).await.unwrap_err();
    assert!(matches!(err, SyncError::NoEditSession(_)));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn deleting_the_edited_item_discards_the_session() {
    let (transport, controller) = loaded(&[todo(1, "a", false), todo(2, "b", false)]).await;
    controller.start_edit(&TodoId::from(2)).unwrap();

    transport.reply(204, "");
    controller.delete(&TodoId::from(2)).await.unwrap();
    assert!(controller.state().edit.is_none());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_with_no_content_removes_the_item() {
    let (transport, controller) = loaded(&[todo(1, "buy milk", false), todo(2, "walk dog", false)]).await;
    transport.reply(204, "");

    controller.delete(&TodoId::from(1)).await.unwrap();

    let request = &transport.requests()[1];
    assert_eq!(request.method, HttpMethod::Delete);
    assert_eq!(request.path, format!("{BASE_URL}/1"));
    let state = controller.state();
    assert_eq!(state.todos, vec![todo(2, "walk dog", false)]);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn delete_of_absent_id_is_a_noop_locally() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    transport.reply(200, "");

    controller.delete(&TodoId::from(7)).await.unwrap();
    assert_eq!(controller.state().todos, vec![todo(1, "a", false)]);
}

#[tokio::test]
async fn failed_delete_keeps_the_item() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    transport.reply(500, "");

    controller.delete(&TodoId::from(1)).await.unwrap_err();
    let state = controller.state();
    assert_eq!(state.todos, vec![todo(1, "a", false)]);
    assert_eq!(state.last_error.as_deref(), Some("Failed to delete todo. Please try again."));
}

// ---------------------------------------------------------------------------
// Busy flag and in-flight slots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn busy_only_while_the_request_is_pending() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    assert!(!controller.busy());

    let reply = transport.hold();
    let id = TodoId::from(1);
    let op = controller.delete(&id);
    tokio::pin!(op);
    park(&mut op).await;

    assert!(controller.busy());
    assert!(controller.view().loading);

    reply.send(HttpResponse::new(204, "")).unwrap();
    op.await.unwrap();
    assert!(!controller.busy());
}

#[tokio::test]
async fn busy_is_released_after_failure() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;

    let reply = transport.hold();
    let id = TodoId::from(1);
    let op = controller.toggle(&id);
    tokio::pin!(op);
    park(&mut op).await;
    assert!(controller.busy());

    reply.send(HttpResponse::new(503, "unavailable")).unwrap();
    op.await.unwrap_err();
    assert!(!controller.busy());
}

#[tokio::test]
async fn dropping_a_pending_operation_releases_its_slot() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;

    let _reply = transport.hold();
    {
        let id = TodoId::from(1);
        let op = controller.toggle(&id);
        tokio::pin!(op);
        park(&mut op).await;
        assert!(controller.busy());
    }
    assert!(!controller.busy());
    assert!(!controller.state().is_in_flight(&OpKey::Todo(TodoId::from(1))));
}

#[tokio::test]
async fn second_mutation_on_the_same_item_is_rejected() {
    let (transport, controller) = loaded(&[todo(1, "a", false), todo(2, "b", false)]).await;

    let reply = transport.hold();
    let id = TodoId::from(1);
    let op = controller.toggle(&id);
    tokio::pin!(op);
    park(&mut op).await;

    let err = controller.delete(&TodoId::from(1)).await.unwrap_err();
    assert!(matches!(err, SyncError::InFlight(OpKey::Todo(_))));
    assert!(controller.state().last_error.is_none());

    // Another item is independent.
    transport.reply(204, "");
    controller.delete(&TodoId::from(2)).await.unwrap();
    assert!(controller.busy(), "the held toggle is still pending");

    reply
        .send(HttpResponse::new(200, r#"{"id":1,"title":"a","completed":true}"#))
        .unwrap();
    op.await.unwrap();

    assert_eq!(controller.state().todos, vec![todo(1, "a", true)]);
    assert!(!controller.busy());
    // load + toggle + delete(2): the rejected delete(1) never went out.
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn second_create_while_one_is_pending_is_rejected() {
    let (transport, controller) = loaded(&[]).await;

    let reply = transport.hold();
    let op = controller.create("first");
    tokio::pin!(op);
    park(&mut op).await;

    let err = controller.create("second").await.unwrap_err();
    assert!(matches!(err, SyncError::InFlight(OpKey::Create)));

    reply
        .send(HttpResponse::new(201, r#"{"id":"x","title":"first","completed":false}"#))
        .unwrap();
    op.await.unwrap();
    assert_eq!(controller.state().todos.len(), 1);
}

#[tokio::test]
async fn subscribers_observe_the_settled_snapshot() {
    let (transport, controller) = loaded(&[]).await;
    let mut rx = controller.subscribe();

    transport.reply(201, r#"{"id":"x","title":"new","completed":false}"#);
    controller.create("new").await.unwrap();

    // The receiver only keeps the latest snapshot, which must be settled.
    assert!(rx.has_changed().unwrap());
    let latest = rx.borrow_and_update().clone();
    assert!(!latest.busy());
    assert_eq!(latest.todos.len(), 1);
}

#[tokio::test]
async fn next_operation_clears_a_stale_error() {
    let (transport, controller) = loaded(&[todo(1, "a", false)]).await;
    controller.create("").await.unwrap_err();
    assert!(controller.state().last_error.is_some());

    let reply = transport.hold();
    let id = TodoId::from(1);
    let op = controller.toggle(&id);
    tokio::pin!(op);
    park(&mut op).await;
    assert!(controller.state().last_error.is_none());

    reply
        .send(HttpResponse::new(200, r#"{"id":1,"title":"a","completed":true}"#))
        .unwrap();
    op.await.unwrap();
}
