//! Render-ready projection of `TodoState`.

use crate::state::TodoState;
use crate::types::Todo;

pub const EMPTY_LIST_MESSAGE: &str = "No todos yet! Add one above.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListView {
    pub loading: bool,
    pub error: Option<String>,
    pub body: ListBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListBody {
    /// Nothing to show and nothing pending or failed.
    Empty(&'static str),
    Rows(Vec<Row>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub todo: Todo,
    /// The edit draft, when this row is being renamed.
    pub editing: Option<String>,
}

impl TodoState {
    pub fn view(&self) -> ListView {
        let loading = self.busy();
        let body = if self.todos.is_empty() && !loading && self.last_error.is_none() {
            ListBody::Empty(EMPTY_LIST_MESSAGE)
        } else {
            ListBody::Rows(
                self.todos
                    .iter()
                    .map(|todo| Row {
                        todo: todo.clone(),
                        editing: self
                            .edit
                            .as_ref()
                            .filter(|session| session.target == todo.id)
                            .map(|session| session.draft.clone()),
                    })
                    .collect(),
            )
        };
        ListView {
            loading,
            error: self.last_error.clone(),
            body,
        }
    }
}
