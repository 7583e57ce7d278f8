//! Plain-text rendering of a `ListView`.

use todo_sync::{ListBody, ListView};

pub fn render(view: &ListView) -> String {
    let mut out = String::new();
    if view.loading {
        out.push_str("Loading...\n");
    }
    if let Some(error) = &view.error {
        out.push_str(&format!("Error! {error}\n"));
    }
    match &view.body {
        ListBody::Empty(message) => {
            out.push_str(message);
            out.push('\n');
        }
        ListBody::Rows(rows) => {
            for row in rows {
                let mark = if row.todo.completed { 'x' } else { ' ' };
                let line = match &row.editing {
                    Some(draft) => format!("[{mark}] {} (editing: {draft})  {}\n", row.todo.title, row.todo.id),
                    None => format!("[{mark}] {}  {}\n", row.todo.title, row.todo.id),
                };
                out.push_str(&line);
            }
        }
    }
    out
}
