use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{self, Store};

const TODO_KEY: &str = "todo-list";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    pub completed: bool,
}

/// Simple checklist widget. New tasks append at the end; toggling flips
/// completion in place.
#[derive(Debug)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    /// Loads the persisted list, dropping entries that don't match the
    /// expected shape instead of rejecting the whole payload.
    #[tracing::instrument(skip(store))]
    pub fn load(store: &dyn Store) -> Self {
        let raw: Vec<Value> = store::load_json(store, TODO_KEY).unwrap_or_default();
        let total = raw.len();
        let items: Vec<TodoItem> = raw
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if items.len() < total {
            warn!(
                dropped = total - items.len(),
                "dropped malformed todo entries"
            );
        }
        debug!(count = items.len(), "loaded todo list");
        Self { items }
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn add(&mut self, store: &mut dyn Store, text: &str) -> Option<&TodoItem> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.items.push(TodoItem {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            completed: false,
        });
        self.save(store);
        self.items.last()
    }

    pub fn toggle(&mut self, store: &mut dyn Store, id: &str) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        item.completed = !item.completed;
        self.save(store);
        true
    }

    pub fn remove(&mut self, store: &mut dyn Store, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        if self.items.len() == before {
            return false;
        }
        self.save(store);
        true
    }

    pub fn clear(&mut self, store: &mut dyn Store) {
        self.items.clear();
        self.save(store);
    }

    fn save(&self, store: &mut dyn Store) {
        store::save_json(store, TODO_KEY, &self.items);
    }
}

#[cfg(test)]
mod tests {
    use super::TodoList;
    use crate::store::{MemoryStore, Store};

    #[test]
    fn add_trims_and_rejects_blank_text() {
        let mut store = MemoryStore::new();
        let mut todos = TodoList::load(&store);

        assert!(todos.add(&mut store, "   ").is_none());
        let item = todos.add(&mut store, "  water the plants  ").expect("added");
        assert_eq!(item.text, "water the plants");
        assert!(!item.completed);
    }

    #[test]
    fn toggle_flips_completion() {
        let mut store = MemoryStore::new();
        let mut todos = TodoList::load(&store);
        let id = todos.add(&mut store, "stretch").expect("added").id.clone();

        assert!(todos.toggle(&mut store, &id));
        assert!(todos.items()[0].completed);
        assert!(todos.toggle(&mut store, &id));
        assert!(!todos.items()[0].completed);
        assert!(!todos.toggle(&mut store, "missing"));
    }

    #[test]
    fn malformed_entries_are_dropped_on_load() {
        let mut store = MemoryStore::new();
        store
            .put_raw(
                "todo-list",
                r#"[{"id":"1","text":"ok","completed":false},{"text":"no id"},42]"#,
            )
            .expect("put");

        let todos = TodoList::load(&store);
        assert_eq!(todos.items().len(), 1);
        assert_eq!(todos.items()[0].text, "ok");
    }
}
