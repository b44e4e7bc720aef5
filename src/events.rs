use crate::models::{Task, TaskId};

/// What changed in a `TaskStore`. Delivered to listeners once per mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Added(TaskId),
    Removed(TaskId),
    Updated(TaskId),
    CompletionChanged { id: TaskId, completed: bool },
    Cleared,
    Loaded,
}

/// Handed to every listener after the change has been persisted. `tasks` is
/// the store's full sequence in display order.
#[derive(Debug, Clone, Copy)]
pub struct StatePayload<'a> {
    pub event: StoreEvent,
    pub tasks: &'a [Task],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub type Listener = Box<dyn FnMut(&StatePayload<'_>)>;
