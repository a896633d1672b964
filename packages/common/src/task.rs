use serde::{Deserialize, Serialize};

/// A unit of deferred work published to the task queue.
///
/// `task_type` selects the handler; `executor_name` selects which executor
/// family runs it (currently only "native"). The payload is the serialized
/// typed job message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub task_type: String,
    pub executor_name: String,
    pub payload: serde_json::Value,
}
