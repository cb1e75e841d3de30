//! Task records and their storage.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteTaskStore;
pub use store::{CreateTaskRequest, TaskError, TaskFilter, TaskStore};
pub use types::{Comic, Phase, PhaseDurations, Task, TaskStatus};
