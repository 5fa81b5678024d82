//! Domain model (ids, task input, task results, errors).

pub mod errors;
pub mod ids;
pub mod result;
pub mod task;

pub use self::errors::{CascadeError, ErrorKind};
pub use self::ids::TaskId;
pub use self::result::{ClassificationOutcome, StageResult, TaskResult, TaskStatus};
pub use self::task::{DEFAULT_JOB_BUDGET, JobKind, PriorityOrder, Task};
