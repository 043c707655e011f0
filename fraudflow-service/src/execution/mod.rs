// Execution Module
// Dataset runs, progress events and materialized outputs

pub mod engine;
pub mod events;
pub mod store;

pub use engine::{AbortHandle, Engine, NodeReport, NodeStatus, RunReport};
pub use events::{progress_channel, ExecutionEvent, ProgressReceiver, ProgressSender};
pub use store::{MaterializedOutput, MaterializedStore, StoreError};
