//! Service layer: object storage, hosted AI clients, the job pipeline and
//! supporting background tasks.

pub mod ai;
pub mod cleanup;
pub mod event_broadcaster;
pub mod pipeline;
pub mod storage;

pub use cleanup::{start_cleanup_task, CleanupConfig};
pub use event_broadcaster::EventBroadcaster;
pub use pipeline::PipelineContext;
pub use storage::Storage;
