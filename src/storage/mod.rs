//! Checkpoint persistence.

mod format;
mod store;

pub use format::{CheckpointFormat, CheckpointHeader, HEADER_SIZE};
pub use store::{Checkpoint, CheckpointSink, CheckpointStore, DirectoryStore, MemoryStore, NullSink};
