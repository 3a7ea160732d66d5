//! Adapters: the durable request id counter and filesystem storage.

pub mod request_id;
pub mod storage;

pub use request_id::{CounterError, FileRequestCounter, MemoryRequestCounter, RequestIdSource};
pub use storage::{sanitize_filename, ImageKind, ImageStore, InfoStore};
