//! Persisted compaction-state stores for tinyreact.

pub mod noop;
pub mod in_memory;
pub mod file_backend;

pub use noop::NoopStateStore;
pub use in_memory::InMemoryStateStore;
pub use file_backend::FileStateStore;
