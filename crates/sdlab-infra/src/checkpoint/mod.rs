//! Durable checkpoint storage.

pub mod file;

pub use file::FileCheckpointRepository;
