// src/state/mod.rs

//! Persisted build state: content hashes, the build counter and run history.

pub mod cache;
pub mod hash;
pub mod repo;
pub mod store;

pub use cache::ContentCache;
pub use repo::RepoContext;
pub use store::{BuildState, DEFAULT_STATE_FILE, RepoRecord, RunRecord};
