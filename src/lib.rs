//! A durable forest of labeled trees.
//!
//! Nodes are appended as new roots or under an existing node and are never
//! changed afterwards. The whole forest is persisted as one snapshot through a
//! swappable [`storage::StorageBackend`] after every mutation.

pub mod api;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod render;
pub mod storage;
pub mod tree;

pub use error::{DecodeError, StartupError, TreeError};
pub use tree::TreeManager;
