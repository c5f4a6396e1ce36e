//! Domain models for the tree service.
//!
//! # Core Concepts
//!
//! - [`Node`]: An immutable labeled entity. A node without a `parent_id` is a
//!   root; every other node hangs under a node that was created before it.
//! - [`TreeState`]: The persistence unit. Holds the id counter plus every node
//!   in creation order, which is enough to rebuild the whole forest.
//! - [`TreeView`]: The nested shape returned to readers, materialized on demand.

mod node;
mod tree;

pub use node::*;
pub use tree::*;
