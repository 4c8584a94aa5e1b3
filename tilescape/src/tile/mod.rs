//! Quadtree tile nodes and the generational arena that owns them.

mod arena;
pub(crate) mod node;

pub use arena::{TileArena, TileHandle};
pub use node::{TileId, TileNode, TileState, VisitDecision};
