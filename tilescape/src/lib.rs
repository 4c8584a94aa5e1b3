//! Level-of-detail scheduling for tiled vector maps.
//!
//! `tilescape` keeps a quadtree of map tiles and decides, once per rendered
//! frame, which tiles to draw, which to fetch, and which to throw away. It
//! owns the scheduling policy only; projection math, feature decoding,
//! tessellation, and GPU submission are collaborator traits the host plugs
//! in.
//!
//! # Pipeline
//!
//! A [`TileScheduler`] is driven with one [`FrameContext`] per frame. Each
//! pass:
//!
//! 1. drains fetch completions from the load pool,
//! 2. selects tiles breadth-first by screen-space error, refining a tile
//!    into its four children while the error stays above the threshold,
//! 3. sorts the accepted tiles by camera distance,
//! 4. admits fetches and builds under their caps ([`SchedulerConfig`]),
//! 5. collects renderable layers into a style-ordered [`RenderList`],
//! 6. evicts the oldest unvisited cached tiles once they exceed the
//!    eviction band.
//!
//! [`TileScheduler::render`] then feeds the ordered draw units to a
//! [`RenderBackend`].
//!
//! # Collaborators
//!
//! - [`TilingScheme`](tiling::TilingScheme) maps tile addresses to
//!   geographic regions (Web Mercator provided).
//! - [`VisibilityOracle`](visibility::VisibilityOracle) classifies regions
//!   against the view volume and measures camera distance.
//! - [`TileSource`](source::TileSource) fetches and decodes tile payloads.
//! - [`FilterCompiler`](style::FilterCompiler) compiles style filters.
//! - [`RenderLayerFactory`](layer::RenderLayerFactory) and
//!   [`VisualizerFactory`](layer::VisualizerFactory) build per-tile layers,
//!   registered per layer kind in a [`LayerTypeRegistry`].
//!
//! # Concurrency
//!
//! All tile state lives on the thread driving the scheduler. Only the fetch
//! pass runs elsewhere: tasks are handed to a
//! [`LoadPool`](scheduler::LoadPool) and report back over a channel, so no
//! tile is ever touched concurrently.

pub mod config;
pub mod coord;
pub mod frame;
pub mod layer;
pub mod render_list;
pub mod scheduler;
pub mod source;
pub mod style;
pub mod telemetry;
pub mod tile;
pub mod tiling;
pub mod visibility;

mod util;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SchedulerConfig;
pub use frame::{FogSettings, FrameContext};
pub use layer::LayerTypeRegistry;
pub use render_list::{RenderEntry, RenderList};
pub use scheduler::{RenderBackend, TileScheduler};
pub use style::StyleDocument;
pub use tile::{TileHandle, TileId, TileState};
