//! Renderable layers, visualizers, and the layer-type registry.
//!
//! Tessellation, label layout, and GPU buffer construction belong to the
//! host's layer builders. The scheduler only drives them: it hands filtered
//! features to a [`RenderableLayer`] per style layer and to a shared
//! [`LayerVisualizer`] per layer kind per tile, polls their build state
//! each frame, and forwards their opaque [`DrawUnit`]s in render-list order.

mod registry;

pub use registry::{LayerTypeEntry, LayerTypeRegistry};

use std::any::Any;
use std::sync::Arc;

use thiserror::Error;

use crate::frame::FrameContext;
use crate::source::Feature;
use crate::style::{LayerVisibility, StyleLayer};
use crate::tile::TileId;

/// Build state of a layer or visualizer.
///
/// Everything starts `Pending`; a tile is renderable only once all of its
/// visualizers and visible layers have left `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    /// Construction has not completed yet.
    #[default]
    Pending,
    /// Construction finished; draw units are valid.
    Done,
    /// Construction failed; never retried for this tile.
    Error,
}

impl BuildState {
    /// Whether construction has left its initial pending state.
    pub fn is_settled(&self) -> bool {
        !matches!(self, BuildState::Pending)
    }
}

/// Errors raised by layer builders and visualizers.
#[derive(Debug, Error)]
pub enum LayerError {
    /// One layer could not be built; the layer is skipped, the tile is
    /// unaffected.
    #[error("layer construction failed: {0}")]
    Construction(String),

    /// A visualizer's batch build failed; the visualizer is marked errored,
    /// sibling layers keep rendering.
    #[error("batch build failed: {0}")]
    Batch(String),

    /// Unrecoverable failure; the owning tile transitions to its error
    /// state.
    #[error("unrecoverable build failure: {0}")]
    Fatal(String),
}

impl LayerError {
    /// Whether this error must take down the whole tile build.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LayerError::Fatal(_))
    }
}

/// One opaque draw command produced by a layer or visualizer.
///
/// The renderer backend downcasts through [`as_any`] to its own command
/// type; the scheduler only forwards these in order.
///
/// [`as_any`]: DrawUnit::as_any
pub trait DrawUnit: Send + Sync {
    /// Access the concrete draw-unit type.
    fn as_any(&self) -> &dyn Any;
}

/// A per-tile instance of one style layer.
pub trait RenderableLayer: Send {
    /// The style layer this instance was built from.
    fn style(&self) -> &Arc<StyleLayer>;

    /// Current build state.
    fn state(&self) -> BuildState;

    /// Per-frame poll; may finish deferred construction or refresh dynamic
    /// style values.
    fn update(&mut self, frame: &FrameContext);

    /// Draw units in intra-layer order. Empty while `Pending`.
    fn draw_units(&self) -> &[Arc<dyn DrawUnit>];

    /// The style layer's id.
    fn id(&self) -> &str {
        &self.style().id
    }

    /// The style layer's layout visibility.
    fn visibility(&self) -> LayerVisibility {
        self.style().visibility
    }
}

/// Shared per-tile, per-layer-kind batch builder.
///
/// A visualizer merges the features of every same-kind layer on one tile
/// into few draw units, recording each layer's slice within the aggregate.
pub trait LayerVisualizer: Send {
    /// Add one layer's filtered features to the batch. `layer_index` is the
    /// position of the layer within the tile's layer list, for slice
    /// bookkeeping.
    fn add_layer(
        &mut self,
        features: &[Arc<dyn Feature>],
        layer_index: usize,
    ) -> Result<(), LayerError>;

    /// Per-frame poll driving the batch build.
    fn update(&mut self, frame: &FrameContext) -> Result<(), LayerError>;

    /// Current build state.
    fn state(&self) -> BuildState;

    /// Batched draw units. Empty while `Pending`.
    fn draw_units(&self) -> &[Arc<dyn DrawUnit>];

    /// Draw units for the per-tile id-tagged pass, if the visualizer emits
    /// them.
    fn tile_id_units(&self) -> &[Arc<dyn DrawUnit>] {
        &[]
    }
}

/// Constructs [`RenderableLayer`] instances for one layer kind.
pub trait RenderLayerFactory: Send + Sync {
    /// Build a layer instance from the features that survived filtering.
    fn create_layer(
        &self,
        features: Vec<Arc<dyn Feature>>,
        style: Arc<StyleLayer>,
        tile: TileId,
    ) -> Result<Box<dyn RenderableLayer>, LayerError>;
}

/// Constructs the shared [`LayerVisualizer`] for one layer kind.
pub trait VisualizerFactory: Send + Sync {
    /// Build the per-tile visualizer instance.
    fn create_visualizer(&self, tile: TileId) -> Box<dyn LayerVisualizer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_state_settled() {
        assert!(!BuildState::Pending.is_settled());
        assert!(BuildState::Done.is_settled());
        assert!(BuildState::Error.is_settled());
    }

    #[test]
    fn test_layer_error_fatality() {
        assert!(!LayerError::Construction("bad ring".into()).is_fatal());
        assert!(!LayerError::Batch("overflow".into()).is_fatal());
        assert!(LayerError::Fatal("poisoned payload".into()).is_fatal());
    }
}
