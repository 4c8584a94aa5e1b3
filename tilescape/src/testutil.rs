//! Shared stub collaborators for unit tests.

use std::any::Any;
use std::sync::Arc;

use crate::frame::FrameContext;
use crate::layer::{
    BuildState, DrawUnit, LayerError, LayerVisualizer, RenderLayerFactory, RenderableLayer,
    VisualizerFactory,
};
use crate::source::{BoxFuture, Feature, SourceError, TilePayload, TileSource};
use crate::style::StyleLayer;
use crate::tile::TileId;
use crate::tiling::Region;
use crate::visibility::{Visibility, VisibilityOracle};

/// Oracle returning a fixed distance and visibility for every region.
pub(crate) struct StubOracle {
    distance: f64,
    visibility: Visibility,
}

impl StubOracle {
    pub(crate) fn new(distance: f64) -> Self {
        Self {
            distance,
            visibility: Visibility::Inside,
        }
    }

    pub(crate) fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

impl VisibilityOracle for StubOracle {
    fn classify(&self, _region: &Region, _frame: &FrameContext) -> Visibility {
        self.visibility
    }

    fn distance_to_camera(&self, _region: &Region, _frame: &FrameContext) -> f64 {
        self.distance
    }
}

/// Minimal feature carrying nothing but its identity.
pub(crate) struct StubFeature;

impl Feature for StubFeature {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Payload exposing one stub feature under each named sub-layer.
pub(crate) struct StaticPayload {
    layers: Vec<String>,
}

impl StaticPayload {
    pub(crate) fn with_layers(layers: &[&str]) -> Self {
        Self {
            layers: layers.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl TilePayload for StaticPayload {
    fn layer_features(&self, source_layer: &str) -> Option<Vec<Arc<dyn Feature>>> {
        self.layers
            .iter()
            .any(|l| l == source_layer)
            .then(|| vec![Arc::new(StubFeature) as Arc<dyn Feature>])
    }
}

/// Source resolving every address to the same static payload.
pub(crate) struct StaticSource {
    layers: Vec<String>,
}

impl StaticSource {
    pub(crate) fn with_layers(layers: &[&str]) -> Self {
        Self {
            layers: layers.iter().map(|l| l.to_string()).collect(),
        }
    }
}

impl TileSource for StaticSource {
    fn request_tile(
        &self,
        _address: crate::coord::TileAddress,
    ) -> BoxFuture<'static, Result<Arc<dyn TilePayload>, SourceError>> {
        let payload = StaticPayload {
            layers: self.layers.clone(),
        };
        Box::pin(async move { Ok(Arc::new(payload) as Arc<dyn TilePayload>) })
    }
}

/// Source failing every request with a fetch error.
pub(crate) struct FailingSource;

impl TileSource for FailingSource {
    fn request_tile(
        &self,
        address: crate::coord::TileAddress,
    ) -> BoxFuture<'static, Result<Arc<dyn TilePayload>, SourceError>> {
        Box::pin(async move {
            Err(SourceError::Fetch {
                address,
                reason: "stub failure".into(),
            })
        })
    }
}

/// Layer that stays `Pending` for a fixed number of update polls.
pub(crate) struct CountdownLayer {
    style: Arc<StyleLayer>,
    remaining: u32,
    units: Vec<Arc<dyn DrawUnit>>,
}

impl RenderableLayer for CountdownLayer {
    fn style(&self) -> &Arc<StyleLayer> {
        &self.style
    }

    fn state(&self) -> BuildState {
        if self.remaining == 0 {
            BuildState::Done
        } else {
            BuildState::Pending
        }
    }

    fn update(&mut self, _frame: &FrameContext) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    fn draw_units(&self) -> &[Arc<dyn DrawUnit>] {
        if self.remaining == 0 {
            &self.units
        } else {
            &[]
        }
    }
}

/// Stub draw unit.
pub(crate) struct StubUnit;

impl DrawUnit for StubUnit {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory producing [`CountdownLayer`]s with a fixed settle delay.
pub(crate) struct CountdownLayerFactory {
    delay: u32,
}

impl CountdownLayerFactory {
    pub(crate) fn new(delay: u32) -> Self {
        Self { delay }
    }

    /// A factory whose layers settle on the first poll.
    pub(crate) fn ready() -> Self {
        Self::new(0)
    }
}

impl RenderLayerFactory for CountdownLayerFactory {
    fn create_layer(
        &self,
        _features: Vec<Arc<dyn Feature>>,
        style: Arc<StyleLayer>,
        _tile: TileId,
    ) -> Result<Box<dyn RenderableLayer>, LayerError> {
        Ok(Box::new(CountdownLayer {
            style,
            remaining: self.delay,
            units: vec![Arc::new(StubUnit) as Arc<dyn DrawUnit>],
        }))
    }
}

/// Factory whose `create_layer` always fails.
pub(crate) struct FailingLayerFactory {
    fatal: bool,
}

impl FailingLayerFactory {
    pub(crate) fn fatal() -> Self {
        Self { fatal: true }
    }

    pub(crate) fn recoverable() -> Self {
        Self { fatal: false }
    }
}

impl RenderLayerFactory for FailingLayerFactory {
    fn create_layer(
        &self,
        _features: Vec<Arc<dyn Feature>>,
        _style: Arc<StyleLayer>,
        _tile: TileId,
    ) -> Result<Box<dyn RenderableLayer>, LayerError> {
        if self.fatal {
            Err(LayerError::Fatal("stub fatal failure".into()))
        } else {
            Err(LayerError::Construction("stub failure".into()))
        }
    }
}

/// How a [`FailingVisualizer`] misbehaves.
#[derive(Clone, Copy)]
pub(crate) enum VisualizerFailure {
    /// `add_layer` returns a fatal error.
    AddFatal,
    /// `add_layer` returns a recoverable batch error.
    AddRecoverable,
    /// `add_layer` succeeds, every `update` fails recoverably while the
    /// build state stays pending.
    UpdateRecoverable,
}

/// Visualizer whose failure mode is scripted by the factory.
pub(crate) struct FailingVisualizer {
    mode: VisualizerFailure,
}

impl LayerVisualizer for FailingVisualizer {
    fn add_layer(
        &mut self,
        _features: &[Arc<dyn Feature>],
        _layer_index: usize,
    ) -> Result<(), LayerError> {
        match self.mode {
            VisualizerFailure::AddFatal => Err(LayerError::Fatal("stub fatal batch".into())),
            VisualizerFailure::AddRecoverable => {
                Err(LayerError::Batch("stub batch failure".into()))
            }
            VisualizerFailure::UpdateRecoverable => Ok(()),
        }
    }

    fn update(&mut self, _frame: &FrameContext) -> Result<(), LayerError> {
        match self.mode {
            VisualizerFailure::UpdateRecoverable => {
                Err(LayerError::Batch("stub update failure".into()))
            }
            _ => Ok(()),
        }
    }

    fn state(&self) -> BuildState {
        BuildState::Pending
    }

    fn draw_units(&self) -> &[Arc<dyn DrawUnit>] {
        &[]
    }
}

/// Factory producing [`FailingVisualizer`]s in a fixed failure mode.
pub(crate) struct FailingVisualizerFactory {
    mode: VisualizerFailure,
}

impl FailingVisualizerFactory {
    pub(crate) fn fatal_add() -> Self {
        Self {
            mode: VisualizerFailure::AddFatal,
        }
    }

    pub(crate) fn recoverable_add() -> Self {
        Self {
            mode: VisualizerFailure::AddRecoverable,
        }
    }

    pub(crate) fn failing_update() -> Self {
        Self {
            mode: VisualizerFailure::UpdateRecoverable,
        }
    }
}

impl VisualizerFactory for FailingVisualizerFactory {
    fn create_visualizer(&self, _tile: TileId) -> Box<dyn LayerVisualizer> {
        Box::new(FailingVisualizer { mode: self.mode })
    }
}

/// Visualizer that settles after a fixed number of update polls.
pub(crate) struct CountdownVisualizer {
    remaining: u32,
    units: Vec<Arc<dyn DrawUnit>>,
    id_units: Vec<Arc<dyn DrawUnit>>,
}

impl LayerVisualizer for CountdownVisualizer {
    fn add_layer(
        &mut self,
        _features: &[Arc<dyn Feature>],
        _layer_index: usize,
    ) -> Result<(), LayerError> {
        Ok(())
    }

    fn update(&mut self, _frame: &FrameContext) -> Result<(), LayerError> {
        self.remaining = self.remaining.saturating_sub(1);
        Ok(())
    }

    fn state(&self) -> BuildState {
        if self.remaining == 0 {
            BuildState::Done
        } else {
            BuildState::Pending
        }
    }

    fn draw_units(&self) -> &[Arc<dyn DrawUnit>] {
        if self.remaining == 0 {
            &self.units
        } else {
            &[]
        }
    }

    fn tile_id_units(&self) -> &[Arc<dyn DrawUnit>] {
        if self.remaining == 0 {
            &self.id_units
        } else {
            &[]
        }
    }
}

/// Factory producing [`CountdownVisualizer`]s with a fixed settle delay.
pub(crate) struct CountdownVisualizerFactory {
    delay: u32,
}

impl CountdownVisualizerFactory {
    pub(crate) fn new(delay: u32) -> Self {
        Self { delay }
    }
}

impl VisualizerFactory for CountdownVisualizerFactory {
    fn create_visualizer(&self, _tile: TileId) -> Box<dyn LayerVisualizer> {
        Box::new(CountdownVisualizer {
            remaining: self.delay,
            units: vec![Arc::new(StubUnit) as Arc<dyn DrawUnit>],
            id_units: vec![Arc::new(StubUnit) as Arc<dyn DrawUnit>],
        })
    }
}
