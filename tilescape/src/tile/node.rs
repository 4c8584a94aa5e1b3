//! One quadtree cell: bounding region, load/build state machine, and the
//! per-tile renderable layers and visualizers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::coord::TileAddress;
use crate::frame::FrameContext;
use crate::layer::{
    BuildState, DrawUnit, LayerError, LayerTypeRegistry, LayerVisualizer, RenderableLayer,
};
use crate::source::{Feature, TilePayload};
use crate::style::{LayerVisibility, StyleDocument};
use crate::tile::TileHandle;
use crate::tiling::{GeometricErrorTable, Region};
use crate::util::WarnOnce;
use crate::visibility::{Visibility, VisibilityOracle};

/// Lifecycle state of a tile.
///
/// Transitions are monotonic within one load/build cycle:
/// `Empty → Loading → Loaded → Initializing → Ready` (or `Error`), and
/// eviction resets any state back to `Empty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileState {
    /// No data; candidate for load admission.
    #[default]
    Empty,
    /// Fetch pass in flight.
    Loading,
    /// Fetch pass finished (any outcome); candidate for build admission.
    Loaded,
    /// Layer/visualizer construction in progress this frame.
    Initializing,
    /// Construction finished; the tile polls toward renderable.
    Ready,
    /// Construction failed unrecoverably; never retried until evicted.
    Error,
}

impl TileState {
    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileState::Empty => "empty",
            TileState::Loading => "loading",
            TileState::Loaded => "loaded",
            TileState::Initializing => "initializing",
            TileState::Ready => "ready",
            TileState::Error => "error",
        }
    }
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable identity of a tile: its address plus a creation-order key.
///
/// The key increases monotonically across the scheduler's lifetime and is
/// never reused, so renderer backends can use it for id-texture clipping
/// and picking even across evict/reload cycles of the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    /// Quadtree address.
    pub address: TileAddress,
    /// Monotonic creation-order key, never reused.
    pub key: u64,
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.key)
    }
}

/// Outcome of visiting a tile during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitDecision {
    /// Outside the view volume; no side effects.
    Culled,
    /// Screen-space error too high; descend into the children.
    Refine,
    /// Render this tile at its own level of detail.
    Accept,
}

/// Consecutive recoverable update failures after which a visualizer is
/// disabled.
const MAX_VISUALIZER_UPDATE_FAILURES: u32 = 3;

/// A visualizer plus its never-retry error latch.
pub(crate) struct VisualizerSlot {
    pub(crate) visualizer: Box<dyn LayerVisualizer>,
    pub(crate) failed: bool,
    /// Consecutive recoverable `update` failures, reset on success.
    update_failures: u32,
}

/// One quadtree cell.
pub struct TileNode {
    id: TileId,
    region: Region,
    parent: Option<TileHandle>,
    children: Option<[TileHandle; 4]>,

    pub(crate) state: TileState,
    pub(crate) renderable: bool,
    pub(crate) distance_to_camera: f64,
    pub(crate) visibility: Visibility,
    pub(crate) last_visited_frame: u64,
    pub(crate) expired: bool,

    /// Parsed payload per source id; sources that failed are simply absent.
    pub(crate) sources: HashMap<String, Arc<dyn TilePayload>>,
    pub(crate) layers: Vec<Box<dyn RenderableLayer>>,
    pub(crate) visualizers: Vec<VisualizerSlot>,
    /// Cached footprint debug units, built once per load cycle.
    pub(crate) footprint_units: Vec<Arc<dyn DrawUnit>>,
}

impl TileNode {
    /// Create an empty node.
    pub fn new(id: TileId, region: Region, parent: Option<TileHandle>) -> Self {
        Self {
            id,
            region,
            parent,
            children: None,
            state: TileState::Empty,
            renderable: false,
            distance_to_camera: f64::INFINITY,
            visibility: Visibility::Outside,
            last_visited_frame: 0,
            expired: false,
            sources: HashMap::new(),
            layers: Vec::new(),
            visualizers: Vec::new(),
            footprint_units: Vec::new(),
        }
    }

    /// The tile's stable identity.
    pub fn id(&self) -> &TileId {
        &self.id
    }

    /// The tile's quadtree address.
    pub fn address(&self) -> TileAddress {
        self.id.address
    }

    /// The tile's bounding region.
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TileState {
        self.state
    }

    /// Whether every layer and visualizer has settled.
    pub fn is_renderable(&self) -> bool {
        self.renderable
    }

    /// Handle of the parent node, `None` for root tiles.
    pub fn parent(&self) -> Option<TileHandle> {
        self.parent
    }

    /// Handles of the four children, if they were ever created.
    pub fn children(&self) -> Option<[TileHandle; 4]> {
        self.children
    }

    /// Record the atomically created child group.
    pub(crate) fn set_children(&mut self, children: [TileHandle; 4]) {
        debug_assert!(self.children.is_none(), "children created twice");
        self.children = Some(children);
    }

    /// Screen-space error of this tile at the current camera distance.
    ///
    /// `error = geometric_error(level) * viewport_height / (distance *
    /// sse_denominator)`, attenuated by fog when enabled, divided by the
    /// device pixel ratio. Uses the distance stored by the last `visit`.
    pub fn screen_space_error(&self, frame: &FrameContext, errors: &GeometricErrorTable) -> f64 {
        let geometric_error = errors.at_level(self.id.address.z);
        let mut error = geometric_error * frame.viewport_height
            / (self.distance_to_camera * frame.sse_denominator);
        if let Some(fog) = frame.fog {
            error -= fog.attenuation(self.distance_to_camera) * fog.sse_factor;
        }
        error / frame.pixel_ratio
    }

    /// Classify this tile for the current frame.
    ///
    /// Stores distance and visibility, then decides: `Culled` when outside
    /// the view volume (no further side effects), `Refine` when the error
    /// is at or above the threshold and deeper levels exist, `Accept`
    /// otherwise.
    pub fn visit(
        &mut self,
        frame: &FrameContext,
        oracle: &dyn VisibilityOracle,
        errors: &GeometricErrorTable,
        maximum_level: u8,
    ) -> VisitDecision {
        self.distance_to_camera = oracle.distance_to_camera(&self.region, frame);
        self.visibility = oracle.classify(&self.region, frame);
        if self.visibility == Visibility::Outside {
            return VisitDecision::Culled;
        }

        let sse = self.screen_space_error(frame, errors);
        if sse >= frame.maximum_screen_space_error && self.id.address.z < maximum_level {
            VisitDecision::Refine
        } else {
            VisitDecision::Accept
        }
    }

    /// Construct the renderable layers and visualizers for this tile.
    ///
    /// For every style layer: locate its parsed source features, apply the
    /// feature filter, build one renderable layer from the survivors, and
    /// route them into the shared per-kind visualizer. Unsupported kinds
    /// and per-layer construction failures are warned once and skipped;
    /// only [`LayerError::Fatal`] aborts the whole build.
    pub(crate) fn build_layers(
        &mut self,
        style: &StyleDocument,
        registry: &LayerTypeRegistry,
        synthetic_layers: &HashMap<String, String>,
        warn_once: &WarnOnce,
    ) -> Result<(), LayerError> {
        let zoom = self.id.address.z;
        let mut visualizer_by_kind: HashMap<&str, usize> = HashMap::new();

        for style_layer in style.layers() {
            if !style_layer.applies_at(zoom) {
                continue;
            }

            let Some(entry) = registry.get(&style_layer.kind) else {
                warn_once.warn(&format!(
                    "unsupported layer type '{}'",
                    style_layer.kind
                ));
                continue;
            };

            let mut features: Vec<Arc<dyn Feature>> = Vec::new();
            if entry.requires_source {
                let Some(source_id) = style_layer.source.as_deref() else {
                    continue;
                };
                let Some(payload) = self.sources.get(source_id) else {
                    // Source missing or failed; the layer simply contributes
                    // nothing to this tile.
                    continue;
                };
                let source_layer = synthetic_layers
                    .get(source_id)
                    .map(String::as_str)
                    .or(style_layer.source_layer.as_deref());
                let Some(source_layer) = source_layer else {
                    continue;
                };
                let Some(candidates) = payload.layer_features(source_layer) else {
                    continue;
                };
                features = match &style_layer.filter {
                    Some(filter) => candidates
                        .into_iter()
                        .filter(|f| filter.matches(zoom, f.as_ref()))
                        .collect(),
                    None => candidates,
                };
                if features.is_empty() {
                    continue;
                }
            }

            let layer_index = self.layers.len();
            let layer = match entry.layer_factory.create_layer(
                features.clone(),
                Arc::clone(style_layer),
                self.id,
            ) {
                Ok(layer) => layer,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn_once.warn(&format!("layer '{}' skipped: {}", style_layer.id, err));
                    continue;
                }
            };
            self.layers.push(layer);

            if let Some(visualizer_factory) = &entry.visualizer_factory {
                let slot_index = match visualizer_by_kind.get(style_layer.kind.as_str()) {
                    Some(&index) => index,
                    None => {
                        let index = self.visualizers.len();
                        self.visualizers.push(VisualizerSlot {
                            visualizer: visualizer_factory.create_visualizer(self.id),
                            failed: false,
                            update_failures: 0,
                        });
                        visualizer_by_kind.insert(style_layer.kind.as_str(), index);
                        index
                    }
                };
                let slot = &mut self.visualizers[slot_index];
                if !slot.failed {
                    match slot.visualizer.add_layer(&features, layer_index) {
                        Ok(()) => {}
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            warn!(tile = %self.id, "visualizer failed, disabling: {}", err);
                            slot.failed = true;
                        }
                    }
                }
            }
        }

        debug!(
            tile = %self.id,
            layers = self.layers.len(),
            visualizers = self.visualizers.len(),
            "tile build complete"
        );
        Ok(())
    }

    /// Drive layer and visualizer polling and refresh the renderable flag.
    ///
    /// The tile becomes renderable once every visualizer has left its
    /// pending state (an errored visualizer counts as settled) and every
    /// visible layer's construction has settled too. A visualizer whose
    /// `update` keeps failing recoverably is disabled after
    /// [`MAX_VISUALIZER_UPDATE_FAILURES`] consecutive failures so it cannot
    /// wedge the tile forever.
    pub(crate) fn poll_readiness(&mut self, frame: &FrameContext) {
        let mut visualizers_ready = true;
        for slot in &mut self.visualizers {
            if slot.failed {
                continue;
            }
            match slot.visualizer.update(frame) {
                Ok(()) => slot.update_failures = 0,
                Err(err) => {
                    if err.is_fatal() || slot.visualizer.state() == BuildState::Error {
                        warn!(tile = %self.id, "visualizer failed, disabling: {}", err);
                        slot.failed = true;
                        continue;
                    }
                    slot.update_failures += 1;
                    if slot.update_failures >= MAX_VISUALIZER_UPDATE_FAILURES {
                        warn!(tile = %self.id, "visualizer failing repeatedly, disabling: {}", err);
                        slot.failed = true;
                        continue;
                    }
                }
            }
            if !slot.visualizer.state().is_settled() {
                visualizers_ready = false;
            }
        }

        let mut layers_ready = true;
        for layer in &mut self.layers {
            layer.update(frame);
            if layer.visibility() != LayerVisibility::None && !layer.state().is_settled() {
                layers_ready = false;
            }
        }

        self.renderable = visualizers_ready && layers_ready;
    }

    /// Release all heavy per-tile state and reset to `Empty`.
    ///
    /// The node itself and its child structure survive; only parsed
    /// payloads, layers, visualizers, and cached draw units are dropped.
    pub(crate) fn unload(&mut self) {
        self.sources.clear();
        self.layers.clear();
        self.visualizers.clear();
        self.footprint_units.clear();
        self.renderable = false;
        self.state = TileState::Empty;
    }
}

impl fmt::Debug for TileNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileNode")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("renderable", &self.renderable)
            .field("last_visited_frame", &self.last_visited_frame)
            .field("children", &self.children.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerTypeEntry;
    use crate::style::KeepAllFilters;
    use crate::testutil::{
        CountdownLayerFactory, CountdownVisualizerFactory, FailingLayerFactory,
        FailingVisualizerFactory, StaticPayload, StubOracle,
    };
    use crate::tiling::WebMercatorScheme;

    fn root_node() -> TileNode {
        TileNode::new(
            TileId {
                address: TileAddress::new(0, 0, 0),
                key: 0,
            },
            Region::new(-180.0, -85.0, 180.0, 85.0),
            None,
        )
    }

    fn errors() -> GeometricErrorTable {
        GeometricErrorTable::new(&WebMercatorScheme::new())
    }

    fn style() -> StyleDocument {
        let json = r#"{
            "sources": { "s": { "type": "vector" } },
            "layers": [
                { "id": "bg", "type": "background" },
                { "id": "water", "type": "fill", "source": "s", "source-layer": "water" },
                { "id": "roads", "type": "fill", "source": "s", "source-layer": "roads" }
            ]
        }"#;
        StyleDocument::from_json(json, &KeepAllFilters).unwrap()
    }

    fn registry() -> LayerTypeRegistry {
        let mut registry = LayerTypeRegistry::new();
        registry.register(
            "background",
            LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::ready())),
        );
        registry.register(
            "fill",
            LayerTypeEntry::new(Arc::new(CountdownLayerFactory::ready()))
                .with_visualizer(Arc::new(CountdownVisualizerFactory::new(0))),
        );
        registry
    }

    mod visit {
        use super::*;

        #[test]
        fn test_outside_is_culled() {
            let mut node = root_node();
            let frame = FrameContext::new(1);
            let oracle = StubOracle::new(1000.0).with_visibility(Visibility::Outside);

            let decision = node.visit(&frame, &oracle, &errors(), 24);
            assert_eq!(decision, VisitDecision::Culled);
            assert_eq!(node.state(), TileState::Empty);
        }

        #[test]
        fn test_low_error_accepts() {
            let mut node = root_node();
            // Far enough away that the root's error is below threshold.
            let frame = FrameContext::new(1).with_max_sse(16.0);
            let oracle = StubOracle::new(1.0e9);

            assert_eq!(node.visit(&frame, &oracle, &errors(), 24), VisitDecision::Accept);
        }

        #[test]
        fn test_high_error_refines() {
            let mut node = root_node();
            let frame = FrameContext::new(1).with_max_sse(16.0);
            let oracle = StubOracle::new(10.0);

            assert_eq!(node.visit(&frame, &oracle, &errors(), 24), VisitDecision::Refine);
        }

        #[test]
        fn test_max_level_accepts_despite_high_error() {
            let mut node = root_node();
            let frame = FrameContext::new(1).with_max_sse(16.0);
            let oracle = StubOracle::new(10.0);

            assert_eq!(node.visit(&frame, &oracle, &errors(), 0), VisitDecision::Accept);
        }

        #[test]
        fn test_sse_non_increasing_in_distance() {
            let mut node = root_node();
            let frame = FrameContext::new(1);
            let table = errors();

            let mut previous = f64::INFINITY;
            for distance in [1.0e3, 1.0e4, 1.0e5, 1.0e6, 1.0e7] {
                node.visit(&frame, &StubOracle::new(distance), &table, 24);
                let sse = node.screen_space_error(&frame, &table);
                assert!(sse <= previous, "SSE grew with distance");
                previous = sse;
            }
        }

        #[test]
        fn test_fog_reduces_error() {
            let mut node = root_node();
            let table = errors();
            let clear = FrameContext::new(1);
            let foggy = {
                let mut frame = FrameContext::new(1);
                frame.fog = Some(crate::frame::FogSettings {
                    density: 2.0e-4,
                    sse_factor: 2.0,
                });
                frame
            };
            let oracle = StubOracle::new(50_000.0);

            node.visit(&clear, &oracle, &table, 24);
            let without_fog = node.screen_space_error(&clear, &table);
            let with_fog = node.screen_space_error(&foggy, &table);
            assert!(with_fog < without_fog);
        }
    }

    mod build {
        use super::*;

        #[test]
        fn test_build_creates_layers_and_shared_visualizer() {
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );

            node.build_layers(
                &style(),
                &registry(),
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();

            // background + water + roads layers; one shared fill visualizer.
            assert_eq!(node.layers.len(), 3);
            assert_eq!(node.visualizers.len(), 1);
        }

        #[test]
        fn test_missing_source_skips_layer() {
            let mut node = root_node();
            // No payload for source "s" at all.
            node.build_layers(
                &style(),
                &registry(),
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();

            // Only the background layer (requires no source) is built.
            assert_eq!(node.layers.len(), 1);
            assert!(node.visualizers.is_empty());
        }

        #[test]
        fn test_unsupported_kind_warns_once_and_skips() {
            let json = r#"{
                "sources": { "s": { "type": "vector" } },
                "layers": [
                    { "id": "a", "type": "hillshade", "source": "s", "source-layer": "x" },
                    { "id": "b", "type": "hillshade", "source": "s", "source-layer": "x" }
                ]
            }"#;
            let style = StyleDocument::from_json(json, &KeepAllFilters).unwrap();
            let mut node = root_node();
            node.sources
                .insert("s".into(), Arc::new(StaticPayload::with_layers(&["x"])) as _);

            let warn_once = WarnOnce::new();
            node.build_layers(
                &style,
                &registry(),
                &HashMap::new(),
                &warn_once,
            )
            .unwrap();

            assert!(node.layers.is_empty());
            // Both layers hit the same message; only the first logs.
            assert!(!warn_once.warn("unsupported layer type 'hillshade'"));
        }

        #[test]
        fn test_fatal_factory_error_propagates() {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(FailingLayerFactory::fatal())),
            );
            let mut node = root_node();

            let result = node.build_layers(
                &style(),
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            );
            assert!(matches!(result, Err(LayerError::Fatal(_))));
        }

        #[test]
        fn test_recoverable_factory_error_skips_layer() {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(FailingLayerFactory::recoverable())),
            );
            registry.register(
                "fill",
                LayerTypeEntry::new(Arc::new(CountdownLayerFactory::ready())),
            );
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );

            node.build_layers(
                &style(),
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();

            // Background failed recoverably; the fill layers still built.
            assert_eq!(node.layers.len(), 2);
        }

        #[test]
        fn test_recoverable_visualizer_failure_spares_siblings() {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::ready())),
            );
            registry.register(
                "fill",
                LayerTypeEntry::new(Arc::new(CountdownLayerFactory::ready()))
                    .with_visualizer(Arc::new(FailingVisualizerFactory::recoverable_add())),
            );
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );

            node.build_layers(
                &style(),
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();

            // The batch failure disables only the visualizer slot; every
            // layer still built and the tile renders without the batch.
            assert_eq!(node.layers.len(), 3);
            assert_eq!(node.visualizers.len(), 1);
            assert!(node.visualizers[0].failed);

            node.poll_readiness(&FrameContext::new(1));
            assert!(node.is_renderable());
        }

        #[test]
        fn test_fatal_visualizer_failure_aborts_build() {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::ready())),
            );
            registry.register(
                "fill",
                LayerTypeEntry::new(Arc::new(CountdownLayerFactory::ready()))
                    .with_visualizer(Arc::new(FailingVisualizerFactory::fatal_add())),
            );
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );

            let result = node.build_layers(
                &style(),
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            );
            assert!(matches!(result, Err(LayerError::Fatal(_))));
        }

        #[test]
        fn test_synthetic_source_layer_overrides_declared() {
            let mut node = root_node();
            // Payload only has the synthetic layer name.
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["_synthetic"])) as _,
            );
            let synthetic: HashMap<String, String> =
                [("s".to_string(), "_synthetic".to_string())].into();

            node.build_layers(
                &style(),
                &registry(),
                &synthetic,
                &WarnOnce::new(),
            )
            .unwrap();

            // bg + both fill layers resolve through the synthetic name.
            assert_eq!(node.layers.len(), 3);
        }
    }

    mod readiness {
        use super::*;

        fn registry_with_delays(layer_delay: u32, visualizer_delay: u32) -> LayerTypeRegistry {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::new(layer_delay))),
            );
            registry.register(
                "fill",
                LayerTypeEntry::new(Arc::new(CountdownLayerFactory::new(layer_delay)))
                    .with_visualizer(Arc::new(CountdownVisualizerFactory::new(visualizer_delay))),
            );
            registry
        }

        fn built_node(registry: &LayerTypeRegistry) -> TileNode {
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );
            node.build_layers(
                &style(),
                registry,
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();
            node
        }

        #[test]
        fn test_renderable_once_everything_settles() {
            // Layers settle after one poll, the visualizer after two; the
            // tile is renderable only once the slowest of them has settled.
            let registry = registry_with_delays(1, 2);
            let mut node = built_node(&registry);
            let frame = FrameContext::new(1);

            node.poll_readiness(&frame);
            assert!(!node.is_renderable());
            node.poll_readiness(&frame);
            assert!(node.is_renderable());
        }

        #[test]
        fn test_immediately_renderable_with_zero_delays() {
            let registry = registry_with_delays(0, 0);
            let mut node = built_node(&registry);
            node.poll_readiness(&FrameContext::new(1));
            assert!(node.is_renderable());
        }

        #[test]
        fn test_wedged_visualizer_latches_after_retries() {
            let mut registry = LayerTypeRegistry::new();
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::ready())),
            );
            registry.register(
                "fill",
                LayerTypeEntry::new(Arc::new(CountdownLayerFactory::ready()))
                    .with_visualizer(Arc::new(FailingVisualizerFactory::failing_update())),
            );
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );
            node.build_layers(
                &style(),
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();
            let frame = FrameContext::new(1);

            // The visualizer stays pending and fails every poll; after the
            // third consecutive failure it is disabled and the tile renders
            // without it.
            node.poll_readiness(&frame);
            assert!(!node.is_renderable());
            node.poll_readiness(&frame);
            assert!(!node.is_renderable());
            node.poll_readiness(&frame);
            assert!(node.is_renderable());
            assert!(node.visualizers[0].failed);
        }

        #[test]
        fn test_hidden_pending_layer_does_not_block() {
            let json = r#"{
                "sources": { "s": { "type": "vector" } },
                "layers": [
                    {
                        "id": "hidden", "type": "background",
                        "layout": { "visibility": "none" }
                    }
                ]
            }"#;
            let style = StyleDocument::from_json(json, &KeepAllFilters).unwrap();
            let mut registry = LayerTypeRegistry::new();
            // The hidden layer would take 100 polls to settle.
            registry.register(
                "background",
                LayerTypeEntry::sourceless(Arc::new(CountdownLayerFactory::new(100))),
            );

            let mut node = root_node();
            node.build_layers(
                &style,
                &registry,
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();

            node.poll_readiness(&FrameContext::new(1));
            assert!(node.is_renderable());
        }
    }

    mod unload {
        use super::*;

        #[test]
        fn test_unload_releases_state_but_keeps_children() {
            let mut node = root_node();
            node.sources.insert(
                "s".into(),
                Arc::new(StaticPayload::with_layers(&["water", "roads"])) as _,
            );
            node.build_layers(
                &style(),
                &registry(),
                &HashMap::new(),
                &WarnOnce::new(),
            )
            .unwrap();
            node.state = TileState::Ready;
            node.set_children([
                TileHandle::from_raw_parts(1, 0),
                TileHandle::from_raw_parts(2, 0),
                TileHandle::from_raw_parts(3, 0),
                TileHandle::from_raw_parts(4, 0),
            ]);

            node.unload();

            assert_eq!(node.state(), TileState::Empty);
            assert!(!node.is_renderable());
            assert!(node.sources.is_empty());
            assert!(node.layers.is_empty());
            assert!(node.visualizers.is_empty());
            assert!(node.children().is_some());
        }
    }
}
