//! Simulate command - fly a camera descent over a style, headless.
//!
//! Everything the scheduler needs a host for is stubbed: sources synthesize
//! one feature per requested sub-layer, layer builders settle immediately,
//! and the render backend just counts draw calls. What remains is the real
//! scheduling behavior: refinement as the camera descends, load and build
//! admission, and eviction as tiles fall behind.

use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tracing::info;

use tilescape::coord::TileAddress;
use tilescape::layer::{
    BuildState, DrawUnit, LayerError, LayerTypeEntry, LayerTypeRegistry, RenderLayerFactory,
    RenderableLayer,
};
use tilescape::scheduler::TokioLoadPool;
use tilescape::source::{BoxFuture, Feature, SourceError, TilePayload, TileSource};
use tilescape::style::{KeepAllFilters, StyleLayer};
use tilescape::{
    FrameContext, RenderBackend, SchedulerConfig, StyleDocument, TileId, TileScheduler,
};

use crate::error::CliError;

/// Arguments for the simulate command.
#[derive(Args)]
pub struct SimulateArgs {
    /// Style document to schedule; a small built-in style when omitted.
    #[arg(long)]
    pub style: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 240)]
    pub frames: u64,

    /// Screen-space error threshold.
    #[arg(long, default_value_t = 16.0)]
    pub max_sse: f64,

    /// Longitude of the descent target, in degrees.
    #[arg(long, default_value_t = 10.0)]
    pub lon: f64,

    /// Latitude of the descent target, in degrees.
    #[arg(long, default_value_t = 45.0)]
    pub lat: f64,
}

const BUILTIN_STYLE: &str = r#"{
    "sources": { "base": { "type": "vector", "maxzoom": 10 } },
    "layers": [
        { "id": "background", "type": "background" },
        { "id": "water", "type": "fill", "source": "base", "source-layer": "water" },
        { "id": "roads", "type": "line", "source": "base", "source-layer": "transportation" },
        { "id": "labels", "type": "symbol", "source": "base", "source-layer": "place" }
    ]
}"#;

/// Start height of the descent, in meters.
const START_HEIGHT: f64 = 1.0e7;

/// Final height of the descent, in meters.
const END_HEIGHT: f64 = 500.0;

struct SimFeature;

impl Feature for SimFeature {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Payload that synthesizes one feature for any requested sub-layer.
struct SimPayload;

impl TilePayload for SimPayload {
    fn layer_features(&self, _source_layer: &str) -> Option<Vec<Arc<dyn Feature>>> {
        Some(vec![Arc::new(SimFeature) as Arc<dyn Feature>])
    }
}

struct SimSource;

impl TileSource for SimSource {
    fn request_tile(
        &self,
        _address: TileAddress,
    ) -> BoxFuture<'static, Result<Arc<dyn TilePayload>, SourceError>> {
        Box::pin(async { Ok(Arc::new(SimPayload) as Arc<dyn TilePayload>) })
    }
}

struct SimUnit;

impl DrawUnit for SimUnit {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct SimLayer {
    style: Arc<StyleLayer>,
    units: Vec<Arc<dyn DrawUnit>>,
}

impl RenderableLayer for SimLayer {
    fn style(&self) -> &Arc<StyleLayer> {
        &self.style
    }

    fn state(&self) -> BuildState {
        BuildState::Done
    }

    fn update(&mut self, _frame: &FrameContext) {}

    fn draw_units(&self) -> &[Arc<dyn DrawUnit>] {
        &self.units
    }
}

struct SimLayerFactory;

impl RenderLayerFactory for SimLayerFactory {
    fn create_layer(
        &self,
        _features: Vec<Arc<dyn Feature>>,
        style: Arc<StyleLayer>,
        _tile: TileId,
    ) -> Result<Box<dyn RenderableLayer>, LayerError> {
        Ok(Box::new(SimLayer {
            style,
            units: vec![Arc::new(SimUnit) as Arc<dyn DrawUnit>],
        }))
    }
}

/// Backend counting draw calls and units per frame.
#[derive(Default)]
struct CountingBackend {
    draw_calls: usize,
    units: usize,
}

impl RenderBackend for CountingBackend {
    fn draw_layer(&mut self, _layer_id: &str, units: &[Arc<dyn DrawUnit>]) {
        self.draw_calls += 1;
        self.units += units.len();
    }
}

/// Register a stub builder for every layer kind the style uses.
fn registry_for(style: &StyleDocument) -> LayerTypeRegistry {
    let mut registry = LayerTypeRegistry::new();
    for layer in style.layers() {
        if registry.is_registered(&layer.kind) {
            continue;
        }
        let entry = if layer.source.is_none() {
            LayerTypeEntry::sourceless(Arc::new(SimLayerFactory))
        } else {
            LayerTypeEntry::new(Arc::new(SimLayerFactory))
        };
        registry.register(layer.kind.clone(), entry);
    }
    registry
}

/// Run the simulate command.
pub fn run(args: SimulateArgs) -> Result<(), CliError> {
    let json = match &args.style {
        Some(path) => std::fs::read_to_string(path)?,
        None => BUILTIN_STYLE.to_string(),
    };
    let style = StyleDocument::from_json(&json, &KeepAllFilters)?;
    let registry = registry_for(&style);
    let source_ids: Vec<String> = style
        .referenced_sources()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::Runtime(format!("failed to start Tokio runtime: {}", e)))?;

    let mut scheduler = TileScheduler::new(style, registry, SchedulerConfig::default())
        .with_load_pool(Arc::new(TokioLoadPool::from_handle(runtime.handle().clone())));
    for id in &source_ids {
        scheduler = scheduler.with_source(id, Arc::new(SimSource));
    }

    info!(
        frames = args.frames,
        lon = args.lon,
        lat = args.lat,
        max_level = scheduler.maximum_level(),
        "starting descent"
    );

    // Exponential descent: constant zoom speed in LOD terms.
    let ratio = END_HEIGHT / START_HEIGHT;
    for n in 1..=args.frames {
        let t = n as f64 / args.frames as f64;
        let height = START_HEIGHT * ratio.powf(t);
        let frame = FrameContext::new(n)
            .with_camera([args.lon, args.lat, height])
            .with_max_sse(args.max_sse);

        scheduler.update(&frame);
        let mut backend = CountingBackend::default();
        scheduler.render(&mut backend);

        if n % 30 == 0 || n == args.frames {
            let metrics = scheduler.metrics();
            info!(
                frame = n,
                height = format!("{:.0}m", height),
                tiles = scheduler.arena().len(),
                accepted = scheduler.accepted_tiles().len(),
                draw_calls = backend.draw_calls,
                loads_in_flight = metrics.loads_in_flight(),
                "frame"
            );
        }

        // Leave the load pool a slice of real time, like a frame budget.
        std::thread::sleep(Duration::from_millis(2));
    }

    let metrics = scheduler.metrics();
    println!("frames:           {}", metrics.frames);
    println!("tiles created:    {}", metrics.tiles_created);
    println!("tiles evicted:    {}", metrics.tiles_evicted);
    println!("loads started:    {}", metrics.loads_started);
    println!("loads completed:  {}", metrics.loads_completed);
    println!("source failures:  {}", metrics.source_failures);
    println!("builds completed: {}", metrics.builds_completed);
    println!("builds failed:    {}", metrics.builds_failed);

    scheduler.destroy();
    Ok(())
}
