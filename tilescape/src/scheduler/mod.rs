//! The per-frame tile scheduler: traversal, admission, and eviction.
//!
//! One [`TileScheduler`] owns a quadtree of [`TileNode`]s and is driven once
//! per rendered frame. Each `update` pass, in order: drain fetch completions
//! from the load pool, reset the render list, select tiles by screen-space
//! error (breadth-first from the roots), sort the accepted set by camera
//! distance, admit loads and builds under their respective caps, populate
//! the render list from renderable tiles, and finally sweep stale cached
//! tiles once they exceed the eviction band.
//!
//! All tile state lives on the scheduler's thread. The only concurrency is
//! the fetch pass: spawned tasks own their sources' futures and report back
//! over a channel, so no tile is ever touched from two threads.

mod pool;

pub use pool::{InlineLoadPool, LoadPool, TokioLoadPool};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::frame::FrameContext;
use crate::layer::{DrawUnit, LayerTypeRegistry};
use crate::render_list::{RenderEntry, RenderList};
use crate::source::{TilePayload, TileSource};
use crate::style::StyleDocument;
use crate::telemetry::{MetricsSnapshot, SchedulerMetrics};
use crate::tile::{TileArena, TileHandle, TileId, TileNode, TileState, VisitDecision};
use crate::tiling::{GeometricErrorTable, Region, TilingScheme, WebMercatorScheme};
use crate::util::WarnOnce;
use crate::visibility::{AlwaysVisible, VisibilityOracle};

/// Consumes the scheduler's ordered draw output.
///
/// The scheduler resolves its render list and forwards draw units in paint
/// order; the backend downcasts the opaque units to its own command type.
pub trait RenderBackend {
    /// Draw one layer instance's units. Called in style order, nearest tile
    /// first within a style layer.
    fn draw_layer(&mut self, layer_id: &str, units: &[Arc<dyn DrawUnit>]);

    /// Draw the id-tagged pass used for picking and clipping.
    fn draw_tile_ids(&mut self, _units: &[Arc<dyn DrawUnit>]) {}

    /// Draw the tile-footprint debug pass.
    fn draw_tile_footprints(&mut self, _units: &[Arc<dyn DrawUnit>]) {}
}

/// Builds the debug draw units outlining one tile's footprint.
pub trait TileFootprintBuilder: Send + Sync {
    /// Build the outline units for a tile covering `region`.
    fn build_footprint(&self, region: &Region, tile: TileId) -> Vec<Arc<dyn DrawUnit>>;
}

/// Result of one tile's fetch pass, reported by the load pool.
struct FetchCompletion {
    tile: TileHandle,
    sources: HashMap<String, Arc<dyn TilePayload>>,
}

/// Level-of-detail scheduler for one tiled vector map.
pub struct TileScheduler {
    config: SchedulerConfig,
    scheme: Arc<dyn TilingScheme>,
    oracle: Arc<dyn VisibilityOracle>,
    pool: Arc<dyn LoadPool>,
    style: StyleDocument,
    registry: LayerTypeRegistry,
    sources: HashMap<String, Arc<dyn TileSource>>,
    /// Source id to synthetic sub-layer name, for sources that flatten
    /// everything into one sub-layer.
    synthetic_layers: HashMap<String, String>,
    footprints: Option<Arc<dyn TileFootprintBuilder>>,

    errors: GeometricErrorTable,
    maximum_level: u8,

    arena: TileArena,
    roots: Vec<TileHandle>,
    accepted: Vec<TileHandle>,
    render_list: RenderList,
    next_tile_key: u64,

    loading: Arc<AtomicUsize>,
    completions_tx: mpsc::UnboundedSender<FetchCompletion>,
    completions_rx: mpsc::UnboundedReceiver<FetchCompletion>,

    warn_once: WarnOnce,
    metrics: Arc<SchedulerMetrics>,
}

impl TileScheduler {
    /// Create a scheduler for `style`, dispatching layer kinds through
    /// `registry`.
    ///
    /// Defaults: Web Mercator tiling, an always-visible oracle, and the
    /// inline load pool. Production hosts override the oracle and pool with
    /// [`with_oracle`] and [`with_load_pool`].
    ///
    /// [`with_oracle`]: TileScheduler::with_oracle
    /// [`with_load_pool`]: TileScheduler::with_load_pool
    pub fn new(style: StyleDocument, registry: LayerTypeRegistry, config: SchedulerConfig) -> Self {
        let scheme: Arc<dyn TilingScheme> = Arc::new(WebMercatorScheme::new());
        let errors = GeometricErrorTable::new(scheme.as_ref());
        let maximum_level = style.maximum_level();
        let render_list = RenderList::new(&style);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            config,
            scheme,
            oracle: Arc::new(AlwaysVisible),
            pool: Arc::new(InlineLoadPool),
            style,
            registry,
            sources: HashMap::new(),
            synthetic_layers: HashMap::new(),
            footprints: None,
            errors,
            maximum_level,
            arena: TileArena::new(),
            roots: Vec::new(),
            accepted: Vec::new(),
            render_list,
            next_tile_key: 0,
            loading: Arc::new(AtomicUsize::new(0)),
            completions_tx,
            completions_rx,
            warn_once: WarnOnce::new(),
            metrics: Arc::new(SchedulerMetrics::new()),
        }
    }

    /// Replace the tiling scheme. Must be called before the first update.
    pub fn with_scheme(mut self, scheme: Arc<dyn TilingScheme>) -> Self {
        self.errors = GeometricErrorTable::new(scheme.as_ref());
        self.scheme = scheme;
        self
    }

    /// Replace the visibility oracle.
    pub fn with_oracle(mut self, oracle: Arc<dyn VisibilityOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    /// Replace the load pool.
    pub fn with_load_pool(mut self, pool: Arc<dyn LoadPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Register the data source backing the style's source id.
    pub fn with_source(mut self, id: &str, source: Arc<dyn TileSource>) -> Self {
        if let Some(layer) = source.default_source_layer() {
            self.synthetic_layers.insert(id.to_string(), layer.to_string());
        }
        self.sources.insert(id.to_string(), source);
        self
    }

    /// Install the footprint builder backing the debug pass.
    pub fn with_footprint_builder(mut self, builder: Arc<dyn TileFootprintBuilder>) -> Self {
        self.footprints = Some(builder);
        self
    }

    /// The scheduler's style document.
    pub fn style(&self) -> &StyleDocument {
        &self.style
    }

    /// Deepest level the scheduler will refine to.
    pub fn maximum_level(&self) -> u8 {
        self.maximum_level
    }

    /// The tile arena, for resolving handles.
    pub fn arena(&self) -> &TileArena {
        &self.arena
    }

    /// Tiles accepted for rendering by the most recent update.
    pub fn accepted_tiles(&self) -> &[TileHandle] {
        &self.accepted
    }

    /// Point-in-time activity counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Run one scheduling pass for `frame`.
    pub fn update(&mut self, frame: &FrameContext) {
        self.metrics.frame();
        self.drain_completions();
        self.render_list.begin_frame();
        self.ensure_roots();

        let suspended = frame.suspend_lod && !self.accepted.is_empty();
        let mut accepted = if suspended {
            let accepted = self.accepted.clone();
            for &handle in &accepted {
                if let Some(node) = self.arena.get_mut(handle) {
                    node.last_visited_frame = frame.frame_number;
                }
            }
            accepted
        } else {
            self.select_tiles(frame)
        };

        accepted.sort_by(|&a, &b| {
            let da = self
                .arena
                .get(a)
                .map_or(f64::INFINITY, |n| n.distance_to_camera);
            let db = self
                .arena
                .get(b)
                .map_or(f64::INFINITY, |n| n.distance_to_camera);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut builds_this_frame = 0usize;
        for &handle in &accepted {
            self.expire_if_needed(handle);

            let state = match self.arena.get(handle) {
                Some(node) => node.state(),
                None => continue,
            };
            match state {
                TileState::Empty => {
                    if self.loading.load(Ordering::Acquire) < self.config.max_loading {
                        self.start_load(handle);
                    }
                    // A tile referencing no sources skips the fetch pass
                    // entirely; admit its build right away.
                    let skipped_fetch = self
                        .arena
                        .get(handle)
                        .is_some_and(|n| n.state() == TileState::Loaded);
                    if skipped_fetch && builds_this_frame < self.config.max_initializing {
                        self.build_tile(handle);
                        builds_this_frame += 1;
                    }
                }
                TileState::Loaded => {
                    if builds_this_frame < self.config.max_initializing {
                        self.build_tile(handle);
                        builds_this_frame += 1;
                    }
                }
                TileState::Loading
                | TileState::Initializing
                | TileState::Ready
                | TileState::Error => {}
            }

            self.drive_tile(handle, frame);
        }

        if !suspended {
            self.evict_stale(frame);
        }
        self.accepted = accepted;
    }

    /// Resolve the render list and hand its draw output to `backend`.
    ///
    /// Call after [`update`](TileScheduler::update) for the same frame.
    pub fn render(&mut self, backend: &mut dyn RenderBackend) {
        for entry in self.render_list.flatten() {
            let Some(node) = self.arena.get(entry.tile) else {
                continue;
            };
            let Some(layer) = node.layers.get(entry.layer_index) else {
                continue;
            };
            backend.draw_layer(layer.id(), layer.draw_units());
        }
        backend.draw_tile_ids(self.render_list.tile_id_units());
        if self.config.show_tile_footprints {
            backend.draw_tile_footprints(self.render_list.tile_units());
        }
    }

    /// Mark every cached tile expired, forcing a reload next time it is
    /// accepted. Used when the underlying source data changed.
    pub fn invalidate_cached_tiles(&mut self) {
        let handles: Vec<TileHandle> = self.arena.iter().map(|(handle, _)| handle).collect();
        for handle in handles {
            if let Some(node) = self.arena.get_mut(handle) {
                if node.state() != TileState::Empty {
                    node.expired = true;
                }
            }
        }
    }

    /// Release every tile and all pending per-frame state.
    pub fn destroy(&mut self) {
        while self.completions_rx.try_recv().is_ok() {}
        self.arena = TileArena::new();
        self.roots.clear();
        self.accepted.clear();
        self.render_list.begin_frame();
        debug!("scheduler destroyed");
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completions_rx.try_recv() {
            let Some(node) = self.arena.get_mut(completion.tile) else {
                continue;
            };
            if node.state() != TileState::Loading {
                // The tile was reset while its fetch was in flight.
                continue;
            }
            node.sources = completion.sources;
            node.state = TileState::Loaded;
        }
    }

    fn ensure_roots(&mut self) {
        if !self.roots.is_empty() {
            return;
        }
        let (tiles_x, tiles_y) = self.scheme.tile_count(0);
        for y in 0..tiles_y {
            for x in 0..tiles_x {
                let address = crate::coord::TileAddress::new(x, y, 0);
                let region = self.scheme.tile_to_region(&address);
                let key = self.next_tile_key;
                self.next_tile_key += 1;
                let handle = self
                    .arena
                    .insert(TileNode::new(TileId { address, key }, region, None));
                self.roots.push(handle);
            }
        }
        self.metrics.tiles_created((tiles_x * tiles_y) as u64);
    }

    /// Breadth-first tile selection by screen-space error.
    fn select_tiles(&mut self, frame: &FrameContext) -> Vec<TileHandle> {
        let mut queue: VecDeque<TileHandle> = self.roots.iter().copied().collect();
        let mut accepted = Vec::new();

        while let Some(handle) = queue.pop_front() {
            let decision = {
                let Some(node) = self.arena.get_mut(handle) else {
                    continue;
                };
                let decision = node.visit(
                    frame,
                    self.oracle.as_ref(),
                    &self.errors,
                    self.maximum_level,
                );
                if decision != VisitDecision::Culled {
                    node.last_visited_frame = frame.frame_number;
                }
                decision
            };

            match decision {
                VisitDecision::Culled => {}
                VisitDecision::Accept => accepted.push(handle),
                VisitDecision::Refine => {
                    let children = match self.arena.get(handle).and_then(|n| n.children()) {
                        Some(children) => children,
                        None => self.create_children(handle),
                    };
                    queue.extend(children);
                }
            }
        }
        accepted
    }

    /// Create the four children of `parent` atomically.
    fn create_children(&mut self, parent: TileHandle) -> [TileHandle; 4] {
        let parent_address = match self.arena.get(parent) {
            Some(node) => node.address(),
            None => unreachable!("refined tile is always alive"),
        };
        let handles = parent_address.children().map(|address| {
            let region = self.scheme.tile_to_region(&address);
            let key = self.next_tile_key;
            self.next_tile_key += 1;
            self.arena
                .insert(TileNode::new(TileId { address, key }, region, Some(parent)))
        });
        if let Some(node) = self.arena.get_mut(parent) {
            node.set_children(handles);
        }
        self.metrics.tiles_created(4);
        handles
    }

    fn expire_if_needed(&mut self, handle: TileHandle) {
        if let Some(node) = self.arena.get_mut(handle) {
            if node.expired && node.state() != TileState::Loading {
                node.unload();
                node.expired = false;
            }
        }
    }

    /// Spawn the fetch pass for every referenced source of one tile.
    fn start_load(&mut self, handle: TileHandle) {
        let address = match self.arena.get(handle) {
            Some(node) => node.address(),
            None => return,
        };

        let mut fetches = Vec::new();
        for id in self.style.referenced_sources() {
            match self.sources.get(id) {
                Some(source) => fetches.push((id.to_string(), source.request_tile(address))),
                None => {
                    self.warn_once
                        .warn(&format!("no data source registered for '{}'", id));
                }
            }
        }

        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        node.state = TileState::Loading;
        if fetches.is_empty() {
            // Nothing to fetch; the load phase completes in place and the
            // tile builds from sourceless layers only.
            node.state = TileState::Loaded;
            return;
        }

        self.loading.fetch_add(1, Ordering::AcqRel);
        self.metrics.load_started();

        let tx = self.completions_tx.clone();
        let loading = Arc::clone(&self.loading);
        let metrics = Arc::clone(&self.metrics);
        let task = async move {
            let results = futures::future::join_all(
                fetches
                    .into_iter()
                    .map(|(id, fut)| async move { (id, fut.await) }),
            )
            .await;

            let mut sources = HashMap::new();
            for (id, result) in results {
                match result {
                    Ok(payload) => {
                        sources.insert(id, payload);
                    }
                    Err(err) => {
                        // Partial source sets are fine; the tile proceeds
                        // without this source's layers.
                        metrics.source_failure();
                        debug!(tile = %address, source = %id, "source fetch failed: {}", err);
                    }
                }
            }
            metrics.load_completed();
            loading.fetch_sub(1, Ordering::AcqRel);
            let _ = tx.send(FetchCompletion {
                tile: handle,
                sources,
            });
        };
        self.pool.spawn(Box::pin(task));
    }

    /// Build one loaded tile's layers and visualizers.
    fn build_tile(&mut self, handle: TileHandle) {
        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        node.state = TileState::Initializing;
        match node.build_layers(
            &self.style,
            &self.registry,
            &self.synthetic_layers,
            &self.warn_once,
        ) {
            Ok(()) => {
                node.state = TileState::Ready;
                self.metrics.build_completed();
                if self.config.show_tile_footprints {
                    if let Some(builder) = &self.footprints {
                        node.footprint_units = builder.build_footprint(node.region(), *node.id());
                    }
                }
            }
            Err(err) => {
                warn!(tile = %node.id(), "tile build failed: {}", err);
                node.state = TileState::Error;
                self.metrics.build_failed();
            }
        }
    }

    /// Poll one tile toward renderable and, once it is, add its layers to
    /// the render list.
    fn drive_tile(&mut self, handle: TileHandle, frame: &FrameContext) {
        let Some(node) = self.arena.get_mut(handle) else {
            return;
        };
        if node.state() != TileState::Ready {
            return;
        }
        node.poll_readiness(frame);
        if !node.renderable {
            return;
        }

        for (layer_index, layer) in node.layers.iter().enumerate() {
            self.render_list.push(
                layer.id(),
                RenderEntry {
                    tile: handle,
                    layer_index,
                },
            );
        }
        for slot in &node.visualizers {
            if !slot.failed {
                self.render_list
                    .push_tile_id_units(slot.visualizer.tile_id_units());
            }
        }
        if self.config.show_tile_footprints {
            self.render_list.push_tile_units(&node.footprint_units);
        }
    }

    /// Unload the oldest unvisited cached tiles once the band overflows.
    ///
    /// Hysteresis keeps the sweep cheap: nothing happens until more than
    /// `eviction_hard_cap` cached tiles went unvisited this frame, and one
    /// sweep unloads down to exactly `eviction_soft_cap` of them. Root
    /// tiles are never swept.
    fn evict_stale(&mut self, frame: &FrameContext) {
        let mut candidates: Vec<(TileHandle, u64)> = self
            .arena
            .iter()
            .filter(|(_, node)| {
                node.parent().is_some()
                    && node.last_visited_frame != frame.frame_number
                    && !matches!(node.state(), TileState::Empty | TileState::Loading)
            })
            .map(|(handle, node)| (handle, node.last_visited_frame))
            .collect();

        if candidates.len() <= self.config.eviction_hard_cap {
            return;
        }

        candidates.sort_by_key(|&(_, last_visited)| last_visited);
        let excess = candidates.len() - self.config.eviction_soft_cap;
        for &(handle, _) in candidates.iter().take(excess) {
            if let Some(node) = self.arena.get_mut(handle) {
                node.unload();
                self.metrics.tile_evicted();
            }
        }
        debug!(
            evicted = excess,
            remaining = self.config.eviction_soft_cap,
            "eviction sweep"
        );
    }
}

impl std::fmt::Debug for TileScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileScheduler")
            .field("tiles", &self.arena.len())
            .field("roots", &self.roots.len())
            .field("accepted", &self.accepted.len())
            .field("maximum_level", &self.maximum_level)
            .finish()
    }
}
