//! Per-frame, layer-ordered aggregation of renderable layers across tiles.
//!
//! Draw order is load-bearing for translucency: the list keeps one bucket
//! per style layer id, in style-document order, and flattens bucket by
//! bucket. Within a bucket, entries appear in the order tiles were
//! processed this frame, which is ascending camera distance because the
//! scheduler sorts the accepted set before driving tile updates.
//!
//! Buckets are truncated, never reallocated, at the start of every frame.

use std::collections::HashMap;
use std::sync::Arc;

use crate::layer::DrawUnit;
use crate::style::StyleDocument;
use crate::tile::TileHandle;

/// One render-list entry: a layer instance owned by a tile in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderEntry {
    /// The contributing tile.
    pub tile: TileHandle,
    /// Index of the layer within the tile's layer list.
    pub layer_index: usize,
}

/// Ordered bucket-per-style-layer render list.
pub struct RenderList {
    layer_index: HashMap<String, usize>,
    buckets: Vec<Vec<RenderEntry>>,
    tile_id_units: Vec<Arc<dyn DrawUnit>>,
    tile_units: Vec<Arc<dyn DrawUnit>>,
    flattened: Vec<RenderEntry>,
}

impl RenderList {
    /// Build a list with one bucket per style layer, in document order.
    pub fn new(style: &StyleDocument) -> Self {
        let layers = style.layers();
        let mut layer_index = HashMap::with_capacity(layers.len());
        for (index, layer) in layers.iter().enumerate() {
            layer_index.insert(layer.id.clone(), index);
        }
        Self {
            layer_index,
            buckets: (0..layers.len()).map(|_| Vec::new()).collect(),
            tile_id_units: Vec::new(),
            tile_units: Vec::new(),
            flattened: Vec::new(),
        }
    }

    /// Reset for a new frame without releasing bucket capacity.
    pub fn begin_frame(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.tile_id_units.clear();
        self.tile_units.clear();
        self.flattened.clear();
    }

    /// Append an entry to the bucket of `layer_id`.
    ///
    /// Returns `false` if the id is not part of the style document.
    pub fn push(&mut self, layer_id: &str, entry: RenderEntry) -> bool {
        match self.layer_index.get(layer_id) {
            Some(&index) => {
                self.buckets[index].push(entry);
                true
            }
            None => false,
        }
    }

    /// Append draw units to the per-tile id-tagged pass.
    pub fn push_tile_id_units(&mut self, units: &[Arc<dyn DrawUnit>]) {
        self.tile_id_units.extend(units.iter().cloned());
    }

    /// Append draw units to the tile-footprint debug pass.
    pub fn push_tile_units(&mut self, units: &[Arc<dyn DrawUnit>]) {
        self.tile_units.extend(units.iter().cloned());
    }

    /// Flatten buckets in style order into a single sequence.
    pub fn flatten(&mut self) -> &[RenderEntry] {
        self.flattened.clear();
        for bucket in &self.buckets {
            self.flattened.extend_from_slice(bucket);
        }
        &self.flattened
    }

    /// Draw units of the id-tagged pass, in push order.
    pub fn tile_id_units(&self) -> &[Arc<dyn DrawUnit>] {
        &self.tile_id_units
    }

    /// Draw units of the footprint debug pass, in push order.
    pub fn tile_units(&self) -> &[Arc<dyn DrawUnit>] {
        &self.tile_units
    }

    /// Number of style-layer buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}
