//! Layer-kind registry: dispatch from style layer type strings to builders.
//!
//! The registry replaces inheritance-style dispatch with a closed-or-
//! extensible map from layer kind (`"fill"`, `"line"`, `"background"`, ...)
//! to the factories that build its renderable layers and, optionally, its
//! shared visualizer. Kinds without an entry are unsupported: the build
//! pipeline logs one deduplicated warning and skips them.

use std::collections::HashMap;
use std::sync::Arc;

use super::{RenderLayerFactory, VisualizerFactory};

/// Registered builders for one layer kind.
#[derive(Clone)]
pub struct LayerTypeEntry {
    /// Whether layers of this kind read features from a source. Background
    /// layers set this to `false` and build with an empty feature list.
    pub requires_source: bool,
    /// Builds the per-tile renderable layer.
    pub layer_factory: Arc<dyn RenderLayerFactory>,
    /// Builds the shared per-tile visualizer, if the kind batches.
    pub visualizer_factory: Option<Arc<dyn VisualizerFactory>>,
}

impl LayerTypeEntry {
    /// Entry for a source-backed layer kind.
    pub fn new(layer_factory: Arc<dyn RenderLayerFactory>) -> Self {
        Self {
            requires_source: true,
            layer_factory,
            visualizer_factory: None,
        }
    }

    /// Entry for a sourceless kind (background-like).
    pub fn sourceless(layer_factory: Arc<dyn RenderLayerFactory>) -> Self {
        Self {
            requires_source: false,
            layer_factory,
            visualizer_factory: None,
        }
    }

    /// Attach a visualizer factory.
    pub fn with_visualizer(mut self, factory: Arc<dyn VisualizerFactory>) -> Self {
        self.visualizer_factory = Some(factory);
        self
    }
}

/// Map from layer kind string to its registered builders.
#[derive(Default)]
pub struct LayerTypeRegistry {
    entries: HashMap<String, LayerTypeEntry>,
}

impl LayerTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register builders for a layer kind, replacing any previous entry.
    pub fn register(&mut self, kind: impl Into<String>, entry: LayerTypeEntry) {
        self.entries.insert(kind.into(), entry);
    }

    /// Look up the entry for a layer kind.
    pub fn get(&self, kind: &str) -> Option<&LayerTypeEntry> {
        self.entries.get(kind)
    }

    /// Whether the kind has registered builders.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.entries.contains_key(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
