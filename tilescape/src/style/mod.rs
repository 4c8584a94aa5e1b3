//! Style document: ordered layers, sources, and filter hooks.
//!
//! The style document is the read-only contract between the host and the
//! scheduler: it names the data sources, lists the style layers in paint
//! order, and carries each layer's feature filter. Expression evaluation is
//! a collaborator concern; raw filter JSON is handed to a
//! [`FilterCompiler`] supplied by the host, and the compiled
//! [`FeatureFilter`] is all the build pipeline ever sees.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::source::Feature;

/// Errors raised while parsing or compiling a style document.
#[derive(Debug, Error)]
pub enum StyleError {
    /// The style JSON could not be parsed.
    #[error("invalid style JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A layer references a filter the compiler rejected.
    #[error("filter for layer '{layer}' failed to compile: {reason}")]
    Filter { layer: String, reason: String },

    /// The document contains no layers.
    #[error("style document has no layers")]
    Empty,
}

/// Decides whether a source feature survives a layer's filter.
pub trait FeatureFilter: Send + Sync {
    /// Evaluate the filter for a feature at the given zoom level.
    fn matches(&self, zoom: u8, feature: &dyn Feature) -> bool;
}

/// Compiles raw filter JSON into an executable [`FeatureFilter`].
///
/// The style-expression language itself is out of scope; hosts plug in
/// whatever evaluator they use. [`KeepAllFilters`] is the default and
/// compiles every filter to "match everything".
pub trait FilterCompiler {
    /// Compile one layer's filter expression.
    fn compile(&self, filter: &serde_json::Value) -> Result<Arc<dyn FeatureFilter>, String>;
}

/// Filter compiler that keeps every feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAllFilters;

struct MatchAll;

impl FeatureFilter for MatchAll {
    fn matches(&self, _zoom: u8, _feature: &dyn Feature) -> bool {
        true
    }
}

impl FilterCompiler for KeepAllFilters {
    fn compile(&self, _filter: &serde_json::Value) -> Result<Arc<dyn FeatureFilter>, String> {
        Ok(Arc::new(MatchAll))
    }
}

/// Whether a layer is drawn at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerVisibility {
    /// Drawn normally.
    #[default]
    Visible,
    /// Hidden; its construction state is ignored for tile readiness.
    None,
}

// -----------------------------------------------------------------------------
// Serde spec types (wire format)
// -----------------------------------------------------------------------------

/// Default maximum quadtree level when no source constrains it.
pub const DEFAULT_MAXIMUM_LEVEL: u8 = 24;

#[derive(Debug, Deserialize)]
struct StyleSpec {
    #[serde(default)]
    sources: BTreeMap<String, SourceSpec>,
    layers: Vec<LayerSpec>,
}

#[derive(Debug, Deserialize)]
struct SourceSpec {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    maxzoom: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct LayerSpec {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(rename = "source-layer", default)]
    source_layer: Option<String>,
    #[serde(default)]
    filter: Option<serde_json::Value>,
    #[serde(default)]
    minzoom: Option<u8>,
    #[serde(default)]
    maxzoom: Option<u8>,
    #[serde(default)]
    layout: Option<LayoutSpec>,
}

#[derive(Debug, Deserialize)]
struct LayoutSpec {
    #[serde(default)]
    visibility: Option<String>,
}

// -----------------------------------------------------------------------------
// Runtime types
// -----------------------------------------------------------------------------

/// A named data source referenced by style layers.
#[derive(Debug, Clone)]
pub struct StyleSource {
    /// Source kind string, e.g. `vector` or `geojson`.
    pub kind: String,
    /// Deepest level this source provides data for.
    pub maxzoom: Option<u8>,
}

/// One style layer, in document order.
pub struct StyleLayer {
    /// Unique layer id.
    pub id: String,
    /// Layer kind string, dispatched through the layer-type registry.
    pub kind: String,
    /// Source id, absent for layers that need no source (e.g. background).
    pub source: Option<String>,
    /// Sub-layer within the source payload.
    pub source_layer: Option<String>,
    /// Compiled feature filter, if the layer declared one.
    pub filter: Option<Arc<dyn FeatureFilter>>,
    /// Minimum zoom at which the layer applies.
    pub minzoom: Option<u8>,
    /// Maximum zoom at which the layer applies.
    pub maxzoom: Option<u8>,
    /// Layout visibility.
    pub visibility: LayerVisibility,
}

impl std::fmt::Debug for StyleLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StyleLayer")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("source", &self.source)
            .field("source_layer", &self.source_layer)
            .field("has_filter", &self.filter.is_some())
            .field("visibility", &self.visibility)
            .finish()
    }
}

impl StyleLayer {
    /// Whether the layer applies at the given zoom level.
    pub fn applies_at(&self, zoom: u8) -> bool {
        if let Some(min) = self.minzoom {
            if zoom < min {
                return false;
            }
        }
        if let Some(max) = self.maxzoom {
            if zoom > max {
                return false;
            }
        }
        true
    }
}

/// Parsed, compiled style document.
#[derive(Debug)]
pub struct StyleDocument {
    sources: BTreeMap<String, StyleSource>,
    layers: Vec<Arc<StyleLayer>>,
}

impl StyleDocument {
    /// Parse a style document from JSON, compiling filters with `compiler`.
    pub fn from_json(json: &str, compiler: &dyn FilterCompiler) -> Result<Self, StyleError> {
        let spec: StyleSpec = serde_json::from_str(json)?;
        if spec.layers.is_empty() {
            return Err(StyleError::Empty);
        }

        let sources = spec
            .sources
            .into_iter()
            .map(|(id, source)| {
                (
                    id,
                    StyleSource {
                        kind: source.kind,
                        maxzoom: source.maxzoom,
                    },
                )
            })
            .collect();

        let mut layers = Vec::with_capacity(spec.layers.len());
        for layer in spec.layers {
            let filter = match &layer.filter {
                Some(raw) => Some(compiler.compile(raw).map_err(|reason| {
                    StyleError::Filter {
                        layer: layer.id.clone(),
                        reason,
                    }
                })?),
                None => None,
            };
            let visibility = match layer.layout.and_then(|l| l.visibility).as_deref() {
                Some("none") => LayerVisibility::None,
                _ => LayerVisibility::Visible,
            };
            layers.push(Arc::new(StyleLayer {
                id: layer.id,
                kind: layer.kind,
                source: layer.source,
                source_layer: layer.source_layer,
                filter,
                minzoom: layer.minzoom,
                maxzoom: layer.maxzoom,
                visibility,
            }));
        }

        Ok(Self { sources, layers })
    }

    /// The style layers, in document (paint) order.
    pub fn layers(&self) -> &[Arc<StyleLayer>] {
        &self.layers
    }

    /// Look up a source declaration by id.
    pub fn source(&self, id: &str) -> Option<&StyleSource> {
        self.sources.get(id)
    }

    /// Source ids referenced by at least one layer, deduplicated, in first
    /// reference order.
    pub fn referenced_sources(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for layer in &self.layers {
            if let Some(source) = layer.source.as_deref() {
                if self.sources.contains_key(source) && !seen.contains(&source) {
                    seen.push(source);
                }
            }
        }
        seen
    }

    /// Deepest quadtree level worth refining to: the minimum of all declared
    /// source maxzooms, defaulting to 24.
    pub fn maximum_level(&self) -> u8 {
        self.sources
            .values()
            .filter_map(|s| s.maxzoom)
            .min()
            .unwrap_or(DEFAULT_MAXIMUM_LEVEL)
            .min(DEFAULT_MAXIMUM_LEVEL)
    }
}
