//! Data source collaborator interfaces.
//!
//! Raw tile fetch and byte-level decoding happen outside the scheduler. A
//! [`TileSource`] resolves a tile address to a parsed [`TilePayload`]; the
//! payload exposes its features per source sub-layer, and features stay
//! opaque to the core. Only the host's filters and layer builders look
//! inside them.
//!
//! A failing source is never fatal: the tile proceeds with a partial source
//! set, and there is no per-source retry.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::coord::TileAddress;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a source can report for one tile fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The tile does not exist at this address (out of coverage, over
    /// maxzoom, etc.).
    #[error("tile {0} not available")]
    NotFound(TileAddress),

    /// Transport-level failure.
    #[error("fetch failed for tile {address}: {reason}")]
    Fetch { address: TileAddress, reason: String },

    /// The payload bytes could not be decoded.
    #[error("decode failed for tile {address}: {reason}")]
    Decode { address: TileAddress, reason: String },
}

/// One vector feature, opaque to the scheduler.
///
/// Filters and layer builders downcast through [`as_any`] to whatever
/// concrete feature type the source produces.
///
/// [`as_any`]: Feature::as_any
pub trait Feature: Send + Sync {
    /// Access the concrete feature type.
    fn as_any(&self) -> &dyn Any;
}

/// Parsed payload of one tile from one source.
pub trait TilePayload: Send + Sync {
    /// Features of the named source sub-layer, or `None` if the payload has
    /// no such sub-layer.
    fn layer_features(&self, source_layer: &str) -> Option<Vec<Arc<dyn Feature>>>;
}

/// Asynchronous per-source tile fetch.
///
/// The returned future is spawned onto the scheduler's load pool, so it must
/// be `'static`; implementations typically capture an `Arc` of themselves or
/// of their transport.
pub trait TileSource: Send + Sync {
    /// Fetch and decode the tile at `address`.
    fn request_tile(
        &self,
        address: TileAddress,
    ) -> BoxFuture<'static, Result<Arc<dyn TilePayload>, SourceError>>;

    /// For sources that flatten everything into a single synthetic
    /// sub-layer (e.g. GeoJSON sources), the sub-layer name every style
    /// layer should read instead of its declared `source-layer`.
    fn default_source_layer(&self) -> Option<&str> {
        None
    }
}
