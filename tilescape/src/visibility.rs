//! Visibility oracle collaborator interface.
//!
//! Frustum and occlusion tests are not implemented here; the scheduler only
//! consumes their results. Hosts supply a [`VisibilityOracle`] that
//! classifies a tile's bounding region against the current view volume and
//! measures its distance to the camera.

use crate::frame::FrameContext;
use crate::tiling::Region;

/// Classification of a bounding region against the view volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Entirely inside the view volume.
    Inside,
    /// Partially inside.
    Intersecting,
    /// Entirely outside; the tile is culled without side effects.
    Outside,
}

impl Visibility {
    /// Whether the region is at least partially visible.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Visibility::Outside)
    }
}

/// Supplies visibility classification and camera distance for tile regions.
///
/// Implementations are expected to be cheap; both methods are called for
/// every visited tile every frame.
pub trait VisibilityOracle: Send + Sync {
    /// Classify the region against the current view volume.
    fn classify(&self, region: &Region, frame: &FrameContext) -> Visibility;

    /// Distance from the camera to the region, in meters.
    fn distance_to_camera(&self, region: &Region, frame: &FrameContext) -> f64;
}

/// Oracle that reports everything visible, with a planar distance estimate.
///
/// Useful for headless runs and tests: the camera position is interpreted as
/// lon/lat/height and the distance is measured to the closest point of the
/// region, scaled by an equirectangular meters-per-degree factor. Measuring
/// to the closest point rather than the center matters for coarse tiles: a
/// tile the camera hovers over must read as near even when its center is
/// half a hemisphere away.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysVisible;

/// Rough meters per degree at the equator.
const METERS_PER_DEGREE: f64 = 111_319.49;

impl VisibilityOracle for AlwaysVisible {
    fn classify(&self, _region: &Region, _frame: &FrameContext) -> Visibility {
        Visibility::Inside
    }

    fn distance_to_camera(&self, region: &Region, frame: &FrameContext) -> f64 {
        let [cam_lon, cam_lat, cam_height] = frame.camera_position;
        let lon = cam_lon.clamp(region.west, region.east);
        let lat = cam_lat.clamp(region.south, region.north);
        let dx = (lon - cam_lon) * METERS_PER_DEGREE;
        let dy = (lat - cam_lat) * METERS_PER_DEGREE;
        (dx * dx + dy * dy + cam_height * cam_height).sqrt()
    }
}
