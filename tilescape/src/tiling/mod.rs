//! Tiling scheme collaborator interface and geometric-error estimation.
//!
//! The scheduler never does projection math itself; it asks a
//! [`TilingScheme`] for the geographic [`Region`] a tile covers and for the
//! tile counts per level. A Web Mercator implementation is provided as the
//! default, matching the scheme the common vector-tile pyramids use.
//!
//! The screen-space-error metric needs a per-level geometric error. That is
//! derived once from the scheme's ellipsoid and level-0 tile count and halved
//! per level; the precomputed table is owned by the scheduler so that
//! multiple concurrent tilesets never share mutable state.

use std::f64::consts::PI;

use crate::coord::{TileAddress, MAX_LEVEL};

/// Reference ellipsoid parameters used for geometric-error estimation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Maximum radius in meters.
    pub maximum_radius: f64,
}

impl Ellipsoid {
    /// The WGS84 ellipsoid.
    pub const WGS84: Ellipsoid = Ellipsoid {
        maximum_radius: 6_378_137.0,
    };
}

/// A geodetic bounding region in degrees, with a height band in meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    /// Western edge in degrees.
    pub west: f64,
    /// Southern edge in degrees.
    pub south: f64,
    /// Eastern edge in degrees.
    pub east: f64,
    /// Northern edge in degrees.
    pub north: f64,
    /// Minimum height above the ellipsoid in meters.
    pub min_height: f64,
    /// Maximum height above the ellipsoid in meters.
    pub max_height: f64,
}

impl Region {
    /// Create a flat region (zero height band).
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
            min_height: 0.0,
            max_height: 0.0,
        }
    }

    /// Center point as (longitude, latitude) in degrees.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Whether the point (longitude, latitude) lies inside the region.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.west && lon <= self.east && lat >= self.south && lat <= self.north
    }
}

/// Tile address to geographic region mapping.
///
/// Implementations must guarantee that the four child regions of any tile
/// exactly partition the parent's region: no gap, no overlap.
pub trait TilingScheme: Send + Sync {
    /// The geographic region covered by a tile.
    fn tile_to_region(&self, address: &TileAddress) -> Region;

    /// Number of tiles along (x, y) at the given level.
    fn tile_count(&self, level: u8) -> (u32, u32);

    /// The ellipsoid this scheme projects.
    fn ellipsoid(&self) -> Ellipsoid;
}

/// Maximum Web Mercator latitude in degrees.
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_78;

/// Web Mercator (EPSG:3857) tiling scheme: one root tile, square pyramid.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebMercatorScheme;

impl WebMercatorScheme {
    /// Create a new Web Mercator scheme.
    pub fn new() -> Self {
        Self
    }
}

impl TilingScheme for WebMercatorScheme {
    fn tile_to_region(&self, address: &TileAddress) -> Region {
        let n = (1u64 << address.z) as f64;

        let west = address.x as f64 / n * 360.0 - 180.0;
        let east = (address.x + 1) as f64 / n * 360.0 - 180.0;

        // y grows northward here; row 0 touches the southern clamp.
        let lat_at = |y: f64| {
            let t = PI * (2.0 * y / n - 1.0);
            t.sinh().atan().to_degrees()
        };
        let south = lat_at(address.y as f64);
        let north = lat_at((address.y + 1) as f64);

        Region::new(west, south, east, north)
    }

    fn tile_count(&self, level: u8) -> (u32, u32) {
        let n = 1u32 << level.min(MAX_LEVEL);
        (n, n)
    }

    fn ellipsoid(&self) -> Ellipsoid {
        Ellipsoid::WGS84
    }
}

/// Heightmap quality factor used by the level-0 error estimate.
const HEIGHTMAP_QUALITY: f64 = 0.25;

/// Sample width assumed per tile by the level-0 error estimate.
const HEIGHTMAP_WIDTH: f64 = 128.0;

/// Precomputed per-level maximum geometric error.
///
/// The level-0 estimate is derived from the ellipsoid circumference and the
/// number of level-0 tiles, assuming a 128-sample heightmap per tile; each
/// refinement halves the error. Computed once at scheduler construction.
#[derive(Debug, Clone)]
pub struct GeometricErrorTable {
    level_zero_error: f64,
}

impl GeometricErrorTable {
    /// Build the table from a tiling scheme.
    pub fn new(scheme: &dyn TilingScheme) -> Self {
        let (tiles_x, _) = scheme.tile_count(0);
        let radius = scheme.ellipsoid().maximum_radius;
        let level_zero_error =
            radius * 2.0 * PI * HEIGHTMAP_QUALITY / (HEIGHTMAP_WIDTH * tiles_x as f64);
        Self { level_zero_error }
    }

    /// Maximum geometric error at the given level, in meters.
    pub fn at_level(&self, level: u8) -> f64 {
        self.level_zero_error / (1u64 << level) as f64
    }
}
