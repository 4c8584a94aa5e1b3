//! Quadtree tile addressing.
//!
//! A [`TileAddress`] identifies one cell of the quadtree: `x` and `y` are the
//! column and row within level `z`, `z` is the subdivision depth. Level 0 is
//! the coarsest level; every refinement doubles the tile count along each
//! axis.

use std::fmt;

/// Maximum supported quadtree depth.
pub const MAX_LEVEL: u8 = 24;

/// Address of one quadtree cell.
///
/// Children of `(x, y, z)` are exactly the four cells at level `z + 1`
/// covering the same area. The quadrant order returned by [`children`] is
/// fixed so that traversal and tests are deterministic.
///
/// [`children`]: TileAddress::children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileAddress {
    /// Column within the level (0 = west).
    pub x: u32,
    /// Row within the level.
    pub y: u32,
    /// Quadtree depth (0 = coarsest).
    pub z: u8,
}

impl TileAddress {
    /// Create a new tile address.
    pub fn new(x: u32, y: u32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// The four child addresses at the next level, in fixed quadrant order.
    ///
    /// In a scheme where `y` grows northward this is north-west, north-east,
    /// south-west, south-east. The order itself carries no meaning beyond
    /// being stable.
    pub fn children(&self) -> [TileAddress; 4] {
        let (x, y, z) = (self.x, self.y, self.z + 1);
        [
            TileAddress::new(2 * x, 2 * y + 1, z),
            TileAddress::new(2 * x + 1, 2 * y + 1, z),
            TileAddress::new(2 * x, 2 * y, z),
            TileAddress::new(2 * x + 1, 2 * y, z),
        ]
    }

    /// The parent address, or `None` for level-0 tiles.
    pub fn parent(&self) -> Option<TileAddress> {
        if self.z == 0 {
            None
        } else {
            Some(TileAddress::new(self.x / 2, self.y / 2, self.z - 1))
        }
    }

    /// Whether `other` is one of this tile's four children.
    pub fn is_parent_of(&self, other: &TileAddress) -> bool {
        other.parent() == Some(*self)
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}
