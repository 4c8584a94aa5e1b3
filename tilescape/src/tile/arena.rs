//! Generational arena owning every tile node.
//!
//! Parents refer to children (and children to parents) through stable
//! [`TileHandle`]s instead of owning references, so the quadtree needs no
//! manual cycle-breaking on teardown. Removing a node bumps its slot's
//! generation, which invalidates every outstanding handle to it.

use super::node::TileNode;

/// Stable handle to a tile node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileHandle {
    index: u32,
    generation: u32,
}

impl TileHandle {
    pub(crate) fn from_raw_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<TileNode>,
}

/// Arena of tile nodes addressed by generational handles.
#[derive(Debug, Default)]
pub struct TileArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl TileArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, returning its handle.
    pub fn insert(&mut self, node: TileNode) -> TileHandle {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.node.is_none());
                slot.node = Some(node);
                TileHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                TileHandle {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Borrow the node behind `handle`, if it is still alive.
    pub fn get(&self, handle: TileHandle) -> Option<&TileNode> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    /// Mutably borrow the node behind `handle`, if it is still alive.
    pub fn get_mut(&mut self, handle: TileHandle) -> Option<&mut TileNode> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Remove and return the node behind `handle`.
    ///
    /// The slot's generation is bumped; the handle (and every copy of it)
    /// is invalid afterwards.
    pub fn remove(&mut self, handle: TileHandle) -> Option<TileNode> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(node)
    }

    /// Whether `handle` still refers to a live node.
    pub fn contains(&self, handle: TileHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Iterate over every live node with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (TileHandle, &TileNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (
                    TileHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    node,
                )
            })
        })
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileAddress;
    use crate::tile::node::TileId;
    use crate::tiling::Region;

    fn node(key: u64) -> TileNode {
        TileNode::new(
            TileId {
                address: TileAddress::new(0, 0, 0),
                key,
            },
            Region::new(-180.0, -85.0, 180.0, 85.0),
            None,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let mut arena = TileArena::new();
        let handle = arena.insert(node(1));
        assert_eq!(arena.len(), 1);
        assert_eq!(arena.get(handle).unwrap().id().key, 1);
    }

    #[test]
    fn test_remove_invalidates_handle() {
        let mut arena = TileArena::new();
        let handle = arena.insert(node(1));
        assert!(arena.remove(handle).is_some());

        assert!(arena.is_empty());
        assert!(!arena.contains(handle));
        assert!(arena.get(handle).is_none());
        assert!(arena.remove(handle).is_none());
    }

    #[test]
    fn test_reused_slot_gets_new_generation() {
        let mut arena = TileArena::new();
        let first = arena.insert(node(1));
        arena.remove(first);

        let second = arena.insert(node(2));
        // The slot is reused, but the stale handle stays dead.
        assert_ne!(first, second);
        assert!(arena.get(first).is_none());
        assert_eq!(arena.get(second).unwrap().id().key, 2);
    }

    #[test]
    fn test_iter_skips_dead_slots() {
        let mut arena = TileArena::new();
        let a = arena.insert(node(1));
        let b = arena.insert(node(2));
        arena.remove(a);

        let live: Vec<_> = arena.iter().collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, b);
        assert_eq!(live[0].1.id().key, 2);
    }

    #[test]
    fn test_get_mut() {
        let mut arena = TileArena::new();
        let handle = arena.insert(node(1));
        arena.get_mut(handle).unwrap().last_visited_frame = 42;
        assert_eq!(arena.get(handle).unwrap().last_visited_frame, 42);
    }
}
