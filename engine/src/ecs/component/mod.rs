//! Component identity.
//!
//! A component [`Handle`] is a small non-owning reference into a
//! repository: the owning world, the component type, the repository slot
//! and the component's allocation id. Like entities, slot `0` is the
//! reserved sentinel and the id makes stale handles detectable in O(1).
//! Handles carry no state of their own; all property values live in the
//! repository's columns.

use crate::ecs::world;

/// A row in a repository. Slot `0` is the reserved sentinel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u32);

impl Slot {
    /// The reserved "no component" slot.
    pub const NONE: Self = Self(0);

    #[inline]
    pub(crate) const fn new(slot: u32) -> Self {
        Self(slot)
    }

    /// Get the raw slot value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Get the index of this slot for use in indexable storage.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// A component allocation number, unique within its repository over the
/// run. Ids start at 1; 0 marks the dead sentinel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    #[inline]
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// A reference to one component of one type in one world.
///
/// A handle is alive iff its slot is non-zero, below the repository cursor,
/// and the repository's id column at that slot still carries the handle's
/// id. Reads through a dead handle return nothing; mutations are no-ops.
/// Using a handle against a different world, or against a repository of a
/// different type, is a caller bug and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    world: world::Id,
    type_id: world::TypeId,
    slot: Slot,
    id: Id,
}

impl Handle {
    #[inline]
    pub(crate) const fn new(world: world::Id, type_id: world::TypeId, slot: Slot, id: Id) -> Self {
        Self {
            world,
            type_id,
            slot,
            id,
        }
    }

    /// The dead handle for a given type, used as the unbound state of
    /// iterator bindings.
    #[inline]
    pub(crate) const fn none(world: world::Id, type_id: world::TypeId) -> Self {
        Self::new(world, type_id, Slot::NONE, Id(0))
    }

    /// The world this handle belongs to.
    #[inline]
    pub const fn world_id(&self) -> world::Id {
        self.world
    }

    /// The component type this handle refers to.
    #[inline]
    pub const fn type_id(&self) -> world::TypeId {
        self.type_id
    }

    /// The repository slot this handle refers to.
    #[inline]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// The component allocation id.
    #[inline]
    pub const fn id(&self) -> Id {
        self.id
    }

    /// Whether this is the dead sentinel handle.
    #[inline]
    pub const fn is_none(&self) -> bool {
        self.slot.is_none()
    }

    /// Rebind this handle to a new slot. Used when compaction moves rows.
    #[inline]
    pub(crate) const fn moved_to(&self, slot: Slot) -> Self {
        Self {
            world: self.world,
            type_id: self.type_id,
            slot,
            id: self.id,
        }
    }
}
