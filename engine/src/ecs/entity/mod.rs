//! Entity identity.
//!
//! An [`Entity`] is a pair of a table slot and an allocation id. The slot is
//! the row in the entity table and in every repository's entity index; the
//! id is a strictly-increasing allocation number that distinguishes
//! successive occupants of the same slot, so a stale reference to a removed
//! entity can be detected in O(1). Slot `0` is reserved forever as the
//! "no entity" sentinel, which collapses the dead check into a single
//! branch.

mod table;

pub use table::Table;

/// A row in the entity table. Slot `0` is the reserved sentinel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u32);

impl Slot {
    /// The reserved "no entity" slot.
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

/// An entity allocation number. Ids start at 1, never repeat within a
/// world, and are never reused when a slot is reoccupied.
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

/// An entity in the world, identified by slot and allocation id.
///
/// An entity is alive iff its slot is non-zero and the entity table at that
/// slot still carries its id. Compaction may move an entity to a new slot,
/// at which point values of this type held by callers go stale and read as
/// dead.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    slot: Slot,
    id: Id,
}

impl Entity {
    /// The "no entity" sentinel.
    pub const NONE: Self = Self {
        slot: Slot::NONE,
        id: Id(0),
    };

    #[inline]
    pub(crate) const fn new(slot: Slot, id: Id) -> Self {
        Self { slot, id }
    }

    /// Get the table slot of this entity.
    #[inline]
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    /// Get the allocation id of this entity.
    #[inline]
    pub const fn id(&self) -> Id {
        self.id
    }

    #[inline]
    pub const fn is_none(&self) -> bool {
        self.slot.is_none()
    }

    /// Rebind this entity identity to a new slot. Used when compaction
    /// moves rows.
    #[inline]
    pub(crate) const fn moved_to(&self, slot: Slot) -> Self {
        Self { slot, id: self.id }
    }
}

#[test]
fn sentinel_is_none() {
    // Given / Then
    assert!(Entity::NONE.is_none());
    assert!(Slot::NONE.is_none());
    assert_eq!(Entity::NONE.slot().index(), 0);
}

#[test]
fn moved_entity_keeps_its_id() {
    // Given
    let entity = Entity::new(Slot::new(9), Id::new(4));

    // When
    let moved = entity.moved_to(Slot::new(2));

    // Then
    assert_eq!(moved.id(), entity.id());
    assert_eq!(moved.slot().value(), 2);
    assert_ne!(moved, entity);
}
