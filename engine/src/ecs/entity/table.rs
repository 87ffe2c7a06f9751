//! The entity table.
//!
//! Tracks which slots are occupied, by which allocation id, and each
//! entity's ownership record. Slots are handed out sequentially; removal
//! leaves a hole that persists until the next whole-system compaction, which
//! moves survivors down in slot order and reports the permutation so every
//! repository can follow.

use log::warn;

use crate::ecs::entity::{Entity, Id, Slot};
use crate::ecs::owner::OwnershipRecord;

/// Occupancy threshold below which compaction shrinks the backing arrays.
const SHRINK_OCCUPANCY: f64 = 0.6;

/// The table of all entity slots in a world.
#[derive(Debug, Default)]
pub struct Table {
    /// Allocation id per slot; 0 marks a vacant slot. Index 0 is the
    /// reserved sentinel and stays 0 forever.
    ids: Vec<u32>,

    /// Ownership record per slot.
    owners: Vec<OwnershipRecord>,

    /// The next never-used slot. Always at least 1.
    cursor: u32,

    /// The next allocation id. Always at least 1.
    next_id: u32,

    /// The number of live entities.
    live: u32,
}

impl Table {
    /// Create an empty table holding only the sentinel slot.
    pub fn new() -> Self {
        Self {
            ids: vec![0],
            owners: vec![OwnershipRecord::default()],
            cursor: 1,
            next_id: 1,
            live: 0,
        }
    }

    /// Allocate the next entity slot and id.
    pub fn add(&mut self) -> Entity {
        let slot = self.cursor;
        if slot as usize == self.ids.len() {
            let target = self.ids.len() + self.ids.len() / 2 + 1;
            self.ids.resize(target, 0);
            self.owners.resize(target, OwnershipRecord::default());
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids[slot as usize] = id;
        self.owners[slot as usize] = OwnershipRecord::default();
        self.cursor += 1;
        self.live += 1;
        Entity::new(Slot::new(slot), Id::new(id))
    }

    /// Clear the given entity's slot. Returns false when the entity is not
    /// alive; the caller is expected to have drained its ownership record
    /// first.
    pub fn remove(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            warn!("attempted to remove an entity that is not alive: {entity:?}");
            return false;
        }
        self.ids[entity.slot().index()] = 0;
        self.owners[entity.slot().index()] = OwnershipRecord::default();
        self.live -= 1;
        true
    }

    /// Whether the entity is alive: non-sentinel slot still carrying its id.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let slot = entity.slot().value();
        slot != 0 && slot < self.cursor && self.ids[slot as usize] == entity.id().value()
    }

    /// Get the entity occupying a slot, if any.
    #[inline]
    pub fn entity_at(&self, slot: Slot) -> Option<Entity> {
        if slot.is_none() || slot.value() >= self.cursor {
            return None;
        }
        match self.ids[slot.index()] {
            0 => None,
            id => Some(Entity::new(slot, Id::new(id))),
        }
    }

    /// The next never-used slot. Every occupied slot is below this.
    #[inline]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// The number of backed slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// The number of live entities.
    #[inline]
    pub fn live(&self) -> u32 {
        self.live
    }

    /// Borrow the ownership record at a slot.
    #[inline]
    pub fn owner_record(&self, slot: Slot) -> &OwnershipRecord {
        &self.owners[slot.index()]
    }

    /// Mutably borrow the ownership record at a slot.
    #[inline]
    pub fn owner_record_mut(&mut self, slot: Slot) -> &mut OwnershipRecord {
        &mut self.owners[slot.index()]
    }

    /// Take the ownership record at a slot, leaving an empty one.
    pub fn take_owner_record(&mut self, slot: Slot) -> OwnershipRecord {
        std::mem::take(&mut self.owners[slot.index()])
    }

    /// Iterate the ownership records of the occupied slot range.
    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut OwnershipRecord> {
        self.owners[1..self.cursor as usize].iter_mut()
    }

    /// Iterate the live entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        (1..self.cursor).filter_map(|slot| self.entity_at(Slot::new(slot)))
    }

    /// Compact the table in place so live entities occupy slots
    /// `1..cursor` in their previous slot order.
    ///
    /// Returns the permutation from old slot to new slot, with 0 for slots
    /// that held no entity. Shrinks the backing arrays when occupancy has
    /// dropped below the threshold.
    pub fn compact(&mut self) -> Vec<u32> {
        let old_cursor = self.cursor;
        let mut map = vec![0u32; old_cursor as usize];
        let mut write = 1u32;
        for slot in 1..old_cursor {
            if self.ids[slot as usize] == 0 {
                continue;
            }
            if write != slot {
                self.ids[write as usize] = self.ids[slot as usize];
                self.owners.swap(write as usize, slot as usize);
            }
            map[slot as usize] = write;
            write += 1;
        }
        for slot in write..old_cursor {
            self.ids[slot as usize] = 0;
            self.owners[slot as usize] = OwnershipRecord::default();
        }
        self.cursor = write;

        if (write as f64) < SHRINK_OCCUPANCY * self.ids.len() as f64 {
            let target = (write as f64 * 1.2) as usize + 1;
            self.ids.truncate(target);
            self.owners.truncate(target);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entity_gets_slot_and_id_one() {
        // Given
        let mut table = Table::new();

        // When
        let entity = table.add();

        // Then
        assert_eq!(entity.slot().value(), 1);
        assert_eq!(entity.id().value(), 1);
        assert!(table.is_alive(entity));
        assert_eq!(table.live(), 1);
    }

    #[test]
    fn ids_increase_and_are_never_reused() {
        // Given
        let mut table = Table::new();
        let a = table.add();
        let b = table.add();

        // When - remove and allocate again
        assert!(table.remove(a));
        let c = table.add();

        // Then - new id, fresh slot (holes persist until compaction)
        assert_eq!(b.id().value(), 2);
        assert_eq!(c.id().value(), 3);
        assert_eq!(c.slot().value(), 3);
        assert!(!table.is_alive(a));
    }

    #[test]
    fn removing_a_dead_entity_is_a_noop() {
        // Given
        let mut table = Table::new();
        let entity = table.add();
        assert!(table.remove(entity));

        // When / Then
        assert!(!table.remove(entity));
        assert_eq!(table.live(), 0);
    }

    #[test]
    fn entity_at_reflects_occupancy() {
        // Given
        let mut table = Table::new();
        let entity = table.add();

        // Then
        assert_eq!(table.entity_at(entity.slot()), Some(entity));
        assert_eq!(table.entity_at(Slot::NONE), None);
        assert_eq!(table.entity_at(Slot::new(9)), None);

        // When
        table.remove(entity);

        // Then
        assert_eq!(table.entity_at(entity.slot()), None);
    }

    #[test]
    fn compact_moves_survivors_down_in_order() {
        // Given
        let mut table = Table::new();
        let entities: Vec<_> = (0..6).map(|_| table.add()).collect();
        for entity in [entities[0], entities[2], entities[4]] {
            table.remove(entity);
        }

        // When
        let map = table.compact();

        // Then - survivors packed at slots 1..4 in prior slot order
        assert_eq!(table.cursor(), 4);
        assert_eq!(map[entities[1].slot().index()], 1);
        assert_eq!(map[entities[3].slot().index()], 2);
        assert_eq!(map[entities[5].slot().index()], 3);
        assert_eq!(map[entities[0].slot().index()], 0);

        // Then - survivors remain alive under their moved identity
        let moved = entities[3].moved_to(Slot::new(2));
        assert!(table.is_alive(moved));
        assert!(!table.is_alive(entities[3]));
    }

    #[test]
    fn compact_twice_is_identity() {
        // Given
        let mut table = Table::new();
        let entities: Vec<_> = (0..10).map(|_| table.add()).collect();
        for entity in entities.iter().step_by(2) {
            table.remove(*entity);
        }
        table.compact();
        let cursor = table.cursor();

        // When
        let map = table.compact();

        // Then - the second permutation is the identity
        assert_eq!(table.cursor(), cursor);
        for slot in 1..cursor {
            assert_eq!(map[slot as usize], slot);
        }
    }

    #[test]
    fn compact_shrinks_sparse_tables() {
        // Given
        let mut table = Table::new();
        let entities: Vec<_> = (0..100).map(|_| table.add()).collect();
        let capacity_before = table.capacity();
        for entity in &entities[5..] {
            table.remove(*entity);
        }

        // When
        table.compact();

        // Then
        assert!(table.capacity() < capacity_before);
        assert!(table.capacity() >= table.cursor() as usize);
    }

    #[test]
    fn slot_zero_is_never_allocated() {
        // Given
        let mut table = Table::new();

        // When
        for _ in 0..50 {
            assert_ne!(table.add().slot().value(), 0);
        }

        // Then
        assert_eq!(table.entity_at(Slot::NONE), None);
    }
}
