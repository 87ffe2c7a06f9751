//! Repository compaction.
//!
//! After arbitrary add/remove churn a repository's occupied slots are
//! sparse and out of entity order. Compaction re-densifies them so live
//! components occupy slots `1..cursor` ordered by their (already
//! compacted) entity slot, sweeps decorations whose strong handles are
//! gone, and rebuilds the entity index under the entity permutation the
//! world supplies.
//!
//! Data movement is planned once as maximal contiguous runs and applied to
//! every surviving column, so a mostly-dense repository moves O(live)
//! values in a handful of block copies rather than one copy per slot.

use log::debug;

use crate::ecs::column::{self, CompactPlan};
use crate::ecs::owner::OwnershipRecord;
use crate::ecs::repository::Repository;

/// Occupancy threshold below which storage shrinks.
const SHRINK_OCCUPANCY: f64 = 0.6;

/// Shrink target factor applied to the new cursor.
const SHRINK_HEADROOM: f64 = 1.2;

impl Repository {
    /// Re-densify this repository under the world's entity permutation.
    ///
    /// `entity_old_to_new` maps old entity slots to their compacted slots
    /// (0 for slots that held no entity); `new_entity_count` is the entity
    /// table's new cursor, used to size the rebuilt entity index.
    ///
    /// Returns the repository's own slot permutation, 0 for dead slots, so
    /// the world can remap component references held in ownership records.
    pub(crate) fn compact(
        &mut self,
        entity_old_to_new: &[u32],
        new_entity_count: usize,
    ) -> Vec<u32> {
        let old_cursor = self.cursor as usize;

        // Live slots, ordered by their compacted entity slot.
        let mut order: Vec<(u32, u32)> = Vec::with_capacity(self.live as usize);
        for slot in 1..old_cursor {
            let entity = self.slot_to_entity[slot];
            if entity == 0 {
                continue;
            }
            let new_entity = entity_old_to_new[entity as usize];
            debug_assert_ne!(new_entity, 0, "live component attached to a dead entity");
            order.push((new_entity, slot as u32));
        }
        order.sort_unstable();

        // Sweep decorations whose strong handles are gone.
        let entries = self.decorated.len();
        self.decorated.retain(|weak| weak.strong_count() > 0);
        if entries != self.decorated.len() {
            debug!(
                "swept {} dead decoration(s) from '{}'",
                entries - self.decorated.len(),
                self.name
            );
        }

        let new_cursor = order.len() + 1;
        let capacity = self.capacity();
        let new_capacity = if (new_cursor as f64) < SHRINK_OCCUPANCY * capacity as f64 {
            ((new_cursor as f64 * SHRINK_HEADROOM) as usize + 1).max(new_cursor)
        } else {
            capacity.max(new_cursor)
        };

        let old_slots: Vec<u32> = order.iter().map(|&(_, slot)| slot).collect();
        let plan = CompactPlan::new(&old_slots, new_capacity);

        for col in &mut self.columns {
            col.compact(&plan);
        }
        for weak in &self.decorated {
            if let Some(col) = weak.upgrade() {
                col.borrow_mut().compact(&plan);
            }
        }
        column::apply_plan_copy(&mut self.ids, &mut self.ids_scratch, 0, &plan);
        column::apply_plan_copy(&mut self.versions, &mut self.versions_scratch, -1, &plan);
        column::apply_plan_move(
            &mut self.owners,
            &mut self.owners_scratch,
            &OwnershipRecord::default(),
            &plan,
        );

        // The slot-to-entity map is rebuilt outright with the new entity
        // slots rather than permuted.
        self.slot_to_entity.clear();
        self.slot_to_entity.resize(new_capacity, 0);
        for (index, &(new_entity, _)) in order.iter().enumerate() {
            self.slot_to_entity[index + 1] = new_entity;
        }

        // Rebuild the entity index from scratch: reallocate smaller when
        // the entity table shrank well below it, zero in place otherwise.
        if (new_entity_count as f64) < SHRINK_OCCUPANCY * self.entity_to_slot.len() as f64 {
            self.entity_to_slot = vec![0; new_entity_count.max(1)];
        } else {
            self.entity_to_slot.fill(0);
            if self.entity_to_slot.len() < new_entity_count {
                self.entity_to_slot.resize(new_entity_count, 0);
            }
        }
        for slot in 1..new_cursor {
            self.entity_to_slot[self.slot_to_entity[slot] as usize] = slot as u32;
        }

        let mut slot_map = vec![0u32; old_cursor];
        for (index, &(_, old_slot)) in order.iter().enumerate() {
            slot_map[old_slot as usize] = (index + 1) as u32;
        }
        self.cursor = new_cursor as u32;

        #[cfg(debug_assertions)]
        self.verify_invariants();

        slot_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::column::PrimitiveFactory;
    use crate::ecs::entity;
    use crate::ecs::schema::{PropertyDef, Schema};
    use crate::ecs::world;

    fn test_repo() -> Repository {
        Repository::new(
            world::Id::new(0),
            world::TypeId::new(0),
            &Schema::new("marker").with(PropertyDef::scalar("value", 0i64)),
            Vec::new(),
            64,
        )
    }

    /// The identity permutation over `count` entity slots.
    fn identity(count: usize) -> Vec<u32> {
        (0..count as u32).collect()
    }

    #[test]
    fn compact_packs_live_slots_in_entity_order() {
        // Given - components added against descending entity slots
        let mut repo = test_repo();
        for entity in (1..=6u32).rev() {
            let handle = repo.add_raw(entity::Slot::new(entity));
            repo.set_value(&handle, 0, entity as i64 * 100);
        }
        repo.remove_raw(entity::Slot::new(5));
        repo.remove_raw(entity::Slot::new(2));

        // When
        let map = repo.compact(&identity(8), 8);

        // Then - survivors sit at 1..5 ordered by entity slot
        assert_eq!(repo.cursor(), 5);
        for (slot, expected_entity) in [(1u32, 1u32), (2, 3), (3, 4), (4, 6)] {
            let entity = entity::Slot::new(expected_entity);
            let handle = repo.get(entity).unwrap();
            assert_eq!(handle.slot().value(), slot);
            assert_eq!(repo.value::<i64>(&handle, 0), Some(expected_entity as i64 * 100));
        }
        // The permutation reports dead slots as 0.
        assert_eq!(map.iter().filter(|&&s| s == 0).count(), 3); // sentinel + 2 removed
    }

    #[test]
    fn compact_applies_the_entity_permutation() {
        // Given - entities 2 and 4 carry components; entity table compacts
        // them down to slots 1 and 2
        let mut repo = test_repo();
        repo.add_raw(entity::Slot::new(4));
        repo.add_raw(entity::Slot::new(2));
        let mut entity_map = vec![0u32; 6];
        entity_map[2] = 1;
        entity_map[4] = 2;

        // When
        repo.compact(&entity_map, 3);

        // Then - lookups work under the new entity slots
        let first = repo.get(entity::Slot::new(1)).unwrap();
        let second = repo.get(entity::Slot::new(2)).unwrap();
        assert_eq!(first.slot().value(), 1);
        assert_eq!(second.slot().value(), 2);
        assert_eq!(repo.get(entity::Slot::new(4)), None);
    }

    #[test]
    fn compact_twice_is_identity() {
        // Given
        let mut repo = test_repo();
        for entity in 1..=20u32 {
            repo.add_raw(entity::Slot::new(entity));
        }
        for entity in (1..=20u32).step_by(3) {
            repo.remove_raw(entity::Slot::new(entity));
        }
        repo.compact(&identity(32), 32);
        let cursor = repo.cursor();
        let capacity = repo.capacity();

        // When
        let map = repo.compact(&identity(32), 32);

        // Then
        assert_eq!(repo.cursor(), cursor);
        assert_eq!(repo.capacity(), capacity);
        for slot in 1..cursor {
            assert_eq!(map[slot as usize], slot);
        }
    }

    #[test]
    fn compact_shrinks_after_mass_removal() {
        // Given
        let mut repo = test_repo();
        for entity in 1..=100u32 {
            repo.add_raw(entity::Slot::new(entity));
        }
        let grown = repo.capacity();
        for entity in 4..=100u32 {
            repo.remove_raw(entity::Slot::new(entity));
        }

        // When
        repo.compact(&identity(128), 128);

        // Then
        assert!(repo.capacity() < grown);
        assert!(repo.capacity() >= repo.cursor() as usize);
        assert_eq!(repo.live(), 3);
    }

    #[test]
    fn compact_sweeps_dead_decorations_and_keeps_live_ones() {
        // Given
        let mut repo = test_repo();
        let handle = repo.add_raw(entity::Slot::new(1));
        repo.add_raw(entity::Slot::new(2));
        let kept = repo.decorate(&PrimitiveFactory::new(0i32));
        let dropped = repo.decorate(&PrimitiveFactory::new(0i32));
        kept.with_mut(|col| col.as_primitive_mut::<i32>().unwrap().set(handle.slot().index(), 77));
        drop(dropped);
        assert_eq!(repo.decoration_entries(), 2);

        // When
        let map = repo.compact(&identity(4), 4);

        // Then - dead entry swept, survivor's data follows the permutation
        assert_eq!(repo.decoration_entries(), 1);
        let new_slot = map[handle.slot().index()] as usize;
        let value = kept.with(|col| col.as_primitive::<i32>().unwrap().get(new_slot));
        assert_eq!(value, 77);
    }

    #[test]
    fn stale_handles_read_dead_after_compaction() {
        // Given
        let mut repo = test_repo();
        repo.add_raw(entity::Slot::new(3));
        let stale = repo.add_raw(entity::Slot::new(1));
        repo.remove_raw(entity::Slot::new(3));

        // When - the survivor moves from slot 2 to slot 1
        repo.compact(&identity(4), 4);

        // Then - the old handle fails its generational check; the entity
        // lookup yields the moved component
        assert!(!repo.is_alive(&stale));
        let fresh = repo.get(entity::Slot::new(1)).unwrap();
        assert_eq!(fresh.id(), stale.id());
        assert_eq!(fresh.slot().value(), 1);
    }
}
