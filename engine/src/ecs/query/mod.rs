//! Multi-type iteration.
//!
//! A [`Query`] walks the entities that carry components of every required
//! type, optionally binding handles for a further set of types that may or
//! may not be present. The query drives over the *primary* repository,
//! chosen at construction as the required type with the smallest cursor,
//! and probes the entity index of every other required type per candidate.
//! That makes a full pass O(live components of the primary type) with O(1)
//! work per other required type per candidate.
//!
//! The query pre-allocates one handle binding per requested type and
//! rebinds them in place on every [`advance`](Query::advance); nothing is
//! allocated while iterating. Because the query borrows the world for its
//! whole lifetime, structural mutation during iteration is rejected by the
//! borrow checker rather than detected at runtime.
//!
//! ```ignore
//! let mut query = world.query(&[position, velocity], &[paint]);
//! while query.advance() {
//!     let position = query.required(0);
//!     let paint = query.optional(0); // possibly dead; check before use
//! }
//! ```

use fixedbitset::FixedBitSet;

use crate::ecs::{component, entity, world};

/// One requested type and the handle currently bound for it.
#[derive(Debug, Clone, Copy)]
struct Binding {
    type_id: world::TypeId,
    handle: component::Handle,
}

/// An iterator over the entities carrying a required set of component
/// types, with an optional set bound opportunistically.
pub struct Query<'w> {
    world: &'w world::World,
    required: Vec<Binding>,
    optional: Vec<Binding>,

    /// Index into `required` of the driving type. Fixed at construction,
    /// never re-picked, even by `reset`.
    primary: usize,

    /// Cursor over the primary repository's slots.
    cursor: u32,

    /// The entity bound by the last successful advance.
    entity: entity::Entity,
}

impl<'w> Query<'w> {
    /// Build a query. Every listed type must be registered, and no type
    /// may be listed twice across the required and optional sets.
    pub(crate) fn new(
        world: &'w world::World,
        required: &[world::TypeId],
        optional: &[world::TypeId],
    ) -> Self {
        let mut seen = FixedBitSet::with_capacity(world.type_count());
        for &type_id in required.iter().chain(optional) {
            let repository = world.repository(type_id);
            assert!(
                !seen.put(type_id.index()),
                "component type '{}' listed twice in query",
                repository.name()
            );
        }

        let mut primary = 0;
        for (index, &type_id) in required.iter().enumerate() {
            if world.repository(type_id).cursor() < world.repository(required[primary]).cursor() {
                primary = index;
            }
        }

        let binding = |&type_id: &world::TypeId| Binding {
            type_id,
            handle: component::Handle::none(world.id(), type_id),
        };
        Self {
            world,
            required: required.iter().map(binding).collect(),
            optional: optional.iter().map(binding).collect(),
            primary,
            cursor: 0,
            entity: entity::Entity::NONE,
        }
    }

    /// Step to the next entity carrying every required type. Returns false
    /// when the primary repository is exhausted, and always false for an
    /// empty required set.
    pub fn advance(&mut self) -> bool {
        if self.required.is_empty() {
            return false;
        }
        let world = self.world;
        let primary = world.repository(self.required[self.primary].type_id);

        'candidates: loop {
            self.cursor += 1;
            if self.cursor >= primary.cursor() {
                self.entity = entity::Entity::NONE;
                return false;
            }
            let primary_slot = component::Slot::new(self.cursor);
            let entity_slot = primary.entity_slot_at(primary_slot);
            if entity_slot.is_none() {
                // A hole left by removal; skip it.
                continue;
            }

            for index in 0..self.required.len() {
                if index == self.primary {
                    continue;
                }
                let repository = world.repository(self.required[index].type_id);
                match repository.get(entity_slot) {
                    Some(handle) => self.required[index].handle = handle,
                    None => continue 'candidates,
                }
            }
            self.required[self.primary].handle = primary.handle_at(primary_slot);

            for binding in &mut self.optional {
                let repository = world.repository(binding.type_id);
                binding.handle = repository
                    .get(entity_slot)
                    .unwrap_or_else(|| component::Handle::none(world.id(), binding.type_id));
            }

            self.entity = match world.entity_at(entity_slot) {
                Some(entity) => entity,
                // The repository maps to an occupied entity slot by
                // invariant; a miss here would be internal corruption.
                None => unreachable!("component attached to a vacant entity slot"),
            };
            return true;
        }
    }

    /// Restart the walk. Bindings keep their last values until the next
    /// `advance`; the primary type is not re-picked.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// The entity bound by the last successful advance.
    #[inline]
    pub fn entity(&self) -> entity::Entity {
        self.entity
    }

    /// The handle bound for the nth required type. Alive after every
    /// advance that returned true.
    #[inline]
    pub fn required(&self, index: usize) -> component::Handle {
        self.required[index].handle
    }

    /// The handle bound for the nth optional type. May be dead; callers
    /// check liveness before use.
    #[inline]
    pub fn optional(&self, index: usize) -> component::Handle {
        self.optional[index].handle
    }

    /// The handle bound for the given type, searching the required set and
    /// then the optional set.
    pub fn handle(&self, type_id: world::TypeId) -> Option<component::Handle> {
        self.required
            .iter()
            .chain(&self.optional)
            .find(|binding| binding.type_id == type_id)
            .map(|binding| binding.handle)
    }
}
