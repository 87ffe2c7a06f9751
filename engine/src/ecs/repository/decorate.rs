//! Decorated columns.
//!
//! A decoration is a property column added to a repository at runtime. The
//! repository holds it weakly; the caller that asked for it holds the
//! strong handle. Dropping the strong handle never mutates the repository
//! synchronously; the repository observes the dead weak reference at the
//! next compaction and drops the entry then.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::ecs::column::{Column, ColumnFactory};
use crate::ecs::repository::Repository;
use crate::ecs::world;

/// The strong handle keeping a decorated column alive.
///
/// Access goes through [`with`](Decoration::with) and
/// [`with_mut`](Decoration::with_mut); downcast to the concrete column type
/// inside the closure. The repository keeps new slots of the column
/// default-initialised for as long as this handle lives, but template
/// cloning never touches it.
pub struct Decoration {
    column: Rc<RefCell<Box<dyn Column>>>,
    type_id: world::TypeId,
}

impl Decoration {
    /// The component type this decoration is attached to.
    #[inline]
    pub fn type_id(&self) -> world::TypeId {
        self.type_id
    }

    /// Read through the decorated column.
    pub fn with<R>(&self, f: impl FnOnce(&dyn Column) -> R) -> R {
        f(self.column.borrow().as_ref())
    }

    /// Write through the decorated column.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut dyn Column) -> R) -> R {
        f(self.column.borrow_mut().as_mut())
    }
}

impl Repository {
    /// Add a runtime column to this repository. The column is sized to the
    /// current capacity and default-initialised at the sentinel slot and at
    /// every live slot.
    pub fn decorate(&mut self, factory: &dyn ColumnFactory) -> Decoration {
        let capacity = self.capacity();
        let mut column = factory.create_column(capacity);
        // Normalise in case the factory sized the column differently.
        column.resize(capacity);
        column.default_init(0);
        for slot in 1..self.cursor as usize {
            if self.slot_to_entity[slot] != 0 {
                column.default_init(slot);
            }
        }

        let column = Rc::new(RefCell::new(column));
        self.decorated.push(Rc::downgrade(&column));
        debug!("decorated '{}' ({} decoration(s))", self.name, self.decorated.len());
        Decoration {
            column,
            type_id: self.type_id,
        }
    }

    /// Release a decoration by dropping its strong handle. The column stays
    /// in the repository's weak list until the next compaction sweeps it.
    pub fn undecorate(&mut self, decoration: Decoration) {
        debug_assert_eq!(decoration.type_id, self.type_id);
        drop(decoration);
    }

    /// The number of decorated columns whose strong handle is still held.
    pub fn decoration_count(&self) -> usize {
        self.decorated
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// The number of decoration entries, dead or alive, still tracked.
    /// Dead entries disappear at the next compaction.
    pub(crate) fn decoration_entries(&self) -> usize {
        self.decorated.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::column::PrimitiveFactory;
    use crate::ecs::entity;
    use crate::ecs::schema::{PropertyDef, Schema};

    fn test_repo() -> Repository {
        Repository::new(
            world::Id::new(0),
            world::TypeId::new(0),
            &Schema::new("target").with(PropertyDef::scalar("x", 0i32)),
            Vec::new(),
            16,
        )
    }

    #[test]
    fn decoration_defaults_every_live_slot() {
        // Given
        let mut repo = test_repo();
        let handles: Vec<_> = (1..=5).map(|s| repo.add_raw(entity::Slot::new(s))).collect();

        // When
        let flags = repo.decorate(&PrimitiveFactory::new(true));

        // Then
        for handle in &handles {
            let value = flags.with(|col| {
                col.as_primitive::<bool>().unwrap().get(handle.slot().index())
            });
            assert!(value);
        }
        assert_eq!(repo.decoration_count(), 1);
    }

    #[test]
    fn new_components_default_into_live_decorations() {
        // Given
        let mut repo = test_repo();
        let flags = repo.decorate(&PrimitiveFactory::new(7u8));

        // When - add after decorating, past the initial capacity
        let handle = repo.add_raw(entity::Slot::new(1));
        for slot in 2..=30 {
            repo.add_raw(entity::Slot::new(slot));
        }

        // Then - the decoration grew with the repository
        let value = flags.with(|col| {
            assert_eq!(col.capacity(), repo.capacity());
            col.as_primitive::<u8>().unwrap().get(handle.slot().index())
        });
        assert_eq!(value, 7);
    }

    #[test]
    fn dropping_the_strong_handle_does_not_touch_the_repository() {
        // Given
        let mut repo = test_repo();
        repo.add_raw(entity::Slot::new(1));
        let flags = repo.decorate(&PrimitiveFactory::new(false));
        assert_eq!(repo.decoration_count(), 1);

        // When
        repo.undecorate(flags);

        // Then - the weak entry lingers until compaction sweeps it
        assert_eq!(repo.decoration_count(), 0);
        assert_eq!(repo.decoration_entries(), 1);
        // Adds keep working; the dead decoration is skipped.
        repo.add_raw(entity::Slot::new(2));
    }

    #[test]
    fn decoration_writes_survive_churn() {
        // Given
        let mut repo = test_repo();
        let handle = repo.add_raw(entity::Slot::new(1));
        let flags = repo.decorate(&PrimitiveFactory::new(false));
        flags.with_mut(|col| {
            col.as_primitive_mut::<bool>().unwrap().set(handle.slot().index(), true)
        });

        // When - unrelated churn
        for slot in 2..=10 {
            repo.add_raw(entity::Slot::new(slot));
        }
        repo.remove_raw(entity::Slot::new(3));

        // Then
        let value =
            flags.with(|col| col.as_primitive::<bool>().unwrap().get(handle.slot().index()));
        assert!(value);
    }
}
