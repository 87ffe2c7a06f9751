//! Ownership records.
//!
//! Ownership is a directed relation between ownables: entities and
//! components. Every ownable holds one optional owner and the flat set of
//! ownables it owns. Removing an owner cascades removal to everything it
//! owns; the cascade itself runs in the world, which can reach the records
//! of every party. The invariant maintained is that an item appears in an
//! owner's owned set iff that owner is the item's recorded owner.
//!
//! The owned set is a plain vector with linear-scan membership. Typical
//! fan-out is small, so the scan beats a per-record hash set.

use crate::ecs::{component, entity};

/// A participant in the ownership graph: an entity or a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownable {
    Entity(entity::Entity),
    Component(component::Handle),
}

impl From<entity::Entity> for Ownable {
    #[inline]
    fn from(entity: entity::Entity) -> Self {
        Ownable::Entity(entity)
    }
}

impl From<component::Handle> for Ownable {
    #[inline]
    fn from(handle: component::Handle) -> Self {
        Ownable::Component(handle)
    }
}

/// The ownership state attached to every entity and component.
#[derive(Debug, Default, Clone)]
pub struct OwnershipRecord {
    owner: Option<Ownable>,
    owned: Vec<Ownable>,
}

impl OwnershipRecord {
    /// The current owner, if any.
    #[inline]
    pub fn owner(&self) -> Option<Ownable> {
        self.owner
    }

    /// The ownables this record owns.
    #[inline]
    pub fn owned(&self) -> &[Ownable] {
        &self.owned
    }

    /// Record the owner. Graph bookkeeping (revoking from the previous
    /// owner, granting to the new one) is the world's responsibility.
    #[inline]
    pub(crate) fn set_owner(&mut self, owner: Option<Ownable>) {
        self.owner = owner;
    }

    /// Insert an item into the owned set. Returns false if it was already
    /// present, so a double grant cannot duplicate the edge.
    pub(crate) fn grant(&mut self, item: Ownable) -> bool {
        if self.owned.contains(&item) {
            return false;
        }
        self.owned.push(item);
        true
    }

    /// Remove an item from the owned set. Returns false if it was not
    /// present, so a revoke is delivered at most once.
    pub(crate) fn revoke(&mut self, item: Ownable) -> bool {
        match self.owned.iter().position(|o| *o == item) {
            Some(index) => {
                self.owned.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Whether the owned set contains the item.
    #[inline]
    pub fn owns(&self, item: Ownable) -> bool {
        self.owned.contains(&item)
    }

    /// Drain the owned set for cascade processing.
    pub(crate) fn take_owned(&mut self) -> Vec<Ownable> {
        std::mem::take(&mut self.owned)
    }

    /// Rewrite every reference held by this record. Used after compaction,
    /// when entity and repository slots move.
    pub(crate) fn remap(&mut self, mut f: impl FnMut(&mut Ownable)) {
        if let Some(owner) = self.owner.as_mut() {
            f(owner);
        }
        for item in self.owned.iter_mut() {
            f(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::entity::Entity;

    fn ownable(tag: u32) -> Ownable {
        Ownable::Entity(Entity::new(
            crate::ecs::entity::Slot::new(tag),
            crate::ecs::entity::Id::new(tag),
        ))
    }

    #[test]
    fn grant_is_idempotent() {
        // Given
        let mut record = OwnershipRecord::default();

        // When
        assert!(record.grant(ownable(1)));
        assert!(!record.grant(ownable(1)));

        // Then
        assert_eq!(record.owned().len(), 1);
    }

    #[test]
    fn revoke_delivered_at_most_once() {
        // Given
        let mut record = OwnershipRecord::default();
        record.grant(ownable(1));

        // When / Then
        assert!(record.revoke(ownable(1)));
        assert!(!record.revoke(ownable(1)));
        assert!(record.owned().is_empty());
    }

    #[test]
    fn take_owned_drains_the_set() {
        // Given
        let mut record = OwnershipRecord::default();
        record.grant(ownable(1));
        record.grant(ownable(2));

        // When
        let drained = record.take_owned();

        // Then
        assert_eq!(drained.len(), 2);
        assert!(record.owned().is_empty());
    }
}
