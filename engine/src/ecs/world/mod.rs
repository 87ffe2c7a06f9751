//! The world is the container for everything in the runtime.
//!
//! A `World` owns the entity table and one repository per registered
//! component type, and exposes the whole public surface: registering
//! schemas, adding and removing entities and components, template cloning,
//! ownership, decoration, iteration and whole-system compaction.
//!
//! # Example
//!
//! ```ignore
//! use skein_engine::ecs::schema::{PropertyDef, Schema};
//! use skein_engine::ecs::world::{Id, World};
//!
//! let mut world = World::new(Id::new(1));
//! let position = world
//!     .register(
//!         Schema::new("position")
//!             .with(PropertyDef::scalar("x", 0.0f32))
//!             .with(PropertyDef::scalar("y", 0.0f32)),
//!     )
//!     .unwrap();
//!
//! let entity = world.add_entity();
//! let handle = world.add_component(position, entity);
//! world.repository_mut(position).set_value(&handle, 0, 4.0f32);
//! ```
//!
//! # Threading
//!
//! The runtime is single-threaded by design: all operations run to
//! completion on the invoking thread and the world is `!Send`. Callers
//! that share a world across threads own the synchronisation.

mod registry;

pub use registry::{TypeId, TypeRegistry};

use std::marker::PhantomData;

use log::{debug, warn};

use crate::ecs::column::ColumnFactory;
use crate::ecs::component;
use crate::ecs::entity;
use crate::ecs::owner::{Ownable, OwnershipRecord};
use crate::ecs::query::Query;
use crate::ecs::repository::{Decoration, Repository};
use crate::ecs::schema::{Schema, SchemaError};

/// A world identifier, distinguishing handles of unrelated worlds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u32);

impl Id {
    /// Create a new world identifier.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Id(id)
    }

    /// Get the raw identifier value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// The container for all entities, components and repositories.
pub struct World {
    /// The world's unique identifier.
    id: Id,

    /// The entity table.
    entities: entity::Table,

    /// The registry of component type names.
    registry: TypeRegistry,

    /// One repository per registered type, indexed by dense type id.
    repositories: Vec<Repository>,

    /// Marker to make the world !Send; it stays on its owning thread.
    _not_send: PhantomData<*mut ()>,
}

impl World {
    /// Create an empty world.
    pub fn new(id: Id) -> Self {
        Self {
            id,
            entities: entity::Table::new(),
            registry: TypeRegistry::new(),
            repositories: Vec::new(),
            _not_send: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The number of registered component types.
    #[inline]
    pub fn type_count(&self) -> usize {
        self.repositories.len()
    }

    /// The number of live entities.
    #[inline]
    pub fn entity_count(&self) -> u32 {
        self.entities.live()
    }

    /// Register a component type from its schema, creating the repository
    /// that backs it. Required types must already be registered, which also
    /// keeps required-type chains acyclic.
    pub fn register(&mut self, schema: Schema) -> Result<TypeId, SchemaError> {
        schema.validate()?;
        let mut required = Vec::with_capacity(schema.required().len());
        for name in schema.required() {
            match self.registry.get(name) {
                Some(type_id) => required.push(type_id),
                None => {
                    return Err(SchemaError::UnknownRequired {
                        type_name: schema.name().to_string(),
                        required: name.clone(),
                    });
                }
            }
        }
        let type_id = self.registry.register(schema.name())?;
        debug_assert_eq!(type_id.index(), self.repositories.len());
        self.repositories.push(Repository::new(
            self.id,
            type_id,
            &schema,
            required,
            self.entities.capacity(),
        ));
        Ok(type_id)
    }

    /// Look up a registered type by schema name.
    #[inline]
    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.registry.get(name)
    }

    /// Borrow the repository of a registered type.
    ///
    /// # Panics
    /// Panics if the type is not registered in this world.
    pub fn repository(&self, type_id: TypeId) -> &Repository {
        assert!(
            type_id.index() < self.repositories.len(),
            "component type {type_id:?} not registered in this world"
        );
        &self.repositories[type_id.index()]
    }

    /// Mutably borrow the repository of a registered type.
    ///
    /// # Panics
    /// Panics if the type is not registered in this world.
    pub fn repository_mut(&mut self, type_id: TypeId) -> &mut Repository {
        assert!(
            type_id.index() < self.repositories.len(),
            "component type {type_id:?} not registered in this world"
        );
        &mut self.repositories[type_id.index()]
    }

    /// Allocate a new entity and notify every repository to cover its slot.
    pub fn add_entity(&mut self) -> entity::Entity {
        let entity = self.entities.add();
        let capacity = self.entities.capacity();
        for repository in &mut self.repositories {
            repository.expand_entity_index(capacity);
        }
        entity
    }

    /// Allocate a new entity and clone every component the template entity
    /// carries onto it, declared properties only, policy by policy.
    pub fn add_entity_from(&mut self, template: entity::Entity) -> entity::Entity {
        let entity = self.add_entity();
        if !self.entities.is_alive(template) {
            warn!("entity template is not alive: {template:?}");
            return entity;
        }
        for index in 0..self.repositories.len() {
            let type_id = TypeId::new(index as u32);
            if let Some(template_handle) = self.repositories[index].get(template.slot()) {
                self.add_component_from(type_id, entity, &template_handle);
            }
        }
        entity
    }

    /// Remove an entity: every attached component goes first, each
    /// cascading through its ownership record, then the entity's own
    /// children are disowned and removed.
    pub fn remove_entity(&mut self, entity: entity::Entity) -> bool {
        if !self.entities.is_alive(entity) {
            warn!("attempted to remove an entity that is not alive: {entity:?}");
            return false;
        }
        self.cascade_remove(vec![Ownable::Entity(entity)]);
        true
    }

    /// Whether the entity is alive.
    #[inline]
    pub fn is_entity_alive(&self, entity: entity::Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// The entity occupying a slot, if any.
    #[inline]
    pub fn entity_at(&self, slot: entity::Slot) -> Option<entity::Entity> {
        self.entities.entity_at(slot)
    }

    /// Iterate the live entities in slot order.
    pub fn entities(&self) -> impl Iterator<Item = entity::Entity> + '_ {
        self.entities.iter()
    }

    /// Attach a component of the given type to an entity. Any existing
    /// component of that type on the entity is removed first. Each missing
    /// required type is auto-attached and owned by the new component.
    ///
    /// Attaching to a dead entity is ignored and yields a dead handle.
    pub fn add_component(&mut self, type_id: TypeId, entity: entity::Entity) -> component::Handle {
        if !self.entities.is_alive(entity) {
            warn!(
                "cannot attach '{}' to dead entity {entity:?}",
                self.repository(type_id).name()
            );
            return component::Handle::none(self.id, type_id);
        }
        if self.repository(type_id).get(entity.slot()).is_some() {
            self.remove_component(type_id, entity);
            // A deliberately-constructed ownership loop can take the entity
            // with it; nothing left to attach to then.
            if !self.entities.is_alive(entity) {
                warn!("entity {entity:?} died while replacing its component");
                return component::Handle::none(self.id, type_id);
            }
        }

        let handle = self.repository_mut(type_id).add_raw(entity.slot());

        let required = self.repository(type_id).required().to_vec();
        for required_type in required {
            if self.repository(required_type).get(entity.slot()).is_none() {
                let child = self.add_component(required_type, entity);
                self.set_owner(Ownable::Component(child), Some(Ownable::Component(handle)));
            }
        }
        handle
    }

    /// Attach a component cloned from a live template of the same type.
    /// Declared properties are cloned policy by policy; decorated columns
    /// stay at their defaults.
    ///
    /// # Panics
    /// Panics if the template handle belongs to another world or is of a
    /// different type than the destination repository.
    pub fn add_component_from(
        &mut self,
        type_id: TypeId,
        entity: entity::Entity,
        template: &component::Handle,
    ) -> component::Handle {
        assert!(
            template.world_id() == self.id,
            "template handle from world {:?} used against world {:?}",
            template.world_id(),
            self.id
        );
        assert!(
            template.type_id() == type_id,
            "template component of type {:?} does not match repository '{}'",
            template.type_id(),
            self.repository(type_id).name()
        );
        if !self.repository(type_id).is_alive(template) {
            warn!("component template is not alive: {template:?}");
            return self.add_component(type_id, entity);
        }

        let handle = self.add_component(type_id, entity);
        if handle.is_none() {
            return handle;
        }
        let repository = self.repository_mut(type_id);
        // Replacing the entity's own component may have been the template.
        if repository.is_alive(template) {
            repository.clone_declared(template.slot(), handle.slot());
        } else {
            warn!("component template died while replacing it: {template:?}");
        }
        handle
    }

    /// Get the component of the given type attached to an entity.
    pub fn get_component(
        &self,
        type_id: TypeId,
        entity: entity::Entity,
    ) -> Option<component::Handle> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.repository(type_id).get(entity.slot())
    }

    /// Detach the component of the given type from an entity, cascading
    /// removal through its ownership record. Returns false when the entity
    /// is dead or carries no such component.
    pub fn remove_component(&mut self, type_id: TypeId, entity: entity::Entity) -> bool {
        if !self.entities.is_alive(entity) {
            warn!(
                "cannot detach '{}' from dead entity {entity:?}",
                self.repository(type_id).name()
            );
            return false;
        }
        match self.repository(type_id).get(entity.slot()) {
            Some(handle) => {
                self.cascade_remove(vec![Ownable::Component(handle)]);
                true
            }
            None => false,
        }
    }

    /// Whether the handle refers to a live component.
    #[inline]
    pub fn is_alive(&self, handle: &component::Handle) -> bool {
        self.repository(handle.type_id()).is_alive(handle)
    }

    /// The entity a live component is attached to.
    pub fn component_entity(&self, handle: &component::Handle) -> Option<entity::Entity> {
        let slot = self.repository(handle.type_id()).entity_of(handle)?;
        self.entities.entity_at(slot)
    }

    /// The version of a live component.
    #[inline]
    pub fn version(&self, handle: &component::Handle) -> Option<i32> {
        self.repository(handle.type_id()).version(handle)
    }

    /// Assign the next version sequence value to a live component. Dead
    /// handles are silently ignored.
    #[inline]
    pub fn bump_version(&mut self, handle: &component::Handle) -> bool {
        self.repository_mut(handle.type_id()).bump_version(handle)
    }

    /// Whether the ownable is alive.
    pub fn is_ownable_alive(&self, item: Ownable) -> bool {
        match item {
            Ownable::Entity(entity) => self.entities.is_alive(entity),
            Ownable::Component(handle) => self.is_alive(&handle),
        }
    }

    /// Borrow the ownership record of a live ownable.
    pub fn ownership(&self, item: Ownable) -> Option<&OwnershipRecord> {
        match item {
            Ownable::Entity(entity) => self
                .entities
                .is_alive(entity)
                .then(|| self.entities.owner_record(entity.slot())),
            Ownable::Component(handle) => {
                let repository = self.repository(handle.type_id());
                repository
                    .is_alive(&handle)
                    .then(|| repository.owner_record(handle.slot().index()))
            }
        }
    }

    /// Make `new_owner` the owner of `item`, revoking any previous owner.
    /// Passing `None` merely disowns. Both parties must be alive; a dead
    /// party makes the call a logged no-op.
    pub fn set_owner(&mut self, item: Ownable, new_owner: Option<Ownable>) -> bool {
        if !self.is_ownable_alive(item) {
            warn!("cannot set the owner of dead {item:?}");
            return false;
        }
        if let Some(owner) = new_owner {
            if !self.is_ownable_alive(owner) {
                warn!("cannot make dead {owner:?} an owner");
                return false;
            }
            if owner == item {
                warn!("refusing to make {item:?} own itself");
                return false;
            }
        }

        let current = self.ownership(item).and_then(|record| record.owner());
        if current == new_owner {
            return true;
        }
        if let Some(previous) = current {
            if let Some(record) = self.ownable_record_mut(previous) {
                record.revoke(item);
            }
        }
        if let Some(record) = self.ownable_record_mut(item) {
            record.set_owner(new_owner);
        }
        if let Some(owner) = new_owner {
            if let Some(record) = self.ownable_record_mut(owner) {
                record.grant(item);
            }
        }
        true
    }

    /// Add a runtime column to a type's repository. The returned strong
    /// handle keeps the column alive; see
    /// [`Decoration`](crate::ecs::repository::Decoration).
    pub fn decorate(&mut self, type_id: TypeId, factory: &dyn ColumnFactory) -> Decoration {
        self.repository_mut(type_id).decorate(factory)
    }

    /// Release a decoration. The repository sweeps the dead entry at its
    /// next compaction.
    pub fn undecorate(&mut self, decoration: Decoration) {
        let type_id = decoration.type_id();
        self.repository_mut(type_id).undecorate(decoration);
    }

    /// Iterate the entities carrying every `required` type, binding
    /// `optional` types opportunistically.
    pub fn query<'w>(&'w self, required: &[TypeId], optional: &[TypeId]) -> Query<'w> {
        Query::new(self, required, optional)
    }

    /// Re-densify the whole system: compact the entity table in place,
    /// compact every repository under the resulting permutation, and fix up
    /// every ownership record for the moved slots.
    ///
    /// Caller-held entity and component values go stale when their rows
    /// move; re-acquire them through the world afterwards.
    pub fn compact(&mut self) {
        let entity_map = self.entities.compact();
        let new_entity_count = self.entities.cursor() as usize;

        let mut slot_maps = Vec::with_capacity(self.repositories.len());
        for repository in &mut self.repositories {
            slot_maps.push(repository.compact(&entity_map, new_entity_count));
        }

        for record in self.entities.records_mut() {
            remap_record(record, &entity_map, &slot_maps);
        }
        for repository in &mut self.repositories {
            for record in repository.owner_records_mut() {
                remap_record(record, &entity_map, &slot_maps);
            }
        }
        debug!(
            "compacted world {:?}: {} entities live across {} types",
            self.id,
            self.entities.live(),
            self.repositories.len()
        );
    }

    /// Drain the removal queue. Each ownable is visited at most once: a
    /// party already removed by an earlier step reads as dead and is
    /// skipped.
    fn cascade_remove(&mut self, mut queue: Vec<Ownable>) {
        while let Some(item) = queue.pop() {
            match item {
                Ownable::Component(handle) => self.detach_component(&handle, &mut queue),
                Ownable::Entity(entity) => self.detach_entity(entity, &mut queue),
            }
        }
    }

    fn detach_component(&mut self, handle: &component::Handle, queue: &mut Vec<Ownable>) {
        let entity_slot = {
            let repository = self.repository(handle.type_id());
            if !repository.is_alive(handle) {
                return;
            }
            repository.entity_slot_at(handle.slot())
        };
        let Some((removed, record)) = self.repository_mut(handle.type_id()).remove_raw(entity_slot)
        else {
            return;
        };
        self.settle_record(Ownable::Component(removed), record, queue);
    }

    fn detach_entity(&mut self, entity: entity::Entity, queue: &mut Vec<Ownable>) {
        if !self.entities.is_alive(entity) {
            return;
        }
        // Components first; each cascades through its own record.
        for index in 0..self.repositories.len() {
            if let Some(handle) = self.repositories[index].get(entity.slot()) {
                self.detach_component(&handle, queue);
            }
        }
        let record = self.entities.take_owner_record(entity.slot());
        self.entities.remove(entity);
        self.settle_record(Ownable::Entity(entity), record, queue);
    }

    /// Settle the record of a just-removed ownable: revoke it from its
    /// former owner, disown its children and schedule their removal.
    fn settle_record(
        &mut self,
        removed: Ownable,
        mut record: OwnershipRecord,
        queue: &mut Vec<Ownable>,
    ) {
        if let Some(owner) = record.owner() {
            if let Some(owner_record) = self.ownable_record_mut(owner) {
                owner_record.revoke(removed);
            }
        }
        for owned in record.take_owned() {
            if let Some(owned_record) = self.ownable_record_mut(owned) {
                owned_record.set_owner(None);
            }
            queue.push(owned);
        }
    }

    fn ownable_record_mut(&mut self, item: Ownable) -> Option<&mut OwnershipRecord> {
        match item {
            Ownable::Entity(entity) => {
                if !self.entities.is_alive(entity) {
                    return None;
                }
                Some(self.entities.owner_record_mut(entity.slot()))
            }
            Ownable::Component(handle) => {
                let repository = self.repository_mut(handle.type_id());
                if !repository.is_alive(&handle) {
                    return None;
                }
                Some(repository.owner_record_mut(handle.slot().index()))
            }
        }
    }
}

/// Rewrite one ownership record under the entity permutation and the
/// per-repository slot permutations produced by compaction.
fn remap_record(record: &mut OwnershipRecord, entity_map: &[u32], slot_maps: &[Vec<u32>]) {
    record.remap(|item| match item {
        Ownable::Entity(entity) => {
            let slot = entity_map
                .get(entity.slot().index())
                .copied()
                .unwrap_or(0);
            *entity = entity.moved_to(entity::Slot::new(slot));
        }
        Ownable::Component(handle) => {
            let slot = slot_maps[handle.type_id().index()]
                .get(handle.slot().index())
                .copied()
                .unwrap_or(0);
            *handle = handle.moved_to(component::Slot::new(slot));
        }
    });
}
