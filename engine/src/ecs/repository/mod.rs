//! Per-type component repositories.
//!
//! A repository owns every component of one type: the declared property
//! columns (in a stable, name-sorted order fixed at creation), any
//! runtime-added decorated columns, the id and version columns, the
//! entity index in both directions, and one ownership record per component.
//!
//! Slots are handed out sequentially from a cursor; removal leaves a hole
//! that persists until compaction re-densifies the storage in entity order.
//! Slot `0` is the reserved sentinel in every array: its id is 0, its
//! version is permanently -1, and every column keeps its default there for
//! the dead-handle contract.

mod compact;
mod decorate;

pub use decorate::Decoration;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use log::warn;

use crate::ecs::column::{
    self, Column, ObjectColumn, PrimitiveColumn, RefList, RefMap, RefSet, ScalarMap, ScalarSet,
};
use crate::ecs::component::{self, Handle};
use crate::ecs::entity;
use crate::ecs::owner::OwnershipRecord;
use crate::ecs::schema::{ObjectValue, Primitive, PropertyDef, Schema};
use crate::ecs::world;

/// Versions are kept non-negative for live components by masking off the
/// sign bit; the sequence wraps explicitly.
const VERSION_MASK: i32 = 0x7fff_ffff;

/// Initial number of backed slots, including the sentinel.
const INITIAL_CAPACITY: usize = 8;

/// The storage for all components of one type.
pub struct Repository {
    world: world::Id,
    type_id: world::TypeId,
    name: String,

    /// Types auto-attached alongside components of this type.
    required: Vec<world::TypeId>,

    /// Declared property definitions, name-sorted at creation.
    properties: Vec<PropertyDef>,

    /// One column per declared property, parallel to `properties`.
    columns: Vec<Box<dyn Column>>,

    /// Property name to index in `properties` and `columns`.
    property_names: HashMap<String, usize>,

    /// Runtime-added columns, held weakly. Dead entries are swept at
    /// compaction.
    decorated: Vec<Weak<RefCell<Box<dyn Column>>>>,

    /// Entity slot to repository slot; 0 means "not attached".
    entity_to_slot: Vec<u32>,

    /// Repository slot to entity slot; 0 means "dead slot".
    slot_to_entity: Vec<u32>,

    /// Component allocation id per slot; 0 means "dead slot".
    ids: Vec<u32>,
    ids_scratch: Vec<u32>,

    /// Component version per slot; -1 for dead slots and slot 0.
    versions: Vec<i32>,
    versions_scratch: Vec<i32>,

    /// Ownership record per slot.
    owners: Vec<OwnershipRecord>,
    owners_scratch: Vec<OwnershipRecord>,

    /// Next free slot. Always at least 1.
    cursor: u32,

    /// Next component allocation id. Always at least 1.
    next_id: u32,

    /// Next version sequence value.
    next_version: i32,

    /// Number of live components.
    live: u32,
}

impl Repository {
    /// Build the repository for a validated schema. `required` holds the
    /// resolved ids of the schema's required types; `entity_capacity` sizes
    /// the entity index.
    pub(crate) fn new(
        world: world::Id,
        type_id: world::TypeId,
        schema: &Schema,
        required: Vec<world::TypeId>,
        entity_capacity: usize,
    ) -> Self {
        // The declared column order is name-sorted and fixed for the life
        // of the repository.
        let mut properties = schema.properties().to_vec();
        properties.sort_by(|a, b| a.name().cmp(b.name()));

        let columns = properties
            .iter()
            .map(|def| column::build_column(def, INITIAL_CAPACITY))
            .collect();
        let property_names = properties
            .iter()
            .enumerate()
            .map(|(index, def)| (def.name().to_string(), index))
            .collect();

        Self {
            world,
            type_id,
            name: schema.name().to_string(),
            required,
            properties,
            columns,
            property_names,
            decorated: Vec::new(),
            entity_to_slot: vec![0; entity_capacity.max(1)],
            slot_to_entity: vec![0; INITIAL_CAPACITY],
            ids: vec![0; INITIAL_CAPACITY],
            ids_scratch: Vec::new(),
            versions: vec![-1; INITIAL_CAPACITY],
            versions_scratch: Vec::new(),
            owners: vec![OwnershipRecord::default(); INITIAL_CAPACITY],
            owners_scratch: Vec::new(),
            cursor: 1,
            next_id: 1,
            next_version: 0,
            live: 0,
        }
    }

    /// The component type stored here.
    #[inline]
    pub fn type_id(&self) -> world::TypeId {
        self.type_id
    }

    /// The schema name of the stored type.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The types auto-attached alongside this one.
    #[inline]
    pub fn required(&self) -> &[world::TypeId] {
        &self.required
    }

    /// The next free slot. Every live component sits below this.
    #[inline]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// The number of live components.
    #[inline]
    pub fn live(&self) -> u32 {
        self.live
    }

    /// The number of backed slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ids.len()
    }

    /// The number of declared properties.
    #[inline]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// The definition of a declared property.
    pub fn property(&self, property: usize) -> &PropertyDef {
        &self.properties[property]
    }

    /// Look up a declared property's index by name.
    #[inline]
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.property_names.get(name).copied()
    }

    /// Borrow a declared column.
    #[inline]
    pub fn column(&self, property: usize) -> &dyn Column {
        self.columns[property].as_ref()
    }

    /// Mutably borrow a declared column.
    #[inline]
    pub fn column_mut(&mut self, property: usize) -> &mut dyn Column {
        self.columns[property].as_mut()
    }

    /// Whether the handle refers to a live component of this repository.
    /// Handles of foreign worlds or types simply read as dead here.
    #[inline]
    pub fn is_alive(&self, handle: &Handle) -> bool {
        handle.world_id() == self.world
            && handle.type_id() == self.type_id
            && self.slot_is_live(handle.slot(), handle.id())
    }

    #[inline]
    fn slot_is_live(&self, slot: component::Slot, id: component::Id) -> bool {
        !slot.is_none()
            && slot.value() < self.cursor
            && self.ids[slot.index()] == id.value()
    }

    /// Resolve a handle for an operation. Foreign-world and foreign-type
    /// handles are caller bugs and panic; dead handles resolve to `None`.
    fn live_slot(&self, handle: &Handle) -> Option<usize> {
        assert!(
            handle.world_id() == self.world,
            "component handle from world {:?} used against world {:?}",
            handle.world_id(),
            self.world
        );
        assert!(
            handle.type_id() == self.type_id,
            "component handle of type {:?} used against repository '{}'",
            handle.type_id(),
            self.name
        );
        self.slot_is_live(handle.slot(), handle.id())
            .then(|| handle.slot().index())
    }

    /// Get the handle of the component attached to an entity, if any.
    pub fn get(&self, entity: entity::Slot) -> Option<Handle> {
        let slot = *self.entity_to_slot.get(entity.index())?;
        if slot == 0 {
            return None;
        }
        Some(self.handle_at(component::Slot::new(slot)))
    }

    /// Get the entity slot a live repository slot is attached to.
    #[inline]
    pub(crate) fn entity_slot_at(&self, slot: component::Slot) -> entity::Slot {
        entity::Slot::new(self.slot_to_entity[slot.index()])
    }

    /// Build the handle for an occupied repository slot.
    #[inline]
    pub(crate) fn handle_at(&self, slot: component::Slot) -> Handle {
        Handle::new(
            self.world,
            self.type_id,
            slot,
            component::Id::new(self.ids[slot.index()]),
        )
    }

    /// The entity a live component is attached to, as a slot. `None` for
    /// dead handles.
    pub fn entity_of(&self, handle: &Handle) -> Option<entity::Slot> {
        self.live_slot(handle)
            .map(|slot| entity::Slot::new(self.slot_to_entity[slot]))
    }

    /// Allocate a slot for a component on the given entity. The world has
    /// already removed any previous component of this type from the entity,
    /// and handles required-type attachment itself.
    pub(crate) fn add_raw(&mut self, entity: entity::Slot) -> Handle {
        debug_assert!(!entity.is_none(), "cannot attach to the sentinel entity");
        if entity.index() >= self.entity_to_slot.len() {
            self.expand_entity_index(entity.index() + 1);
        }
        debug_assert_eq!(
            self.entity_to_slot[entity.index()],
            0,
            "entity already carries a '{}' component",
            self.name
        );

        let slot = self.cursor as usize;
        if slot == self.capacity() {
            let target = self.capacity() + self.capacity() / 2 + 1;
            self.resize_storage(target);
        }

        self.entity_to_slot[entity.index()] = slot as u32;
        self.slot_to_entity[slot] = entity.value();
        for column in &mut self.columns {
            column.default_init(slot);
        }
        // Decorated columns whose strong handle is still out there follow
        // along; dead ones are skipped and swept at the next compaction.
        for weak in &self.decorated {
            if let Some(column) = weak.upgrade() {
                column.borrow_mut().default_init(slot);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        self.ids[slot] = id;
        self.versions[slot] = self.next_version & VERSION_MASK;
        self.next_version = self.next_version.wrapping_add(1);
        self.owners[slot] = OwnershipRecord::default();
        self.cursor += 1;
        self.live += 1;

        #[cfg(debug_assertions)]
        self.verify_invariants();

        Handle::new(
            self.world,
            self.type_id,
            component::Slot::new(slot as u32),
            component::Id::new(id),
        )
    }

    /// Copy every declared property from one slot onto another, obeying
    /// each property's clone policy. Decorated columns are not cloned.
    pub(crate) fn clone_declared(&mut self, src: component::Slot, dst: component::Slot) {
        for column in &mut self.columns {
            column.clone_slot(src.index(), dst.index());
        }
    }

    /// Release the slot attached to an entity, returning the removed
    /// handle and its ownership record for the world's cascade. Column
    /// data is not defaulted; it goes logically dead with the slot.
    pub(crate) fn remove_raw(
        &mut self,
        entity: entity::Slot,
    ) -> Option<(Handle, OwnershipRecord)> {
        let slot = *self.entity_to_slot.get(entity.index())? as usize;
        if slot == 0 {
            return None;
        }
        let handle = self.handle_at(component::Slot::new(slot as u32));
        let record = std::mem::take(&mut self.owners[slot]);
        self.ids[slot] = 0;
        self.versions[slot] = -1;
        self.slot_to_entity[slot] = 0;
        self.entity_to_slot[entity.index()] = 0;
        self.live -= 1;
        Some((handle, record))
    }

    /// The version of a live component. `None` for dead handles.
    pub fn version(&self, handle: &Handle) -> Option<i32> {
        self.live_slot(handle).map(|slot| self.versions[slot])
    }

    /// Assign the next version sequence value to a live component. Dead
    /// handles are silently ignored, consistent with the sentinel version
    /// on dead slots.
    pub fn bump_version(&mut self, handle: &Handle) -> bool {
        match self.live_slot(handle) {
            Some(slot) => {
                self.versions[slot] = self.next_version & VERSION_MASK;
                self.next_version = self.next_version.wrapping_add(1);
                true
            }
            None => false,
        }
    }

    /// Ensure the entity index covers at least `n` entity slots.
    pub(crate) fn expand_entity_index(&mut self, n: usize) {
        if self.entity_to_slot.len() < n {
            self.entity_to_slot.resize(n, 0);
        }
    }

    /// Grow every slot-indexed array to the target capacity.
    fn resize_storage(&mut self, target: usize) {
        self.ids.resize(target, 0);
        self.versions.resize(target, -1);
        self.slot_to_entity.resize(target, 0);
        self.owners.resize(target, OwnershipRecord::default());
        for column in &mut self.columns {
            column.resize(target);
        }
        for weak in &self.decorated {
            if let Some(column) = weak.upgrade() {
                column.borrow_mut().resize(target);
            }
        }
    }

    #[inline]
    pub(crate) fn owner_record(&self, slot: usize) -> &OwnershipRecord {
        &self.owners[slot]
    }

    #[inline]
    pub(crate) fn owner_record_mut(&mut self, slot: usize) -> &mut OwnershipRecord {
        &mut self.owners[slot]
    }

    /// Iterate the ownership records of the occupied slot range.
    pub(crate) fn owner_records_mut(&mut self) -> impl Iterator<Item = &mut OwnershipRecord> {
        self.owners[1..self.cursor as usize].iter_mut()
    }

    /// Read a primitive property of a live component.
    ///
    /// # Panics
    /// Panics if the property index is out of range or the property is not
    /// of primitive type `T`.
    pub fn value<T: Primitive>(&self, handle: &Handle, property: usize) -> Option<T> {
        let slot = self.live_slot(handle)?;
        Some(self.primitive_column::<T>(property).get(slot))
    }

    /// Write a primitive property of a live component. Writes through dead
    /// handles are ignored.
    ///
    /// # Panics
    /// Panics if the property index is out of range or the property is not
    /// of primitive type `T`.
    pub fn set_value<T: Primitive>(&mut self, handle: &Handle, property: usize, value: T) -> bool {
        match self.live_slot(handle) {
            Some(slot) => {
                self.primitive_column_mut::<T>(property).set(slot, value);
                true
            }
            None => {
                warn!("write through dead component handle ignored: {handle:?}");
                false
            }
        }
    }

    /// Read an enum property's ordinal.
    pub fn ordinal(&self, handle: &Handle, property: usize) -> Option<i32> {
        let slot = self.live_slot(handle)?;
        Some(self.enum_column(property).get(slot))
    }

    /// Write an enum property's ordinal. Writes through dead handles are
    /// ignored.
    pub fn set_ordinal(&mut self, handle: &Handle, property: usize, ordinal: i32) -> bool {
        match self.live_slot(handle) {
            Some(slot) => {
                self.enum_column_mut(property).set(slot, ordinal);
                true
            }
            None => {
                warn!("write through dead component handle ignored: {handle:?}");
                false
            }
        }
    }

    /// Read an object property, sharing the referent.
    pub fn object(&self, handle: &Handle, property: usize) -> Option<Option<Rc<dyn ObjectValue>>> {
        let slot = self.live_slot(handle)?;
        Some(self.object_column(property).get(slot))
    }

    /// Write an object property. Writes through dead handles are ignored.
    pub fn set_object(
        &mut self,
        handle: &Handle,
        property: usize,
        value: Option<Rc<dyn ObjectValue>>,
    ) -> bool {
        match self.live_slot(handle) {
            Some(slot) => {
                self.object_column_mut(property).set(slot, value);
                true
            }
            None => {
                warn!("write through dead component handle ignored: {handle:?}");
                false
            }
        }
    }

    /// Borrow a value-set property of a live component.
    pub fn scalar_set(&self, handle: &Handle, property: usize) -> Option<&ScalarSet> {
        let slot = self.live_slot(handle)?;
        Some(self.typed_column::<column::ScalarSetColumn>(property, "value set").get(slot))
    }

    /// Mutably borrow a value-set property of a live component.
    pub fn scalar_set_mut(&mut self, handle: &Handle, property: usize) -> Option<&mut ScalarSet> {
        let slot = self.live_slot(handle)?;
        Some(
            self.typed_column_mut::<column::ScalarSetColumn>(property, "value set")
                .get_mut(slot),
        )
    }

    /// Borrow a value-map property of a live component.
    pub fn scalar_map(&self, handle: &Handle, property: usize) -> Option<&ScalarMap> {
        let slot = self.live_slot(handle)?;
        Some(self.typed_column::<column::ScalarMapColumn>(property, "value map").get(slot))
    }

    /// Mutably borrow a value-map property of a live component.
    pub fn scalar_map_mut(&mut self, handle: &Handle, property: usize) -> Option<&mut ScalarMap> {
        let slot = self.live_slot(handle)?;
        Some(
            self.typed_column_mut::<column::ScalarMapColumn>(property, "value map")
                .get_mut(slot),
        )
    }

    /// Read a reference-set property, sharing the container.
    pub fn reference_set(
        &self,
        handle: &Handle,
        property: usize,
    ) -> Option<Option<Rc<RefCell<RefSet>>>> {
        let slot = self.live_slot(handle)?;
        Some(self.typed_column::<column::RefSetColumn>(property, "reference set").get(slot))
    }

    /// Read a reference-map property, sharing the container.
    pub fn reference_map(
        &self,
        handle: &Handle,
        property: usize,
    ) -> Option<Option<Rc<RefCell<RefMap>>>> {
        let slot = self.live_slot(handle)?;
        Some(self.typed_column::<column::RefMapColumn>(property, "reference map").get(slot))
    }

    /// Read a reference-list property, sharing the container.
    pub fn reference_list(
        &self,
        handle: &Handle,
        property: usize,
    ) -> Option<Option<Rc<RefCell<RefList>>>> {
        let slot = self.live_slot(handle)?;
        Some(self.typed_column::<column::RefListColumn>(property, "reference list").get(slot))
    }

    fn primitive_column<T: Primitive>(&self, property: usize) -> &PrimitiveColumn<T> {
        match self.columns[property].as_primitive::<T>() {
            Some(column) => column,
            None => self.type_mismatch(property, &format!("{:?}", T::KIND)),
        }
    }

    fn primitive_column_mut<T: Primitive>(&mut self, property: usize) -> &mut PrimitiveColumn<T> {
        if self.columns[property].as_primitive::<T>().is_none() {
            self.type_mismatch(property, &format!("{:?}", T::KIND));
        }
        self.columns[property]
            .as_primitive_mut::<T>()
            .unwrap_or_else(|| unreachable!())
    }

    fn enum_column(&self, property: usize) -> &column::EnumColumn {
        self.typed_column::<column::EnumColumn>(property, "enum")
    }

    fn enum_column_mut(&mut self, property: usize) -> &mut column::EnumColumn {
        self.typed_column_mut::<column::EnumColumn>(property, "enum")
    }

    fn object_column(&self, property: usize) -> &ObjectColumn {
        self.typed_column::<ObjectColumn>(property, "object")
    }

    fn object_column_mut(&mut self, property: usize) -> &mut ObjectColumn {
        self.typed_column_mut::<ObjectColumn>(property, "object")
    }

    fn typed_column<C: 'static>(&self, property: usize, expected: &str) -> &C {
        match self.columns[property].as_any().downcast_ref::<C>() {
            Some(column) => column,
            None => self.type_mismatch(property, expected),
        }
    }

    fn typed_column_mut<C: 'static>(&mut self, property: usize, expected: &str) -> &mut C {
        if self.columns[property].as_any().downcast_ref::<C>().is_none() {
            self.type_mismatch(property, expected);
        }
        self.columns[property]
            .as_any_mut()
            .downcast_mut::<C>()
            .unwrap_or_else(|| unreachable!())
    }

    fn type_mismatch(&self, property: usize, expected: &str) -> ! {
        panic!(
            "property '{}' of '{}' is not a {} column (declared {:?})",
            self.properties[property].name(),
            self.name,
            expected,
            self.properties[property].kind()
        )
    }

    /// Check the structural invariants of the repository.
    ///
    /// # Panics
    /// Panics if any slot-indexed array disagrees with another.
    #[cfg(debug_assertions)]
    pub fn verify_invariants(&self) {
        assert!(self.cursor >= 1);
        assert_eq!(self.ids[0], 0, "sentinel slot must stay dead");
        assert_eq!(self.versions[0], -1, "sentinel version must stay -1");
        assert_eq!(self.slot_to_entity[0], 0);

        let capacity = self.capacity();
        assert_eq!(self.versions.len(), capacity);
        assert_eq!(self.slot_to_entity.len(), capacity);
        assert_eq!(self.owners.len(), capacity);
        for (index, column) in self.columns.iter().enumerate() {
            assert_eq!(
                column.capacity(),
                capacity,
                "column '{}' capacity out of step",
                self.properties[index].name()
            );
        }

        let mut live = 0;
        for slot in 1..self.cursor as usize {
            let entity = self.slot_to_entity[slot];
            if entity == 0 {
                assert_eq!(self.ids[slot], 0, "dead slot {slot} still carries an id");
                continue;
            }
            live += 1;
            assert_ne!(self.ids[slot], 0, "live slot {slot} has no id");
            assert!(self.versions[slot] >= 0, "live slot {slot} has a dead version");
            assert_eq!(
                self.entity_to_slot[entity as usize], slot as u32,
                "entity index disagrees with slot {slot}"
            );
        }
        assert_eq!(live, self.live, "live count out of step");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_repo(schema: Schema) -> Repository {
        Repository::new(
            world::Id::new(0),
            world::TypeId::new(0),
            &schema,
            Vec::new(),
            16,
        )
    }

    fn position_schema() -> Schema {
        Schema::new("position")
            .with(PropertyDef::scalar("y", 0.0f32))
            .with(PropertyDef::scalar("x", 7.0f32))
    }

    #[test]
    fn declared_columns_are_name_sorted() {
        // Given - schema declares y before x
        let repo = test_repo(position_schema());

        // Then - columns are fixed in name order
        assert_eq!(repo.property_index("x"), Some(0));
        assert_eq!(repo.property_index("y"), Some(1));
        assert_eq!(repo.property_index("z"), None);
    }

    #[test]
    fn add_assigns_ids_versions_and_defaults() {
        // Given
        let mut repo = test_repo(position_schema());

        // When
        let a = repo.add_raw(entity::Slot::new(1));
        let b = repo.add_raw(entity::Slot::new(2));

        // Then
        assert_eq!(a.slot().value(), 1);
        assert_eq!(a.id().value(), 1);
        assert_eq!(b.id().value(), 2);
        assert_eq!(repo.live(), 2);
        assert_eq!(repo.value::<f32>(&a, 0), Some(7.0));
        assert_eq!(repo.value::<f32>(&a, 1), Some(0.0));
        assert!(repo.version(&a).unwrap() >= 0);
        assert_ne!(repo.version(&a), repo.version(&b));
    }

    #[test]
    fn remove_kills_the_handle_but_keeps_column_data() {
        // Given
        let mut repo = test_repo(position_schema());
        let handle = repo.add_raw(entity::Slot::new(1));
        repo.set_value(&handle, 0, 3.5f32);

        // When
        let removed = repo.remove_raw(entity::Slot::new(1));

        // Then
        assert!(removed.is_some());
        assert!(!repo.is_alive(&handle));
        assert_eq!(repo.get(entity::Slot::new(1)), None);
        assert_eq!(repo.value::<f32>(&handle, 0), None);
        assert_eq!(repo.version(&handle), None);
        // A second remove is a no-op.
        assert!(repo.remove_raw(entity::Slot::new(1)).is_none());
    }

    #[test]
    fn writes_through_dead_handles_are_ignored() {
        // Given
        let mut repo = test_repo(position_schema());
        let handle = repo.add_raw(entity::Slot::new(1));
        repo.remove_raw(entity::Slot::new(1));

        // When
        let wrote = repo.set_value(&handle, 0, 9.0f32);
        let bumped = repo.bump_version(&handle);

        // Then
        assert!(!wrote);
        assert!(!bumped);
    }

    #[test]
    fn ids_are_unique_across_reuse_of_entities() {
        // Given
        let mut repo = test_repo(position_schema());
        let mut seen = std::collections::HashSet::new();

        // When - churn the same entity slot
        for _ in 0..20 {
            let handle = repo.add_raw(entity::Slot::new(3));
            assert!(seen.insert(handle.id().value()));
            repo.remove_raw(entity::Slot::new(3));
        }

        // Then
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn version_bump_assigns_a_fresh_sequence_value() {
        // Given
        let mut repo = test_repo(position_schema());
        let handle = repo.add_raw(entity::Slot::new(1));
        let before = repo.version(&handle).unwrap();

        // When
        assert!(repo.bump_version(&handle));
        let after = repo.version(&handle).unwrap();

        // Then
        assert_ne!(before, after);
        assert!(after >= 0);
    }

    #[test]
    fn version_sequence_stays_non_negative_across_wrap() {
        // Given - a repository whose version counter is about to cross the
        // sign bit
        let mut repo = test_repo(position_schema());
        repo.next_version = i32::MAX;
        let a = repo.add_raw(entity::Slot::new(1));
        let b = repo.add_raw(entity::Slot::new(2));

        // Then
        assert_eq!(repo.version(&a), Some(i32::MAX & VERSION_MASK));
        assert!(repo.version(&b).unwrap() >= 0);
    }

    #[test]
    fn growth_keeps_every_column_in_step() {
        // Given
        let mut repo = test_repo(position_schema());

        // When - push well past the initial capacity
        for slot in 1..=40 {
            repo.add_raw(entity::Slot::new(slot));
        }

        // Then
        assert!(repo.capacity() > INITIAL_CAPACITY);
        #[cfg(debug_assertions)]
        repo.verify_invariants();
        let handle = repo.get(entity::Slot::new(40)).unwrap();
        assert_eq!(repo.value::<f32>(&handle, 0), Some(7.0));
    }

    #[test]
    fn clone_declared_follows_policies() {
        // Given - x copies, tag is disabled
        let schema = Schema::new("mixed")
            .with(PropertyDef::scalar("x", 0i32))
            .with(PropertyDef::scalar("tag", 5i32).with_clone_policy(crate::ecs::schema::ClonePolicy::Disabled));
        let mut repo = test_repo(schema);
        let template = repo.add_raw(entity::Slot::new(1));
        repo.set_value(&template, 1, 42i32);
        repo.set_value(&template, 0, 9i32);

        // When
        let clone = repo.add_raw(entity::Slot::new(2));
        repo.clone_declared(template.slot(), clone.slot());

        // Then
        assert_eq!(repo.value::<i32>(&clone, 1), Some(42));
        assert_eq!(repo.value::<i32>(&clone, 0), Some(5));
    }

    #[test]
    #[should_panic(expected = "is not a")]
    fn mismatched_primitive_access_panics() {
        // Given
        let mut repo = test_repo(position_schema());
        let handle = repo.add_raw(entity::Slot::new(1));

        // When - reading an f32 property as i64
        let _ = repo.value::<i64>(&handle, 0);
    }

    #[test]
    #[should_panic(expected = "used against world")]
    fn foreign_world_handle_panics() {
        // Given
        let repo = test_repo(position_schema());
        let foreign = Handle::new(
            world::Id::new(9),
            world::TypeId::new(0),
            component::Slot::new(1),
            component::Id::new(1),
        );

        // When
        let _ = repo.version(&foreign);
    }

    #[test]
    fn entity_index_expansion_is_monotonic() {
        // Given
        let mut repo = test_repo(position_schema());

        // When
        repo.expand_entity_index(100);
        repo.expand_entity_index(10);

        // Then - never shrinks outside compaction
        assert!(repo.entity_to_slot.len() >= 100);
    }
}
