//! The per-world type registry.
//!
//! Maps component type names (the opaque stable identifier a schema
//! carries) to dense [`TypeId`]s. Ids index straight into the world's
//! repository list, so every per-type lookup after registration is an
//! array access. Reads are lock-free via a sharded concurrent map;
//! registration is rare and uses the map's entry API.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use crate::ecs::schema::SchemaError;

/// A dense identifier for a registered component type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// Construct a new Id from a raw u32 value.
    #[inline]
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the index of this id for use in indexable storage.
    #[inline]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Get the raw id value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// The registry of component type names known to a world.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// Map from schema name to dense id.
    names: DashMap<String, TypeId>,

    /// Next available type identifier.
    next_id: AtomicU32,
}

impl TypeRegistry {
    /// Create a new, empty type registry.
    pub fn new() -> Self {
        Self {
            names: DashMap::new(),
            next_id: AtomicU32::new(0),
        }
    }

    /// Register a type name, assigning the next dense id. Registering the
    /// same name twice is an error; a component type is flat and
    /// independent and has exactly one repository.
    pub fn register(&self, name: &str) -> Result<TypeId, SchemaError> {
        match self.names.entry(name.to_string()) {
            dashmap::Entry::Occupied(_) => Err(SchemaError::DuplicateType(name.to_string())),
            dashmap::Entry::Vacant(vacant) => {
                let id = TypeId(self.next_id.fetch_add(1, Ordering::Relaxed));
                vacant.insert(id);
                Ok(id)
            }
        }
    }

    /// Look up the id for a type name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.names.get(name).map(|entry| *entry.value())
    }

    /// The number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.next_id.load(Ordering::Relaxed) as usize
    }

    /// Check if the registry is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_dense_ids() {
        // Given
        let registry = TypeRegistry::new();

        // When
        let a = registry.register("position").unwrap();
        let b = registry.register("velocity").unwrap();

        // Then
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(registry.get("position"), Some(a));
        assert_eq!(registry.get("velocity"), Some(b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        // Given
        let registry = TypeRegistry::new();
        registry.register("position").unwrap();

        // When
        let err = registry.register("position").unwrap_err();

        // Then
        assert!(matches!(err, SchemaError::DuplicateType(name) if name == "position"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        // Given
        let registry = TypeRegistry::new();

        // Then
        assert_eq!(registry.get("missing"), None);
        assert!(registry.is_empty());
    }
}
