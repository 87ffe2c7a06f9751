//! Container columns.
//!
//! Value containers (`ScalarSet`, `ScalarMap`) are owned per slot and carry
//! their base scalar kinds with them; membership is a linear scan, which is
//! the right trade for the small containers these properties hold in
//! practice. Reference containers are shared per slot behind
//! `Rc<RefCell<..>>` and may be null.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::ecs::column::{self, Column, CompactPlan};
use crate::ecs::schema::{ClonePolicy, ObjectValue, PropertyDefault, ScalarKind, Value, ValueKind};

/// An owned set of scalar values of one base kind.
#[derive(Debug, Clone)]
pub struct ScalarSet {
    base: ScalarKind,
    items: Vec<Value>,
}

impl ScalarSet {
    /// Create an empty set over the given base kind.
    pub fn new(base: ScalarKind) -> Self {
        Self {
            base,
            items: Vec::new(),
        }
    }

    #[inline]
    pub fn base(&self) -> ScalarKind {
        self.base
    }

    /// Insert a value. Returns false if it was already present.
    ///
    /// # Panics
    /// Panics if the value is not of the set's base kind.
    pub fn insert(&mut self, value: Value) -> bool {
        assert!(
            value.kind() == self.base,
            "value of kind {:?} inserted into a {:?} set",
            value.kind(),
            self.base
        );
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    /// Remove a value. Returns false if it was not present.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|v| v == value) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|v| v == value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replace this set's contents with another's, reusing the allocation.
    pub fn copy_from(&mut self, other: &ScalarSet) {
        self.base = other.base;
        self.items.clear();
        self.items.extend_from_slice(&other.items);
    }
}

/// An owned map from scalar keys to scalar values of fixed base kinds.
#[derive(Debug, Clone)]
pub struct ScalarMap {
    key: ScalarKind,
    value: ScalarKind,
    entries: Vec<(Value, Value)>,
}

impl ScalarMap {
    /// Create an empty map over the given key and value kinds.
    pub fn new(key: ScalarKind, value: ScalarKind) -> Self {
        Self {
            key,
            value,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn key_kind(&self) -> ScalarKind {
        self.key
    }

    #[inline]
    pub fn value_kind(&self) -> ScalarKind {
        self.value
    }

    /// Insert or replace an entry, returning the previous value.
    ///
    /// # Panics
    /// Panics if the key or value is not of the map's base kinds.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        assert!(
            key.kind() == self.key && value.kind() == self.value,
            "entry ({:?}, {:?}) inserted into a ({:?}, {:?}) map",
            key.kind(),
            value.kind(),
            self.key,
            self.value
        );
        for entry in &mut self.entries {
            if entry.0 == key {
                return Some(std::mem::replace(&mut entry.1, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    #[inline]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove an entry, returning its value.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => Some(self.entries.swap_remove(index).1),
            None => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Value)> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replace this map's contents with another's, reusing the allocation.
    pub fn copy_from(&mut self, other: &ScalarMap) {
        self.key = other.key;
        self.value = other.value;
        self.entries.clear();
        self.entries.extend_from_slice(&other.entries);
    }
}

/// A shared set of object references with identity membership.
#[derive(Clone, Default)]
pub struct RefSet {
    items: Vec<Rc<dyn ObjectValue>>,
}

impl RefSet {
    /// Insert a referent. Returns false if this exact referent is present.
    pub fn insert(&mut self, value: Rc<dyn ObjectValue>) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    /// Remove a referent by identity. Returns false if it was not present.
    pub fn remove(&mut self, value: &Rc<dyn ObjectValue>) -> bool {
        match self.items.iter().position(|v| Rc::ptr_eq(v, value)) {
            Some(index) => {
                self.items.swap_remove(index);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, value: &Rc<dyn ObjectValue>) -> bool {
        self.items.iter().any(|v| Rc::ptr_eq(v, value))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn ObjectValue>> {
        self.items.iter()
    }
}

/// A shared map from scalar keys to object references.
#[derive(Clone, Default)]
pub struct RefMap {
    entries: Vec<(Value, Rc<dyn ObjectValue>)>,
}

impl RefMap {
    /// Insert or replace an entry, returning the previous referent.
    pub fn insert(&mut self, key: Value, value: Rc<dyn ObjectValue>) -> Option<Rc<dyn ObjectValue>> {
        for entry in &mut self.entries {
            if entry.0 == key {
                return Some(std::mem::replace(&mut entry.1, value));
            }
        }
        self.entries.push((key, value));
        None
    }

    #[inline]
    pub fn get(&self, key: &Value) -> Option<&Rc<dyn ObjectValue>> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove an entry, returning its referent.
    pub fn remove(&mut self, key: &Value) -> Option<Rc<dyn ObjectValue>> {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => Some(self.entries.swap_remove(index).1),
            None => None,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &(Value, Rc<dyn ObjectValue>)> {
        self.entries.iter()
    }
}

/// A shared ordered list of object references.
#[derive(Clone, Default)]
pub struct RefList {
    items: Vec<Rc<dyn ObjectValue>>,
}

impl RefList {
    pub fn push(&mut self, value: Rc<dyn ObjectValue>) {
        self.items.push(value);
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Rc<dyn ObjectValue>> {
        self.items.get(index)
    }

    /// Remove and return the referent at `index`, shifting the tail down.
    pub fn remove(&mut self, index: usize) -> Option<Rc<dyn ObjectValue>> {
        if index < self.items.len() {
            Some(self.items.remove(index))
        } else {
            None
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn ObjectValue>> {
        self.items.iter()
    }
}

/// A column of per-slot owned scalar sets, optionally shareable.
pub struct ScalarSetColumn {
    data: Vec<ScalarSet>,
    scratch: Vec<ScalarSet>,
    base: ScalarKind,
    policy: ClonePolicy,
    share: bool,
}

impl ScalarSetColumn {
    pub fn new(capacity: usize, base: ScalarKind, policy: ClonePolicy, share: bool) -> Self {
        Self {
            data: vec![ScalarSet::new(base); capacity],
            scratch: Vec::new(),
            base,
            policy,
            share,
        }
    }

    /// Borrow the set at a slot.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn get(&self, slot: usize) -> &ScalarSet {
        column::check_slot(slot, self.data.len());
        &self.data[slot]
    }

    /// Mutably borrow the set at a slot.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> &mut ScalarSet {
        column::check_slot(slot, self.data.len());
        &mut self.data[slot]
    }
}

impl Column for ScalarSetColumn {
    fn kind(&self) -> ValueKind {
        ValueKind::ValueSet { base: self.base }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn resize(&mut self, n: usize) {
        self.data.resize(n, ScalarSet::new(self.base));
    }

    fn swap(&mut self, a: usize, b: usize) {
        column::check_slot(a, self.data.len());
        column::check_slot(b, self.data.len());
        self.data.swap(a, b);
    }

    fn default_init(&mut self, slot: usize) {
        column::check_slot(slot, self.data.len());
        self.data[slot] = ScalarSet::new(self.base);
    }

    fn clone_slot(&mut self, src: usize, dst: usize) {
        column::check_slot(src, self.data.len());
        column::check_slot(dst, self.data.len());
        self.data[dst] = match self.policy {
            ClonePolicy::Disabled => ScalarSet::new(self.base),
            _ => self.data[src].clone(),
        };
    }

    fn compact(&mut self, plan: &CompactPlan) {
        let filler = ScalarSet::new(self.base);
        column::apply_plan_move(&mut self.data, &mut self.scratch, &filler, plan);
    }

    fn shareable(&self) -> bool {
        self.share
    }

    fn alloc_scratch(&self) -> Option<Box<dyn Any>> {
        self.share.then(|| Box::new(ScalarSet::new(self.base)) as Box<dyn Any>)
    }

    fn read_into_scratch(&self, slot: usize, scratch: &mut dyn Any) -> bool {
        if !self.share {
            return false;
        }
        column::check_slot(slot, self.data.len());
        match scratch.downcast_mut::<ScalarSet>() {
            Some(target) => {
                target.copy_from(&self.data[slot]);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A column of per-slot owned scalar maps, optionally shareable.
pub struct ScalarMapColumn {
    data: Vec<ScalarMap>,
    scratch: Vec<ScalarMap>,
    key: ScalarKind,
    value: ScalarKind,
    policy: ClonePolicy,
    share: bool,
}

impl ScalarMapColumn {
    pub fn new(
        capacity: usize,
        key: ScalarKind,
        value: ScalarKind,
        policy: ClonePolicy,
        share: bool,
    ) -> Self {
        Self {
            data: vec![ScalarMap::new(key, value); capacity],
            scratch: Vec::new(),
            key,
            value,
            policy,
            share,
        }
    }

    /// Borrow the map at a slot.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn get(&self, slot: usize) -> &ScalarMap {
        column::check_slot(slot, self.data.len());
        &self.data[slot]
    }

    /// Mutably borrow the map at a slot.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> &mut ScalarMap {
        column::check_slot(slot, self.data.len());
        &mut self.data[slot]
    }
}

impl Column for ScalarMapColumn {
    fn kind(&self) -> ValueKind {
        ValueKind::ValueMap {
            key: self.key,
            value: self.value,
        }
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn resize(&mut self, n: usize) {
        self.data.resize(n, ScalarMap::new(self.key, self.value));
    }

    fn swap(&mut self, a: usize, b: usize) {
        column::check_slot(a, self.data.len());
        column::check_slot(b, self.data.len());
        self.data.swap(a, b);
    }

    fn default_init(&mut self, slot: usize) {
        column::check_slot(slot, self.data.len());
        self.data[slot] = ScalarMap::new(self.key, self.value);
    }

    fn clone_slot(&mut self, src: usize, dst: usize) {
        column::check_slot(src, self.data.len());
        column::check_slot(dst, self.data.len());
        self.data[dst] = match self.policy {
            ClonePolicy::Disabled => ScalarMap::new(self.key, self.value),
            _ => self.data[src].clone(),
        };
    }

    fn compact(&mut self, plan: &CompactPlan) {
        let filler = ScalarMap::new(self.key, self.value);
        column::apply_plan_move(&mut self.data, &mut self.scratch, &filler, plan);
    }

    fn shareable(&self) -> bool {
        self.share
    }

    fn alloc_scratch(&self) -> Option<Box<dyn Any>> {
        self.share
            .then(|| Box::new(ScalarMap::new(self.key, self.value)) as Box<dyn Any>)
    }

    fn read_into_scratch(&self, slot: usize, scratch: &mut dyn Any) -> bool {
        if !self.share {
            return false;
        }
        column::check_slot(slot, self.data.len());
        match scratch.downcast_mut::<ScalarMap>() {
            Some(target) => {
                target.copy_from(&self.data[slot]);
                true
            }
            None => false,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Implements a column of per-slot `Option<Rc<RefCell<C>>>` containers.
/// `Reference` shares the pointer, `Value` and `InvokeIntrinsic` copy the
/// container structure (element referents stay shared), `Disabled` writes
/// the default.
macro_rules! reference_column {
    ($(#[$doc:meta])* $column:ident, $container:ident, $kind:expr) => {
        $(#[$doc])*
        pub struct $column {
            data: Vec<Option<Rc<RefCell<$container>>>>,
            scratch: Vec<Option<Rc<RefCell<$container>>>>,
            default_empty: bool,
            policy: ClonePolicy,
        }

        impl $column {
            /// Create a column backed for `capacity` slots. The default must
            /// be `Null` or `Empty`.
            pub fn new(capacity: usize, default: PropertyDefault, policy: ClonePolicy) -> Self {
                debug_assert!(matches!(
                    default,
                    PropertyDefault::Null | PropertyDefault::Empty
                ));
                let default_empty = matches!(default, PropertyDefault::Empty);
                let mut column = Self {
                    data: Vec::new(),
                    scratch: Vec::new(),
                    default_empty,
                    policy,
                };
                column.resize(capacity);
                column
            }

            fn default_value(&self) -> Option<Rc<RefCell<$container>>> {
                self.default_empty
                    .then(|| Rc::new(RefCell::new($container::default())))
            }

            /// Read the container at a slot, sharing it.
            ///
            /// # Panics
            /// Panics if the slot is outside the backed range.
            #[inline]
            pub fn get(&self, slot: usize) -> Option<Rc<RefCell<$container>>> {
                column::check_slot(slot, self.data.len());
                self.data[slot].clone()
            }

            /// Write the container at a slot.
            ///
            /// # Panics
            /// Panics if the slot is outside the backed range.
            #[inline]
            pub fn set(&mut self, slot: usize, value: Option<Rc<RefCell<$container>>>) {
                column::check_slot(slot, self.data.len());
                self.data[slot] = value;
            }
        }

        impl Column for $column {
            fn kind(&self) -> ValueKind {
                $kind
            }

            fn capacity(&self) -> usize {
                self.data.len()
            }

            fn resize(&mut self, n: usize) {
                if n <= self.data.len() {
                    self.data.truncate(n);
                    return;
                }
                while self.data.len() < n {
                    let value = self.default_value();
                    self.data.push(value);
                }
            }

            fn swap(&mut self, a: usize, b: usize) {
                column::check_slot(a, self.data.len());
                column::check_slot(b, self.data.len());
                self.data.swap(a, b);
            }

            fn default_init(&mut self, slot: usize) {
                column::check_slot(slot, self.data.len());
                self.data[slot] = self.default_value();
            }

            fn clone_slot(&mut self, src: usize, dst: usize) {
                column::check_slot(src, self.data.len());
                column::check_slot(dst, self.data.len());
                self.data[dst] = match self.policy {
                    ClonePolicy::Disabled => self.default_value(),
                    ClonePolicy::Reference => self.data[src].clone(),
                    ClonePolicy::Value | ClonePolicy::InvokeIntrinsic => self.data[src]
                        .as_ref()
                        .map(|rc| Rc::new(RefCell::new(rc.borrow().clone()))),
                };
            }

            fn compact(&mut self, plan: &CompactPlan) {
                let filler = self.default_value();
                column::apply_plan_move(&mut self.data, &mut self.scratch, &filler, plan);
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

reference_column!(
    /// A column of per-slot shared reference sets, possibly null.
    RefSetColumn,
    RefSet,
    ValueKind::ReferenceSet
);

reference_column!(
    /// A column of per-slot shared reference maps, possibly null.
    RefMapColumn,
    RefMap,
    ValueKind::ReferenceMap
);

reference_column!(
    /// A column of per-slot shared reference lists, possibly null.
    RefListColumn,
    RefList,
    ValueKind::ReferenceList
);
