//! Reference columns for heap objects.

use std::any::Any;
use std::rc::Rc;

use crate::ecs::column::{self, Column, CompactPlan};
use crate::ecs::schema::{ClonePolicy, ObjectValue, PropertyDefault, ValueKind};

/// A column of optional shared references to heap objects.
///
/// The default is either null or produced by a factory invoked once per
/// default-initialised slot. Cloning follows the property's policy:
/// `Reference` shares the referent, `Value` and `InvokeIntrinsic` ask the
/// referent for an intrinsic copy and fall back to sharing when it has
/// none, `Disabled` writes the default.
pub struct ObjectColumn {
    data: Vec<Option<Rc<dyn ObjectValue>>>,
    scratch: Vec<Option<Rc<dyn ObjectValue>>>,
    default: PropertyDefault,
    policy: ClonePolicy,
}

impl ObjectColumn {
    /// Create a column backed for `capacity` slots. The default must be
    /// `Null` or `Factory`.
    pub fn new(capacity: usize, default: PropertyDefault, policy: ClonePolicy) -> Self {
        debug_assert!(matches!(
            default,
            PropertyDefault::Null | PropertyDefault::Factory(_)
        ));
        let mut column = Self {
            data: Vec::new(),
            scratch: Vec::new(),
            default,
            policy,
        };
        column.resize(capacity);
        column
    }

    fn default_value(&self) -> Option<Rc<dyn ObjectValue>> {
        match &self.default {
            PropertyDefault::Factory(factory) => Some(factory()),
            _ => None,
        }
    }

    /// Read the referent at a slot, sharing it.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn get(&self, slot: usize) -> Option<Rc<dyn ObjectValue>> {
        column::check_slot(slot, self.data.len());
        self.data[slot].clone()
    }

    /// Write the referent at a slot.
    ///
    /// # Panics
    /// Panics if the slot is outside the backed range.
    #[inline]
    pub fn set(&mut self, slot: usize, value: Option<Rc<dyn ObjectValue>>) {
        column::check_slot(slot, self.data.len());
        self.data[slot] = value;
    }
}

impl Column for ObjectColumn {
    fn kind(&self) -> ValueKind {
        ValueKind::Object
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn resize(&mut self, n: usize) {
        if n <= self.data.len() {
            self.data.truncate(n);
            return;
        }
        // Each appended slot gets its own factory-produced default.
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
                .map(|rc| rc.try_clone().unwrap_or_else(|| rc.clone())),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Label(String);

    impl ObjectValue for Label {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn try_clone(&self) -> Option<Rc<dyn ObjectValue>> {
            Some(Rc::new(Label(self.0.clone())))
        }
    }

    /// A referent with no intrinsic clone.
    #[derive(Debug)]
    struct Opaque;

    impl ObjectValue for Opaque {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn label(text: &str) -> Rc<dyn ObjectValue> {
        Rc::new(Label(text.to_string()))
    }

    #[test]
    fn null_default_and_set() {
        // Given
        let mut column = ObjectColumn::new(3, PropertyDefault::Null, ClonePolicy::Reference);

        // Then
        assert!(column.get(1).is_none());

        // When
        column.set(1, Some(label("hi")));

        // Then
        let value = column.get(1).unwrap();
        assert_eq!(value.as_any().downcast_ref::<Label>().unwrap().0, "hi");
    }

    #[test]
    fn factory_default_produces_fresh_objects() {
        // Given
        let factory: Rc<dyn Fn() -> Rc<dyn ObjectValue>> = Rc::new(|| label("fresh"));
        let column = ObjectColumn::new(
            3,
            PropertyDefault::Factory(factory),
            ClonePolicy::Reference,
        );

        // Then - each slot holds its own referent
        let a = column.get(1).unwrap();
        let b = column.get(2).unwrap();
        assert!(!Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn reference_policy_shares_the_referent() {
        // Given
        let mut column = ObjectColumn::new(3, PropertyDefault::Null, ClonePolicy::Reference);
        column.set(1, Some(label("shared")));

        // When
        column.clone_slot(1, 2);

        // Then
        assert!(Rc::ptr_eq(
            &column.get(1).unwrap(),
            &column.get(2).unwrap()
        ));
    }

    #[test]
    fn value_policy_invokes_intrinsic_clone() {
        // Given
        let mut column = ObjectColumn::new(3, PropertyDefault::Null, ClonePolicy::Value);
        column.set(1, Some(label("deep")));

        // When
        column.clone_slot(1, 2);

        // Then - equal contents, distinct referents
        let src = column.get(1).unwrap();
        let dst = column.get(2).unwrap();
        assert!(!Rc::ptr_eq(&src, &dst));
        assert_eq!(
            dst.as_any().downcast_ref::<Label>().unwrap().0,
            "deep"
        );
    }

    #[test]
    fn value_policy_falls_back_to_sharing() {
        // Given
        let mut column = ObjectColumn::new(3, PropertyDefault::Null, ClonePolicy::Value);
        let opaque: Rc<dyn ObjectValue> = Rc::new(Opaque);
        column.set(1, Some(opaque));

        // When
        column.clone_slot(1, 2);

        // Then
        assert!(Rc::ptr_eq(
            &column.get(1).unwrap(),
            &column.get(2).unwrap()
        ));
    }

    #[test]
    fn disabled_policy_writes_the_default() {
        // Given
        let mut column = ObjectColumn::new(3, PropertyDefault::Null, ClonePolicy::Disabled);
        column.set(1, Some(label("ignored")));

        // When
        column.clone_slot(1, 2);

        // Then
        assert!(column.get(2).is_none());
    }

    #[test]
    fn compact_moves_referents() {
        // Given
        let mut column = ObjectColumn::new(5, PropertyDefault::Null, ClonePolicy::Reference);
        let kept = label("kept");
        column.set(2, Some(kept.clone()));
        column.set(3, Some(label("dropped")));

        // When - keep only slot 2
        column.compact(&CompactPlan::new(&[2], 3));

        // Then
        assert_eq!(column.capacity(), 3);
        assert!(Rc::ptr_eq(&column.get(1).unwrap(), &kept));
        assert!(column.get(2).is_none());
    }
}
