//! Component type schemas.
//!
//! A [`Schema`] is the static description of one component type: the list of
//! properties it declares (names, value kinds, defaults, clone policies) and
//! the component types that must be auto-attached alongside it. Schemas are
//! produced by an external generator or written by hand; the runtime only
//! consumes them. Registering a schema with a
//! [`World`](crate::ecs::world::World) creates the repository that backs the
//! type.
//!
//! # Validation
//!
//! Schemas are validated at registration time. Malformed declarations such
//! as duplicate property names, a scratch-buffer request on a value kind
//! that cannot share one, or a default that does not match the declared
//! kind are surfaced as a [`SchemaError`] before any storage is built.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;

use crate::ecs::column::ColumnFactory;

/// The scalar kinds storable directly in a monomorphic column, and usable
/// as the base type of value containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// A UTF-16 code unit, stored as `u16`.
    Char,
}

/// The closed set of value kinds a property may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    I8,
    U8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Char,
    /// An enumeration stored as an `i32` ordinal in `0..arity`.
    Enum { arity: u32 },
    /// A reference to a heap object, possibly null.
    Object,
    /// A per-slot owned set of scalar values.
    ValueSet { base: ScalarKind },
    /// A per-slot owned map from scalar keys to scalar values.
    ValueMap { key: ScalarKind, value: ScalarKind },
    /// A per-slot shared set of object references, possibly null.
    ReferenceSet,
    /// A per-slot shared scalar-to-object map, possibly null.
    ReferenceMap,
    /// A per-slot shared ordered list of object references, possibly null.
    ReferenceList,
    /// A caller-defined column; the property must supply its own factory.
    Custom { token: u32 },
}

impl ValueKind {
    /// Whether this kind can expose a reusable scratch value for
    /// allocation-free reads during iteration.
    #[inline]
    pub fn supports_scratch(&self) -> bool {
        matches!(self, ValueKind::ValueSet { .. } | ValueKind::ValueMap { .. })
    }
}

impl From<ScalarKind> for ValueKind {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Bool => ValueKind::Bool,
            ScalarKind::I8 => ValueKind::I8,
            ScalarKind::U8 => ValueKind::U8,
            ScalarKind::I16 => ValueKind::I16,
            ScalarKind::I32 => ValueKind::I32,
            ScalarKind::I64 => ValueKind::I64,
            ScalarKind::F32 => ValueKind::F32,
            ScalarKind::F64 => ValueKind::F64,
            ScalarKind::Char => ValueKind::Char,
        }
    }
}

/// How a property behaves when a component is cloned from a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClonePolicy {
    /// Copy the value. Deep for owned aggregates.
    #[default]
    Value,
    /// Share the same referent in source and clone.
    Reference,
    /// The clone receives the property default, ignoring the source.
    Disabled,
    /// Invoke the referent's intrinsic clone; fall back to `Value` when the
    /// referent does not support one.
    InvokeIntrinsic,
}

/// A scalar property value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(u16),
}

impl Value {
    /// The scalar kind of this value.
    pub fn kind(&self) -> ScalarKind {
        match self {
            Value::Bool(_) => ScalarKind::Bool,
            Value::I8(_) => ScalarKind::I8,
            Value::U8(_) => ScalarKind::U8,
            Value::I16(_) => ScalarKind::I16,
            Value::I32(_) => ScalarKind::I32,
            Value::I64(_) => ScalarKind::I64,
            Value::F32(_) => ScalarKind::F32,
            Value::F64(_) => ScalarKind::F64,
            Value::Char(_) => ScalarKind::Char,
        }
    }
}

/// A heap value referenced by object columns and reference containers.
///
/// `try_clone` is the intrinsic clone hook used by the
/// [`ClonePolicy::InvokeIntrinsic`] and deep [`ClonePolicy::Value`] paths.
/// The default implementation reports "unsupported", in which case cloning
/// shares the referent instead.
pub trait ObjectValue: Any {
    /// Downcast support for callers that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Produce an independent copy of this value, if the type supports it.
    fn try_clone(&self) -> Option<Rc<dyn ObjectValue>> {
        None
    }
}

/// The default for one property, matched against its [`ValueKind`] at
/// schema validation.
#[derive(Clone)]
pub enum PropertyDefault {
    /// A literal scalar. Valid for the scalar kinds.
    Literal(Value),
    /// An enum ordinal. Valid for `Enum`.
    Ordinal(i32),
    /// The null referent. Valid for `Object` and the reference containers.
    Null,
    /// A factory invoked once per default-initialised slot. Valid for
    /// `Object`.
    Factory(Rc<dyn Fn() -> Rc<dyn ObjectValue>>),
    /// The empty container. Valid for the container kinds.
    Empty,
}

impl fmt::Debug for PropertyDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyDefault::Literal(v) => write!(f, "Literal({v:?})"),
            PropertyDefault::Ordinal(o) => write!(f, "Ordinal({o})"),
            PropertyDefault::Null => write!(f, "Null"),
            PropertyDefault::Factory(_) => write!(f, "Factory(..)"),
            PropertyDefault::Empty => write!(f, "Empty"),
        }
    }
}

/// The scalar primitives storable in a monomorphic column.
///
/// Sealed over the nine scalar kinds; used by the typed accessors on
/// repositories and columns.
pub trait Primitive: Copy + PartialEq + fmt::Debug + 'static {
    /// The scalar kind tag for this primitive.
    const KIND: ScalarKind;

    /// Extract a primitive of this type from a scalar value.
    fn from_value(value: &Value) -> Option<Self>;

    /// Wrap this primitive as a scalar value.
    fn into_value(self) -> Value;
}

macro_rules! primitive_impl {
    ($ty:ty, $kind:ident) => {
        impl Primitive for $ty {
            const KIND: ScalarKind = ScalarKind::$kind;

            #[inline]
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$kind(v) => Some(*v),
                    _ => None,
                }
            }

            #[inline]
            fn into_value(self) -> Value {
                Value::$kind(self)
            }
        }
    };
}

primitive_impl!(bool, Bool);
primitive_impl!(i8, I8);
primitive_impl!(u8, U8);
primitive_impl!(i16, I16);
primitive_impl!(i32, I32);
primitive_impl!(i64, I64);
primitive_impl!(f32, F32);
primitive_impl!(f64, F64);
primitive_impl!(u16, Char);

/// Errors surfaced when a malformed schema is registered.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("component type '{0}' is already registered")]
    DuplicateType(String),

    #[error("component type '{type_name}' declares property '{property}' more than once")]
    DuplicateProperty { type_name: String, property: String },

    #[error(
        "property '{property}' of '{type_name}' requests a scratch buffer \
         but kind {kind:?} cannot share one"
    )]
    NotShareable {
        type_name: String,
        property: String,
        kind: ValueKind,
    },

    #[error(
        "property '{property}' of '{type_name}' declares default {default:?} \
         incompatible with kind {kind:?}"
    )]
    DefaultMismatch {
        type_name: String,
        property: String,
        kind: ValueKind,
        default: PropertyDefault,
    },

    #[error("enum property '{property}' of '{type_name}' must declare a non-zero arity")]
    ZeroArity { type_name: String, property: String },

    #[error(
        "enum property '{property}' of '{type_name}' defaults to ordinal \
         {ordinal} outside 0..{arity}"
    )]
    OrdinalOutOfRange {
        type_name: String,
        property: String,
        ordinal: i32,
        arity: u32,
    },

    #[error("custom property '{property}' of '{type_name}' declares no column factory")]
    MissingFactory { type_name: String, property: String },

    #[error("component type '{type_name}' requires unregistered type '{required}'")]
    UnknownRequired { type_name: String, required: String },
}

/// The declaration of a single property of a component type.
#[derive(Clone)]
pub struct PropertyDef {
    name: String,
    kind: ValueKind,
    default: PropertyDefault,
    clone_policy: ClonePolicy,
    shareable: bool,
    factory: Option<Rc<dyn ColumnFactory>>,
}

impl PropertyDef {
    /// Declare a property with an explicit kind and default.
    pub fn new(name: impl Into<String>, kind: ValueKind, default: PropertyDefault) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            clone_policy: ClonePolicy::Value,
            shareable: false,
            factory: None,
        }
    }

    /// Declare a scalar property from a primitive default.
    pub fn scalar<T: Primitive>(name: impl Into<String>, default: T) -> Self {
        Self::new(
            name,
            T::KIND.into(),
            PropertyDefault::Literal(default.into_value()),
        )
    }

    /// Declare an enum property with the given arity and default ordinal.
    pub fn ordinal(name: impl Into<String>, arity: u32, default: i32) -> Self {
        Self::new(
            name,
            ValueKind::Enum { arity },
            PropertyDefault::Ordinal(default),
        )
    }

    /// Declare an object property defaulting to null, shared on clone.
    pub fn object(name: impl Into<String>) -> Self {
        let mut def = Self::new(name, ValueKind::Object, PropertyDefault::Null);
        def.clone_policy = ClonePolicy::Reference;
        def
    }

    /// Declare an object property whose default is produced by a factory.
    pub fn object_with_default(
        name: impl Into<String>,
        factory: impl Fn() -> Rc<dyn ObjectValue> + 'static,
    ) -> Self {
        let mut def = Self::new(
            name,
            ValueKind::Object,
            PropertyDefault::Factory(Rc::new(factory)),
        );
        def.clone_policy = ClonePolicy::Reference;
        def
    }

    /// Declare a value-set property over the given base kind.
    pub fn value_set(name: impl Into<String>, base: ScalarKind) -> Self {
        Self::new(name, ValueKind::ValueSet { base }, PropertyDefault::Empty)
    }

    /// Declare a value-map property over the given key and value kinds.
    pub fn value_map(name: impl Into<String>, key: ScalarKind, value: ScalarKind) -> Self {
        Self::new(
            name,
            ValueKind::ValueMap { key, value },
            PropertyDefault::Empty,
        )
    }

    /// Declare a reference-set property defaulting to null.
    pub fn reference_set(name: impl Into<String>) -> Self {
        let mut def = Self::new(name, ValueKind::ReferenceSet, PropertyDefault::Null);
        def.clone_policy = ClonePolicy::Reference;
        def
    }

    /// Declare a reference-map property defaulting to null.
    pub fn reference_map(name: impl Into<String>) -> Self {
        let mut def = Self::new(name, ValueKind::ReferenceMap, PropertyDefault::Null);
        def.clone_policy = ClonePolicy::Reference;
        def
    }

    /// Declare a reference-list property defaulting to null.
    pub fn reference_list(name: impl Into<String>) -> Self {
        let mut def = Self::new(name, ValueKind::ReferenceList, PropertyDefault::Null);
        def.clone_policy = ClonePolicy::Reference;
        def
    }

    /// Declare a custom property backed by a caller-supplied column factory.
    pub fn custom(
        name: impl Into<String>,
        token: u32,
        factory: impl ColumnFactory + 'static,
    ) -> Self {
        let mut def = Self::new(name, ValueKind::Custom { token }, PropertyDefault::Empty);
        def.factory = Some(Rc::new(factory));
        def
    }

    /// Override the clone policy for this property.
    pub fn with_clone_policy(mut self, policy: ClonePolicy) -> Self {
        self.clone_policy = policy;
        self
    }

    /// Request a reusable scratch value for this property. Only valid for
    /// the value-container kinds; rejected at schema validation otherwise.
    pub fn shareable(mut self) -> Self {
        self.shareable = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    #[inline]
    pub fn default(&self) -> &PropertyDefault {
        &self.default
    }

    #[inline]
    pub fn clone_policy(&self) -> ClonePolicy {
        self.clone_policy
    }

    #[inline]
    pub fn is_shareable(&self) -> bool {
        self.shareable
    }

    #[inline]
    pub fn column_factory(&self) -> Option<&Rc<dyn ColumnFactory>> {
        self.factory.as_ref()
    }

    /// Check this property declaration against its kind.
    fn validate(&self, type_name: &str) -> Result<(), SchemaError> {
        let mismatch = || SchemaError::DefaultMismatch {
            type_name: type_name.to_string(),
            property: self.name.clone(),
            kind: self.kind,
            default: self.default.clone(),
        };

        if self.shareable && !self.kind.supports_scratch() {
            return Err(SchemaError::NotShareable {
                type_name: type_name.to_string(),
                property: self.name.clone(),
                kind: self.kind,
            });
        }

        match self.kind {
            ValueKind::Bool
            | ValueKind::I8
            | ValueKind::U8
            | ValueKind::I16
            | ValueKind::I32
            | ValueKind::I64
            | ValueKind::F32
            | ValueKind::F64
            | ValueKind::Char => match &self.default {
                PropertyDefault::Literal(v) if ValueKind::from(v.kind()) == self.kind => Ok(()),
                _ => Err(mismatch()),
            },
            ValueKind::Enum { arity } => {
                if arity == 0 {
                    return Err(SchemaError::ZeroArity {
                        type_name: type_name.to_string(),
                        property: self.name.clone(),
                    });
                }
                match self.default {
                    PropertyDefault::Ordinal(ordinal) => {
                        if ordinal < 0 || ordinal as u32 >= arity {
                            Err(SchemaError::OrdinalOutOfRange {
                                type_name: type_name.to_string(),
                                property: self.name.clone(),
                                ordinal,
                                arity,
                            })
                        } else {
                            Ok(())
                        }
                    }
                    _ => Err(mismatch()),
                }
            }
            ValueKind::Object => match self.default {
                PropertyDefault::Null | PropertyDefault::Factory(_) => Ok(()),
                _ => Err(mismatch()),
            },
            ValueKind::ValueSet { .. } | ValueKind::ValueMap { .. } => match self.default {
                PropertyDefault::Empty => Ok(()),
                _ => Err(mismatch()),
            },
            ValueKind::ReferenceSet | ValueKind::ReferenceMap | ValueKind::ReferenceList => {
                match self.default {
                    PropertyDefault::Null | PropertyDefault::Empty => Ok(()),
                    _ => Err(mismatch()),
                }
            }
            ValueKind::Custom { .. } => {
                if self.factory.is_none() {
                    Err(SchemaError::MissingFactory {
                        type_name: type_name.to_string(),
                        property: self.name.clone(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl fmt::Debug for PropertyDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("clone_policy", &self.clone_policy)
            .field("shareable", &self.shareable)
            .finish()
    }
}

/// The static description of one component type.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    required: Vec<String>,
    properties: Vec<PropertyDef>,
}

impl Schema {
    /// Start a schema for the component type with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Add a property declaration.
    pub fn with(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare that components of this type require a component of the
    /// named type on the same entity. Missing required components are
    /// auto-attached and owned by the component that pulled them in.
    pub fn requires(mut self, type_name: impl Into<String>) -> Self {
        self.required.push(type_name.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    /// Validate the schema in isolation. Required-type resolution happens
    /// at registration, where the registry is available.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for (i, property) in self.properties.iter().enumerate() {
            if self.properties[..i].iter().any(|p| p.name == property.name) {
                return Err(SchemaError::DuplicateProperty {
                    type_name: self.name.clone(),
                    property: property.name.clone(),
                });
            }
            property.validate(&self.name)?;
        }
        Ok(())
    }
}
