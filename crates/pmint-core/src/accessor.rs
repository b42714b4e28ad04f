#![forbid(unsafe_code)]

//! Property accessors resolved by `(type, property name)`.
//!
//! Bindable types declare their properties once through a [`TypeInfo`]
//! built with [`TypeInfo::builder`]. Bindings then resolve a property by name
//! through the [`AccessorCache`], which wraps the declared getter/setter in a
//! [`PropertyAccessor`] on first lookup and memoizes it for later lookups.
//!
//! # Invariants
//!
//! 1. Property names are validated when the `TypeInfo` is built: non-empty,
//!    no `.` (reserved for nested paths), unique within the type.
//! 2. An accessor is created at most once per `(TypeId, name)` until the type
//!    is re-registered, which drops its cached accessors.
//! 3. `set_value` never stores a value whose type the property does not
//!    accept; `Null` is replaced by the type's default value.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown type | Type never registered | `get_accessor` returns `None` |
//! | Unknown property | Typo | `get_accessor` returns `None` |
//! | Wrong instance | Accessor used on another type | `TypeMismatch` |
//! | Read-only | No setter declared | `ReadOnly` |

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::{AccessError, ConvertError};
use crate::object::Bindable;
use crate::value::{TypeKey, Value, ValueType};

type ErasedGetter = Rc<dyn Fn(&dyn Any) -> Option<Value>>;
type ErasedSetter = Rc<dyn Fn(&dyn Any, Value) -> Option<Result<(), ConvertError>>>;

/// Declaration of one property of a bindable type.
#[derive(Clone)]
pub struct PropertyDescriptor {
    name: &'static str,
    value_type: ValueType,
    getter: ErasedGetter,
    setter: Option<ErasedSetter>,
}

impl PropertyDescriptor {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("writable", &self.is_writable())
            .finish()
    }
}

/// The bindable surface of a type: its name and declared properties.
#[derive(Debug)]
pub struct TypeInfo {
    key: TypeKey,
    name: &'static str,
    properties: Vec<PropertyDescriptor>,
}

impl TypeInfo {
    /// Start declaring the properties of `T`.
    ///
    /// ```
    /// use std::cell::Cell;
    /// use pmint_core::accessor::TypeInfo;
    /// use pmint_core::object::Bindable;
    /// use pmint_core::value::{Value, ValueType};
    ///
    /// struct Counter { count: Cell<i64> }
    /// impl Bindable for Counter {}
    ///
    /// let info = TypeInfo::builder::<Counter>("Counter")
    ///     .property_rw(
    ///         "count",
    ///         ValueType::Int,
    ///         |c| Value::Int(c.count.get()),
    ///         |c, v| { c.count.set(v.try_into()?); Ok(()) },
    ///     )
    ///     .build()
    ///     .unwrap();
    /// assert!(info.property("count").is_some());
    /// ```
    #[must_use]
    pub fn builder<T: Bindable>(name: &'static str) -> TypeInfoBuilder<T> {
        TypeInfoBuilder {
            name,
            properties: Vec::new(),
            error: None,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a declared property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Declared properties, in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }
}

/// Builder returned by [`TypeInfo::builder`].
pub struct TypeInfoBuilder<T> {
    name: &'static str,
    properties: Vec<PropertyDescriptor>,
    error: Option<AccessError>,
    _marker: PhantomData<fn(&T)>,
}

impl<T: Bindable> TypeInfoBuilder<T> {
    /// Declare a read-only property.
    #[must_use]
    pub fn property(
        self,
        name: &'static str,
        value_type: ValueType,
        get: impl Fn(&T) -> Value + 'static,
    ) -> Self {
        self.declare(name, value_type, get, None)
    }

    /// Declare a read-write property.
    ///
    /// The setter receives a value already checked against `value_type`
    /// (with `Null` replaced by the type's default).
    #[must_use]
    pub fn property_rw(
        self,
        name: &'static str,
        value_type: ValueType,
        get: impl Fn(&T) -> Value + 'static,
        set: impl Fn(&T, Value) -> Result<(), ConvertError> + 'static,
    ) -> Self {
        let setter: ErasedSetter = Rc::new(move |any: &dyn Any, value| {
            any.downcast_ref::<T>().map(|obj| set(obj, value))
        });
        self.declare(name, value_type, get, Some(setter))
    }

    fn declare(
        mut self,
        name: &'static str,
        value_type: ValueType,
        get: impl Fn(&T) -> Value + 'static,
        setter: Option<ErasedSetter>,
    ) -> Self {
        if self.error.is_some() {
            return self;
        }
        if name.is_empty() || name.contains('.') {
            self.error = Some(AccessError::InvalidName(name.to_owned()));
            return self;
        }
        if self.properties.iter().any(|p| p.name == name) {
            self.error = Some(AccessError::DuplicateProperty {
                type_name: self.name,
                property: name,
            });
            return self;
        }
        let getter: ErasedGetter =
            Rc::new(move |any: &dyn Any| any.downcast_ref::<T>().map(&get));
        self.properties.push(PropertyDescriptor {
            name,
            value_type,
            getter,
            setter,
        });
        self
    }

    /// Finish the declaration, reporting the first invalid property.
    pub fn build(self) -> Result<TypeInfo, AccessError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(TypeInfo {
            key: TypeKey::from_parts(TypeId::of::<T>(), self.name),
            name: self.name,
            properties: self.properties,
        })
    }
}

/// Resolved, type-erased access to one property.
pub struct PropertyAccessor {
    owner: &'static str,
    descriptor: PropertyDescriptor,
}

impl PropertyAccessor {
    fn new(owner: &'static str, descriptor: PropertyDescriptor) -> Self {
        Self { owner, descriptor }
    }

    /// Name of the declaring type.
    #[must_use]
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    #[must_use]
    pub fn value_type(&self) -> ValueType {
        self.descriptor.value_type
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.descriptor.is_writable()
    }

    /// Read the property from `instance`.
    pub fn get_value(&self, instance: &dyn Bindable) -> Result<Value, AccessError> {
        (self.descriptor.getter)(instance.as_any()).ok_or_else(|| self.mismatch(instance))
    }

    /// Write `value` to the property of `instance`.
    pub fn set_value(&self, instance: &dyn Bindable, value: Value) -> Result<(), AccessError> {
        let Some(setter) = &self.descriptor.setter else {
            return Err(AccessError::ReadOnly {
                type_name: self.owner,
                property: self.descriptor.name,
            });
        };
        let value = if value.is_null() {
            self.descriptor.value_type.default_value()
        } else {
            value
        };
        if !self.descriptor.value_type.accepts(&value) {
            return Err(AccessError::TypeMismatch {
                property: self.qualified_name(),
                expected: self.descriptor.value_type.to_string(),
                found: value.kind_name(),
            });
        }
        match setter(instance.as_any(), value) {
            Some(Ok(())) => Ok(()),
            Some(Err(err)) => Err(AccessError::SetterFailed {
                property: self.qualified_name(),
                reason: err.to_string(),
            }),
            None => Err(self.mismatch(instance)),
        }
    }

    /// Write the declared type's default value.
    pub fn reset_value(&self, instance: &dyn Bindable) -> Result<(), AccessError> {
        self.set_value(instance, Value::Null)
    }

    /// `Owner.property`, for diagnostics.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.owner, self.descriptor.name)
    }

    fn mismatch(&self, instance: &dyn Bindable) -> AccessError {
        AccessError::TypeMismatch {
            property: self.qualified_name(),
            expected: self.owner.to_owned(),
            found: instance.type_name().to_owned(),
        }
    }
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyAccessor")
            .field("property", &self.qualified_name())
            .field("value_type", &self.value_type())
            .field("writable", &self.can_write())
            .finish()
    }
}

/// Registry of [`TypeInfo`]s plus the memoized accessors built from them.
#[derive(Default)]
pub struct AccessorCache {
    types: RefCell<AHashMap<TypeId, Rc<TypeInfo>>>,
    accessors: RefCell<AHashMap<TypeId, AHashMap<Box<str>, Rc<PropertyAccessor>>>>,
}

impl AccessorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the bindable surface of a type.
    ///
    /// Returns `true` when an earlier registration was replaced.
    pub fn register(&self, info: TypeInfo) -> bool {
        let id = info.key().id();
        let name = info.name();
        self.accessors.borrow_mut().remove(&id);
        let replaced = self
            .types
            .borrow_mut()
            .insert(id, Rc::new(info))
            .is_some();
        tracing::debug!(type_name = name, replaced, "registered bindable type");
        replaced
    }

    /// Registered info for a type.
    #[must_use]
    pub fn type_info(&self, type_id: TypeId) -> Option<Rc<TypeInfo>> {
        self.types.borrow().get(&type_id).cloned()
    }

    /// Whether the type is registered.
    #[must_use]
    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.types.borrow().contains_key(&type_id)
    }

    /// Resolve `(type, property)` to an accessor, memoizing the result.
    ///
    /// Returns `None` when the type is unregistered or lacks the property.
    #[must_use]
    pub fn get_accessor(&self, type_id: TypeId, property: &str) -> Option<Rc<PropertyAccessor>> {
        if let Some(hit) = self
            .accessors
            .borrow()
            .get(&type_id)
            .and_then(|per_type| per_type.get(property))
        {
            return Some(Rc::clone(hit));
        }

        let info = self.type_info(type_id)?;
        let descriptor = info.property(property)?.clone();
        let accessor = Rc::new(PropertyAccessor::new(info.name(), descriptor));
        self.accessors
            .borrow_mut()
            .entry(type_id)
            .or_default()
            .insert(property.into(), Rc::clone(&accessor));
        Some(accessor)
    }

    /// Resolve a property of a live object, with a descriptive error.
    pub fn accessor_for(
        &self,
        instance: &dyn Bindable,
        property: &str,
    ) -> Result<Rc<PropertyAccessor>, AccessError> {
        let type_id = instance.as_any().type_id();
        if let Some(accessor) = self.get_accessor(type_id, property) {
            return Ok(accessor);
        }
        match self.type_info(type_id) {
            Some(info) => Err(AccessError::UnknownProperty {
                type_name: info.name().to_owned(),
                property: property.to_owned(),
            }),
            None => Err(AccessError::UnknownType(instance.type_name().to_owned())),
        }
    }

    /// Number of memoized accessors.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.accessors.borrow().values().map(|props| props.len()).sum()
    }
}

impl fmt::Debug for AccessorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessorCache")
            .field("types", &self.types.borrow().len())
            .field("cached", &self.cached_len())
            .finish()
    }
}
