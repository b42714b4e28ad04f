#![forbid(unsafe_code)]

//! Capabilities required of bindable objects and bound collections.
//!
//! A *bindable* is any shared object whose properties are described by a
//! registered [`TypeInfo`](crate::accessor::TypeInfo). It optionally exposes a
//! [`PropertyChangedEvent`]; objects without one can still be bound, but only
//! the initial value is pushed.
//!
//! An *items source* is an indexable list of bindables that optionally exposes
//! a [`CollectionChangedEvent`].
//!
//! Identity matters throughout the engine (registries, item→view tables,
//! stale-sender checks), so both kinds of objects are identified by
//! [`ObjectId`], the address of the shared allocation.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::event::{CollectionChangedEvent, PropertyChangedEvent};

/// A shared object that can act as a binding source or target.
pub trait Bindable: Any {
    /// Change notifications raised by this object, if it raises any.
    fn property_changed(&self) -> Option<&PropertyChangedEvent> {
        None
    }

    /// Type name used in diagnostics and by the `ToString` conversion.
    fn type_name(&self) -> &'static str {
        crate::value::short_type_name(std::any::type_name::<Self>())
    }
}

impl dyn Bindable {
    /// View the object as [`Any`] for downcasting.
    #[inline]
    #[must_use]
    pub fn as_any(&self) -> &dyn Any {
        self
    }

    /// Borrow the concrete object.
    #[must_use]
    pub fn downcast_ref<T: Bindable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Shared handle to a bindable object.
pub type ObjectRef = Rc<dyn Bindable>;

/// An indexable list of bindable items.
pub trait ItemsSource: Any {
    /// Number of items.
    fn len(&self) -> usize;

    /// Item at `index`, if in range.
    fn item(&self, index: usize) -> Option<ObjectRef>;

    /// Whether the list has no items.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current items, in order.
    fn snapshot(&self) -> Vec<ObjectRef> {
        (0..self.len()).filter_map(|i| self.item(i)).collect()
    }

    /// Change notifications raised by this collection, if it raises any.
    fn collection_changed(&self) -> Option<&CollectionChangedEvent> {
        None
    }

    /// Type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        crate::value::short_type_name(std::any::type_name::<Self>())
    }
}

/// Shared handle to a collection.
pub type ItemsRef = Rc<dyn ItemsSource>;

/// A plain vector is an enumerable without change notifications.
impl ItemsSource for Vec<ObjectRef> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&self, index: usize) -> Option<ObjectRef> {
        self.get(index).cloned()
    }
}

/// Identity of a shared object: the address of its allocation.
///
/// Only meaningful while the object is alive; every table keyed by `ObjectId`
/// also holds a strong reference to the object, so ids cannot be reused
/// underneath it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of a bindable. Inside an implementation, use `ObjectId::of(self)`.
    #[inline]
    #[must_use]
    pub fn of(obj: &dyn Bindable) -> Self {
        Self(std::ptr::from_ref(obj).cast::<()>() as usize)
    }

    /// Identity of a collection.
    #[inline]
    #[must_use]
    pub fn of_items(items: &dyn ItemsSource) -> Self {
        Self(std::ptr::from_ref(items).cast::<()>() as usize)
    }

    /// Raw address value.
    #[inline]
    #[must_use]
    pub const fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Whether two handles refer to the same object.
#[inline]
#[must_use]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    ObjectId::of(&**a) == ObjectId::of(&**b)
}

/// Whether two handles refer to the same collection.
#[inline]
#[must_use]
pub fn same_items(a: &ItemsRef, b: &ItemsRef) -> bool {
    ObjectId::of_items(&**a) == ObjectId::of_items(&**b)
}
