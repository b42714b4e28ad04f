#![forbid(unsafe_code)]

//! Resolving the collection a collection binder follows.

use std::rc::Rc;

use pmint_core::{
    ItemsRef, ObjectId, ObjectRef, PropertyAccessor, Subscription, Value, ValueType, same_items,
};

use crate::binding::{ResolvedPath, resolve_path};
use crate::engine::Engine;
use crate::error::BindingError;

/// The owner of a collection property and the collection it currently holds.
pub(crate) struct ItemsSlot {
    pub(crate) owner: ObjectRef,
    pub(crate) accessor: Rc<PropertyAccessor>,
    pub(crate) items: Option<ItemsRef>,
    pub(crate) owner_sub: Option<Subscription>,
    pub(crate) items_sub: Option<Subscription>,
}

impl ItemsSlot {
    /// Walk `path` from `root` and read the collection at its end.
    pub(crate) fn resolve(
        engine: &Engine,
        root: &ObjectRef,
        path: &str,
    ) -> Result<Self, BindingError> {
        let ResolvedPath { source, property } = resolve_path(engine, root, path)?;
        let accessor = engine.accessor_for(&*source, property)?;
        let value_type = accessor.value_type();
        if !matches!(value_type, ValueType::Collection | ValueType::Any) {
            return Err(BindingError::NotACollection {
                path: path.to_owned(),
                found: value_type.to_string(),
            });
        }
        let items = read_items(&accessor, &source, path)?;
        Ok(Self {
            owner: source,
            accessor,
            items,
            owner_sub: None,
            items_sub: None,
        })
    }

    pub(crate) fn owner_id(&self) -> ObjectId {
        ObjectId::of(&*self.owner)
    }

    /// Re-read the collection; `Ok(None)` when it is still the same one.
    pub(crate) fn refresh(&self, path: &str) -> Result<Option<Option<ItemsRef>>, BindingError> {
        let items = read_items(&self.accessor, &self.owner, path)?;
        let unchanged = match (&self.items, &items) {
            (None, None) => true,
            (Some(a), Some(b)) => same_items(a, b),
            _ => false,
        };
        Ok((!unchanged).then_some(items))
    }
}

/// Read a collection-valued property. `Null` means "no collection".
pub(crate) fn read_items(
    accessor: &PropertyAccessor,
    owner: &ObjectRef,
    path: &str,
) -> Result<Option<ItemsRef>, BindingError> {
    match accessor.get_value(&**owner)? {
        Value::Collection(items) => Ok(Some(items)),
        Value::Null => Ok(None),
        other => Err(BindingError::NotACollection {
            path: path.to_owned(),
            found: other.kind_name(),
        }),
    }
}
