#![forbid(unsafe_code)]

//! Observable collections.
//!
//! [`ObservableList`] is the stock implementation of the observable-collection
//! capability: an ordered list of bindables that raises a
//! [`CollectionChangedEvent`] after every mutation.
//!
//! # Invariants
//!
//! 1. The event is raised after the mutation is applied and after the list
//!    borrow is released, so handlers may read the list.
//! 2. Every mutation raises exactly one event; no-op mutations (removing a
//!    missing item, moving to the same index) raise nothing.
//! 3. `clear()` is the only producer of [`CollectionChangedAction::Reset`].

use std::cell::RefCell;
use std::fmt;

use crate::event::CollectionChangedEvent;
use crate::object::{ItemsSource, ObjectId, ObjectRef, same_object};

/// Kind of collection mutation.
///
/// Non-exhaustive: consumers must treat unknown actions as a broken
/// collection contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CollectionChangedAction {
    Add,
    Remove,
    Replace,
    Move,
    Reset,
}

/// Payload of a collection change notification.
#[derive(Clone)]
pub struct CollectionChangedArgs {
    pub action: CollectionChangedAction,
    /// Items that entered the collection (Add, Replace, Move).
    pub new_items: Vec<ObjectRef>,
    /// Items that left the collection (Remove, Replace, Move).
    pub old_items: Vec<ObjectRef>,
    pub new_index: Option<usize>,
    pub old_index: Option<usize>,
}

impl CollectionChangedArgs {
    /// Items inserted starting at `index`.
    #[must_use]
    pub fn added(items: Vec<ObjectRef>, index: usize) -> Self {
        Self {
            action: CollectionChangedAction::Add,
            new_items: items,
            old_items: Vec::new(),
            new_index: Some(index),
            old_index: None,
        }
    }

    /// Items removed starting at `index`.
    #[must_use]
    pub fn removed(items: Vec<ObjectRef>, index: usize) -> Self {
        Self {
            action: CollectionChangedAction::Remove,
            new_items: Vec::new(),
            old_items: items,
            new_index: None,
            old_index: Some(index),
        }
    }

    /// `old` replaced by `new` at `index`.
    #[must_use]
    pub fn replaced(old: ObjectRef, new: ObjectRef, index: usize) -> Self {
        Self {
            action: CollectionChangedAction::Replace,
            new_items: vec![new],
            old_items: vec![old],
            new_index: Some(index),
            old_index: Some(index),
        }
    }

    /// `item` moved from `old_index` to `new_index`.
    #[must_use]
    pub fn moved(item: ObjectRef, old_index: usize, new_index: usize) -> Self {
        Self {
            action: CollectionChangedAction::Move,
            new_items: vec![item.clone()],
            old_items: vec![item],
            new_index: Some(new_index),
            old_index: Some(old_index),
        }
    }

    /// The collection changed dramatically; its contents must be re-read.
    #[must_use]
    pub fn reset() -> Self {
        Self {
            action: CollectionChangedAction::Reset,
            new_items: Vec::new(),
            old_items: Vec::new(),
            new_index: None,
            old_index: None,
        }
    }
}

impl fmt::Debug for CollectionChangedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionChangedArgs")
            .field("action", &self.action)
            .field("new_items", &self.new_items.len())
            .field("old_items", &self.old_items.len())
            .field("new_index", &self.new_index)
            .field("old_index", &self.old_index)
            .finish()
    }
}

/// Ordered list of bindables with change notifications.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use pmint_core::collection::ObservableList;
/// use pmint_core::object::{Bindable, ItemsSource, ObjectRef};
///
/// struct Row;
/// impl Bindable for Row {}
///
/// let list = ObservableList::new();
/// list.push(Rc::new(Row));
/// list.push(Rc::new(Row));
/// assert_eq!(list.len(), 2);
/// ```
#[derive(Default)]
pub struct ObservableList {
    items: RefCell<Vec<ObjectRef>>,
    changed: CollectionChangedEvent,
}

impl ObservableList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list holding `items`.
    #[must_use]
    pub fn from_items(items: Vec<ObjectRef>) -> Self {
        Self {
            items: RefCell::new(items),
            changed: CollectionChangedEvent::new(),
        }
    }

    /// Append `item`.
    pub fn push(&self, item: ObjectRef) {
        let index = {
            let mut items = self.items.borrow_mut();
            items.push(item.clone());
            items.len() - 1
        };
        self.changed.raise(&CollectionChangedArgs::added(vec![item], index));
    }

    /// Append every item in order, raising a single Add.
    pub fn extend(&self, new_items: impl IntoIterator<Item = ObjectRef>) {
        let new_items: Vec<ObjectRef> = new_items.into_iter().collect();
        if new_items.is_empty() {
            return;
        }
        let index = {
            let mut items = self.items.borrow_mut();
            let index = items.len();
            items.extend(new_items.iter().cloned());
            index
        };
        self.changed
            .raise(&CollectionChangedArgs::added(new_items, index));
    }

    /// Insert `item` at `index` (clamped to the length).
    pub fn insert(&self, index: usize, item: ObjectRef) {
        let index = {
            let mut items = self.items.borrow_mut();
            let index = index.min(items.len());
            items.insert(index, item.clone());
            index
        };
        self.changed.raise(&CollectionChangedArgs::added(vec![item], index));
    }

    /// Remove the first occurrence of `item`. Returns whether it was present.
    pub fn remove(&self, item: &ObjectRef) -> bool {
        let index = self.index_of(item);
        match index {
            Some(index) => self.remove_at(index).is_some(),
            None => false,
        }
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&self, index: usize) -> Option<ObjectRef> {
        let removed = {
            let mut items = self.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        }?;
        self.changed
            .raise(&CollectionChangedArgs::removed(vec![removed.clone()], index));
        Some(removed)
    }

    /// Replace the item at `index`, returning the old one.
    pub fn set(&self, index: usize, item: ObjectRef) -> Option<ObjectRef> {
        let old = {
            let mut items = self.items.borrow_mut();
            let slot = items.get_mut(index)?;
            std::mem::replace(slot, item.clone())
        };
        self.changed
            .raise(&CollectionChangedArgs::replaced(old.clone(), item, index));
        Some(old)
    }

    /// Move the item at `from` so that it ends up at index `to`.
    pub fn move_item(&self, from: usize, to: usize) -> bool {
        let item = {
            let mut items = self.items.borrow_mut();
            if from >= items.len() || to >= items.len() || from == to {
                return false;
            }
            let item = items.remove(from);
            items.insert(to, item.clone());
            item
        };
        self.changed
            .raise(&CollectionChangedArgs::moved(item, from, to));
        true
    }

    /// Remove every item, raising Reset.
    pub fn clear(&self) {
        let was_empty = {
            let mut items = self.items.borrow_mut();
            let was_empty = items.is_empty();
            items.clear();
            was_empty
        };
        if !was_empty {
            self.changed.raise(&CollectionChangedArgs::reset());
        }
    }

    /// Index of the first occurrence of `item`.
    #[must_use]
    pub fn index_of(&self, item: &ObjectRef) -> Option<usize> {
        self.items
            .borrow()
            .iter()
            .position(|candidate| same_object(candidate, item))
    }

    /// Whether `item` is in the list.
    #[must_use]
    pub fn contains(&self, item: &ObjectRef) -> bool {
        self.index_of(item).is_some()
    }

    /// The change event, for direct subscription.
    #[must_use]
    pub fn changed(&self) -> &CollectionChangedEvent {
        &self.changed
    }
}

impl ItemsSource for ObservableList {
    fn len(&self) -> usize {
        self.items.borrow().len()
    }

    fn item(&self, index: usize) -> Option<ObjectRef> {
        self.items.borrow().get(index).cloned()
    }

    fn snapshot(&self) -> Vec<ObjectRef> {
        self.items.borrow().clone()
    }

    fn collection_changed(&self) -> Option<&CollectionChangedEvent> {
        Some(&self.changed)
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("id", &ObjectId::of_items(self))
            .field("len", &self.len())
            .field("changed", &self.changed)
            .finish()
    }
}
