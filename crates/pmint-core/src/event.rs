#![forbid(unsafe_code)]

//! Multicast change notifications.
//!
//! - [`PropertyChangedEvent`]: "property X of sender changed", where a `None`
//!   property name means "all properties changed".
//! - [`CollectionChangedEvent`]: add/remove/replace/move/reset notifications
//!   for observable collections.
//! - [`Subscription`]: RAII guard that unsubscribes on drop.
//!
//! # Architecture
//!
//! Handlers live in an `Rc`-shared list. A [`Subscription`] holds a `Weak`
//! back-reference to that list and removes its handler when dropped, so an
//! event that outlives its subscribers never calls into dead bindings, and a
//! subscription that outlives its event is a harmless no-op.
//!
//! # Invariants
//!
//! 1. Handlers are invoked in registration order.
//! 2. Dispatch iterates over a snapshot: handlers may subscribe, unsubscribe or
//!    raise further events re-entrantly without a `BorrowMutError`.
//! 3. A handler removed during a dispatch may still receive that dispatch;
//!    receivers are expected to tolerate stale deliveries.
//! 4. [`PropertyChangedEvent::set_property`] raises only when the stored value
//!    actually changed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::collection::CollectionChangedArgs;
use crate::object::ObjectId;

// ---------------------------------------------------------------------------
// Handler list
// ---------------------------------------------------------------------------

struct HandlerList<F: ?Sized> {
    next_id: Cell<u64>,
    slots: RefCell<Vec<(u64, Rc<F>)>>,
}

impl<F: ?Sized> HandlerList<F> {
    fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            slots: RefCell::new(Vec::new()),
        }
    }

    fn insert(&self, handler: Rc<F>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.slots.borrow_mut().push((id, handler));
        id
    }

    fn snapshot(&self) -> Vec<Rc<F>> {
        self.slots
            .borrow()
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect()
    }

    fn len(&self) -> usize {
        self.slots.borrow().len()
    }
}

trait Detach {
    fn detach(&self, id: u64);
}

impl<F: ?Sized> Detach for HandlerList<F> {
    fn detach(&self, id: u64) {
        self.slots.borrow_mut().retain(|(slot, _)| *slot != id);
    }
}

/// RAII guard for an event handler. Dropping it removes the handler.
#[must_use = "dropping a Subscription immediately removes the handler"]
pub struct Subscription {
    list: Weak<dyn Detach>,
    id: u64,
}

impl Subscription {
    fn new<F: ?Sized + 'static>(list: &Rc<HandlerList<F>>, id: u64) -> Self {
        let weak: Weak<HandlerList<F>> = Rc::downgrade(list);
        Self { list: weak, id }
    }

    /// Whether the event this subscription belongs to is still alive.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.list.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.detach(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Property change notification
// ---------------------------------------------------------------------------

type PropertyHandler = dyn Fn(ObjectId, Option<&str>);

/// Per-object "property changed" event.
///
/// # Example
///
/// ```
/// use std::cell::RefCell;
/// use pmint_core::event::PropertyChangedEvent;
/// use pmint_core::object::{Bindable, ObjectId};
///
/// struct Player {
///     name: RefCell<String>,
///     changed: PropertyChangedEvent,
/// }
///
/// impl Bindable for Player {
///     fn property_changed(&self) -> Option<&PropertyChangedEvent> {
///         Some(&self.changed)
///     }
/// }
///
/// impl Player {
///     fn set_name(&self, name: String) {
///         self.changed.set_property(ObjectId::of(self), &self.name, name, "name");
///     }
/// }
/// ```
pub struct PropertyChangedEvent {
    handlers: Rc<HandlerList<PropertyHandler>>,
}

impl PropertyChangedEvent {
    /// Create an event with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Rc::new(HandlerList::new()),
        }
    }

    /// Register `handler`; it stays registered until the returned guard drops.
    pub fn subscribe(&self, handler: impl Fn(ObjectId, Option<&str>) + 'static) -> Subscription {
        let id = self.handlers.insert(Rc::new(handler));
        Subscription::new(&self.handlers, id)
    }

    /// Notify every handler that `property` of `sender` changed.
    pub fn raise(&self, sender: ObjectId, property: Option<&str>) {
        for handler in self.handlers.snapshot() {
            handler(sender, property);
        }
    }

    /// Notify every handler that all properties of `sender` changed.
    pub fn notify_all(&self, sender: ObjectId) {
        self.raise(sender, None);
    }

    /// Store `value` in `slot` if it differs from the current value, then
    /// raise the event for `property`.
    ///
    /// Returns whether the value changed. The slot borrow is released before
    /// handlers run, so handlers may read the property re-entrantly.
    pub fn set_property<T: PartialEq>(
        &self,
        sender: ObjectId,
        slot: &RefCell<T>,
        value: T,
        property: &str,
    ) -> bool {
        {
            let mut current = slot.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.raise(sender, Some(property));
        true
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for PropertyChangedEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PropertyChangedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChangedEvent")
            .field("handler_count", &self.handler_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Collection change notification
// ---------------------------------------------------------------------------

type CollectionHandler = dyn Fn(&CollectionChangedArgs);

/// Per-collection "collection changed" event.
pub struct CollectionChangedEvent {
    handlers: Rc<HandlerList<CollectionHandler>>,
}

impl CollectionChangedEvent {
    /// Create an event with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: Rc::new(HandlerList::new()),
        }
    }

    /// Register `handler`; it stays registered until the returned guard drops.
    pub fn subscribe(&self, handler: impl Fn(&CollectionChangedArgs) + 'static) -> Subscription {
        let id = self.handlers.insert(Rc::new(handler));
        Subscription::new(&self.handlers, id)
    }

    /// Deliver `args` to every handler.
    pub fn raise(&self, args: &CollectionChangedArgs) {
        for handler in self.handlers.snapshot() {
            handler(args);
        }
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl Default for CollectionChangedEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CollectionChangedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionChangedEvent")
            .field("handler_count", &self.handler_count())
            .finish()
    }
}
