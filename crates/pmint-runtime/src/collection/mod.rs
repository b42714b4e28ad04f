#![forbid(unsafe_code)]

//! Full-sync collection binding: one view per distinct item.
//!
//! A [`CollectionBinding`] follows a collection-valued property and keeps a
//! view for every distinct item in it. Each view's [`DataContext`] is pointed
//! at its item, so the view's own bindings display the item.
//!
//! # Invariants
//!
//! 1. Exactly one view exists per distinct item; an item present `n` times
//!    holds a count of `n`, and its view is released when the count reaches
//!    zero.
//! 2. After any change, sibling indices follow the first occurrence of each
//!    item in collection order.
//! 3. Replacing the collection object (or setting it to null) releases every
//!    view before the new collection is materialized.
//! 4. The factory is never borrowed while a binding borrow is held.
//!
//! [`DataContext`]: crate::DataContext

mod source;
mod table;

pub(crate) use source::ItemsSlot;
pub(crate) use table::{Entry, ViewTable};

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use tracing::{debug, debug_span, error, warn};

use pmint_core::{
    CollectionChangedAction, CollectionChangedArgs, ItemsRef, ObjectId, ObjectRef, Subscription,
};

use crate::binding::Binder;
use crate::engine::Engine;
use crate::error::BindingError;
use crate::view::{FactoryRef, ViewHandle};

/// Binds a collection property to one host view per item.
pub struct CollectionBinding {
    engine: Rc<Engine>,
    source_path: String,
    factory: FactoryRef,
    state: RefCell<Option<ItemsSlot>>,
    table: RefCell<ViewTable>,
    this: Weak<CollectionBinding>,
}

impl CollectionBinding {
    /// Create an unbound binding that materializes views through `factory`.
    #[must_use]
    pub fn new(engine: &Rc<Engine>, source_path: impl Into<String>, factory: FactoryRef) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            engine: Rc::clone(engine),
            source_path: source_path.into(),
            factory,
            state: RefCell::new(None),
            table: RefCell::new(ViewTable::default()),
            this: Weak::clone(this),
        })
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// The collection currently followed.
    #[must_use]
    pub fn items_source(&self) -> Option<ItemsRef> {
        self.state.borrow().as_ref().and_then(|s| s.items.clone())
    }

    /// Number of live views.
    #[must_use]
    pub fn view_count(&self) -> usize {
        self.table.borrow().len()
    }

    /// The view showing `item`.
    #[must_use]
    pub fn view_for(&self, item: &ObjectRef) -> Option<ViewHandle> {
        self.table.borrow().view(ObjectId::of(&**item))
    }

    /// How many times `item` is currently counted.
    #[must_use]
    pub fn ref_count(&self, item: &ObjectRef) -> usize {
        self.table.borrow().ref_count(ObjectId::of(&**item))
    }

    /// Materialize `items`: new items get a view, known items gain a count.
    pub fn add_items(&self, items: &[ObjectRef]) {
        for item in items {
            let id = ObjectId::of(&**item);
            if self.table.borrow().contains(id) {
                self.table.borrow_mut().retain(id);
                continue;
            }
            let Some(view) = create_view(&self.factory, item) else {
                continue;
            };
            self.table.borrow_mut().insert(Rc::clone(item), Rc::clone(&view));
            attach_view(&view, item);
        }
    }

    /// Drop one occurrence of each of `items`, releasing views whose last
    /// occurrence went.
    pub fn remove_items(&self, items: &[ObjectRef]) {
        for item in items {
            let released = self.table.borrow_mut().release(ObjectId::of(&**item));
            if let Some(entry) = released {
                release_view(&self.factory, entry);
            }
        }
    }

    /// Release every view.
    pub fn clear_items(&self) {
        let entries = self.table.borrow_mut().drain();
        for entry in entries {
            release_view(&self.factory, entry);
        }
    }

    /// Re-apply sibling indices from the collection order.
    pub fn reset_view_order(&self) {
        let Some(items) = self.items_source() else {
            return;
        };
        let mut placed = AHashSet::new();
        let mut index = 0;
        for item in items.snapshot() {
            let id = ObjectId::of(&*item);
            if !placed.insert(id) {
                continue;
            }
            let view = self.table.borrow().view(id);
            if let Some(view) = view {
                view.set_sibling_index(index);
                index += 1;
            }
        }
    }

    fn subscribe_items(&self, items: &ItemsRef) -> Option<Subscription> {
        let event = items.collection_changed()?;
        let this = Weak::clone(&self.this);
        Some(event.subscribe(move |args| {
            if let Some(this) = this.upgrade() {
                this.handle_collection_changed(args);
            }
        }))
    }

    fn handle_collection_changed(&self, args: &CollectionChangedArgs) {
        let _span = debug_span!("collection_changed", action = ?args.action).entered();
        match args.action {
            CollectionChangedAction::Add => {
                self.add_items(&args.new_items);
                let len = self.items_source().map_or(0, |items| items.len());
                let appended = args
                    .new_index
                    .is_none_or(|index| index + args.new_items.len() >= len);
                if !appended {
                    self.reset_view_order();
                }
            }
            CollectionChangedAction::Remove => {
                self.remove_items(&args.old_items);
                // A surviving duplicate may now first occur further down.
                let survived = args
                    .old_items
                    .iter()
                    .any(|item| self.view_for(item).is_some());
                if survived {
                    self.reset_view_order();
                }
            }
            CollectionChangedAction::Replace => {
                self.remove_items(&args.old_items);
                self.add_items(&args.new_items);
                self.reset_view_order();
            }
            CollectionChangedAction::Move => self.reset_view_order(),
            CollectionChangedAction::Reset => {
                self.clear_items();
                self.populate();
            }
            action => panic!("unsupported collection change action {action:?}"),
        }
        update_factory(&self.factory);
    }

    fn populate(&self) {
        if let Some(items) = self.items_source() {
            self.add_items(&items.snapshot());
            self.reset_view_order();
        }
    }

    fn swap_items(&self, items: Option<ItemsRef>) {
        let old_sub = {
            let mut state = self.state.borrow_mut();
            let Some(slot) = state.as_mut() else {
                return;
            };
            slot.items = items.clone();
            slot.items_sub.take()
        };
        drop(old_sub);
        debug!(source_path = %self.source_path, present = items.is_some(), "collection replaced");

        self.clear_items();
        if let Some(items) = &items {
            let sub = self.subscribe_items(items);
            if let Some(slot) = self.state.borrow_mut().as_mut() {
                slot.items_sub = sub;
            }
            self.populate();
        }
        update_factory(&self.factory);
    }
}

impl Binder for CollectionBinding {
    fn bind(&self, source: &ObjectRef) -> Result<(), BindingError> {
        if self.is_bound() {
            error!(source_path = %self.source_path, "collection binding is already bound");
            return Err(BindingError::AlreadyBound);
        }
        let mut slot = ItemsSlot::resolve(&self.engine, source, &self.source_path)
            .inspect_err(|err| {
                error!(source_path = %self.source_path, %err, "failed to bind collection");
            })?;

        slot.owner_sub = slot.owner.property_changed().map(|event| {
            let this = Weak::clone(&self.this);
            event.subscribe(move |sender, property| {
                if let Some(this) = this.upgrade() {
                    this.handle_source_property_changed(sender, property);
                }
            })
        });
        slot.items_sub = slot.items.as_ref().and_then(|items| self.subscribe_items(items));
        let count = slot.items.as_ref().map_or(0, |items| items.len());
        *self.state.borrow_mut() = Some(slot);
        debug!(source_path = %self.source_path, count, "collection binding bound");

        self.populate();
        update_factory(&self.factory);
        Ok(())
    }

    fn unbind(&self) {
        let Some(slot) = self.state.borrow_mut().take() else {
            return;
        };
        drop(slot);
        self.clear_items();
        update_factory(&self.factory);
        debug!(source_path = %self.source_path, "collection binding unbound");
    }

    fn is_bound(&self) -> bool {
        self.state.borrow().is_some()
    }

    fn source(&self) -> Option<ObjectRef> {
        self.state.borrow().as_ref().map(|s| Rc::clone(&s.owner))
    }

    fn handle_source_property_changed(&self, sender: ObjectId, property: Option<&str>) {
        let refreshed = {
            let state = self.state.borrow();
            let Some(slot) = state.as_ref() else {
                return;
            };
            if sender != slot.owner_id() {
                if self.engine.config().warn_on_foreign_sender {
                    warn!(?sender, source_path = %self.source_path, "ignoring change from unexpected sender");
                }
                return;
            }
            if property.is_some_and(|p| p != slot.accessor.name()) {
                return;
            }
            slot.refresh(&self.source_path)
        };
        match refreshed {
            Ok(Some(items)) => self.swap_items(items),
            Ok(None) => {}
            Err(err) => warn!(source_path = %self.source_path, %err, "failed to read collection"),
        }
    }

    fn item_view(&self, item: &ObjectRef) -> Option<ViewHandle> {
        self.view_for(item)
    }
}

impl fmt::Debug for CollectionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionBinding")
            .field("source_path", &self.source_path)
            .field("bound", &self.is_bound())
            .field("views", &self.view_count())
            .finish()
    }
}

pub(crate) fn create_view(factory: &FactoryRef, item: &ObjectRef) -> Option<ViewHandle> {
    let Ok(mut factory) = factory.try_borrow_mut() else {
        error!("view factory re-entered while creating a view");
        return None;
    };
    let view = factory.create_item_view(item);
    if view.is_none() {
        warn!(item = ?ObjectId::of(&**item), "view factory returned no view");
    }
    view
}

pub(crate) fn attach_view(view: &ViewHandle, item: &ObjectRef) {
    match view.data_context() {
        Some(context) => context.set_source(Some(Rc::clone(item))),
        None => debug!(item = ?ObjectId::of(&**item), "item view has no data context"),
    }
    debug!(item = ?ObjectId::of(&**item), "item view created");
}

pub(crate) fn release_view(factory: &FactoryRef, entry: Entry) {
    if let Some(context) = entry.view.data_context() {
        context.set_source(None);
    }
    debug!(item = ?ObjectId::of(&*entry.item), "item view released");
    match factory.try_borrow_mut() {
        Ok(mut factory) => factory.release_item_view(entry.view),
        Err(_) => error!("view factory re-entered while releasing a view"),
    }
}

pub(crate) fn update_factory(factory: &FactoryRef) {
    match factory.try_borrow_mut() {
        Ok(mut factory) => factory.update_view(),
        Err(_) => error!("view factory re-entered while updating"),
    }
}
