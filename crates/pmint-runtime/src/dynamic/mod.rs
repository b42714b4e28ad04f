#![forbid(unsafe_code)]

//! Windowed ("virtualized") list binding.
//!
//! A [`ListDynamicBinding`] materializes only the items its
//! [`DynamicController`] selects. Every sync computes the desired item list
//! and reconciles it against the live views:
//!
//! 1. views for items that left the window are released;
//! 2. views for items that entered it are created;
//! 3. sibling indices are reapplied in window order.
//!
//! Items that stay in the window keep their views. Any collection change
//! triggers a full sync; the window is cheap to recompute, and a local patch
//! would have to second-guess the controller.
//!
//! Items are tracked as a set: an item listed twice in the window has one
//! view, placed at its first position.

mod controller;

pub use controller::{ControllerArgs, DynamicBindingAccessor, DynamicController, ScrollWindow};

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use tracing::{debug, debug_span, error, warn};

use pmint_core::{CollectionChangedArgs, ItemsRef, ObjectId, ObjectRef, Subscription};

use crate::binding::Binder;
use crate::collection::{ItemsSlot, ViewTable, attach_view, create_view, release_view, update_factory};
use crate::engine::Engine;
use crate::error::BindingError;
use crate::view::{FactoryRef, ViewHandle};

/// Shared handle to a controller.
pub type ControllerRef = Rc<RefCell<dyn DynamicController>>;

/// Views created and released by one reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub released: usize,
}

/// Binds a collection property to views for a controller-chosen window.
pub struct ListDynamicBinding {
    engine: Rc<Engine>,
    source_path: String,
    factory: FactoryRef,
    controller: ControllerRef,
    args: ControllerArgs,
    state: RefCell<Option<ItemsSlot>>,
    table: RefCell<ViewTable>,
    this: Weak<ListDynamicBinding>,
}

impl ListDynamicBinding {
    #[must_use]
    pub fn new(
        engine: &Rc<Engine>,
        source_path: impl Into<String>,
        factory: FactoryRef,
        controller: ControllerRef,
    ) -> Rc<Self> {
        Self::with_args(engine, source_path, factory, controller, ControllerArgs::new())
    }

    /// Like [`ListDynamicBinding::new`], passing `args` to the controller on
    /// every bind.
    #[must_use]
    pub fn with_args(
        engine: &Rc<Engine>,
        source_path: impl Into<String>,
        factory: FactoryRef,
        controller: ControllerRef,
        args: ControllerArgs,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            engine: Rc::clone(engine),
            source_path: source_path.into(),
            factory,
            controller,
            args,
            state: RefCell::new(None),
            table: RefCell::new(ViewTable::default()),
            this: Weak::clone(this),
        })
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    /// The view materialized for `item`.
    #[must_use]
    pub fn view_for(&self, item: &ObjectRef) -> Option<ViewHandle> {
        self.table.borrow().view(ObjectId::of(&**item))
    }

    /// Recompute the window and reconcile views with it.
    pub fn sync(&self) -> SyncStats {
        let Some(items) = self.items_source() else {
            let stats = self.release_all();
            update_factory(&self.factory);
            return stats;
        };
        let _span = debug_span!("dynamic_sync", source_path = %self.source_path, len = items.len())
            .entered();

        let desired = match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.get_dynamic_items(&*items),
            Err(_) => {
                error!("dynamic controller re-entered during sync");
                return SyncStats::default();
            }
        };
        let stats = self.sync_list_to_dictionary(&desired);
        self.sync_view_order(&desired);

        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.update_view(self),
            Err(_) => error!("dynamic controller re-entered during update"),
        }
        update_factory(&self.factory);
        debug!(created = stats.created, released = stats.released, "dynamic sync finished");
        stats
    }

    /// Make the set of live views equal the set of `desired` items.
    pub fn sync_list_to_dictionary(&self, desired: &[ObjectRef]) -> SyncStats {
        let wanted: AHashSet<ObjectId> = desired.iter().map(|item| ObjectId::of(&**item)).collect();
        let leaving: Vec<ObjectId> = self
            .table
            .borrow()
            .ids()
            .filter(|id| !wanted.contains(id))
            .collect();

        let mut stats = SyncStats::default();
        for id in leaving {
            let released = self.table.borrow_mut().release(id);
            if let Some(entry) = released {
                release_view(&self.factory, entry);
                stats.released += 1;
            }
        }

        for item in desired {
            if self.table.borrow().contains(ObjectId::of(&**item)) {
                continue;
            }
            let Some(view) = create_view(&self.factory, item) else {
                continue;
            };
            self.table.borrow_mut().insert(Rc::clone(item), Rc::clone(&view));
            attach_view(&view, item);
            stats.created += 1;
        }
        stats
    }

    /// Apply sibling indices following `desired`.
    pub fn sync_view_order(&self, desired: &[ObjectRef]) {
        let mut placed = AHashSet::new();
        let mut index = 0;
        for item in desired {
            let id = ObjectId::of(&**item);
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

    fn release_all(&self) -> SyncStats {
        let entries = self.table.borrow_mut().drain();
        let released = entries.len();
        for entry in entries {
            release_view(&self.factory, entry);
        }
        SyncStats {
            created: 0,
            released,
        }
    }

    fn subscribe_items(&self, items: &ItemsRef) -> Option<Subscription> {
        let event = items.collection_changed()?;
        let this = Weak::clone(&self.this);
        Some(event.subscribe(move |args: &CollectionChangedArgs| {
            if let Some(this) = this.upgrade() {
                debug!(action = ?args.action, "collection changed; resyncing window");
                this.sync();
            }
        }))
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
        self.release_all();
        if let Some(items) = &items {
            let sub = self.subscribe_items(items);
            if let Some(slot) = self.state.borrow_mut().as_mut() {
                slot.items_sub = sub;
            }
        }
        self.sync();
    }
}

impl DynamicBindingAccessor for ListDynamicBinding {
    fn items_source(&self) -> Option<ItemsRef> {
        self.state.borrow().as_ref().and_then(|s| s.items.clone())
    }

    fn item_view(&self, item: &ObjectRef) -> Option<ViewHandle> {
        self.view_for(item)
    }

    fn materialized_count(&self) -> usize {
        self.table.borrow().len()
    }
}

impl Binder for ListDynamicBinding {
    fn bind(&self, source: &ObjectRef) -> Result<(), BindingError> {
        if self.is_bound() {
            error!(source_path = %self.source_path, "dynamic binding is already bound");
            return Err(BindingError::AlreadyBound);
        }
        let mut slot = ItemsSlot::resolve(&self.engine, source, &self.source_path)
            .inspect_err(|err| {
                error!(source_path = %self.source_path, %err, "failed to bind dynamic list");
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
        *self.state.borrow_mut() = Some(slot);
        debug!(source_path = %self.source_path, "dynamic binding bound");

        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.init(self, &self.args),
            Err(_) => error!("dynamic controller re-entered during init"),
        }
        self.sync();
        Ok(())
    }

    fn unbind(&self) {
        let Some(slot) = self.state.borrow_mut().take() else {
            return;
        };
        drop(slot);
        self.release_all();
        update_factory(&self.factory);
        debug!(source_path = %self.source_path, "dynamic binding unbound");
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

impl fmt::Debug for ListDynamicBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListDynamicBinding")
            .field("source_path", &self.source_path)
            .field("bound", &self.is_bound())
            .field("materialized", &self.materialized_count())
            .finish()
    }
}
