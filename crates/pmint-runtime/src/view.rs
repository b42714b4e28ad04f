#![forbid(unsafe_code)]

//! Host-side view abstractions used by collection bindings.
//!
//! A collection binding never builds views itself. It asks a [`ViewFactory`]
//! for one view per item, points the view's [`DataContext`] at the item, and
//! hands the view back to the factory when the item leaves.

use std::cell::RefCell;
use std::rc::Rc;

use pmint_core::ObjectRef;

use crate::context::DataContext;

/// A host view created for one collection item.
pub trait View {
    /// The data context the item is bound through, if the view has one.
    ///
    /// Views without a data context are still created and ordered, but their
    /// bindings never see the item.
    fn data_context(&self) -> Option<Rc<DataContext>>;

    /// Place the view at `index` among its siblings.
    fn set_sibling_index(&self, index: usize);
}

/// Shared handle to a host view.
pub type ViewHandle = Rc<dyn View>;

/// Creates and releases item views.
///
/// Called only from binding code, never while a binding borrow is held, so
/// implementations may read the item or the collection freely.
pub trait ViewFactory {
    /// Create (or take from a pool) a view for `item`.
    ///
    /// Returning `None` skips the item; the binding logs a warning.
    fn create_item_view(&mut self, item: &ObjectRef) -> Option<ViewHandle>;

    /// Return a view that no longer shows an item. Its data context has
    /// already been cleared.
    fn release_item_view(&mut self, view: ViewHandle);

    /// Called once after each batch of creates, releases and reorders.
    fn update_view(&mut self) {}
}

/// Shared handle to a view factory.
pub type FactoryRef = Rc<RefCell<dyn ViewFactory>>;
