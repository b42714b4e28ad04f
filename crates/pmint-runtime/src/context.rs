#![forbid(unsafe_code)]

//! Data contexts: a swappable source shared by a group of binders.
//!
//! Changing the source unbinds every binder from the old source, then binds
//! every binder to the new one. Setting the same source again is a no-op.
//! Binders added while a source is set are bound immediately.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use pmint_core::{ObjectId, ObjectRef, same_object};

use crate::binding::Binder;

/// Shared handle to a binder.
pub type BinderRef = Rc<dyn Binder>;

/// A source slot plus the binders that follow it.
#[derive(Default)]
pub struct DataContext {
    source: RefCell<Option<ObjectRef>>,
    binders: RefCell<Vec<BinderRef>>,
}

impl DataContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current source.
    #[must_use]
    pub fn source(&self) -> Option<ObjectRef> {
        self.source.borrow().clone()
    }

    /// Whether a source is set.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.source.borrow().is_some()
    }

    /// Replace the source, rebinding every binder.
    ///
    /// Binders that fail to bind stay unbound; the failure has already been
    /// logged by the binder.
    pub fn set_source(&self, source: Option<ObjectRef>) {
        {
            let current = self.source.borrow();
            let unchanged = match (current.as_ref(), source.as_ref()) {
                (None, None) => true,
                (Some(a), Some(b)) => same_object(a, b),
                _ => false,
            };
            if unchanged {
                return;
            }
        }

        let binders = self.binders();
        for binder in &binders {
            binder.unbind();
        }
        debug!(
            source = ?source.as_ref().map(|s| ObjectId::of(&**s)),
            binders = binders.len(),
            "data context source changed"
        );
        self.source.replace(source.clone());

        if let Some(source) = source {
            for binder in &binders {
                if let Err(err) = binder.bind(&source) {
                    debug!(%err, "binder left unbound");
                }
            }
        }
    }

    /// Attach a binder, binding it to the current source if there is one.
    pub fn add_binder(&self, binder: BinderRef) {
        self.binders.borrow_mut().push(Rc::clone(&binder));
        if let Some(source) = self.source()
            && let Err(err) = binder.bind(&source)
        {
            debug!(%err, "binder left unbound");
        }
    }

    /// Detach a binder, unbinding it. Returns `false` if it was not attached.
    pub fn remove_binder(&self, binder: &BinderRef) -> bool {
        let removed = {
            let mut binders = self.binders.borrow_mut();
            let before = binders.len();
            binders.retain(|b| !Rc::ptr_eq(b, binder));
            before != binders.len()
        };
        if removed {
            binder.unbind();
        }
        removed
    }

    /// Snapshot of the attached binders.
    #[must_use]
    pub fn binders(&self) -> Vec<BinderRef> {
        self.binders.borrow().clone()
    }

    #[must_use]
    pub fn binder_count(&self) -> usize {
        self.binders.borrow().len()
    }
}

impl fmt::Debug for DataContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataContext")
            .field("source", &self.source.borrow().as_ref().map(|s| ObjectId::of(&**s)))
            .field("binders", &self.binder_count())
            .finish()
    }
}
