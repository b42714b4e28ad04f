#![forbid(unsafe_code)]

//! Named sources and the data contexts that follow them.
//!
//! The [`BindingManager`] keeps two registries:
//!
//! - a bijection between source names and source objects;
//! - for each name, the data contexts registered under it.
//!
//! Registering a context under a name whose source is present binds it
//! immediately; registering a source binds every context already waiting on
//! its name. Removing either side unbinds.
//!
//! The manager is also a notification hub for sources that do not raise
//! their own change events: [`BindingManager::notify_property_changed`]
//! routes a change to every binder of every context under the source's name.
//!
//! # Invariants
//!
//! 1. A name maps to at most one source and a source to at most one name.
//! 2. A context is registered under at most one name.
//! 3. No registry borrow is held while a context rebinds.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::{debug, error, warn};

use pmint_core::{ObjectId, ObjectRef};

use crate::context::DataContext;
use crate::error::BindingError;

thread_local! {
    static GLOBAL_MANAGER: Rc<BindingManager> = Rc::new(BindingManager::new());
}

#[derive(Default)]
struct Registry {
    sources: AHashMap<String, ObjectRef>,
    source_names: AHashMap<ObjectId, String>,
    contexts: AHashMap<String, Vec<Rc<DataContext>>>,
    context_names: AHashMap<usize, String>,
}

fn context_key(context: &Rc<DataContext>) -> usize {
    Rc::as_ptr(context) as usize
}

/// Registry of named sources and their data contexts.
#[derive(Default)]
pub struct BindingManager {
    registry: RefCell<Registry>,
}

impl BindingManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The thread-local default manager.
    #[must_use]
    pub fn global() -> Rc<Self> {
        GLOBAL_MANAGER.with(Rc::clone)
    }

    /// Register `source` under `name` and bind every context waiting on it.
    pub fn add_source(&self, source: ObjectRef, name: &str) -> Result<(), BindingError> {
        let waiting = {
            let mut registry = self.registry.borrow_mut();
            let id = ObjectId::of(&*source);
            let check = if name.is_empty() {
                Err(BindingError::EmptyName)
            } else if let Some(existing) = registry.source_names.get(&id) {
                Err(BindingError::DuplicateSource(existing.clone()))
            } else if registry.sources.contains_key(name) {
                Err(BindingError::DuplicateSourceName(name.to_owned()))
            } else {
                Ok(())
            };
            if let Err(err) = check {
                error!(name, %err, "failed to add binding source");
                return Err(err);
            }
            registry.sources.insert(name.to_owned(), Rc::clone(&source));
            registry.source_names.insert(id, name.to_owned());
            registry.contexts.get(name).cloned().unwrap_or_default()
        };

        debug!(name, contexts = waiting.len(), "binding source added");
        for context in waiting {
            context.set_source(Some(Rc::clone(&source)));
        }
        Ok(())
    }

    /// Unregister `source` and unbind its contexts. Unknown sources are
    /// ignored; returns whether the source was registered.
    pub fn remove_source(&self, source: &ObjectRef) -> bool {
        let contexts = {
            let mut registry = self.registry.borrow_mut();
            let Some(name) = registry.source_names.remove(&ObjectId::of(&**source)) else {
                return false;
            };
            registry.sources.remove(&name);
            debug!(name = %name, "binding source removed");
            registry.contexts.get(&name).cloned().unwrap_or_default()
        };
        for context in contexts {
            context.set_source(None);
        }
        true
    }

    /// Register `context` under `name`, binding it if the source is present.
    pub fn add_data_context(
        &self,
        context: &Rc<DataContext>,
        name: &str,
    ) -> Result<(), BindingError> {
        let source = {
            let mut registry = self.registry.borrow_mut();
            let key = context_key(context);
            if name.is_empty() {
                error!("data context registered without a source name");
                return Err(BindingError::EmptyName);
            }
            if let Some(existing) = registry.context_names.get(&key) {
                let err = BindingError::DuplicateContext(existing.clone());
                error!(name, %err, "failed to add data context");
                return Err(err);
            }
            registry.context_names.insert(key, name.to_owned());
            registry
                .contexts
                .entry(name.to_owned())
                .or_default()
                .push(Rc::clone(context));
            registry.sources.get(name).cloned()
        };

        if let Some(source) = source {
            context.set_source(Some(source));
        }
        Ok(())
    }

    /// Unregister `context` and unbind it.
    pub fn remove_data_context(&self, context: &Rc<DataContext>) -> Result<(), BindingError> {
        {
            let mut registry = self.registry.borrow_mut();
            let Some(name) = registry.context_names.remove(&context_key(context)) else {
                warn!("removing a data context that was never registered");
                return Err(BindingError::UnknownContext);
            };
            if let Some(list) = registry.contexts.get_mut(&name) {
                list.retain(|c| !Rc::ptr_eq(c, context));
                if list.is_empty() {
                    registry.contexts.remove(&name);
                }
            }
        }
        context.set_source(None);
        Ok(())
    }

    /// Source registered under `name`.
    #[must_use]
    pub fn source(&self, name: &str) -> Option<ObjectRef> {
        self.registry.borrow().sources.get(name).cloned()
    }

    /// Name `source` is registered under.
    #[must_use]
    pub fn source_name(&self, source: &ObjectRef) -> Option<String> {
        self.registry
            .borrow()
            .source_names
            .get(&ObjectId::of(&**source))
            .cloned()
    }

    /// Contexts registered under `name`, in registration order.
    #[must_use]
    pub fn data_contexts(&self, name: &str) -> Vec<Rc<DataContext>> {
        self.registry
            .borrow()
            .contexts
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn source_count(&self) -> usize {
        self.registry.borrow().sources.len()
    }

    #[must_use]
    pub fn context_count(&self) -> usize {
        self.registry.borrow().context_names.len()
    }

    /// Route a change of `property` on `binding_source` to every binder,
    /// under `source`'s name, that is bound to `binding_source`.
    ///
    /// `binding_source` is usually `source` itself, or an object reached
    /// through a nested path. Returns the number of binders notified.
    pub fn notify_property_changed(
        &self,
        source: &ObjectRef,
        binding_source: &ObjectRef,
        property: Option<&str>,
    ) -> usize {
        let Some(name) = self.source_name(source) else {
            warn!("property change notified for an unregistered source");
            return 0;
        };
        let sender = ObjectId::of(&**binding_source);
        let mut notified = 0;
        for context in self.data_contexts(&name) {
            if !context.is_bound() {
                continue;
            }
            for binder in context.binders() {
                if binder.source().is_some_and(|s| ObjectId::of(&*s) == sender) {
                    binder.handle_source_property_changed(sender, property);
                    notified += 1;
                }
            }
        }
        notified
    }

    /// Route a change of `property` on `item`, an element of a collection
    /// bound from `binding_source`, to the binders of the item's view.
    ///
    /// Returns the number of binders notified.
    pub fn notify_item_property_changed(
        &self,
        source: &ObjectRef,
        binding_source: &ObjectRef,
        item: &ObjectRef,
        property: Option<&str>,
    ) -> usize {
        let Some(name) = self.source_name(source) else {
            warn!("item property change notified for an unregistered source");
            return 0;
        };
        let owner = ObjectId::of(&**binding_source);
        let sender = ObjectId::of(&**item);
        let mut notified = 0;
        for context in self.data_contexts(&name) {
            if !context.is_bound() {
                continue;
            }
            for binder in context.binders() {
                if !binder.source().is_some_and(|s| ObjectId::of(&*s) == owner) {
                    continue;
                }
                let Some(item_context) = binder.item_view(item).and_then(|v| v.data_context())
                else {
                    continue;
                };
                for item_binder in item_context.binders() {
                    if item_binder
                        .source()
                        .is_some_and(|s| ObjectId::of(&*s) == sender)
                    {
                        item_binder.handle_source_property_changed(sender, property);
                        notified += 1;
                    }
                }
            }
        }
        notified
    }
}

impl fmt::Debug for BindingManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        f.debug_struct("BindingManager")
            .field("sources", &registry.sources.len())
            .field("contexts", &registry.context_names.len())
            .finish()
    }
}
