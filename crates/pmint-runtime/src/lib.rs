#![forbid(unsafe_code)]

//! Binding engine for Peppermint.
//!
//! - [`Engine`]: accessor cache, converter registry and [`EngineConfig`].
//! - [`binding`]: [`PropertyBinding`] and the [`Binder`] lifecycle.
//! - [`DataContext`]: a swappable source shared by a group of binders.
//! - [`BindingManager`]: named sources and the contexts that follow them.
//! - [`collection`]: [`CollectionBinding`], one host view per item.
//! - [`dynamic`]: [`ListDynamicBinding`], views for a controller-chosen
//!   window of a list.
//! - [`view`]: the host-side [`View`] and [`ViewFactory`] traits.
//!
//! # Architecture
//!
//! Everything is single-threaded: shared state lives in `Rc` with `RefCell`
//! or `Cell` inside. Bindings are created as `Rc<Self>` and keep a `Weak`
//! handle to themselves for the event handlers they register, so dropping a
//! binding is enough to silence it.
//!
//! No binding holds a `RefCell` borrow while calling out to a getter, setter,
//! converter, factory or controller. Those calls may therefore re-enter the
//! binding (a setter raising a change that the same binding observes, a
//! factory reading the collection).
//!
//! # Invariants
//!
//! 1. A bound binder holds exactly the subscriptions its mode needs; unbinding
//!    drops all of them.
//! 2. Configuration errors are returned and logged; runtime propagation
//!    failures are logged and the value is dropped.
//! 3. A collection action outside the known set is a broken collection
//!    contract and panics.

pub mod binding;
pub mod collection;
pub mod config;
pub mod context;
pub mod dynamic;
pub mod engine;
pub mod error;
pub mod manager;
pub mod view;

pub use binding::{Binder, BindingFlags, BindingMode, BindingSpec, PropertyBinding};
pub use collection::CollectionBinding;
pub use config::EngineConfig;
pub use context::{BinderRef, DataContext};
pub use dynamic::{
    ControllerArgs, ControllerRef, DynamicBindingAccessor, DynamicController, ListDynamicBinding,
    ScrollWindow, SyncStats,
};
pub use engine::Engine;
pub use error::BindingError;
pub use manager::BindingManager;
pub use view::{FactoryRef, View, ViewFactory, ViewHandle};

pub use pmint_core;
