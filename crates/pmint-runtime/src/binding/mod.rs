#![forbid(unsafe_code)]

//! Bindings between a source object and a target.
//!
//! Every binding goes through the same lifecycle:
//!
//! ```text
//!   Unbound --bind(source)--> Bound --unbind()--> Unbound
//! ```
//!
//! While bound, a binding subscribes to change notifications and propagates
//! values in the directions its [`BindingMode`] allows. Unbinding drops
//! every subscription, so a binding never outlives its source's handlers.
//!
//! [`Binder`] is the object-safe face a [`DataContext`](crate::DataContext)
//! and the [`BindingManager`](crate::BindingManager) drive. Property bindings
//! live in [`property`]; the collection binders live in
//! [`collection`](crate::collection) and [`dynamic`](crate::dynamic).

pub(crate) mod path;
pub mod property;

use bitflags::bitflags;

use pmint_core::{ObjectId, ObjectRef};

use crate::error::BindingError;
use crate::view::ViewHandle;

pub use path::{ResolvedPath, resolve_path};
pub use property::{BindingSpec, PropertyBinding};

/// Direction(s) a property binding propagates values in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingMode {
    /// Source changes update the target.
    #[default]
    OneWay,
    /// Changes on either side update the other.
    TwoWay,
    /// Target changes update the source.
    OneWayToSource,
}

impl BindingMode {
    /// Whether source changes are pushed to the target.
    #[must_use]
    pub const fn updates_target(self) -> bool {
        matches!(self, Self::OneWay | Self::TwoWay)
    }

    /// Whether target changes are pushed to the source.
    #[must_use]
    pub const fn updates_source(self) -> bool {
        matches!(self, Self::TwoWay | Self::OneWayToSource)
    }
}

bitflags! {
    /// Optional binding behaviors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindingFlags: u8 {
        /// Pick a converter from the registry when none was given explicitly.
        const AUTO_MATCH_CONVERTER = 0b0000_0001;
        /// Write the source property's default value on unbind.
        const RESET_SOURCE_VALUE   = 0b0000_0010;
        /// Write the target property's default value on unbind.
        const RESET_TARGET_VALUE   = 0b0000_0100;
    }
}

impl Default for BindingFlags {
    fn default() -> Self {
        Self::AUTO_MATCH_CONVERTER
    }
}

/// Object-safe control surface of a binding.
pub trait Binder {
    /// Attach to `source` and perform the initial propagation.
    fn bind(&self, source: &ObjectRef) -> Result<(), BindingError>;

    /// Detach from the current source. A no-op when unbound.
    fn unbind(&self);

    fn is_bound(&self) -> bool;

    /// The object whose notifications this binder reacts to (the resolved
    /// end of a nested path), while bound.
    fn source(&self) -> Option<ObjectRef>;

    /// React to `property` of `sender` changing. `None` means every property.
    ///
    /// Notifications from an object other than [`Binder::source`] are
    /// ignored.
    fn handle_source_property_changed(&self, sender: ObjectId, property: Option<&str>);

    /// The view currently created for `item`, for binders that create views.
    fn item_view(&self, item: &ObjectRef) -> Option<ViewHandle> {
        let _ = item;
        None
    }
}
