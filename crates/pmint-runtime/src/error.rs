#![forbid(unsafe_code)]

//! Binding-level errors.
//!
//! Configuration errors abort the operation and leave prior state unchanged.
//! They are returned to the caller *and* logged where they are detected, so
//! callers without a return path (a [`DataContext`](crate::DataContext)
//! rebinding its binders) still leave a trace.

use pmint_core::{AccessError, ConvertError, RegistryError};

/// Errors raised while configuring or running bindings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    /// The binding path is empty or has an empty segment.
    #[error("invalid binding path '{0}'")]
    InvalidPath(String),
    /// An intermediate object on a nested path is null.
    #[error("nested source '{segment}' of path '{path}' is null")]
    NullNestedSource { path: String, segment: String },
    /// An intermediate value on a nested path is not an object.
    #[error("nested source '{segment}' of path '{path}' is not an object (found {found})")]
    NotAnObject {
        path: String,
        segment: String,
        found: String,
    },
    /// A collection binding path does not lead to a collection.
    #[error("'{path}' is not a collection (found {found})")]
    NotACollection { path: String, found: String },
    /// Resolving or using a property failed.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// Converting a value failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// Registering a converter failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A binding asked for a named converter that does not exist.
    #[error("no converter named '{0}'")]
    UnknownConverter(String),
    /// `bind` was called on a binder that is already bound.
    #[error("binder is already bound")]
    AlreadyBound,
    /// Source names must be non-empty.
    #[error("source name must not be empty")]
    EmptyName,
    /// Another source already uses this name.
    #[error("source name '{0}' is already registered")]
    DuplicateSourceName(String),
    /// The source object is already registered under a name.
    #[error("source is already registered as '{0}'")]
    DuplicateSource(String),
    /// The data context is already registered under a name.
    #[error("data context is already registered as '{0}'")]
    DuplicateContext(String),
    /// The data context was never registered.
    #[error("data context is not registered")]
    UnknownContext,
}
