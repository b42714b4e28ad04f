#![forbid(unsafe_code)]

//! Core data model for Peppermint data binding.
//!
//! - [`value`]: dynamic [`Value`]s and their [`ValueType`] descriptors.
//! - [`object`]: the [`Bindable`] and [`ItemsSource`] capabilities and
//!   identity ([`ObjectId`]).
//! - [`event`]: property and collection change events with RAII
//!   [`Subscription`]s.
//! - [`collection`]: [`ObservableList`], the stock observable collection.
//! - [`accessor`]: [`TypeInfo`] registration and the memoizing
//!   [`AccessorCache`].
//! - [`convert`]: [`ValueConverter`]s and the [`ValueConverterRegistry`].
//!
//! Everything here is single-threaded (`Rc`/`RefCell`); none of the types are
//! `Send`.

pub mod accessor;
pub mod collection;
pub mod convert;
pub mod error;
pub mod event;
pub mod object;
pub mod value;

pub use accessor::{AccessorCache, PropertyAccessor, TypeInfo, TypeInfoBuilder};
pub use collection::{CollectionChangedAction, CollectionChangedArgs, ObservableList};
pub use convert::{
    ConverterMatch, ConverterRef, DefaultConverter, FnConverter, ValueConverter,
    ValueConverterRegistry,
};
pub use error::{AccessError, ConvertError, RegistryError};
pub use event::{CollectionChangedEvent, PropertyChangedEvent, Subscription};
pub use object::{Bindable, ItemsRef, ItemsSource, ObjectId, ObjectRef, same_items, same_object};
pub use value::{CustomData, CustomValue, EnumInfo, EnumValue, TypeKey, Value, ValueType};
