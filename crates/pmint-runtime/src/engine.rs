#![forbid(unsafe_code)]

//! The binding engine: accessor cache, converter registry and configuration.
//!
//! Every binding holds an `Rc<Engine>` and resolves properties and
//! converters through it. Most hosts use the thread-local [`Engine::global`];
//! tests build isolated engines with [`Engine::new`].

use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use pmint_core::value::{Value, ValueType};
use pmint_core::{
    AccessorCache, Bindable, ConvertError, ConverterMatch, ConverterRef, PropertyAccessor,
    TypeInfo, ValueConverterRegistry,
};

use crate::config::EngineConfig;
use crate::error::BindingError;

thread_local! {
    static GLOBAL_ENGINE: Rc<Engine> = Engine::new(EngineConfig::default());
}

/// Shared binding infrastructure.
pub struct Engine {
    config: EngineConfig,
    accessors: AccessorCache,
    converters: RefCell<ValueConverterRegistry>,
}

impl Engine {
    /// Create an engine with its own type and converter registrations.
    #[must_use]
    pub fn new(config: EngineConfig) -> Rc<Self> {
        Rc::new(Self {
            config,
            accessors: AccessorCache::new(),
            converters: RefCell::new(ValueConverterRegistry::new()),
        })
    }

    /// The thread-local default engine.
    #[must_use]
    pub fn global() -> Rc<Self> {
        GLOBAL_ENGINE.with(Rc::clone)
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn accessors(&self) -> &AccessorCache {
        &self.accessors
    }

    /// Register the bindable surface of a type. Returns `true` on replacement.
    pub fn register_type(&self, info: TypeInfo) -> bool {
        self.accessors.register(info)
    }

    #[must_use]
    pub fn is_registered(&self, type_id: TypeId) -> bool {
        self.accessors.is_registered(type_id)
    }

    /// Resolve a property of a live object.
    pub fn accessor_for(
        &self,
        instance: &dyn Bindable,
        property: &str,
    ) -> Result<Rc<PropertyAccessor>, BindingError> {
        Ok(self.accessors.accessor_for(instance, property)?)
    }

    pub fn add_converter(
        &self,
        source: ValueType,
        target: ValueType,
        converter: ConverterRef,
    ) -> Result<(), BindingError> {
        self.converters
            .borrow_mut()
            .add_converter(source, target, converter)?;
        Ok(())
    }

    pub fn add_named_converter(
        &self,
        name: impl Into<String>,
        converter: ConverterRef,
    ) -> Result<(), BindingError> {
        self.converters
            .borrow_mut()
            .add_named_converter(name, converter)?;
        Ok(())
    }

    /// Teach the default converter an implicit conversion for a pair.
    pub fn add_implicit(
        &self,
        source: ValueType,
        target: ValueType,
        f: impl Fn(&Value) -> Result<Value, ConvertError> + 'static,
    ) -> Result<(), BindingError> {
        self.converters
            .borrow_mut()
            .add_implicit(source, target, f)?;
        Ok(())
    }

    #[must_use]
    pub fn named_converter(&self, name: &str) -> Option<ConverterRef> {
        self.converters.borrow().named_converter(name)
    }

    #[must_use]
    pub fn match_converter(&self, source: ValueType, target: ValueType) -> ConverterMatch {
        self.converters.borrow().match_converter(source, target)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            accessors: AccessorCache::new(),
            converters: RefCell::new(ValueConverterRegistry::new()),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("accessors", &self.accessors)
            .field("converters", &self.converters.borrow())
            .finish()
    }
}
