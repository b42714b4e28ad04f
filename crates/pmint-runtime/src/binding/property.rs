#![forbid(unsafe_code)]

//! Property-to-property bindings.
//!
//! A [`PropertyBinding`] connects one property of a source object (reached
//! through a dotted path) to one property of a fixed target object.
//!
//! # Invariants
//!
//! 1. The target accessor is resolved when the binding is created; the
//!    source accessor is resolved on every `bind`.
//! 2. Notifications are filtered by sender identity and property name; `None`
//!    as a property name matches every property.
//! 3. No `RefCell` borrow of the binding is held while a getter, setter or
//!    converter runs, so a setter may re-enter the binding.
//! 4. An automatically matched converter lives only while bound. Explicit
//!    converters survive unbinding.
//!
//! # Failure Modes
//!
//! | Failure | Where | Behavior |
//! |---------|-------|----------|
//! | Unknown target property | `new` | `Err`, logged |
//! | Unknown named converter | `new` | `Err`, logged |
//! | Path cannot be walked | `bind` | `Err`, logged, stays unbound |
//! | No converter matches | `bind` | logged, binds without a converter |
//! | Read or write fails | propagation | warning logged, value dropped |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use pmint_core::{
    AccessError, Bindable, ConverterMatch, ConverterRef, ObjectId, ObjectRef, PropertyAccessor,
    Subscription, Value, ValueConverter,
};

use super::path::{ResolvedPath, resolve_path};
use super::{Binder, BindingFlags, BindingMode};
use crate::engine::Engine;
use crate::error::BindingError;

#[derive(Clone)]
enum ConverterChoice {
    Auto,
    Instance(ConverterRef),
    Named(String),
}

/// Declarative description of a property binding.
///
/// ```
/// use pmint_runtime::binding::{BindingMode, BindingSpec};
///
/// let spec = BindingSpec::new("player.name", "text").with_mode(BindingMode::TwoWay);
/// assert_eq!(spec.source_path(), "player.name");
/// ```
#[derive(Clone)]
pub struct BindingSpec {
    source_path: String,
    target_property: String,
    mode: BindingMode,
    flags: BindingFlags,
    converter: ConverterChoice,
}

impl BindingSpec {
    /// One-way binding of `source_path` to `target_property`, with automatic
    /// converter matching.
    #[must_use]
    pub fn new(source_path: impl Into<String>, target_property: impl Into<String>) -> Self {
        Self {
            source_path: source_path.into(),
            target_property: target_property.into(),
            mode: BindingMode::default(),
            flags: BindingFlags::default(),
            converter: ConverterChoice::Auto,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: BindingMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_flags(mut self, flags: BindingFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Use `converter` instead of matching one from the registry.
    #[must_use]
    pub fn with_converter(mut self, converter: ConverterRef) -> Self {
        self.converter = ConverterChoice::Instance(converter);
        self
    }

    /// Use the converter registered under `name`.
    #[must_use]
    pub fn with_converter_name(mut self, name: impl Into<String>) -> Self {
        self.converter = ConverterChoice::Named(name.into());
        self
    }

    #[must_use]
    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    #[must_use]
    pub fn target_property(&self) -> &str {
        &self.target_property
    }

    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    #[must_use]
    pub fn flags(&self) -> BindingFlags {
        self.flags
    }
}

impl fmt::Debug for BindingSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let converter = match &self.converter {
            ConverterChoice::Auto => "auto".to_owned(),
            ConverterChoice::Instance(_) => "instance".to_owned(),
            ConverterChoice::Named(name) => format!("named({name})"),
        };
        f.debug_struct("BindingSpec")
            .field("source_path", &self.source_path)
            .field("target_property", &self.target_property)
            .field("mode", &self.mode)
            .field("flags", &self.flags)
            .field("converter", &converter)
            .finish()
    }
}

struct BoundState {
    source: ObjectRef,
    source_accessor: Rc<PropertyAccessor>,
    converter: Option<ConverterRef>,
    source_sub: Option<Subscription>,
    target_sub: Option<Subscription>,
}

type Snapshot = (ObjectRef, Rc<PropertyAccessor>, Option<ConverterRef>);

/// A live binding between a source property and a target property.
pub struct PropertyBinding {
    engine: Rc<Engine>,
    spec: BindingSpec,
    target: ObjectRef,
    target_accessor: Rc<PropertyAccessor>,
    explicit_converter: Option<ConverterRef>,
    state: RefCell<Option<BoundState>>,
    this: Weak<PropertyBinding>,
}

impl PropertyBinding {
    /// Create an unbound binding writing to `target`.
    pub fn new(
        engine: &Rc<Engine>,
        target: ObjectRef,
        spec: BindingSpec,
    ) -> Result<Rc<Self>, BindingError> {
        let target_accessor = Self::resolve_target(engine, &target, &spec).inspect_err(|err| {
            error!(
                target_property = %spec.target_property,
                %err,
                "failed to create property binding"
            );
        })?;

        let explicit_converter = match &spec.converter {
            ConverterChoice::Auto => None,
            ConverterChoice::Instance(converter) => Some(Rc::clone(converter)),
            ConverterChoice::Named(name) => match engine.named_converter(name) {
                Some(converter) => Some(converter),
                None => {
                    error!(converter = %name, "binding references an unknown named converter");
                    return Err(BindingError::UnknownConverter(name.clone()));
                }
            },
        };

        Ok(Rc::new_cyclic(|this| Self {
            engine: Rc::clone(engine),
            spec,
            target,
            target_accessor,
            explicit_converter,
            state: RefCell::new(None),
            this: Weak::clone(this),
        }))
    }

    fn resolve_target(
        engine: &Engine,
        target: &ObjectRef,
        spec: &BindingSpec,
    ) -> Result<Rc<PropertyAccessor>, BindingError> {
        let accessor = engine.accessor_for(&**target, &spec.target_property)?;
        if spec.mode.updates_target() && !accessor.can_write() {
            return Err(read_only(&accessor));
        }
        Ok(accessor)
    }

    #[must_use]
    pub fn spec(&self) -> &BindingSpec {
        &self.spec
    }

    #[must_use]
    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    /// The converter in effect: explicit, or matched at bind time.
    #[must_use]
    pub fn converter(&self) -> Option<ConverterRef> {
        match &self.explicit_converter {
            Some(converter) => Some(Rc::clone(converter)),
            None => self.state.borrow().as_ref().and_then(|s| s.converter.clone()),
        }
    }

    /// Push the current source value to the target.
    pub fn update_target(&self) {
        let Some((source, accessor, converter)) = self.snapshot() else {
            return;
        };
        if let Err(err) = self.push_to_target(&source, &accessor, converter.as_deref()) {
            warn!(
                source = %accessor.qualified_name(),
                target = %self.target_accessor.qualified_name(),
                %err,
                "failed to update binding target"
            );
        }
    }

    /// Push the current target value back to the source.
    pub fn update_source(&self) {
        let Some((source, accessor, converter)) = self.snapshot() else {
            return;
        };
        if let Err(err) = self.push_to_source(&source, &accessor, converter.as_deref()) {
            warn!(
                source = %accessor.qualified_name(),
                target = %self.target_accessor.qualified_name(),
                %err,
                "failed to update binding source"
            );
        }
    }

    /// React to a change notification from the target object.
    pub fn handle_target_property_changed(&self, sender: ObjectId, property: Option<&str>) {
        if !self.spec.mode.updates_source() || !self.is_bound() {
            return;
        }
        let expected = ObjectId::of(&*self.target);
        if self.accepts(expected, sender, self.target_accessor.name(), property) {
            self.update_source();
        }
    }

    fn snapshot(&self) -> Option<Snapshot> {
        self.state.borrow().as_ref().map(|s| {
            (
                Rc::clone(&s.source),
                Rc::clone(&s.source_accessor),
                s.converter.clone(),
            )
        })
    }

    fn accepts(
        &self,
        expected: ObjectId,
        sender: ObjectId,
        name: &str,
        property: Option<&str>,
    ) -> bool {
        if sender != expected {
            if self.engine.config().warn_on_foreign_sender {
                warn!(?sender, ?expected, property = name, "ignoring change from unexpected sender");
            }
            return false;
        }
        property.is_none_or(|p| p == name)
    }

    fn push_to_target(
        &self,
        source: &ObjectRef,
        accessor: &PropertyAccessor,
        converter: Option<&dyn ValueConverter>,
    ) -> Result<bool, BindingError> {
        let value = accessor.get_value(&**source)?;
        let value = match converter {
            Some(converter) => converter.convert(&value, self.target_accessor.value_type())?,
            None => value,
        };
        self.write(&self.target_accessor, &*self.target, value)
    }

    fn push_to_source(
        &self,
        source: &ObjectRef,
        accessor: &PropertyAccessor,
        converter: Option<&dyn ValueConverter>,
    ) -> Result<bool, BindingError> {
        let value = self.target_accessor.get_value(&*self.target)?;
        let value = match converter {
            Some(converter) => converter.convert_back(&value, accessor.value_type())?,
            None => value,
        };
        self.write(accessor, &**source, value)
    }

    fn write(
        &self,
        accessor: &PropertyAccessor,
        instance: &dyn Bindable,
        value: Value,
    ) -> Result<bool, BindingError> {
        let config = self.engine.config();
        if config.skip_unchanged_writes && accessor.get_value(instance)? == value {
            return Ok(false);
        }
        if config.trace_updates {
            trace!(property = %accessor.qualified_name(), ?value, "binding write");
        }
        accessor.set_value(instance, value)?;
        Ok(true)
    }

    fn attach(&self, root: &ObjectRef) -> Result<BoundState, BindingError> {
        let ResolvedPath { source, property } =
            resolve_path(&self.engine, root, &self.spec.source_path)?;
        let source_accessor = self.engine.accessor_for(&*source, property)?;
        let mode = self.spec.mode;
        if mode.updates_source() && !source_accessor.can_write() {
            return Err(read_only(&source_accessor));
        }

        let converter = match &self.explicit_converter {
            Some(converter) => Some(Rc::clone(converter)),
            None if self.spec.flags.contains(BindingFlags::AUTO_MATCH_CONVERTER) => {
                let source_type = source_accessor.value_type();
                let target_type = self.target_accessor.value_type();
                match self.engine.match_converter(source_type, target_type) {
                    ConverterMatch::PassThrough => None,
                    ConverterMatch::Converter(converter) => Some(converter),
                    // The registry has logged the miss; writes fail until rebound.
                    ConverterMatch::NotFound => None,
                }
            }
            None => None,
        };

        let source_sub = if mode.updates_target() {
            source.property_changed().map(|event| {
                let this = Weak::clone(&self.this);
                event.subscribe(move |sender, property| {
                    if let Some(this) = this.upgrade() {
                        this.handle_source_property_changed(sender, property);
                    }
                })
            })
        } else {
            None
        };
        let target_sub = if mode.updates_source() {
            self.target.property_changed().map(|event| {
                let this = Weak::clone(&self.this);
                event.subscribe(move |sender, property| {
                    if let Some(this) = this.upgrade() {
                        this.handle_target_property_changed(sender, property);
                    }
                })
            })
        } else {
            None
        };

        Ok(BoundState {
            source,
            source_accessor,
            converter,
            source_sub,
            target_sub,
        })
    }
}

impl Binder for PropertyBinding {
    fn bind(&self, source: &ObjectRef) -> Result<(), BindingError> {
        if self.is_bound() {
            error!(source_path = %self.spec.source_path, "property binding is already bound");
            return Err(BindingError::AlreadyBound);
        }
        let state = self.attach(source).inspect_err(|err| {
            error!(
                source_path = %self.spec.source_path,
                target = %self.target_accessor.qualified_name(),
                %err,
                "failed to bind property"
            );
        })?;
        *self.state.borrow_mut() = Some(state);
        debug!(
            source_path = %self.spec.source_path,
            target = %self.target_accessor.qualified_name(),
            mode = ?self.spec.mode,
            "property binding bound"
        );

        if self.spec.mode.updates_target() {
            self.update_target();
        } else {
            self.update_source();
        }
        Ok(())
    }

    fn unbind(&self) {
        let Some(state) = self.state.borrow_mut().take() else {
            return;
        };
        let BoundState {
            source,
            source_accessor,
            source_sub,
            target_sub,
            ..
        } = state;
        drop(source_sub);
        drop(target_sub);

        if self.spec.flags.contains(BindingFlags::RESET_SOURCE_VALUE)
            && let Err(err) = source_accessor.reset_value(&*source)
        {
            warn!(source = %source_accessor.qualified_name(), %err, "failed to reset source value");
        }
        if self.spec.flags.contains(BindingFlags::RESET_TARGET_VALUE)
            && let Err(err) = self.target_accessor.reset_value(&*self.target)
        {
            warn!(target = %self.target_accessor.qualified_name(), %err, "failed to reset target value");
        }
        debug!(source_path = %self.spec.source_path, "property binding unbound");
    }

    fn is_bound(&self) -> bool {
        self.state.borrow().is_some()
    }

    fn source(&self) -> Option<ObjectRef> {
        self.state.borrow().as_ref().map(|s| Rc::clone(&s.source))
    }

    fn handle_source_property_changed(&self, sender: ObjectId, property: Option<&str>) {
        if !self.spec.mode.updates_target() {
            return;
        }
        let expected = {
            let state = self.state.borrow();
            let Some(bound) = state.as_ref() else {
                return;
            };
            (ObjectId::of(&*bound.source), bound.source_accessor.name())
        };
        if self.accepts(expected.0, sender, expected.1, property) {
            self.update_target();
        }
    }
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("spec", &self.spec)
            .field("target", &self.target_accessor.qualified_name())
            .field("bound", &self.is_bound())
            .finish()
    }
}

fn read_only(accessor: &PropertyAccessor) -> BindingError {
    AccessError::ReadOnly {
        type_name: accessor.owner(),
        property: accessor.name(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use pmint_core::{FnConverter, PropertyChangedEvent, TypeInfo, ValueType};

    use crate::config::EngineConfig;

    #[derive(Default)]
    struct Model {
        name: RefCell<String>,
        score: RefCell<i64>,
        changed: PropertyChangedEvent,
    }

    impl Bindable for Model {
        fn property_changed(&self) -> Option<&PropertyChangedEvent> {
            Some(&self.changed)
        }
    }

    impl Model {
        fn set_name(&self, name: &str) {
            self.changed
                .set_property(ObjectId::of(self), &self.name, name.to_owned(), "name");
        }

        fn set_score(&self, score: i64) {
            self.changed
                .set_property(ObjectId::of(self), &self.score, score, "score");
        }
    }

    #[derive(Default)]
    struct Label {
        text: RefCell<String>,
        writes: Cell<u32>,
        changed: PropertyChangedEvent,
    }

    impl Bindable for Label {
        fn property_changed(&self) -> Option<&PropertyChangedEvent> {
            Some(&self.changed)
        }
    }

    impl Label {
        fn set_text(&self, text: String) {
            self.writes.set(self.writes.get() + 1);
            self.changed
                .set_property(ObjectId::of(self), &self.text, text, "text");
        }

        fn text(&self) -> String {
            self.text.borrow().clone()
        }
    }

    fn engine_with(config: EngineConfig) -> Rc<Engine> {
        let engine = Engine::new(config);
        engine.register_type(
            TypeInfo::builder::<Model>("Model")
                .property_rw(
                    "name",
                    ValueType::String,
                    |m| Value::from(m.name.borrow().clone()),
                    |m, v| {
                        m.set_name(&String::try_from(v)?);
                        Ok(())
                    },
                )
                .property_rw(
                    "score",
                    ValueType::Int,
                    |m| Value::Int(*m.score.borrow()),
                    |m, v| {
                        m.set_score(v.try_into()?);
                        Ok(())
                    },
                )
                .property("label", ValueType::String, |_| Value::from("fixed"))
                .build()
                .unwrap(),
        );
        engine.register_type(
            TypeInfo::builder::<Label>("Label")
                .property_rw(
                    "text",
                    ValueType::String,
                    |l| Value::from(l.text()),
                    |l, v| {
                        l.set_text(v.try_into()?);
                        Ok(())
                    },
                )
                .build()
                .unwrap(),
        );
        engine
    }

    fn engine() -> Rc<Engine> {
        engine_with(EngineConfig::default())
    }

    fn fixture() -> (Rc<Engine>, Rc<Model>, Rc<Label>) {
        let model = Rc::new(Model::default());
        model.set_name("Ayla");
        (engine(), model, Rc::new(Label::default()))
    }

    fn bind(
        engine: &Rc<Engine>,
        model: &Rc<Model>,
        label: &Rc<Label>,
        spec: BindingSpec,
    ) -> Rc<PropertyBinding> {
        let binding = PropertyBinding::new(engine, label.clone(), spec).unwrap();
        let source: ObjectRef = model.clone();
        binding.bind(&source).unwrap();
        binding
    }

    #[test]
    fn one_way_pushes_initial_value_and_changes() {
        let (engine, model, label) = fixture();
        let _binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        assert_eq!(label.text(), "Ayla");

        model.set_name("Lucca");
        assert_eq!(label.text(), "Lucca");
    }

    #[test]
    fn one_way_ignores_target_changes() {
        let (engine, model, label) = fixture();
        let _binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        label.set_text("edited".into());
        assert_eq!(*model.name.borrow(), "Ayla");
    }

    #[test]
    fn two_way_propagates_both_directions() {
        let (engine, model, label) = fixture();
        let spec = BindingSpec::new("name", "text").with_mode(BindingMode::TwoWay);
        let _binding = bind(&engine, &model, &label, spec);

        label.set_text("Marle".into());
        assert_eq!(*model.name.borrow(), "Marle");
        model.set_name("Frog");
        assert_eq!(label.text(), "Frog");
    }

    #[test]
    fn one_way_to_source_pushes_target_first() {
        let (engine, model, label) = fixture();
        label.set_text("Robo".into());
        let spec = BindingSpec::new("name", "text").with_mode(BindingMode::OneWayToSource);
        let _binding = bind(&engine, &model, &label, spec);
        assert_eq!(*model.name.borrow(), "Robo");

        model.set_name("Magus");
        assert_eq!(label.text(), "Robo");
    }

    #[test]
    fn auto_matched_converter_round_trips() {
        let (engine, model, label) = fixture();
        model.set_score(5);
        let spec = BindingSpec::new("score", "text").with_mode(BindingMode::TwoWay);
        let binding = bind(&engine, &model, &label, spec);
        assert_eq!(label.text(), "5");
        assert!(binding.converter().is_some());

        label.set_text("12".into());
        assert_eq!(*model.score.borrow(), 12);

        binding.unbind();
        assert!(binding.converter().is_none());
    }

    #[test]
    fn explicit_converter_survives_unbind() {
        let (engine, model, label) = fixture();
        let shout: ConverterRef = Rc::new(FnConverter::new(|v| {
            Ok(Value::from(v.to_string().to_uppercase()))
        }));
        let spec = BindingSpec::new("name", "text").with_converter(shout);
        let binding = bind(&engine, &model, &label, spec);
        assert_eq!(label.text(), "AYLA");
        binding.unbind();
        assert!(binding.converter().is_some());
    }

    #[test]
    fn named_converter_is_resolved_at_creation() {
        let (engine, _model, label) = fixture();
        let err = PropertyBinding::new(
            &engine,
            label.clone(),
            BindingSpec::new("name", "text").with_converter_name("missing"),
        )
        .unwrap_err();
        assert_eq!(err, BindingError::UnknownConverter("missing".into()));

        engine
            .add_named_converter("quote", Rc::new(FnConverter::new(|v| Ok(Value::from(format!("'{v}'"))))))
            .unwrap();
        let binding = PropertyBinding::new(
            &engine,
            label.clone(),
            BindingSpec::new("name", "text").with_converter_name("quote"),
        )
        .unwrap();
        let model: ObjectRef = Rc::new(Model::default());
        binding.bind(&model).unwrap();
        assert_eq!(label.text(), "''");
    }

    #[test]
    fn unbind_drops_subscriptions_and_stops_updates() {
        let (engine, model, label) = fixture();
        let spec = BindingSpec::new("name", "text").with_mode(BindingMode::TwoWay);
        let binding = bind(&engine, &model, &label, spec);
        assert_eq!(model.changed.handler_count(), 1);
        assert_eq!(label.changed.handler_count(), 1);

        binding.unbind();
        assert!(!binding.is_bound());
        assert_eq!(model.changed.handler_count(), 0);
        assert_eq!(label.changed.handler_count(), 0);

        model.set_name("Lucca");
        assert_eq!(label.text(), "Ayla");
        binding.unbind();
    }

    #[test]
    fn reset_flags_apply_on_unbind() {
        let (engine, model, label) = fixture();
        let spec = BindingSpec::new("name", "text")
            .with_flags(BindingFlags::AUTO_MATCH_CONVERTER | BindingFlags::RESET_TARGET_VALUE);
        let binding = bind(&engine, &model, &label, spec);
        assert_eq!(label.text(), "Ayla");
        binding.unbind();
        assert_eq!(label.text(), "");
        assert_eq!(*model.name.borrow(), "Ayla");
    }

    #[test]
    fn binding_twice_is_rejected() {
        let (engine, model, label) = fixture();
        let binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        let source: ObjectRef = model.clone();
        assert_eq!(binding.bind(&source), Err(BindingError::AlreadyBound));
        assert!(binding.is_bound());
    }

    #[test]
    fn read_only_source_rejects_two_way() {
        let (engine, model, label) = fixture();
        let binding = PropertyBinding::new(
            &engine,
            label,
            BindingSpec::new("label", "text").with_mode(BindingMode::TwoWay),
        )
        .unwrap();
        let source: ObjectRef = model;
        assert!(matches!(
            binding.bind(&source),
            Err(BindingError::Access(AccessError::ReadOnly { .. }))
        ));
        assert!(!binding.is_bound());
    }

    #[test]
    fn foreign_sender_and_other_properties_are_ignored() {
        let (engine, model, label) = fixture();
        let binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        *model.name.borrow_mut() = "quiet".into();

        let stranger = Model::default();
        binding.handle_source_property_changed(ObjectId::of(&stranger), Some("name"));
        assert_eq!(label.text(), "Ayla");
        binding.handle_source_property_changed(ObjectId::of(&*model), Some("score"));
        assert_eq!(label.text(), "Ayla");

        binding.handle_source_property_changed(ObjectId::of(&*model), None);
        assert_eq!(label.text(), "quiet");
    }

    #[test]
    fn unchanged_values_are_not_written() {
        let (engine, model, label) = fixture();
        let binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        let writes = label.writes.get();
        binding.update_target();
        model.changed.notify_all(ObjectId::of(&*model));
        assert_eq!(label.writes.get(), writes);

        let engine = engine_with(EngineConfig::default().with_skip_unchanged_writes(false));
        let label = Rc::new(Label::default());
        let binding = bind(&engine, &model, &label, BindingSpec::new("name", "text"));
        let writes = label.writes.get();
        binding.update_target();
        assert_eq!(label.writes.get(), writes + 1);
    }
}
