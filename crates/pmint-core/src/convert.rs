#![forbid(unsafe_code)]

//! Value converters and converter resolution.
//!
//! # Resolution order
//!
//! [`ValueConverterRegistry::match_converter`] resolves a `(source, target)`
//! type pair in this order:
//!
//! 1. target assignable from source → [`ConverterMatch::PassThrough`];
//! 2. an exact pair registration → that converter;
//! 3. the [`DefaultConverter`] supports the pair → the default converter;
//! 4. otherwise [`ConverterMatch::NotFound`] (logged).
//!
//! Explicit registrations therefore always beat the default converter, and
//! assignability always beats any conversion.
//!
//! # Default coercions
//!
//! | From | To | Rule |
//! |------|----|------|
//! | anything | string | `Display` form (`ToString`) |
//! | bool/int/float | bool/int/float | numeric coercion; floats round to nearest |
//! | string | bool/int/float | parse (bool is case-insensitive) |
//! | string | enum | variant name (case-sensitive) |
//! | int ⇄ enum | | variant index |
//! | registered implicit pair | | the implicit function |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::{ConvertError, RegistryError};
use crate::value::{Value, ValueType};

/// A bidirectional value conversion.
pub trait ValueConverter {
    /// Convert a source value for a target of type `target`.
    fn convert(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError>;

    /// Convert a target value back for a source of type `target`.
    fn convert_back(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError>;
}

/// Shared handle to a converter.
pub type ConverterRef = Rc<dyn ValueConverter>;

type ConvertFn = Box<dyn Fn(&Value) -> Result<Value, ConvertError>>;
type ImplicitFn = Rc<dyn Fn(&Value) -> Result<Value, ConvertError>>;

/// Converter built from closures.
///
/// ```
/// use pmint_core::convert::{FnConverter, ValueConverter};
/// use pmint_core::value::{Value, ValueType};
///
/// let percent = FnConverter::new(|v| Ok(Value::from(format!("{}%", v))))
///     .with_back(|v| Ok(Value::Int(v.as_str().unwrap_or("0").trim_end_matches('%').parse().unwrap_or(0))));
/// assert_eq!(percent.convert(&Value::Int(40), ValueType::String).unwrap(), Value::from("40%"));
/// ```
pub struct FnConverter {
    forward: ConvertFn,
    backward: Option<ConvertFn>,
}

impl FnConverter {
    /// Converter with a forward direction only.
    #[must_use]
    pub fn new(forward: impl Fn(&Value) -> Result<Value, ConvertError> + 'static) -> Self {
        Self {
            forward: Box::new(forward),
            backward: None,
        }
    }

    /// Add the backward direction.
    #[must_use]
    pub fn with_back(
        mut self,
        backward: impl Fn(&Value) -> Result<Value, ConvertError> + 'static,
    ) -> Self {
        self.backward = Some(Box::new(backward));
        self
    }
}

impl ValueConverter for FnConverter {
    fn convert(&self, value: &Value, _target: ValueType) -> Result<Value, ConvertError> {
        (self.forward)(value)
    }

    fn convert_back(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError> {
        match &self.backward {
            Some(back) => back(value),
            None => Err(ConvertError::Unsupported {
                from: value.kind_name(),
                to: target,
            }),
        }
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("two_way", &self.backward.is_some())
            .finish()
    }
}

/// Best-effort converter covering the common coercions.
#[derive(Default)]
pub struct DefaultConverter {
    implicit: RefCell<AHashMap<(ValueType, ValueType), ImplicitFn>>,
}

impl DefaultConverter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a conversion from `source` to `target` is possible in general.
    ///
    /// `Any` sources are accepted optimistically; the runtime value decides.
    #[must_use]
    pub fn supports(&self, source: ValueType, target: ValueType) -> bool {
        if target.is_assignable_from(source) || source == ValueType::Any {
            return true;
        }
        if self.implicit.borrow().contains_key(&(source, target)) {
            return true;
        }
        match (source, target) {
            (_, ValueType::String) => true,
            (ValueType::String, t) if t.is_numeric() => true,
            (s, t) if s.is_numeric() && t.is_numeric() => true,
            (ValueType::String | ValueType::Int, ValueType::Enum(_)) => true,
            (ValueType::Enum(_), ValueType::Int) => true,
            _ => false,
        }
    }

    fn add_implicit(&self, source: ValueType, target: ValueType, f: ImplicitFn) -> bool {
        let mut implicit = self.implicit.borrow_mut();
        if implicit.contains_key(&(source, target)) {
            return false;
        }
        implicit.insert((source, target), f);
        true
    }

    /// Convert `value` to `target` using the default rules.
    pub fn coerce(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError> {
        if value.is_null() || target.accepts(value) {
            return Ok(value.clone());
        }
        let implicit = self
            .implicit
            .borrow()
            .get(&(value.value_type(), target))
            .cloned();
        if let Some(f) = implicit {
            return f(value);
        }

        let unsupported = || ConvertError::Unsupported {
            from: value.kind_name(),
            to: target,
        };
        let parse_error = |input: &str| ConvertError::Parse {
            input: input.to_owned(),
            to: target,
        };

        match target {
            ValueType::String => Ok(Value::Str(value.to_string())),
            ValueType::Bool => match value {
                Value::Int(i) => Ok(Value::Bool(*i != 0)),
                Value::Float(f) => Ok(Value::Bool(*f != 0.0)),
                Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(parse_error(s)),
                },
                _ => Err(unsupported()),
            },
            ValueType::Int => match value {
                Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
                Value::Float(f) => float_to_int(*f).ok_or_else(unsupported),
                Value::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| parse_error(s)),
                Value::Enum(e) => i64::try_from(e.index())
                    .map(Value::Int)
                    .map_err(|_| unsupported()),
                _ => Err(unsupported()),
            },
            ValueType::Float => match value {
                Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                #[allow(clippy::cast_precision_loss)]
                Value::Int(i) => Ok(Value::Float(*i as f64)),
                Value::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| parse_error(s)),
                _ => Err(unsupported()),
            },
            ValueType::Enum(info) => {
                let variant = match value {
                    Value::Str(s) => info.parse(s.trim()),
                    Value::Int(i) => usize::try_from(*i).ok().and_then(|i| info.value(i)),
                    _ => return Err(unsupported()),
                };
                variant.map(Value::Enum).ok_or_else(|| ConvertError::UnknownVariant {
                    input: value.to_string(),
                    enum_name: info.name(),
                })
            }
            ValueType::Any
            | ValueType::Object
            | ValueType::Collection
            | ValueType::Custom(_) => Err(unsupported()),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_to_int(f: f64) -> Option<Value> {
    let rounded = f.round();
    (rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64)
        .then(|| Value::Int(rounded as i64))
}

impl ValueConverter for DefaultConverter {
    fn convert(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError> {
        self.coerce(value, target)
    }

    fn convert_back(&self, value: &Value, target: ValueType) -> Result<Value, ConvertError> {
        self.coerce(value, target)
    }
}

impl fmt::Debug for DefaultConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultConverter")
            .field("implicit", &self.implicit.borrow().len())
            .finish()
    }
}

/// Outcome of [`ValueConverterRegistry::match_converter`].
#[derive(Clone)]
pub enum ConverterMatch {
    /// Target is assignable from source; no conversion needed.
    PassThrough,
    /// Use this converter.
    Converter(ConverterRef),
    /// No converter is known for the pair.
    NotFound,
}

impl ConverterMatch {
    /// The converter to apply, if any.
    #[must_use]
    pub fn converter(&self) -> Option<&ConverterRef> {
        match self {
            ConverterMatch::Converter(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_found(&self) -> bool {
        !matches!(self, ConverterMatch::NotFound)
    }
}

impl fmt::Debug for ConverterMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterMatch::PassThrough => f.write_str("PassThrough"),
            ConverterMatch::Converter(_) => f.write_str("Converter(..)"),
            ConverterMatch::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Registry mapping type pairs and names to converters.
pub struct ValueConverterRegistry {
    pairs: AHashMap<(ValueType, ValueType), ConverterRef>,
    named: AHashMap<String, ConverterRef>,
    default: Rc<DefaultConverter>,
}

impl ValueConverterRegistry {
    /// Empty registry with a fresh default converter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pairs: AHashMap::new(),
            named: AHashMap::new(),
            default: Rc::new(DefaultConverter::new()),
        }
    }

    /// Register a converter for an exact `(source, target)` pair.
    pub fn add_converter(
        &mut self,
        source: ValueType,
        target: ValueType,
        converter: ConverterRef,
    ) -> Result<(), RegistryError> {
        if source == target {
            tracing::warn!(%source, "rejected identity converter registration");
            return Err(RegistryError::IdentityPair(source));
        }
        if self.pairs.contains_key(&(source, target)) {
            tracing::warn!(%source, %target, "converter pair already registered");
            return Err(RegistryError::DuplicatePair {
                source_type: source,
                target_type: target,
            });
        }
        self.pairs.insert((source, target), converter);
        Ok(())
    }

    /// Register a converter bindings can request by name.
    pub fn add_named_converter(
        &mut self,
        name: impl Into<String>,
        converter: ConverterRef,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.named.contains_key(&name) {
            tracing::warn!(name = %name, "named converter already registered");
            return Err(RegistryError::DuplicateName(name));
        }
        self.named.insert(name, converter);
        Ok(())
    }

    /// Teach the default converter an implicit conversion.
    pub fn add_implicit(
        &mut self,
        source: ValueType,
        target: ValueType,
        f: impl Fn(&Value) -> Result<Value, ConvertError> + 'static,
    ) -> Result<(), RegistryError> {
        if source == target {
            return Err(RegistryError::IdentityPair(source));
        }
        if !self.default.add_implicit(source, target, Rc::new(f)) {
            return Err(RegistryError::DuplicatePair {
                source_type: source,
                target_type: target,
            });
        }
        Ok(())
    }

    /// Converter registered under `name`.
    #[must_use]
    pub fn named_converter(&self, name: &str) -> Option<ConverterRef> {
        self.named.get(name).cloned()
    }

    /// Converter registered for the exact pair.
    #[must_use]
    pub fn converter(&self, source: ValueType, target: ValueType) -> Option<ConverterRef> {
        self.pairs.get(&(source, target)).cloned()
    }

    /// The shared default converter.
    #[must_use]
    pub fn default_converter(&self) -> Rc<DefaultConverter> {
        Rc::clone(&self.default)
    }

    /// Resolve the converter for a pair (see the module docs for the order).
    #[must_use]
    pub fn match_converter(&self, source: ValueType, target: ValueType) -> ConverterMatch {
        if target.is_assignable_from(source) {
            return ConverterMatch::PassThrough;
        }
        if let Some(converter) = self.converter(source, target) {
            return ConverterMatch::Converter(converter);
        }
        if self.default.supports(source, target) {
            let default: ConverterRef = self.default.clone();
            return ConverterMatch::Converter(default);
        }
        tracing::error!(%source, %target, "no value converter matches the type pair");
        ConverterMatch::NotFound
    }

    /// Number of pair registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl Default for ValueConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ValueConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueConverterRegistry")
            .field("pairs", &self.pairs.len())
            .field("named", &self.named.len())
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::EnumInfo;

    static SIZE: EnumInfo = EnumInfo::new("Size", &["Small", "Medium", "Large"]);

    fn upper() -> ConverterRef {
        Rc::new(FnConverter::new(|v| Ok(Value::Str(v.to_string().to_uppercase()))))
    }

    #[test]
    fn assignable_pairs_pass_through() {
        let reg = ValueConverterRegistry::new();
        assert!(matches!(
            reg.match_converter(ValueType::Int, ValueType::Int),
            ConverterMatch::PassThrough
        ));
        assert!(matches!(
            reg.match_converter(ValueType::String, ValueType::Any),
            ConverterMatch::PassThrough
        ));
    }

    #[test]
    fn explicit_registration_beats_default() {
        let mut reg = ValueConverterRegistry::new();
        let custom = upper();
        reg.add_converter(ValueType::Enum(&SIZE), ValueType::String, custom.clone())
            .unwrap();
        let matched = reg.match_converter(ValueType::Enum(&SIZE), ValueType::String);
        let found = matched.converter().unwrap();
        assert!(Rc::ptr_eq(found, &custom));
        let out = found
            .convert(&Value::Enum(SIZE.value(1).unwrap()), ValueType::String)
            .unwrap();
        assert_eq!(out, Value::from("MEDIUM"));
    }

    #[test]
    fn identity_and_duplicate_registration_fail() {
        let mut reg = ValueConverterRegistry::new();
        assert_eq!(
            reg.add_converter(ValueType::Int, ValueType::Int, upper()),
            Err(RegistryError::IdentityPair(ValueType::Int))
        );
        reg.add_converter(ValueType::Int, ValueType::String, upper())
            .unwrap();
        assert!(matches!(
            reg.add_converter(ValueType::Int, ValueType::String, upper()),
            Err(RegistryError::DuplicatePair { .. })
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn named_converters() {
        let mut reg = ValueConverterRegistry::new();
        reg.add_named_converter("upper", upper()).unwrap();
        assert!(reg.named_converter("upper").is_some());
        assert!(reg.named_converter("lower").is_none());
        assert!(reg.add_named_converter("upper", upper()).is_err());
    }

    #[test]
    fn unknown_pair_is_not_found() {
        let reg = ValueConverterRegistry::new();
        assert!(!reg
            .match_converter(ValueType::Object, ValueType::Int)
            .is_found());
    }

    #[test]
    fn default_coercions() {
        let d = DefaultConverter::new();
        assert_eq!(d.coerce(&Value::Int(3), ValueType::Float).unwrap(), Value::Float(3.0));
        assert_eq!(d.coerce(&Value::Float(2.6), ValueType::Int).unwrap(), Value::Int(3));
        assert_eq!(d.coerce(&Value::from(" 42 "), ValueType::Int).unwrap(), Value::Int(42));
        assert_eq!(d.coerce(&Value::from("TRUE"), ValueType::Bool).unwrap(), Value::Bool(true));
        assert_eq!(d.coerce(&Value::Float(1.5), ValueType::String).unwrap(), Value::from("1.5"));
        assert_eq!(
            d.coerce(&Value::from("Large"), ValueType::Enum(&SIZE)).unwrap(),
            Value::Enum(SIZE.value(2).unwrap())
        );
        assert_eq!(
            d.coerce(&Value::Int(0), ValueType::Enum(&SIZE)).unwrap(),
            Value::Enum(SIZE.value(0).unwrap())
        );
        assert_eq!(
            d.coerce(&Value::Enum(SIZE.value(2).unwrap()), ValueType::Int).unwrap(),
            Value::Int(2)
        );
        assert!(matches!(
            d.coerce(&Value::from("Huge"), ValueType::Enum(&SIZE)),
            Err(ConvertError::UnknownVariant { .. })
        ));
        assert!(matches!(
            d.coerce(&Value::from("abc"), ValueType::Float),
            Err(ConvertError::Parse { .. })
        ));
        assert!(d.coerce(&Value::Float(f64::NAN), ValueType::Int).is_err());
        assert_eq!(d.coerce(&Value::Null, ValueType::Int).unwrap(), Value::Null);
    }

    #[test]
    fn float_to_int_rejects_values_outside_i64() {
        let d = DefaultConverter::new();
        // 2^63 is exact in f64 but one past i64::MAX.
        assert!(d.coerce(&Value::Float(9_223_372_036_854_775_808.0), ValueType::Int).is_err());
        assert_eq!(
            d.coerce(&Value::Float(9_223_372_036_854_774_784.0), ValueType::Int).unwrap(),
            Value::Int(9_223_372_036_854_774_784)
        );
        assert_eq!(
            d.coerce(&Value::Float(i64::MIN as f64), ValueType::Int).unwrap(),
            Value::Int(i64::MIN)
        );
        assert!(d.coerce(&Value::Float(f64::INFINITY), ValueType::Int).is_err());
    }

    #[test]
    fn implicit_conversions_extend_the_default() {
        #[derive(Debug, PartialEq)]
        struct Meters(f64);
        impl fmt::Display for Meters {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}m", self.0)
            }
        }

        let mut reg = ValueConverterRegistry::new();
        let meters = ValueType::custom::<Meters>();
        assert!(!reg.default_converter().supports(ValueType::Float, meters));
        reg.add_implicit(ValueType::Float, meters, |v| {
            Ok(Value::custom(Meters(v.as_float().unwrap_or_default())))
        })
        .unwrap();

        let matched = reg.match_converter(ValueType::Float, meters);
        let out = matched
            .converter()
            .unwrap()
            .convert(&Value::Float(2.5), meters)
            .unwrap();
        assert_eq!(out.as_custom::<Meters>(), Some(&Meters(2.5)));
        assert_eq!(out.to_string(), "2.5m");
    }
}
