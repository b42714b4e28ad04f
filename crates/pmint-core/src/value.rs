#![forbid(unsafe_code)]

//! Dynamic values exchanged between binding sources and targets.
//!
//! Bindings move data between properties whose concrete Rust types are only
//! known to the registered accessors, so values travel as [`Value`] and are
//! described by a [`ValueType`]. Converters operate on these two types.
//!
//! # Invariants
//!
//! 1. `Value::Null` is accepted by every [`ValueType`]; writers substitute
//!    [`ValueType::default_value`] for value-like types.
//! 2. `Object` and `Collection` values compare by identity, never by content.
//! 3. `ValueType::Any` is assignable from every type; every other type is
//!    assignable only from itself.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::error::ConvertError;
use crate::object::{Bindable, ItemsSource, ObjectId, ObjectRef, ItemsRef};

// ---------------------------------------------------------------------------
// Type descriptors
// ---------------------------------------------------------------------------

/// Identity of a Rust type used for custom values and registered bindables.
///
/// Equality and hashing use the [`TypeId`] only; the name is for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`, named after the last path segment of its type name.
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(std::any::type_name::<T>()),
        }
    }

    /// Build a key from a runtime type id and a display name.
    #[must_use]
    pub const fn from_parts(id: TypeId, name: &'static str) -> Self {
        Self { id, name }
    }

    /// The underlying [`TypeId`].
    #[inline]
    #[must_use]
    pub const fn id(self) -> TypeId {
        self.id
    }

    /// Short display name.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Strip module paths from a `std::any::type_name` result, keeping generics.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Static description of an enum's variants, by declaration order.
///
/// ```
/// use pmint_core::value::EnumInfo;
///
/// static ALIGN: EnumInfo = EnumInfo::new("Align", &["Left", "Center", "Right"]);
/// assert_eq!(ALIGN.variant_index("Center"), Some(1));
/// ```
#[derive(Debug)]
pub struct EnumInfo {
    name: &'static str,
    variants: &'static [&'static str],
}

impl EnumInfo {
    /// Describe an enum by name and variant names.
    #[must_use]
    pub const fn new(name: &'static str, variants: &'static [&'static str]) -> Self {
        Self { name, variants }
    }

    /// The enum's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Variant names, by index.
    #[must_use]
    pub const fn variants(&self) -> &'static [&'static str] {
        self.variants
    }

    /// Index of the variant named `name` (case-sensitive).
    #[must_use]
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| *v == name)
    }

    /// Construct a value of this enum by variant index.
    #[must_use]
    pub fn value(&'static self, index: usize) -> Option<EnumValue> {
        (index < self.variants.len()).then_some(EnumValue { info: self, index })
    }

    /// Construct a value of this enum by variant name.
    #[must_use]
    pub fn parse(&'static self, name: &str) -> Option<EnumValue> {
        self.variant_index(name)
            .map(|index| EnumValue { info: self, index })
    }
}

impl PartialEq for EnumInfo {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.name == other.name && self.variants == other.variants)
    }
}

impl Eq for EnumInfo {}

impl Hash for EnumInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// A single enum variant together with its descriptor.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    info: &'static EnumInfo,
    index: usize,
}

impl EnumValue {
    /// The descriptor this value belongs to.
    #[must_use]
    pub const fn info(self) -> &'static EnumInfo {
        self.info
    }

    /// Variant index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }

    /// Variant name.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.info.variants[self.index]
    }
}

impl fmt::Debug for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.info.name, self.name())
    }
}

/// Declared type of a bindable property, or the runtime type of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Accepts any value (the analogue of `object`).
    Any,
    Bool,
    Int,
    Float,
    String,
    Enum(&'static EnumInfo),
    /// A bindable object (nested view model).
    Object,
    /// An enumerable list of bindable objects.
    Collection,
    /// An opaque application type such as a color or a sprite handle.
    Custom(TypeKey),
}

impl ValueType {
    /// Custom type descriptor for `T`.
    #[must_use]
    pub fn custom<T: CustomData>() -> Self {
        Self::Custom(TypeKey::of::<T>())
    }

    /// Whether a value of type `source` may be stored without conversion.
    #[must_use]
    pub fn is_assignable_from(self, source: ValueType) -> bool {
        self == ValueType::Any || self == source
    }

    /// Whether `value` may be written to a property of this type as-is.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match value {
            Value::Null => true,
            other => self.is_assignable_from(other.value_type()),
        }
    }

    /// Value written when a property of this type is reset.
    #[must_use]
    pub fn default_value(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::Str(String::new()),
            ValueType::Enum(info) => info.value(0).map_or(Value::Null, Value::Enum),
            ValueType::Any | ValueType::Object | ValueType::Collection | ValueType::Custom(_) => {
                Value::Null
            }
        }
    }

    /// Whether the type is one of the numeric-like primitives.
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Bool | ValueType::Int | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("any"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::String => f.write_str("string"),
            ValueType::Enum(info) => write!(f, "enum {}", info.name()),
            ValueType::Object => f.write_str("object"),
            ValueType::Collection => f.write_str("collection"),
            ValueType::Custom(key) => f.write_str(key.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// Custom payloads
// ---------------------------------------------------------------------------

/// Application data carried by [`Value::Custom`].
///
/// Implemented automatically for any `'static` type that is `Debug`,
/// `Display` and `PartialEq`.
pub trait CustomData: Any + fmt::Debug + fmt::Display {
    /// Equality across erased payloads; false when the types differ.
    fn dyn_eq(&self, other: &dyn CustomData) -> bool;
}

impl<T: Any + fmt::Debug + fmt::Display + PartialEq> CustomData for T {
    fn dyn_eq(&self, other: &dyn CustomData) -> bool {
        let other: &dyn Any = other;
        other.downcast_ref::<T>().is_some_and(|o| o == self)
    }
}

/// A shared, type-tagged custom payload.
#[derive(Clone)]
pub struct CustomValue {
    key: TypeKey,
    data: Rc<dyn CustomData>,
}

impl CustomValue {
    /// Wrap `data`.
    #[must_use]
    pub fn new<T: CustomData>(data: T) -> Self {
        Self {
            key: TypeKey::of::<T>(),
            data: Rc::new(data),
        }
    }

    /// Type of the payload.
    #[must_use]
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    /// Borrow the payload as `T`.
    #[must_use]
    pub fn downcast_ref<T: CustomData>(&self) -> Option<&T> {
        let any: &dyn Any = &*self.data;
        any.downcast_ref::<T>()
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.data.dyn_eq(&*other.data)
    }
}

impl fmt::Debug for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.data, f)
    }
}

impl fmt::Display for CustomValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.data, f)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A dynamically typed property value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Enum(EnumValue),
    Object(ObjectRef),
    Collection(ItemsRef),
    Custom(CustomValue),
}

impl Value {
    /// Runtime type of the value. `Null` reports [`ValueType::Any`].
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Str(_) => ValueType::String,
            Value::Enum(e) => ValueType::Enum(e.info()),
            Value::Object(_) => ValueType::Object,
            Value::Collection(_) => ValueType::Collection,
            Value::Custom(c) => ValueType::Custom(c.type_key()),
        }
    }

    /// Short kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> String {
        match self {
            Value::Null => "null".to_owned(),
            other => other.value_type().to_string(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_enum(&self) -> Option<EnumValue> {
        match self {
            Value::Enum(e) => Some(*e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_collection(&self) -> Option<&ItemsRef> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_custom<T: CustomData>(&self) -> Option<&T> {
        match self {
            Value::Custom(c) => c.downcast_ref(),
            _ => None,
        }
    }

    /// Wrap a custom payload.
    #[must_use]
    pub fn custom<T: CustomData>(data: T) -> Self {
        Value::Custom(CustomValue::new(data))
    }

    /// Wrap a bindable object.
    #[must_use]
    pub fn object<T: Bindable>(obj: &Rc<T>) -> Self {
        Value::Object(obj.clone())
    }

    /// Wrap a collection.
    #[must_use]
    pub fn collection<T: ItemsSource>(items: &Rc<T>) -> Self {
        Value::Collection(items.clone())
    }

    fn unsupported(&self, to: ValueType) -> ConvertError {
        ConvertError::Unsupported {
            from: self.kind_name(),
            to,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bit-identical NaNs compare equal so change guards settle.
            (Value::Float(a), Value::Float(b)) => a == b || a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => ObjectId::of(&**a) == ObjectId::of(&**b),
            (Value::Collection(a), Value::Collection(b)) => {
                ObjectId::of_items(&**a) == ObjectId::of_items(&**b)
            }
            (Value::Custom(a), Value::Custom(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Enum(e) => write!(f, "Enum({e:?})"),
            Value::Object(o) => write!(f, "Object({}@{:?})", o.type_name(), ObjectId::of(&**o)),
            Value::Collection(c) => write!(
                f,
                "Collection({}@{:?}, len={})",
                c.type_name(),
                ObjectId::of_items(&**c),
                c.len()
            ),
            Value::Custom(c) => write!(f, "Custom({c:?})"),
        }
    }
}

/// The `ToString` form used by the default converter.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Enum(e) => f.write_str(e.name()),
            Value::Object(o) => f.write_str(o.type_name()),
            Value::Collection(c) => f.write_str(c.type_name()),
            Value::Custom(c) => fmt::Display::fmt(c, f),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions into Value
// ---------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enum(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<ItemsRef> for Value {
    fn from(v: ItemsRef) -> Self {
        Value::Collection(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// Conversions out of Value (used by property setters)
// ---------------------------------------------------------------------------

impl TryFrom<Value> for bool {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(other.unsupported(ValueType::Bool)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => Ok(i),
            other => Err(other.unsupported(ValueType::Int)),
        }
    }
}

impl TryFrom<Value> for i32 {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(i) => i32::try_from(i).map_err(|_| ConvertError::Custom(format!(
                "{i} does not fit in a 32-bit integer"
            ))),
            other => Err(other.unsupported(ValueType::Int)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(other.unsupported(ValueType::Float)),
        }
    }
}

impl TryFrom<Value> for f32 {
    type Error = ConvertError;

    #[allow(clippy::cast_possible_truncation)]
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(other.unsupported(ValueType::Float)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(other.unsupported(ValueType::String)),
        }
    }
}

impl TryFrom<Value> for EnumValue {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Enum(e) => Ok(e),
            other => Err(ConvertError::Custom(format!(
                "expected an enum value, found {}",
                other.kind_name()
            ))),
        }
    }
}

/// Object slots are nullable, so `Null` maps to `None`.
impl TryFrom<Value> for Option<ObjectRef> {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(None),
            Value::Object(o) => Ok(Some(o)),
            other => Err(other.unsupported(ValueType::Object)),
        }
    }
}

impl TryFrom<Value> for Option<ItemsRef> {
    type Error = ConvertError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(None),
            Value::Collection(c) => Ok(Some(c)),
            other => Err(other.unsupported(ValueType::Collection)),
        }
    }
}
