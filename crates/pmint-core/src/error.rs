#![forbid(unsafe_code)]

//! Error types shared by the accessor cache and the converter registry.
//!
//! # Failure Modes
//!
//! | Error | Raised by | Typical cause |
//! |-------|-----------|---------------|
//! | [`AccessError::UnknownType`] | [`AccessorCache`](crate::accessor::AccessorCache) | Type never registered |
//! | [`AccessError::UnknownProperty`] | accessor lookup | Typo in a binding path |
//! | [`AccessError::ReadOnly`] | `set_value` | Writing a getter-only property |
//! | [`AccessError::TypeMismatch`] | `get_value` / `set_value` | Wrong instance or wrong value kind |
//! | [`ConvertError::Unsupported`] | converters | No coercion between the two types |
//! | [`RegistryError::DuplicatePair`] | `add_converter` | Pair already registered |

use crate::value::ValueType;

/// Failures while reading, writing or registering properties.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    /// No [`TypeInfo`](crate::accessor::TypeInfo) was registered for the type.
    #[error("type '{0}' is not registered for binding")]
    UnknownType(String),
    /// The type is registered but does not declare the property.
    #[error("type '{type_name}' has no bindable property '{property}'")]
    UnknownProperty {
        type_name: String,
        property: String,
    },
    /// The property has no setter.
    #[error("property '{type_name}.{property}' is read-only")]
    ReadOnly {
        type_name: &'static str,
        property: &'static str,
    },
    /// The instance or the value does not match the declared type.
    #[error("type mismatch on '{property}': expected {expected}, found {found}")]
    TypeMismatch {
        property: String,
        expected: String,
        found: String,
    },
    /// The same property name was declared twice for one type.
    #[error("property '{property}' declared twice on '{type_name}'")]
    DuplicateProperty {
        type_name: &'static str,
        property: &'static str,
    },
    /// Property names must be non-empty and must not contain `.`.
    #[error("invalid property name '{0}'")]
    InvalidName(String),
    /// A user setter rejected the value.
    #[error("setter for '{property}' failed: {reason}")]
    SetterFailed { property: String, reason: String },
}

/// Failures raised by value converters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConvertError {
    /// The converter cannot produce the requested type from the value.
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: String, to: ValueType },
    /// A string could not be parsed into the target primitive.
    #[error("cannot parse '{input}' as {to}")]
    Parse { input: String, to: ValueType },
    /// A string or integer does not name a variant of the target enum.
    #[error("'{input}' is not a variant of enum {enum_name}")]
    UnknownVariant {
        input: String,
        enum_name: &'static str,
    },
    /// Converter-specific failure.
    #[error("{0}")]
    Custom(String),
}

/// Failures while registering converters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Source and target type are identical; identity needs no converter.
    #[error("converter pair {0} -> {0} is an identity conversion")]
    IdentityPair(ValueType),
    /// A converter is already registered for the pair.
    #[error("a converter for {source_type} -> {target_type} is already registered")]
    DuplicatePair {
        source_type: ValueType,
        target_type: ValueType,
    },
    /// A named converter with this name already exists.
    #[error("a converter named '{0}' is already registered")]
    DuplicateName(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_name_the_property() {
        let err = AccessError::UnknownProperty {
            type_name: "PlayerVm".into(),
            property: "helth".into(),
        };
        assert_eq!(
            err.to_string(),
            "type 'PlayerVm' has no bindable property 'helth'"
        );
    }

    #[test]
    fn registry_error_mentions_both_types() {
        let err = RegistryError::DuplicatePair {
            source_type: ValueType::Int,
            target_type: ValueType::String,
        };
        let msg = err.to_string();
        assert!(msg.contains("int"));
        assert!(msg.contains("string"));
    }
}
