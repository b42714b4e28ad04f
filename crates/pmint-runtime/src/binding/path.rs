#![forbid(unsafe_code)]

//! Dotted binding paths.
//!
//! `"player.stats.hp"` reads `player`, then `stats` on the result, and binds
//! to `hp` on that object. Intermediate values are read once, at bind time;
//! rebinding re-walks the path.

use std::rc::Rc;

use pmint_core::{ObjectRef, Value};

use crate::engine::Engine;
use crate::error::BindingError;

/// End of a walked path: the object owning the final property, and its name.
#[derive(Clone)]
pub struct ResolvedPath<'p> {
    pub source: ObjectRef,
    pub property: &'p str,
}

/// Walk `path` starting at `root`.
pub fn resolve_path<'p>(
    engine: &Engine,
    root: &ObjectRef,
    path: &'p str,
) -> Result<ResolvedPath<'p>, BindingError> {
    if path.split('.').any(str::is_empty) {
        return Err(BindingError::InvalidPath(path.to_owned()));
    }

    let mut segments = path.split('.');
    let mut property = segments.next().unwrap_or_default();
    let mut source = Rc::clone(root);

    for next in segments {
        let accessor = engine.accessor_for(&*source, property)?;
        source = match accessor.get_value(&*source)? {
            Value::Object(obj) => obj,
            Value::Null => {
                return Err(BindingError::NullNestedSource {
                    path: path.to_owned(),
                    segment: property.to_owned(),
                });
            }
            other => {
                return Err(BindingError::NotAnObject {
                    path: path.to_owned(),
                    segment: property.to_owned(),
                    found: other.kind_name(),
                });
            }
        };
        property = next;
    }

    Ok(ResolvedPath { source, property })
}
