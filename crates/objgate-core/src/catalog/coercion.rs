//! Boxed/primitive type equivalence.

use std::collections::HashMap;

/// Immutable table of primitive ↔ boxed type pairs.
///
/// Built once at startup and handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct CoercionTable {
    boxed: HashMap<String, String>,
    unboxed: HashMap<String, String>,
}

impl Default for CoercionTable {
    fn default() -> Self {
        Self::new(&[("int", "Integer"), ("double", "Double"), ("boolean", "Boolean")])
    }
}

impl CoercionTable {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut boxed = HashMap::new();
        let mut unboxed = HashMap::new();
        for (primitive, wrapper) in pairs {
            boxed.insert(primitive.to_string(), wrapper.to_string());
            unboxed.insert(wrapper.to_string(), primitive.to_string());
        }
        Self { boxed, unboxed }
    }

    pub fn is_primitive(&self, type_name: &str) -> bool {
        self.boxed.contains_key(type_name)
    }

    /// Wrapper type of a primitive, if any.
    pub fn boxed(&self, primitive: &str) -> Option<&str> {
        self.boxed.get(primitive).map(String::as_str)
    }

    /// Primitive type of a wrapper, if any.
    pub fn unboxed(&self, wrapper: &str) -> Option<&str> {
        self.unboxed.get(wrapper).map(String::as_str)
    }

    /// True when the two names are the same type or a primitive/wrapper pair.
    pub fn equivalent(&self, a: &str, b: &str) -> bool {
        a == b || self.boxed(a) == Some(b) || self.unboxed(a) == Some(b)
    }
}
