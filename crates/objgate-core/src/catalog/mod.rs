//! Registered type catalog.
//!
//! Rust has no runtime reflection, so every type the gateway can create or
//! call into is described up front: its constructors, methods, superclass and
//! interfaces. The catalog is built once at startup and is read-only while
//! the server runs.
//!
//! # Architecture
//!
//! - **Value**: runtime values and the [`HostObject`] handle
//! - **Descriptor**: [`TypeDescriptor`] and the typed [`TypeBuilder`]
//! - **Coercion**: primitive/wrapper equivalence
//! - **Resolve**: exact and distance-scored member resolution

pub mod coercion;
pub mod descriptor;
pub mod resolve;
pub mod value;

pub use coercion::CoercionTable;
pub use descriptor::{MemberHandle, MemberKind, TypeBuilder, TypeDescriptor, TypeKind};
pub use resolve::{Introspect, Resolver};
pub use value::{HostObject, Value};

use crate::{GatewayError, Result};
use std::collections::HashMap;

/// Lookup table of registered types, keyed by name.
#[derive(Debug, Default)]
pub struct TypeCatalog {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// A catalog preloaded with the core type hierarchy:
    ///
    /// ```text
    /// Object ─┬─ Number ─┬─ Integer   (Comparable)
    ///         │          └─ Double    (Comparable)
    ///         ├─ Boolean              (Comparable)
    ///         └─ String               (Comparable, CharSequence)
    /// int, double, boolean            primitives
    /// ```
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.insert(TypeDescriptor::bare("Object", TypeKind::Class, None));
        catalog.insert(TypeDescriptor::bare("Number", TypeKind::Class, Some("Object")));
        for (name, parent, interfaces) in [
            ("Integer", "Number", &["Comparable"][..]),
            ("Double", "Number", &["Comparable"][..]),
            ("Boolean", "Object", &["Comparable"][..]),
            ("String", "Object", &["Comparable", "CharSequence"][..]),
        ] {
            let mut descriptor = TypeDescriptor::bare(name, TypeKind::Class, Some(parent));
            for iface in interfaces {
                descriptor.add_interface(iface);
            }
            catalog.insert(descriptor);
        }
        for iface in ["Comparable", "CharSequence"] {
            catalog.insert(TypeDescriptor::interface(iface));
        }
        for primitive in ["int", "double", "boolean"] {
            catalog.insert(TypeDescriptor::bare(primitive, TypeKind::Primitive, None));
        }
        catalog
    }

    fn insert(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name().to_string(), descriptor);
    }

    /// Register a type. Names must be unique.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<()> {
        if self.types.contains_key(descriptor.name()) {
            return Err(GatewayError::Config {
                field: "type".to_string(),
                message: format!("{} is already registered", descriptor.name()),
            });
        }
        self.insert(descriptor);
        Ok(())
    }

    pub fn describe(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_hierarchy() {
        let catalog = TypeCatalog::with_builtins();
        assert_eq!(catalog.describe("Integer").unwrap().superclass(), Some("Number"));
        assert_eq!(catalog.describe("Number").unwrap().superclass(), Some("Object"));
        assert_eq!(catalog.describe("Object").unwrap().superclass(), None);
        assert_eq!(
            catalog.describe("String").unwrap().interfaces(),
            &["Comparable".to_string(), "CharSequence".to_string()]
        );
        assert_eq!(catalog.describe("int").unwrap().kind(), TypeKind::Primitive);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut catalog = TypeCatalog::with_builtins();
        let before = catalog.len();
        catalog
            .register(TypeBuilder::<u8>::class("demo.Byte").build())
            .unwrap();
        assert!(catalog
            .register(TypeBuilder::<u8>::class("demo.Byte").build())
            .is_err());
        assert!(catalog
            .register(TypeBuilder::<u8>::class("String").build())
            .is_err());
        assert_eq!(catalog.len(), before + 1);
        assert!(catalog.type_names().contains(&"demo.Byte"));
    }
}
