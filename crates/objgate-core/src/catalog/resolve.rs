//! Constructor and method resolution.
//!
//! An exact signature match always wins. Otherwise every candidate with the
//! requested name and arity is scored by summing per-parameter distances and
//! the lowest total is chosen; ties go to the earliest registered candidate.
//!
//! Per-parameter distance walks the argument type up its superclass chain:
//!
//! | match at this level                    | distance      |
//! |----------------------------------------|---------------|
//! | same type, or primitive/wrapper pair   | steps         |
//! | an interface implemented by the level  | steps + 0.5   |
//!
//! where `steps` counts the superclass hops taken so far. A primitive hops
//! straight to its wrapper's superclass.

use super::coercion::CoercionTable;
use super::descriptor::{MemberHandle, MemberKind, TypeKind};
use super::value::{HostObject, Value};
use super::TypeCatalog;
use crate::{GatewayError, Result};
use std::any::Any;

/// Guard against cyclic hierarchies registered by mistake.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Capability interface standing in for runtime reflection.
pub trait Introspect {
    fn find_constructor(&self, type_name: &str, arg_types: &[&str]) -> Result<MemberHandle>;

    /// Resolve a method. `static_only` restricts candidates to static methods
    /// (calls addressed to a type name rather than an object).
    fn find_method(
        &self,
        type_name: &str,
        name: &str,
        arg_types: &[&str],
        static_only: bool,
    ) -> Result<MemberHandle>;

    fn invoke(
        &self,
        handle: &MemberHandle,
        target: Option<&HostObject>,
        args: &[Value],
    ) -> Result<Value>;
}

/// Resolves members of a [`TypeCatalog`] under a given [`CoercionTable`].
pub struct Resolver<'a> {
    catalog: &'a TypeCatalog,
    coercion: &'a CoercionTable,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a TypeCatalog, coercion: &'a CoercionTable) -> Self {
        Self { catalog, coercion }
    }

    /// Distance from an argument type to a declared parameter type, or `None`
    /// when the argument cannot be passed there.
    pub fn parameter_distance(&self, arg: &str, declared: &str) -> Option<f64> {
        let mut current = Some(arg);
        let mut steps = 0.0;

        for _ in 0..MAX_HIERARCHY_DEPTH {
            let ty = current?;
            if self.coercion.equivalent(ty, declared) {
                return Some(steps);
            }
            if self.implements(ty, declared) {
                return Some(steps + 0.5);
            }
            current = self.superclass_of(ty);
            steps += 1.0;
        }
        None
    }

    /// Total distance of a candidate, or `None` if any position fails.
    pub fn score(&self, params: &[String], arg_types: &[&str]) -> Option<f64> {
        if params.len() != arg_types.len() {
            return None;
        }
        params
            .iter()
            .zip(arg_types)
            .map(|(declared, arg)| self.parameter_distance(arg, declared))
            .sum()
    }

    fn superclass_of(&self, ty: &str) -> Option<&'a str> {
        let own = self.coercion.boxed(ty).unwrap_or(ty);
        match self.catalog.describe(own) {
            Some(descriptor) => descriptor.superclass(),
            // Unregistered object types still descend from Object.
            None if own != "Object" && !self.coercion.is_primitive(own) => Some("Object"),
            None => None,
        }
    }

    fn implements(&self, ty: &str, iface: &str) -> bool {
        let own = self.coercion.boxed(ty).unwrap_or(ty);
        self.catalog
            .describe(own)
            .is_some_and(|d| d.interfaces().iter().any(|i| i == iface))
    }

    fn select<'m>(
        &self,
        candidates: impl Iterator<Item = &'m MemberHandle> + Clone,
        arg_types: &[&str],
    ) -> Option<&'m MemberHandle> {
        let exact = candidates.clone().find(|m| same_signature(m, arg_types));
        if exact.is_some() || arg_types.is_empty() {
            return exact;
        }

        let mut best: Option<(&MemberHandle, f64)> = None;
        for candidate in candidates {
            if let Some(score) = self.score(candidate.params(), arg_types) {
                if best.map_or(true, |(_, best_score)| score < best_score) {
                    best = Some((candidate, score));
                }
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// `obj` borrowed as an instance of `owner`, following registered
    /// upcasts from its own type towards `owner`.
    fn receiver_view<'o>(&self, owner: &str, obj: &'o HostObject) -> Option<&'o dyn Any> {
        let mut ty = obj.type_name();
        let mut view = obj.as_any();
        for _ in 0..MAX_HIERARCHY_DEPTH {
            if ty == owner {
                return Some(view);
            }
            let descriptor = self.catalog.describe(ty)?;
            view = (descriptor.upcast()?)(view)?;
            ty = descriptor.superclass()?;
        }
        None
    }
}

fn same_signature(member: &MemberHandle, arg_types: &[&str]) -> bool {
    member
        .params()
        .iter()
        .map(String::as_str)
        .eq(arg_types.iter().copied())
}

fn no_match(type_name: &str, member: &str, arg_types: &[&str]) -> GatewayError {
    GatewayError::NoMatchingMethod {
        type_name: type_name.to_string(),
        member: member.to_string(),
        arg_types: arg_types.join(", "),
    }
}

impl Introspect for Resolver<'_> {
    fn find_constructor(&self, type_name: &str, arg_types: &[&str]) -> Result<MemberHandle> {
        let descriptor = self
            .catalog
            .describe(type_name)
            .ok_or_else(|| GatewayError::UnknownType(type_name.to_string()))?;
        if descriptor.kind() == TypeKind::Interface {
            return Err(no_match(type_name, "constructor", arg_types));
        }
        // Constructors need an exact signature; only methods are scored.
        descriptor
            .constructors()
            .iter()
            .find(|c| same_signature(c, arg_types))
            .cloned()
            .ok_or_else(|| no_match(type_name, "constructor", arg_types))
    }

    fn find_method(
        &self,
        type_name: &str,
        name: &str,
        arg_types: &[&str],
        static_only: bool,
    ) -> Result<MemberHandle> {
        let descriptor = self
            .catalog
            .describe(type_name)
            .ok_or_else(|| GatewayError::UnknownType(type_name.to_string()))?;

        // Own methods first, then each superclass in turn.
        let mut candidates = Vec::new();
        let mut level = Some(descriptor);
        for _ in 0..MAX_HIERARCHY_DEPTH {
            let Some(current) = level else { break };
            candidates.extend(
                current
                    .methods()
                    .iter()
                    .filter(|m| m.name() == name)
                    .filter(|m| !static_only || m.kind() == MemberKind::Static),
            );
            level = current
                .superclass()
                .and_then(|parent| self.catalog.describe(parent));
        }
        self.select(candidates.into_iter(), arg_types)
            .cloned()
            .ok_or_else(|| no_match(type_name, name, arg_types))
    }

    fn invoke(
        &self,
        handle: &MemberHandle,
        target: Option<&HostObject>,
        args: &[Value],
    ) -> Result<Value> {
        let receiver = match target {
            Some(obj) if !handle.is_static() => self.receiver_view(handle.owner(), obj),
            _ => None,
        };
        handle
            .call(receiver, args)
            .map_err(|e| GatewayError::InvocationFault {
                member: handle.signature(),
                message: e.to_string(),
            })
    }
}
