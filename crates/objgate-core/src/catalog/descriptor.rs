//! Type descriptors and the typed builder used to register them.

use super::value::{HostObject, Value};
use crate::error::InvocationError;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Callable body of a constructor or method. Instance methods receive the
/// receiver already viewed as their owning type.
pub type MemberFn =
    Arc<dyn Fn(Option<&dyn Any>, &[Value]) -> Result<Value, InvocationError> + Send + Sync>;

/// Borrows a subclass value as the value of its direct superclass.
pub type UpcastFn = Arc<dyn for<'o> Fn(&'o dyn Any) -> Option<&'o dyn Any> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Constructor,
    Method,
    Static,
}

/// A resolvable constructor or method.
#[derive(Clone)]
pub struct MemberHandle {
    owner: Arc<str>,
    name: String,
    params: Vec<String>,
    kind: MemberKind,
    call: MemberFn,
}

impl MemberHandle {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == MemberKind::Static
    }

    /// Human-readable signature, e.g. `demo.Accumulator.add(double)`.
    pub fn signature(&self) -> String {
        format!("{}.{}({})", self.owner, self.name, self.params.join(", "))
    }

    pub(crate) fn call(
        &self,
        target: Option<&dyn Any>,
        args: &[Value],
    ) -> Result<Value, InvocationError> {
        (self.call)(target, args)
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("constructors", &self.constructors)
            .field("methods", &self.methods)
            .field("constants", &self.constants)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MemberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberHandle({:?} {})", self.kind, self.signature())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Enum,
    Interface,
    Primitive,
}

/// Everything the dispatcher knows about one registered type.
#[derive(Clone)]
pub struct TypeDescriptor {
    name: Arc<str>,
    kind: TypeKind,
    superclass: Option<String>,
    upcast: Option<UpcastFn>,
    interfaces: Vec<String>,
    constructors: Vec<MemberHandle>,
    methods: Vec<MemberHandle>,
    constants: Vec<(String, HostObject)>,
}

impl TypeDescriptor {
    pub(crate) fn bare(name: &str, kind: TypeKind, superclass: Option<&str>) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            superclass: superclass.map(String::from),
            upcast: None,
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn interface(name: &str) -> Self {
        Self::bare(name, TypeKind::Interface, None)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    /// View of an instance as its superclass, when one was registered.
    pub fn upcast(&self) -> Option<&UpcastFn> {
        self.upcast.as_ref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn constructors(&self) -> &[MemberHandle] {
        &self.constructors
    }

    /// Methods in registration order.
    pub fn methods(&self) -> &[MemberHandle] {
        &self.methods
    }

    /// Enumerated constant by name.
    pub fn constant(&self, name: &str) -> Option<&HostObject> {
        self.constants
            .iter()
            .find(|(constant, _)| constant == name)
            .map(|(_, obj)| obj)
    }

    pub(crate) fn add_interface(&mut self, iface: &str) {
        self.interfaces.push(iface.to_string());
    }
}

/// Builds a [`TypeDescriptor`] whose members operate on a Rust type `T`.
///
/// ```rust,ignore
/// let descriptor = TypeBuilder::<Accumulator>::class("demo.Accumulator")
///     .constructor(&["double", "double"], |args| {
///         Ok(Accumulator::new(args[0].as_f64(0)? + args[1].as_f64(1)?))
///     })
///     .method("add", &["double"], |acc, args| Ok(Value::Float(acc.total() + args[0].as_f64(0)?)))
///     .build();
/// ```
pub struct TypeBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeBuilder<T> {
    /// A class extending `Object` until told otherwise.
    pub fn class(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    /// An enumerated type; instances come from [`TypeBuilder::constant`].
    pub fn enumeration(name: &str) -> Self {
        Self::with_kind(name, TypeKind::Enum)
    }

    fn with_kind(name: &str, kind: TypeKind) -> Self {
        Self {
            descriptor: TypeDescriptor::bare(name, kind, Some("Object")),
            _marker: PhantomData,
        }
    }

    /// Set the superclass for argument scoring. Instance methods of `parent`
    /// are found on this type but cannot run on its instances; use
    /// [`TypeBuilder::extends_via`] for that.
    pub fn extends(mut self, parent: &str) -> Self {
        self.descriptor.superclass = Some(parent.to_string());
        self
    }

    /// Set the superclass and how to borrow the parent's value out of `T`,
    /// so inherited instance methods run on instances of this type.
    pub fn extends_via<P: Any>(mut self, parent: &str, view: fn(&T) -> &P) -> Self {
        self.descriptor.superclass = Some(parent.to_string());
        self.descriptor.upcast = Some(upcast_fn(move |value| {
            value.downcast_ref::<T>().map(|this| view(this) as &dyn Any)
        }));
        self
    }

    pub fn implements(mut self, iface: &str) -> Self {
        self.descriptor.add_interface(iface);
        self
    }

    pub fn constructor<F>(mut self, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<T, InvocationError> + Send + Sync + 'static,
    {
        let owner = self.descriptor.name.clone();
        let type_name = owner.clone();
        let call: MemberFn = Arc::new(move |_, args| {
            body(args).map(|value| Value::Object(HostObject::new(type_name.clone(), value)))
        });
        self.descriptor.constructors.push(MemberHandle {
            name: owner.to_string(),
            owner,
            params: to_owned(params),
            kind: MemberKind::Constructor,
            call,
        });
        self
    }

    pub fn method<F>(mut self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&T, &[Value]) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        let owner = self.descriptor.name.clone();
        let expected = owner.to_string();
        let call: MemberFn = Arc::new(move |target, args| {
            let this = target
                .and_then(|value| value.downcast_ref::<T>())
                .ok_or_else(|| InvocationError::Receiver {
                    expected: expected.clone(),
                })?;
            body(this, args)
        });
        self.descriptor.methods.push(MemberHandle {
            owner,
            name: name.to_string(),
            params: to_owned(params),
            kind: MemberKind::Method,
            call,
        });
        self
    }

    pub fn static_method<F>(mut self, name: &str, params: &[&str], body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        let call: MemberFn = Arc::new(move |_, args| body(args));
        self.descriptor.methods.push(MemberHandle {
            owner: self.descriptor.name.clone(),
            name: name.to_string(),
            params: to_owned(params),
            kind: MemberKind::Static,
            call,
        });
        self
    }

    /// Add a named constant. Each constant is created once, so every lookup
    /// yields the same identity.
    pub fn constant(mut self, name: &str, value: T) -> Self {
        let obj = HostObject::new(self.descriptor.name.clone(), value);
        self.descriptor.constants.push((name.to_string(), obj));
        self
    }

    pub fn build(self) -> TypeDescriptor {
        self.descriptor
    }
}

fn upcast_fn<F>(f: F) -> UpcastFn
where
    F: for<'o> Fn(&'o dyn Any) -> Option<&'o dyn Any> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn to_owned(params: &[&str]) -> Vec<String> {
    params.iter().map(|p| p.to_string()).collect()
}
