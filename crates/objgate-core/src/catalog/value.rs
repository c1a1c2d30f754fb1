//! Runtime values passed to and returned from registered members.

use crate::error::InvocationError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A live object created or returned through the gateway.
///
/// Clones share the same allocation and therefore the same identity.
#[derive(Clone)]
pub struct HostObject {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(type_name: impl Into<Arc<str>>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The wrapped value, for handing to member bodies.
    pub fn as_any(&self) -> &dyn Any {
        &*self.inner
    }

    /// Address of the shared allocation.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }

    pub fn same_identity(&self, other: &HostObject) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({}@{:#x})", self.type_name, self.identity())
    }
}

/// Argument or result of an invocation.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i32),
    Float(f64),
    Bool(bool),
    Text(String),
    Object(HostObject),
    /// Result of a member with no return value.
    Unit,
}

impl Value {
    /// Runtime type name used for signature matching.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "double",
            Value::Bool(_) => "boolean",
            Value::Text(_) => "String",
            Value::Object(obj) => obj.type_name(),
            Value::Unit => "void",
        }
    }

    pub fn as_i32(&self, index: usize) -> Result<i32, InvocationError> {
        match self {
            Value::Int(v) => Ok(*v),
            other => Err(other.mismatch(index, "int")),
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self, index: usize) -> Result<f64, InvocationError> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(f64::from(*v)),
            other => Err(other.mismatch(index, "double")),
        }
    }

    pub fn as_bool(&self, index: usize) -> Result<bool, InvocationError> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => Err(other.mismatch(index, "boolean")),
        }
    }

    pub fn as_str(&self, index: usize) -> Result<&str, InvocationError> {
        match self {
            Value::Text(v) => Ok(v),
            other => Err(other.mismatch(index, "String")),
        }
    }

    pub fn as_object(&self, index: usize) -> Result<&HostObject, InvocationError> {
        match self {
            Value::Object(obj) => Ok(obj),
            other => Err(other.mismatch(index, "object")),
        }
    }

    /// Borrow the Rust value behind an object argument.
    pub fn downcast<T: Any>(&self, index: usize) -> Result<&T, InvocationError> {
        let obj = self.as_object(index)?;
        obj.downcast_ref::<T>().ok_or_else(|| InvocationError::ArgumentType {
            index,
            expected: std::any::type_name::<T>().to_string(),
            actual: obj.type_name().to_string(),
        })
    }

    fn mismatch(&self, index: usize, expected: &str) -> InvocationError {
        InvocationError::ArgumentType {
            index,
            expected: expected.to_string(),
            actual: self.type_name().to_string(),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<HostObject> for Value {
    fn from(v: HostObject) -> Self {
        Value::Object(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_identity() {
        let a = HostObject::new("demo.Thing", 5_u8);
        let b = a.clone();
        let c = HostObject::new("demo.Thing", 5_u8);

        assert!(a.same_identity(&b));
        assert!(!a.same_identity(&c));
    }

    #[test]
    fn test_accessors_report_mismatch() {
        assert_eq!(Value::Int(3).as_f64(0).unwrap(), 3.0);
        let err = Value::Text("x".into()).as_i32(1).unwrap_err();
        assert_eq!(
            err,
            InvocationError::ArgumentType {
                index: 1,
                expected: "int".to_string(),
                actual: "String".to_string(),
            }
        );
    }

    #[test]
    fn test_downcast_object_argument() {
        let value = Value::Object(HostObject::new("demo.Counter", 7_i64));
        assert_eq!(*value.downcast::<i64>(0).unwrap(), 7);
        assert!(value.downcast::<String>(0).is_err());
    }
}
