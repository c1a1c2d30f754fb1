//! Request dispatcher: executes `create`, `method` and `sync` requests.
//!
//! Arguments arrive as vectors, one per parameter position. A call addressed
//! to `T` targets with argument vectors of longest length `P` runs
//! `max(T, P)` times; iteration `i` uses `targets[i]` when `T > 1` and
//! `args[j][i]` when parameter `j` has length `P`, falling back to element 0
//! otherwise. `T > 1` and `P > 1` must agree.

use crate::catalog::{
    CoercionTable, Introspect, MemberHandle, Resolver, TypeCatalog, TypeKind, Value,
};
use crate::codec::{ObjectReference, Reply, Request, Target, WireValue};
use crate::error::GatewayError;
use crate::registry::ObjectRegistry;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Seam between the worker pool and whatever executes requests.
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Execute one request. Failures are reported as `Reply::Fault`.
    async fn handle(&self, request: Request) -> Reply;
}

/// Executes requests against a type catalog and an object registry.
#[derive(Clone)]
pub struct Dispatcher {
    catalog: Arc<TypeCatalog>,
    coercion: Arc<CoercionTable>,
    registry: Arc<ObjectRegistry>,
}

impl Dispatcher {
    pub fn new(catalog: TypeCatalog) -> Self {
        Self::with_parts(
            Arc::new(catalog),
            Arc::new(CoercionTable::default()),
            Arc::new(ObjectRegistry::new()),
        )
    }

    pub fn with_parts(
        catalog: Arc<TypeCatalog>,
        coercion: Arc<CoercionTable>,
        registry: Arc<ObjectRegistry>,
    ) -> Self {
        Self {
            catalog,
            coercion,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<TypeCatalog> {
        &self.catalog
    }

    /// Execute a request synchronously.
    pub fn execute(&self, request: Request) -> Reply {
        let result = match request {
            Request::Create { type_name, args } => self.create(&type_name, &args),
            Request::Invoke {
                target,
                method,
                args,
            } => self.invoke(&target, &method, &args),
            Request::Reconcile(live) => Ok(self.reconcile(&live)),
            Request::Close => Ok(Reply::Closing),
        };
        result.unwrap_or_else(|e| {
            warn!("Request failed: {}", e);
            Reply::fault(&e)
        })
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.catalog, &self.coercion)
    }

    fn create(&self, type_name: &str, args: &[Vec<WireValue>]) -> Result<Reply> {
        let descriptor = self
            .catalog
            .describe(type_name)
            .ok_or_else(|| GatewayError::UnknownType(type_name.to_string()))?;
        let iterations = vector_plan(1, args)?;
        let resolver = self.resolver();
        let mut results = Vec::with_capacity(iterations);

        for i in 0..iterations {
            let values = self.iteration_args(args, i)?;

            if descriptor.kind() == TypeKind::Enum && values.len() == 1 {
                if let Value::Text(constant) = &values[0] {
                    let obj = descriptor.constant(constant).ok_or_else(|| {
                        GatewayError::NoMatchingMethod {
                            type_name: type_name.to_string(),
                            member: format!("constant {}", constant),
                            arg_types: String::new(),
                        }
                    })?;
                    results.push(self.to_wire(Value::Object(obj.clone())));
                    continue;
                }
            }

            let arg_types = type_names(&values);
            let handle = resolver.find_constructor(type_name, &arg_types)?;
            let created = resolver.invoke(&handle, None, &values)?;
            results.push(self.to_wire(created));
        }

        debug!("Created {} instance(s) of {}", results.len(), type_name);
        Ok(Reply::from_results(results))
    }

    fn invoke(&self, target: &Target, method: &str, args: &[Vec<WireValue>]) -> Result<Reply> {
        let (targets, static_type) = match target {
            Target::References(refs) if !refs.is_empty() => (refs.as_slice(), None),
            Target::References(_) => return Err(GatewayError::malformed("no target reference")),
            Target::Type(name) => (&[][..], Some(name.as_str())),
        };
        let iterations = vector_plan(targets.len().max(1), args)?;
        let resolver = self.resolver();
        let mut cache: HashMap<(String, Vec<String>), MemberHandle> = HashMap::new();
        let mut results = Vec::with_capacity(iterations);

        for i in 0..iterations {
            let receiver = match targets.len() {
                0 => None,
                1 => Some(self.registry.get(targets[0])?),
                _ => Some(self.registry.get(targets[i])?),
            };
            let values = self.iteration_args(args, i)?;
            let arg_types = type_names(&values);
            let owner = receiver
                .as_ref()
                .map(|obj| obj.type_name().to_string())
                .or_else(|| static_type.map(String::from))
                .ok_or_else(|| GatewayError::malformed("no target"))?;

            let key = (
                owner.clone(),
                arg_types.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            );
            let handle = match cache.get(&key) {
                Some(handle) => handle.clone(),
                None => {
                    let handle =
                        resolver.find_method(&owner, method, &arg_types, receiver.is_none())?;
                    cache.insert(key, handle.clone());
                    handle
                }
            };

            let result = resolver.invoke(&handle, receiver.as_ref(), &values)?;
            results.push(self.to_wire(result));
        }

        Ok(Reply::from_results(results))
    }

    fn reconcile(&self, live: &[ObjectReference]) -> Reply {
        let removed = self.registry.reconcile(live);
        info!(
            "Registry reconciled: {} kept, {} removed, {} live",
            live.len(),
            removed,
            self.registry.len()
        );
        Reply::Ack
    }

    /// Decode the arguments of iteration `i`, resolving references.
    fn iteration_args(&self, args: &[Vec<WireValue>], i: usize) -> Result<Vec<Value>> {
        let longest = args.iter().map(Vec::len).max().unwrap_or(0);
        args.iter()
            .map(|vector| {
                let wire = if vector.len() > 1 && vector.len() == longest {
                    vector.get(i)
                } else {
                    vector.first()
                };
                wire.ok_or_else(|| GatewayError::malformed("empty argument vector"))
                    .and_then(|wire| self.from_wire(wire))
            })
            .collect()
    }

    fn from_wire(&self, wire: &WireValue) -> Result<Value> {
        Ok(match wire {
            WireValue::Integer(v) => Value::Int(*v),
            WireValue::Float(v) => Value::Float(*v),
            WireValue::Text(v) => Value::Text(v.clone()),
            WireValue::Boolean(v) => Value::Bool(*v),
            WireValue::Reference(r) => Value::Object(self.registry.get(*r)?),
        })
    }

    /// Encode a result, registering objects. `None` marks a void result.
    fn to_wire(&self, value: Value) -> Option<WireValue> {
        Some(match value {
            Value::Int(v) => WireValue::Integer(v),
            Value::Float(v) => WireValue::Float(v),
            Value::Bool(v) => WireValue::Boolean(v),
            Value::Text(v) => WireValue::Text(v),
            Value::Object(obj) => WireValue::Reference(self.registry.put(&obj)),
            Value::Unit => return None,
        })
    }
}

#[async_trait::async_trait]
impl RequestHandler for Dispatcher {
    async fn handle(&self, request: Request) -> Reply {
        let dispatcher = self.clone();
        match tokio::task::spawn_blocking(move || dispatcher.execute(request)).await {
            Ok(reply) => reply,
            Err(e) => {
                let err = GatewayError::InvocationFault {
                    member: "request".to_string(),
                    message: if e.is_panic() {
                        "invocation panicked".to_string()
                    } else {
                        e.to_string()
                    },
                };
                warn!("{}", err);
                Reply::fault(&err)
            }
        }
    }
}

/// Number of iterations for `targets` receivers and the given argument
/// vectors.
fn vector_plan(targets: usize, args: &[Vec<WireValue>]) -> Result<usize> {
    let params = args.iter().map(Vec::len).max().unwrap_or(1).max(1);
    if targets > 1 && params > 1 && targets != params {
        return Err(GatewayError::AmbiguousVectorLengths { targets, params });
    }
    Ok(targets.max(params))
}

fn type_names(values: &[Value]) -> Vec<&str> {
    values.iter().map(Value::type_name).collect()
}
