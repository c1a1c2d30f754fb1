//! Objgate Core - line-oriented TCP gateway to registered host objects.
//!
//! A client creates objects by type name, calls methods on them through
//! opaque references, and tells the server which references it still holds.
//! Types are described up front in a [`TypeCatalog`]; calls are resolved by
//! exact signature or, failing that, by the lowest argument distance.
//!
//! # Example
//!
//! ```rust,ignore
//! use objgate_core::{
//!     Dispatcher, GatewayClient, GatewayServer, ServerConfig, TypeBuilder, TypeCatalog, Value,
//! };
//! use std::sync::Arc;
//!
//! struct Meter(f64);
//!
//! #[tokio::main]
//! async fn main() -> objgate_core::Result<()> {
//!     let mut catalog = TypeCatalog::with_builtins();
//!     catalog.register(
//!         TypeBuilder::<Meter>::class("demo.Meter")
//!             .constructor(&["double"], |args| Ok(Meter(args[0].as_f64(0)?)))
//!             .method("plus", &["double"], |m, args| Ok(Value::Float(m.0 + args[0].as_f64(0)?)))
//!             .build(),
//!     )?;
//!
//!     let config = ServerConfig::new(0, 2, 10)?;
//!     let server = GatewayServer::start(&config, Arc::new(Dispatcher::new(catalog))).await?;
//!
//!     let client = GatewayClient::connect(server.addr(), std::time::Duration::from_secs(5)).await?;
//!     let reply = client.send_line("create;demo.Meter;numeric2.0").await?;
//!     println!("{}", reply.encode());
//!
//!     client.close().await;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod client;
pub mod codec;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod retry;
pub mod server;

// Re-export commonly used types
pub use catalog::{
    CoercionTable, HostObject, Introspect, MemberHandle, Resolver, TypeBuilder, TypeCatalog,
    TypeDescriptor, TypeKind, Value,
};
pub use client::GatewayClient;
pub use codec::{FaultKind, ObjectReference, Reply, Request, Target, WireValue};
pub use config::{ClientConfig, GatewayConfig, ServerConfig};
pub use dispatch::{Dispatcher, RequestHandler};
pub use error::{GatewayError, InvocationError, Result};
pub use registry::ObjectRegistry;
pub use retry::RetryConfig;
pub use server::{GatewayServer, GatewayServerHandle};
