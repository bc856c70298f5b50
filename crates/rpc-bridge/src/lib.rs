//! RPC Bridge - native object bridge for the RPC runtime
//!
//! Lets the runtime treat natively implemented objects as first-class values:
//! typed fields, mutable native state, method dispatch (blocking and
//! started), and structured errors with cause chains. Values the runtime does
//! not own the concrete type of are built through a [`ValueFactory`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rpc_bridge::*;
//!
//! let module = ModuleId::new("ballerina", "grpc", "1.0.0");
//! let factory = ModuleValueFactory::builder(module.clone()).build();
//! let strand = Strand::inline(Arc::new(factory));
//!
//! let obj = NativeObject::builder("Caller", module)
//!     .fields(Some(field_map([FieldDescriptor::new("name", FieldKind::String)])))
//!     .methods(Arc::new(MethodTable::new().with("ping", |_, _| Ok("pong".into()))))
//!     .build();
//!
//! obj.add_native_data("name", "svc".into());
//! assert_eq!(obj.get_string("name")?, "svc");
//! assert_eq!(obj.call(&strand, "ping", &[])?, BridgeValue::from("pong"));
//! ```
//!
//! # Logging
//!
//! Diagnostics go through `tracing`; the crate never installs a subscriber.

#![warn(missing_docs)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod error_value;
pub mod factory;
pub mod native_data;
pub mod object;
pub mod types;
pub mod value;

pub use config::{BridgeConfig, FieldAccessConfig, MismatchPolicy};
pub use dispatch::{
    CallContext, CompletionHandle, InlineScheduler, Job, MethodHandler, MethodTable, Scheduler,
    Strand,
};
pub use error::{BridgeError, BridgeResult};
pub use error_value::{make_error, Causes, ErrorValue, DEFAULT_ERROR_TYPE};
pub use factory::{ModuleValueFactory, ModuleValueFactoryBuilder, ValueFactory, INIT_METHOD};
pub use native_data::NativeDataStore;
pub use object::{BridgedObject, NativeObject, NativeObjectBuilder};
pub use types::{
    field_map, BridgeType, DescriptorCache, FieldDescriptor, FieldFlags, FieldMap, ModuleId,
    ObjectType, RecordType,
};
pub use value::{
    ArrayRef, ArrayValue, BridgeValue, FieldKind, MapRef, MapValue, NativeHandle, ObjectRef,
};
