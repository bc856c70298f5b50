//! Test doubles for the RPC bridge
//!
//! Minimal stand-ins that let call-handling code (error propagation, field
//! resolution) be exercised without a running runtime:
//!
//! - [`error_only_value_factory`]: a factory that can only build errors, so a
//!   test proves the code under test never needs records, objects or types.
//! - [`mock_object`]: a bridged object built from an optional field map whose
//!   methods all answer `Null`.
//! - [`ThreadScheduler`]: runs each started call on its own thread.
//! - [`CallRecorder`]: method table that records every invocation.

#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use rpc_bridge::{
    BridgeError, BridgeResult, BridgeType, BridgeValue, BridgedObject, CompletionHandle,
    ErrorValue, FieldMap, Job, MapRef, MethodTable, ModuleId, NativeDataStore, ObjectRef,
    ObjectType, Scheduler, Strand, ValueFactory,
};

/// Type name given to mock objects
pub const MOCK_OBJECT_TYPE: &str = "testObjectType";

/// Module identity used by the doubles
pub fn test_module() -> ModuleId {
    ModuleId::new("ballerina", "grpc", "1.0.0")
}

// ============================================================================
// ErrorOnlyValueFactory
// ============================================================================

/// Factory whose only working capability is error construction.
#[derive(Debug, Default, Clone, Copy)]
pub struct ErrorOnlyValueFactory;

impl ValueFactory for ErrorOnlyValueFactory {
    fn create_record(&self, _type_name: &str) -> BridgeResult<MapRef> {
        Err(BridgeError::Unsupported("record construction"))
    }

    fn create_object(
        &self,
        _type_name: &str,
        _strand: &Strand,
        _native_data: HashMap<String, BridgeValue>,
        _args: &[BridgeValue],
    ) -> BridgeResult<ObjectRef> {
        Err(BridgeError::Unsupported("object construction"))
    }

    fn create_error(
        &self,
        type_name: &str,
        message: &str,
        cause: Option<ErrorValue>,
        detail: Option<BridgeValue>,
    ) -> BridgeResult<ErrorValue> {
        Ok(ErrorValue::new(type_name, message, cause, detail))
    }

    fn anon_type(&self, _index: usize, _qualifier: &str) -> BridgeResult<BridgeType> {
        Err(BridgeError::Unsupported("anonymous type resolution"))
    }
}

/// Shared error-only factory, ready to put in a `Strand`
pub fn error_only_value_factory() -> Arc<dyn ValueFactory> {
    Arc::new(ErrorOnlyValueFactory)
}

/// Inline strand backed by the error-only factory
pub fn error_only_strand() -> Strand {
    Strand::inline(error_only_value_factory())
}

// ============================================================================
// MockObject
// ============================================================================

/// Bridged object with native data and an optional schema, and no behavior.
///
/// Field reads come from native data only; `set` is accepted and dropped;
/// every method call answers `Null`. The descriptor is built on the first
/// `get_type` and reused afterwards.
pub struct MockObject {
    fields: Option<FieldMap>,
    descriptor: OnceCell<Option<Arc<ObjectType>>>,
    native_data: NativeDataStore,
}

/// Build a mock bridged object. `None` (or an empty map) yields an untyped
/// object whose `get_type` is `None`.
pub fn mock_object(fields: Option<FieldMap>) -> Arc<MockObject> {
    Arc::new(MockObject {
        fields,
        descriptor: OnceCell::new(),
        native_data: NativeDataStore::new(),
    })
}

impl BridgedObject for MockObject {
    fn get_type(&self) -> Option<Arc<ObjectType>> {
        self.descriptor
            .get_or_init(|| {
                ObjectType::build(MOCK_OBJECT_TYPE, &test_module(), self.fields.as_ref())
            })
            .clone()
    }

    fn lookup(&self, field: &str) -> Option<BridgeValue> {
        self.native_data.get(field)
    }

    fn set(&self, _field: &str, _value: BridgeValue) -> BridgeResult<()> {
        Ok(())
    }

    fn native_data(&self) -> &NativeDataStore {
        &self.native_data
    }

    fn call(
        &self,
        _strand: &Strand,
        _name: &str,
        _args: &[BridgeValue],
    ) -> BridgeResult<BridgeValue> {
        Ok(BridgeValue::Null)
    }

    fn start(
        self: Arc<Self>,
        strand: &Strand,
        name: &str,
        _args: Vec<BridgeValue>,
    ) -> CompletionHandle {
        CompletionHandle::ready(strand.id(), name, Ok(BridgeValue::Null))
    }
}

// ============================================================================
// ThreadScheduler
// ============================================================================

/// Runs every job on a fresh thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn schedule(&self, job: Job) {
        std::thread::spawn(job);
    }
}

/// Strand whose started calls each run on their own thread
pub fn threaded_strand(factory: Arc<dyn ValueFactory>) -> Strand {
    Strand::new(factory, Arc::new(ThreadScheduler))
}

// ============================================================================
// CallRecorder
// ============================================================================

/// A recorded invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Strand the call ran on
    pub strand_id: u64,
    /// Method name
    pub method: String,
    /// Arguments
    pub args: Vec<BridgeValue>,
}

/// Records every call routed through its method table
#[derive(Debug, Default, Clone)]
pub struct CallRecorder {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl CallRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Method table that records each call, then answers with `reply`
    pub fn methods(&self, reply: BridgeValue) -> MethodTable {
        let calls = Arc::clone(&self.calls);
        MethodTable::new().with_fallback(move |ctx, args| {
            tracing::trace!(method = ctx.method(), "recorded call");
            calls.lock().push(RecordedCall {
                strand_id: ctx.strand().id(),
                method: ctx.method().to_string(),
                args: args.to_vec(),
            });
            Ok(reply.clone())
        })
    }

    /// Calls recorded so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of recorded calls
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Check if nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }
}
