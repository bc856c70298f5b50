//! Call dispatch - forwarding invocations on bridged objects to native logic
//!
//! `call` runs a handler to completion on the calling thread. `start` hands
//! the handler to the strand's `Scheduler` and returns a `CompletionHandle`
//! right away. Both forward handler failures unchanged; nothing is retried.
//!
//! The bridge never creates threads itself. Whoever supplies the scheduler
//! decides where and when started calls run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, TryRecvError};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{BridgeError, BridgeResult};
use crate::error_value::ErrorValue;
use crate::factory::ValueFactory;
use crate::object::BridgedObject;
use crate::value::{BridgeValue, ObjectRef};

// ============================================================================
// Scheduler
// ============================================================================

/// Unit of work handed to a scheduler
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Host-supplied executor for started calls.
///
/// Dropping a job without running it is allowed; the matching completion
/// handle then resolves to `BridgeError::Abandoned`.
pub trait Scheduler: Send + Sync {
    /// Run `job` at some point
    fn schedule(&self, job: Job);
}

/// Runs every job immediately on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineScheduler;

impl Scheduler for InlineScheduler {
    fn schedule(&self, job: Job) {
        job()
    }
}

// ============================================================================
// Strand
// ============================================================================

static NEXT_STRAND_ID: AtomicU64 = AtomicU64::new(1);

/// Execution context passed to every call: where started work runs and
/// which factory native logic uses to build values.
#[derive(Clone)]
pub struct Strand {
    id: u64,
    factory: Arc<dyn ValueFactory>,
    scheduler: Arc<dyn Scheduler>,
}

impl Strand {
    /// Create a strand with a fresh id
    pub fn new(factory: Arc<dyn ValueFactory>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            id: NEXT_STRAND_ID.fetch_add(1, Ordering::Relaxed),
            factory,
            scheduler,
        }
    }

    /// Strand whose started calls run inline
    pub fn inline(factory: Arc<dyn ValueFactory>) -> Self {
        Self::new(factory, Arc::new(InlineScheduler))
    }

    /// Strand id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Value factory
    pub fn factory(&self) -> &dyn ValueFactory {
        self.factory.as_ref()
    }

    /// Shared value factory handle
    pub fn factory_arc(&self) -> Arc<dyn ValueFactory> {
        Arc::clone(&self.factory)
    }

    /// Scheduler
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }
}

impl std::fmt::Debug for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strand").field("id", &self.id).finish()
    }
}

// ============================================================================
// CallContext
// ============================================================================

/// What a method handler sees of the call it is serving
pub struct CallContext<'a> {
    strand: &'a Strand,
    receiver: &'a dyn BridgedObject,
    method: &'a str,
}

impl<'a> CallContext<'a> {
    /// Strand the call runs on
    pub fn strand(&self) -> &'a Strand {
        self.strand
    }

    /// Object the method was invoked on
    pub fn receiver(&self) -> &'a dyn BridgedObject {
        self.receiver
    }

    /// Invoked method name
    pub fn method(&self) -> &'a str {
        self.method
    }

    /// Build an application error through the strand's factory.
    ///
    /// If the factory itself cannot build the error, that failure is
    /// returned instead.
    pub fn raise(
        &self,
        type_name: &str,
        message: &str,
        cause: Option<ErrorValue>,
        detail: Option<BridgeValue>,
    ) -> BridgeError {
        match self
            .strand
            .factory()
            .create_error(type_name, message, cause, detail)
        {
            Ok(err) => BridgeError::Application(err),
            Err(failure) => failure,
        }
    }
}

// ============================================================================
// MethodTable
// ============================================================================

/// Native implementation of one method
pub type MethodHandler =
    Arc<dyn Fn(&CallContext<'_>, &[BridgeValue]) -> BridgeResult<BridgeValue> + Send + Sync>;

/// Methods of a bridged object type, indexed by name.
///
/// An optional fallback serves every name without its own handler.
#[derive(Clone, Default)]
pub struct MethodTable {
    handlers: HashMap<String, MethodHandler>,
    fallback: Option<MethodHandler>,
}

impl MethodTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that answers every call with `Null`
    pub fn noop() -> Self {
        Self::new().with_fallback(|_, _| Ok(BridgeValue::Null))
    }

    /// Register a method
    pub fn register(
        &mut self,
        name: &str,
        handler: impl Fn(&CallContext<'_>, &[BridgeValue]) -> BridgeResult<BridgeValue>
            + Send
            + Sync
            + 'static,
    ) {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Builder form of `register`
    pub fn with(
        mut self,
        name: &str,
        handler: impl Fn(&CallContext<'_>, &[BridgeValue]) -> BridgeResult<BridgeValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.register(name, handler);
        self
    }

    /// Set the fallback handler
    pub fn with_fallback(
        mut self,
        handler: impl Fn(&CallContext<'_>, &[BridgeValue]) -> BridgeResult<BridgeValue>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.fallback = Some(Arc::new(handler));
        self
    }

    /// Resolve a handler, falling back if configured
    pub fn get(&self, name: &str) -> Option<MethodHandler> {
        self.handlers
            .get(name)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Check if a method has its own handler (the fallback does not count)
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no methods are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered method names (unordered)
    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Run a method to completion
    pub fn invoke(
        &self,
        strand: &Strand,
        receiver: &dyn BridgedObject,
        name: &str,
        args: &[BridgeValue],
    ) -> BridgeResult<BridgeValue> {
        let handler = self
            .get(name)
            .ok_or_else(|| BridgeError::UnknownMethod(name.to_string()))?;
        tracing::debug!(strand = strand.id(), method = name, args = args.len(), "call");
        let ctx = CallContext {
            strand,
            receiver,
            method: name,
        };
        handler(&ctx, args)
    }

    /// Hand a method to the strand's scheduler and return immediately
    pub fn spawn(
        &self,
        strand: &Strand,
        receiver: ObjectRef,
        name: &str,
        args: Vec<BridgeValue>,
    ) -> CompletionHandle {
        let Some(handler) = self.get(name) else {
            return CompletionHandle::ready(
                strand.id(),
                name,
                Err(BridgeError::UnknownMethod(name.to_string())),
            );
        };

        let (tx, rx) = channel::bounded(1);
        let handle = CompletionHandle::pending(strand.id(), name, rx);
        let job_strand = strand.clone();
        let method = name.to_string();
        tracing::debug!(strand = strand.id(), method = name, args = args.len(), "start");

        strand.scheduler().schedule(Box::new(move || {
            let ctx = CallContext {
                strand: &job_strand,
                receiver: receiver.as_ref(),
                method: &method,
            };
            let outcome = handler(&ctx, &args);
            // Receiver may already be gone; nobody is waiting then.
            let _ = tx.send(outcome);
        }));

        handle
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.names())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

// ============================================================================
// CompletionHandle
// ============================================================================

/// Pending result of a started call.
///
/// The outcome is cached once observed, so it can be read any number of
/// times through `wait`, `wait_timeout` or `try_result`. The handle may be
/// shared between threads: the channel is only drained under `rx`'s lock,
/// and the outcome is stored before that lock is released.
pub struct CompletionHandle {
    strand_id: u64,
    method: String,
    rx: Mutex<Option<Receiver<BridgeResult<BridgeValue>>>>,
    outcome: OnceCell<BridgeResult<BridgeValue>>,
}

impl CompletionHandle {
    fn pending(strand_id: u64, method: &str, rx: Receiver<BridgeResult<BridgeValue>>) -> Self {
        Self {
            strand_id,
            method: method.to_string(),
            rx: Mutex::new(Some(rx)),
            outcome: OnceCell::new(),
        }
    }

    /// Handle that is already resolved
    pub fn ready(strand_id: u64, method: &str, outcome: BridgeResult<BridgeValue>) -> Self {
        Self {
            strand_id,
            method: method.to_string(),
            rx: Mutex::new(None),
            outcome: OnceCell::with_value(outcome),
        }
    }

    /// Id of the strand that started the call
    pub fn strand_id(&self) -> u64 {
        self.strand_id
    }

    /// Method being run
    pub fn method(&self) -> &str {
        &self.method
    }

    fn abandoned(&self) -> BridgeResult<BridgeValue> {
        tracing::warn!(
            strand = self.strand_id,
            method = %self.method,
            "started call abandoned by scheduler"
        );
        Err(BridgeError::Abandoned(self.method.clone()))
    }

    /// Record the outcome and drop the receiver. Caller holds the `rx` lock.
    fn settle(
        &self,
        rx: &mut Option<Receiver<BridgeResult<BridgeValue>>>,
        outcome: BridgeResult<BridgeValue>,
    ) -> BridgeResult<BridgeValue> {
        rx.take();
        self.outcome.get_or_init(|| outcome).clone()
    }

    /// Block until the call resolves
    pub fn wait(&self) -> BridgeResult<BridgeValue> {
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }
        let mut rx = self.rx.lock();
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }
        let outcome = match rx.as_ref().map(Receiver::recv) {
            Some(Ok(outcome)) => outcome,
            _ => self.abandoned(),
        };
        self.settle(&mut rx, outcome)
    }

    /// Block for at most `timeout`; `None` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<BridgeResult<BridgeValue>> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome.clone());
        }
        let deadline = Instant::now() + timeout;
        let Some(mut rx) = self.rx.try_lock_until(deadline) else {
            return self.outcome.get().cloned();
        };
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome.clone());
        }
        let outcome = match rx.as_ref().map(|rx| rx.recv_deadline(deadline)) {
            Some(Ok(outcome)) => outcome,
            Some(Err(RecvTimeoutError::Timeout)) => return None,
            Some(Err(RecvTimeoutError::Disconnected)) | None => self.abandoned(),
        };
        Some(self.settle(&mut rx, outcome))
    }

    /// Non-blocking check; `None` if still pending.
    ///
    /// Returns `None` while another thread is blocked in `wait` on this
    /// handle; that thread records the outcome as soon as it arrives.
    pub fn try_result(&self) -> Option<BridgeResult<BridgeValue>> {
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome.clone());
        }
        let Some(mut rx) = self.rx.try_lock() else {
            return self.outcome.get().cloned();
        };
        if let Some(outcome) = self.outcome.get() {
            return Some(outcome.clone());
        }
        let outcome = match rx.as_ref().map(Receiver::try_recv) {
            Some(Ok(outcome)) => outcome,
            Some(Err(TryRecvError::Empty)) => return None,
            Some(Err(TryRecvError::Disconnected)) | None => self.abandoned(),
        };
        Some(self.settle(&mut rx, outcome))
    }

    /// Whether the call has resolved
    pub fn is_done(&self) -> bool {
        self.try_result().is_some()
    }
}

impl std::fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("strand_id", &self.strand_id)
            .field("method", &self.method)
            .field("resolved", &self.outcome.get().is_some())
            .finish()
    }
}
