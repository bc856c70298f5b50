//! Bridged objects - natively implemented objects exposed to the runtime
//!
//! `BridgedObject` is the interface the runtime programs against. The typed
//! accessors are provided methods built on `lookup`: an absent field reads as
//! its kind's zero value, and a stored value of the wrong kind is reported
//! according to the object's `MismatchPolicy`.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::{MutexGuard, RwLock};

use crate::config::MismatchPolicy;
use crate::dispatch::{CompletionHandle, MethodTable, Strand};
use crate::error::{BridgeError, BridgeResult};
use crate::native_data::NativeDataStore;
use crate::types::{DescriptorCache, FieldMap, ModuleId, ObjectType};
use crate::value::{ArrayRef, BridgeValue, FieldKind, MapRef, ObjectRef};

// ============================================================================
// BridgedObject
// ============================================================================

/// A typed, mutable, introspectable object whose behavior lives in native
/// call handlers.
pub trait BridgedObject: Send + Sync {
    /// Type descriptor, `None` for untyped objects
    fn get_type(&self) -> Option<Arc<ObjectType>>;

    /// Raw field lookup: native data first, then managed field state
    fn lookup(&self, field: &str) -> Option<BridgeValue>;

    /// Write managed field state
    fn set(&self, field: &str, value: BridgeValue) -> BridgeResult<()>;

    /// The object's native data store
    fn native_data(&self) -> &NativeDataStore;

    /// Invoke a method to completion
    fn call(&self, strand: &Strand, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue>;

    /// Start a method without blocking
    fn start(self: Arc<Self>, strand: &Strand, name: &str, args: Vec<BridgeValue>)
        -> CompletionHandle;

    /// How typed accessors treat a stored value of the wrong kind
    fn mismatch_policy(&self) -> MismatchPolicy {
        MismatchPolicy::Error
    }

    /// Field value, `Null` when absent
    fn get(&self, field: &str) -> BridgeValue {
        self.lookup(field).unwrap_or_default()
    }

    /// Integer field, 0 when absent
    fn get_int(&self, field: &str) -> BridgeResult<i64> {
        read_typed(self, field, FieldKind::Int, BridgeValue::as_int, 0)
    }

    /// Float field, 0.0 when absent. Integers widen.
    fn get_float(&self, field: &str) -> BridgeResult<f64> {
        read_typed(self, field, FieldKind::Float, BridgeValue::as_float, 0.0)
    }

    /// String field, empty when absent
    fn get_string(&self, field: &str) -> BridgeResult<String> {
        read_typed(
            self,
            field,
            FieldKind::String,
            |value| value.as_str().map(str::to_string),
            String::new(),
        )
    }

    /// Boolean field, false when absent
    fn get_boolean(&self, field: &str) -> BridgeResult<bool> {
        read_typed(self, field, FieldKind::Boolean, BridgeValue::as_bool, false)
    }

    /// Map field, `None` when absent
    fn get_map(&self, field: &str) -> BridgeResult<Option<MapRef>> {
        read_typed(
            self,
            field,
            FieldKind::Map,
            |value| value.as_map().cloned().map(Some),
            None,
        )
    }

    /// Object field, `None` when absent
    fn get_object(&self, field: &str) -> BridgeResult<Option<ObjectRef>> {
        read_typed(
            self,
            field,
            FieldKind::Object,
            |value| value.as_object().cloned().map(Some),
            None,
        )
    }

    /// Array field, `None` when absent
    fn get_array(&self, field: &str) -> BridgeResult<Option<ArrayRef>> {
        read_typed(
            self,
            field,
            FieldKind::Array,
            |value| value.as_array().cloned().map(Some),
            None,
        )
    }

    /// Attach native data, overwriting any previous value
    fn add_native_data(&self, key: &str, value: BridgeValue) {
        self.native_data().put(key, value)
    }

    /// Fetch native data
    fn get_native_data(&self, key: &str) -> Option<BridgeValue> {
        self.native_data().get(key)
    }

    /// Live view of all native data
    fn get_all_native_data(&self) -> MutexGuard<'_, HashMap<String, BridgeValue>> {
        self.native_data().get_all()
    }
}

fn read_typed<O, T>(
    obj: &O,
    field: &str,
    expected: FieldKind,
    extract: impl Fn(&BridgeValue) -> Option<T>,
    zero: T,
) -> BridgeResult<T>
where
    O: BridgedObject + ?Sized,
{
    let value = match obj.lookup(field) {
        None | Some(BridgeValue::Null) => return Ok(zero),
        Some(value) => value,
    };
    if let Some(typed) = extract(&value) {
        return Ok(typed);
    }
    let err = BridgeError::TypeMismatch {
        field: field.to_string(),
        expected: expected.name().to_string(),
        got: value.type_name().to_string(),
    };
    match obj.mismatch_policy() {
        MismatchPolicy::Error => Err(err),
        MismatchPolicy::Panic => {
            tracing::warn!(
                field,
                expected = expected.name(),
                got = value.type_name(),
                "field type mismatch"
            );
            panic!("{}", err)
        }
    }
}

// ============================================================================
// NativeObject
// ============================================================================

/// Builder for `NativeObject`
pub struct NativeObjectBuilder {
    type_name: String,
    module: ModuleId,
    fields: Option<FieldMap>,
    descriptors: Option<Arc<DescriptorCache>>,
    methods: Arc<MethodTable>,
    native_data: HashMap<String, BridgeValue>,
    policy: MismatchPolicy,
}

impl NativeObjectBuilder {
    /// Declared fields; absent means untyped
    pub fn fields(mut self, fields: Option<FieldMap>) -> Self {
        self.fields = fields;
        self
    }

    /// Share descriptors with other objects through this cache
    pub fn descriptor_cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.descriptors = Some(cache);
        self
    }

    /// Method table
    pub fn methods(mut self, methods: Arc<MethodTable>) -> Self {
        self.methods = methods;
        self
    }

    /// Initial native data bindings
    pub fn native_data(mut self, entries: HashMap<String, BridgeValue>) -> Self {
        self.native_data = entries;
        self
    }

    /// Type-mismatch policy for typed accessors
    pub fn mismatch_policy(mut self, policy: MismatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the object
    pub fn build(self) -> Arc<NativeObject> {
        Arc::new(NativeObject {
            type_name: self.type_name,
            module: self.module,
            fields: self.fields,
            descriptors: self.descriptors,
            descriptor: OnceCell::new(),
            native_data: NativeDataStore::with_entries(self.native_data),
            state: RwLock::new(HashMap::new()),
            methods: self.methods,
            policy: self.policy,
        })
    }
}

/// The bridge's own `BridgedObject` implementation.
///
/// The descriptor is built on first `get_type` and kept for the object's
/// lifetime.
pub struct NativeObject {
    type_name: String,
    module: ModuleId,
    fields: Option<FieldMap>,
    descriptors: Option<Arc<DescriptorCache>>,
    descriptor: OnceCell<Option<Arc<ObjectType>>>,
    native_data: NativeDataStore,
    state: RwLock<HashMap<String, BridgeValue>>,
    methods: Arc<MethodTable>,
    policy: MismatchPolicy,
}

impl NativeObject {
    /// Start building an object of the given type
    pub fn builder(type_name: impl Into<String>, module: ModuleId) -> NativeObjectBuilder {
        NativeObjectBuilder {
            type_name: type_name.into(),
            module,
            fields: None,
            descriptors: None,
            methods: Arc::new(MethodTable::new()),
            native_data: HashMap::new(),
            policy: MismatchPolicy::Error,
        }
    }

    /// Declared type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Method table
    pub fn methods(&self) -> &MethodTable {
        &self.methods
    }
}

impl BridgedObject for NativeObject {
    fn get_type(&self) -> Option<Arc<ObjectType>> {
        self.descriptor
            .get_or_init(|| {
                let fields = self.fields.as_ref();
                match &self.descriptors {
                    Some(cache) => cache.get_or_build(&self.type_name, &self.module, fields),
                    None => ObjectType::build(&self.type_name, &self.module, fields),
                }
            })
            .clone()
    }

    fn lookup(&self, field: &str) -> Option<BridgeValue> {
        self.native_data
            .get(field)
            .or_else(|| self.state.read().get(field).cloned())
    }

    fn set(&self, field: &str, value: BridgeValue) -> BridgeResult<()> {
        if let Some(ty) = self.get_type() {
            let descriptor = ty.field(field).ok_or_else(|| BridgeError::UnknownField {
                type_name: ty.name().to_string(),
                field: field.to_string(),
            })?;
            if descriptor.is_readonly() {
                return Err(BridgeError::ReadonlyField {
                    type_name: ty.name().to_string(),
                    field: field.to_string(),
                });
            }
            if !descriptor.kind().accepts(&value) {
                return Err(BridgeError::TypeMismatch {
                    field: field.to_string(),
                    expected: descriptor.kind().name().to_string(),
                    got: value.type_name().to_string(),
                });
            }
        }
        self.state.write().insert(field.to_string(), value);
        Ok(())
    }

    fn native_data(&self) -> &NativeDataStore {
        &self.native_data
    }

    fn call(&self, strand: &Strand, name: &str, args: &[BridgeValue]) -> BridgeResult<BridgeValue> {
        self.methods.invoke(strand, self, name, args)
    }

    fn start(
        self: Arc<Self>,
        strand: &Strand,
        name: &str,
        args: Vec<BridgeValue>,
    ) -> CompletionHandle {
        let methods = Arc::clone(&self.methods);
        methods.spawn(strand, self, name, args)
    }

    fn mismatch_policy(&self) -> MismatchPolicy {
        self.policy
    }
}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObject")
            .field("type_name", &self.type_name)
            .field("module", &self.module)
            .field("typed", &self.fields.is_some())
            .field("native_data", &self.native_data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{field_map, FieldDescriptor};
    use crate::value::{ArrayValue, MapValue, NativeHandle};

    fn module() -> ModuleId {
        ModuleId::new("ballerina", "grpc", "1.0.0")
    }

    fn name_only() -> FieldMap {
        field_map([FieldDescriptor::new("name", FieldKind::String)])
    }

    #[test]
    fn test_fresh_object_reads_zero_values() {
        let obj = NativeObject::builder("testObjectType", module()).build();
        assert_eq!(obj.get("x"), BridgeValue::Null);
        assert_eq!(obj.get_int("x").unwrap(), 0);
        assert_eq!(obj.get_float("x").unwrap(), 0.0);
        assert_eq!(obj.get_string("x").unwrap(), "");
        assert!(!obj.get_boolean("x").unwrap());
        assert!(obj.get_map("x").unwrap().is_none());
        assert!(obj.get_object("x").unwrap().is_none());
        assert!(obj.get_array("x").unwrap().is_none());
    }

    #[test]
    fn test_native_data_feeds_accessors() {
        let obj = NativeObject::builder("testObjectType", module())
            .fields(Some(name_only()))
            .build();
        assert_eq!(obj.get_string("name").unwrap(), "");

        obj.add_native_data("name", "svc".into());
        assert_eq!(obj.get_string("name").unwrap(), "svc");

        let headers = MapValue::new();
        obj.add_native_data("headers", headers.clone().into());
        assert!(Arc::ptr_eq(&obj.get_map("headers").unwrap().unwrap(), &headers));

        let items = ArrayValue::new(FieldKind::Int);
        obj.add_native_data("items", items.clone().into());
        assert!(Arc::ptr_eq(&obj.get_array("items").unwrap().unwrap(), &items));

        obj.add_native_data("count", 3.into());
        assert_eq!(obj.get_int("count").unwrap(), 3);
        assert_eq!(obj.get_float("count").unwrap(), 3.0);
    }

    #[test]
    fn test_native_data_wins_over_managed_state() {
        let obj = NativeObject::builder("testObjectType", module())
            .fields(Some(name_only()))
            .build();
        obj.set("name", "managed".into()).unwrap();
        assert_eq!(obj.get_string("name").unwrap(), "managed");
        obj.add_native_data("name", "native".into());
        assert_eq!(obj.get_string("name").unwrap(), "native");
    }

    #[test]
    fn test_mismatch_is_typed_error() {
        let obj = NativeObject::builder("testObjectType", module()).build();
        obj.add_native_data("name", 7.into());
        let err = obj.get_string("name").unwrap_err();
        match err {
            BridgeError::TypeMismatch { field, expected, got } => {
                assert_eq!(field, "name");
                assert_eq!(expected, "string");
                assert_eq!(got, "int");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(obj.get_boolean("name").is_err());
        assert!(obj.get_map("name").is_err());
    }

    #[test]
    #[should_panic(expected = "Type mismatch on field 'name'")]
    fn test_mismatch_panic_policy() {
        let obj = NativeObject::builder("testObjectType", module())
            .mismatch_policy(MismatchPolicy::Panic)
            .build();
        obj.add_native_data("name", NativeHandle::new(1u8).into());
        let _ = obj.get_string("name");
    }

    #[test]
    fn test_get_type_cached_per_object() {
        let obj = NativeObject::builder("testObjectType", module())
            .fields(Some(name_only()))
            .build();
        let a = obj.get_type().unwrap();
        let b = obj.get_type().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.field_names(), vec!["name"]);

        let untyped = NativeObject::builder("testObjectType", module()).build();
        assert!(untyped.get_type().is_none());
    }

    #[test]
    fn test_shared_cache_across_instances() {
        let cache = Arc::new(DescriptorCache::new());
        let a = NativeObject::builder("Svc", module())
            .fields(Some(name_only()))
            .descriptor_cache(cache.clone())
            .build();
        let b = NativeObject::builder("Svc", module())
            .fields(Some(name_only()))
            .descriptor_cache(cache.clone())
            .build();
        assert!(Arc::ptr_eq(&a.get_type().unwrap(), &b.get_type().unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_checks_descriptor() {
        let fields = field_map([
            FieldDescriptor::new("name", FieldKind::String),
            FieldDescriptor::new("id", FieldKind::Int).readonly(),
        ]);
        let obj = NativeObject::builder("Svc", module()).fields(Some(fields)).build();

        assert!(matches!(
            obj.set("missing", 1.into()),
            Err(BridgeError::UnknownField { .. })
        ));
        assert!(matches!(
            obj.set("id", 1.into()),
            Err(BridgeError::ReadonlyField { .. })
        ));
        assert!(matches!(
            obj.set("name", 1.into()),
            Err(BridgeError::TypeMismatch { .. })
        ));
        obj.set("name", BridgeValue::Null).unwrap();
        assert_eq!(obj.get_string("name").unwrap(), "");
    }

    #[test]
    fn test_float_field_takes_int() {
        let fields = field_map([FieldDescriptor::new("ratio", FieldKind::Float)]);
        let obj = NativeObject::builder("Svc", module()).fields(Some(fields)).build();
        obj.set("ratio", BridgeValue::Int(3)).unwrap();
        assert_eq!(obj.get_float("ratio").unwrap(), 3.0);
    }

    #[test]
    fn test_untyped_set_accepts_anything() {
        let obj = NativeObject::builder("Loose", module()).build();
        obj.set("anything", true.into()).unwrap();
        assert!(obj.get_boolean("anything").unwrap());
    }

    #[test]
    fn test_get_all_native_data_is_live() {
        let obj = NativeObject::builder("Svc", module()).build();
        obj.add_native_data("a", 1.into());
        obj.get_all_native_data().insert("b".to_string(), 2.into());
        assert_eq!(obj.get_native_data("b"), Some(BridgeValue::Int(2)));
        assert_eq!(obj.get_all_native_data().len(), 2);
    }
}
