//! Value factory - the one place the runtime materializes values it does not
//! own the concrete type of
//!
//! `ValueFactory` is consumed as a trait object so a reduced implementation
//! (for example one that only builds errors) can stand in for the full one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BridgeConfig, MismatchPolicy};
use crate::dispatch::{MethodTable, Strand};
use crate::error::{BridgeError, BridgeResult};
use crate::error_value::ErrorValue;
use crate::object::NativeObject;
use crate::types::{BridgeType, DescriptorCache, FieldMap, ModuleId, RecordType};
use crate::value::{BridgeValue, FieldKind, MapRef, MapValue, ObjectRef};

/// Method run by `create_object` when an object type defines it
pub const INIT_METHOD: &str = "init";

/// Polymorphic construction of records, objects, errors and anonymous types.
pub trait ValueFactory: Send + Sync {
    /// Create a record of a registered type with its defaults filled in
    fn create_record(&self, type_name: &str) -> BridgeResult<MapRef>;

    /// Create an object of a registered type, seeded with native data and
    /// initialized with `args`
    fn create_object(
        &self,
        type_name: &str,
        strand: &Strand,
        native_data: HashMap<String, BridgeValue>,
        args: &[BridgeValue],
    ) -> BridgeResult<ObjectRef>;

    /// Assemble an error value
    fn create_error(
        &self,
        type_name: &str,
        message: &str,
        cause: Option<ErrorValue>,
        detail: Option<BridgeValue>,
    ) -> BridgeResult<ErrorValue>;

    /// Resolve an entry of the anonymous type table
    fn anon_type(&self, index: usize, qualifier: &str) -> BridgeResult<BridgeType>;
}

struct ObjectClass {
    fields: Option<FieldMap>,
    methods: Arc<MethodTable>,
}

struct AnonEntry {
    qualifier: String,
    ty: BridgeType,
}

// ============================================================================
// ModuleValueFactory
// ============================================================================

/// Builder for `ModuleValueFactory`
pub struct ModuleValueFactoryBuilder {
    module: ModuleId,
    policy: MismatchPolicy,
    records: HashMap<String, Arc<RecordType>>,
    classes: HashMap<String, ObjectClass>,
    anon_types: Vec<AnonEntry>,
    descriptors: Option<Arc<DescriptorCache>>,
}

impl ModuleValueFactoryBuilder {
    /// Apply settings from configuration (module identity, mismatch policy)
    pub fn config(mut self, config: &BridgeConfig) -> Self {
        self.module = config.module.clone();
        self.policy = config.fields.mismatch;
        self
    }

    /// Register a record type
    pub fn record(mut self, record: RecordType) -> Self {
        self.records.insert(record.name().to_string(), Arc::new(record));
        self
    }

    /// Register an object type
    pub fn object_type(
        mut self,
        name: impl Into<String>,
        fields: Option<FieldMap>,
        methods: MethodTable,
    ) -> Self {
        self.classes.insert(
            name.into(),
            ObjectClass {
                fields,
                methods: Arc::new(methods),
            },
        );
        self
    }

    /// Append to the anonymous type table; the entry's index is its position
    pub fn anon_type(mut self, qualifier: impl Into<String>, ty: BridgeType) -> Self {
        self.anon_types.push(AnonEntry {
            qualifier: qualifier.into(),
            ty,
        });
        self
    }

    /// Share a descriptor cache with other factories
    pub fn descriptor_cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.descriptors = Some(cache);
        self
    }

    /// Build the factory
    pub fn build(self) -> ModuleValueFactory {
        ModuleValueFactory {
            module: self.module,
            policy: self.policy,
            records: self.records,
            classes: self.classes,
            anon_types: self.anon_types,
            descriptors: self.descriptors.unwrap_or_default(),
        }
    }
}

/// Factory backed by the types one module registers.
///
/// Registration happens once through the builder; afterwards the factory is
/// immutable and safe to share.
pub struct ModuleValueFactory {
    module: ModuleId,
    policy: MismatchPolicy,
    records: HashMap<String, Arc<RecordType>>,
    classes: HashMap<String, ObjectClass>,
    anon_types: Vec<AnonEntry>,
    descriptors: Arc<DescriptorCache>,
}

impl ModuleValueFactory {
    /// Start building a factory for `module`
    pub fn builder(module: ModuleId) -> ModuleValueFactoryBuilder {
        ModuleValueFactoryBuilder {
            module,
            policy: MismatchPolicy::Error,
            records: HashMap::new(),
            classes: HashMap::new(),
            anon_types: Vec::new(),
            descriptors: None,
        }
    }

    /// Module this factory serves
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Registered record type
    pub fn record_type(&self, name: &str) -> Option<Arc<RecordType>> {
        self.records.get(name).cloned()
    }

    /// Descriptor cache shared by every object this factory creates
    pub fn descriptor_cache(&self) -> &Arc<DescriptorCache> {
        &self.descriptors
    }
}

impl ValueFactory for ModuleValueFactory {
    fn create_record(&self, type_name: &str) -> BridgeResult<MapRef> {
        let record_type = self
            .records
            .get(type_name)
            .ok_or_else(|| BridgeError::UnknownRecordType(type_name.to_string()))?;

        let record = MapValue::record(type_name);
        for (name, field) in record_type.fields() {
            let value = match record_type.default_for(name) {
                Some(default) if field.kind().accepts(default) => default.clone(),
                Some(default) => {
                    return Err(BridgeError::Validation {
                        type_name: type_name.to_string(),
                        reason: format!(
                            "default for '{}' is {}, expected {}",
                            name,
                            default.type_name(),
                            field.kind()
                        ),
                    })
                }
                None if field.is_optional() => continue,
                None => match field.kind() {
                    FieldKind::String | FieldKind::Int | FieldKind::Float | FieldKind::Boolean => {
                        BridgeValue::zero(field.kind())
                    }
                    kind => {
                        return Err(BridgeError::Validation {
                            type_name: type_name.to_string(),
                            reason: format!("required {} field '{}' has no default", kind, name),
                        })
                    }
                },
            };
            record.insert(name.clone(), value);
        }
        Ok(record)
    }

    fn create_object(
        &self,
        type_name: &str,
        strand: &Strand,
        native_data: HashMap<String, BridgeValue>,
        args: &[BridgeValue],
    ) -> BridgeResult<ObjectRef> {
        let class = self
            .classes
            .get(type_name)
            .ok_or_else(|| BridgeError::UnknownObjectType(type_name.to_string()))?;

        let object: ObjectRef = NativeObject::builder(type_name, self.module.clone())
            .fields(class.fields.clone())
            .descriptor_cache(Arc::clone(&self.descriptors))
            .methods(Arc::clone(&class.methods))
            .native_data(native_data)
            .mismatch_policy(self.policy)
            .build();

        if class.methods.contains(INIT_METHOD) {
            object.call(strand, INIT_METHOD, args)?;
        }
        Ok(object)
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

    fn anon_type(&self, index: usize, qualifier: &str) -> BridgeResult<BridgeType> {
        let entry = self
            .anon_types
            .get(index)
            .ok_or(BridgeError::AnonTypeOutOfRange {
                index,
                len: self.anon_types.len(),
            })?;
        if entry.qualifier != qualifier {
            return Err(BridgeError::AnonTypeUnregistered {
                index,
                qualifier: qualifier.to_string(),
            });
        }
        Ok(entry.ty.clone())
    }
}
