//! Type descriptors for bridged objects and records
//!
//! Descriptors are immutable and shared as `Arc`. `DescriptorCache` hands out
//! one descriptor per distinct (name, module, field map) configuration, so
//! every instance built from the same field map sees the same `Arc`.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::value::{BridgeValue, FieldKind};

// ============================================================================
// ModuleId
// ============================================================================

/// Identity of the module that owns a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId {
    /// Organization
    pub org: String,
    /// Module name
    pub name: String,
    /// Module version
    pub version: String,
}

impl ModuleId {
    /// Create a module identity
    pub fn new(
        org: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            org: org.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Qualify a type name with this module (`org/name:version:Type`)
    pub fn qualify(&self, type_name: &str) -> String {
        format!("{}:{}", self, type_name)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.org, self.name, self.version)
    }
}

// ============================================================================
// FieldDescriptor
// ============================================================================

/// Field flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FieldFlags {
    /// Field may be absent
    pub optional: bool,
    /// Field cannot be written through `set`
    pub readonly: bool,
}

/// Declared field of an object or record type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    name: String,
    kind: FieldKind,
    flags: FieldFlags,
}

impl FieldDescriptor {
    /// Required, writable field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: FieldFlags::default(),
        }
    }

    /// Mark the field optional
    pub fn optional(mut self) -> Self {
        self.flags.optional = true;
        self
    }

    /// Mark the field readonly
    pub fn readonly(mut self) -> Self {
        self.flags.readonly = true;
        self
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Field flags
    pub fn flags(&self) -> FieldFlags {
        self.flags
    }

    /// Whether the field may be absent
    pub fn is_optional(&self) -> bool {
        self.flags.optional
    }

    /// Whether the field rejects writes
    pub fn is_readonly(&self) -> bool {
        self.flags.readonly
    }
}

/// Field name → descriptor. Ordered so equal maps hash and compare equal.
pub type FieldMap = BTreeMap<String, FieldDescriptor>;

/// Build a field map from descriptors; later duplicates replace earlier ones.
pub fn field_map(fields: impl IntoIterator<Item = FieldDescriptor>) -> FieldMap {
    fields
        .into_iter()
        .map(|field| (field.name().to_string(), field))
        .collect()
}

// ============================================================================
// ObjectType
// ============================================================================

/// Shape of a bridged object: name, owning module and fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectType {
    name: String,
    module: ModuleId,
    fields: FieldMap,
}

impl ObjectType {
    /// Build a descriptor. An absent or empty field map means the object is
    /// untyped and yields `None`.
    pub fn build(
        name: impl Into<String>,
        module: &ModuleId,
        fields: Option<&FieldMap>,
    ) -> Option<Arc<ObjectType>> {
        let fields = fields.filter(|fields| !fields.is_empty())?;
        Some(Arc::new(ObjectType {
            name: name.into(),
            module: module.clone(),
            fields: fields.clone(),
        }))
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning module
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Module-qualified name
    pub fn qualified_name(&self) -> String {
        self.module.qualify(&self.name)
    }

    /// Look up a field
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// All fields
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    /// Number of fields
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

// ============================================================================
// RecordType
// ============================================================================

/// Shape of a record: fields plus default values used at construction.
#[derive(Debug, Clone)]
pub struct RecordType {
    name: String,
    module: ModuleId,
    fields: FieldMap,
    defaults: HashMap<String, BridgeValue>,
}

impl RecordType {
    /// Create a record type without defaults
    pub fn new(name: impl Into<String>, module: &ModuleId, fields: FieldMap) -> Self {
        Self {
            name: name.into(),
            module: module.clone(),
            fields,
            defaults: HashMap::new(),
        }
    }

    /// Attach a default value for a field
    pub fn with_default(mut self, field: impl Into<String>, value: BridgeValue) -> Self {
        self.defaults.insert(field.into(), value);
        self
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning module
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// All fields
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Default value for a field
    pub fn default_for(&self, field: &str) -> Option<&BridgeValue> {
        self.defaults.get(field)
    }
}

/// A type resolved from the anonymous type table
#[derive(Debug, Clone)]
pub enum BridgeType {
    /// Record type
    Record(Arc<RecordType>),
    /// Object type
    Object(Arc<ObjectType>),
}

impl BridgeType {
    /// Type name
    pub fn name(&self) -> &str {
        match self {
            BridgeType::Record(record) => record.name(),
            BridgeType::Object(object) => object.name(),
        }
    }

    /// Declared fields
    pub fn fields(&self) -> &FieldMap {
        match self {
            BridgeType::Record(record) => record.fields(),
            BridgeType::Object(object) => object.fields(),
        }
    }
}

// ============================================================================
// DescriptorCache
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DescriptorKey {
    name: String,
    module: ModuleId,
    fields: FieldMap,
}

/// Shares one `ObjectType` per distinct configuration.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    descriptors: DashMap<DescriptorKey, Arc<ObjectType>>,
}

impl DescriptorCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for this configuration, building it on
    /// first request. Untyped configurations are not cached.
    pub fn get_or_build(
        &self,
        name: &str,
        module: &ModuleId,
        fields: Option<&FieldMap>,
    ) -> Option<Arc<ObjectType>> {
        let fields = fields.filter(|fields| !fields.is_empty())?;
        let key = DescriptorKey {
            name: name.to_string(),
            module: module.clone(),
            fields: fields.clone(),
        };
        if let Some(existing) = self.descriptors.get(&key) {
            return Some(Arc::clone(existing.value()));
        }
        let entry = self.descriptors.entry(key).or_insert_with(|| {
            tracing::debug!(
                type_name = name,
                module = %module,
                fields = fields.len(),
                "building object type descriptor"
            );
            Arc::new(ObjectType {
                name: name.to_string(),
                module: module.clone(),
                fields: fields.clone(),
            })
        });
        Some(Arc::clone(entry.value()))
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
