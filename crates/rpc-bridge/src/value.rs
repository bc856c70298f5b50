//! BridgeValue - the value representation shared by the runtime and native code
//!
//! Scalars (null, bool, int, float, string) are stored inline and compare by
//! value. Reference kinds (map, array, object, error, handle) are shared
//! through `Arc` and compare by identity, matching the runtime's reference
//! semantics.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error_value::ErrorValue;
use crate::object::BridgedObject;

/// Shared handle to a map (or record) value
pub type MapRef = Arc<MapValue>;

/// Shared handle to an array value
pub type ArrayRef = Arc<ArrayValue>;

/// Shared handle to a bridged object
pub type ObjectRef = Arc<dyn BridgedObject>;

// ============================================================================
// FieldKind
// ============================================================================

/// Semantic type of a field or value as seen by the calling runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKind {
    /// Text
    String,
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// Boolean
    Boolean,
    /// Untyped map
    Map,
    /// Array
    Array,
    /// Bridged object
    Object,
    /// Map carrying a record type name
    Record,
    /// Error value
    Error,
    /// Accepts every value
    Any,
}

impl FieldKind {
    /// Lowercase name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Int => "int",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Map => "map",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Record => "record",
            FieldKind::Error => "error",
            FieldKind::Any => "any",
        }
    }

    /// Whether `value` may be stored in a field of this kind.
    ///
    /// `Null` is accepted everywhere: it is how an unset field reads back.
    /// Float fields take integers, matching the widening `get_float` does.
    pub fn accepts(self, value: &BridgeValue) -> bool {
        match (self, value) {
            (FieldKind::Any, _) | (_, BridgeValue::Null) => true,
            (FieldKind::String, BridgeValue::String(_)) => true,
            (FieldKind::Int, BridgeValue::Int(_)) => true,
            (FieldKind::Float, BridgeValue::Float(_) | BridgeValue::Int(_)) => true,
            (FieldKind::Boolean, BridgeValue::Bool(_)) => true,
            (FieldKind::Map, BridgeValue::Map(_)) => true,
            (FieldKind::Record, BridgeValue::Map(map)) => map.type_name().is_some(),
            (FieldKind::Array, BridgeValue::Array(_)) => true,
            (FieldKind::Object, BridgeValue::Object(_)) => true,
            (FieldKind::Error, BridgeValue::Error(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// MapValue
// ============================================================================

/// Mutable string-keyed map. Records are maps that carry a type name.
#[derive(Debug, Default)]
pub struct MapValue {
    type_name: Option<String>,
    entries: RwLock<HashMap<String, BridgeValue>>,
}

impl MapValue {
    /// Create an untyped, empty map
    pub fn new() -> MapRef {
        Arc::new(Self::default())
    }

    /// Create an empty record of the given type
    pub fn record(type_name: impl Into<String>) -> MapRef {
        Arc::new(Self {
            type_name: Some(type_name.into()),
            entries: RwLock::new(HashMap::new()),
        })
    }

    /// Create an untyped map from existing entries
    pub fn from_entries(entries: HashMap<String, BridgeValue>) -> MapRef {
        Arc::new(Self {
            type_name: None,
            entries: RwLock::new(entries),
        })
    }

    /// Record type name, `None` for plain maps
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Get an entry
    pub fn get(&self, key: &str) -> Option<BridgeValue> {
        self.entries.read().get(key).cloned()
    }

    /// Insert an entry, returning the previous value
    pub fn insert(&self, key: impl Into<String>, value: BridgeValue) -> Option<BridgeValue> {
        self.entries.write().insert(key.into(), value)
    }

    /// Remove an entry
    pub fn remove(&self, key: &str) -> Option<BridgeValue> {
        self.entries.write().remove(key)
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of the keys (unordered)
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Independent copy. Nested maps and arrays are copied too; objects,
    /// errors and handles stay shared.
    pub fn deep_copy(&self) -> MapRef {
        let entries = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.deep_copy()))
            .collect();
        Arc::new(Self {
            type_name: self.type_name.clone(),
            entries: RwLock::new(entries),
        })
    }

    fn sorted_entries(&self) -> Vec<(String, BridgeValue)> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

// ============================================================================
// ArrayValue
// ============================================================================

/// Mutable array with a declared element kind.
#[derive(Debug)]
pub struct ArrayValue {
    element_kind: FieldKind,
    items: RwLock<Vec<BridgeValue>>,
}

impl ArrayValue {
    /// Create an empty array
    pub fn new(element_kind: FieldKind) -> ArrayRef {
        Self::from_vec(element_kind, Vec::new())
    }

    /// Create an array from existing items
    pub fn from_vec(element_kind: FieldKind, items: Vec<BridgeValue>) -> ArrayRef {
        Arc::new(Self {
            element_kind,
            items: RwLock::new(items),
        })
    }

    /// Declared element kind
    pub fn element_kind(&self) -> FieldKind {
        self.element_kind
    }

    /// Get element at index
    pub fn get(&self, index: usize) -> Option<BridgeValue> {
        self.items.read().get(index).cloned()
    }

    /// Append an element
    pub fn push(&self, value: BridgeValue) {
        self.items.write().push(value);
    }

    /// Array length
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if array is empty
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copy out all elements
    pub fn to_vec(&self) -> Vec<BridgeValue> {
        self.items.read().clone()
    }

    /// Independent copy, following the same rules as `MapValue::deep_copy`
    pub fn deep_copy(&self) -> ArrayRef {
        let items = self.items.read().iter().map(BridgeValue::deep_copy).collect();
        Self::from_vec(self.element_kind, items)
    }
}

// ============================================================================
// NativeHandle
// ============================================================================

/// Opaque payload owned by native call logic (stream observers, call
/// contexts, ...). The bridge never looks inside.
#[derive(Clone)]
pub struct NativeHandle(Arc<dyn Any + Send + Sync>);

impl NativeHandle {
    /// Wrap a native payload
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Recover the payload if it has type `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    /// Check if the payload has type `T`
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_ref().type_id() == std::any::TypeId::of::<T>()
    }

    /// Identity comparison
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:p})", Arc::as_ptr(&self.0))
    }
}

// ============================================================================
// BridgeValue
// ============================================================================

/// A value crossing the bridge in either direction.
#[derive(Clone, Default)]
pub enum BridgeValue {
    /// Absent / nil
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Map or record
    Map(MapRef),
    /// Array
    Array(ArrayRef),
    /// Bridged object
    Object(ObjectRef),
    /// Error value
    Error(ErrorValue),
    /// Opaque native payload
    Handle(NativeHandle),
}

impl BridgeValue {
    /// Zero value for a declared kind (empty string, 0, 0.0, false, null)
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::String => BridgeValue::String(String::new()),
            FieldKind::Int => BridgeValue::Int(0),
            FieldKind::Float => BridgeValue::Float(0.0),
            FieldKind::Boolean => BridgeValue::Bool(false),
            _ => BridgeValue::Null,
        }
    }

    /// Name of the value's runtime kind, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            BridgeValue::Null => "null",
            BridgeValue::Bool(_) => "boolean",
            BridgeValue::Int(_) => "int",
            BridgeValue::Float(_) => "float",
            BridgeValue::String(_) => "string",
            BridgeValue::Map(map) if map.type_name().is_some() => "record",
            BridgeValue::Map(_) => "map",
            BridgeValue::Array(_) => "array",
            BridgeValue::Object(_) => "object",
            BridgeValue::Error(_) => "error",
            BridgeValue::Handle(_) => "handle",
        }
    }

    /// Check if value is null
    pub fn is_null(&self) -> bool {
        matches!(self, BridgeValue::Null)
    }

    /// Extract boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BridgeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            BridgeValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract float value (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            BridgeValue::Float(f) => Some(*f),
            BridgeValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BridgeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract map handle
    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            BridgeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Extract array handle
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            BridgeValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Extract object handle
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            BridgeValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Extract error value
    pub fn as_error(&self) -> Option<&ErrorValue> {
        match self {
            BridgeValue::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Extract native handle
    pub fn as_handle(&self) -> Option<&NativeHandle> {
        match self {
            BridgeValue::Handle(h) => Some(h),
            _ => None,
        }
    }
}

fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

impl PartialEq for BridgeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (BridgeValue::Null, BridgeValue::Null) => true,
            (BridgeValue::Bool(a), BridgeValue::Bool(b)) => a == b,
            (BridgeValue::Int(a), BridgeValue::Int(b)) => a == b,
            (BridgeValue::Float(a), BridgeValue::Float(b)) => a == b,
            (BridgeValue::String(a), BridgeValue::String(b)) => a == b,
            (BridgeValue::Map(a), BridgeValue::Map(b)) => Arc::ptr_eq(a, b),
            (BridgeValue::Array(a), BridgeValue::Array(b)) => Arc::ptr_eq(a, b),
            (BridgeValue::Object(a), BridgeValue::Object(b)) => same_object(a, b),
            (BridgeValue::Error(a), BridgeValue::Error(b)) => a == b,
            (BridgeValue::Handle(a), BridgeValue::Handle(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for BridgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeValue::Null => write!(f, "Null"),
            BridgeValue::Bool(b) => write!(f, "Bool({})", b),
            BridgeValue::Int(i) => write!(f, "Int({})", i),
            BridgeValue::Float(x) => write!(f, "Float({})", x),
            BridgeValue::String(s) => write!(f, "String({:?})", s),
            BridgeValue::Map(m) => write!(f, "Map({:?}, {} entries)", m.type_name(), m.len()),
            BridgeValue::Array(a) => write!(f, "Array({}, len={})", a.element_kind(), a.len()),
            BridgeValue::Object(o) => write!(f, "Object({:p})", Arc::as_ptr(o) as *const ()),
            BridgeValue::Error(e) => write!(f, "Error({})", e),
            BridgeValue::Handle(h) => fmt::Debug::fmt(h, f),
        }
    }
}

impl BridgeValue {
    /// Copy that shares no mutable container with `self`
    pub fn deep_copy(&self) -> Self {
        match self {
            BridgeValue::Map(map) => BridgeValue::Map(map.deep_copy()),
            BridgeValue::Array(array) => BridgeValue::Array(array.deep_copy()),
            other => other.clone(),
        }
    }

    /// Rendering that reads back as a literal: strings are quoted and
    /// `Null` shows as `()`.
    pub fn expression_string(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.render(&mut out, true);
        out
    }

    fn render(&self, out: &mut impl fmt::Write, literal: bool) -> fmt::Result {
        match self {
            BridgeValue::Null if literal => out.write_str("()"),
            BridgeValue::Null => Ok(()),
            BridgeValue::Bool(b) => write!(out, "{}", b),
            BridgeValue::Int(i) => write!(out, "{}", i),
            BridgeValue::Float(x) => write!(out, "{}", x),
            BridgeValue::String(s) if literal => write!(out, "{:?}", s),
            BridgeValue::String(s) => out.write_str(s),
            BridgeValue::Map(map) => {
                out.write_char('{')?;
                for (i, (key, value)) in map.sorted_entries().iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    write!(out, "{:?}:", key)?;
                    value.render(out, true)?;
                }
                out.write_char('}')
            }
            BridgeValue::Array(array) => {
                out.write_char('[')?;
                for (i, item) in array.to_vec().iter().enumerate() {
                    if i > 0 {
                        out.write_char(',')?;
                    }
                    item.render(out, true)?;
                }
                out.write_char(']')
            }
            BridgeValue::Object(obj) => match obj.get_type() {
                Some(ty) => write!(out, "object {}", ty.name()),
                None => out.write_str("object"),
            },
            BridgeValue::Error(err) if literal => write!(out, "error({:?})", err.to_string()),
            BridgeValue::Error(err) => write!(out, "{}", err),
            BridgeValue::Handle(_) => out.write_str("<handle>"),
        }
    }
}

/// String form of a value: strings unquoted, `Null` empty, containers in
/// literal form with keys sorted.
impl fmt::Display for BridgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false)
    }
}

impl From<bool> for BridgeValue {
    fn from(b: bool) -> Self {
        BridgeValue::Bool(b)
    }
}

impl From<i64> for BridgeValue {
    fn from(i: i64) -> Self {
        BridgeValue::Int(i)
    }
}

impl From<i32> for BridgeValue {
    fn from(i: i32) -> Self {
        BridgeValue::Int(i as i64)
    }
}

impl From<f64> for BridgeValue {
    fn from(f: f64) -> Self {
        BridgeValue::Float(f)
    }
}

impl From<&str> for BridgeValue {
    fn from(s: &str) -> Self {
        BridgeValue::String(s.to_string())
    }
}

impl From<String> for BridgeValue {
    fn from(s: String) -> Self {
        BridgeValue::String(s)
    }
}

impl From<MapRef> for BridgeValue {
    fn from(m: MapRef) -> Self {
        BridgeValue::Map(m)
    }
}

impl From<ArrayRef> for BridgeValue {
    fn from(a: ArrayRef) -> Self {
        BridgeValue::Array(a)
    }
}

impl From<ObjectRef> for BridgeValue {
    fn from(o: ObjectRef) -> Self {
        BridgeValue::Object(o)
    }
}

impl From<ErrorValue> for BridgeValue {
    fn from(e: ErrorValue) -> Self {
        BridgeValue::Error(e)
    }
}

impl From<NativeHandle> for BridgeValue {
    fn from(h: NativeHandle) -> Self {
        BridgeValue::Handle(h)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_values() {
        assert_eq!(BridgeValue::zero(FieldKind::String), BridgeValue::from(""));
        assert_eq!(BridgeValue::zero(FieldKind::Int), BridgeValue::Int(0));
        assert_eq!(BridgeValue::zero(FieldKind::Float), BridgeValue::Float(0.0));
        assert_eq!(BridgeValue::zero(FieldKind::Boolean), BridgeValue::Bool(false));
        assert!(BridgeValue::zero(FieldKind::Map).is_null());
        assert!(BridgeValue::zero(FieldKind::Object).is_null());
    }

    #[test]
    fn test_reference_kinds_compare_by_identity() {
        let a = MapValue::new();
        let b = MapValue::new();
        assert_eq!(BridgeValue::Map(a.clone()), BridgeValue::Map(a.clone()));
        assert_ne!(BridgeValue::Map(a), BridgeValue::Map(b));

        let h = NativeHandle::new(7u32);
        assert_eq!(BridgeValue::Handle(h.clone()), BridgeValue::Handle(h));
        assert_ne!(
            BridgeValue::Handle(NativeHandle::new(7u32)),
            BridgeValue::Handle(NativeHandle::new(7u32))
        );
    }

    #[test]
    fn test_kind_accepts() {
        assert!(FieldKind::String.accepts(&"x".into()));
        assert!(!FieldKind::String.accepts(&BridgeValue::Int(1)));
        assert!(FieldKind::Int.accepts(&BridgeValue::Null));
        assert!(FieldKind::Any.accepts(&BridgeValue::Bool(true)));
        assert!(FieldKind::Record.accepts(&MapValue::record("Person").into()));
        assert!(!FieldKind::Record.accepts(&MapValue::new().into()));
        assert!(FieldKind::Map.accepts(&MapValue::record("Person").into()));
        assert!(FieldKind::Float.accepts(&BridgeValue::Int(3)));
        assert!(!FieldKind::Int.accepts(&BridgeValue::Float(3.0)));
    }

    #[test]
    fn test_string_forms() {
        assert_eq!(BridgeValue::Null.to_string(), "");
        assert_eq!(BridgeValue::Null.expression_string(), "()");
        assert_eq!(BridgeValue::from("svc").to_string(), "svc");
        assert_eq!(BridgeValue::from("svc").expression_string(), "\"svc\"");

        let map = MapValue::new();
        map.insert("port", 9090.into());
        map.insert("host", "localhost".into());
        map.insert("tags", ArrayValue::from_vec(FieldKind::String, vec!["a".into()]).into());
        let value = BridgeValue::from(map);
        assert_eq!(value.to_string(), r#"{"host":"localhost","port":9090,"tags":["a"]}"#);
        assert_eq!(value.to_string(), value.expression_string());
    }

    #[test]
    fn test_deep_copy_detaches_containers() {
        let inner = MapValue::new();
        inner.insert("n", 1.into());
        let outer = MapValue::record("Outer");
        outer.insert("inner", inner.clone().into());

        let copy = outer.deep_copy();
        assert_eq!(copy.type_name(), Some("Outer"));
        inner.insert("n", 2.into());

        let copied_inner = copy.get("inner").unwrap();
        assert_eq!(copied_inner.as_map().unwrap().get("n"), Some(BridgeValue::Int(1)));
        assert_ne!(copy.get("inner"), outer.get("inner"));
    }

    #[test]
    fn test_handle_downcast() {
        let handle = NativeHandle::new(String::from("observer"));
        assert!(handle.is::<String>());
        assert_eq!(handle.downcast::<String>().as_deref().map(String::as_str), Some("observer"));
        assert!(handle.downcast::<u64>().is_none());
    }

    #[test]
    fn test_float_widening() {
        assert_eq!(BridgeValue::Int(3).as_float(), Some(3.0));
        assert_eq!(BridgeValue::Float(1.5).as_float(), Some(1.5));
        assert_eq!(BridgeValue::Bool(true).as_float(), None);
    }

    #[test]
    fn test_map_and_array_ops() {
        let map = MapValue::record("Greeting");
        assert_eq!(map.type_name(), Some("Greeting"));
        assert!(map.insert("text", "hi".into()).is_none());
        assert_eq!(map.get("text"), Some(BridgeValue::from("hi")));
        assert_eq!(map.len(), 1);
        assert_eq!(map.remove("text"), Some(BridgeValue::from("hi")));
        assert!(map.is_empty());

        let array = ArrayValue::new(FieldKind::Int);
        array.push(1.into());
        array.push(2.into());
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(1), Some(BridgeValue::Int(2)));
        assert_eq!(array.get(5), None);
        assert_eq!(array.element_kind(), FieldKind::Int);
    }
}
