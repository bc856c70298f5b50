//! Tests for the bridge test doubles
//!
//! Covers:
//! - Error propagation with a factory that can only build errors
//! - Field resolution on mock objects built from a field map
//! - Started calls on a threaded scheduler

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rpc_bridge::{
    field_map, make_error, BridgeError, BridgeValue, BridgedObject, FieldDescriptor, FieldKind,
    MapValue, MethodTable, ModuleId, ModuleValueFactory, NativeHandle, NativeObject, ValueFactory,
};
use rpc_bridge_test::{
    error_only_strand, error_only_value_factory, mock_object, threaded_strand, CallRecorder,
    MOCK_OBJECT_TYPE,
};

#[test]
fn test_error_only_factory_builds_errors() {
    let factory = error_only_value_factory();
    let err = factory.create_error("error", "boom", None, None).unwrap();
    assert_eq!(err.message(), "boom");
    assert!(err.cause().is_none());

    let wrapped = factory
        .create_error("error", "wrap", Some(err.clone()), None)
        .unwrap();
    assert_eq!(wrapped.cause(), Some(&err));
}

#[test]
fn test_error_only_factory_refuses_everything_else() {
    let strand = error_only_strand();
    let factory = strand.factory();
    assert!(matches!(
        factory.create_record("Status"),
        Err(BridgeError::Unsupported(_))
    ));
    assert!(matches!(
        factory.create_object("Caller", &strand, HashMap::new(), &[]),
        Err(BridgeError::Unsupported(_))
    ));
    assert!(matches!(
        factory.anon_type(0, "stream<string>"),
        Err(BridgeError::Unsupported(_))
    ));
}

#[test]
fn test_error_path_needs_only_error_construction() {
    // A handler that reports a failed upstream call the way call handlers do:
    // read state, wrap the transport error, raise.
    let methods = MethodTable::new().with("send", |ctx, _| {
        let target = ctx.receiver().get_string("target")?;
        let transport = make_error("connection refused", None);
        Err(ctx.raise(
            "GrpcError",
            &format!("send to '{}' failed", target),
            Some(transport),
            Some(BridgeValue::Int(14)),
        ))
    });
    let obj = NativeObject::builder("Client", ModuleId::new("ballerina", "grpc", "1.0.0"))
        .methods(Arc::new(methods))
        .build();
    obj.add_native_data("target", "localhost:9090".into());

    let err = obj.call(&error_only_strand(), "send", &[]).unwrap_err();
    let app = err.into_application().unwrap();
    assert_eq!(app.type_name(), "GrpcError");
    assert_eq!(app.message(), "send to 'localhost:9090' failed");
    assert_eq!(app.cause().map(|c| c.message()), Some("connection refused"));
    assert_eq!(app.detail(), Some(&BridgeValue::Int(14)));
}

#[test]
fn test_mock_object_with_name_field() {
    let fields = field_map([FieldDescriptor::new("name", FieldKind::String)]);
    let obj = mock_object(Some(fields));

    let ty = obj.get_type().unwrap();
    assert_eq!(ty.name(), MOCK_OBJECT_TYPE);
    assert_eq!(ty.field_count(), 1);
    assert_eq!(ty.field("name").unwrap().kind(), FieldKind::String);

    assert_eq!(obj.get_string("name").unwrap(), "");
    obj.add_native_data("name", "svc".into());
    assert_eq!(obj.get_string("name").unwrap(), "svc");
}

#[test]
fn test_mock_object_descriptor_is_built_once() {
    let fields = field_map([FieldDescriptor::new("name", FieldKind::String)]);
    let obj = mock_object(Some(fields));

    let first = obj.get_type().unwrap();
    let second = obj.get_type().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_mock_object_without_fields_is_untyped() {
    assert!(mock_object(None).get_type().is_none());
    assert!(mock_object(Some(Default::default())).get_type().is_none());
}

#[test]
fn test_mock_object_zero_values() {
    let obj = mock_object(None);
    assert_eq!(obj.get("anything"), BridgeValue::Null);
    assert_eq!(obj.get_int("anything").unwrap(), 0);
    assert_eq!(obj.get_float("anything").unwrap(), 0.0);
    assert_eq!(obj.get_string("anything").unwrap(), "");
    assert!(!obj.get_boolean("anything").unwrap());
    assert!(obj.get_map("anything").unwrap().is_none());
    assert!(obj.get_object("anything").unwrap().is_none());
    assert!(obj.get_array("anything").unwrap().is_none());
}

#[test]
fn test_mock_object_native_data() {
    let obj = mock_object(None);
    let observer = NativeHandle::new(String::from("response observer"));
    obj.add_native_data("observer", observer.clone().into());
    assert_eq!(obj.get_native_data("observer"), Some(BridgeValue::Handle(observer)));

    let headers = MapValue::new();
    headers.insert("content-type", "application/grpc".into());
    obj.add_native_data("headers", headers.clone().into());
    let read = obj.get_map("headers").unwrap().unwrap();
    assert!(Arc::ptr_eq(&read, &headers));

    obj.add_native_data("observer", BridgeValue::Null);
    assert_eq!(obj.get_native_data("observer"), Some(BridgeValue::Null));
    assert_eq!(obj.get_all_native_data().len(), 2);
}

#[test]
fn test_mock_object_calls_answer_null() {
    let strand = error_only_strand();
    let obj = mock_object(None);
    assert_eq!(obj.call(&strand, "anything", &[]).unwrap(), BridgeValue::Null);
    let handle = obj.start(&strand, "anything", Vec::new());
    assert!(handle.is_done());
    assert_eq!(handle.wait().unwrap(), BridgeValue::Null);
}

#[test]
fn test_recorder_sees_forwarded_arguments() {
    let recorder = CallRecorder::new();
    let obj = NativeObject::builder("Svc", ModuleId::new("ballerina", "grpc", "1.0.0"))
        .methods(Arc::new(recorder.methods(BridgeValue::Bool(true))))
        .build();
    let strand = error_only_strand();

    let result = obj.call(&strand, "onMessage", &["hello".into(), 2.into()]).unwrap();
    assert_eq!(result, BridgeValue::Bool(true));

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "onMessage");
    assert_eq!(calls[0].args, vec![BridgeValue::from("hello"), BridgeValue::Int(2)]);
    assert_eq!(calls[0].strand_id, strand.id());
}

#[test]
fn test_threaded_start_resolves() {
    let recorder = CallRecorder::new();
    let obj = NativeObject::builder("Svc", ModuleId::new("ballerina", "grpc", "1.0.0"))
        .methods(Arc::new(recorder.methods(7.into())))
        .build();
    let strand = threaded_strand(error_only_value_factory());

    let handles: Vec<_> = (0..4i64)
        .map(|i| Arc::clone(&obj).start(&strand, "onMessage", vec![BridgeValue::Int(i)]))
        .collect();
    for handle in &handles {
        let outcome = handle.wait_timeout(Duration::from_secs(5)).expect("call timed out");
        assert_eq!(outcome.unwrap(), BridgeValue::Int(7));
    }
    assert_eq!(recorder.len(), 4);
}

#[test]
fn test_threaded_start_forwards_application_error() {
    let raised = make_error("stream closed", None);
    let to_raise = raised.clone();
    let obj = NativeObject::builder("Svc", ModuleId::new("ballerina", "grpc", "1.0.0"))
        .methods(Arc::new(
            MethodTable::new().with("complete", move |_, _| Err(to_raise.clone().into())),
        ))
        .build();

    let handle = obj.start(&threaded_strand(error_only_value_factory()), "complete", Vec::new());
    let err = handle.wait().unwrap_err();
    assert!(err.as_application().unwrap().ptr_eq(&raised));
}

#[test]
fn test_module_factory_and_error_only_factory_agree_on_errors() {
    let module_factory =
        ModuleValueFactory::builder(ModuleId::new("ballerina", "grpc", "1.0.0")).build();
    let only_errors = error_only_value_factory();
    let cause = make_error("inner", None);

    for factory in [&module_factory as &dyn ValueFactory, only_errors.as_ref()] {
        let err = factory
            .create_error("GrpcError", "outer", Some(cause.clone()), None)
            .unwrap();
        assert_eq!(err.message(), "outer");
        assert!(err.cause().unwrap().ptr_eq(&cause));
    }
}
