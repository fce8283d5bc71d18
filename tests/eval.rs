mod common;

use common::*;
use jdbroker::broker::adapter::{InvokeOutcome, Location, PrimitiveValue, Value};
use jdbroker::broker::error::Error;
use std::sync::Arc;

fn order_value() -> Value {
    Value::Object {
        id: 300,
        type_name: "demo.Order".to_string(),
    }
}

fn world() -> Arc<MockTarget> {
    let target = Arc::new(MockTarget::new());
    target.add_class_full(
        "demo.Cart",
        &[12],
        vec![field("owner", "java.lang.String")],
        vec![],
        false,
    );
    target.add_class_full(
        "demo.Order",
        &[],
        vec![field("total", "long")],
        vec![
            method("demo.Order", "itemCount", &[]),
            method("demo.Order", "sameAs", &["demo.Order"]),
        ],
        false,
    );
    target.add_object(
        300,
        vec![
            (field("total", "long"), Value::Primitive(PrimitiveValue::Long(99))),
            (field("nothing", "demo.Order"), Value::Null),
        ],
    );
    // `this` for the cart frame, with a field resolvable through `this`
    target.add_object(
        200,
        vec![(
            field("owner", "java.lang.String"),
            Value::Str { id: 201, value: "ada".to_string() },
        )],
    );
    target.add_thread(
        1,
        "main",
        true,
        vec![MockFrame {
            location: Location {
                type_name: "demo.Cart".to_string(),
                method_name: "checkout".to_string(),
                method_signature: "()V".to_string(),
                line: 12,
            },
            this: Some(Value::Object {
                id: 200,
                type_name: "demo.Cart".to_string(),
            }),
            locals: vec![
                local("order", "demo.Order", order_value()),
                local("n", "int", int_value(5)),
                local(
                    "items",
                    "int[]",
                    Value::Array {
                        id: 310,
                        type_name: "int[]".to_string(),
                        length: 4,
                    },
                ),
            ],
            args: vec![local("discount", "int", int_value(2))],
        }],
    );
    target
}

#[test]
fn test_literal_evaluation() {
    let target = world();
    let broker = connected_broker(target.clone());

    assert_eq!(broker.evaluate(Some(1), 0, "null").unwrap(), Value::Null);
    assert_eq!(
        broker.evaluate(Some(1), 0, "true").unwrap(),
        Value::Primitive(PrimitiveValue::Boolean(true))
    );
    assert_eq!(
        broker.evaluate(Some(1), 0, "42").unwrap(),
        Value::Primitive(PrimitiveValue::Int(42))
    );
    assert!(matches!(
        broker.evaluate(Some(1), 0, "\"hello\"").unwrap(),
        Value::Str { .. }
    ));
}

#[test]
fn test_name_resolution_order() {
    let target = world();
    let broker = connected_broker(target.clone());

    // local
    assert_eq!(broker.evaluate(Some(1), 0, "n").unwrap(), int_value(5));
    // argument
    assert_eq!(broker.evaluate(Some(1), 0, "discount").unwrap(), int_value(2));
    // field on `this`
    assert!(matches!(
        broker.evaluate(Some(1), 0, "owner").unwrap(),
        Value::Str { .. }
    ));
    // unresolved
    assert!(matches!(
        broker.evaluate(Some(1), 0, "ghost"),
        Err(Error::InvalidExpression(_))
    ));
}

#[test]
fn test_field_chain_and_array_length() {
    let target = world();
    let broker = connected_broker(target.clone());

    assert_eq!(
        broker.evaluate(Some(1), 0, "order.total").unwrap(),
        Value::Primitive(PrimitiveValue::Long(99))
    );
    assert_eq!(
        broker.evaluate(Some(1), 0, "items.length").unwrap(),
        int_value(4)
    );
    assert!(matches!(
        broker.evaluate(Some(1), 0, "order.missing"),
        Err(Error::FieldNotFound(_, _))
    ));
    assert!(matches!(
        broker.evaluate(Some(1), 0, "n.total"),
        Err(Error::TypeMismatch(_))
    ));
}

#[test]
fn test_null_dereference() {
    let target = world();
    let broker = connected_broker(target.clone());

    assert!(matches!(
        broker.evaluate(Some(1), 0, "null.f"),
        Err(Error::NullDereference(_))
    ));
    assert!(matches!(
        broker.evaluate(Some(1), 0, "order.nothing.total"),
        Err(Error::NullDereference(_))
    ));
}

#[test]
fn test_method_calls() {
    let target = world();
    let broker = connected_broker(target.clone());
    target.set_invoke_result(
        "demo.Order.itemCount",
        InvokeOutcome::Return(int_value(7)),
    );

    assert_eq!(
        broker.evaluate(Some(1), 0, "order.itemCount()").unwrap(),
        int_value(7)
    );
    assert!(matches!(
        broker.evaluate(Some(1), 0, "order.itemCount(1)"),
        Err(Error::MethodNotFound(_, _))
    ));

    // `@id` string argument resolves to an object handle
    target.set_invoke_result(
        "demo.Order.sameAs",
        InvokeOutcome::Return(Value::Primitive(PrimitiveValue::Boolean(true))),
    );
    broker
        .evaluate(Some(1), 0, "order.sameAs(\"@300\")")
        .unwrap();
    let invocation = target.invocations().pop().unwrap();
    assert_eq!(invocation.args[0].object_id(), Some(300));
}

#[test]
fn test_thrown_invocation_surfaces() {
    let target = world();
    let broker = connected_broker(target.clone());
    target.set_invoke_result(
        "demo.Order.itemCount",
        InvokeOutcome::Thrown {
            exception_class: "java.lang.IllegalStateException".to_string(),
            object_id: 42,
        },
    );
    assert!(matches!(
        broker.evaluate(Some(1), 0, "order.itemCount()"),
        Err(Error::Thrown { .. })
    ));
}

#[test]
fn test_expression_length_limit() {
    let target = world();
    let broker = connected_broker(target.clone());
    let long = "x".repeat(2000);
    assert!(matches!(
        broker.evaluate(Some(1), 0, &long),
        Err(Error::InvalidExpression(_))
    ));
}

#[test]
fn test_evaluate_requires_suspension() {
    let target = world();
    target.add_thread(9, "runner", false, vec![]);
    let broker = connected_broker(target.clone());
    assert!(matches!(
        broker.evaluate(Some(9), 0, "n"),
        Err(Error::ThreadNotSuspended(_))
    ));
}

#[test]
fn test_watch_expressions_memoise_results() {
    let target = world();
    let broker = connected_broker(target.clone());

    let ok = broker.watches().add("n");
    let bad = broker.watches().add("ghost");

    // watches evaluate against the stop thread; install a stop first
    broker.session().suspend().unwrap();
    let stop = jdbroker::broker::stop::StopReason {
        thread: Some(jdbroker::broker::adapter::ThreadRef {
            id: 1,
            name: "main".to_string(),
        }),
        ..jdbroker::broker::stop::StopReason::user_suspend()
    };
    broker.session().set_stop_reason(stop);

    let watches = broker.evaluate_watches().unwrap();
    assert_eq!(watches.len(), 2);
    let ok_watch = watches.iter().find(|w| w.id == ok.id).unwrap();
    assert_eq!(ok_watch.last_value.as_deref(), Some("5"));
    assert!(ok_watch.last_error.is_none());

    let bad_watch = watches.iter().find(|w| w.id == bad.id).unwrap();
    assert!(bad_watch.last_value.is_none());
    assert!(bad_watch.last_error.is_some());
}
