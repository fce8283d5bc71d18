//! Textual rendering of target values for client-facing output.

use crate::broker::adapter::{LocalVar, Value};

/// Compact one-token rendering, used inside detail maps and lists.
pub fn value_brief(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Primitive(p) => p.to_string(),
        Value::Str { value, .. } => format!("\"{value}\""),
        Value::Array {
            type_name, length, ..
        } => format!("{type_name} (length={length})"),
        Value::Object { type_name, id } => format!("{type_name}@{id}"),
    }
}

/// Rendering that keeps the object id visible so a client can feed it back
/// through an `@id` reference.
pub fn value_with_id(value: &Value) -> String {
    match value {
        Value::Str { id, value } => format!("\"{value}\" (@{id})"),
        Value::Array {
            id,
            type_name,
            length,
        } => format!("{type_name} (length={length}, @{id})"),
        Value::Object { id, type_name } => format!("{type_name} (@{id})"),
        other => value_brief(other),
    }
}

pub fn local_line(var: &LocalVar) -> String {
    format!("{} {} = {}", var.type_name, var.name, value_with_id(&var.value))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::broker::adapter::PrimitiveValue;

    #[test]
    fn test_value_rendering() {
        assert_eq!(value_brief(&Value::Null), "null");
        assert_eq!(
            value_brief(&Value::Primitive(PrimitiveValue::Int(42))),
            "42"
        );
        assert_eq!(
            value_brief(&Value::Str {
                id: 7,
                value: "hi".to_string()
            }),
            "\"hi\""
        );
        assert_eq!(
            value_with_id(&Value::Object {
                id: 99,
                type_name: "demo.Account".to_string()
            }),
            "demo.Account (@99)"
        );
        assert_eq!(
            value_brief(&Value::Array {
                id: 3,
                type_name: "int[]".to_string(),
                length: 8
            }),
            "int[] (length=8)"
        );
    }
}
