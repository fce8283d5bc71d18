//! Method invocation on a suspended thread, plus the explicit decoders that
//! turn wire JSON and text into target values against adapter-declared
//! parameter types. Unknown combinations fail instead of coercing.

use crate::broker::adapter::{
    DebugTarget, InvokeOutcome, MethodRef, PrimitiveValue, TypeRef, Value,
};
use crate::broker::error::Error;
use crate::broker::Broker;
use serde_json::Value as Json;

impl Broker {
    /// Invoke an instance method on the object with the given unique id.
    pub fn invoke_instance(
        &self,
        thread_id: Option<u64>,
        object_id: u64,
        method_name: &str,
        args: &[Json],
    ) -> Result<Value, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;

        let object = self.find_object(object_id)?;
        let type_name = object.type_name();
        let type_ref = target
            .classes_by_name(&type_name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::ClassNotFound(type_name.clone()))?;

        let (method, values) =
            self.pick_and_marshal(&*target, &type_ref, method_name, args, false)?;
        let outcome = target.invoke_instance(&thread, object_id, &method, &values)?;
        finish(outcome)
    }

    /// Invoke a static method on a class.
    pub fn invoke_static(
        &self,
        thread_id: Option<u64>,
        class_name: &str,
        method_name: &str,
        args: &[Json],
    ) -> Result<Value, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;

        let type_ref = target
            .classes_by_name(class_name)
            .into_iter()
            .next()
            .ok_or_else(|| Error::ClassNotFound(class_name.to_string()))?;

        let (method, values) =
            self.pick_and_marshal(&*target, &type_ref, method_name, args, true)?;
        let outcome = target.invoke_static(&thread, &type_ref, &method, &values)?;
        finish(outcome)
    }

    /// Choose an overload by name and arity, then marshal the JSON
    /// arguments against its parameter types. When several overloads share
    /// the arity, the first one that accepts the arguments wins; if none
    /// does, the call is ambiguous rather than silently coerced.
    fn pick_and_marshal(
        &self,
        target: &dyn DebugTarget,
        type_ref: &TypeRef,
        method_name: &str,
        args: &[Json],
        want_static: bool,
    ) -> Result<(MethodRef, Vec<Value>), Error> {
        let candidates: Vec<MethodRef> = target
            .methods(type_ref)?
            .into_iter()
            .filter(|m| m.name == method_name && m.arity() == args.len())
            .filter(|m| !want_static || m.is_static)
            .collect();
        if candidates.is_empty() {
            return Err(Error::MethodNotFound(
                type_ref.name.clone(),
                method_name.to_string(),
            ));
        }

        let mut first_error = None;
        let ambiguous = candidates.len() > 1;
        for method in candidates {
            match self.marshal_args(target, args, &method.param_types) {
                Ok(values) => return Ok((method, values)),
                Err(e) => first_error = first_error.or(Some(e)),
            }
        }
        if ambiguous {
            Err(Error::OverloadAmbiguous(format!(
                "no `{method_name}` overload accepts the given arguments"
            )))
        } else {
            Err(first_error.unwrap_or_else(|| {
                Error::MethodNotFound(type_ref.name.clone(), method_name.to_string())
            }))
        }
    }

    fn marshal_args(
        &self,
        target: &dyn DebugTarget,
        args: &[Json],
        param_types: &[String],
    ) -> Result<Vec<Value>, Error> {
        args.iter()
            .zip(param_types)
            .map(|(json, ty)| self.json_to_value(target, json, ty))
            .collect()
    }

    /// Decode one JSON argument against a declared parameter type.
    pub fn json_to_value(
        &self,
        target: &dyn DebugTarget,
        json: &Json,
        param_type: &str,
    ) -> Result<Value, Error> {
        let mismatch = || Error::TypeMismatch(format!("cannot pass {json} as `{param_type}`"));
        match param_type {
            "boolean" => json
                .as_bool()
                .map(|v| Value::Primitive(PrimitiveValue::Boolean(v)))
                .ok_or_else(mismatch),
            "byte" => int_arg(json).and_then(|v| i8::try_from(v).ok())
                .map(|v| Value::Primitive(PrimitiveValue::Byte(v)))
                .ok_or_else(mismatch),
            "short" => int_arg(json).and_then(|v| i16::try_from(v).ok())
                .map(|v| Value::Primitive(PrimitiveValue::Short(v)))
                .ok_or_else(mismatch),
            "int" => int_arg(json).and_then(|v| i32::try_from(v).ok())
                .map(|v| Value::Primitive(PrimitiveValue::Int(v)))
                .ok_or_else(mismatch),
            "long" => int_arg(json)
                .map(|v| Value::Primitive(PrimitiveValue::Long(v)))
                .ok_or_else(mismatch),
            "char" => json
                .as_str()
                .and_then(|s| {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                })
                .map(|c| Value::Primitive(PrimitiveValue::Char(c)))
                .ok_or_else(mismatch),
            "float" => json
                .as_f64()
                .map(|v| Value::Primitive(PrimitiveValue::Float(v as f32)))
                .ok_or_else(mismatch),
            "double" => json
                .as_f64()
                .map(|v| Value::Primitive(PrimitiveValue::Double(v)))
                .ok_or_else(mismatch),
            _ => {
                // reference types: null, an @id handle, or a string for
                // java.lang.String parameters
                if json.is_null() {
                    return Ok(Value::Null);
                }
                if let Some(text) = json.as_str() {
                    if let Some(id_text) = text.strip_prefix('@') {
                        let id = id_text.parse::<u64>().map_err(|_| {
                            Error::TypeMismatch(format!("malformed object handle `{text}`"))
                        })?;
                        return self.find_object(id);
                    }
                    if param_type == "java.lang.String" || param_type == "java.lang.Object" {
                        return Ok(target.mirror_string(text)?);
                    }
                }
                Err(mismatch())
            }
        }
    }

    /// Decode a plain-text value for `set_variable`: a primitive literal, a
    /// (optionally quoted) string, `null`, or an `@id` object reference.
    pub fn text_to_value(
        &self,
        target: &dyn DebugTarget,
        text: &str,
        declared_type: &str,
    ) -> Result<Value, Error> {
        if text == "null" {
            return Ok(Value::Null);
        }
        if let Some(id_text) = text.strip_prefix('@') {
            let id = id_text
                .parse::<u64>()
                .map_err(|_| Error::TypeMismatch(format!("malformed object handle `{text}`")))?;
            return self.find_object(id);
        }

        let mismatch =
            || Error::TypeMismatch(format!("cannot parse `{text}` as `{declared_type}`"));
        match declared_type {
            "boolean" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Boolean(v)))
                .map_err(|_| mismatch()),
            "byte" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Byte(v)))
                .map_err(|_| mismatch()),
            "short" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Short(v)))
                .map_err(|_| mismatch()),
            "int" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Int(v)))
                .map_err(|_| mismatch()),
            "long" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Long(v)))
                .map_err(|_| mismatch()),
            "char" => {
                let unquoted = text.trim_matches('\'');
                let mut chars = unquoted.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Primitive(PrimitiveValue::Char(c))),
                    _ => Err(mismatch()),
                }
            }
            "float" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Float(v)))
                .map_err(|_| mismatch()),
            "double" => text
                .parse()
                .map(|v| Value::Primitive(PrimitiveValue::Double(v)))
                .map_err(|_| mismatch()),
            _ => {
                let unquoted = text
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(text);
                Ok(target.mirror_string(unquoted)?)
            }
        }
    }
}

fn finish(outcome: InvokeOutcome) -> Result<Value, Error> {
    match outcome {
        InvokeOutcome::Return(value) => Ok(value),
        InvokeOutcome::Thrown {
            exception_class,
            object_id,
        } => Err(Error::Thrown {
            exception_class,
            object_id,
        }),
    }
}

fn int_arg(json: &Json) -> Option<i64> {
    json.as_i64()
}
