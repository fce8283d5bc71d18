//! Narrow-grammar expression evaluator used by `evaluate_expression` and
//! the watch-expression store. Deliberately limited: bare names, `this`,
//! literals and dot-chains of field reads and method calls.

pub mod parser;

use crate::broker::adapter::{
    DebugTarget, FrameRef, InvokeOutcome, MethodRef, PrimitiveValue, ThreadRef, Value,
};
use crate::broker::error::Error;
use std::fmt;

/// Upper bound on expression source length; the grammar bounds recursion by
/// source length, so this also bounds evaluation depth.
pub const MAX_EXPRESSION_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    This,
    Name(String),
    Field(Box<Expr>, String),
    Call(Box<Expr>, String, Vec<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(Literal::Null) => write!(f, "null"),
            Expr::Literal(Literal::Bool(v)) => write!(f, "{v}"),
            Expr::Literal(Literal::Int(v)) => write!(f, "{v}"),
            Expr::Literal(Literal::Float(v)) => write!(f, "{v}"),
            Expr::Literal(Literal::Char(c)) => write!(f, "'{c}'"),
            Expr::Literal(Literal::Str(s)) => write!(f, "\"{s}\""),
            Expr::This => write!(f, "this"),
            Expr::Name(n) => write!(f, "{n}"),
            Expr::Field(recv, name) => write!(f, "{recv}.{name}"),
            Expr::Call(recv, name, _) => write!(f, "{recv}.{name}(..)"),
        }
    }
}

/// Resolves `@id` object handles; implemented by the broker via the
/// object-by-id frame scan.
pub trait ObjectLookup {
    fn object_by_id(&self, id: u64) -> Result<Value, Error>;
}

pub struct EvalContext<'a> {
    pub target: &'a dyn DebugTarget,
    pub thread: &'a ThreadRef,
    pub frame: &'a FrameRef,
    pub lookup: &'a dyn ObjectLookup,
}

pub fn evaluate(ctx: &EvalContext, source: &str) -> Result<Value, Error> {
    if source.len() > MAX_EXPRESSION_LEN {
        return Err(Error::InvalidExpression(format!(
            "expression longer than {MAX_EXPRESSION_LEN} bytes"
        )));
    }
    let expr = parser::parse(source).map_err(Error::InvalidExpression)?;
    eval_expr(ctx, &expr)
}

fn eval_expr(ctx: &EvalContext, expr: &Expr) -> Result<Value, Error> {
    match expr {
        Expr::Literal(literal) => eval_literal(ctx, literal),
        Expr::This => ctx
            .target
            .this_object(ctx.frame)?
            .ok_or_else(|| Error::InvalidExpression("no `this` in a static frame".to_string())),
        Expr::Name(name) => resolve_name(ctx, name),
        Expr::Field(receiver, name) => {
            let value = eval_expr(ctx, receiver)?;
            read_member(ctx, &value, name, receiver)
        }
        Expr::Call(receiver, name, args) => {
            let value = eval_expr(ctx, receiver)?;
            call_method(ctx, &value, name, args, receiver)
        }
    }
}

fn eval_literal(ctx: &EvalContext, literal: &Literal) -> Result<Value, Error> {
    Ok(match literal {
        Literal::Null => Value::Null,
        Literal::Bool(v) => Value::Primitive(PrimitiveValue::Boolean(*v)),
        Literal::Int(v) => {
            if let Ok(small) = i32::try_from(*v) {
                Value::Primitive(PrimitiveValue::Int(small))
            } else {
                Value::Primitive(PrimitiveValue::Long(*v))
            }
        }
        Literal::Float(v) => Value::Primitive(PrimitiveValue::Double(*v)),
        Literal::Char(c) => Value::Primitive(PrimitiveValue::Char(*c)),
        Literal::Str(s) => ctx.target.mirror_string(s)?,
    })
}

/// Bare-name resolution order: visible local, argument, then a field on the
/// frame's `this`.
fn resolve_name(ctx: &EvalContext, name: &str) -> Result<Value, Error> {
    if let Some(local) = ctx
        .target
        .visible_locals(ctx.frame)?
        .into_iter()
        .find(|v| v.name == name)
    {
        return Ok(local.value);
    }
    if let Some(arg) = ctx
        .target
        .arguments(ctx.frame)?
        .into_iter()
        .find(|v| v.name == name)
    {
        return Ok(arg.value);
    }
    if let Some(this) = ctx.target.this_object(ctx.frame)? {
        if let Some(id) = this.object_id() {
            if let Some(value) = ctx.target.get_field(id, name)? {
                return Ok(value);
            }
        }
    }
    Err(Error::InvalidExpression(format!(
        "cannot resolve name `{name}`"
    )))
}

fn read_member(
    ctx: &EvalContext,
    value: &Value,
    name: &str,
    receiver: &Expr,
) -> Result<Value, Error> {
    match value {
        Value::Null => Err(Error::NullDereference(receiver.to_string())),
        Value::Object { id, type_name } => ctx
            .target
            .get_field(*id, name)?
            .ok_or_else(|| Error::FieldNotFound(type_name.clone(), name.to_string())),
        Value::Array { length, .. } if name == "length" => {
            Ok(Value::Primitive(PrimitiveValue::Int(*length)))
        }
        other => Err(Error::TypeMismatch(format!(
            "`{receiver}` ({}) has no field `{name}`",
            other.type_name()
        ))),
    }
}

fn call_method(
    ctx: &EvalContext,
    value: &Value,
    name: &str,
    args: &[Expr],
    receiver: &Expr,
) -> Result<Value, Error> {
    let (object_id, type_name) = match value {
        Value::Null => return Err(Error::NullDereference(receiver.to_string())),
        Value::Object { id, type_name } => (*id, type_name.clone()),
        Value::Str { id, .. } => (*id, "java.lang.String".to_string()),
        other => {
            return Err(Error::TypeMismatch(format!(
                "cannot invoke `{name}` on {} value `{receiver}`",
                other.type_name()
            )))
        }
    };

    let method = pick_overload(ctx.target, &type_name, name, args.len())?;

    let mut arg_values = Vec::with_capacity(args.len());
    for arg in args {
        arg_values.push(eval_argument(ctx, arg)?);
    }

    match ctx
        .target
        .invoke_instance(ctx.thread, object_id, &method, &arg_values)?
    {
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

/// Coarse overload resolution: the first method whose arity matches, ties
/// broken by declaration order.
fn pick_overload(
    target: &dyn DebugTarget,
    type_name: &str,
    name: &str,
    arity: usize,
) -> Result<MethodRef, Error> {
    let classes = target.classes_by_name(type_name);
    let type_ref = classes
        .first()
        .ok_or_else(|| Error::ClassNotFound(type_name.to_string()))?;
    target
        .methods(type_ref)?
        .into_iter()
        .find(|m| m.name == name && m.arity() == arity)
        .ok_or_else(|| Error::MethodNotFound(type_name.to_string(), name.to_string()))
}

/// Argument evaluation with the `@id` convention: a string literal starting
/// with `@` denotes an object handle, not a string.
fn eval_argument(ctx: &EvalContext, arg: &Expr) -> Result<Value, Error> {
    if let Expr::Literal(Literal::Str(s)) = arg {
        if let Some(id_text) = s.strip_prefix('@') {
            let id = id_text
                .parse::<u64>()
                .map_err(|_| Error::InvalidExpression(format!("malformed object handle `{s}`")))?;
            return ctx.lookup.object_by_id(id);
        }
    }
    eval_expr(ctx, arg)
}
