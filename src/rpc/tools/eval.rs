//! Evaluation, mutation and watch-expression tools.

use super::{json_array, opt_u64, opt_usize, required_object_id, required_str};
use crate::broker::error::Error;
use crate::broker::render;
use crate::broker::watch::WatchExpression;
use crate::broker::Broker;
use itertools::Itertools;
use serde_json::Value as Json;

pub(super) fn evaluate_expression(broker: &Broker, args: &Json) -> Result<String, Error> {
    let value = broker.evaluate(
        opt_u64(args, "threadId"),
        opt_usize(args, "frameIndex", 0),
        required_str(args, "expression")?,
    )?;
    Ok(render::value_with_id(&value))
}

pub(super) fn set_variable(broker: &Broker, args: &Json) -> Result<String, Error> {
    let var = broker.set_variable(
        opt_u64(args, "threadId"),
        opt_usize(args, "frameIndex", 0),
        required_str(args, "name")?,
        required_str(args, "value")?,
    )?;
    Ok(format!("set {}", render::local_line(&var)))
}

pub(super) fn invoke_method(broker: &Broker, args: &Json) -> Result<String, Error> {
    let value = broker.invoke_instance(
        opt_u64(args, "threadId"),
        required_object_id(args, "objectId")?,
        required_str(args, "methodName")?,
        &json_array(args, "arguments"),
    )?;
    Ok(render::value_with_id(&value))
}

pub(super) fn invoke_static(broker: &Broker, args: &Json) -> Result<String, Error> {
    let value = broker.invoke_static(
        opt_u64(args, "threadId"),
        required_str(args, "className")?,
        required_str(args, "methodName")?,
        &json_array(args, "arguments"),
    )?;
    Ok(render::value_with_id(&value))
}

// ------------------------------- watch expressions -----------------------------------------------

fn watch_line(watch: &WatchExpression) -> String {
    let mut out = format!("{} `{}`", watch.id, watch.source);
    match (&watch.last_value, &watch.last_error) {
        (Some(value), _) => out.push_str(&format!(" = {value}")),
        (None, Some(error)) => out.push_str(&format!(" ! {error}")),
        (None, None) => out.push_str(" (never evaluated)"),
    }
    out
}

pub(super) fn watch_add(broker: &Broker, args: &Json) -> Result<String, Error> {
    let watch = broker.watches().add(required_str(args, "expression")?);
    Ok(format!("{} `{}` added", watch.id, watch.source))
}

pub(super) fn watch_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let id = required_str(args, "watchId")?;
    broker
        .watches()
        .remove(id)
        .map(|watch| format!("removed {}", watch.id))
        .ok_or_else(|| Error::UnknownId(id.to_string()))
}

pub(super) fn watch_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let watches = broker.watches().list();
    if watches.is_empty() {
        return Ok("no watch expressions".to_string());
    }
    Ok(watches.iter().map(watch_line).join("\n"))
}

pub(super) fn watch_evaluate_all(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let watches = broker.evaluate_watches()?;
    if watches.is_empty() {
        return Ok("no watch expressions".to_string());
    }
    Ok(watches.iter().map(watch_line).join("\n"))
}
