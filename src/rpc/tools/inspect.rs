//! Thread, frame, variable and object inspection tools.

use super::{opt_i64, opt_u64, opt_usize, required_i64, required_object_id, required_str};
use crate::broker::error::Error;
use crate::broker::inspect::DEFAULT_ARRAY_COUNT;
use crate::broker::render;
use crate::broker::Broker;
use itertools::Itertools;
use serde_json::Value as Json;

pub(super) fn threads_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let threads = broker.threads_overview()?;
    if threads.is_empty() {
        return Ok("no threads".to_string());
    }
    Ok(threads
        .iter()
        .map(|(thread, suspended)| {
            format!(
                "{thread} [{}]",
                if *suspended { "suspended" } else { "running" }
            )
        })
        .join("\n"))
}

pub(super) fn thread_suspend(broker: &Broker, args: &Json) -> Result<String, Error> {
    let id = required_i64(args, "threadId")? as u64;
    let thread = broker.suspend_thread(Some(id))?;
    Ok(format!("suspended thread {thread}"))
}

pub(super) fn thread_resume(broker: &Broker, args: &Json) -> Result<String, Error> {
    let id = required_i64(args, "threadId")? as u64;
    let thread = broker.resume_thread(Some(id))?;
    Ok(format!("resumed thread {thread}"))
}

pub(super) fn stack_frames(broker: &Broker, args: &Json) -> Result<String, Error> {
    let frames = broker.stack_frames(opt_u64(args, "threadId"))?;
    if frames.is_empty() {
        return Ok("no frames".to_string());
    }
    Ok(frames
        .iter()
        .map(|frame| format!("#{} {}", frame.index, frame.location))
        .join("\n"))
}

pub(super) fn variables_local(broker: &Broker, args: &Json) -> Result<String, Error> {
    let locals =
        broker.local_variables(opt_u64(args, "threadId"), opt_usize(args, "frameIndex", 0))?;
    if locals.is_empty() {
        return Ok("no visible locals".to_string());
    }
    Ok(locals.iter().map(render::local_line).join("\n"))
}

pub(super) fn variables_arguments(broker: &Broker, args: &Json) -> Result<String, Error> {
    let arguments =
        broker.frame_arguments(opt_u64(args, "threadId"), opt_usize(args, "frameIndex", 0))?;
    if arguments.is_empty() {
        return Ok("no arguments".to_string());
    }
    Ok(arguments.iter().map(render::local_line).join("\n"))
}

pub(super) fn variable_inspect(broker: &Broker, args: &Json) -> Result<String, Error> {
    broker.inspect_variable(
        opt_u64(args, "threadId"),
        opt_usize(args, "frameIndex", 0),
        required_str(args, "name")?,
    )
}

pub(super) fn this_object(broker: &Broker, args: &Json) -> Result<String, Error> {
    let this = broker.this_object(opt_u64(args, "threadId"), opt_usize(args, "frameIndex", 0))?;
    Ok(match this {
        Some(value) => render::value_with_id(&value),
        None => "no `this` (static frame)".to_string(),
    })
}

pub(super) fn object_fields(broker: &Broker, args: &Json) -> Result<String, Error> {
    broker.object_fields(required_object_id(args, "objectId")?)
}

pub(super) fn array_elements(broker: &Broker, args: &Json) -> Result<String, Error> {
    let id = required_object_id(args, "objectId")?;
    let start = opt_i64(args, "startIndex", 0) as i32;
    let count = opt_i64(args, "count", DEFAULT_ARRAY_COUNT as i64) as i32;
    let (length, values) = broker.array_elements(id, start, count)?;
    let rendered = values
        .iter()
        .enumerate()
        .map(|(offset, value)| {
            format!("[{}] {}", start + offset as i32, render::value_with_id(value))
        })
        .join("\n");
    Ok(format!("length {length}\n{rendered}"))
}

pub(super) fn async_stack_trace(broker: &Broker, _args: &Json) -> Result<String, Error> {
    broker.async_stack_summary()
}
