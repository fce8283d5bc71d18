//! Breakpoint, watchpoint, method-breakpoint and exception-breakpoint
//! tools.

use super::{opt_bool, opt_str, required_i64, required_str};
use crate::broker::breakpoint::BreakpointView;
use crate::broker::error::Error;
use crate::broker::exception::ExceptionBreakpointView;
use crate::broker::method_breakpoint::{MethodBreakKind, MethodBreakpointView};
use crate::broker::watchpoint::{WatchKind, WatchpointView};
use crate::broker::Broker;
use itertools::Itertools;
use serde_json::Value as Json;

fn state_of(enabled: bool, pending: bool) -> &'static str {
    match (pending, enabled) {
        (true, _) => "pending",
        (false, true) => "enabled",
        (false, false) => "disabled",
    }
}

fn breakpoint_line(view: &BreakpointView) -> String {
    format!(
        "{} {}:{} [{}] hits={}",
        view.id,
        view.class_name,
        view.line,
        state_of(view.enabled, view.pending),
        view.hit_count
    )
}

fn watchpoint_line(view: &WatchpointView) -> String {
    format!(
        "{} {} {}.{} [{}]",
        view.id,
        view.kind,
        view.class_name,
        view.field_name,
        state_of(view.enabled, view.pending)
    )
}

fn method_breakpoint_line(view: &MethodBreakpointView) -> String {
    format!(
        "{} {} {}.{} [{}]",
        view.id,
        view.kind,
        view.class_name,
        view.method_name.as_deref().unwrap_or("*"),
        state_of(view.enabled, view.pending)
    )
}

fn exception_line(view: &ExceptionBreakpointView) -> String {
    format!(
        "{} {} caught={} uncaught={} [{}]",
        view.id,
        view.exception_class.as_deref().unwrap_or("*"),
        view.catch_caught,
        view.catch_uncaught,
        state_of(view.enabled, false)
    )
}

// ------------------------------- line breakpoints ------------------------------------------------

pub(super) fn breakpoint_set(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let class_name = required_str(args, "className")?;
    let line = required_i64(args, "lineNumber")? as i32;
    let view = broker.breakpoints().set(&*target, class_name, line)?;
    Ok(breakpoint_line(&view))
}

pub(super) fn breakpoint_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "breakpointId")?;
    let view = broker.breakpoints().remove(&*target, id)?;
    Ok(format!("removed {}", view.id))
}

pub(super) fn breakpoint_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let views = broker.breakpoints().list();
    if views.is_empty() {
        return Ok("no breakpoints".to_string());
    }
    Ok(views.iter().map(breakpoint_line).join("\n"))
}

pub(super) fn breakpoint_enable(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "breakpointId")?;
    let view = broker.breakpoints().set_enabled(&*target, id, true)?;
    Ok(breakpoint_line(&view))
}

pub(super) fn breakpoint_disable(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "breakpointId")?;
    let view = broker.breakpoints().set_enabled(&*target, id, false)?;
    Ok(breakpoint_line(&view))
}

// ------------------------------- watchpoints -----------------------------------------------------

pub(super) fn watchpoint_access(broker: &Broker, args: &Json) -> Result<String, Error> {
    set_watchpoint(broker, args, WatchKind::Access)
}

pub(super) fn watchpoint_modification(broker: &Broker, args: &Json) -> Result<String, Error> {
    set_watchpoint(broker, args, WatchKind::Modify)
}

fn set_watchpoint(broker: &Broker, args: &Json, kind: WatchKind) -> Result<String, Error> {
    let target = broker.target()?;
    let class_name = required_str(args, "className")?;
    let field_name = required_str(args, "fieldName")?;
    let view = broker
        .watchpoints()
        .set(&*target, class_name, field_name, kind)?;
    Ok(watchpoint_line(&view))
}

pub(super) fn watchpoint_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "watchpointId")?;
    let view = broker.watchpoints().remove(&*target, id)?;
    Ok(format!("removed {}", view.id))
}

pub(super) fn watchpoint_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let views = broker.watchpoints().list();
    if views.is_empty() {
        return Ok("no watchpoints".to_string());
    }
    Ok(views.iter().map(watchpoint_line).join("\n"))
}

// ------------------------------- method breakpoints ----------------------------------------------

pub(super) fn method_entry_break(broker: &Broker, args: &Json) -> Result<String, Error> {
    set_method_breakpoint(broker, args, MethodBreakKind::Entry)
}

pub(super) fn method_exit_break(broker: &Broker, args: &Json) -> Result<String, Error> {
    set_method_breakpoint(broker, args, MethodBreakKind::Exit)
}

fn set_method_breakpoint(
    broker: &Broker,
    args: &Json,
    kind: MethodBreakKind,
) -> Result<String, Error> {
    let target = broker.target()?;
    let class_name = required_str(args, "className")?;
    let method_name = opt_str(args, "methodName");
    let view = broker
        .method_breakpoints()
        .set(&*target, class_name, method_name, kind)?;
    Ok(method_breakpoint_line(&view))
}

pub(super) fn method_breakpoint_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "breakpointId")?;
    let view = broker.method_breakpoints().remove(&*target, id)?;
    Ok(format!("removed {}", view.id))
}

pub(super) fn method_breakpoint_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let views = broker.method_breakpoints().list();
    if views.is_empty() {
        return Ok("no method breakpoints".to_string());
    }
    Ok(views.iter().map(method_breakpoint_line).join("\n"))
}

// ------------------------------- exception breakpoints -------------------------------------------

pub(super) fn exception_break_on(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let class = opt_str(args, "exceptionClass");
    let caught = opt_bool(args, "caught", true);
    let uncaught = opt_bool(args, "uncaught", true);
    let view = broker.exceptions().set(&*target, class, caught, uncaught)?;
    Ok(exception_line(&view))
}

pub(super) fn exception_break_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "breakpointId")?;
    let view = broker.exceptions().remove(&*target, id)?;
    Ok(format!("removed {}", view.id))
}

pub(super) fn exception_break_list(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let views = broker.exceptions().list();
    if views.is_empty() {
        return Ok("no exception breakpoints".to_string());
    }
    Ok(views.iter().map(exception_line).join("\n"))
}

pub(super) fn exception_info(broker: &Broker, _args: &Json) -> Result<String, Error> {
    broker.exception_info()
}
