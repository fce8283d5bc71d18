//! Execution control tools.

use super::{opt_i64, opt_str, opt_u64, required_i64, required_str};
use crate::broker::adapter::StepDepth;
use crate::broker::error::Error;
use crate::broker::Broker;
use serde_json::Value as Json;
use std::time::{Duration, Instant};

pub(super) fn resume(broker: &Broker, _args: &Json) -> Result<String, Error> {
    broker.session().resume()?;
    Ok("resumed".to_string())
}

pub(super) fn suspend(broker: &Broker, _args: &Json) -> Result<String, Error> {
    broker.session().suspend()?;
    Ok("suspended (USER_SUSPEND)".to_string())
}

pub(super) fn step_into(broker: &Broker, args: &Json) -> Result<String, Error> {
    let thread = broker.step(opt_u64(args, "threadId"), StepDepth::Into)?;
    Ok(format!("stepping into in thread {thread}"))
}

pub(super) fn step_over(broker: &Broker, args: &Json) -> Result<String, Error> {
    let thread = broker.step(opt_u64(args, "threadId"), StepDepth::Over)?;
    Ok(format!("stepping over in thread {thread}"))
}

pub(super) fn step_out(broker: &Broker, args: &Json) -> Result<String, Error> {
    let thread = broker.step(opt_u64(args, "threadId"), StepDepth::Out)?;
    Ok(format!("stepping out in thread {thread}"))
}

pub(super) fn wait_for_stop(broker: &Broker, args: &Json) -> Result<String, Error> {
    // require a session before blocking
    broker.target()?;
    let timeout_s = opt_i64(args, "timeout", 30).clamp(0, 300);
    let started = Instant::now();
    let reason = broker
        .session()
        .wait_for_stop(Duration::from_secs(timeout_s as u64));
    let waited_ms = started.elapsed().as_millis();
    if reason.is_stopped() {
        Ok(format!(
            "stopped: {} (waited {waited_ms}ms)",
            reason.describe()
        ))
    } else {
        Ok(format!(
            "not stopped after {waited_ms}ms, target still running"
        ))
    }
}

pub(super) fn run_to_line(broker: &Broker, args: &Json) -> Result<String, Error> {
    let class_name = required_str(args, "className")?;
    let line = required_i64(args, "lineNumber")? as i32;
    let timeout_s = opt_i64(args, "timeout", 30).clamp(1, 300);
    let outcome = broker.run_to_line(class_name, line, Duration::from_secs(timeout_s as u64))?;
    if outcome.reached {
        Ok(format!("reached {class_name}:{line}"))
    } else if outcome.stop.is_stopped() {
        Ok(format!(
            "stopped before reaching {class_name}:{line}: {}",
            outcome.stop.describe()
        ))
    } else {
        Ok(format!(
            "{class_name}:{line} not reached within {timeout_s}s, target still running"
        ))
    }
}

pub(super) fn smart_step_into(broker: &Broker, args: &Json) -> Result<String, Error> {
    let thread_id = opt_u64(args, "threadId");
    match opt_str(args, "targetClass") {
        Some(target_class) => {
            let thread = broker.smart_step_into(thread_id, Some(target_class))?;
            Ok(format!(
                "stepping into `{target_class}` methods in thread {thread}"
            ))
        }
        None => {
            let candidates = broker.smart_step_candidates(thread_id)?;
            if candidates.is_empty() {
                Ok("no callable methods found on the current line".to_string())
            } else {
                Ok(format!(
                    "callable methods (pass one's class as targetClass):\n{}",
                    candidates.join("\n")
                ))
            }
        }
    }
}

pub(super) fn execution_location(broker: &Broker, _args: &Json) -> Result<String, Error> {
    broker.execution_location()
}
