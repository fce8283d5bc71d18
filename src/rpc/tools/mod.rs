//! Tool surface: name -> handler dispatch, parameter extraction and the
//! static catalog served by `tools/list`.

mod breakpoints;
mod eval;
mod execution;
mod inspect;
mod monitor;
mod session;

use crate::broker::error::Error;
use crate::broker::Broker;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{json, Value as Json};

pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

/// Run one tool. Every enumerated error kind maps to an `isError` envelope;
/// nothing escapes to the transport.
pub fn dispatch(broker: &Broker, name: &str, args: &Json) -> ToolOutcome {
    let result = match name {
        // session
        "ping" => session::ping(broker, args),
        "debug_launch" => session::debug_launch(broker, args),
        "debug_attach_socket" => session::debug_attach_socket(broker, args),
        "debug_attach_pid" => session::debug_attach_pid(broker, args),
        "debug_disconnect" => session::debug_disconnect(broker, args),
        "debug_status" => session::debug_status(broker, args),
        "vm_info" => session::vm_info(broker, args),

        // execution
        "resume" => execution::resume(broker, args),
        "suspend" => execution::suspend(broker, args),
        "step_into" => execution::step_into(broker, args),
        "step_over" => execution::step_over(broker, args),
        "step_out" => execution::step_out(broker, args),
        "wait_for_stop" => execution::wait_for_stop(broker, args),
        "run_to_line" => execution::run_to_line(broker, args),
        "smart_step_into" => execution::smart_step_into(broker, args),
        "execution_location" => execution::execution_location(broker, args),

        // line breakpoints
        "breakpoint_set" => breakpoints::breakpoint_set(broker, args),
        "breakpoint_remove" => breakpoints::breakpoint_remove(broker, args),
        "breakpoint_list" => breakpoints::breakpoint_list(broker, args),
        "breakpoint_enable" => breakpoints::breakpoint_enable(broker, args),
        "breakpoint_disable" => breakpoints::breakpoint_disable(broker, args),

        // watchpoints
        "watchpoint_access" => breakpoints::watchpoint_access(broker, args),
        "watchpoint_modification" => breakpoints::watchpoint_modification(broker, args),
        "watchpoint_remove" => breakpoints::watchpoint_remove(broker, args),
        "watchpoint_list" => breakpoints::watchpoint_list(broker, args),

        // method breakpoints
        "method_entry_break" => breakpoints::method_entry_break(broker, args),
        "method_exit_break" => breakpoints::method_exit_break(broker, args),
        "method_breakpoint_remove" => breakpoints::method_breakpoint_remove(broker, args),
        "method_breakpoint_list" => breakpoints::method_breakpoint_list(broker, args),

        // exception breakpoints
        "exception_break_on" => breakpoints::exception_break_on(broker, args),
        "exception_break_remove" => breakpoints::exception_break_remove(broker, args),
        "exception_break_list" => breakpoints::exception_break_list(broker, args),
        "exception_info" => breakpoints::exception_info(broker, args),

        // inspection
        "threads_list" => inspect::threads_list(broker, args),
        "thread_suspend" => inspect::thread_suspend(broker, args),
        "thread_resume" => inspect::thread_resume(broker, args),
        "stack_frames" => inspect::stack_frames(broker, args),
        "variables_local" => inspect::variables_local(broker, args),
        "variables_arguments" => inspect::variables_arguments(broker, args),
        "variable_inspect" => inspect::variable_inspect(broker, args),
        "this_object" => inspect::this_object(broker, args),
        "object_fields" => inspect::object_fields(broker, args),
        "array_elements" => inspect::array_elements(broker, args),
        "async_stack_trace" => inspect::async_stack_trace(broker, args),

        // mutation / evaluation
        "evaluate_expression" => eval::evaluate_expression(broker, args),
        "set_variable" => eval::set_variable(broker, args),
        "invoke_method" => eval::invoke_method(broker, args),
        "invoke_static" => eval::invoke_static(broker, args),

        // watch expressions
        "watch_add" => eval::watch_add(broker, args),
        "watch_remove" => eval::watch_remove(broker, args),
        "watch_list" => eval::watch_list(broker, args),
        "watch_evaluate_all" => eval::watch_evaluate_all(broker, args),

        // event monitoring
        "class_prepare_watch" => monitor::class_prepare_watch(broker, args),
        "class_unload_watch" => monitor::class_unload_watch(broker, args),
        "thread_start_watch" => monitor::thread_start_watch(broker, args),
        "thread_death_watch" => monitor::thread_death_watch(broker, args),
        "monitor_contention_watch" => monitor::monitor_contention_watch(broker, args),
        "events_pending" => monitor::events_pending(broker, args),
        "event_watch_remove" => monitor::event_watch_remove(broker, args),

        _ => Err(Error::InvalidArgument(format!("unknown tool `{name}`"))),
    };

    match result {
        Ok(text) => ToolOutcome {
            text,
            is_error: false,
        },
        Err(e) => {
            log::debug!(target: "broker", "tool {name} failed: {e}");
            ToolOutcome {
                text: e.to_string(),
                is_error: true,
            }
        }
    }
}

// ------------------------------- parameter extraction --------------------------------------------

pub(crate) fn required_str<'a>(args: &'a Json, key: &str) -> Result<&'a str, Error> {
    args.get(key)
        .and_then(Json::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("missing required parameter `{key}`")))
}

pub(crate) fn opt_str<'a>(args: &'a Json, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Json::as_str)
}

pub(crate) fn required_i64(args: &Json, key: &str) -> Result<i64, Error> {
    args.get(key)
        .and_then(Json::as_i64)
        .ok_or_else(|| Error::InvalidArgument(format!("missing required parameter `{key}`")))
}

pub(crate) fn opt_i64(args: &Json, key: &str, default: i64) -> i64 {
    args.get(key).and_then(Json::as_i64).unwrap_or(default)
}

pub(crate) fn opt_u64(args: &Json, key: &str) -> Option<u64> {
    args.get(key).and_then(Json::as_u64)
}

pub(crate) fn opt_bool(args: &Json, key: &str, default: bool) -> bool {
    args.get(key).and_then(Json::as_bool).unwrap_or(default)
}

pub(crate) fn opt_usize(args: &Json, key: &str, default: usize) -> usize {
    args.get(key)
        .and_then(Json::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Object ids arrive either as a bare number or as an `@id` string.
pub(crate) fn required_object_id(args: &Json, key: &str) -> Result<u64, Error> {
    match args.get(key) {
        Some(Json::Number(n)) => n
            .as_u64()
            .ok_or_else(|| Error::InvalidArgument(format!("`{key}` must be a positive id"))),
        Some(Json::String(s)) => s
            .strip_prefix('@')
            .unwrap_or(s)
            .parse()
            .map_err(|_| Error::InvalidArgument(format!("malformed object id `{s}`"))),
        _ => Err(Error::InvalidArgument(format!(
            "missing required parameter `{key}`"
        ))),
    }
}

pub(crate) fn json_array<'a>(args: &'a Json, key: &str) -> Vec<Json> {
    args.get(key)
        .and_then(Json::as_array)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn string_array(args: &Json, key: &str) -> Vec<String> {
    json_array(args, key)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

// ------------------------------- catalog ---------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Json,
}

fn spec(name: &'static str, description: &'static str, input_schema: Json) -> ToolSpec {
    ToolSpec {
        name,
        description,
        input_schema,
    }
}

fn no_params() -> Json {
    json!({"type": "object", "properties": {}})
}

fn thread_frame_params(extra: &[(&str, Json)], required: &[&str]) -> Json {
    let mut properties = serde_json::Map::new();
    properties.insert(
        "threadId".to_string(),
        json!({"type": "integer", "description": "thread id; defaults to the stopped thread"}),
    );
    properties.insert(
        "frameIndex".to_string(),
        json!({"type": "integer", "default": 0}),
    );
    for (key, schema) in extra {
        properties.insert(key.to_string(), schema.clone());
    }
    json!({"type": "object", "properties": properties, "required": required})
}

pub static CATALOG: Lazy<Vec<ToolSpec>> = Lazy::new(|| {
    vec![
        // session
        spec("ping", "Liveness probe", no_params()),
        spec(
            "debug_launch",
            "Launch a debuggee JVM with a debug agent and attach to it",
            json!({"type": "object", "properties": {
                "mainClass": {"type": "string"},
                "classpath": {"type": "string"},
                "jvmArgs": {"type": "array", "items": {"type": "string"}},
                "suspendOnStart": {"type": "boolean", "default": true}
            }, "required": ["mainClass"]}),
        ),
        spec(
            "debug_attach_socket",
            "Attach to a debug agent listening on host:port",
            json!({"type": "object", "properties": {
                "host": {"type": "string", "default": "localhost"},
                "port": {"type": "integer"},
                "waitForPort": {"type": "boolean", "default": false},
                "waitTimeout": {"type": "integer", "default": 60, "maximum": 300}
            }, "required": ["port"]}),
        ),
        spec(
            "debug_attach_pid",
            "Attach to a running process by pid",
            json!({"type": "object", "properties": {"pid": {"type": "integer"}}, "required": ["pid"]}),
        ),
        spec("debug_disconnect", "Tear the debug session down", no_params()),
        spec("debug_status", "Session, stop state and registry overview", no_params()),
        spec("vm_info", "Target VM name, version and capabilities", no_params()),
        // execution
        spec("resume", "Resume the whole target", no_params()),
        spec("suspend", "Suspend the whole target", no_params()),
        spec("step_into", "Line step into calls", thread_frame_params(&[], &[])),
        spec("step_over", "Line step over calls", thread_frame_params(&[], &[])),
        spec("step_out", "Step out of the current method", thread_frame_params(&[], &[])),
        spec(
            "wait_for_stop",
            "Block until the target stops or the timeout passes",
            json!({"type": "object", "properties": {
                "timeout": {"type": "integer", "description": "seconds", "default": 30, "maximum": 300}
            }}),
        ),
        spec(
            "run_to_line",
            "Run until a source line is reached (temporary breakpoint)",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "lineNumber": {"type": "integer"},
                "timeout": {"type": "integer", "default": 30, "maximum": 300}
            }, "required": ["className", "lineNumber"]}),
        ),
        spec(
            "smart_step_into",
            "List callable methods on the current line, or step into one class",
            thread_frame_params(&[("targetClass", json!({"type": "string"}))], &[]),
        ),
        spec("execution_location", "Current stop location", no_params()),
        // line breakpoints
        spec(
            "breakpoint_set",
            "Set a line breakpoint (deferred until the class loads if needed)",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "lineNumber": {"type": "integer"}
            }, "required": ["className", "lineNumber"]}),
        ),
        spec(
            "breakpoint_remove",
            "Remove a line breakpoint",
            json!({"type": "object", "properties": {"breakpointId": {"type": "string"}}, "required": ["breakpointId"]}),
        ),
        spec("breakpoint_list", "List line breakpoints", no_params()),
        spec(
            "breakpoint_enable",
            "Enable a line breakpoint",
            json!({"type": "object", "properties": {"breakpointId": {"type": "string"}}, "required": ["breakpointId"]}),
        ),
        spec(
            "breakpoint_disable",
            "Disable a line breakpoint",
            json!({"type": "object", "properties": {"breakpointId": {"type": "string"}}, "required": ["breakpointId"]}),
        ),
        // watchpoints
        spec(
            "watchpoint_access",
            "Stop when a field is read",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "fieldName": {"type": "string"}
            }, "required": ["className", "fieldName"]}),
        ),
        spec(
            "watchpoint_modification",
            "Stop when a field is written",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "fieldName": {"type": "string"}
            }, "required": ["className", "fieldName"]}),
        ),
        spec(
            "watchpoint_remove",
            "Remove a watchpoint",
            json!({"type": "object", "properties": {"watchpointId": {"type": "string"}}, "required": ["watchpointId"]}),
        ),
        spec("watchpoint_list", "List watchpoints", no_params()),
        // method breakpoints
        spec(
            "method_entry_break",
            "Stop on method entry (wildcard matches any method)",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "methodName": {"type": "string", "description": "omit or `*` for any method"}
            }, "required": ["className"]}),
        ),
        spec(
            "method_exit_break",
            "Stop on method exit (wildcard matches any method)",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "methodName": {"type": "string"}
            }, "required": ["className"]}),
        ),
        spec(
            "method_breakpoint_remove",
            "Remove a method breakpoint",
            json!({"type": "object", "properties": {"breakpointId": {"type": "string"}}, "required": ["breakpointId"]}),
        ),
        spec("method_breakpoint_list", "List method breakpoints", no_params()),
        // exception breakpoints
        spec(
            "exception_break_on",
            "Stop when an exception is thrown",
            json!({"type": "object", "properties": {
                "exceptionClass": {"type": "string", "description": "omit or `*` for any throwable"},
                "caught": {"type": "boolean", "default": true},
                "uncaught": {"type": "boolean", "default": true}
            }}),
        ),
        spec(
            "exception_break_remove",
            "Remove an exception breakpoint",
            json!({"type": "object", "properties": {"breakpointId": {"type": "string"}}, "required": ["breakpointId"]}),
        ),
        spec("exception_break_list", "List exception breakpoints", no_params()),
        spec("exception_info", "Details of the current exception stop", no_params()),
        // inspection
        spec("threads_list", "All target threads with suspension state", no_params()),
        spec(
            "thread_suspend",
            "Suspend one thread",
            json!({"type": "object", "properties": {"threadId": {"type": "integer"}}, "required": ["threadId"]}),
        ),
        spec(
            "thread_resume",
            "Resume one thread",
            json!({"type": "object", "properties": {"threadId": {"type": "integer"}}, "required": ["threadId"]}),
        ),
        spec("stack_frames", "Stack of a suspended thread", thread_frame_params(&[], &[])),
        spec(
            "variables_local",
            "Visible locals of a frame",
            thread_frame_params(&[], &[]),
        ),
        spec(
            "variables_arguments",
            "Arguments of a frame",
            thread_frame_params(&[], &[]),
        ),
        spec(
            "variable_inspect",
            "One variable with one level of fields",
            thread_frame_params(&[("name", json!({"type": "string"}))], &["name"]),
        ),
        spec("this_object", "The frame's `this`", thread_frame_params(&[], &[])),
        spec(
            "object_fields",
            "Fields of an object by unique id",
            json!({"type": "object", "properties": {"objectId": {"type": ["integer", "string"]}}, "required": ["objectId"]}),
        ),
        spec(
            "array_elements",
            "Slice of an array by unique id",
            json!({"type": "object", "properties": {
                "objectId": {"type": ["integer", "string"]},
                "startIndex": {"type": "integer", "default": 0},
                "count": {"type": "integer", "default": 20}
            }, "required": ["objectId"]}),
        ),
        spec(
            "async_stack_trace",
            "Suspended threads that look like one asynchronous task",
            no_params(),
        ),
        // mutation / evaluation
        spec(
            "evaluate_expression",
            "Evaluate a narrow-grammar expression in a frame",
            thread_frame_params(&[("expression", json!({"type": "string"}))], &["expression"]),
        ),
        spec(
            "set_variable",
            "Assign a frame variable from text",
            thread_frame_params(
                &[
                    ("name", json!({"type": "string"})),
                    ("value", json!({"type": "string"})),
                ],
                &["name", "value"],
            ),
        ),
        spec(
            "invoke_method",
            "Invoke an instance method on a suspended thread",
            json!({"type": "object", "properties": {
                "objectId": {"type": ["integer", "string"]},
                "methodName": {"type": "string"},
                "arguments": {"type": "array"},
                "threadId": {"type": "integer"}
            }, "required": ["objectId", "methodName"]}),
        ),
        spec(
            "invoke_static",
            "Invoke a static method on a suspended thread",
            json!({"type": "object", "properties": {
                "className": {"type": "string"},
                "methodName": {"type": "string"},
                "arguments": {"type": "array"},
                "threadId": {"type": "integer"}
            }, "required": ["className", "methodName"]}),
        ),
        // watch expressions
        spec(
            "watch_add",
            "Store a persistent watch expression",
            json!({"type": "object", "properties": {"expression": {"type": "string"}}, "required": ["expression"]}),
        ),
        spec(
            "watch_remove",
            "Remove a watch expression",
            json!({"type": "object", "properties": {"watchId": {"type": "string"}}, "required": ["watchId"]}),
        ),
        spec("watch_list", "List watch expressions with last results", no_params()),
        spec(
            "watch_evaluate_all",
            "Evaluate every watch against the stopped thread",
            no_params(),
        ),
        // event monitoring
        spec(
            "class_prepare_watch",
            "Capture class prepare events",
            json!({"type": "object", "properties": {"classFilter": {"type": "string"}}}),
        ),
        spec("class_unload_watch", "Capture class unload events", no_params()),
        spec("thread_start_watch", "Capture thread start events", no_params()),
        spec("thread_death_watch", "Capture thread death events", no_params()),
        spec(
            "monitor_contention_watch",
            "Capture monitor contention events",
            no_params(),
        ),
        spec(
            "events_pending",
            "Captured lifecycle events (drains unless peek=true)",
            json!({"type": "object", "properties": {"peek": {"type": "boolean", "default": false}}}),
        ),
        spec(
            "event_watch_remove",
            "Remove an event subscription",
            json!({"type": "object", "properties": {"watchId": {"type": "string"}}, "required": ["watchId"]}),
        ),
    ]
});
