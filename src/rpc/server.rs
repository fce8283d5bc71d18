//! Line-delimited JSON-RPC 2.0 server loop.
//!
//! Generic over the byte streams so tests drive it with in-memory buffers;
//! production embedders pass locked stdin/stdout.

use crate::broker::Broker;
use crate::rpc::protocol::{
    Request, Response, ToolResult, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION,
};
use crate::rpc::tools;
use serde_json::{json, Value as Json};
use std::io::{BufRead, Write};

/// Serve until the input stream ends. One request per line, one response
/// per line; notifications produce no output.
pub fn serve(broker: &Broker, reader: impl BufRead, mut writer: impl Write) -> anyhow::Result<()> {
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let Some(response) = handle_line(broker, &line) else {
            continue;
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

/// Process one raw line. `None` for notifications.
pub fn handle_line(broker: &Broker, line: &str) -> Option<Response> {
    let json: Json = match serde_json::from_str(line) {
        Ok(json) => json,
        Err(e) => {
            return Some(Response::failure(
                Json::Null,
                PARSE_ERROR,
                format!("parse error: {e}"),
            ))
        }
    };
    let request: Request = match serde_json::from_value(json) {
        Ok(request) => request,
        Err(e) => {
            return Some(Response::failure(
                Json::Null,
                INVALID_REQUEST,
                format!("invalid request: {e}"),
            ))
        }
    };
    if request.jsonrpc != "2.0" {
        return Some(Response::failure(
            request.id.unwrap_or(Json::Null),
            INVALID_REQUEST,
            "jsonrpc must be \"2.0\"",
        ));
    }

    if request.is_notification() {
        // the only expected notification is `initialized`; others are
        // silently dropped per JSON-RPC
        log::debug!(target: "broker", "notification: {}", request.method);
        return None;
    }
    let id = request.id.clone().unwrap_or(Json::Null);

    let response = match request.method.as_str() {
        "initialize" => Response::success(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": {"tools": {}},
            }),
        ),
        "shutdown" => Response::success(id, Json::Null),
        "tools/list" => Response::success(id, json!({"tools": &*tools::CATALOG})),
        "tools/call" => {
            let Some(name) = request.params.get("name").and_then(Json::as_str) else {
                return Some(Response::failure(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires a `name` parameter",
                ));
            };
            let default_args = json!({});
            let arguments = request.params.get("arguments").unwrap_or(&default_args);
            let outcome = tools::dispatch(broker, name, arguments);
            let envelope = if outcome.is_error {
                ToolResult::error(outcome.text)
            } else {
                ToolResult::text(outcome.text)
            };
            Response::success(id, serde_json::to_value(envelope).expect("infallible"))
        }
        other => Response::failure(id, METHOD_NOT_FOUND, format!("unknown method `{other}`")),
    };
    Some(response)
}
