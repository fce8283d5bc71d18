//! Session lifecycle tools.

use super::{opt_bool, opt_i64, opt_str, required_i64, required_str, string_array};
use crate::broker::error::Error;
use crate::broker::Broker;
use serde_json::Value as Json;
use std::time::Duration;

pub(super) fn ping(_broker: &Broker, _args: &Json) -> Result<String, Error> {
    Ok("pong".to_string())
}

pub(super) fn debug_launch(broker: &Broker, args: &Json) -> Result<String, Error> {
    let main_class = required_str(args, "mainClass")?;
    let classpath = opt_str(args, "classpath");
    let jvm_args = string_array(args, "jvmArgs");
    let suspend_on_start = opt_bool(args, "suspendOnStart", true);
    let status = broker.launch(main_class, classpath, &jvm_args, suspend_on_start)?;
    Ok(format!("connected: {}", status.detail))
}

pub(super) fn debug_attach_socket(broker: &Broker, args: &Json) -> Result<String, Error> {
    let host = opt_str(args, "host").unwrap_or("localhost");
    let port = required_i64(args, "port")?;
    let port = u16::try_from(port)
        .map_err(|_| Error::InvalidArgument(format!("port {port} out of range")))?;
    let wait_for_port = opt_bool(args, "waitForPort", false);
    let wait_timeout = opt_i64(args, "waitTimeout", 60).clamp(1, 300);
    let status = broker.attach_socket(
        host,
        port,
        wait_for_port,
        Duration::from_secs(wait_timeout as u64),
    )?;
    Ok(format!("connected: {}", status.detail))
}

pub(super) fn debug_attach_pid(broker: &Broker, args: &Json) -> Result<String, Error> {
    let pid = required_i64(args, "pid")?;
    let pid = u32::try_from(pid)
        .map_err(|_| Error::InvalidArgument(format!("pid {pid} out of range")))?;
    let status = broker.attach_pid(pid)?;
    Ok(format!("connected: {}", status.detail))
}

pub(super) fn debug_disconnect(broker: &Broker, _args: &Json) -> Result<String, Error> {
    if broker.disconnect() {
        Ok("session closed".to_string())
    } else {
        Ok("no active session".to_string())
    }
}

pub(super) fn debug_status(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let status = broker.status();
    if !status.connected {
        return Ok("NOT_CONNECTED".to_string());
    }
    let state = if status.stop.is_stopped() {
        format!("STOPPED ({})", status.stop.describe())
    } else {
        "RUNNING".to_string()
    };
    let uptime_s = status
        .connected_at_ms
        .map(|at| (chrono::Utc::now().timestamp_millis() - at) / 1000)
        .unwrap_or_default();
    let mut out = format!(
        "{} {}\nstate: {state}\nuptime: {uptime_s}s",
        status.kind, status.detail
    );
    if let Some(event) = &status.last_event {
        out.push_str(&format!("\nlast event: {event}"));
    }
    out.push_str(&format!(
        "\nbreakpoints: {}, watchpoints: {}, method breakpoints: {}, exception breakpoints: {}, watches: {}",
        broker.breakpoints().list().len(),
        broker.watchpoints().list().len(),
        broker.method_breakpoints().list().len(),
        broker.exceptions().list().len(),
        broker.watches().list().len(),
    ));
    Ok(out)
}

pub(super) fn vm_info(broker: &Broker, _args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let caps = target.capabilities();
    let threads = target.all_threads()?.len();
    Ok(format!(
        "{} {}\nthreads: {threads}\nwatchpoints supported: {}\nmonitor events supported: {}",
        target.vm_name(),
        target.vm_version(),
        caps.watchpoints,
        caps.monitor_events,
    ))
}
