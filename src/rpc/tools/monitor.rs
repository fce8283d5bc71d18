//! Lifecycle event monitoring tools.

use super::{opt_bool, opt_str, required_str};
use crate::broker::error::Error;
use crate::broker::monitor::{CapturedEvent, SubscriptionKind};
use crate::broker::Broker;
use itertools::Itertools;
use serde_json::Value as Json;

fn subscribe(
    broker: &Broker,
    kind: SubscriptionKind,
    class_filter: Option<&str>,
) -> Result<String, Error> {
    let target = broker.target()?;
    let view = broker.monitors().subscribe(&*target, kind, class_filter)?;
    match &view.class_filter {
        Some(filter) => Ok(format!("{} watching {} ({filter})", view.id, view.kind)),
        None => Ok(format!("{} watching {}", view.id, view.kind)),
    }
}

pub(super) fn class_prepare_watch(broker: &Broker, args: &Json) -> Result<String, Error> {
    subscribe(
        broker,
        SubscriptionKind::ClassPrepare,
        opt_str(args, "classFilter"),
    )
}

pub(super) fn class_unload_watch(broker: &Broker, _args: &Json) -> Result<String, Error> {
    subscribe(broker, SubscriptionKind::ClassUnload, None)
}

pub(super) fn thread_start_watch(broker: &Broker, _args: &Json) -> Result<String, Error> {
    subscribe(broker, SubscriptionKind::ThreadStart, None)
}

pub(super) fn thread_death_watch(broker: &Broker, _args: &Json) -> Result<String, Error> {
    subscribe(broker, SubscriptionKind::ThreadDeath, None)
}

pub(super) fn monitor_contention_watch(broker: &Broker, _args: &Json) -> Result<String, Error> {
    subscribe(broker, SubscriptionKind::MonitorContention, None)
}

fn event_line(event: &CapturedEvent) -> String {
    let details = event
        .details
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .join(", ");
    format!("{} at {}ms: {details}", event.kind, event.timestamp_ms)
}

pub(super) fn events_pending(broker: &Broker, args: &Json) -> Result<String, Error> {
    let peek = opt_bool(args, "peek", false);
    let events = if peek {
        broker.monitors().peek_pending()
    } else {
        broker.monitors().get_pending()
    };
    if events.is_empty() {
        return Ok("no captured events".to_string());
    }
    Ok(events.iter().map(event_line).join("\n"))
}

pub(super) fn event_watch_remove(broker: &Broker, args: &Json) -> Result<String, Error> {
    let target = broker.target()?;
    let id = required_str(args, "watchId")?;
    let view = broker.monitors().remove(&*target, id)?;
    Ok(format!("removed {}", view.id))
}
