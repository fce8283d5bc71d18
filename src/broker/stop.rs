//! Immutable classification of a target suspension.

use crate::broker::adapter::{Event, Location, ThreadRef};
use crate::broker::breakpoint::BreakpointRegistry;
use crate::broker::render;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum StopKind {
    None,
    BreakpointHit,
    StepComplete,
    ExceptionThrown,
    WatchpointAccess,
    WatchpointModify,
    MethodEntry,
    MethodExit,
    UserSuspend,
    VmStart,
    VmDisconnect,
}

/// Why the target last stopped. `StopKind::None` is the sentinel for a
/// running (or never-stopped) target.
#[derive(Debug, Clone)]
pub struct StopReason {
    pub kind: StopKind,
    pub timestamp_ms: i64,
    pub thread: Option<ThreadRef>,
    pub location: Option<Location>,
    pub details: IndexMap<String, String>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl StopReason {
    pub fn none() -> Self {
        Self::bare(StopKind::None)
    }

    pub fn user_suspend() -> Self {
        Self::bare(StopKind::UserSuspend)
    }

    pub fn vm_start(thread: Option<ThreadRef>) -> Self {
        StopReason {
            thread,
            ..Self::bare(StopKind::VmStart)
        }
    }

    pub fn vm_disconnect() -> Self {
        Self::bare(StopKind::VmDisconnect)
    }

    fn bare(kind: StopKind) -> Self {
        StopReason {
            kind,
            timestamp_ms: now_ms(),
            thread: None,
            location: None,
            details: IndexMap::new(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.kind != StopKind::None
    }

    /// Classify a stop event. Monitor events yield `None`; the pump routes
    /// them to the subordinate stores instead.
    pub fn from_event(event: &Event, breakpoints: &BreakpointRegistry) -> Option<StopReason> {
        let mut reason = match event {
            Event::Breakpoint {
                thread, location, ..
            } => {
                let mut r = Self::bare(StopKind::BreakpointHit);
                if let Some(id) = breakpoints.find_by_location(location) {
                    r.details.insert("breakpointId".to_string(), id);
                }
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::Step {
                thread, location, ..
            } => {
                let mut r = Self::bare(StopKind::StepComplete);
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::Exception {
                thread,
                location,
                exception,
                catch_location,
                ..
            } => {
                let mut r = Self::bare(StopKind::ExceptionThrown);
                r.details
                    .insert("exceptionClass".to_string(), exception.type_name());
                if let Some(id) = exception.object_id() {
                    r.details.insert("objectId".to_string(), format!("@{id}"));
                }
                r.details
                    .insert("caught".to_string(), catch_location.is_some().to_string());
                if let Some(catch) = catch_location {
                    r.details
                        .insert("catchClass".to_string(), catch.type_name.clone());
                    r.details
                        .insert("catchLine".to_string(), catch.line.to_string());
                }
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::AccessWatchpoint {
                thread,
                location,
                field,
                current,
                ..
            } => {
                let mut r = Self::bare(StopKind::WatchpointAccess);
                r.details.insert("field".to_string(), field.name.clone());
                r.details
                    .insert("currentValue".to_string(), render::value_brief(current));
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::ModifyWatchpoint {
                thread,
                location,
                field,
                value_to_be,
                ..
            } => {
                let mut r = Self::bare(StopKind::WatchpointModify);
                r.details.insert("field".to_string(), field.name.clone());
                r.details
                    .insert("newValue".to_string(), render::value_brief(value_to_be));
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::MethodEntry {
                thread, location, ..
            } => {
                let mut r = Self::bare(StopKind::MethodEntry);
                r.details
                    .insert("method".to_string(), location.method_name.clone());
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::MethodExit {
                thread,
                location,
                return_value,
                ..
            } => {
                let mut r = Self::bare(StopKind::MethodExit);
                r.details
                    .insert("method".to_string(), location.method_name.clone());
                if let Some(value) = return_value {
                    r.details
                        .insert("returnValue".to_string(), render::value_brief(value));
                }
                r.thread = Some(thread.clone());
                r.location = Some(location.clone());
                r
            }
            Event::VmStart { thread } => Self::vm_start(Some(thread.clone())),
            _ => return None,
        };
        reason.timestamp_ms = now_ms();
        Some(reason)
    }

    /// Single-line rendering used by `debug_status` and `wait_for_stop`.
    pub fn describe(&self) -> String {
        let mut out = self.kind.to_string();
        if let Some(thread) = &self.thread {
            out.push_str(&format!(" in thread {thread}"));
        }
        if let Some(location) = &self.location {
            out.push_str(&format!(" at {location}"));
        }
        for (k, v) in &self.details {
            out.push_str(&format!(", {k}={v}"));
        }
        out
    }
}
