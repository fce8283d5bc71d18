//! Lifecycle event monitoring: subscriptions plus a bounded ring of
//! captured events. Monitoring never stops the target.

use crate::broker::adapter::{DebugTarget, Event, RequestHandle, SuspendPolicy};
use crate::broker::error::Error;
use crate::weak_error;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Capacity of the captured-event ring; overflow drops the oldest entry.
pub const CAPTURE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum CapturedEventKind {
    ClassPrepare,
    ClassUnload,
    ThreadStart,
    ThreadDeath,
    MonitorContend,
    MonitorWait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionKind {
    ClassPrepare,
    ClassUnload,
    ThreadStart,
    ThreadDeath,
    MonitorContention,
}

impl SubscriptionKind {
    fn prefix(&self) -> &'static str {
        match self {
            SubscriptionKind::ClassPrepare => "cp",
            SubscriptionKind::ClassUnload => "cu",
            SubscriptionKind::ThreadStart => "ts",
            SubscriptionKind::ThreadDeath => "td",
            SubscriptionKind::MonitorContention => "mc",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub kind: CapturedEventKind,
    pub timestamp_ms: i64,
    pub details: IndexMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct SubscriptionView {
    pub id: String,
    pub kind: SubscriptionKind,
    pub class_filter: Option<String>,
}

#[derive(Default)]
struct Inner {
    counters: [u32; 5],
    subscriptions: IndexMap<String, (SubscriptionView, RequestHandle)>,
    captured: VecDeque<CapturedEvent>,
}

#[derive(Clone, Default)]
pub struct EventMonitor {
    inner: Arc<Mutex<Inner>>,
}

impl EventMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a lifecycle event kind. The adapter request is created
    /// with suspend policy `None`.
    pub fn subscribe(
        &self,
        target: &dyn DebugTarget,
        kind: SubscriptionKind,
        class_filter: Option<&str>,
    ) -> Result<SubscriptionView, Error> {
        let handle = match kind {
            SubscriptionKind::ClassPrepare => target.create_class_prepare(class_filter)?,
            SubscriptionKind::ClassUnload => target.create_class_unload()?,
            SubscriptionKind::ThreadStart => target.create_thread_start()?,
            SubscriptionKind::ThreadDeath => target.create_thread_death()?,
            SubscriptionKind::MonitorContention => {
                if !target.capabilities().monitor_events {
                    return Err(Error::CapabilityMissing("monitor contention events"));
                }
                target.create_monitor_contended()?
            }
        };
        target.set_suspend_policy(handle, SuspendPolicy::None)?;
        target.enable_request(handle)?;

        let mut inner = self.inner.lock().unwrap();
        let slot = kind as usize;
        inner.counters[slot] += 1;
        let id = format!("{}-{}", kind.prefix(), inner.counters[slot]);
        let view = SubscriptionView {
            id: id.clone(),
            kind,
            class_filter: class_filter.map(str::to_string),
        };
        inner.subscriptions.insert(id, (view.clone(), handle));
        Ok(view)
    }

    pub fn remove(&self, target: &dyn DebugTarget, id: &str) -> Result<SubscriptionView, Error> {
        let mut inner = self.inner.lock().unwrap();
        let (view, handle) = inner
            .subscriptions
            .shift_remove(id)
            .ok_or_else(|| Error::UnknownId(id.to_string()))?;
        weak_error!(target.delete_request(handle));
        Ok(view)
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionView> {
        let inner = self.inner.lock().unwrap();
        inner
            .subscriptions
            .values()
            .map(|(view, _)| view.clone())
            .collect()
    }

    /// Classify and record a monitor event; other event kinds yield no
    /// capture.
    pub fn capture(&self, event: &Event) {
        let mut details = IndexMap::new();
        let kind = match event {
            Event::ClassPrepare { type_ref, .. } => {
                details.insert("class".to_string(), type_ref.name.clone());
                CapturedEventKind::ClassPrepare
            }
            Event::ClassUnload { type_name } => {
                details.insert("class".to_string(), type_name.clone());
                CapturedEventKind::ClassUnload
            }
            Event::ThreadStart { thread } => {
                details.insert("thread".to_string(), thread.name.clone());
                details.insert("threadId".to_string(), thread.id.to_string());
                CapturedEventKind::ThreadStart
            }
            Event::ThreadDeath { thread } => {
                details.insert("thread".to_string(), thread.name.clone());
                details.insert("threadId".to_string(), thread.id.to_string());
                CapturedEventKind::ThreadDeath
            }
            Event::MonitorContended {
                thread,
                monitor_type,
            } => {
                details.insert("thread".to_string(), thread.name.clone());
                details.insert("monitorType".to_string(), monitor_type.clone());
                CapturedEventKind::MonitorContend
            }
            Event::MonitorWait {
                thread,
                monitor_type,
                timeout_ms,
            } => {
                details.insert("thread".to_string(), thread.name.clone());
                details.insert("monitorType".to_string(), monitor_type.clone());
                details.insert("timeoutMs".to_string(), timeout_ms.to_string());
                CapturedEventKind::MonitorWait
            }
            _ => return,
        };

        let mut inner = self.inner.lock().unwrap();
        inner.captured.push_back(CapturedEvent {
            kind,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            details,
        });
        while inner.captured.len() > CAPTURE_CAPACITY {
            inner.captured.pop_front();
        }
    }

    /// Drain the captured-event ring.
    pub fn get_pending(&self) -> Vec<CapturedEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.captured.drain(..).collect()
    }

    /// Snapshot without draining.
    pub fn peek_pending(&self) -> Vec<CapturedEvent> {
        let inner = self.inner.lock().unwrap();
        inner.captured.iter().cloned().collect()
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.clear();
        inner.captured.clear();
    }
}
