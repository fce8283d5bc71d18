//! Line breakpoint registry with deferred class-prepare resolution.

use crate::broker::adapter::{DebugTarget, Location, RequestHandle, SuspendPolicy, TypeRef};
use crate::broker::error::Error;
use crate::weak_error;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Client-facing snapshot of one breakpoint record.
#[derive(Debug, Clone)]
pub struct BreakpointView {
    pub id: String,
    pub class_name: String,
    pub line: i32,
    pub enabled: bool,
    pub pending: bool,
    pub hit_count: u32,
}

#[derive(Debug)]
struct BreakpointRecord {
    id: String,
    class_name: String,
    line: i32,
    /// `None` while the record is pending (class not yet prepared).
    handle: Option<RequestHandle>,
    /// Resolved location, present exactly when `handle` is.
    location: Option<Location>,
    enabled: bool,
    hit_count: u32,
}

impl BreakpointRecord {
    fn pending(&self) -> bool {
        self.handle.is_none()
    }

    fn view(&self) -> BreakpointView {
        BreakpointView {
            id: self.id.clone(),
            class_name: self.class_name.clone(),
            line: self.line,
            enabled: self.enabled,
            pending: self.pending(),
            hit_count: self.hit_count,
        }
    }
}

#[derive(Default)]
struct Inner {
    counter: u32,
    records: IndexMap<String, BreakpointRecord>,
    /// Class name -> ids of pending records waiting for that class.
    deferred: HashMap<String, Vec<String>>,
    by_handle: HashMap<RequestHandle, String>,
    /// A single class-prepare request keeps the registry notified; armed on
    /// the first pending record.
    prepare_watch: Option<RequestHandle>,
}

#[derive(Clone, Default)]
pub struct BreakpointRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a breakpoint at `class_name:line`. Returns a pending record when
    /// the class is not loaded yet, and the existing record when an
    /// equivalent breakpoint is already registered.
    pub fn set(
        &self,
        target: &dyn DebugTarget,
        class_name: &str,
        line: i32,
    ) -> Result<BreakpointView, Error> {
        let mut inner = self.inner.lock().unwrap();

        if let Some(existing) = inner
            .records
            .values()
            .find(|r| r.class_name == class_name && r.line == line)
        {
            return Ok(existing.view());
        }

        let classes = target.classes_by_name(class_name);
        let id = {
            inner.counter += 1;
            format!("bp-{}", inner.counter)
        };

        let Some(type_ref) = classes.first() else {
            if inner.prepare_watch.is_none() {
                let watch = target.create_class_prepare(None)?;
                target.set_suspend_policy(watch, SuspendPolicy::None)?;
                target.enable_request(watch)?;
                inner.prepare_watch = Some(watch);
            }
            let record = BreakpointRecord {
                id: id.clone(),
                class_name: class_name.to_string(),
                line,
                handle: None,
                location: None,
                enabled: true,
                hit_count: 0,
            };
            let view = record.view();
            inner.records.insert(id.clone(), record);
            inner
                .deferred
                .entry(class_name.to_string())
                .or_default()
                .push(id);
            return Ok(view);
        };

        let (handle, location) = resolve(target, type_ref, line)?;
        let record = BreakpointRecord {
            id: id.clone(),
            class_name: class_name.to_string(),
            line,
            handle: Some(handle),
            location: Some(location),
            enabled: true,
            hit_count: 0,
        };
        let view = record.view();
        inner.by_handle.insert(handle, id.clone());
        inner.records.insert(id, record);
        Ok(view)
    }

    /// Activate deferred records once their class is prepared. Individual
    /// resolution failures leave the record pending.
    pub fn on_class_prepare(&self, target: &dyn DebugTarget, type_ref: &TypeRef) {
        let mut inner = self.inner.lock().unwrap();
        let Some(ids) = inner.deferred.remove(&type_ref.name) else {
            return;
        };
        for id in ids {
            let Some(record) = inner.records.get(&id) else {
                continue;
            };
            let line = record.line;
            match resolve(target, type_ref, line) {
                Ok((handle, location)) => {
                    inner.by_handle.insert(handle, id.clone());
                    let record = inner.records.get_mut(&id).expect("checked above");
                    record.handle = Some(handle);
                    record.location = Some(location);
                    log::debug!(target: "broker", "breakpoint {id} activated at {}:{line}", type_ref.name);
                }
                Err(e) => {
                    log::warn!(target: "broker", "breakpoint {id} stays pending: {e}");
                }
            }
        }
    }

    pub fn remove(&self, target: &dyn DebugTarget, id: &str) -> Result<BreakpointView, Error> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .shift_remove(id)
            .ok_or_else(|| Error::UnknownId(id.to_string()))?;
        if let Some(handle) = record.handle {
            inner.by_handle.remove(&handle);
            weak_error!(target.delete_request(handle));
        }
        if let Some(ids) = inner.deferred.get_mut(&record.class_name) {
            ids.retain(|deferred| deferred != id);
        }
        Ok(record.view())
    }

    pub fn set_enabled(
        &self,
        target: &dyn DebugTarget,
        id: &str,
        enabled: bool,
    ) -> Result<BreakpointView, Error> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| Error::UnknownId(id.to_string()))?;
        if let Some(handle) = record.handle {
            if enabled {
                target.enable_request(handle)?;
            } else {
                target.disable_request(handle)?;
            }
        }
        record.enabled = enabled;
        Ok(record.view())
    }

    pub fn list(&self) -> Vec<BreakpointView> {
        let inner = self.inner.lock().unwrap();
        inner.records.values().map(|r| r.view()).collect()
    }

    pub fn get(&self, id: &str) -> Option<BreakpointView> {
        let inner = self.inner.lock().unwrap();
        inner.records.get(id).map(|r| r.view())
    }

    /// Id of the record resolved at `location`, used to label breakpoint
    /// stop events.
    pub fn find_by_location(&self, location: &Location) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .records
            .values()
            .find(|r| r.location.as_ref() == Some(location))
            .map(|r| r.id.clone())
    }

    /// Bump the hit counter of the record at `location`, if any.
    pub fn record_hit(&self, location: &Location) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(record) = inner
            .records
            .values_mut()
            .find(|r| r.location.as_ref() == Some(location))
        {
            record.hit_count += 1;
        }
    }

    /// Best-effort cleanup of every adapter request; the id counter keeps
    /// counting so reinstated records get fresh ids.
    pub fn clear_all(&self, target: &dyn DebugTarget) {
        let mut inner = self.inner.lock().unwrap();
        for record in inner.records.values() {
            if let Some(handle) = record.handle {
                weak_error!(target.delete_request(handle));
            }
        }
        if let Some(watch) = inner.prepare_watch.take() {
            weak_error!(target.delete_request(watch));
        }
        inner.records.clear();
        inner.deferred.clear();
        inner.by_handle.clear();
    }
}

fn resolve(
    target: &dyn DebugTarget,
    type_ref: &TypeRef,
    line: i32,
) -> Result<(RequestHandle, Location), Error> {
    let locations = target.locations_at_line(type_ref, line)?;
    let Some(location) = locations.into_iter().next() else {
        return Err(Error::NoCodeAtLine(type_ref.name.clone(), line));
    };
    let handle = target.create_breakpoint(&location)?;
    target.set_suspend_policy(handle, SuspendPolicy::All)?;
    target.enable_request(handle)?;
    Ok((handle, location))
}
