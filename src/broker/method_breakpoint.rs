//! Method entry/exit breakpoint registry. A record may name a single method
//! or apply to every method of the class (wildcard).

use crate::broker::adapter::{DebugTarget, RequestHandle, SuspendPolicy, TypeRef};
use crate::broker::error::Error;
use crate::weak_error;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum MethodBreakKind {
    Entry,
    Exit,
}

impl MethodBreakKind {
    fn prefix(&self) -> &'static str {
        match self {
            MethodBreakKind::Entry => "me",
            MethodBreakKind::Exit => "mx",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MethodBreakpointView {
    pub id: String,
    pub class_name: String,
    /// `None` means any method of the class.
    pub method_name: Option<String>,
    pub kind: MethodBreakKind,
    pub enabled: bool,
    pub pending: bool,
}

#[derive(Debug)]
struct MethodBreakpointRecord {
    id: String,
    class_name: String,
    method_name: Option<String>,
    kind: MethodBreakKind,
    handle: Option<RequestHandle>,
    enabled: bool,
}

impl MethodBreakpointRecord {
    fn view(&self) -> MethodBreakpointView {
        MethodBreakpointView {
            id: self.id.clone(),
            class_name: self.class_name.clone(),
            method_name: self.method_name.clone(),
            kind: self.kind,
            enabled: self.enabled,
            pending: self.handle.is_none(),
        }
    }
}

#[derive(Default)]
struct Inner {
    entry_counter: u32,
    exit_counter: u32,
    records: IndexMap<String, MethodBreakpointRecord>,
    deferred: HashMap<String, Vec<String>>,
    by_handle: HashMap<RequestHandle, String>,
    prepare_watch: Option<RequestHandle>,
}

#[derive(Clone, Default)]
pub struct MethodBreakpointRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl MethodBreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        target: &dyn DebugTarget,
        class_name: &str,
        method_name: Option<&str>,
        kind: MethodBreakKind,
    ) -> Result<MethodBreakpointView, Error> {
        let method_name = method_name.filter(|m| *m != "*");

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.records.values().find(|r| {
            r.class_name == class_name && r.method_name.as_deref() == method_name && r.kind == kind
        }) {
            return Ok(existing.view());
        }

        let id = {
            let counter = match kind {
                MethodBreakKind::Entry => &mut inner.entry_counter,
                MethodBreakKind::Exit => &mut inner.exit_counter,
            };
            *counter += 1;
            format!("{}-{}", kind.prefix(), counter)
        };

        let classes = target.classes_by_name(class_name);
        let Some(type_ref) = classes.first() else {
            if inner.prepare_watch.is_none() {
                let watch = target.create_class_prepare(None)?;
                target.set_suspend_policy(watch, SuspendPolicy::None)?;
                target.enable_request(watch)?;
                inner.prepare_watch = Some(watch);
            }
            let record = MethodBreakpointRecord {
                id: id.clone(),
                class_name: class_name.to_string(),
                method_name: method_name.map(str::to_string),
                kind,
                handle: None,
                enabled: true,
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

        let handle = resolve(target, type_ref, method_name, kind)?;
        let record = MethodBreakpointRecord {
            id: id.clone(),
            class_name: class_name.to_string(),
            method_name: method_name.map(str::to_string),
            kind,
            handle: Some(handle),
            enabled: true,
        };
        let view = record.view();
        inner.by_handle.insert(handle, id.clone());
        inner.records.insert(id, record);
        Ok(view)
    }

    pub fn on_class_prepare(&self, target: &dyn DebugTarget, type_ref: &TypeRef) {
        let mut inner = self.inner.lock().unwrap();
        let Some(ids) = inner.deferred.remove(&type_ref.name) else {
            return;
        };
        for id in ids {
            let Some(record) = inner.records.get(&id) else {
                continue;
            };
            let (method_name, kind) = (record.method_name.clone(), record.kind);
            match resolve(target, type_ref, method_name.as_deref(), kind) {
                Ok(handle) => {
                    inner.by_handle.insert(handle, id.clone());
                    let record = inner.records.get_mut(&id).expect("checked above");
                    record.handle = Some(handle);
                    log::debug!(target: "broker", "method breakpoint {id} activated on {}", type_ref.name);
                }
                Err(e) => {
                    log::warn!(target: "broker", "method breakpoint {id} stays pending: {e}");
                }
            }
        }
    }

    pub fn remove(
        &self,
        target: &dyn DebugTarget,
        id: &str,
    ) -> Result<MethodBreakpointView, Error> {
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

    pub fn list(&self) -> Vec<MethodBreakpointView> {
        let inner = self.inner.lock().unwrap();
        inner.records.values().map(|r| r.view()).collect()
    }

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
    method_name: Option<&str>,
    kind: MethodBreakKind,
) -> Result<RequestHandle, Error> {
    if let Some(name) = method_name {
        let known = target.methods(type_ref)?;
        if !known.iter().any(|m| m.name == name) {
            return Err(Error::MethodNotFound(
                type_ref.name.clone(),
                name.to_string(),
            ));
        }
    }
    let handle = match kind {
        MethodBreakKind::Entry => target.create_method_entry(type_ref)?,
        MethodBreakKind::Exit => target.create_method_exit(type_ref)?,
    };
    target.set_suspend_policy(handle, SuspendPolicy::All)?;
    target.enable_request(handle)?;
    Ok(handle)
}
