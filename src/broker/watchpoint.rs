//! Field watchpoint registry (access and modification kinds).

use crate::broker::adapter::{DebugTarget, RequestHandle, SuspendPolicy, TypeRef};
use crate::broker::error::Error;
use crate::weak_error;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum WatchKind {
    Access,
    Modify,
}

impl WatchKind {
    fn prefix(&self) -> &'static str {
        match self {
            WatchKind::Access => "wa",
            WatchKind::Modify => "wm",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatchpointView {
    pub id: String,
    pub class_name: String,
    pub field_name: String,
    pub kind: WatchKind,
    pub enabled: bool,
    pub pending: bool,
}

#[derive(Debug)]
struct WatchpointRecord {
    id: String,
    class_name: String,
    field_name: String,
    kind: WatchKind,
    handle: Option<RequestHandle>,
    enabled: bool,
}

impl WatchpointRecord {
    fn view(&self) -> WatchpointView {
        WatchpointView {
            id: self.id.clone(),
            class_name: self.class_name.clone(),
            field_name: self.field_name.clone(),
            kind: self.kind,
            enabled: self.enabled,
            pending: self.handle.is_none(),
        }
    }
}

#[derive(Default)]
struct Inner {
    access_counter: u32,
    modify_counter: u32,
    records: IndexMap<String, WatchpointRecord>,
    deferred: HashMap<String, Vec<String>>,
    by_handle: HashMap<RequestHandle, String>,
    prepare_watch: Option<RequestHandle>,
}

#[derive(Clone, Default)]
pub struct WatchpointRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl WatchpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        target: &dyn DebugTarget,
        class_name: &str,
        field_name: &str,
        kind: WatchKind,
    ) -> Result<WatchpointView, Error> {
        if !target.capabilities().watchpoints {
            return Err(Error::CapabilityMissing("field watchpoints"));
        }

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.records.values().find(|r| {
            r.class_name == class_name && r.field_name == field_name && r.kind == kind
        }) {
            return Ok(existing.view());
        }

        let id = {
            let counter = match kind {
                WatchKind::Access => &mut inner.access_counter,
                WatchKind::Modify => &mut inner.modify_counter,
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
            let record = WatchpointRecord {
                id: id.clone(),
                class_name: class_name.to_string(),
                field_name: field_name.to_string(),
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

        let handle = resolve(target, type_ref, field_name, kind)?;
        let record = WatchpointRecord {
            id: id.clone(),
            class_name: class_name.to_string(),
            field_name: field_name.to_string(),
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
            let (field_name, kind) = (record.field_name.clone(), record.kind);
            match resolve(target, type_ref, &field_name, kind) {
                Ok(handle) => {
                    inner.by_handle.insert(handle, id.clone());
                    let record = inner.records.get_mut(&id).expect("checked above");
                    record.handle = Some(handle);
                    log::debug!(target: "broker", "watchpoint {id} activated on {}.{field_name}", type_ref.name);
                }
                Err(e) => {
                    log::warn!(target: "broker", "watchpoint {id} stays pending: {e}");
                }
            }
        }
    }

    pub fn remove(&self, target: &dyn DebugTarget, id: &str) -> Result<WatchpointView, Error> {
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

    pub fn list(&self) -> Vec<WatchpointView> {
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
    field_name: &str,
    kind: WatchKind,
) -> Result<RequestHandle, Error> {
    let field = target
        .field_by_name(type_ref, field_name)?
        .ok_or_else(|| Error::FieldNotFound(type_ref.name.clone(), field_name.to_string()))?;
    let handle = match kind {
        WatchKind::Access => target.create_access_watch(&field)?,
        WatchKind::Modify => target.create_modify_watch(&field)?,
    };
    target.set_suspend_policy(handle, SuspendPolicy::All)?;
    target.enable_request(handle)?;
    Ok(handle)
}
