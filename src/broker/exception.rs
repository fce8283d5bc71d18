//! Exception breakpoint registry. Unlike the name-resolved registries this
//! one never defers: the named class must already be loaded (or the record
//! is a catch-all wildcard).

use crate::broker::adapter::{DebugTarget, RequestHandle, SuspendPolicy};
use crate::broker::error::Error;
use crate::weak_error;
use indexmap::IndexMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct ExceptionBreakpointView {
    pub id: String,
    /// `None` is the catch-all wildcard.
    pub exception_class: Option<String>,
    pub catch_caught: bool,
    pub catch_uncaught: bool,
    pub enabled: bool,
}

#[derive(Debug)]
struct ExceptionBreakpointRecord {
    id: String,
    exception_class: Option<String>,
    catch_caught: bool,
    catch_uncaught: bool,
    handle: RequestHandle,
    enabled: bool,
}

impl ExceptionBreakpointRecord {
    fn view(&self) -> ExceptionBreakpointView {
        ExceptionBreakpointView {
            id: self.id.clone(),
            exception_class: self.exception_class.clone(),
            catch_caught: self.catch_caught,
            catch_uncaught: self.catch_uncaught,
            enabled: self.enabled,
        }
    }
}

#[derive(Default)]
struct Inner {
    counter: u32,
    records: IndexMap<String, ExceptionBreakpointRecord>,
}

#[derive(Clone, Default)]
pub struct ExceptionRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl ExceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        target: &dyn DebugTarget,
        exception_class: Option<&str>,
        catch_caught: bool,
        catch_uncaught: bool,
    ) -> Result<ExceptionBreakpointView, Error> {
        if !catch_caught && !catch_uncaught {
            return Err(Error::InvalidArgument(
                "at least one of caught/uncaught must be requested".to_string(),
            ));
        }
        let exception_class = exception_class.filter(|c| *c != "*");

        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner.records.values().find(|r| {
            r.exception_class.as_deref() == exception_class
                && r.catch_caught == catch_caught
                && r.catch_uncaught == catch_uncaught
        }) {
            return Ok(existing.view());
        }

        let type_ref = match exception_class {
            Some(name) => {
                let classes = target.classes_by_name(name);
                let type_ref = classes
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::ClassNotFound(name.to_string()))?;
                if !target.is_throwable(&type_ref)? {
                    return Err(Error::NotThrowable(name.to_string()));
                }
                Some(type_ref)
            }
            None => None,
        };

        let handle = target.create_exception(type_ref.as_ref(), catch_caught, catch_uncaught)?;
        target.set_suspend_policy(handle, SuspendPolicy::All)?;
        target.enable_request(handle)?;

        inner.counter += 1;
        let id = format!("ex-{}", inner.counter);
        let record = ExceptionBreakpointRecord {
            id: id.clone(),
            exception_class: exception_class.map(str::to_string),
            catch_caught,
            catch_uncaught,
            handle,
            enabled: true,
        };
        let view = record.view();
        inner.records.insert(id, record);
        Ok(view)
    }

    pub fn remove(
        &self,
        target: &dyn DebugTarget,
        id: &str,
    ) -> Result<ExceptionBreakpointView, Error> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .shift_remove(id)
            .ok_or_else(|| Error::UnknownId(id.to_string()))?;
        weak_error!(target.delete_request(record.handle));
        Ok(record.view())
    }

    pub fn set_enabled(
        &self,
        target: &dyn DebugTarget,
        id: &str,
        enabled: bool,
    ) -> Result<ExceptionBreakpointView, Error> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .records
            .get_mut(id)
            .ok_or_else(|| Error::UnknownId(id.to_string()))?;
        if enabled {
            target.enable_request(record.handle)?;
        } else {
            target.disable_request(record.handle)?;
        }
        record.enabled = enabled;
        Ok(record.view())
    }

    pub fn list(&self) -> Vec<ExceptionBreakpointView> {
        let inner = self.inner.lock().unwrap();
        inner.records.values().map(|r| r.view()).collect()
    }

    pub fn clear_all(&self, target: &dyn DebugTarget) {
        let mut inner = self.inner.lock().unwrap();
        for record in inner.records.values() {
            weak_error!(target.delete_request(record.handle));
        }
        inner.records.clear();
    }
}
