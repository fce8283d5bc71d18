//! Stepping operations and the composites built on them.

use crate::broker::adapter::{StepDepth, SuspendPolicy, ThreadRef, Value};
use crate::broker::error::Error;
use crate::broker::stop::StopReason;
use crate::broker::Broker;
use crate::weak_error;
use itertools::Itertools;
use std::time::Duration;

/// Listing-mode cap for smart step-into candidates.
const SMART_STEP_CANDIDATES: usize = 20;

/// Outcome of the run-to-line composite.
#[derive(Debug, Clone)]
pub struct RunToLineOutcome {
    pub stop: StopReason,
    /// Whether the landed-at location matches the requested class and line.
    pub reached: bool,
}

impl Broker {
    /// Create a one-shot step request and let the target run. The stop
    /// reason is cleared before the resume so a following `wait_for_stop`
    /// observes the step completion, never the stale stop.
    pub fn step(&self, thread_id: Option<u64>, depth: StepDepth) -> Result<ThreadRef, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;

        let top = self
            .frame_at(&*target, &thread, 0)
            .map_err(|_| Error::NativeFrame)?;
        if top.location.is_native() {
            return Err(Error::NativeFrame);
        }

        self.session().clear_step(&*target, thread.id);
        let handle = target.create_step(&thread, depth, None, 1)?;
        target.set_suspend_policy(handle, SuspendPolicy::All)?;
        target.enable_request(handle)?;
        self.session().note_step(thread.id, handle);

        self.session().clear_stop_reason();
        target.resume()?;
        Ok(thread)
    }

    /// Set a breakpoint, resume, wait, then remove the breakpoint on both
    /// the success and the failure path.
    pub fn run_to_line(
        &self,
        class_name: &str,
        line: i32,
        timeout: Duration,
    ) -> Result<RunToLineOutcome, Error> {
        let target = self.target()?;
        let breakpoint = self.breakpoints().set(&*target, class_name, line)?;

        self.session().clear_stop_reason();
        target.resume()?;
        let stop = self.session().wait_for_stop(timeout);

        weak_error!(self.breakpoints().remove(&*target, &breakpoint.id));

        let reached = stop
            .location
            .as_ref()
            .map(|l| l.type_name == class_name && l.line == line)
            .unwrap_or(false);
        Ok(RunToLineOutcome { stop, reached })
    }

    /// Smart step-into, listing mode: methods plausibly callable from the
    /// current line, derived from the declaring type and the types of the
    /// frame's visible variables.
    pub fn smart_step_candidates(&self, thread_id: Option<u64>) -> Result<Vec<String>, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let top = self.frame_at(&*target, &thread, 0)?;

        let mut type_names = vec![top.location.type_name.clone()];
        for var in target
            .visible_locals(&top)?
            .into_iter()
            .chain(target.arguments(&top)?)
        {
            if let Value::Object { type_name, .. } = &var.value {
                type_names.push(type_name.clone());
            }
        }

        let mut candidates = Vec::new();
        for type_name in type_names.iter().unique() {
            let Some(type_ref) = target.classes_by_name(type_name).into_iter().next() else {
                continue;
            };
            let Some(methods) = weak_error!(target.methods(&type_ref)) else {
                continue;
            };
            for method in methods {
                if method.name.starts_with('<') {
                    continue;
                }
                candidates.push(format!("{type_name}.{}", method.name));
            }
        }

        Ok(candidates
            .into_iter()
            .unique()
            .take(SMART_STEP_CANDIDATES)
            .collect())
    }

    /// Smart step-into, step mode: a step-INTO with an optional class-name
    /// filter and count 1.
    pub fn smart_step_into(
        &self,
        thread_id: Option<u64>,
        class_filter: Option<&str>,
    ) -> Result<ThreadRef, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;

        self.session().clear_step(&*target, thread.id);
        let handle = target.create_step(&thread, StepDepth::Into, class_filter, 1)?;
        target.set_suspend_policy(handle, SuspendPolicy::All)?;
        target.enable_request(handle)?;
        self.session().note_step(thread.id, handle);

        self.session().clear_stop_reason();
        target.resume()?;
        Ok(thread)
    }
}
