//! Operations over suspended threads: frame walking, variable inspection,
//! object/array access and the object-by-id scan.

use crate::broker::adapter::{
    DebugTarget, FrameRef, InvokeOutcome, LocalVar, ThreadRef, Value,
};
use crate::broker::error::Error;
use crate::broker::render;
use crate::broker::stop::StopKind;
use crate::broker::Broker;
use crate::muted_error;

/// How many array elements a single `array_elements` call returns by
/// default.
pub const DEFAULT_ARRAY_COUNT: i32 = 20;

impl Broker {
    /// Resolve a thread: by explicit id, or falling back to the thread of
    /// the current stop reason.
    pub fn find_thread(&self, thread_id: Option<u64>) -> Result<ThreadRef, Error> {
        let target = self.target()?;
        match thread_id {
            Some(id) => target
                .all_threads()?
                .into_iter()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::ThreadNotFound(id.to_string())),
            None => self
                .session()
                .stop_reason()
                .thread
                .ok_or_else(|| Error::InvalidArgument(
                    "no stopped thread in focus; pass an explicit threadId".to_string(),
                )),
        }
    }

    pub(crate) fn require_suspended(
        &self,
        target: &dyn DebugTarget,
        thread: &ThreadRef,
    ) -> Result<(), Error> {
        if !target.is_suspended(thread)? {
            return Err(Error::ThreadNotSuspended(thread.name.clone()));
        }
        Ok(())
    }

    pub fn threads_overview(&self) -> Result<Vec<(ThreadRef, bool)>, Error> {
        let target = self.target()?;
        let mut out = Vec::new();
        for thread in target.all_threads()? {
            let suspended = target.is_suspended(&thread).unwrap_or(false);
            out.push((thread, suspended));
        }
        Ok(out)
    }

    pub fn suspend_thread(&self, thread_id: Option<u64>) -> Result<ThreadRef, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        target.suspend_thread(&thread)?;
        Ok(thread)
    }

    pub fn resume_thread(&self, thread_id: Option<u64>) -> Result<ThreadRef, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        target.resume_thread(&thread)?;
        Ok(thread)
    }

    pub fn stack_frames(&self, thread_id: Option<u64>) -> Result<Vec<FrameRef>, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        Ok(target.frames(&thread)?)
    }

    pub(crate) fn frame_at(
        &self,
        target: &dyn DebugTarget,
        thread: &ThreadRef,
        index: usize,
    ) -> Result<FrameRef, Error> {
        target
            .frames(thread)?
            .into_iter()
            .nth(index)
            .ok_or(Error::FrameOutOfRange(index))
    }

    pub fn local_variables(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
    ) -> Result<Vec<LocalVar>, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        Ok(target.visible_locals(&frame)?)
    }

    pub fn frame_arguments(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
    ) -> Result<Vec<LocalVar>, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        Ok(target.arguments(&frame)?)
    }

    /// Find a named binding (local first, then argument) in the frame.
    pub fn variable(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
        name: &str,
    ) -> Result<LocalVar, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        if let Some(var) = target
            .visible_locals(&frame)?
            .into_iter()
            .find(|v| v.name == name)
        {
            return Ok(var);
        }
        target
            .arguments(&frame)?
            .into_iter()
            .find(|v| v.name == name)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("no visible variable `{name}` in frame {frame_index}"))
            })
    }

    /// Multi-line rendering of a variable: objects get one level of fields.
    pub fn inspect_variable(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
        name: &str,
    ) -> Result<String, Error> {
        let target = self.target()?;
        let var = self.variable(thread_id, frame_index, name)?;
        let mut out = render::local_line(&var);
        if let Value::Object { id, .. } = &var.value {
            if let Ok(fields) = target.object_fields(*id) {
                for (field, value) in fields {
                    out.push_str(&format!(
                        "\n  {} {} = {}",
                        field.type_name,
                        field.name,
                        render::value_with_id(&value)
                    ));
                }
            }
        }
        Ok(out)
    }

    pub fn this_object(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
    ) -> Result<Option<Value>, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        Ok(target.this_object(&frame)?)
    }

    /// Resolve an object by its unique id: scan the `this` reference, the
    /// visible locals and the arguments of every frame of every suspended
    /// thread. Linear on purpose, the adapter keeps no global object index.
    pub fn find_object(&self, id: u64) -> Result<Value, Error> {
        let target = self.target()?;
        for thread in target.all_threads()? {
            if !target.is_suspended(&thread).unwrap_or(false) {
                continue;
            }
            let Ok(frames) = target.frames(&thread) else {
                continue;
            };
            for frame in frames {
                if let Ok(Some(this)) = target.this_object(&frame) {
                    if this.object_id() == Some(id) {
                        return Ok(this);
                    }
                }
                for var in target
                    .visible_locals(&frame)
                    .unwrap_or_default()
                    .into_iter()
                    .chain(target.arguments(&frame).unwrap_or_default())
                {
                    if var.value.object_id() == Some(id) {
                        return Ok(var.value);
                    }
                }
            }
        }
        Err(Error::ObjectNotFound(id))
    }

    pub fn object_fields(&self, id: u64) -> Result<String, Error> {
        let target = self.target()?;
        let object = self.find_object(id)?;
        let Some(object_id) = object.object_id() else {
            return Err(Error::ObjectNotFound(id));
        };
        let fields = target.object_fields(object_id)?;
        if fields.is_empty() {
            return Ok(format!("{} has no fields", render::value_with_id(&object)));
        }
        let mut out = render::value_with_id(&object);
        for (field, value) in fields {
            out.push_str(&format!(
                "\n  {} {} = {}",
                field.type_name,
                field.name,
                render::value_with_id(&value)
            ));
        }
        Ok(out)
    }

    /// Array slice with the boundary behavior clients rely on: a start at
    /// or past the length is an error, an overlong count is truncated.
    pub fn array_elements(
        &self,
        id: u64,
        start: i32,
        count: i32,
    ) -> Result<(i32, Vec<Value>), Error> {
        let target = self.target()?;
        let object = self.find_object(id)?;
        let Value::Array { id: array_id, length, .. } = object else {
            return Err(Error::TypeMismatch(format!(
                "object @{id} is {}, not an array",
                object.type_name()
            )));
        };
        if start < 0 || start >= length {
            return Err(Error::InvalidArgument(format!(
                "startIndex {start} out of range for array of length {length}"
            )));
        }
        let count = count.clamp(0, length - start);
        let values = target.array_slice(array_id, start, count)?;
        Ok((length, values))
    }

    /// Assign a frame variable from text: a primitive literal, a string, or
    /// an `@id` object reference.
    pub fn set_variable(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
        name: &str,
        text: &str,
    ) -> Result<LocalVar, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        let var = self.variable(thread_id, frame_index, name)?;
        let value = self.text_to_value(&*target, text, &var.type_name)?;
        target.set_local(&frame, name, &value)?;
        Ok(LocalVar {
            name: var.name,
            type_name: var.type_name,
            value,
        })
    }

    /// Where the current stop thread is: declaring type, method and line of
    /// the innermost frame.
    pub fn execution_location(&self) -> Result<String, Error> {
        let target = self.target()?;
        let stop = self.session().stop_reason();
        if !stop.is_stopped() {
            return Err(Error::InvalidArgument(
                "target is running; stop it first".to_string(),
            ));
        }
        let Some(thread) = stop.thread else {
            return Ok(format!("stopped ({})", stop.kind));
        };
        let frames = target.frames(&thread)?;
        match frames.first() {
            Some(frame) => Ok(format!("{} in thread {}", frame.location, thread)),
            None => Ok(format!("thread {thread} has no frames")),
        }
    }

    /// Details of the last exception stop, enriched with the exception's
    /// `getMessage()` when a best-effort invocation succeeds.
    pub fn exception_info(&self) -> Result<String, Error> {
        let stop = self.session().stop_reason();
        if stop.kind != StopKind::ExceptionThrown {
            return Err(Error::InvalidArgument(
                "the target is not stopped on an exception".to_string(),
            ));
        }
        let mut out = stop.describe();
        let message = stop
            .details
            .get("objectId")
            .and_then(|raw| raw.strip_prefix('@'))
            .and_then(|raw| raw.parse::<u64>().ok())
            .and_then(|object_id| self.exception_message(object_id, stop.thread.as_ref()?));
        if let Some(message) = message {
            out.push_str(&format!("\nmessage: {message}"));
        }
        Ok(out)
    }

    fn exception_message(&self, object_id: u64, thread: &ThreadRef) -> Option<String> {
        let target = self.target().ok()?;
        let object = muted_error!(self.find_object(object_id))?;
        let type_ref = target.classes_by_name(&object.type_name()).into_iter().next()?;
        let method = muted_error!(target.methods(&type_ref))?
            .into_iter()
            .find(|m| m.name == "getMessage" && m.arity() == 0)?;
        let outcome = muted_error!(target.invoke_instance(thread, object_id, &method, &[]))?;
        match outcome {
            InvokeOutcome::Return(Value::Str { value, .. }) => Some(value),
            InvokeOutcome::Return(other) => Some(render::value_brief(&other)),
            InvokeOutcome::Thrown { .. } => None,
        }
    }
}
