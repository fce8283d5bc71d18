//! Shared test plumbing: a scripted in-memory debug target.
//!
//! The mock emulates the adapter conventions the broker relies on: event
//! sets with suspend policy ALL leave every thread suspended, `resume`
//! wakes them and may deliver the next scripted event set, armed step
//! requests produce a step-complete set on resume.

#![allow(dead_code)]

use jdbroker::broker::adapter::{
    AdapterError, Capabilities, DebugTarget, Event, EventSet, FieldRef, FrameRef, InvokeOutcome,
    LocalVar, Location, MethodRef, PrimitiveValue, RequestHandle, Result as AdapterResult,
    StepDepth, SuspendPolicy, TargetConnector, ThreadRef, TypeRef, Value,
};
use jdbroker::broker::Broker;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct MockClass {
    pub type_ref: TypeRef,
    pub lines: Vec<i32>,
    pub fields: Vec<FieldRef>,
    pub methods: Vec<MethodRef>,
    pub throwable: bool,
}

#[derive(Debug, Clone)]
pub struct MockFrame {
    pub location: Location,
    pub this: Option<Value>,
    pub locals: Vec<LocalVar>,
    pub args: Vec<LocalVar>,
}

#[derive(Debug, Clone)]
pub struct MockThread {
    pub thread: ThreadRef,
    pub suspended: bool,
    pub frames: Vec<MockFrame>,
}

#[derive(Debug, Clone)]
pub struct MockRequest {
    pub kind: &'static str,
    pub enabled: bool,
    pub policy: SuspendPolicy,
    pub detail: String,
}

#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub thread_id: u64,
    pub receiver: Option<u64>,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
struct MockState {
    classes: Vec<MockClass>,
    threads: Vec<MockThread>,
    objects: HashMap<u64, Vec<(FieldRef, Value)>>,
    arrays: HashMap<u64, Vec<Value>>,
    requests: HashMap<u64, MockRequest>,
    deleted_requests: Vec<u64>,
    next_handle: u64,
    next_object_id: u64,
    queue: VecDeque<EventSet>,
    next_set_id: u64,
    on_resume: VecDeque<EventSet>,
    resumed_sets: Vec<u64>,
    resume_count: u32,
    /// Where an armed step request lands when the target resumes.
    step_landing: Option<Location>,
    invoke_results: HashMap<String, InvokeOutcome>,
    invocations: Vec<RecordedInvocation>,
    disconnected: bool,
    disposed: bool,
    capabilities: Capabilities,
}

pub struct MockTarget {
    state: Mutex<MockState>,
    queue_cv: Condvar,
}

impl Default for MockTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTarget {
    pub fn new() -> Self {
        MockTarget {
            state: Mutex::new(MockState {
                next_handle: 1,
                next_object_id: 1000,
                next_set_id: 1,
                capabilities: Capabilities {
                    watchpoints: true,
                    monitor_events: true,
                },
                ..MockState::default()
            }),
            queue_cv: Condvar::new(),
        }
    }

    // ------------------------------- world building ----------------------------------------------

    pub fn add_class(&self, name: &str, lines: &[i32]) -> TypeRef {
        self.add_class_full(name, lines, vec![], vec![], false)
    }

    pub fn add_class_full(
        &self,
        name: &str,
        lines: &[i32],
        fields: Vec<FieldRef>,
        methods: Vec<MethodRef>,
        throwable: bool,
    ) -> TypeRef {
        let mut state = self.state.lock().unwrap();
        let type_ref = TypeRef {
            id: state.classes.len() as u64 + 1,
            name: name.to_string(),
        };
        state.classes.push(MockClass {
            type_ref: type_ref.clone(),
            lines: lines.to_vec(),
            fields,
            methods,
            throwable,
        });
        type_ref
    }

    pub fn add_thread(&self, id: u64, name: &str, suspended: bool, frames: Vec<MockFrame>) {
        let mut state = self.state.lock().unwrap();
        state.threads.push(MockThread {
            thread: ThreadRef {
                id,
                name: name.to_string(),
            },
            suspended,
            frames,
        });
    }

    pub fn add_object(&self, id: u64, fields: Vec<(FieldRef, Value)>) {
        self.state.lock().unwrap().objects.insert(id, fields);
    }

    pub fn add_array(&self, id: u64, values: Vec<Value>) {
        self.state.lock().unwrap().arrays.insert(id, values);
    }

    pub fn set_invoke_result(&self, qualified_method: &str, outcome: InvokeOutcome) {
        self.state
            .lock()
            .unwrap()
            .invoke_results
            .insert(qualified_method.to_string(), outcome);
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        self.state.lock().unwrap().capabilities = capabilities;
    }

    pub fn set_step_landing(&self, location: Location) {
        self.state.lock().unwrap().step_landing = Some(location);
    }

    /// A location equal to what `locations_at_line` produces.
    pub fn line_location(&self, class_name: &str, line: i32) -> Location {
        Location {
            type_name: class_name.to_string(),
            method_name: "run".to_string(),
            method_signature: "()V".to_string(),
            line,
        }
    }

    // ------------------------------- event scripting ---------------------------------------------

    /// Deliver an event set right away.
    pub fn push_events(&self, policy: SuspendPolicy, events: Vec<Event>) -> u64 {
        let mut state = self.state.lock().unwrap();
        let id = push_set_locked(&mut state, policy, events);
        self.queue_cv.notify_all();
        id
    }

    /// Queue an event set for delivery on the next whole-target resume.
    pub fn on_next_resume(&self, policy: SuspendPolicy, events: Vec<Event>) {
        let mut state = self.state.lock().unwrap();
        let id = state.next_set_id;
        state.next_set_id += 1;
        state.on_resume.push_back(EventSet {
            id,
            suspend_policy: policy,
            events,
        });
    }

    /// Simulate the target going away: the pump's next pull fails.
    pub fn drop_connection(&self) {
        self.state.lock().unwrap().disconnected = true;
        self.queue_cv.notify_all();
    }

    // ------------------------------- assertions --------------------------------------------------

    pub fn resume_count(&self) -> u32 {
        self.state.lock().unwrap().resume_count
    }

    pub fn resumed_sets(&self) -> Vec<u64> {
        self.state.lock().unwrap().resumed_sets.clone()
    }

    pub fn deleted_requests(&self) -> Vec<u64> {
        self.state.lock().unwrap().deleted_requests.clone()
    }

    pub fn request(&self, handle: RequestHandle) -> Option<MockRequest> {
        self.state.lock().unwrap().requests.get(&handle.0).cloned()
    }

    pub fn live_requests_of_kind(&self, kind: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .values()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn invocations(&self) -> Vec<RecordedInvocation> {
        self.state.lock().unwrap().invocations.clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().unwrap().disposed
    }

    fn create_request(&self, kind: &'static str, detail: String) -> AdapterResult<RequestHandle> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(AdapterError::Disconnected);
        }
        let handle = state.next_handle;
        state.next_handle += 1;
        state.requests.insert(
            handle,
            MockRequest {
                kind,
                enabled: false,
                policy: SuspendPolicy::All,
                detail,
            },
        );
        Ok(RequestHandle(handle))
    }

    fn find_class(state: &MockState, type_ref: &TypeRef) -> AdapterResult<MockClass> {
        state
            .classes
            .iter()
            .find(|c| c.type_ref.id == type_ref.id)
            .cloned()
            .ok_or_else(|| AdapterError::Internal(format!("unknown class {}", type_ref.name)))
    }

    fn find_frame(state: &MockState, frame: &FrameRef) -> AdapterResult<MockFrame> {
        state
            .threads
            .iter()
            .find(|t| t.thread.id == frame.thread_id)
            .and_then(|t| t.frames.get(frame.index))
            .cloned()
            .ok_or_else(|| AdapterError::Internal("unknown frame".to_string()))
    }
}

fn push_set_locked(state: &mut MockState, policy: SuspendPolicy, events: Vec<Event>) -> u64 {
    let id = state.next_set_id;
    state.next_set_id += 1;
    if policy == SuspendPolicy::All {
        for thread in &mut state.threads {
            thread.suspended = true;
        }
    }
    state.queue.push_back(EventSet {
        id,
        suspend_policy: policy,
        events,
    });
    id
}

impl DebugTarget for MockTarget {
    fn dispose(&self) {
        let mut state = self.state.lock().unwrap();
        state.disposed = true;
        state.disconnected = true;
        self.queue_cv.notify_all();
    }

    fn vm_name(&self) -> String {
        "Mock JVM".to_string()
    }

    fn vm_version(&self) -> String {
        "21.0".to_string()
    }

    fn capabilities(&self) -> Capabilities {
        self.state.lock().unwrap().capabilities
    }

    fn classes_by_name(&self, name: &str) -> Vec<TypeRef> {
        let state = self.state.lock().unwrap();
        state
            .classes
            .iter()
            .filter(|c| c.type_ref.name == name)
            .map(|c| c.type_ref.clone())
            .collect()
    }

    fn field_by_name(&self, type_ref: &TypeRef, name: &str) -> AdapterResult<Option<FieldRef>> {
        let state = self.state.lock().unwrap();
        let class = Self::find_class(&state, type_ref)?;
        Ok(class.fields.into_iter().find(|f| f.name == name))
    }

    fn methods(&self, type_ref: &TypeRef) -> AdapterResult<Vec<MethodRef>> {
        let state = self.state.lock().unwrap();
        Ok(Self::find_class(&state, type_ref)?.methods)
    }

    fn is_throwable(&self, type_ref: &TypeRef) -> AdapterResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(Self::find_class(&state, type_ref)?.throwable)
    }

    fn locations_at_line(&self, type_ref: &TypeRef, line: i32) -> AdapterResult<Vec<Location>> {
        let state = self.state.lock().unwrap();
        let class = Self::find_class(&state, type_ref)?;
        if !class.lines.contains(&line) {
            return Ok(vec![]);
        }
        Ok(vec![Location {
            type_name: class.type_ref.name.clone(),
            method_name: "run".to_string(),
            method_signature: "()V".to_string(),
            line,
        }])
    }

    fn create_breakpoint(&self, location: &Location) -> AdapterResult<RequestHandle> {
        self.create_request("breakpoint", location.to_string())
    }

    fn create_access_watch(&self, field: &FieldRef) -> AdapterResult<RequestHandle> {
        self.create_request("access_watch", field.name.clone())
    }

    fn create_modify_watch(&self, field: &FieldRef) -> AdapterResult<RequestHandle> {
        self.create_request("modify_watch", field.name.clone())
    }

    fn create_method_entry(&self, type_ref: &TypeRef) -> AdapterResult<RequestHandle> {
        self.create_request("method_entry", type_ref.name.clone())
    }

    fn create_method_exit(&self, type_ref: &TypeRef) -> AdapterResult<RequestHandle> {
        self.create_request("method_exit", type_ref.name.clone())
    }

    fn create_exception(
        &self,
        type_ref: Option<&TypeRef>,
        caught: bool,
        uncaught: bool,
    ) -> AdapterResult<RequestHandle> {
        self.create_request(
            "exception",
            format!(
                "{} caught={caught} uncaught={uncaught}",
                type_ref.map(|t| t.name.as_str()).unwrap_or("*")
            ),
        )
    }

    fn create_class_prepare(&self, filter: Option<&str>) -> AdapterResult<RequestHandle> {
        self.create_request("class_prepare", filter.unwrap_or("*").to_string())
    }

    fn create_class_unload(&self) -> AdapterResult<RequestHandle> {
        self.create_request("class_unload", String::new())
    }

    fn create_thread_start(&self) -> AdapterResult<RequestHandle> {
        self.create_request("thread_start", String::new())
    }

    fn create_thread_death(&self) -> AdapterResult<RequestHandle> {
        self.create_request("thread_death", String::new())
    }

    fn create_monitor_contended(&self) -> AdapterResult<RequestHandle> {
        self.create_request("monitor_contended", String::new())
    }

    fn create_step(
        &self,
        thread: &ThreadRef,
        depth: StepDepth,
        class_filter: Option<&str>,
        count: i32,
    ) -> AdapterResult<RequestHandle> {
        self.create_request(
            "step",
            format!(
                "thread={} depth={depth:?} filter={} count={count}",
                thread.id,
                class_filter.unwrap_or("-")
            ),
        )
    }

    fn enable_request(&self, handle: RequestHandle) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(request) = state.requests.get_mut(&handle.0) {
            request.enabled = true;
        }
        Ok(())
    }

    fn disable_request(&self, handle: RequestHandle) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(request) = state.requests.get_mut(&handle.0) {
            request.enabled = false;
        }
        Ok(())
    }

    fn delete_request(&self, handle: RequestHandle) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        state.requests.remove(&handle.0);
        state.deleted_requests.push(handle.0);
        Ok(())
    }

    fn set_suspend_policy(&self, handle: RequestHandle, policy: SuspendPolicy) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(request) = state.requests.get_mut(&handle.0) {
            request.policy = policy;
        }
        Ok(())
    }

    fn mirror_string(&self, s: &str) -> AdapterResult<Value> {
        let mut state = self.state.lock().unwrap();
        let id = state.next_object_id;
        state.next_object_id += 1;
        Ok(Value::Str {
            id,
            value: s.to_string(),
        })
    }

    fn all_threads(&self) -> AdapterResult<Vec<ThreadRef>> {
        let state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(AdapterError::Disconnected);
        }
        Ok(state.threads.iter().map(|t| t.thread.clone()).collect())
    }

    fn resume(&self) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(AdapterError::Disconnected);
        }
        state.resume_count += 1;
        for thread in &mut state.threads {
            thread.suspended = false;
        }

        // armed step requests fire on resume when a landing is configured
        let armed_step = state
            .requests
            .iter()
            .find(|(_, r)| r.kind == "step" && r.enabled)
            .map(|(handle, _)| *handle);
        if let (Some(handle), Some(landing)) = (armed_step, state.step_landing.clone()) {
            let thread = state.threads[0].thread.clone();
            push_set_locked(
                &mut state,
                SuspendPolicy::All,
                vec![Event::Step {
                    request: RequestHandle(handle),
                    thread,
                    location: landing,
                }],
            );
        } else if let Some(set) = state.on_resume.pop_front() {
            let policy = set.suspend_policy;
            let events = set.events;
            push_set_locked(&mut state, policy, events);
        }
        self.queue_cv.notify_all();
        Ok(())
    }

    fn suspend(&self) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        for thread in &mut state.threads {
            thread.suspended = true;
        }
        Ok(())
    }

    fn resume_thread(&self, thread: &ThreadRef) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.threads.iter_mut().find(|t| t.thread.id == thread.id) {
            Some(t) => {
                t.suspended = false;
                Ok(())
            }
            None => Err(AdapterError::Internal("unknown thread".to_string())),
        }
    }

    fn suspend_thread(&self, thread: &ThreadRef) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.threads.iter_mut().find(|t| t.thread.id == thread.id) {
            Some(t) => {
                t.suspended = true;
                Ok(())
            }
            None => Err(AdapterError::Internal("unknown thread".to_string())),
        }
    }

    fn is_suspended(&self, thread: &ThreadRef) -> AdapterResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state
            .threads
            .iter()
            .find(|t| t.thread.id == thread.id)
            .map(|t| t.suspended)
            .unwrap_or(false))
    }

    fn frames(&self, thread: &ThreadRef) -> AdapterResult<Vec<FrameRef>> {
        let state = self.state.lock().unwrap();
        let mock_thread = state
            .threads
            .iter()
            .find(|t| t.thread.id == thread.id)
            .ok_or_else(|| AdapterError::Internal("unknown thread".to_string()))?;
        Ok(mock_thread
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameRef {
                thread_id: thread.id,
                index,
                location: frame.location.clone(),
            })
            .collect())
    }

    fn visible_locals(&self, frame: &FrameRef) -> AdapterResult<Vec<LocalVar>> {
        let state = self.state.lock().unwrap();
        Ok(Self::find_frame(&state, frame)?.locals)
    }

    fn arguments(&self, frame: &FrameRef) -> AdapterResult<Vec<LocalVar>> {
        let state = self.state.lock().unwrap();
        Ok(Self::find_frame(&state, frame)?.args)
    }

    fn this_object(&self, frame: &FrameRef) -> AdapterResult<Option<Value>> {
        let state = self.state.lock().unwrap();
        Ok(Self::find_frame(&state, frame)?.this)
    }

    fn set_local(&self, frame: &FrameRef, name: &str, value: &Value) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.thread.id == frame.thread_id)
            .ok_or_else(|| AdapterError::Internal("unknown thread".to_string()))?;
        let mock_frame = thread
            .frames
            .get_mut(frame.index)
            .ok_or_else(|| AdapterError::Internal("unknown frame".to_string()))?;
        for var in mock_frame
            .locals
            .iter_mut()
            .chain(mock_frame.args.iter_mut())
        {
            if var.name == name {
                var.value = value.clone();
                return Ok(());
            }
        }
        Err(AdapterError::Internal(format!("no local `{name}`")))
    }

    fn get_field(&self, object_id: u64, name: &str) -> AdapterResult<Option<Value>> {
        let state = self.state.lock().unwrap();
        Ok(state.objects.get(&object_id).and_then(|fields| {
            fields
                .iter()
                .find(|(field, _)| field.name == name)
                .map(|(_, value)| value.clone())
        }))
    }

    fn get_static_field(&self, type_ref: &TypeRef, name: &str) -> AdapterResult<Option<Value>> {
        let _ = (type_ref, name);
        Ok(None)
    }

    fn object_fields(&self, object_id: u64) -> AdapterResult<Vec<(FieldRef, Value)>> {
        let state = self.state.lock().unwrap();
        Ok(state.objects.get(&object_id).cloned().unwrap_or_default())
    }

    fn array_length(&self, array_id: u64) -> AdapterResult<i32> {
        let state = self.state.lock().unwrap();
        state
            .arrays
            .get(&array_id)
            .map(|values| values.len() as i32)
            .ok_or_else(|| AdapterError::Internal("unknown array".to_string()))
    }

    fn array_slice(&self, array_id: u64, start: i32, count: i32) -> AdapterResult<Vec<Value>> {
        let state = self.state.lock().unwrap();
        let values = state
            .arrays
            .get(&array_id)
            .ok_or_else(|| AdapterError::Internal("unknown array".to_string()))?;
        Ok(values
            .iter()
            .skip(start as usize)
            .take(count as usize)
            .cloned()
            .collect())
    }

    fn invoke_instance(
        &self,
        thread: &ThreadRef,
        object_id: u64,
        method: &MethodRef,
        args: &[Value],
    ) -> AdapterResult<InvokeOutcome> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{}.{}", method.declaring_type, method.name);
        state.invocations.push(RecordedInvocation {
            thread_id: thread.id,
            receiver: Some(object_id),
            method: key.clone(),
            args: args.to_vec(),
        });
        Ok(state
            .invoke_results
            .get(&key)
            .cloned()
            .unwrap_or(InvokeOutcome::Return(Value::Null)))
    }

    fn invoke_static(
        &self,
        thread: &ThreadRef,
        type_ref: &TypeRef,
        method: &MethodRef,
        args: &[Value],
    ) -> AdapterResult<InvokeOutcome> {
        let mut state = self.state.lock().unwrap();
        let key = format!("{}.{}", type_ref.name, method.name);
        state.invocations.push(RecordedInvocation {
            thread_id: thread.id,
            receiver: None,
            method: key.clone(),
            args: args.to_vec(),
        });
        Ok(state
            .invoke_results
            .get(&key)
            .cloned()
            .unwrap_or(InvokeOutcome::Return(Value::Null)))
    }

    fn pull_events(&self, timeout: Duration) -> AdapterResult<Option<EventSet>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        loop {
            if state.disconnected {
                return Err(AdapterError::Disconnected);
            }
            if let Some(set) = state.queue.pop_front() {
                return Ok(Some(set));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let (reacquired, _) = self
                .queue_cv
                .wait_timeout(state, deadline - now)
                .map_err(|_| AdapterError::Internal("poisoned".to_string()))?;
            state = reacquired;
        }
    }

    fn resume_event_set(&self, set_id: u64) -> AdapterResult<()> {
        let mut state = self.state.lock().unwrap();
        state.resumed_sets.push(set_id);
        Ok(())
    }
}

pub struct MockConnector {
    pub target: Arc<MockTarget>,
}

impl TargetConnector for MockConnector {
    fn connect_socket(&self, _host: &str, _port: u16) -> AdapterResult<Arc<dyn DebugTarget>> {
        Ok(self.target.clone())
    }

    fn connect_pid(&self, _pid: u32) -> AdapterResult<Arc<dyn DebugTarget>> {
        Ok(self.target.clone())
    }
}

// ------------------------------- scenario helpers ------------------------------------------------

pub fn int_value(v: i32) -> Value {
    Value::Primitive(PrimitiveValue::Int(v))
}

pub fn local(name: &str, type_name: &str, value: Value) -> LocalVar {
    LocalVar {
        name: name.to_string(),
        type_name: type_name.to_string(),
        value,
    }
}

pub fn field(name: &str, type_name: &str) -> FieldRef {
    FieldRef {
        id: 0,
        name: name.to_string(),
        type_name: type_name.to_string(),
        declaring_type: String::new(),
        is_static: false,
    }
}

pub fn method(declaring_type: &str, name: &str, param_types: &[&str]) -> MethodRef {
    MethodRef {
        id: 0,
        name: name.to_string(),
        signature: String::new(),
        declaring_type: declaring_type.to_string(),
        param_types: param_types.iter().map(|t| t.to_string()).collect(),
        is_static: false,
    }
}

pub fn static_method(declaring_type: &str, name: &str, param_types: &[&str]) -> MethodRef {
    MethodRef {
        is_static: true,
        ..method(declaring_type, name, param_types)
    }
}

pub fn frame_at(location: Location) -> MockFrame {
    MockFrame {
        location,
        this: None,
        locals: vec![],
        args: vec![],
    }
}

/// Broker attached to a fresh mock target over the socket path.
pub fn connected_broker(target: Arc<MockTarget>) -> Broker {
    let _ = env_logger::builder().is_test(true).try_init();
    let broker = Broker::new(Arc::new(MockConnector {
        target: target.clone(),
    }));
    broker
        .attach_socket("localhost", 5005, false, Duration::from_secs(1))
        .expect("attach to mock");
    broker
}

/// Poll until the condition holds or the deadline passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
