//! Capability surface over the debug-wire protocol.
//!
//! The broker core never talks to a wire protocol directly: everything it
//! needs from the debuggee goes through [`DebugTarget`], and new connections
//! are produced by a [`TargetConnector`]. Any concrete wire implementation
//! (a JDWP client, a test double) is interchangeable behind these traits.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, AdapterError>;

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("launch: {0}")]
    Launch(String),
    #[error("connect: {0}")]
    Connect(String),
    #[error("no debug information for {0}")]
    NoDebugInfo(String),
    #[error("target disconnected")]
    Disconnected,
    #[error("unsupported by this adapter: {0}")]
    Unsupported(&'static str),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("{0}")]
    Internal(String),
}

/// A thread inside the target. The id is unique for the lifetime of the
/// target process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRef {
    pub id: u64,
    pub name: String,
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id={})", self.name, self.id)
    }
}

/// A source location. `line <= 0` means native or synthetic code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub type_name: String,
    pub method_name: String,
    pub method_signature: String,
    pub line: i32,
}

impl Location {
    pub fn is_native(&self) -> bool {
        self.line <= 0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}:{}", self.type_name, self.method_name, self.line)
    }
}

/// A loaded reference type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub id: u64,
    pub name: String,
    pub type_name: String,
    pub declaring_type: String,
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub id: u64,
    pub name: String,
    pub signature: String,
    pub declaring_type: String,
    /// Parameter type names in declaration order.
    pub param_types: Vec<String>,
    pub is_static: bool,
}

impl MethodRef {
    pub fn arity(&self) -> usize {
        self.param_types.len()
    }
}

/// A stack frame of a suspended thread. Frames are indexed from the top
/// (index 0 is the innermost frame) and are invalidated by any resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRef {
    pub thread_id: u64,
    pub index: usize,
    pub location: Location,
}

/// A named binding visible in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVar {
    pub name: String,
    pub type_name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl PrimitiveValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveValue::Boolean(_) => "boolean",
            PrimitiveValue::Byte(_) => "byte",
            PrimitiveValue::Short(_) => "short",
            PrimitiveValue::Char(_) => "char",
            PrimitiveValue::Int(_) => "int",
            PrimitiveValue::Long(_) => "long",
            PrimitiveValue::Float(_) => "float",
            PrimitiveValue::Double(_) => "double",
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveValue::Boolean(v) => write!(f, "{v}"),
            PrimitiveValue::Byte(v) => write!(f, "{v}"),
            PrimitiveValue::Short(v) => write!(f, "{v}"),
            PrimitiveValue::Char(v) => write!(f, "'{v}'"),
            PrimitiveValue::Int(v) => write!(f, "{v}"),
            PrimitiveValue::Long(v) => write!(f, "{v}"),
            PrimitiveValue::Float(v) => write!(f, "{v}"),
            PrimitiveValue::Double(v) => write!(f, "{v}"),
        }
    }
}

/// A mirrored value produced by the target.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Primitive(PrimitiveValue),
    Str { id: u64, value: String },
    Array { id: u64, type_name: String, length: i32 },
    Object { id: u64, type_name: String },
}

impl Value {
    /// Unique id of the underlying object, when the value is a reference.
    pub fn object_id(&self) -> Option<u64> {
        match self {
            Value::Str { id, .. } | Value::Array { id, .. } | Value::Object { id, .. } => Some(*id),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Primitive(p) => p.type_name().to_string(),
            Value::Str { .. } => "java.lang.String".to_string(),
            Value::Array { type_name, .. } | Value::Object { type_name, .. } => type_name.clone(),
        }
    }
}

/// Outcome of a method invocation inside the target.
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Return(Value),
    Thrown { exception_class: String, object_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendPolicy {
    None,
    EventThread,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDepth {
    Into,
    Over,
    Out,
}

/// Feature flags advertised by a concrete adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub watchpoints: bool,
    pub monitor_events: bool,
}

/// One event pulled from the target's event queue.
#[derive(Debug, Clone)]
pub enum Event {
    Breakpoint {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
    },
    Step {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
    },
    Exception {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
        exception: Value,
        catch_location: Option<Location>,
    },
    AccessWatchpoint {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
        field: FieldRef,
        current: Value,
    },
    ModifyWatchpoint {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
        field: FieldRef,
        value_to_be: Value,
    },
    MethodEntry {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
    },
    MethodExit {
        request: RequestHandle,
        thread: ThreadRef,
        location: Location,
        return_value: Option<Value>,
    },
    VmStart {
        thread: ThreadRef,
    },
    VmDisconnect,
    ClassPrepare {
        request: Option<RequestHandle>,
        type_ref: TypeRef,
    },
    ClassUnload {
        type_name: String,
    },
    ThreadStart {
        thread: ThreadRef,
    },
    ThreadDeath {
        thread: ThreadRef,
    },
    MonitorContended {
        thread: ThreadRef,
        monitor_type: String,
    },
    MonitorWait {
        thread: ThreadRef,
        monitor_type: String,
        timeout_ms: i64,
    },
}

impl Event {
    /// Stop events leave the target suspended, monitor events do not.
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            Event::Breakpoint { .. }
                | Event::Step { .. }
                | Event::Exception { .. }
                | Event::AccessWatchpoint { .. }
                | Event::ModifyWatchpoint { .. }
                | Event::MethodEntry { .. }
                | Event::MethodExit { .. }
                | Event::VmStart { .. }
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Breakpoint { .. } => "breakpoint",
            Event::Step { .. } => "step",
            Event::Exception { .. } => "exception",
            Event::AccessWatchpoint { .. } => "access watchpoint",
            Event::ModifyWatchpoint { .. } => "modification watchpoint",
            Event::MethodEntry { .. } => "method entry",
            Event::MethodExit { .. } => "method exit",
            Event::VmStart { .. } => "vm start",
            Event::VmDisconnect => "vm disconnect",
            Event::ClassPrepare { .. } => "class prepare",
            Event::ClassUnload { .. } => "class unload",
            Event::ThreadStart { .. } => "thread start",
            Event::ThreadDeath { .. } => "thread death",
            Event::MonitorContended { .. } => "monitor contended",
            Event::MonitorWait { .. } => "monitor wait",
        }
    }
}

/// A batch of simultaneous events. The suspend policy of the set is the most
/// restrictive policy of any event in it; a set delivered with policy `All`
/// leaves the target suspended until the set (or the target) is resumed.
#[derive(Debug, Clone)]
pub struct EventSet {
    pub id: u64,
    pub suspend_policy: SuspendPolicy,
    pub events: Vec<Event>,
}

/// Produces connected targets. Implementations wrap one concrete wire
/// protocol; the broker owns exactly one target at a time.
pub trait TargetConnector: Send + Sync {
    fn connect_socket(&self, host: &str, port: u16) -> Result<Arc<dyn DebugTarget>>;
    fn connect_pid(&self, pid: u32) -> Result<Arc<dyn DebugTarget>>;
}

/// Operations the broker performs on a connected debuggee.
///
/// All methods take `&self`: a target is shared between the event pump and
/// the request workers, and implementations synchronize internally.
pub trait DebugTarget: Send + Sync {
    // ------------------------------- lifecycle and identity --------------------------------------

    /// Release the connection. Idempotent, never fails.
    fn dispose(&self);
    fn vm_name(&self) -> String;
    fn vm_version(&self) -> String;
    fn capabilities(&self) -> Capabilities;

    // ------------------------------- symbol lookup -----------------------------------------------

    fn classes_by_name(&self, name: &str) -> Vec<TypeRef>;
    fn field_by_name(&self, type_ref: &TypeRef, name: &str) -> Result<Option<FieldRef>>;
    fn methods(&self, type_ref: &TypeRef) -> Result<Vec<MethodRef>>;
    fn is_throwable(&self, type_ref: &TypeRef) -> Result<bool>;
    /// Executable locations for a source line. Empty when the line holds no
    /// code; `NoDebugInfo` when the class was compiled without line tables.
    fn locations_at_line(&self, type_ref: &TypeRef, line: i32) -> Result<Vec<Location>>;

    // ------------------------------- event requests ----------------------------------------------

    fn create_breakpoint(&self, location: &Location) -> Result<RequestHandle>;
    fn create_access_watch(&self, field: &FieldRef) -> Result<RequestHandle>;
    fn create_modify_watch(&self, field: &FieldRef) -> Result<RequestHandle>;
    fn create_method_entry(&self, type_ref: &TypeRef) -> Result<RequestHandle>;
    fn create_method_exit(&self, type_ref: &TypeRef) -> Result<RequestHandle>;
    fn create_exception(
        &self,
        type_ref: Option<&TypeRef>,
        caught: bool,
        uncaught: bool,
    ) -> Result<RequestHandle>;
    fn create_class_prepare(&self, filter: Option<&str>) -> Result<RequestHandle>;
    fn create_class_unload(&self) -> Result<RequestHandle>;
    fn create_thread_start(&self) -> Result<RequestHandle>;
    fn create_thread_death(&self) -> Result<RequestHandle>;
    fn create_monitor_contended(&self) -> Result<RequestHandle>;
    /// One-shot step request; fires once and must then be deleted by the
    /// consumer of the step event.
    fn create_step(
        &self,
        thread: &ThreadRef,
        depth: StepDepth,
        class_filter: Option<&str>,
        count: i32,
    ) -> Result<RequestHandle>;

    fn enable_request(&self, handle: RequestHandle) -> Result<()>;
    fn disable_request(&self, handle: RequestHandle) -> Result<()>;
    fn delete_request(&self, handle: RequestHandle) -> Result<()>;
    fn set_suspend_policy(&self, handle: RequestHandle, policy: SuspendPolicy) -> Result<()>;

    // ------------------------------- mirrors -----------------------------------------------------

    /// Embed a host-side string into the target.
    fn mirror_string(&self, s: &str) -> Result<Value>;

    // ------------------------------- thread operations -------------------------------------------

    fn all_threads(&self) -> Result<Vec<ThreadRef>>;
    fn resume(&self) -> Result<()>;
    fn suspend(&self) -> Result<()>;
    fn resume_thread(&self, thread: &ThreadRef) -> Result<()>;
    fn suspend_thread(&self, thread: &ThreadRef) -> Result<()>;
    fn is_suspended(&self, thread: &ThreadRef) -> Result<bool>;
    fn frames(&self, thread: &ThreadRef) -> Result<Vec<FrameRef>>;

    // ------------------------------- frame and value operations ----------------------------------

    fn visible_locals(&self, frame: &FrameRef) -> Result<Vec<LocalVar>>;
    fn arguments(&self, frame: &FrameRef) -> Result<Vec<LocalVar>>;
    fn this_object(&self, frame: &FrameRef) -> Result<Option<Value>>;
    fn set_local(&self, frame: &FrameRef, name: &str, value: &Value) -> Result<()>;
    fn get_field(&self, object_id: u64, name: &str) -> Result<Option<Value>>;
    fn get_static_field(&self, type_ref: &TypeRef, name: &str) -> Result<Option<Value>>;
    fn object_fields(&self, object_id: u64) -> Result<Vec<(FieldRef, Value)>>;
    fn array_length(&self, array_id: u64) -> Result<i32>;
    fn array_slice(&self, array_id: u64, start: i32, count: i32) -> Result<Vec<Value>>;
    fn invoke_instance(
        &self,
        thread: &ThreadRef,
        object_id: u64,
        method: &MethodRef,
        args: &[Value],
    ) -> Result<InvokeOutcome>;
    fn invoke_static(
        &self,
        thread: &ThreadRef,
        type_ref: &TypeRef,
        method: &MethodRef,
        args: &[Value],
    ) -> Result<InvokeOutcome>;

    // ------------------------------- event queue -------------------------------------------------

    /// Pull the next event set, waiting at most `timeout`. `Ok(None)` on
    /// timeout; `Err(Disconnected)` once the target is gone.
    fn pull_events(&self, timeout: Duration) -> Result<Option<EventSet>>;
    /// Resume the threads suspended by delivery of the given event set.
    fn resume_event_set(&self, set_id: u64) -> Result<()>;
}
