use crate::broker::adapter::AdapterError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- session lifecycle -----------------------------------------
    #[error("no debug session is active")]
    NotConnected,
    #[error("a debug session is already active ({0})")]
    AlreadyConnected(String),
    #[error("launch failed: {0}")]
    Launch(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("no usable local port: {0}")]
    PortUnavailable(String),

    // --------------------------------- symbol resolution -----------------------------------------
    #[error("class `{0}` is not loaded")]
    ClassNotFound(String),
    #[error("field `{1}` not found in class `{0}`")]
    FieldNotFound(String, String),
    #[error("method `{1}` not found in class `{0}`")]
    MethodNotFound(String, String),
    #[error("no executable code at {0}:{1}")]
    NoCodeAtLine(String, i32),
    #[error("class `{0}` is not a throwable type")]
    NotThrowable(String),
    #[error("no debug information: {0}")]
    NoDebugInfo(String),

    // --------------------------------- thread and frame state ------------------------------------
    #[error("thread `{0}` not found")]
    ThreadNotFound(String),
    #[error("thread `{0}` is not suspended")]
    ThreadNotSuspended(String),
    #[error("frame index {0} is out of range")]
    FrameOutOfRange(usize),
    #[error("top frame is native, no source-level operation possible")]
    NativeFrame,
    #[error("no object with unique id {0} is reachable from any suspended thread")]
    ObjectNotFound(u64),

    // --------------------------------- evaluation and invocation ---------------------------------
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
    #[error("null dereference while evaluating `{0}`")]
    NullDereference(String),
    #[error("ambiguous method overload: {0}")]
    OverloadAmbiguous(String),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("method invocation threw {exception_class} (object @{object_id})")]
    Thrown {
        exception_class: String,
        object_id: u64,
    },

    // --------------------------------- registries ------------------------------------------------
    #[error("no artefact with id `{0}`")]
    UnknownId(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // --------------------------------- adapter and environment -----------------------------------
    #[error("the debug adapter does not support {0}")]
    CapabilityMissing(&'static str),
    #[error("operation timed out")]
    Timeout,
    #[error("target disconnected")]
    VmDisconnected,
    #[error("interrupted")]
    Interrupted,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AdapterError> for Error {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Launch(msg) => Error::Launch(msg),
            AdapterError::Connect(msg) => Error::Connect(msg),
            AdapterError::NoDebugInfo(what) => Error::NoDebugInfo(what),
            AdapterError::Disconnected => Error::VmDisconnected,
            AdapterError::Unsupported(what) => Error::CapabilityMissing(what),
            AdapterError::InvalidValue(msg) => Error::TypeMismatch(msg),
            AdapterError::Internal(msg) => Error::Internal(msg),
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "broker", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "broker", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}
