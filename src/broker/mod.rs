//! The debug-control engine: one controller owning the session, the
//! breakpoint/watchpoint registries and the subscription stores. The
//! transport dispatcher holds a reference to a single [`Broker`] and calls
//! into it; tests construct a fresh broker per case.

pub mod adapter;
pub mod async_stack;
pub mod breakpoint;
pub mod error;
pub mod eval;
pub mod exception;
pub mod inspect;
pub mod invoke;
pub mod launch;
pub mod method_breakpoint;
pub mod monitor;
pub mod render;
pub mod session;
pub mod step;
pub mod stop;
pub mod watch;
pub mod watchpoint;

pub use error::Error;

use crate::broker::adapter::{DebugTarget, TargetConnector, Value};
use crate::broker::breakpoint::BreakpointRegistry;
use crate::broker::eval::{EvalContext, ObjectLookup};
use crate::broker::exception::ExceptionRegistry;
use crate::broker::method_breakpoint::MethodBreakpointRegistry;
use crate::broker::monitor::EventMonitor;
use crate::broker::session::{DebugSession, PumpRegistries, SessionStatus};
use crate::broker::watch::{WatchExpression, WatchStore};
use crate::broker::watchpoint::WatchpointRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Bounded poll for the launched debug agent to open its port.
pub const LAUNCH_WAIT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Broker {
    connector: Arc<dyn TargetConnector>,
    session: DebugSession,
    breakpoints: BreakpointRegistry,
    watchpoints: WatchpointRegistry,
    method_breakpoints: MethodBreakpointRegistry,
    exceptions: ExceptionRegistry,
    watches: WatchStore,
    monitors: EventMonitor,
}

impl Broker {
    pub fn new(connector: Arc<dyn TargetConnector>) -> Self {
        Broker {
            connector,
            session: DebugSession::new(),
            breakpoints: BreakpointRegistry::new(),
            watchpoints: WatchpointRegistry::new(),
            method_breakpoints: MethodBreakpointRegistry::new(),
            exceptions: ExceptionRegistry::new(),
            watches: WatchStore::new(),
            monitors: EventMonitor::new(),
        }
    }

    fn registries(&self) -> PumpRegistries {
        PumpRegistries {
            breakpoints: self.breakpoints.clone(),
            watchpoints: self.watchpoints.clone(),
            method_breakpoints: self.method_breakpoints.clone(),
            monitors: self.monitors.clone(),
        }
    }

    // ------------------------------- component access --------------------------------------------

    pub fn session(&self) -> &DebugSession {
        &self.session
    }

    pub fn target(&self) -> Result<Arc<dyn DebugTarget>, Error> {
        self.session.target()
    }

    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    pub fn watchpoints(&self) -> &WatchpointRegistry {
        &self.watchpoints
    }

    pub fn method_breakpoints(&self) -> &MethodBreakpointRegistry {
        &self.method_breakpoints
    }

    pub fn exceptions(&self) -> &ExceptionRegistry {
        &self.exceptions
    }

    pub fn watches(&self) -> &WatchStore {
        &self.watches
    }

    pub fn monitors(&self) -> &EventMonitor {
        &self.monitors
    }

    // ------------------------------- lifecycle ---------------------------------------------------

    pub fn launch(
        &self,
        main_class: &str,
        classpath: Option<&str>,
        jvm_args: &[String],
        suspend_on_start: bool,
    ) -> Result<SessionStatus, Error> {
        self.session.launch(
            self.registries(),
            &*self.connector,
            main_class,
            classpath,
            jvm_args,
            suspend_on_start,
            LAUNCH_WAIT_TIMEOUT,
        )
    }

    pub fn attach_socket(
        &self,
        host: &str,
        port: u16,
        wait_for_port: bool,
        wait_timeout: Duration,
    ) -> Result<SessionStatus, Error> {
        self.session.attach_socket(
            self.registries(),
            &*self.connector,
            host,
            port,
            wait_for_port,
            wait_timeout,
        )
    }

    pub fn attach_pid(&self, pid: u32) -> Result<SessionStatus, Error> {
        self.session
            .attach_pid(self.registries(), &*self.connector, pid)
    }

    /// Full teardown: session, subprocess, adapter requests, every registry
    /// and store. Idempotent; infallible externally.
    pub fn disconnect(&self) -> bool {
        let Some(target) = self.session.disconnect() else {
            return false;
        };
        self.breakpoints.clear_all(&*target);
        self.watchpoints.clear_all(&*target);
        self.method_breakpoints.clear_all(&*target);
        self.exceptions.clear_all(&*target);
        self.watches.reset();
        self.monitors.reset();
        true
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    // ------------------------------- evaluation --------------------------------------------------

    /// Evaluate an expression against a suspended thread's frame.
    pub fn evaluate(
        &self,
        thread_id: Option<u64>,
        frame_index: usize,
        source: &str,
    ) -> Result<Value, Error> {
        let target = self.target()?;
        let thread = self.find_thread(thread_id)?;
        self.require_suspended(&*target, &thread)?;
        let frame = self.frame_at(&*target, &thread, frame_index)?;
        let ctx = EvalContext {
            target: &*target,
            thread: &thread,
            frame: &frame,
            lookup: self,
        };
        eval::evaluate(&ctx, source)
    }

    /// Evaluate every stored watch expression against the current stop
    /// thread, memoising values and errors.
    pub fn evaluate_watches(&self) -> Result<Vec<WatchExpression>, Error> {
        let stop = self.session.stop_reason();
        let thread_id = stop.thread.as_ref().map(|t| t.id);
        for watch in self.watches.list() {
            match self.evaluate(thread_id, 0, &watch.source) {
                Ok(value) => self
                    .watches
                    .note_value(&watch.id, render::value_with_id(&value)),
                Err(e) => self.watches.note_error(&watch.id, e.to_string()),
            }
        }
        Ok(self.watches.list())
    }
}

impl ObjectLookup for Broker {
    fn object_by_id(&self, id: u64) -> Result<Value, Error> {
        self.find_object(id)
    }
}
