//! The debug session: connection lifecycle, the event pump and the
//! stop/wait primitive that bridges asynchronous target events to
//! synchronous request/response clients.

use crate::broker::adapter::{
    AdapterError, DebugTarget, Event, EventSet, RequestHandle, TargetConnector,
};
use crate::broker::breakpoint::BreakpointRegistry;
use crate::broker::error::Error;
use crate::broker::launch::{self, LaunchedProcess};
use crate::broker::method_breakpoint::MethodBreakpointRegistry;
use crate::broker::monitor::EventMonitor;
use crate::broker::stop::StopReason;
use crate::broker::watchpoint::WatchpointRegistry;
use crate::weak_error;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How long one pump iteration blocks on the adapter event queue.
const PUMP_PULL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionKind {
    None,
    Launch,
    AttachSocket,
    AttachPid,
}

/// Snapshot of the session for `debug_status`.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub connected: bool,
    pub kind: ConnectionKind,
    pub detail: String,
    pub connected_at_ms: Option<i64>,
    pub last_event: Option<String>,
    pub stop: StopReason,
}

/// Registries the pump feeds: deferred resolution on class prepare and the
/// captured-event ring.
#[derive(Clone)]
pub struct PumpRegistries {
    pub breakpoints: BreakpointRegistry,
    pub watchpoints: WatchpointRegistry,
    pub method_breakpoints: MethodBreakpointRegistry,
    pub monitors: EventMonitor,
}

/// Stop state shared between the pump (sole writer on event arrival) and
/// request workers (readers, clearers, waiters).
struct StopState {
    reason: Mutex<StopReason>,
    cond: Condvar,
    /// False once the target is gone; waiters then observe a disconnect
    /// without relying on the last written reason.
    alive: AtomicBool,
}

impl StopState {
    fn new() -> Self {
        StopState {
            reason: Mutex::new(StopReason::none()),
            cond: Condvar::new(),
            alive: AtomicBool::new(false),
        }
    }

    fn set(&self, reason: StopReason) {
        let mut guard = self.reason.lock().unwrap();
        *guard = reason;
        self.cond.notify_all();
    }

    fn clear(&self) {
        let mut guard = self.reason.lock().unwrap();
        *guard = StopReason::none();
    }

    fn current(&self) -> StopReason {
        self.reason.lock().unwrap().clone()
    }

    fn wait(&self, timeout: Duration) -> StopReason {
        let deadline = Instant::now() + timeout;
        let mut guard = self.reason.lock().unwrap();
        loop {
            if guard.is_stopped() {
                return guard.clone();
            }
            if !self.alive.load(Ordering::Acquire) {
                return StopReason::vm_disconnect();
            }
            let now = Instant::now();
            if now >= deadline {
                return StopReason::none();
            }
            let (reacquired, _) = self.cond.wait_timeout(guard, deadline - now).unwrap();
            guard = reacquired;
        }
    }
}

struct Connection {
    target: Arc<dyn DebugTarget>,
    kind: ConnectionKind,
    detail: String,
    connected_at_ms: i64,
    pump: Option<JoinHandle<()>>,
    pump_stop: Arc<AtomicBool>,
    child: Option<LaunchedProcess>,
}

/// Owns the target handle, the event pump and the stop state. Exactly one
/// debuggee at a time.
pub struct DebugSession {
    state: Mutex<Option<Connection>>,
    stop: Arc<StopState>,
    last_event: Arc<Mutex<Option<String>>>,
    /// Outstanding one-shot step request per thread id.
    steps: Arc<Mutex<HashMap<u64, RequestHandle>>>,
}

impl Default for DebugSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugSession {
    pub fn new() -> Self {
        DebugSession {
            state: Mutex::new(None),
            stop: Arc::new(StopState::new()),
            last_event: Arc::new(Mutex::new(None)),
            steps: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    // ------------------------------- lifecycle ---------------------------------------------------

    /// Spawn the debuggee with a debug agent on a fresh local port, wait for
    /// the agent, then attach. The subprocess is killed on any failure.
    #[allow(clippy::too_many_arguments)]
    pub fn launch(
        &self,
        registries: PumpRegistries,
        connector: &dyn TargetConnector,
        main_class: &str,
        classpath: Option<&str>,
        jvm_args: &[String],
        suspend_on_start: bool,
        wait_timeout: Duration,
    ) -> Result<SessionStatus, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(conn) = state.as_ref() {
            return Err(Error::AlreadyConnected(conn.detail.clone()));
        }

        let port = launch::allocate_free_port()?;
        let mut process = launch::spawn_debuggee(
            main_class,
            classpath,
            jvm_args,
            suspend_on_start,
            port,
        )?;
        launch::wait_for_port("127.0.0.1", port, wait_timeout, Some(&mut process))?;

        let target = connector
            .connect_socket("127.0.0.1", port)
            .map_err(|e| Error::Connect(e.to_string()))?;

        let detail = format!("launch {main_class} (pid {}, port {port})", process.pid());
        let conn = self.install(
            registries,
            target,
            ConnectionKind::Launch,
            detail,
            Some(process),
        );
        let status = status_of(&conn, &self.stop, &self.last_event);
        *state = Some(conn);
        Ok(status)
    }

    pub fn attach_socket(
        &self,
        registries: PumpRegistries,
        connector: &dyn TargetConnector,
        host: &str,
        port: u16,
        wait_for_port: bool,
        wait_timeout: Duration,
    ) -> Result<SessionStatus, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(conn) = state.as_ref() {
            return Err(Error::AlreadyConnected(conn.detail.clone()));
        }
        if wait_for_port {
            launch::wait_for_port(host, port, wait_timeout, None)
                .map_err(|e| Error::Connect(e.to_string()))?;
        }
        let target = connector
            .connect_socket(host, port)
            .map_err(|e| Error::Connect(e.to_string()))?;
        let detail = format!("socket {host}:{port}");
        let conn = self.install(registries, target, ConnectionKind::AttachSocket, detail, None);
        let status = status_of(&conn, &self.stop, &self.last_event);
        *state = Some(conn);
        Ok(status)
    }

    pub fn attach_pid(
        &self,
        registries: PumpRegistries,
        connector: &dyn TargetConnector,
        pid: u32,
    ) -> Result<SessionStatus, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(conn) = state.as_ref() {
            return Err(Error::AlreadyConnected(conn.detail.clone()));
        }

        let mut system = sysinfo::System::new();
        system.refresh_processes();
        if system.process(sysinfo::Pid::from_u32(pid)).is_none() {
            return Err(Error::Connect(format!("no running process with pid {pid}")));
        }

        let target = connector
            .connect_pid(pid)
            .map_err(|e| Error::Connect(e.to_string()))?;
        let detail = format!("pid {pid}");
        let conn = self.install(registries, target, ConnectionKind::AttachPid, detail, None);
        let status = status_of(&conn, &self.stop, &self.last_event);
        *state = Some(conn);
        Ok(status)
    }

    fn install(
        &self,
        registries: PumpRegistries,
        target: Arc<dyn DebugTarget>,
        kind: ConnectionKind,
        detail: String,
        child: Option<LaunchedProcess>,
    ) -> Connection {
        self.stop.clear();
        self.stop.alive.store(true, Ordering::Release);
        *self.last_event.lock().unwrap() = None;
        self.steps.lock().unwrap().clear();

        let pump_stop = Arc::new(AtomicBool::new(false));
        let pump = {
            let target = target.clone();
            let stop = self.stop.clone();
            let last_event = self.last_event.clone();
            let steps = self.steps.clone();
            let flag = pump_stop.clone();
            std::thread::Builder::new()
                .name("event-pump".to_string())
                .spawn(move || pump_loop(target, stop, registries, last_event, steps, flag))
                .expect("spawn event pump")
        };

        log::info!(target: "broker", "connected: {detail}");
        Connection {
            target,
            kind,
            detail,
            connected_at_ms: chrono::Utc::now().timestamp_millis(),
            pump: Some(pump),
            pump_stop,
            child,
        }
    }

    /// Tear the session down. Waiters observe a `VM_DISCONNECT`; afterwards
    /// the stop reason is back to the `NONE` sentinel. Returns the disposed
    /// target so the owner can run best-effort registry cleanup against it.
    pub fn disconnect(&self) -> Option<Arc<dyn DebugTarget>> {
        let mut conn = self.state.lock().unwrap().take()?;

        self.stop.alive.store(false, Ordering::Release);
        self.stop.set(StopReason::vm_disconnect());

        conn.pump_stop.store(true, Ordering::Relaxed);
        if let Some(pump) = conn.pump.take() {
            let _ = pump.join();
        }
        conn.target.dispose();
        if let Some(mut child) = conn.child.take() {
            child.kill();
        }
        self.steps.lock().unwrap().clear();
        *self.last_event.lock().unwrap() = None;
        self.stop.clear();

        log::info!(target: "broker", "disconnected: {}", conn.detail);
        Some(conn.target)
    }

    // ------------------------------- accessors ---------------------------------------------------

    pub fn target(&self) -> Result<Arc<dyn DebugTarget>, Error> {
        let state = self.state.lock().unwrap();
        state
            .as_ref()
            .map(|conn| conn.target.clone())
            .ok_or(Error::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state.lock().unwrap();
        match state.as_ref() {
            Some(conn) => status_of(conn, &self.stop, &self.last_event),
            None => SessionStatus {
                connected: false,
                kind: ConnectionKind::None,
                detail: String::new(),
                connected_at_ms: None,
                last_event: None,
                stop: StopReason::none(),
            },
        }
    }

    // ------------------------------- stop / wait -------------------------------------------------

    pub fn stop_reason(&self) -> StopReason {
        self.stop.current()
    }

    pub fn set_stop_reason(&self, reason: StopReason) {
        self.stop.set(reason);
    }

    pub fn clear_stop_reason(&self) {
        self.stop.clear();
    }

    /// Block until the target stops, the session dies or the timeout
    /// passes. Returns `StopReason::none()` on timeout.
    pub fn wait_for_stop(&self, timeout: Duration) -> StopReason {
        self.stop.wait(timeout)
    }

    /// Clear the stop reason, then resume the whole target. Done in this
    /// order so a following `wait_for_stop` observes the *next* stop.
    pub fn resume(&self) -> Result<(), Error> {
        let target = self.target()?;
        self.stop.clear();
        target.resume()?;
        Ok(())
    }

    /// Suspend every thread and install a `USER_SUSPEND` stop reason (the
    /// adapter produces no event for a client-initiated suspension).
    pub fn suspend(&self) -> Result<(), Error> {
        let target = self.target()?;
        target.suspend()?;
        self.stop.set(StopReason::user_suspend());
        Ok(())
    }

    // ------------------------------- step bookkeeping --------------------------------------------

    /// Delete any outstanding step request for the thread.
    pub fn clear_step(&self, target: &dyn DebugTarget, thread_id: u64) {
        if let Some(handle) = self.steps.lock().unwrap().remove(&thread_id) {
            weak_error!(target.delete_request(handle));
        }
    }

    pub fn note_step(&self, thread_id: u64, handle: RequestHandle) {
        self.steps.lock().unwrap().insert(thread_id, handle);
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn status_of(
    conn: &Connection,
    stop: &StopState,
    last_event: &Mutex<Option<String>>,
) -> SessionStatus {
    SessionStatus {
        connected: true,
        kind: conn.kind,
        detail: conn.detail.clone(),
        connected_at_ms: Some(conn.connected_at_ms),
        last_event: last_event.lock().unwrap().clone(),
        stop: stop.current(),
    }
}

// ------------------------------- the event pump --------------------------------------------------

fn pump_loop(
    target: Arc<dyn DebugTarget>,
    stop: Arc<StopState>,
    registries: PumpRegistries,
    last_event: Arc<Mutex<Option<String>>>,
    steps: Arc<Mutex<HashMap<u64, RequestHandle>>>,
    flag: Arc<AtomicBool>,
) {
    log::debug!(target: "broker", "event pump started");
    while !flag.load(Ordering::Relaxed) {
        let set = match target.pull_events(PUMP_PULL_TIMEOUT) {
            Ok(Some(set)) => set,
            Ok(None) => continue,
            Err(AdapterError::Disconnected) => {
                stop.alive.store(false, Ordering::Release);
                stop.set(StopReason::vm_disconnect());
                break;
            }
            Err(e) => {
                log::warn!(target: "broker", "event pump pull: {e}");
                continue;
            }
        };
        if !process_event_set(&target, &stop, &registries, &last_event, &steps, set) {
            break;
        }
    }
    log::debug!(target: "broker", "event pump finished");
}

/// Handle one event set. Returns `false` when the pump must terminate.
fn process_event_set(
    target: &Arc<dyn DebugTarget>,
    stop: &StopState,
    registries: &PumpRegistries,
    last_event: &Mutex<Option<String>>,
    steps: &Mutex<HashMap<u64, RequestHandle>>,
    set: EventSet,
) -> bool {
    let mut stopped = false;
    for event in &set.events {
        log::debug!(target: "broker", "event: {}", event.kind_name());
        *last_event.lock().unwrap() = Some(event.kind_name().to_string());

        if let Some(reason) = StopReason::from_event(event, &registries.breakpoints) {
            match event {
                Event::Breakpoint { location, .. } => {
                    registries.breakpoints.record_hit(location);
                }
                Event::Step {
                    request, thread, ..
                } => {
                    // one-shot: the fired request must not stay armed
                    steps.lock().unwrap().remove(&thread.id);
                    weak_error!(target.delete_request(*request));
                }
                _ => {}
            }
            stop.set(reason);
            stopped = true;
            continue;
        }

        match event {
            Event::VmDisconnect => {
                stop.alive.store(false, Ordering::Release);
                stop.set(StopReason::vm_disconnect());
                return false;
            }
            Event::ClassPrepare { type_ref, .. } => {
                registries.breakpoints.on_class_prepare(&**target, type_ref);
                registries.watchpoints.on_class_prepare(&**target, type_ref);
                registries
                    .method_breakpoints
                    .on_class_prepare(&**target, type_ref);
                registries.monitors.capture(event);
            }
            other => registries.monitors.capture(other),
        }
    }

    // a set holding any stop event leaves the target suspended
    if !stopped {
        weak_error!(target.resume_event_set(set.id));
    }
    true
}
