//! Debuggee subprocess helpers: free-port allocation, spawn with a debug
//! agent, stdio draining and bounded port polling.

use crate::broker::error::Error;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// How many trailing output lines are retained for launch-failure messages.
const TAIL_LINES: usize = 100;

const PORT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A spawned debuggee whose stdout/stderr are drained by background readers
/// so the child can never block on a full pipe.
pub struct LaunchedProcess {
    child: Child,
    tail: Arc<Mutex<VecDeque<String>>>,
}

impl LaunchedProcess {
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Last captured output lines, oldest first.
    pub fn tail(&self) -> Vec<String> {
        self.tail.lock().unwrap().iter().cloned().collect()
    }

    pub fn has_exited(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.code().unwrap_or(-1)),
            _ => None,
        }
    }

    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for LaunchedProcess {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Ask the OS for a currently-free local TCP port.
pub fn allocate_free_port() -> Result<u16, Error> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .map_err(|e| Error::PortUnavailable(e.to_string()))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::PortUnavailable(e.to_string()))?
        .port();
    Ok(port)
}

/// Spawn the debuggee with a JDWP server agent listening on `port`.
pub fn spawn_debuggee(
    main_class: &str,
    classpath: Option<&str>,
    jvm_args: &[String],
    suspend_on_start: bool,
    port: u16,
) -> Result<LaunchedProcess, Error> {
    let java = which::which("java").unwrap_or_else(|_| "java".into());
    let suspend = if suspend_on_start { "y" } else { "n" };

    let mut command = Command::new(java);
    command.arg(format!(
        "-agentlib:jdwp=transport=dt_socket,server=y,suspend={suspend},address=127.0.0.1:{port}"
    ));
    if let Some(classpath) = classpath {
        command.arg("-cp").arg(classpath);
    }
    command.args(jvm_args);
    command.arg(main_class);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    log::debug!(target: "broker", "spawning debuggee: {command:?}");
    let mut child = command.spawn().map_err(|e| Error::Launch(e.to_string()))?;

    let tail = Arc::new(Mutex::new(VecDeque::new()));
    if let Some(stdout) = child.stdout.take() {
        drain(stdout, tail.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        drain(stderr, tail.clone());
    }

    Ok(LaunchedProcess { child, tail })
}

/// Wait until the debug agent accepts connections. Fails with the captured
/// output tail when the child exits first, and with a timeout message when
/// the deadline passes.
pub fn wait_for_port(
    host: &str,
    port: u16,
    timeout: Duration,
    process: Option<&mut LaunchedProcess>,
) -> Result<(), Error> {
    let deadline = Instant::now() + timeout;
    let mut process = process;
    loop {
        if let Some(proc) = process.as_deref_mut() {
            if let Some(code) = proc.has_exited() {
                return Err(Error::Launch(format!(
                    "debuggee exited with code {code} before the debug agent came up:\n{}",
                    proc.tail().join("\n")
                )));
            }
        }
        let addr = (host, port)
            .to_socket_addrs()
            .map_err(|e| Error::Connect(e.to_string()))?
            .next()
            .ok_or_else(|| Error::Connect(format!("cannot resolve {host}")))?;
        if TcpStream::connect_timeout(&addr, PORT_POLL_INTERVAL).is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Launch(format!(
                "port {port} did not accept connections within {}s",
                timeout.as_secs()
            )));
        }
        std::thread::sleep(PORT_POLL_INTERVAL);
    }
}

fn drain(stream: impl Read + Send + 'static, tail: Arc<Mutex<VecDeque<String>>>) {
    std::thread::spawn(move || {
        let reader = BufReader::new(stream);
        for line in reader.lines() {
            let Ok(line) = line else { break };
            let mut tail = tail.lock().unwrap();
            tail.push_back(line);
            while tail.len() > TAIL_LINES {
                tail.pop_front();
            }
        }
    });
}
