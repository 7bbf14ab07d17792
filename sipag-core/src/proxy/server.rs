//! Per-container local-socket listener: concurrent request handling plus the
//! `onPRCreated` / `onPushComplete` callbacks.
//!
//! `std::os::unix::net` has no "wake the blocked accept() on shutdown"
//! primitive the way a select-based runtime would, so each accept loop polls
//! a non-blocking listener against a shutdown flag instead of blocking
//! directly on `accept()` — functionally the same "blocks on accept; on
//! error, if shutting down return cleanly, else log and continue" contract.

use super::executor::execute;
use super::protocol::{Operation, Request, Response};
use super::validate::validate;
use crate::log::{log_error, log_info, log_warn};
use crate::workstream::WorkstreamSnapshot;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::Duration;

pub type PrCreatedCallback = Box<dyn Fn(&str, u64, &str) + Send + Sync>;
pub type PushCompleteCallback = Box<dyn Fn(&str) + Send + Sync>;

struct InFlight {
    count: Mutex<usize>,
    zero: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            zero: Condvar::new(),
        }
    }

    fn enter(&self) {
        *self.count.lock().unwrap() += 1;
    }

    fn leave(&self) {
        let mut n = self.count.lock().unwrap();
        *n -= 1;
        if *n == 0 {
            self.zero.notify_all();
        }
    }

    fn wait_for_drain(&self) {
        let n = self.count.lock().unwrap();
        let _unused = self.zero.wait_while(n, |n| *n > 0).unwrap();
    }
}

struct ContainerHandle {
    socket_path: PathBuf,
    socket_dir: PathBuf,
    workstream: Arc<RwLock<WorkstreamSnapshot>>,
    shutting_down: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
    accept_thread: Option<std::thread::JoinHandle<()>>,
}

/// Owns every live git-proxy socket, one per container. Callbacks fire from
/// whatever connection-handler thread triggered them; they must not call
/// back into the server synchronously.
pub struct ProxyServer {
    base_dir: PathBuf,
    handler_timeout: Duration,
    handlers: RwLock<HashMap<String, ContainerHandle>>,
    on_pr_created: RwLock<Option<PrCreatedCallback>>,
    on_push_complete: RwLock<Option<PushCompleteCallback>>,
}

impl ProxyServer {
    pub fn new(base_dir: impl Into<PathBuf>, handler_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            base_dir: base_dir.into(),
            handler_timeout,
            handlers: RwLock::new(HashMap::new()),
            on_pr_created: RwLock::new(None),
            on_push_complete: RwLock::new(None),
        })
    }

    pub fn set_on_pr_created(&self, cb: PrCreatedCallback) {
        *self.on_pr_created.write().unwrap() = Some(cb);
    }

    pub fn set_on_push_complete(&self, cb: PushCompleteCallback) {
        *self.on_push_complete.write().unwrap() = Some(cb);
    }

    /// Start (or return the existing) socket for `container_id`.
    pub fn start(
        self: &Arc<Self>,
        container_id: &str,
        workstream: WorkstreamSnapshot,
    ) -> anyhow::Result<PathBuf> {
        if let Some(existing) = self.handlers.read().unwrap().get(container_id) {
            return Ok(existing.socket_path.clone());
        }

        let socket_dir = self.base_dir.join(container_id);
        std::fs::create_dir_all(&socket_dir)?;
        set_mode(&socket_dir, 0o755);

        let socket_path = socket_dir.join("git.sock");
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        listener.set_nonblocking(true)?;
        chown_best_effort(&socket_path);
        set_mode(&socket_path, 0o660);

        let workstream = Arc::new(RwLock::new(workstream));
        let shutting_down = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(InFlight::new());

        let accept_thread = spawn_accept_loop(
            self.clone(),
            container_id.to_string(),
            listener,
            workstream.clone(),
            shutting_down.clone(),
            in_flight.clone(),
        );

        self.handlers.write().unwrap().insert(
            container_id.to_string(),
            ContainerHandle {
                socket_path: socket_path.clone(),
                socket_dir,
                workstream,
                shutting_down,
                in_flight,
                accept_thread: Some(accept_thread),
            },
        );

        Ok(socket_path)
    }

    pub fn update_workstream(&self, container_id: &str, workstream: WorkstreamSnapshot) {
        if let Some(handle) = self.handlers.read().unwrap().get(container_id) {
            *handle.workstream.write().unwrap() = workstream;
        }
    }

    /// Stop the socket for `container_id`: signal shutdown, join the accept
    /// thread, drain in-flight handlers, then remove the socket file and its
    /// directory.
    pub fn stop(&self, container_id: &str) {
        let handle = self.handlers.write().unwrap().remove(container_id);
        let Some(mut handle) = handle else { return };

        handle.shutting_down.store(true, Ordering::SeqCst);
        if let Some(t) = handle.accept_thread.take() {
            let _ = t.join();
        }
        handle.in_flight.wait_for_drain();
        let _ = std::fs::remove_file(&handle.socket_path);
        let _ = std::fs::remove_dir(&handle.socket_dir);
    }

    pub fn shutdown_all(&self) {
        let ids: Vec<String> = self.handlers.read().unwrap().keys().cloned().collect();
        for id in ids {
            self.stop(&id);
        }
    }

    fn fire_pr_created(&self, workstream_id: &str, number: u64, url: &str) {
        if let Some(cb) = self.on_pr_created.read().unwrap().as_ref() {
            cb(workstream_id, number, url);
        }
    }

    fn fire_push_complete(&self, workstream_id: &str) {
        if let Some(cb) = self.on_push_complete.read().unwrap().as_ref() {
            cb(workstream_id);
        }
    }
}

#[cfg(unix)]
fn set_mode(path: &std::path::Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode));
}

#[cfg(unix)]
fn chown_best_effort(path: &std::path::Path) {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;
    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return;
    };
    // root:root; failure is expected and silent unless we're actually root.
    let rc = unsafe { libc::chown(c_path.as_ptr(), 0, 0) };
    if rc != 0 {
        log_warn!("proxy::server", "chown to root:root failed for {}", path.display());
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_accept_loop(
    server: Arc<ProxyServer>,
    container_id: String,
    listener: UnixListener,
    workstream: Arc<RwLock<WorkstreamSnapshot>>,
    shutting_down: Arc<AtomicBool>,
    in_flight: Arc<InFlight>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let server = server.clone();
                let container_id = container_id.clone();
                let workstream = workstream.clone();
                let in_flight_for_thread = in_flight.clone();
                in_flight.enter();
                std::thread::spawn(move || {
                    handle_connection(&server, &container_id, stream, &workstream);
                    in_flight_for_thread.leave();
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                if shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => {
                if shutting_down.load(Ordering::SeqCst) {
                    return;
                }
                log_error!("proxy::server", "accept failed on {container_id}: {e}");
            }
        }
    })
}

fn handle_connection(
    server: &Arc<ProxyServer>,
    container_id: &str,
    mut stream: UnixStream,
    workstream: &Arc<RwLock<WorkstreamSnapshot>>,
) {
    let mut reader = BufReader::new(stream.try_clone().expect("clone unix stream"));
    let mut line = String::new();
    if reader.read_line(&mut line).is_err() || line.is_empty() {
        return;
    }

    let request: Request = match serde_json::from_str(line.trim_end()) {
        Ok(r) => r,
        Err(e) => {
            respond(&mut stream, &Response::rejected(format!("invalid JSON: {e}")));
            return;
        }
    };

    let snapshot = workstream.read().unwrap().clone();

    if let Err(msg) = validate(request.operation, &request.args, &snapshot) {
        respond(&mut stream, &Response::rejected(msg));
        return;
    }

    let Some(worktree_path) = snapshot.worktree_path.clone() else {
        respond(&mut stream, &Response::rejected("workstream has no worktree path"));
        return;
    };

    let (response, pr_result) = execute(request.operation, &request.args, &worktree_path, server.handler_timeout);

    if let Some((number, url)) = pr_result {
        {
            let mut snap = workstream.write().unwrap();
            snap.pr_number = number;
        }
        log_info!("proxy::server", "PR created for {container_id}: #{number}");
        server.fire_pr_created(&snapshot.id, number, &url);
    }

    if request.operation == Operation::GitPush && response.exit_code == 0 {
        server.fire_push_complete(&snapshot.id);
    }

    respond(&mut stream, &response);
}

fn respond(stream: &mut UnixStream, response: &Response) {
    let mut json = serde_json::to_string(response).unwrap_or_else(|_| {
        r#"{"exitCode":1,"stdout":"","stderr":"","error":"failed to serialize response"}"#.to_string()
    });
    json.push('\n');
    let _ = stream.write_all(json.as_bytes());
}
