//! Atomic persistence of `AppState`, plus the debounced background auto-saver.
//!
//! Grounded on the store module's `atomic_write` pattern: write to a temp
//! file in the same directory, `sync_all`, then `rename` over the final
//! path. `rename` within a filesystem is atomic, so readers never observe a
//! partially written state file.

use crate::log::{log_error, log_info};
use crate::workstream::{Lifecycle, Manager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const STATE_FILE_NAME: &str = ".ccells-state.json";
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedWorkstream {
    pub id: String,
    pub branch: String,
    pub prompt: String,
    pub title: Option<String>,
    pub container_id: Option<String>,
    pub agent_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub workstreams: Vec<PersistedWorkstream>,
    pub focused_index: Option<usize>,
    pub layout: Option<String>,
    pub repo_info: Option<serde_json::Value>,
}

impl AppState {
    pub fn from_manager(manager: &Manager, focused_index: Option<usize>, layout: Option<String>, repo_info: Option<serde_json::Value>, now: DateTime<Utc>) -> Self {
        let workstreams = manager
            .list()
            .into_iter()
            // A workstream whose branch name is empty is in title-generation
            // limbo and must not be persisted.
            .filter(|w| !w.branch_name().is_empty())
            .map(|w| PersistedWorkstream {
                id: w.id.clone(),
                branch: w.branch_name(),
                prompt: w.prompt(),
                title: {
                    let t = w.title();
                    if t == w.branch_name() { None } else { Some(t) }
                },
                container_id: w.container_id(),
                agent_session_id: w.agent_session_id(),
                created_at: w.created_at(),
            })
            .collect();

        Self {
            version: STATE_VERSION,
            saved_at: now,
            workstreams,
            focused_index,
            layout,
            repo_info,
        }
    }
}

/// Write `content` to `path` by first writing to a sibling temp file and
/// renaming it into place. The temp name embeds the current nanosecond
/// timestamp so concurrent writers never collide on the intermediate file.
fn atomic_write(path: &Path, content: &str, nanos: u128) -> std::io::Result<()> {
    let tmp_path = path.with_extension(format!("json.tmp.{nanos}"));
    let result = (|| {
        fs::write(&tmp_path, content)?;
        let f = fs::File::open(&tmp_path)?;
        f.sync_all()?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Falls back to the previously persisted `repo_info` when the caller didn't
/// supply one for this save — repo metadata is read-modify-write, not
/// write-once, so a save triggered by an unrelated mutation doesn't erase it.
fn resolve_repo_info(path: &Path, caller_supplied: Option<serde_json::Value>) -> Option<serde_json::Value> {
    if caller_supplied.is_some() {
        return caller_supplied;
    }
    let existing = fs::read_to_string(path).ok()?;
    let parsed: AppState = serde_json::from_str(&existing).ok()?;
    parsed.repo_info
}

pub enum LoadOutcome {
    Found(AppState),
    NotFound,
}

/// Persists `AppState` to `<state_dir>/.ccells-state.json`, serializing
/// writers on the same file through a process-wide lock, and runs the
/// debounced background auto-save loop.
pub struct StatePersister {
    state_dir: PathBuf,
    write_lock: Mutex<()>,
    dirty: Arc<AtomicBool>,
}

impl StatePersister {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            write_lock: Mutex::new(()),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    fn path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }

    /// Mark the in-memory state dirty so the next auto-save tick writes it.
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn save(&self, mut state: AppState) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        fs::create_dir_all(&self.state_dir)?;
        let path = self.path();
        state.repo_info = resolve_repo_info(&path, state.repo_info.take());

        let json = serde_json::to_string_pretty(&state)?;
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        atomic_write(&path, &json, nanos)
    }

    pub fn load(&self) -> Result<LoadOutcome, std::io::Error> {
        let path = self.path();
        if !path.exists() {
            return Ok(LoadOutcome::NotFound);
        }
        let contents = fs::read_to_string(&path)?;
        let state: AppState = serde_json::from_str(&contents)?;
        Ok(LoadOutcome::Found(state))
    }

    /// Run the auto-save loop on the calling thread until `done` fires.
    /// Ticks every `interval`; writes only if `mark_dirty()` was called since
    /// the last write. Performs a final flush on shutdown.
    pub fn run_auto_save_loop(
        &self,
        interval: Duration,
        done: &std::sync::mpsc::Receiver<()>,
        snapshot: impl Fn() -> AppState,
    ) {
        loop {
            match done.recv_timeout(interval) {
                Ok(()) | Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    let _ = self.save(snapshot());
                    log_info!("state", "auto-save loop stopped, final flush complete");
                    return;
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                    if self.dirty.swap(false, Ordering::SeqCst) {
                        if let Err(e) = self.save(snapshot()) {
                            log_error!("state", "auto-save failed, will retry: {e}");
                            self.dirty.store(true, Ordering::SeqCst);
                        }
                    }
                }
            }
        }
    }

    /// Force an immediate write regardless of the dirty flag.
    pub fn flush(&self, state: AppState) -> std::io::Result<()> {
        self.dirty.store(false, Ordering::SeqCst);
        self.save(state)
    }
}

/// Reconstruct a `Manager` from persisted state. Entries load as `Lifecycle::Idle`
/// with no worktree path — callers that need to reconnect to live containers
/// run the state repairer (`recovery::repair`) afterward.
pub fn restore_into_manager(state: &AppState, manager: &Manager) {
    for ws in &state.workstreams {
        let workstream = Arc::new(crate::workstream::Workstream::new(
            ws.id.clone(),
            ws.prompt.clone(),
            ws.branch.clone(),
            ws.created_at,
        ));
        if let Some(title) = &ws.title {
            workstream.set_title(title.clone(), ws.created_at);
        }
        if let Some(cid) = &ws.container_id {
            workstream.set_container_id(cid.clone(), ws.created_at);
        }
        if let Some(sid) = &ws.agent_session_id {
            workstream.set_agent_session_id(sid.clone(), ws.created_at);
        }
        workstream.set_state(Lifecycle::Idle, ws.created_at);
        let _ = manager.add(workstream);
    }
}
