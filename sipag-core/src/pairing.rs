//! The pairing orchestrator: a single-instance-per-process state machine that
//! stashes local changes, checks out a workstream's branch, starts a
//! bidirectional sync session, monitors its health, and reverses all of it
//! on disable.
//!
//! The critical design point carried over from the orchestrator pattern
//! elsewhere in this codebase: no subprocess call is ever made while a
//! pairing-orchestrator lock is held, so a slow sync engine can never stall
//! a `state()` query from the UI.

use crate::sync::{SyncEngine, SyncSessionStatus, SyncStatus};
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Port over local git operations the orchestrator needs that are outside
/// this crate's scope (the git CLI itself).
pub trait LocalRepo {
    fn has_uncommitted_changes(&self) -> anyhow::Result<bool>;
    fn stash(&self) -> anyhow::Result<()>;
    fn checkout(&self, branch: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
struct State {
    active: bool,
    current_branch: Option<String>,
    previous_branch: Option<String>,
    container_id: Option<String>,
    local_path: Option<String>,
    stashed_changes: bool,
    sync_healthy: bool,
    last_conflicts: Vec<String>,
    sync_status: SyncStatus,
    sync_status_text: String,
    problems: Vec<String>,
    last_updated: DateTime<Utc>,
}

impl State {
    fn inactive() -> Self {
        Self {
            active: false,
            current_branch: None,
            previous_branch: None,
            container_id: None,
            local_path: None,
            stashed_changes: false,
            sync_healthy: false,
            last_conflicts: Vec::new(),
            sync_status: SyncStatus::Unknown,
            sync_status_text: String::new(),
            problems: Vec::new(),
            last_updated: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PairingSnapshot {
    pub active: bool,
    pub current_branch: Option<String>,
    pub sync_healthy: bool,
    pub sync_status: SyncStatus,
    pub sync_status_text: String,
    pub problems: Vec<String>,
}

/// One instance per process: a second `enable()` while already active must
/// be rejected by the caller before reaching here (the manager enforces "at
/// most one workstream in `pairing`"; this orchestrator enforces "at most
/// one active session").
pub struct PairingOrchestrator<R: LocalRepo, S: SyncEngine> {
    repo: R,
    sync: S,
    state: RwLock<State>,
}

impl<R: LocalRepo, S: SyncEngine> PairingOrchestrator<R, S> {
    pub fn new(repo: R, sync: S) -> Self {
        Self {
            repo,
            sync,
            state: RwLock::new(State::inactive()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.read().unwrap().active
    }

    pub fn snapshot(&self) -> PairingSnapshot {
        let s = self.state.read().unwrap();
        PairingSnapshot {
            active: s.active,
            current_branch: s.current_branch.clone(),
            sync_healthy: s.sync_healthy,
            sync_status: s.sync_status.clone(),
            sync_status_text: s.sync_status_text.clone(),
            problems: s.problems.clone(),
        }
    }

    pub fn enable(
        &self,
        branch: &str,
        container_id: &str,
        local_path: &str,
        previous_branch: &str,
    ) -> anyhow::Result<()> {
        let mut stashed_changes = false;
        if self.repo.has_uncommitted_changes()? {
            self.repo.stash()?;
            stashed_changes = true;
        }

        if let Err(e) = self.sync.create_session(branch, container_id, local_path) {
            return Err(e);
        }

        if let Err(e) = self.repo.checkout(branch) {
            let _ = self.sync.terminate_session(branch);
            return Err(e);
        }

        let mut state = self.state.write().unwrap();
        state.active = true;
        state.current_branch = Some(branch.to_string());
        state.previous_branch = Some(previous_branch.to_string());
        state.container_id = Some(container_id.to_string());
        state.local_path = Some(local_path.to_string());
        state.stashed_changes = stashed_changes;
        state.sync_healthy = true;
        state.sync_status = SyncStatus::Watching;
        state.sync_status_text = "Watching for changes".to_string();
        state.last_updated = Utc::now();
        Ok(())
    }

    pub fn disable(&self) -> anyhow::Result<()> {
        let (branch, previous_branch, was_active) = {
            let s = self.state.read().unwrap();
            (s.current_branch.clone(), s.previous_branch.clone(), s.active)
        };
        if !was_active {
            return Ok(());
        }

        if let Some(branch) = &branch {
            let _ = self.sync.terminate_session(branch);
        }

        let checkout_result = match &previous_branch {
            Some(prev) if !prev.is_empty() => self.repo.checkout(prev),
            _ => Ok(()),
        };

        let mut state = self.state.write().unwrap();
        *state = State::inactive();
        state.sync_status = SyncStatus::Unknown;
        checkout_result
    }

    /// Poll the sync engine for current status. Releases all locks around
    /// the subprocess call; if `active`/`current_branch` changed while the
    /// call was in flight, discards the (now stale) result. Returns an error
    /// if the polled status is disconnected, conflicted, or erroring, so
    /// callers driving this on a timer observe unhealthy sessions instead of
    /// only seeing it via `snapshot()`.
    pub fn check_sync_health(&self) -> anyhow::Result<()> {
        let (active, branch) = {
            let s = self.state.read().unwrap();
            (s.active, s.current_branch.clone())
        };
        if !active {
            return Ok(());
        }
        let Some(branch) = branch else { return Ok(()) };

        let status = self.sync.get_session_status(&branch)?;

        let mut state = self.state.write().unwrap();
        if !state.active || state.current_branch.as_deref() != Some(branch.as_str()) {
            return Ok(());
        }

        apply_status(&mut state, &status);
        if !status.status.is_healthy() {
            anyhow::bail!("sync session for {branch} is unhealthy: {}", status.status_text);
        }
        Ok(())
    }
}

fn apply_status(state: &mut State, status: &SyncSessionStatus) {
    state.sync_status = status.status.clone();
    state.sync_status_text = status.status_text.clone();
    state.last_conflicts = status.conflicts.clone();
    state.problems = status.problems.clone();
    state.last_updated = Utc::now();
    state.sync_healthy = status.status.is_healthy();
}
