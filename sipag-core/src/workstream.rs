//! The workstream entity and the manager that owns a bounded set of them.

use crate::error::WorkstreamError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Lifecycle states. Active workstreams are the ones still doing something
/// on the host's behalf; `stopped` and `error` are terminal until removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    Starting,
    Running,
    Idle,
    Pairing,
    Stopped,
    Error,
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Lifecycle::Starting | Lifecycle::Running | Lifecycle::Idle | Lifecycle::Pairing
        )
    }
}

#[derive(Debug, Clone)]
struct Fields {
    prompt: String,
    branch_name: String,
    title: Option<String>,
    container_id: Option<String>,
    worktree_path: Option<String>,
    agent_session_id: Option<String>,
    state: Lifecycle,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    last_activity_at: DateTime<Utc>,
    pr_number: Option<u64>,
    pr_url: Option<String>,
    has_been_pushed: bool,
    was_interrupted: bool,
    synopsis: Option<String>,
}

/// A single workstream: the tuple (branch, worktree, container, agent session)
/// plus associated state. Every setter touches `last_activity_at` under the
/// same guard, so readers never observe a half-updated record.
pub struct Workstream {
    pub id: String,
    inner: RwLock<Fields>,
}

impl Workstream {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, branch_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            inner: RwLock::new(Fields {
                prompt: prompt.into(),
                branch_name: branch_name.into(),
                title: None,
                container_id: None,
                worktree_path: None,
                agent_session_id: None,
                state: Lifecycle::Starting,
                error_message: None,
                created_at: now,
                last_activity_at: now,
                pr_number: None,
                pr_url: None,
                has_been_pushed: false,
                was_interrupted: false,
                synopsis: None,
            }),
        }
    }

    pub fn prompt(&self) -> String {
        self.inner.read().unwrap().prompt.clone()
    }

    pub fn branch_name(&self) -> String {
        self.inner.read().unwrap().branch_name.clone()
    }

    /// `title` if set and non-empty, else `branch_name`.
    pub fn title(&self) -> String {
        let f = self.inner.read().unwrap();
        match &f.title {
            Some(t) if !t.is_empty() => t.clone(),
            _ => f.branch_name.clone(),
        }
    }

    pub fn set_title(&self, title: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.title = Some(title.into());
        f.last_activity_at = now;
    }

    pub fn container_id(&self) -> Option<String> {
        self.inner.read().unwrap().container_id.clone()
    }

    pub fn set_container_id(&self, container_id: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.container_id = Some(container_id.into());
        f.last_activity_at = now;
    }

    pub fn worktree_path(&self) -> Option<String> {
        self.inner.read().unwrap().worktree_path.clone()
    }

    pub fn set_worktree_path(&self, path: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.worktree_path = Some(path.into());
        f.last_activity_at = now;
    }

    pub fn agent_session_id(&self) -> Option<String> {
        self.inner.read().unwrap().agent_session_id.clone()
    }

    pub fn set_agent_session_id(&self, id: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.agent_session_id = Some(id.into());
        f.last_activity_at = now;
    }

    pub fn state(&self) -> Lifecycle {
        self.inner.read().unwrap().state
    }

    /// Transition to a new lifecycle state, clearing any prior error message.
    pub fn set_state(&self, state: Lifecycle, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.state = state;
        f.error_message = None;
        f.last_activity_at = now;
    }

    pub fn error_message(&self) -> Option<String> {
        self.inner.read().unwrap().error_message.clone()
    }

    /// Transition to `Lifecycle::Error`. A `None` message still performs the
    /// transition with an empty message rather than being a no-op — callers
    /// that want "no-op if already fine" must check state themselves first.
    pub fn set_error(&self, message: Option<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.state = Lifecycle::Error;
        f.error_message = message;
        f.last_activity_at = now;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.inner.read().unwrap().created_at
    }

    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.inner.read().unwrap().last_activity_at
    }

    pub fn pr(&self) -> Option<(u64, String)> {
        let f = self.inner.read().unwrap();
        match (f.pr_number, &f.pr_url) {
            (Some(n), Some(u)) if n > 0 => Some((n, u.clone())),
            _ => None,
        }
    }

    pub fn set_pr(&self, number: u64, url: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.pr_number = Some(number);
        f.pr_url = Some(url.into());
        f.last_activity_at = now;
    }

    pub fn has_been_pushed(&self) -> bool {
        self.inner.read().unwrap().has_been_pushed
    }

    pub fn mark_pushed(&self, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.has_been_pushed = true;
        f.last_activity_at = now;
    }

    pub fn was_interrupted(&self) -> bool {
        self.inner.read().unwrap().was_interrupted
    }

    pub fn set_synopsis(&self, synopsis: impl Into<String>, now: DateTime<Utc>) {
        let mut f = self.inner.write().unwrap();
        f.synopsis = Some(synopsis.into());
        f.last_activity_at = now;
    }

    pub fn synopsis(&self) -> Option<String> {
        self.inner.read().unwrap().synopsis.clone()
    }

    /// Read-only snapshot of everything the git-proxy connection handler needs.
    pub fn snapshot(&self) -> WorkstreamSnapshot {
        let f = self.inner.read().unwrap();
        WorkstreamSnapshot {
            id: self.id.clone(),
            branch_name: f.branch_name.clone(),
            worktree_path: f.worktree_path.clone(),
            pr_number: f.pr_number.unwrap_or(0),
        }
    }
}

/// A cheap, owned copy of the fields a git-proxy request needs to validate
/// and execute against, taken under the entity's guard and then released —
/// the connection handler never holds the entity lock during subprocess I/O.
#[derive(Debug, Clone)]
pub struct WorkstreamSnapshot {
    pub id: String,
    pub branch_name: String,
    pub worktree_path: Option<String>,
    pub pr_number: u64,
}

/// Bounded in-memory registry of workstreams, keyed by id.
pub struct Manager {
    max_workstreams: usize,
    entries: RwLock<HashMap<String, std::sync::Arc<Workstream>>>,
}

impl Manager {
    pub fn new(max_workstreams: usize) -> Self {
        Self {
            max_workstreams,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn can_add(&self) -> bool {
        self.entries.read().unwrap().len() < self.max_workstreams
    }

    pub fn add(&self, workstream: std::sync::Arc<Workstream>) -> Result<(), WorkstreamError> {
        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.max_workstreams {
            return Err(WorkstreamError::MaxReached {
                max: self.max_workstreams,
            });
        }
        entries.insert(workstream.id.clone(), workstream);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<std::sync::Arc<Workstream>> {
        self.entries.write().unwrap().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<std::sync::Arc<Workstream>> {
        self.entries.read().unwrap().get(id).cloned()
    }

    pub fn get_by_branch(&self, branch: &str) -> Option<std::sync::Arc<Workstream>> {
        self.entries
            .read()
            .unwrap()
            .values()
            .find(|w| w.branch_name() == branch)
            .cloned()
    }

    pub fn list(&self) -> Vec<std::sync::Arc<Workstream>> {
        self.entries.read().unwrap().values().cloned().collect()
    }

    pub fn active(&self) -> Vec<std::sync::Arc<Workstream>> {
        self.entries
            .read()
            .unwrap()
            .values()
            .filter(|w| w.state().is_active())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// The single workstream currently in `Lifecycle::Pairing`, if any.
    /// Enforcing "at most one" is the pairing orchestrator's job, not the
    /// manager's — this just reports what it observes.
    pub fn get_pairing(&self) -> Option<std::sync::Arc<Workstream>> {
        self.entries
            .read()
            .unwrap()
            .values()
            .find(|w| w.state() == Lifecycle::Pairing)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ws(id: &str) -> Arc<Workstream> {
        Arc::new(Workstream::new(id, "do the thing", "do-the-thing", Utc::now()))
    }

    #[test]
    fn title_falls_back_to_branch_name() {
        let w = ws("1");
        assert_eq!(w.title(), "do-the-thing");
        w.set_title("My Title", Utc::now());
        assert_eq!(w.title(), "My Title");
    }

    #[test]
    fn set_state_clears_error_message() {
        let w = ws("1");
        w.set_error(Some("boom".to_string()), Utc::now());
        assert_eq!(w.error_message(), Some("boom".to_string()));
        w.set_state(Lifecycle::Running, Utc::now());
        assert_eq!(w.error_message(), None);
        assert_eq!(w.state(), Lifecycle::Running);
    }

    #[test]
    fn set_error_none_still_transitions_to_error_state() {
        let w = ws("1");
        w.set_state(Lifecycle::Running, Utc::now());
        w.set_error(None, Utc::now());
        assert_eq!(w.state(), Lifecycle::Error);
        assert_eq!(w.error_message(), None);
    }

    #[test]
    fn pr_requires_both_number_and_url() {
        let w = ws("1");
        assert_eq!(w.pr(), None);
        w.set_pr(42, "https://github.com/o/r/pull/42", Utc::now());
        assert_eq!(w.pr(), Some((42, "https://github.com/o/r/pull/42".to_string())));
    }

    #[test]
    fn every_setter_bumps_last_activity() {
        let w = ws("1");
        let t0 = w.last_activity_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        w.set_container_id("c1", Utc::now());
        assert!(w.last_activity_at() > t0);
    }

    #[test]
    fn manager_rejects_beyond_cap() {
        let mgr = Manager::new(2);
        assert!(mgr.add(ws("1")).is_ok());
        assert!(mgr.add(ws("2")).is_ok());
        let err = mgr.add(ws("3")).unwrap_err();
        assert!(matches!(err, WorkstreamError::MaxReached { max: 2 }));
        assert_eq!(mgr.count(), 2);
    }

    #[test]
    fn manager_lookup_by_branch() {
        let mgr = Manager::new(5);
        let w = ws("1");
        mgr.add(w.clone()).unwrap();
        assert!(mgr.get_by_branch("do-the-thing").is_some());
        assert!(mgr.get_by_branch("nope").is_none());
    }

    #[test]
    fn manager_active_filters_terminal_states() {
        let mgr = Manager::new(5);
        let running = ws("1");
        running.set_state(Lifecycle::Running, Utc::now());
        let stopped = ws("2");
        stopped.set_state(Lifecycle::Stopped, Utc::now());
        mgr.add(running).unwrap();
        mgr.add(stopped).unwrap();
        assert_eq!(mgr.active().len(), 1);
    }

    #[test]
    fn manager_get_pairing_returns_at_most_one() {
        let mgr = Manager::new(5);
        let pairing = ws("1");
        pairing.set_state(Lifecycle::Pairing, Utc::now());
        mgr.add(pairing).unwrap();
        mgr.add(ws("2")).unwrap();
        let found = mgr.get_pairing().unwrap();
        assert_eq!(found.id, "1");
    }
}
