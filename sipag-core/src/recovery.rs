//! Post-restart state repair and agent-session-id discovery.
//!
//! After a host restart, workstreams reload from disk with whatever
//! `agent_session_id` they were last persisted with — which is empty for any
//! workstream that acquired a session after its last save. `repair` re-derives
//! missing ids by inspecting the still-running container.

use crate::log::log_warn;
use crate::workstream::Manager;
use chrono::Utc;
use std::time::Duration;

/// Port for asking the container runtime to run a command inside a container
/// and to check whether it's still running. The container runtime itself is
/// out of scope; only this interface is.
pub trait ContainerInspector {
    fn is_running(&self, container_id: &str) -> anyhow::Result<bool>;

    /// Run `find $HOME/.claude/projects/-workspace -name '*.jsonl'` (or
    /// equivalent) inside the container and return the most-recently-modified
    /// file's basename without its `.jsonl` extension, if any exist.
    fn latest_session_file(&self, container_id: &str, timeout: Duration) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairOutcome {
    Repaired { workstream_id: String, session_id: String },
    NotRunning { workstream_id: String },
    Missing { workstream_id: String },
}

#[derive(Debug, Default)]
pub struct RepairReport {
    pub outcomes: Vec<RepairOutcome>,
}

impl RepairReport {
    pub fn repaired_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RepairOutcome::Repaired { .. }))
            .count()
    }
}

/// Validate a candidate session id against the UUID or ULID shape, stripping
/// any 8-byte binary framing header a line-oriented read may have captured.
pub fn validate_session_id(candidate: &str) -> Option<String> {
    if is_uuid(candidate) || is_ulid(candidate) {
        return Some(candidate.to_string());
    }
    if candidate.len() > 8 && candidate.is_char_boundary(8) {
        let stripped = &candidate[8..];
        if is_uuid(stripped) || is_ulid(stripped) {
            return Some(stripped.to_string());
        }
    }
    None
}

fn is_uuid(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    let lens = [8, 4, 4, 4, 12];
    parts.len() == 5
        && parts
            .iter()
            .zip(lens)
            .all(|(p, len)| p.len() == len && p.chars().all(|c| c.is_ascii_hexdigit()))
}

fn is_ulid(s: &str) -> bool {
    s.len() == 26 && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Run the repair pass (§4.5) over every workstream in `manager` whose
/// `container_id` is set but `agent_session_id` is empty.
pub fn repair(manager: &Manager, inspector: &dyn ContainerInspector, timeout: Duration) -> RepairReport {
    let mut report = RepairReport::default();
    for workstream in manager.list() {
        let Some(container_id) = workstream.container_id() else {
            continue;
        };
        if workstream.agent_session_id().is_some() {
            continue;
        }

        match inspector.is_running(&container_id) {
            Ok(true) => {}
            Ok(false) => {
                report.outcomes.push(RepairOutcome::NotRunning {
                    workstream_id: workstream.id.clone(),
                });
                continue;
            }
            Err(e) => {
                log_warn!("recovery", "container inspect failed for {container_id}: {e}");
                report.outcomes.push(RepairOutcome::Missing {
                    workstream_id: workstream.id.clone(),
                });
                continue;
            }
        }

        let candidate = match inspector.latest_session_file(&container_id, timeout) {
            Ok(c) => c,
            Err(e) => {
                log_warn!("recovery", "session lookup failed for {container_id}: {e}");
                None
            }
        };

        match candidate.as_deref().and_then(validate_session_id) {
            Some(session_id) => {
                workstream.set_agent_session_id(session_id.clone(), Utc::now());
                report.outcomes.push(RepairOutcome::Repaired {
                    workstream_id: workstream.id.clone(),
                    session_id,
                });
            }
            None => report.outcomes.push(RepairOutcome::Missing {
                workstream_id: workstream.id.clone(),
            }),
        }
    }
    report
}
