//! Adapter over the external two-way file-sync CLI.
//!
//! The sync engine itself is out of scope; this module only shells out to it
//! and parses its textual output, the way the gateway modules elsewhere in
//! this codebase shell out to `gh` and parse its output.

use sha2::{Digest, Sha256};
use std::process::{Command, Stdio};

/// Sync session status, mirroring the external engine's reported states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Disconnected,
    Connecting,
    Watching,
    Scanning,
    Syncing,
    Conflicted,
    Error,
    Unknown,
}

impl SyncStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Scanning | SyncStatus::Syncing | SyncStatus::Connecting)
    }

    pub fn is_healthy(&self) -> bool {
        !matches!(self, SyncStatus::Disconnected | SyncStatus::Conflicted | SyncStatus::Error)
    }
}

#[derive(Debug, Clone)]
pub struct SyncSessionStatus {
    pub status: SyncStatus,
    pub status_text: String,
    pub conflicts: Vec<String>,
    pub problems: Vec<String>,
}

impl SyncSessionStatus {
    fn disconnected() -> Self {
        Self {
            status: SyncStatus::Disconnected,
            status_text: "Disconnected".to_string(),
            conflicts: Vec::new(),
            problems: Vec::new(),
        }
    }
}

/// Deterministic, bounded-length session name for `branch`.
pub fn session_name(branch: &str) -> String {
    let slug: String = branch.chars().take(20).collect();
    format!("ccells-{slug}-{}", branch_digest4(branch))
}

/// First 4 bytes of SHA-256(branch), hex-encoded, as a disambiguating suffix
/// for two session names that would otherwise collide after truncation.
fn branch_digest4(branch: &str) -> String {
    let digest = Sha256::digest(branch.as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Port over the external sync CLI so the pairing orchestrator can be tested
/// without a real sync engine installed.
pub trait SyncEngine {
    fn check_installed(&self) -> anyhow::Result<bool>;
    fn create_session(&self, branch: &str, container_id: &str, local_path: &str) -> anyhow::Result<()>;
    fn terminate_session(&self, branch: &str) -> anyhow::Result<()>;
    fn session_exists(&self, branch: &str) -> anyhow::Result<bool>;
    fn get_session_status(&self, branch: &str) -> anyhow::Result<SyncSessionStatus>;
}

/// Shells out to the `synccli` binary (name chosen for this host; the real
/// binary is whatever two-way sync tool is installed).
pub struct SyncCli;

impl SyncEngine for SyncCli {
    fn check_installed(&self) -> anyhow::Result<bool> {
        Ok(Command::new("synccli")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false))
    }

    fn create_session(&self, branch: &str, container_id: &str, local_path: &str) -> anyhow::Result<()> {
        let name = session_name(branch);
        let status = Command::new("synccli")
            .args([
                "create-session",
                &name,
                "--mode",
                "two-way-resolved",
                "--ignore",
                ".git",
                "--remote",
                container_id,
                "--local",
                local_path,
            ])
            .status()?;
        if !status.success() {
            anyhow::bail!("failed to create sync session for branch {branch}");
        }
        Ok(())
    }

    fn terminate_session(&self, branch: &str) -> anyhow::Result<()> {
        let name = session_name(branch);
        let _ = Command::new("synccli").args(["terminate-session", &name]).status()?;
        Ok(())
    }

    fn session_exists(&self, branch: &str) -> anyhow::Result<bool> {
        let name = session_name(branch);
        let status = Command::new("synccli").args(["session-exists", &name]).status()?;
        Ok(status.success())
    }

    fn get_session_status(&self, branch: &str) -> anyhow::Result<SyncSessionStatus> {
        if !self.session_exists(branch)? {
            return Ok(SyncSessionStatus::disconnected());
        }
        let name = session_name(branch);
        let output = Command::new("synccli").args(["get-session-status", &name]).output()?;
        Ok(parse_status_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse `Status:`, `Conflicts:`, `Problem(s):` lines into a `SyncSessionStatus`.
fn parse_status_output(output: &str) -> SyncSessionStatus {
    let mut status_text = String::new();
    let mut conflicts = Vec::new();
    let mut problems = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Status:") {
            status_text = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Conflicts:") {
            conflicts.extend(rest.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
        } else if let Some(rest) = line.strip_prefix("Problem(s):").or_else(|| line.strip_prefix("Problems:")) {
            problems.extend(rest.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()));
        }
    }

    SyncSessionStatus {
        status: classify_status_text(&status_text),
        status_text,
        conflicts,
        problems,
    }
}

/// Case-insensitive substring mapping, ordered so more specific matches
/// (`conflict`, `error`/`problem`) take priority over the generic
/// "in progress" group.
fn classify_status_text(text: &str) -> SyncStatus {
    let lower = text.to_lowercase();
    if lower.contains("conflict") {
        SyncStatus::Conflicted
    } else if lower.contains("error") || lower.contains("problem") {
        SyncStatus::Error
    } else if lower.contains("watching") {
        SyncStatus::Watching
    } else if lower.contains("scanning") {
        SyncStatus::Scanning
    } else if lower.contains("staging") || lower.contains("reconciling") || lower.contains("transferring") || lower.contains("applying") {
        SyncStatus::Syncing
    } else if lower.contains("connecting") {
        SyncStatus::Connecting
    } else if lower.contains("disconnected") {
        SyncStatus::Disconnected
    } else {
        SyncStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_is_deterministic_and_bounded() {
        let a = session_name("my-very-long-feature-branch-name-that-keeps-going");
        let b = session_name("my-very-long-feature-branch-name-that-keeps-going");
        assert_eq!(a, b);
        assert!(a.starts_with("ccells-my-very-long-feature-"));
    }

    #[test]
    fn different_branches_produce_different_names() {
        assert_ne!(session_name("feature-a"), session_name("feature-b"));
    }

    #[test]
    fn status_text_mapping_ordered_correctly() {
        assert_eq!(classify_status_text("Watching for changes"), SyncStatus::Watching);
        assert_eq!(classify_status_text("Scanning directory"), SyncStatus::Scanning);
        assert_eq!(classify_status_text("Staging changes"), SyncStatus::Syncing);
        assert_eq!(classify_status_text("Reconciling"), SyncStatus::Syncing);
        assert_eq!(classify_status_text("Connecting to peer"), SyncStatus::Connecting);
        assert_eq!(classify_status_text("Disconnected"), SyncStatus::Disconnected);
        assert_eq!(classify_status_text("Conflict detected"), SyncStatus::Conflicted);
        assert_eq!(classify_status_text("Problem: disk full"), SyncStatus::Error);
        assert_eq!(classify_status_text(""), SyncStatus::Unknown);
    }

    #[test]
    fn parse_status_output_extracts_all_fields() {
        let output = "Status: Scanning\nConflicts: a.txt, b.txt\nProblem(s): disk full\n";
        let parsed = parse_status_output(output);
        assert_eq!(parsed.status, SyncStatus::Scanning);
        assert_eq!(parsed.conflicts, vec!["a.txt", "b.txt"]);
        assert_eq!(parsed.problems, vec!["disk full"]);
    }

    #[test]
    fn active_and_healthy_classification() {
        assert!(SyncStatus::Scanning.is_active());
        assert!(!SyncStatus::Watching.is_active());
        assert!(!SyncStatus::Disconnected.is_healthy());
        assert!(!SyncStatus::Conflicted.is_healthy());
        assert!(!SyncStatus::Error.is_healthy());
        assert!(SyncStatus::Watching.is_healthy());
    }
}
