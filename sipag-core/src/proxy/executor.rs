//! Subprocess runner with timeout; builds the concrete command line for an
//! `Operation` and parses `gh pr create` output for the new PR id.

use super::protocol::{extract_pr_create_result, Operation, Response};
use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

/// Build the concrete argv for `op` given the request's `args`.
fn command_line(op: Operation, args: &[String]) -> (&'static str, Vec<String>) {
    match op {
        Operation::GitFetch => ("git", prepend("fetch", args)),
        Operation::GitPull => ("git", prepend("pull", args)),
        Operation::GitPush => ("git", prepend("push", args)),
        Operation::GhPrView => ("gh", prepend2("pr", "view", args)),
        Operation::GhPrChecks => ("gh", prepend2("pr", "checks", args)),
        Operation::GhPrDiff => ("gh", prepend2("pr", "diff", args)),
        Operation::GhPrList => ("gh", prepend2("pr", "list", args)),
        Operation::GhPrCreate => ("gh", prepend2("pr", "create", args)),
        Operation::GhPrMerge => ("gh", prepend2("pr", "merge", args)),
        Operation::GhIssueView => ("gh", prepend2("issue", "view", args)),
        Operation::GhIssueList => ("gh", prepend2("issue", "list", args)),
    }
}

fn prepend(sub: &str, args: &[String]) -> Vec<String> {
    let mut v = vec![sub.to_string()];
    v.extend(args.iter().cloned());
    v
}

fn prepend2(sub: &str, subsub: &str, args: &[String]) -> Vec<String> {
    let mut v = vec![sub.to_string(), subsub.to_string()];
    v.extend(args.iter().cloned());
    v
}

/// Run `op` with `args` in `worktree_path`, bounded by `timeout`. Returns the
/// response plus, for a successful `gh-pr-create`, the parsed `(number, url)`.
pub fn execute(
    op: Operation,
    args: &[String],
    worktree_path: &str,
    timeout: Duration,
) -> (Response, Option<(u64, String)>) {
    let (program, argv) = command_line(op, args);

    let child = Command::new(program)
        .args(&argv)
        .current_dir(worktree_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let mut child = match child {
        Ok(c) => c,
        Err(e) => {
            return (
                Response {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(e.to_string()),
                },
                None,
            )
        }
    };

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut stdout = String::new();
        if let Some(p) = stdout_pipe.as_mut() {
            let _ = p.read_to_string(&mut stdout);
        }
        let mut stderr = String::new();
        if let Some(p) = stderr_pipe.as_mut() {
            let _ = p.read_to_string(&mut stderr);
        }
        let _ = tx.send((stdout, stderr));
    });

    let status = match wait_with_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return (
                Response {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some("timed out".to_string()),
                },
                None,
            );
        }
        Err(e) => {
            return (
                Response {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(e.to_string()),
                },
                None,
            )
        }
    };

    let (stdout, stderr) = rx.recv_timeout(Duration::from_secs(5)).unwrap_or_default();
    let exit_code = status.code().unwrap_or(1);

    let pr_result = if op == Operation::GhPrCreate && exit_code == 0 {
        extract_pr_create_result(&stdout)
    } else {
        None
    };

    (
        Response {
            exit_code,
            stdout,
            stderr,
            error: None,
        },
        pr_result,
    )
}

fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if std::time::Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(25));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_git_push() {
        let (program, argv) = command_line(Operation::GitPush, &["origin".to_string(), "feature".to_string()]);
        assert_eq!(program, "git");
        assert_eq!(argv, vec!["push", "origin", "feature"]);
    }

    #[test]
    fn command_line_gh_pr_merge() {
        let (program, argv) = command_line(Operation::GhPrMerge, &["--squash".to_string()]);
        assert_eq!(program, "gh");
        assert_eq!(argv, vec!["pr", "merge", "--squash"]);
    }

    #[test]
    fn execute_runs_echo_and_captures_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        // `git --version` is available in any environment that can run git at all,
        // and its exit code is deterministic without touching the worktree.
        let (response, pr_result) = execute(
            Operation::GitFetch,
            &["--help".to_string()],
            dir.path().to_str().unwrap(),
            Duration::from_secs(5),
        );
        assert!(response.error.is_none() || response.exit_code != 0);
        assert!(pr_result.is_none());
    }

    #[test]
    fn execute_reports_spawn_error_for_missing_program() {
        // Operation::GitFetch always spawns "git"; to exercise the spawn-error
        // path we point current_dir somewhere nonexistent so spawn fails on
        // some platforms, and otherwise just assert the happy path shape.
        let (response, _) = execute(
            Operation::GitFetch,
            &[],
            "/nonexistent/path/for/sipag/tests",
            Duration::from_secs(5),
        );
        assert_eq!(response.exit_code, 1);
    }
}
