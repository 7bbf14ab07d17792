//! Per-operation argument-safety rules and workstream-invariant enforcement.
//!
//! Every validator returns `Err(message)` for a rejected request and never
//! touches the filesystem or spawns a process — a request that fails
//! validation never reaches the executor.

use super::protocol::{extract_pr_number, extract_push_branch, Operation};
use crate::workstream::WorkstreamSnapshot;

/// `gh` flags the proxy permits, enumerated as a closed set. Anything else
/// starting with `-` is rejected.
const GH_FLAG_WHITELIST: &[&str] = &[
    "--repo", "-R", "--json", "--jq", "--template", "--title", "-t", "--body", "-b",
    "--body-file", "-F", "--head", "-H", "--base", "-B", "--assignee", "-a", "--label", "-l",
    "--milestone", "-m", "--project", "-p", "--reviewer", "-r", "--draft", "-d", "--fill", "-f",
    "--web", "-w", "--merge", "--squash", "--rebase", "--delete-branch", "--auto", "--admin",
    "--comments", "-c", "--state", "-s", "--limit", "-L", "--author", "-A", "--search", "-S",
    "--color",
];

/// `git` flags that are always rejected, regardless of operation.
const GIT_FLAG_BLACKLIST: &[&str] = &["--upload-pack", "--receive-pack", "--exec", "-u"];

fn flag_name(flag: &str) -> &str {
    flag.split('=').next().unwrap_or(flag)
}

fn is_force_push_flag(flag: &str) -> bool {
    let name = flag_name(flag);
    name == "--force" || name == "-f" || name.starts_with("--force-with-lease")
}

fn reject_git_blacklist(args: &[String]) -> Result<(), String> {
    for arg in args {
        if !arg.starts_with('-') {
            continue;
        }
        let name = flag_name(arg);
        if GIT_FLAG_BLACKLIST.contains(&name) {
            return Err(format!("flag not allowed: {arg}"));
        }
    }
    Ok(())
}

fn reject_gh_non_whitelisted(args: &[String]) -> Result<(), String> {
    for arg in args {
        if !arg.starts_with('-') {
            continue;
        }
        let name = flag_name(arg);
        if !GH_FLAG_WHITELIST.contains(&name) {
            return Err(format!("flag not allowed: {arg}"));
        }
    }
    Ok(())
}

/// Validate `args` for `op` against `workstream`. `Ok(())` means the request
/// may proceed to the executor.
pub fn validate(op: Operation, args: &[String], workstream: &WorkstreamSnapshot) -> Result<(), String> {
    match op {
        Operation::GitFetch
        | Operation::GitPull
        | Operation::GhPrView
        | Operation::GhPrChecks
        | Operation::GhPrDiff
        | Operation::GhPrList
        | Operation::GhIssueView
        | Operation::GhIssueList => {
            if op == Operation::GitFetch || op == Operation::GitPull {
                reject_git_blacklist(args)?;
            } else {
                reject_gh_non_whitelisted(args)?;
            }
            Ok(())
        }
        Operation::GhPrCreate => reject_gh_non_whitelisted(args),
        Operation::GitPush => {
            reject_git_blacklist(args)?;
            for arg in args {
                if is_force_push_flag(arg) {
                    return Err("force push not allowed".to_string());
                }
            }
            match extract_push_branch(args) {
                Some(branch) if branch != workstream.branch_name => Err(format!(
                    "can only push to branch \"{}\"",
                    workstream.branch_name
                )),
                _ => Ok(()),
            }
        }
        Operation::GhPrMerge => {
            reject_gh_non_whitelisted(args)?;
            if workstream.pr_number == 0 {
                return Err("no PR associated".to_string());
            }
            let requested = extract_pr_number(args);
            if requested != 0 && requested != workstream.pr_number {
                return Err(format!(
                    "can only merge PR #{}",
                    workstream.pr_number
                ));
            }
            Ok(())
        }
    }
}
