//! Request/response schema, operation enumeration, and argument extraction.

use serde::{Deserialize, Serialize};

/// The closed set of operations the host is willing to execute on behalf of
/// a containerized agent. Any `(command, subcommand)` pair outside this set
/// — including every `git remote` form — is rejected before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    GitFetch,
    GitPull,
    GitPush,
    GhPrView,
    GhPrChecks,
    GhPrDiff,
    GhPrList,
    GhPrCreate,
    GhPrMerge,
    GhIssueView,
    GhIssueList,
}

impl Operation {
    pub fn is_mutating(&self) -> bool {
        matches!(self, Operation::GitPush | Operation::GhPrCreate | Operation::GhPrMerge)
    }

    /// Maps a `(command, subcommand[, sub-subcommand])` triple, as a
    /// containerized client would send it, to an `Operation`. `git remote`
    /// and any unrecognized subcommand are rejected (`None`).
    pub fn parse(command: &str, subcommand: &str) -> Option<Operation> {
        match (command, subcommand) {
            ("git", "fetch") => Some(Operation::GitFetch),
            ("git", "pull") => Some(Operation::GitPull),
            ("git", "push") => Some(Operation::GitPush),
            ("git", "remote") => None,
            ("gh", "pr-view") => Some(Operation::GhPrView),
            ("gh", "pr-checks") => Some(Operation::GhPrChecks),
            ("gh", "pr-diff") => Some(Operation::GhPrDiff),
            ("gh", "pr-list") => Some(Operation::GhPrList),
            ("gh", "pr-create") => Some(Operation::GhPrCreate),
            ("gh", "pr-merge") => Some(Operation::GhPrMerge),
            ("gh", "issue-view") => Some(Operation::GhIssueView),
            ("gh", "issue-list") => Some(Operation::GhIssueList),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub operation: Operation,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Flags that consume the following token as their value, so it isn't
/// mistaken for a positional argument when scanning for the push refspec.
const VALUE_FLAGS: &[&str] = &["-o", "--push-option", "--repo"];

/// Extract the positional arguments from a `git push` invocation, skipping
/// boolean flags and flag+value pairs.
fn positionals(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUE_FLAGS.contains(&arg) {
            i += 2;
            continue;
        }
        if arg.starts_with('-') {
            i += 1;
            continue;
        }
        out.push(arg);
        i += 1;
    }
    out
}

/// Extract the target branch from a `git push` invocation's args. `None`
/// means no explicit branch was given (push to whatever the remote tracks).
pub fn extract_push_branch(args: &[String]) -> Option<String> {
    let pos = positionals(args);
    let refspec = pos.get(1)?;
    match refspec.split_once(':') {
        Some((_, branch)) => Some(branch.to_string()),
        None => Some(refspec.to_string()),
    }
}

/// Extract the PR number from a `gh pr merge` invocation's args. `0` means
/// "no explicit PR; use the current branch's PR".
pub fn extract_pr_number(args: &[String]) -> u64 {
    for arg in args {
        if arg.starts_with('-') {
            continue;
        }
        if let Ok(n) = arg.parse::<u64>() {
            return n;
        }
        if let Some(n) = extract_pull_number_from_url(arg) {
            return n;
        }
    }
    0
}

fn extract_pull_number_from_url(s: &str) -> Option<u64> {
    let idx = s.find("/pull/")?;
    let rest = &s[idx + "/pull/".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

/// Scan `output` line by line for a GitHub pull-request URL and return its
/// `(number, url)`. Idempotent: repeated application to output containing
/// exactly one URL returns the same pair regardless of surrounding text.
pub fn extract_pr_create_result(output: &str) -> Option<(u64, String)> {
    for line in output.lines() {
        if let Some(idx) = line.find("https://github.com/") {
            let candidate = &line[idx..];
            let url_end = candidate
                .find(|c: char| c.is_whitespace())
                .unwrap_or(candidate.len());
            let url = &candidate[..url_end];
            if let Some(number) = extract_pull_number_from_url(url) {
                return Some((number, url.to_string()));
            }
        }
    }
    None
}
