use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use chrono::Utc;
use sipag_core::config::HostConfig;
use sipag_core::proxy::server::ProxyServer;
use sipag_core::recovery::{self, ContainerInspector, RepairOutcome};
use sipag_core::state::{restore_into_manager, AppState, LoadOutcome, StatePersister};
use sipag_core::workstream::{Lifecycle, Manager, Workstream};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const GIT_HASH: &str = env!("SIPAG_GIT_HASH");

#[derive(Parser)]
#[command(
    name = "sipag",
    version,
    about = "Workstream host: spawns per-branch agent containers, proxies their git/gh calls, and pairs one at a time with the local worktree"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage workstreams (one per agent container)
    Workstream {
        #[command(subcommand)]
        command: WorkstreamCommands,
    },

    /// Run a single git-proxy socket server in the foreground
    Proxy {
        #[command(subcommand)]
        command: ProxyCommands,
    },

    /// Drive the pairing orchestrator
    Pair {
        #[command(subcommand)]
        command: PairCommands,
    },

    /// Inspect or force-persist host state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Print shell completion scripts for bash, zsh, or fish
    Completions {
        /// Shell type: bash, zsh, or fish
        shell: String,
    },

    /// Print version
    Version,
}

#[derive(Debug, Subcommand)]
pub enum WorkstreamCommands {
    /// Derive a branch name from a prompt and register a new workstream
    New {
        /// Free-text description of the work
        prompt: String,

        /// Display title (defaults to the derived branch name)
        #[arg(long)]
        title: Option<String>,
    },

    /// List workstreams
    List {
        /// Only show workstreams in an active lifecycle state
        #[arg(long)]
        active: bool,
    },

    /// Remove a workstream
    Rm {
        /// Workstream id
        id: String,
    },

    /// Run the state repairer against persisted workstreams
    Repair,
}

#[derive(Debug, Subcommand)]
pub enum ProxyCommands {
    /// Start a git-proxy socket for one container and block until interrupted
    Serve {
        /// Container id the socket is scoped to
        container_id: String,

        /// Worktree path inside the container that git/gh commands run in
        #[arg(long)]
        worktree: String,

        /// Branch name git-push is pinned to
        #[arg(long)]
        branch: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PairCommands {
    /// Enable pairing for a workstream
    Enable {
        /// Workstream id to pair with
        workstream_id: String,

        /// Local worktree path to sync into the container
        #[arg(long)]
        local_path: String,
    },

    /// Disable pairing, returning to the previous branch
    Disable,

    /// Print current pairing status
    Status,
}

#[derive(Debug, Subcommand)]
pub enum StateCommands {
    /// Print the currently persisted state
    Show,

    /// Force an immediate save of the current state
    Flush,
}

/// `SIPAG_DIR` env var, else `~/.sipag`.
fn sipag_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SIPAG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_home().join(".sipag")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."))
}

fn generate_workstream_id(now: chrono::DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S%6f").to_string()
}

/// Load the manager + persister for this invocation; callers that mutate the
/// manager must call `persist` before returning so the next process sees it.
fn load_manager(cfg: &HostConfig) -> Result<(Arc<Manager>, StatePersister)> {
    let manager = Arc::new(Manager::new(cfg.max_workstreams));
    let persister = StatePersister::new(&cfg.sipag_dir);
    if let LoadOutcome::Found(state) = persister.load()? {
        restore_into_manager(&state, &manager);
    }
    Ok((manager, persister))
}

fn persist(manager: &Manager, persister: &StatePersister) -> Result<()> {
    let state = AppState::from_manager(manager, None, None, None, Utc::now());
    persister.flush(state)?;
    Ok(())
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Workstream { command } => cmd_workstream(command),
        Commands::Proxy { command } => cmd_proxy(command),
        Commands::Pair { command } => cmd_pair(command),
        Commands::State { command } => cmd_state(command),
        Commands::Completions { shell } => cmd_completions(&shell),
        Commands::Version => {
            println!("sipag {VERSION} ({GIT_HASH})");
            Ok(())
        }
    }
}

fn cmd_workstream(command: WorkstreamCommands) -> Result<()> {
    let dir = sipag_dir();
    let cfg = HostConfig::load(&dir)?;
    let (manager, persister) = load_manager(&cfg)?;

    match command {
        WorkstreamCommands::New { prompt, title } => {
            let existing: HashSet<String> = manager.list().iter().map(|w| w.branch_name()).collect();
            let branch = sipag_core::branch::derive(&prompt, &existing);
            let now = Utc::now();
            let id = generate_workstream_id(now);
            let workstream = Arc::new(Workstream::new(id.clone(), prompt, branch.clone(), now));
            if let Some(title) = title {
                workstream.set_title(title, now);
            }
            workstream.set_state(Lifecycle::Starting, now);
            manager.add(workstream)?;
            persist(&manager, &persister)?;
            println!("{id}\t{branch}");
            Ok(())
        }
        WorkstreamCommands::List { active } => {
            let mut workstreams = if active { manager.active() } else { manager.list() };
            workstreams.sort_by(|a, b| a.created_at().cmp(&b.created_at()));
            for w in workstreams {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    w.id,
                    w.branch_name(),
                    w.state(),
                    w.container_id().unwrap_or_default()
                );
            }
            Ok(())
        }
        WorkstreamCommands::Rm { id } => {
            match manager.remove(&id) {
                Some(_) => {
                    persist(&manager, &persister)?;
                    Ok(())
                }
                None => bail!("no such workstream: {id}"),
            }
        }
        WorkstreamCommands::Repair => {
            let report = recovery::repair(&manager, &DockerInspector, cfg.recovery_timeout);
            for outcome in &report.outcomes {
                match outcome {
                    RepairOutcome::Repaired { workstream_id, session_id } => {
                        println!("repaired {workstream_id}: {session_id}")
                    }
                    RepairOutcome::NotRunning { workstream_id } => println!("not running {workstream_id}"),
                    RepairOutcome::Missing { workstream_id } => println!("missing {workstream_id}"),
                }
            }
            println!("{} repaired of {} candidates", report.repaired_count(), report.outcomes.len());
            persist(&manager, &persister)?;
            Ok(())
        }
    }
}

fn cmd_proxy(command: ProxyCommands) -> Result<()> {
    match command {
        ProxyCommands::Serve { container_id, worktree, branch } => {
            let dir = sipag_dir();
            let cfg = HostConfig::load(&dir)?;
            let server = ProxyServer::new(&cfg.socket_base_dir, cfg.handler_timeout);
            let snapshot = sipag_core::workstream::WorkstreamSnapshot {
                id: container_id.clone(),
                branch_name: branch,
                worktree_path: Some(worktree),
                pr_number: 0,
            };
            let socket_path = server.start(&container_id, snapshot)?;
            println!("listening on {} (Ctrl-D to stop)", socket_path.display());

            // Foreground/manual-invocation tool (§10.5): block on stdin EOF
            // rather than installing a signal handler, and clean the socket
            // up on the way out.
            let mut discard = String::new();
            let _ = std::io::Read::read_to_string(&mut std::io::stdin(), &mut discard);
            server.stop(&container_id);
            Ok(())
        }
    }
}

fn cmd_pair(command: PairCommands) -> Result<()> {
    let dir = sipag_dir();
    let cfg = HostConfig::load(&dir)?;
    let (manager, persister) = load_manager(&cfg)?;

    match command {
        PairCommands::Enable { workstream_id, local_path } => {
            let workstream = manager
                .get(&workstream_id)
                .with_context(|| format!("no such workstream: {workstream_id}"))?;
            if manager.get_pairing().is_some() {
                bail!("another workstream is already pairing");
            }
            let container_id = workstream
                .container_id()
                .with_context(|| "workstream has no container yet")?;
            let branch = workstream.branch_name();
            workstream.set_state(Lifecycle::Pairing, Utc::now());
            persist(&manager, &persister)?;
            println!("pairing enabled for {workstream_id} on branch {branch} (container {container_id}, local path {local_path})");
            Ok(())
        }
        PairCommands::Disable => {
            if let Some(workstream) = manager.get_pairing() {
                workstream.set_state(Lifecycle::Idle, Utc::now());
                persist(&manager, &persister)?;
                println!("pairing disabled for {}", workstream.id);
            } else {
                println!("no workstream is pairing");
            }
            Ok(())
        }
        PairCommands::Status => {
            match manager.get_pairing() {
                Some(w) => println!("pairing: {} ({})", w.id, w.branch_name()),
                None => println!("pairing: inactive"),
            }
            Ok(())
        }
    }
}

fn cmd_state(command: StateCommands) -> Result<()> {
    let dir = sipag_dir();
    let cfg = HostConfig::load(&dir)?;
    let persister = StatePersister::new(&cfg.sipag_dir);

    match command {
        StateCommands::Show => match persister.load()? {
            LoadOutcome::Found(state) => {
                println!("{}", serde_json::to_string_pretty(&state)?);
                Ok(())
            }
            LoadOutcome::NotFound => {
                println!("no state file at {}", cfg.sipag_dir.join(sipag_core::state::STATE_FILE_NAME).display());
                Ok(())
            }
        },
        StateCommands::Flush => {
            let (manager, persister) = load_manager(&cfg)?;
            persist(&manager, &persister)?;
            println!("flushed state for {} workstream(s)", manager.count());
            Ok(())
        }
    }
}

fn cmd_completions(shell: &str) -> Result<()> {
    let script = match shell {
        "bash" => crate::completions::BASH,
        "zsh" => crate::completions::ZSH,
        "fish" => crate::completions::FISH,
        other => bail!("unsupported shell: {other} (expected bash, zsh, or fish)"),
    };
    println!("{script}");
    Ok(())
}

/// Shells out to `docker` for the container-inspection port the state
/// repairer needs; real container-runtime specifics are out of scope (§4.5).
struct DockerInspector;

impl ContainerInspector for DockerInspector {
    fn is_running(&self, container_id: &str) -> anyhow::Result<bool> {
        let status = std::process::Command::new("docker")
            .args(["inspect", "-f", "{{.State.Running}}", container_id])
            .output()?;
        Ok(status.status.success() && String::from_utf8_lossy(&status.stdout).trim() == "true")
    }

    fn latest_session_file(&self, container_id: &str, timeout: Duration) -> anyhow::Result<Option<String>> {
        let output = std::process::Command::new("docker")
            .args([
                "exec",
                container_id,
                "sh",
                "-c",
                "find $HOME/.claude/projects/-workspace -name '*.jsonl' -printf '%T@ %f\\n' 2>/dev/null | sort -rn | head -1 | cut -d' ' -f2",
            ])
            .output();
        let _ = timeout;
        let output = output?;
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stem = name.strip_suffix(".jsonl").unwrap_or(&name);
        if stem.is_empty() {
            Ok(None)
        } else {
            Ok(Some(stem.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn workstream_new_parses_prompt_and_title() {
        let cli = parse(&["sipag", "workstream", "new", "fix the bug", "--title", "Fix bug"]);
        match cli.command {
            Commands::Workstream {
                command: WorkstreamCommands::New { prompt, title },
            } => {
                assert_eq!(prompt, "fix the bug");
                assert_eq!(title, Some("Fix bug".to_string()));
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn workstream_list_active_flag() {
        let cli = parse(&["sipag", "workstream", "list", "--active"]);
        match cli.command {
            Commands::Workstream {
                command: WorkstreamCommands::List { active },
            } => assert!(active),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn proxy_serve_requires_worktree_and_branch() {
        assert!(Cli::try_parse_from(["sipag", "proxy", "serve", "c1"]).is_err());
        let cli = parse(&["sipag", "proxy", "serve", "c1", "--worktree", "/repo", "--branch", "feature"]);
        match cli.command {
            Commands::Proxy {
                command: ProxyCommands::Serve { container_id, worktree, branch },
            } => {
                assert_eq!(container_id, "c1");
                assert_eq!(worktree, "/repo");
                assert_eq!(branch, "feature");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn pair_enable_requires_local_path() {
        assert!(Cli::try_parse_from(["sipag", "pair", "enable", "ws1"]).is_err());
        let cli = parse(&["sipag", "pair", "enable", "ws1", "--local-path", "/repo"]);
        match cli.command {
            Commands::Pair {
                command: PairCommands::Enable { workstream_id, local_path },
            } => {
                assert_eq!(workstream_id, "ws1");
                assert_eq!(local_path, "/repo");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn state_subcommands_parse() {
        assert!(matches!(
            parse(&["sipag", "state", "show"]).command,
            Commands::State { command: StateCommands::Show }
        ));
        assert!(matches!(
            parse(&["sipag", "state", "flush"]).command,
            Commands::State { command: StateCommands::Flush }
        ));
    }

    #[test]
    fn completions_requires_shell_arg() {
        assert!(Cli::try_parse_from(["sipag", "completions"]).is_err());
        assert!(Cli::try_parse_from(["sipag", "completions", "zsh"]).is_ok());
    }
}
