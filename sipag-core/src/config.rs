//! Host configuration for the workstream manager and git-proxy.
//!
//! Resolution order: **env var > `<sipag_dir>/config` file > hardcoded default**.
//!
//! ```text
//! Field                  Env Var                      Config Key        Default
//! ──────────────────────  ──────────────────────────── ─────────────────  ───────
//! max_workstreams         SIPAG_MAX_WORKSTREAMS        max_workstreams    12
//! executor_timeout        SIPAG_EXECUTOR_TIMEOUT       executor_timeout   120s
//! handler_timeout         SIPAG_HANDLER_TIMEOUT        handler_timeout    120s
//! recovery_timeout        SIPAG_RECOVERY_TIMEOUT       recovery_timeout   5s
//! auto_save_interval_ms   SIPAG_AUTOSAVE_MS            auto_save_interval 200
//! socket_base_dir         SIPAG_SOCKET_DIR             socket_base_dir    <sipag_dir>/sockets
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

pub const DEFAULT_MAX_WORKSTREAMS: usize = 12;

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub sipag_dir: PathBuf,
    pub max_workstreams: usize,
    pub executor_timeout: Duration,
    pub handler_timeout: Duration,
    pub recovery_timeout: Duration,
    pub auto_save_interval: Duration,
    pub socket_base_dir: PathBuf,
}

impl HostConfig {
    pub fn load(sipag_dir: &Path) -> anyhow::Result<Self> {
        Self::load_with_env(sipag_dir, |k| env::var(k).ok())
    }

    fn load_with_env(sipag_dir: &Path, get_env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut cfg = Self::defaults(sipag_dir);

        let config_file = sipag_dir.join("config");
        if config_file.exists() {
            let contents = fs::read_to_string(&config_file)?;
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    cfg.apply_entry(key.trim(), value.trim());
                }
            }
        }

        for (env_key, cfg_key) in [
            ("SIPAG_MAX_WORKSTREAMS", "max_workstreams"),
            ("SIPAG_EXECUTOR_TIMEOUT", "executor_timeout"),
            ("SIPAG_HANDLER_TIMEOUT", "handler_timeout"),
            ("SIPAG_RECOVERY_TIMEOUT", "recovery_timeout"),
            ("SIPAG_AUTOSAVE_MS", "auto_save_interval"),
        ] {
            if let Some(value) = get_env(env_key) {
                cfg.apply_entry(cfg_key, &value);
            }
        }
        if let Some(dir) = get_env("SIPAG_SOCKET_DIR") {
            cfg.socket_base_dir = PathBuf::from(dir);
        }

        Ok(cfg)
    }

    pub fn defaults(sipag_dir: &Path) -> Self {
        Self {
            sipag_dir: sipag_dir.to_path_buf(),
            max_workstreams: DEFAULT_MAX_WORKSTREAMS,
            executor_timeout: Duration::from_secs(120),
            handler_timeout: Duration::from_secs(120),
            recovery_timeout: Duration::from_secs(5),
            auto_save_interval: Duration::from_millis(200),
            socket_base_dir: sipag_dir.join("sockets"),
        }
    }

    fn apply_entry(&mut self, key: &str, value: &str) {
        match key {
            "max_workstreams" => {
                if let Ok(n) = value.parse() {
                    self.max_workstreams = n;
                }
            }
            "executor_timeout" => {
                if let Ok(n) = value.parse() {
                    self.executor_timeout = Duration::from_secs(n);
                }
            }
            "handler_timeout" => {
                if let Ok(n) = value.parse() {
                    self.handler_timeout = Duration::from_secs(n);
                }
            }
            "recovery_timeout" => {
                if let Ok(n) = value.parse() {
                    self.recovery_timeout = Duration::from_secs(n);
                }
            }
            "auto_save_interval" => {
                if let Ok(n) = value.parse() {
                    self.auto_save_interval = Duration::from_millis(n);
                }
            }
            "socket_base_dir" => self.socket_base_dir = PathBuf::from(value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = HostConfig::defaults(Path::new("/tmp/sipag"));
        assert_eq!(cfg.max_workstreams, 12);
        assert_eq!(cfg.executor_timeout, Duration::from_secs(120));
        assert_eq!(cfg.recovery_timeout, Duration::from_secs(5));
        assert_eq!(cfg.auto_save_interval, Duration::from_millis(200));
    }

    #[test]
    fn env_overrides_default() {
        let cfg = HostConfig::load_with_env(Path::new("/tmp/sipag"), |k| {
            if k == "SIPAG_MAX_WORKSTREAMS" {
                Some("3".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(cfg.max_workstreams, 3);
    }

    #[test]
    fn config_file_overrides_default_but_not_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config"), "max_workstreams=5\n").unwrap();
        let cfg = HostConfig::load_with_env(dir.path(), |k| {
            if k == "SIPAG_MAX_WORKSTREAMS" {
                Some("9".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(cfg.max_workstreams, 9);

        let cfg_no_env = HostConfig::load_with_env(dir.path(), |_| None).unwrap();
        assert_eq!(cfg_no_env.max_workstreams, 5);
    }
}
