use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Server configuration, read from the environment once at startup. Bad
/// values are fatal: the binary exits nonzero rather than serving with a
/// half-configured sandbox.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sandbox root. No tool reads or writes outside it.
    pub sandbox_root: PathBuf,
    /// Where CKG databases live (`<storage>/ckg/…`).
    pub storage_dir: PathBuf,
    /// CKG databases untouched this long are deleted at startup.
    pub ckg_retention: Duration,
    /// Per-command wall clock for the shell engine.
    pub shell_timeout: Duration,
    /// Byte cap for shell output and rendered file views.
    pub max_output_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let sandbox_root = match std::env::var("WORKBENCH_ROOT") {
            Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
            _ => std::env::current_dir().context("failed to determine current directory")?,
        };
        let sandbox_root = sandbox_root
            .canonicalize()
            .with_context(|| format!("invalid sandbox root {}", sandbox_root.display()))?;
        if !sandbox_root.is_dir() {
            anyhow::bail!("sandbox root {} is not a directory", sandbox_root.display());
        }

        let storage_dir = match std::env::var("WORKBENCH_STORAGE") {
            Ok(raw) if !raw.trim().is_empty() => PathBuf::from(raw.trim()),
            _ => default_storage_dir(),
        };
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("cannot create storage dir {}", storage_dir.display()))?;

        let retention_days = env_number("WORKBENCH_CKG_RETENTION_DAYS", 7)?;
        let timeout_secs = env_number("WORKBENCH_SHELL_TIMEOUT_SECS", 120)?;
        let max_output_bytes = env_number("WORKBENCH_MAX_OUTPUT_BYTES", 30_000)? as usize;

        Ok(Self {
            sandbox_root,
            storage_dir,
            ckg_retention: Duration::from_secs(retention_days * 24 * 60 * 60),
            shell_timeout: Duration::from_secs(timeout_secs),
            max_output_bytes,
        })
    }
}

fn default_storage_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".workbench"))
        .unwrap_or_else(|| std::env::temp_dir().join("workbench"))
}

fn env_number(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a non-negative integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
