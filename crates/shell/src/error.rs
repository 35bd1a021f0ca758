use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShellError>;

#[derive(Error, Debug)]
pub enum ShellError {
    /// The command exceeded its wall-clock budget. Whatever output was
    /// collected before the kill rides along for the caller to surface.
    #[error("command timed out after {timeout_secs}s")]
    CommandTimeout {
        timeout_secs: u64,
        stdout: String,
        stderr: String,
    },

    #[error("shell session is broken: {0}")]
    Broken(String),

    #[error("failed to spawn shell: {0}")]
    Spawn(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
