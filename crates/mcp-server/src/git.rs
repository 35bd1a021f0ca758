use std::path::Path;

use tokio::process::Command;

/// Failure modes of the git adapter, kept separate from the engine errors
/// because git's own stderr is the message worth surfacing.
#[derive(Debug)]
pub enum GitDiffError {
    NotADirectory(String),
    NotARepository(String),
    Git(String),
    Io(std::io::Error),
}

impl std::fmt::Display for GitDiffError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitDiffError::NotADirectory(path) => write!(f, "'{path}' is not a directory"),
            GitDiffError::NotARepository(path) => {
                write!(f, "the directory is not a git repository: {path}")
            }
            GitDiffError::Git(message) => write!(f, "git failed: {message}"),
            GitDiffError::Io(err) => write!(f, "failed to run git: {err}"),
        }
    }
}

impl std::error::Error for GitDiffError {}

/// `git diff HEAD` for the working tree, or `git diff <base>..HEAD` when a
/// base commit is supplied. `include_test_files = false` drops diff blocks
/// whose paths look like test code.
pub async fn repository_diff(
    repo: &Path,
    base_commit: Option<&str>,
    include_test_files: bool,
) -> Result<String, GitDiffError> {
    if !repo.is_dir() {
        return Err(GitDiffError::NotADirectory(repo.display().to_string()));
    }

    let probe = git(repo, &["rev-parse", "--is-inside-work-tree"]).await?;
    if !probe.status.success() {
        return Err(GitDiffError::NotARepository(repo.display().to_string()));
    }

    let output = match base_commit {
        None => git(repo, &["--no-pager", "diff", "HEAD"]).await?,
        Some(base) => {
            let range = format!("{base}..HEAD");
            git(repo, &["--no-pager", "diff", &range]).await?
        }
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(GitDiffError::Git(stderr));
    }

    let diff = String::from_utf8_lossy(&output.stdout).to_string();
    if include_test_files {
        Ok(diff)
    } else {
        Ok(strip_test_file_blocks(&diff))
    }
}

async fn git(repo: &Path, args: &[&str]) -> Result<std::process::Output, GitDiffError> {
    Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(args)
        .output()
        .await
        .map_err(GitDiffError::Io)
}

/// Drop `diff --git` blocks whose file paths match the usual test layouts:
/// `tests/` and `test/` directories, `test_*` prefixes, `*_test.*`,
/// `*.spec.*`, and `*.test.*` files.
fn strip_test_file_blocks(diff: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;
    for line in diff.lines() {
        if let Some(header) = line.strip_prefix("diff --git ") {
            skipping = header_touches_test_path(header);
        }
        if !skipping {
            kept.push(line);
        }
    }
    let mut out = kept.join("\n");
    if diff.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

fn header_touches_test_path(header: &str) -> bool {
    header.split_whitespace().any(|raw| {
        let path = raw
            .trim_start_matches("a/")
            .trim_start_matches("b/")
            .to_ascii_lowercase();
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        path.split('/').any(|part| part == "tests" || part == "test")
            || file_name.starts_with("test_")
            || file_name.contains("_test.")
            || file_name.contains(".spec.")
            || file_name.contains(".test.")
    })
}
