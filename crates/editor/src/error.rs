use thiserror::Error;

pub type Result<T> = std::result::Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("path does not exist: {0}")]
    NotFound(String),

    #[error("file already exists at: {0}")]
    AlreadyExists(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("'{0}' is not a file")]
    NotAFile(String),

    #[error("no replacement was performed, old_str did not appear verbatim in {0}")]
    TargetMissing(String),

    #[error("no replacement was performed: old_str appears {count} times in {path}, at lines {lines:?}; include enough context to make it unique")]
    NotUnique {
        path: String,
        count: usize,
        lines: Vec<usize>,
    },

    #[error("no matches found for JSONPath: {0}")]
    NoMatch(String),

    #[error("{0}")]
    OutOfRange(String),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
