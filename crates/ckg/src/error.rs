use thiserror::Error;

pub type Result<T> = std::result::Result<T, CkgError>;

#[derive(Error, Debug)]
pub enum CkgError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unsupported language for '{0}'")]
    UnsupportedLanguage(String),
}
