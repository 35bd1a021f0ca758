use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use workbench_ckg::CkgError;
use workbench_editor::EditorError;
use workbench_session::SessionError;
use workbench_shell::ShellError;

/// Stable error codes carried in every failed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PathEscape = 1,
    NotFound = 2,
    AlreadyExists = 3,
    NotADirectory = 4,
    NotAFile = 5,
    NotUnique = 6,
    OutOfRange = 7,
    PhaseViolation = 8,
    UnknownTool = 9,
    BadArguments = 10,
    CommandTimeout = 11,
    ShellBroken = 12,
    ParseError = 13,
    GitError = 14,
    DbError = 15,
    Internal = 16,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::PathEscape => "PathEscape",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::AlreadyExists => "AlreadyExists",
            ErrorCode::NotADirectory => "NotADirectory",
            ErrorCode::NotAFile => "NotAFile",
            ErrorCode::NotUnique => "NotUnique",
            ErrorCode::OutOfRange => "OutOfRange",
            ErrorCode::PhaseViolation => "PhaseViolation",
            ErrorCode::UnknownTool => "UnknownTool",
            ErrorCode::BadArguments => "BadArguments",
            ErrorCode::CommandTimeout => "CommandTimeout",
            ErrorCode::ShellBroken => "ShellBroken",
            ErrorCode::ParseError => "ParseError",
            ErrorCode::GitError => "GitError",
            ErrorCode::DbError => "DbError",
            ErrorCode::Internal => "Internal",
        }
    }
}

/// The result envelope every tool call returns. `content` is free-form text
/// or structured JSON; `error_code` is 0 on success.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub content: serde_json::Value,
    pub error_code: i32,
}

impl ToolResponse {
    pub fn ok_text(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: serde_json::Value::String(content.into()),
            error_code: 0,
        }
    }

    pub fn ok_json(content: serde_json::Value) -> Self {
        Self {
            success: true,
            content,
            error_code: 0,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: serde_json::Value::String(format!("{}: {}", code.as_str(), message.into())),
            error_code: code as i32,
        }
    }

    /// A failure that still carries collected output (shell timeouts).
    pub fn error_with_content(
        code: ErrorCode,
        message: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            success: false,
            content: serde_json::json!({
                "message": format!("{}: {}", code.as_str(), message.into()),
                "partial": content,
            }),
            error_code: code as i32,
        }
    }

    /// Pretty-printed envelope inside the MCP text content.
    pub fn into_call_result(self) -> CallToolResult {
        let text = serde_json::to_string_pretty(&self).unwrap_or_default();
        if self.success {
            CallToolResult::success(vec![Content::text(text)])
        } else {
            CallToolResult::error(vec![Content::text(text)])
        }
    }
}

impl From<SessionError> for ToolResponse {
    fn from(err: SessionError) -> Self {
        let code = match &err {
            SessionError::PathEscape(_) => ErrorCode::PathEscape,
            SessionError::NotFound(_) => ErrorCode::NotFound,
            SessionError::NotADirectory(_) => ErrorCode::NotADirectory,
            SessionError::InvalidThought(_) => ErrorCode::BadArguments,
            SessionError::Io(_) => ErrorCode::Internal,
        };
        ToolResponse::error(code, err.to_string())
    }
}

impl From<EditorError> for ToolResponse {
    fn from(err: EditorError) -> Self {
        let code = match &err {
            EditorError::NotFound(_)
            | EditorError::TargetMissing(_)
            | EditorError::NoMatch(_) => ErrorCode::NotFound,
            EditorError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EditorError::NotADirectory(_) => ErrorCode::NotADirectory,
            EditorError::NotAFile(_) => ErrorCode::NotAFile,
            EditorError::NotUnique { .. } => ErrorCode::NotUnique,
            EditorError::OutOfRange(_) => ErrorCode::OutOfRange,
            EditorError::Invalid(_) => ErrorCode::BadArguments,
            EditorError::Parse(_) => ErrorCode::ParseError,
            EditorError::Io(_) => ErrorCode::Internal,
        };
        ToolResponse::error(code, err.to_string())
    }
}

impl From<ShellError> for ToolResponse {
    fn from(err: ShellError) -> Self {
        match err {
            ShellError::CommandTimeout {
                timeout_secs,
                stdout,
                stderr,
            } => ToolResponse::error_with_content(
                ErrorCode::CommandTimeout,
                format!("command timed out after {timeout_secs}s"),
                serde_json::json!({ "stdout": stdout, "stderr": stderr }),
            ),
            ShellError::Broken(message) => ToolResponse::error(ErrorCode::ShellBroken, message),
            ShellError::Spawn(err) => ToolResponse::error(ErrorCode::ShellBroken, err.to_string()),
            ShellError::Io(err) => ToolResponse::error(ErrorCode::Internal, err.to_string()),
        }
    }
}

impl From<CkgError> for ToolResponse {
    fn from(err: CkgError) -> Self {
        let code = match &err {
            CkgError::Db(_) => ErrorCode::DbError,
            CkgError::Parse(_) => ErrorCode::ParseError,
            CkgError::UnsupportedLanguage(_) => ErrorCode::BadArguments,
            CkgError::Io(_) => ErrorCode::Internal,
        };
        ToolResponse::error(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::PathEscape as i32, 1);
        assert_eq!(ErrorCode::PhaseViolation as i32, 8);
        assert_eq!(ErrorCode::Internal as i32, 16);
    }

    #[test]
    fn success_envelope_has_code_zero() {
        let resp = ToolResponse::ok_text("done");
        assert!(resp.success);
        assert_eq!(resp.error_code, 0);
    }

    #[test]
    fn error_envelope_names_the_code() {
        let resp = ToolResponse::error(ErrorCode::PathEscape, "nope");
        assert!(!resp.success);
        assert_eq!(resp.error_code, 1);
        assert_eq!(resp.content.as_str().unwrap(), "PathEscape: nope");
    }

    #[test]
    fn timeout_envelope_keeps_partial_output() {
        let resp: ToolResponse = ShellError::CommandTimeout {
            timeout_secs: 5,
            stdout: "partial".to_string(),
            stderr: String::new(),
        }
        .into();
        assert!(!resp.success);
        assert_eq!(resp.error_code, ErrorCode::CommandTimeout as i32);
        assert_eq!(resp.content["partial"]["stdout"], "partial");
    }
}
