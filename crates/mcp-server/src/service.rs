use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use tokio::sync::Mutex;

use workbench_ckg::{CkgRegistry, ClassRecord, FunctionRecord};
use workbench_editor::{clip_text, ChangeObserver, JsonEditor, TextEditor};
use workbench_session::{resolve_path, Phase, SessionStore, ThoughtRecord};
use workbench_shell::{ShellOptions, ShellSession};

use crate::config::Config;
use crate::envelope::{ErrorCode, ToolResponse};
use crate::git::{repository_diff, GitDiffError};
use crate::schemas::{
    session_id, BashRequest, CodeSearchRequest, FileEditorRequest, GitDiffRequest,
    JsonEditorRequest, NavigatorRequest, SequentialThinkingRequest, TaskDoneRequest,
};

/// Routes edit-engine writes into every open index whose root contains the
/// written file. Roots with no open index catch up on next open via sync.
struct CkgObserver {
    registry: Arc<CkgRegistry>,
}

impl ChangeObserver for CkgObserver {
    fn on_file_changed(&self, path: &Path) {
        for store in self.registry.open_stores() {
            if path.starts_with(store.root()) {
                if let Err(err) = store.on_file_changed(path) {
                    log::warn!("failed to reindex {}: {err}", path.display());
                }
            }
        }
    }
}

/// The Workbench MCP service: one instance serves one transport connection,
/// with sessions, shells, and code indexes shared process-wide through the
/// inner `Arc`s.
#[derive(Clone)]
pub struct WorkbenchService {
    config: Arc<Config>,
    sessions: Arc<SessionStore>,
    shells: Arc<Mutex<HashMap<String, Arc<Mutex<ShellSession>>>>>,
    ckg: Arc<CkgRegistry>,
    text_editor: Arc<TextEditor>,
    json_editor: Arc<JsonEditor>,
    tool_router: ToolRouter<Self>,
}

impl WorkbenchService {
    pub fn new(config: Config) -> Self {
        let ckg = Arc::new(CkgRegistry::new(config.storage_dir.clone()));
        let observer: Arc<dyn ChangeObserver> = Arc::new(CkgObserver {
            registry: ckg.clone(),
        });
        Self {
            sessions: Arc::new(SessionStore::new(config.sandbox_root.clone())),
            shells: Arc::new(Mutex::new(HashMap::new())),
            text_editor: Arc::new(TextEditor::new(config.max_output_bytes, observer.clone())),
            json_editor: Arc::new(JsonEditor::new(observer)),
            ckg,
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }

    fn phase_violation(tool: &str) -> ToolResponse {
        ToolResponse::error(
            ErrorCode::PhaseViolation,
            format!("'{tool}' is only available in the edit phase; run `navigator lock_cwd` first"),
        )
    }
}

#[tool_handler]
impl ServerHandler for WorkbenchService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Workbench gives coding agents sandboxed hands on a workspace. Start in \
                 discovery: navigate with `navigator` (cd/pwd/ls/read) and search code with \
                 `code_search`. Lock the working directory with `navigator lock_cwd` to enter \
                 the edit phase, which unlocks `bash`, `file_editor` writes, and `json_editor` \
                 writes. Use `sequential_thinking` to reason in steps and `task_done` when \
                 finished."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Tool router: thin wrappers over the testable handlers below
// ============================================================================

#[tool_router]
impl WorkbenchService {
    #[tool(
        description = "Explore the file system and manage the session: cd, pwd, ls, read, and lock_cwd (which finalizes the working directory and unlocks the editing tools)."
    )]
    pub async fn navigator(
        &self,
        Parameters(request): Parameters<NavigatorRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_navigator(request).await.into_call_result())
    }

    #[tool(
        description = "Run a bash command in a persistent shell rooted at the locked cwd. Pass restart=true to replace a wedged shell. Edit phase only."
    )]
    pub async fn bash(
        &self,
        Parameters(request): Parameters<BashRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_bash(request).await.into_call_result())
    }

    #[tool(
        description = "View, create, and edit files. `replace` needs an old_str that matches exactly once; `insert` adds lines after a 1-based line number. Writes require the edit phase."
    )]
    pub async fn file_editor(
        &self,
        Parameters(request): Parameters<FileEditorRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_file_editor(request).await.into_call_result())
    }

    #[tool(
        description = "Edit JSON files with JSONPath expressions: view, set, add, remove. Supports $.key, ['key'], [index], and [*]. Writes require the edit phase."
    )]
    pub async fn json_editor(
        &self,
        Parameters(request): Parameters<JsonEditorRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_json_editor(request).await.into_call_result())
    }

    #[tool(
        description = "Search the project's code index for definitions by exact name: search_function, search_class, or search_class_method. The index syncs with the filesystem automatically."
    )]
    pub async fn code_search(
        &self,
        Parameters(request): Parameters<CodeSearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_code_search(request).await.into_call_result())
    }

    #[tool(
        description = "Show the git diff of a repository: uncommitted changes against HEAD, or the range <base_commit>..HEAD."
    )]
    pub async fn git_diff(
        &self,
        Parameters(request): Parameters<GitDiffRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_git_diff(request).await.into_call_result())
    }

    #[tool(
        description = "Record one step of a structured thinking process. Thoughts append to the session history; revisions and branches reference earlier thought numbers."
    )]
    pub async fn sequential_thinking(
        &self,
        Parameters(request): Parameters<SequentialThinkingRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self
            .handle_sequential_thinking(request)
            .await
            .into_call_result())
    }

    #[tool(description = "Signal that the task is complete.")]
    pub async fn task_done(
        &self,
        Parameters(request): Parameters<TaskDoneRequest>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.handle_task_done(request).await.into_call_result())
    }
}

// ============================================================================
// Handlers
// ============================================================================

impl WorkbenchService {
    pub async fn handle_navigator(&self, request: NavigatorRequest) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let mut state = session.lock().await;

        match request.subcommand.as_str() {
            "pwd" => ToolResponse::ok_text(state.cwd().display().to_string()),
            "cd" => {
                let Some(raw) = request.path.as_deref() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`path` is required for cd",
                    );
                };
                let target = match resolve_path(&state, raw) {
                    Ok(path) => path,
                    Err(err) => return err.into(),
                };
                if !target.is_dir() {
                    return ToolResponse::error(
                        ErrorCode::NotADirectory,
                        format!("'{}' is not a directory", target.display()),
                    );
                }
                state.set_cwd(target);
                ToolResponse::ok_text(format!("CWD is now {}", state.cwd().display()))
            }
            "ls" => {
                let raw = request.path.as_deref().unwrap_or(".");
                let target = match resolve_path(&state, raw) {
                    Ok(path) => path,
                    Err(err) => return err.into(),
                };
                if !target.is_dir() {
                    return ToolResponse::error(
                        ErrorCode::NotADirectory,
                        format!("'{}' is not a directory", target.display()),
                    );
                }
                match list_entries(&target) {
                    Ok(entries) => ToolResponse::ok_text(entries.join("\n")),
                    Err(err) => ToolResponse::error(ErrorCode::Internal, err.to_string()),
                }
            }
            "read" => {
                let Some(raw) = request.path.as_deref() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`path` is required for read",
                    );
                };
                let target = match resolve_path(&state, raw) {
                    Ok(path) => path,
                    Err(err) => return err.into(),
                };
                let range = match parse_view_range(&request.view_range) {
                    Ok(range) => range,
                    Err(resp) => return resp,
                };
                match self.text_editor.view(&target, range) {
                    Ok(text) => ToolResponse::ok_text(text),
                    Err(err) => err.into(),
                }
            }
            "lock_cwd" => {
                if state.phase() == Phase::Edit {
                    return ToolResponse::error(
                        ErrorCode::PhaseViolation,
                        "already in the edit phase; lock_cwd cannot be repeated",
                    );
                }
                let git_root = state.lock_cwd();
                let message = match git_root {
                    Some(root) => format!(
                        "Phase changed to 'edit'. CWD is locked at {}. Git repository found at {}. Editing tools are now available.",
                        state.cwd().display(),
                        root.display()
                    ),
                    None => format!(
                        "Phase changed to 'edit'. CWD is locked at {}. No git repository found under the sandbox; git_diff will not be available. Editing tools are now available.",
                        state.cwd().display()
                    ),
                };
                ToolResponse::ok_text(message)
            }
            other => ToolResponse::error(
                ErrorCode::UnknownTool,
                format!("unknown subcommand '{other}'; expected cd, pwd, ls, read, or lock_cwd"),
            ),
        }
    }

    pub async fn handle_bash(&self, request: BashRequest) -> ToolResponse {
        let id = session_id(&request.session_id).to_string();
        let session = self.sessions.get(&id).await;
        let (phase, cwd) = {
            let state = session.lock().await;
            (state.phase(), state.cwd().to_path_buf())
        };
        if phase != Phase::Edit {
            return Self::phase_violation("bash");
        }

        if request.restart.unwrap_or(false) {
            return self.restart_shell(&id).await;
        }
        let Some(command) = request.command.as_deref().map(str::trim).filter(|c| !c.is_empty())
        else {
            return ToolResponse::error(
                ErrorCode::BadArguments,
                "either `command` or `restart` is required",
            );
        };

        let shell = match self.shell_for(&id).await {
            Ok(shell) => shell,
            Err(resp) => return resp,
        };
        let mut shell = shell.lock().await;
        match shell.run(command, &cwd).await {
            Ok(output) => ToolResponse::ok_json(serde_json::json!({
                "stdout": output.stdout,
                "stderr": output.stderr,
                "exit_code": output.exit_code,
            })),
            Err(err) => err.into(),
        }
    }

    pub async fn handle_file_editor(&self, request: FileEditorRequest) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let state = session.lock().await;

        let resolved = match resolve_path(&state, &request.path) {
            Ok(path) => path,
            Err(err) => return err.into(),
        };

        match request.operation.as_str() {
            "view" => {
                let range = match parse_view_range(&request.view_range) {
                    Ok(range) => range,
                    Err(resp) => return resp,
                };
                match self.text_editor.view(&resolved, range) {
                    Ok(text) => ToolResponse::ok_text(text),
                    Err(err) => err.into(),
                }
            }
            "create" => {
                if state.phase() != Phase::Edit {
                    return Self::phase_violation("file_editor create");
                }
                let Some(file_text) = request.file_text.as_deref() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`file_text` is required for create",
                    );
                };
                match self.text_editor.create(&resolved, file_text) {
                    Ok(text) => ToolResponse::ok_text(text),
                    Err(err) => err.into(),
                }
            }
            "replace" => {
                if state.phase() != Phase::Edit {
                    return Self::phase_violation("file_editor replace");
                }
                let Some(old_str) = request.old_str.as_deref() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`old_str` is required for replace",
                    );
                };
                let new_str = request.new_str.as_deref().unwrap_or("");
                match self.text_editor.replace(&resolved, old_str, new_str) {
                    Ok(text) => ToolResponse::ok_text(text),
                    Err(err) => err.into(),
                }
            }
            "insert" => {
                if state.phase() != Phase::Edit {
                    return Self::phase_violation("file_editor insert");
                }
                let Some(insert_line) = request.insert_line else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`insert_line` is required for insert",
                    );
                };
                if insert_line < 0 {
                    return ToolResponse::error(
                        ErrorCode::OutOfRange,
                        format!("`insert_line` must be >= 0, got {insert_line}"),
                    );
                }
                let Some(new_str) = request.new_str.as_deref() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        "`new_str` is required for insert",
                    );
                };
                match self
                    .text_editor
                    .insert(&resolved, insert_line as usize, new_str)
                {
                    Ok(text) => ToolResponse::ok_text(text),
                    Err(err) => err.into(),
                }
            }
            other => ToolResponse::error(
                ErrorCode::UnknownTool,
                format!("unknown operation '{other}'; expected view, create, replace, or insert"),
            ),
        }
    }

    pub async fn handle_json_editor(&self, request: JsonEditorRequest) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let state = session.lock().await;

        let resolved = match resolve_path(&state, &request.file_path) {
            Ok(path) => path,
            Err(err) => return err.into(),
        };
        let pretty = request.pretty_print.unwrap_or(true);

        if request.operation.as_str() == "view" {
            return match self
                .json_editor
                .view(&resolved, request.json_path.as_deref(), pretty)
            {
                Ok(text) => ToolResponse::ok_text(text),
                Err(err) => err.into(),
            };
        }

        if state.phase() != Phase::Edit {
            return Self::phase_violation("json_editor writes");
        }
        let Some(json_path) = request.json_path.as_deref() else {
            return ToolResponse::error(
                ErrorCode::BadArguments,
                format!(
                    "`json_path` is required for the '{}' operation",
                    request.operation
                ),
            );
        };

        let result = match request.operation.as_str() {
            "set" | "add" => {
                let Some(value) = request.value.clone() else {
                    return ToolResponse::error(
                        ErrorCode::BadArguments,
                        format!(
                            "a `value` is required for the '{}' operation",
                            request.operation
                        ),
                    );
                };
                if request.operation.as_str() == "set" {
                    self.json_editor.set(&resolved, json_path, value, pretty)
                } else {
                    self.json_editor.add(&resolved, json_path, value, pretty)
                }
            }
            "remove" => self.json_editor.remove(&resolved, json_path, pretty),
            other => {
                return ToolResponse::error(
                    ErrorCode::UnknownTool,
                    format!("unknown operation '{other}'; expected view, set, add, or remove"),
                );
            }
        };
        match result {
            Ok(text) => ToolResponse::ok_text(text),
            Err(err) => err.into(),
        }
    }

    pub async fn handle_code_search(&self, request: CodeSearchRequest) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let resolved = {
            let state = session.lock().await;
            match resolve_path(&state, &request.path) {
                Ok(path) => path,
                Err(err) => return err.into(),
            }
        };
        if !resolved.is_dir() {
            return ToolResponse::error(
                ErrorCode::NotADirectory,
                format!("'{}' is not a directory", resolved.display()),
            );
        }

        let registry = self.ckg.clone();
        let command = request.command.clone();
        let identifier = request.identifier.clone();
        let print_body = request.print_body.unwrap_or(true);
        let body_cap = self.config.max_output_bytes;

        // Opening an index syncs the whole codebase; keep it off the
        // executor threads.
        let outcome = tokio::task::spawn_blocking(move || -> ToolResponse {
            let store = match registry.get(&resolved) {
                Ok(store) => store,
                Err(err) => return err.into(),
            };
            match command.as_str() {
                "search_function" => match store.search_function(&identifier) {
                    Ok(hits) => ToolResponse::ok_text(render_function_hits(
                        &hits,
                        "function",
                        &identifier,
                        print_body,
                        body_cap,
                    )),
                    Err(err) => err.into(),
                },
                "search_class_method" => match store.search_class_method(&identifier) {
                    Ok(hits) => ToolResponse::ok_text(render_function_hits(
                        &hits,
                        "method",
                        &identifier,
                        print_body,
                        body_cap,
                    )),
                    Err(err) => err.into(),
                },
                "search_class" => match store.search_class(&identifier) {
                    Ok(hits) => ToolResponse::ok_text(render_class_hits(
                        &hits,
                        &identifier,
                        print_body,
                        body_cap,
                    )),
                    Err(err) => err.into(),
                },
                other => ToolResponse::error(
                    ErrorCode::UnknownTool,
                    format!(
                        "unknown command '{other}'; expected search_function, search_class, or search_class_method"
                    ),
                ),
            }
        })
        .await;

        match outcome {
            Ok(response) => response,
            Err(err) => ToolResponse::error(ErrorCode::Internal, err.to_string()),
        }
    }

    pub async fn handle_git_diff(&self, request: GitDiffRequest) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let resolved = {
            let state = session.lock().await;
            match resolve_path(&state, &request.path) {
                Ok(path) => path,
                Err(err) => return err.into(),
            }
        };

        let include_tests = request.include_test_files.unwrap_or(true);
        match repository_diff(&resolved, request.base_commit.as_deref(), include_tests).await {
            Ok(diff) => ToolResponse::ok_text(diff),
            Err(GitDiffError::NotADirectory(path)) => ToolResponse::error(
                ErrorCode::NotADirectory,
                format!("'{path}' is not a directory"),
            ),
            Err(err) => ToolResponse::error(ErrorCode::GitError, err.to_string()),
        }
    }

    pub async fn handle_sequential_thinking(
        &self,
        request: SequentialThinkingRequest,
    ) -> ToolResponse {
        let session = self.sessions.get(session_id(&request.session_id)).await;
        let mut state = session.lock().await;
        let record = ThoughtRecord {
            thought: request.thought,
            thought_number: request.thought_number,
            total_thoughts: request.total_thoughts,
            next_thought_needed: request.next_thought_needed,
            is_revision: request.is_revision,
            revises_thought: request.revises_thought,
            branch_from_thought: request.branch_from_thought,
            branch_id: request.branch_id,
            needs_more_thoughts: request.needs_more_thoughts,
        };
        match state.thoughts.record(record) {
            Ok(outcome) => match serde_json::to_value(&outcome) {
                Ok(value) => ToolResponse::ok_json(value),
                Err(err) => ToolResponse::error(ErrorCode::Internal, err.to_string()),
            },
            Err(err) => err.into(),
        }
    }

    pub async fn handle_task_done(&self, request: TaskDoneRequest) -> ToolResponse {
        let id = session_id(&request.session_id);
        log::info!("session '{id}' reported task done");
        ToolResponse::ok_json(serde_json::json!({ "task_done": true }))
    }

    async fn restart_shell(&self, id: &str) -> ToolResponse {
        let shell = match self.shell_for(id).await {
            Ok(shell) => shell,
            Err(resp) => return resp,
        };
        let mut shell = shell.lock().await;
        match shell.restart().await {
            Ok(()) => ToolResponse::ok_text("tool has been restarted"),
            Err(err) => err.into(),
        }
    }

    /// Get or lazily spawn the session's shell.
    async fn shell_for(&self, id: &str) -> Result<Arc<Mutex<ShellSession>>, ToolResponse> {
        let mut shells = self.shells.lock().await;
        if let Some(shell) = shells.get(id) {
            return Ok(shell.clone());
        }
        let options = ShellOptions {
            timeout: self.config.shell_timeout,
            max_output_bytes: self.config.max_output_bytes,
        };
        match ShellSession::spawn(options) {
            Ok(session) => {
                let shell = Arc::new(Mutex::new(session));
                shells.insert(id.to_string(), shell.clone());
                Ok(shell)
            }
            Err(err) => Err(err.into()),
        }
    }

}

fn parse_view_range(raw: &Option<Vec<i64>>) -> Result<Option<[i64; 2]>, ToolResponse> {
    match raw {
        None => Ok(None),
        Some(values) if values.len() == 2 => Ok(Some([values[0], values[1]])),
        Some(values) => Err(ToolResponse::error(
            ErrorCode::BadArguments,
            format!(
                "`view_range` must be a list of two integers, got {} elements",
                values.len()
            ),
        )),
    }
}

/// One-level directory listing, `d`/`f` prefixed, sorted by name.
fn list_entries(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut entries: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let kind = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                'd'
            } else {
                'f'
            };
            format!("{kind} {}", entry.file_name().to_string_lossy())
        })
        .collect();
    entries.sort_by(|a, b| a[2..].cmp(&b[2..]));
    Ok(entries)
}

fn render_function_hits(
    hits: &[FunctionRecord],
    kind: &str,
    identifier: &str,
    print_body: bool,
    body_cap: usize,
) -> String {
    if hits.is_empty() {
        return format!("No {kind} definitions found for '{identifier}'");
    }
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{}:{}-{}",
            hit.file_path, hit.start_line, hit.end_line
        ));
        if let Some(class) = &hit.parent_class {
            out.push_str(&format!(" (method of {class})"));
        }
        if let Some(parent) = &hit.parent_function {
            out.push_str(&format!(" (nested in {parent})"));
        }
        out.push('\n');
        if print_body {
            out.push_str(&clip_text(&hit.body, body_cap));
            out.push_str("\n\n");
        }
    }
    out.trim_end().to_string()
}

fn render_class_hits(
    hits: &[ClassRecord],
    identifier: &str,
    print_body: bool,
    body_cap: usize,
) -> String {
    if hits.is_empty() {
        return format!("No class definitions found for '{identifier}'");
    }
    let mut out = String::new();
    for hit in hits {
        out.push_str(&format!(
            "{}:{}-{}\n",
            hit.file_path, hit.start_line, hit.end_line
        ));
        if let Some(fields) = &hit.fields {
            out.push_str(&format!("fields:\n{fields}\n"));
        }
        if let Some(methods) = &hit.methods {
            out.push_str(&format!("methods:\n{methods}\n"));
        }
        if print_body {
            out.push_str(&clip_text(&hit.body, body_cap));
            out.push_str("\n\n");
        }
    }
    out.trim_end().to_string()
}

