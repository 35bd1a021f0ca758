//! Workbench MCP server entry point.
//!
//! Serves the tool catalog over stdio. stdout carries protocol bytes only;
//! logging goes to stderr and stays off unless `WORKBENCH_MCP_LOG` is set.

use anyhow::Result;
use rmcp::ServiceExt;

use workbench_mcp::config::Config;
use workbench_mcp::service::WorkbenchService;

fn print_help() {
    println!("Workbench MCP server");
    println!();
    println!("Usage: workbench-mcp [--print-tools|--version|--help]");
    println!();
    println!("Env:");
    println!("  WORKBENCH_ROOT                 Sandbox root (default: cwd)");
    println!("  WORKBENCH_STORAGE              Storage dir for code indexes (default: ~/.workbench)");
    println!("  WORKBENCH_CKG_RETENTION_DAYS   Drop indexes untouched this long (default: 7)");
    println!("  WORKBENCH_SHELL_TIMEOUT_SECS   Per-command shell timeout (default: 120)");
    println!("  WORKBENCH_MAX_OUTPUT_BYTES     Output cap for shell/view results (default: 30000)");
    println!("  WORKBENCH_MCP_LOG              Enable stderr logging");
}

fn logging_enabled() -> bool {
    // Protocol purity: stdout must carry only MCP bytes, and some clients
    // merge stderr into stdout. Stay silent unless explicitly enabled.
    std::env::var("WORKBENCH_MCP_LOG")
        .ok()
        .map(|v| {
            let v = v.trim();
            !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
        })
        .unwrap_or(false)
}

/// Handle one-shot CLI flags; `Some(code)` means exit.
fn handle_cli_args() -> Option<i32> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return None;
    }
    match args[0].as_str() {
        "--stdio" | "stdio" => None,
        "--print-tools" => {
            let names = [
                "navigator",
                "bash",
                "file_editor",
                "json_editor",
                "code_search",
                "git_diff",
                "sequential_thinking",
                "task_done",
            ];
            let payload = serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "tools": names,
            });
            println!("{payload}");
            Some(0)
        }
        "--version" | "-V" => {
            println!("workbench-mcp {}", env!("CARGO_PKG_VERSION"));
            Some(0)
        }
        "--help" | "-h" => {
            print_help();
            Some(0)
        }
        other => {
            // Agent launchers pass stray transport flags; serving beats
            // failing the whole toolchain.
            if logging_enabled() {
                log::warn!("ignoring unknown arguments starting at '{other}'");
            }
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Some(code) = handle_cli_args() {
        std::process::exit(code);
    }

    if logging_enabled() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .target(env_logger::Target::Stderr)
            .init();
    }

    let config = Config::from_env()?;
    log::info!(
        "starting workbench-mcp (root: {}, storage: {})",
        config.sandbox_root.display(),
        config.storage_dir.display()
    );

    match workbench_ckg::cleanup_stale_databases(&config.storage_dir, config.ckg_retention) {
        Ok(0) => {}
        Ok(removed) => log::info!("removed {removed} stale CKG database(s)"),
        Err(err) => log::warn!("CKG housekeeping failed: {err}"),
    }

    let service = WorkbenchService::new(config);
    let server = service
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await?;
    server.waiting().await?;

    log::info!("workbench-mcp stopped");
    Ok(())
}
