//! pq - process facts from system tools
//!
//! Thin CLI over [`pq_core::SystemProbe`]. Results go to stdout, logs to
//! stderr, and the exit code carries the lookup outcome.

use clap::{Args, Parser, Subcommand};
use pq_common::error::StructuredError;
use pq_common::{Lookup, OutputFormat, Port, ProcessId};
use pq_core::config::{load_config, ConfigOptions};
use pq_core::exit_codes::ExitCode;
use pq_core::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use pq_core::strategy::{Attempt, Tool};
use pq_core::{expand_path, SystemProbe};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

/// Look up process IDs, working directories, and jails using the system's own tools
#[derive(Parser)]
#[command(name = "pq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (default: $XDG_CONFIG_HOME/pq/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Per-command timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// PID of the process with this exact command name
    PidByName {
        name: String,
        /// Also report every tool tried
        #[arg(long)]
        trace: bool,
    },

    /// PID of the process listening on this TCP port
    PidByPort {
        port: u16,
        /// Also report every tool tried
        #[arg(long)]
        trace: bool,
    },

    /// PID of the process holding this file open
    PidByFile { path: PathBuf },

    /// Working directory of a process
    Cwd {
        #[arg(value_parser = parse_pid)]
        pid: ProcessId,
    },

    /// FreeBSD jail of a process (0 when unjailed or not on a BSD)
    JailId {
        #[arg(value_parser = parse_pid)]
        pid: ProcessId,
    },

    /// Whether any process with this command name is running
    Running { name: String },

    /// Which lookup tools are installed
    Available {
        /// Tools to check (default: every tool pq knows)
        tools: Vec<String>,
    },

    /// Expand ".", "~", and "~user" forms of a path
    Expand { path: String },
}

fn parse_pid(raw: &str) -> Result<ProcessId, String> {
    ProcessId::parse(raw).ok_or_else(|| format!("not a process id: {raw:?}"))
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Keep clap's usage errors out of the lookup outcome codes
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Found
            };
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));

    let exit_code = run(&cli);
    std::process::exit(exit_code.as_i32());
}

fn run(cli: &Cli) -> ExitCode {
    let global = &cli.global;

    // Path expansion needs neither config nor tools
    if let Commands::Expand { path } = &cli.command {
        return run_expand(global, path);
    }

    let options = ConfigOptions {
        config_path: global.config.clone(),
        timeout_ms: global.timeout_ms,
    };
    let resolved = match load_config(&options) {
        Ok(resolved) => resolved,
        Err(e) => return output_error(global, &e),
    };
    let probe = SystemProbe::from_config(&resolved.config);

    match &cli.command {
        Commands::PidByName { name, trace } => {
            let (result, attempts) = if *trace {
                let (result, attempts) = probe.get_pid_by_name_traced(name);
                (result, Some(attempts))
            } else {
                (probe.get_pid_by_name(name), None)
            };
            output_lookup(global, json!({ "name": name }), &result, attempts)
        }
        Commands::PidByPort { port, trace } => {
            let port = Port(*port);
            let (result, attempts) = if *trace {
                let (result, attempts) = probe.get_pid_by_port_traced(port);
                (result, Some(attempts))
            } else {
                (probe.get_pid_by_port(port), None)
            };
            output_lookup(global, json!({ "port": port }), &result, attempts)
        }
        Commands::PidByFile { path } => {
            let result = probe.get_pid_by_open_file(path);
            output_lookup(global, json!({ "path": path }), &result, None)
        }
        Commands::Cwd { pid } => {
            let result: Lookup<String> = probe
                .get_cwd(*pid)
                .map(|cwd| cwd.display().to_string())
                .into();
            output_lookup(global, json!({ "pid": pid }), &result, None)
        }
        Commands::JailId { pid } => {
            let jid = probe.get_bsd_jail_id(*pid);
            output_lookup(global, json!({ "pid": pid }), &Lookup::Found(jid), None)
        }
        Commands::Running { name } => run_running(global, &probe, name),
        Commands::Available { tools } => run_available(global, &probe, tools),
        Commands::Expand { path } => run_expand(global, path),
    }
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_running(global: &GlobalOpts, probe: &SystemProbe, name: &str) -> ExitCode {
    let running = probe.is_running(name);
    let exit_code = match running {
        Some(true) => ExitCode::Found,
        Some(false) | None => ExitCode::NotFound,
    };

    match global.format {
        OutputFormat::Json => print_json(&json!({
            "query": { "name": name },
            "running": running,
        })),
        OutputFormat::Text => match running {
            Some(running) => println!("{}", if running { "yes" } else { "no" }),
            None => eprintln!("pq: no process listing available"),
        },
    }
    exit_code
}

fn run_available(global: &GlobalOpts, probe: &SystemProbe, tools: &[String]) -> ExitCode {
    let names: Vec<String> = if tools.is_empty() {
        Tool::ALL.iter().map(|tool| tool.binary().to_string()).collect()
    } else {
        tools.to_vec()
    };

    #[derive(Serialize)]
    struct ToolStatus {
        tool: String,
        available: bool,
        path: Option<PathBuf>,
    }

    let statuses: Vec<ToolStatus> = names
        .into_iter()
        .map(|tool| {
            let path = probe.locator().locate(&tool);
            ToolStatus {
                available: path.is_some(),
                tool,
                path,
            }
        })
        .collect();

    match global.format {
        OutputFormat::Json => print_json(&json!({
            "host": {
                "kernel": probe.kernel_name(),
                "platform": probe.platform(),
                "mac": probe.is_mac(),
            },
            "tools": statuses,
        })),
        OutputFormat::Text => {
            for status in &statuses {
                match &status.path {
                    Some(path) => println!("{}\t{}", status.tool, path.display()),
                    None => println!("{}\tmissing", status.tool),
                }
            }
        }
    }

    if statuses.iter().all(|status| status.available) {
        ExitCode::Found
    } else {
        ExitCode::NotFound
    }
}

fn run_expand(global: &GlobalOpts, path: &str) -> ExitCode {
    let expanded = expand_path(path);
    match global.format {
        OutputFormat::Json => print_json(&json!({ "input": path, "expanded": expanded })),
        OutputFormat::Text => println!("{}", expanded.display()),
    }
    ExitCode::Found
}

// ============================================================================
// Output helpers
// ============================================================================

fn output_lookup<T: Serialize + std::fmt::Display>(
    global: &GlobalOpts,
    query: serde_json::Value,
    result: &Lookup<T>,
    attempts: Option<Vec<Attempt>>,
) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let mut response = json!({ "query": query, "result": result });
            if let Some(attempts) = attempts {
                response["attempts"] = json!(attempts);
            }
            print_json(&response);
        }
        OutputFormat::Text => {
            match result {
                Lookup::Found(value) => println!("{}", value),
                Lookup::Ambiguous(values) => {
                    for value in values {
                        println!("{}", value);
                    }
                    eprintln!("pq: {} candidates, none picked", values.len());
                }
                Lookup::NotFound => eprintln!("pq: not found"),
            }
            for attempt in attempts.iter().flatten() {
                eprintln!("  tried {}: {:?}", attempt.command, attempt.outcome);
            }
        }
    }
    ExitCode::for_lookup(result)
}

fn output_error(global: &GlobalOpts, error: &pq_common::Error) -> ExitCode {
    match global.format {
        OutputFormat::Json => {
            let response = json!({ "status": "error", "error": StructuredError::from(error) });
            eprintln!("{}", response);
        }
        OutputFormat::Text => {
            eprintln!("pq: {}", error);
            eprintln!("hint: {}", error.remediation());
        }
    }
    ExitCode::for_error(error)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("pq: failed to encode output: {}", e),
    }
}
