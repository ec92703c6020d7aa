//! Keytrace - Key-Material Capture Engine
//!
//! The main entry point for keytrace, handling:
//! - Engine runs against a live target process
//! - One-shot module scans with rule-match preview
//! - Configuration and environment validation

use clap::{Args, Parser, Subcommand};
use kt_common::{OutputFormat, RunId};
use kt_config::{resolve_config, EngineSettings, RuleSet};
use kt_core::engine::Engine;
use kt_core::exit_codes::ExitCode;
use kt_core::locate::ModuleLocator;
use kt_core::logging::{init_logging, print_banner, LogConfig, LogFormat};
use kt_core::matcher::match_symbols;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

/// Keytrace - capture key material from instrumented library calls
#[derive(Parser)]
#[command(name = "keytrace")]
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
    /// Path to engine settings (config.toml)
    #[arg(long, global = true, env = "KEYTRACE_SETTINGS")]
    config: Option<PathBuf>,

    /// Path to the pattern rule table (rules.json)
    #[arg(long, global = true, env = "KEYTRACE_RULES")]
    rules: Option<PathBuf>,

    /// Output format for command payloads
    #[arg(long, short = 'f', global = true, default_value = "text")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log stream format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach to a process and capture until stopped
    Run(RunArgs),

    /// One-shot locate + export dump + rule-match preview
    Scan(ScanArgs),

    /// Validate configuration and report backend capabilities
    Check(CheckArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Target process ID
    #[arg(long)]
    pid: u32,

    /// Override the target module name
    #[arg(long)]
    module: Option<String>,

    /// Override the artifact output directory
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the poll interval (milliseconds)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Give up after this many locate attempts (default: retry forever)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Override the post-load settle delay (milliseconds)
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Also persist unmatched probed buffers to the unidentified slot
    #[arg(long)]
    capture_unidentified: bool,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Target process ID
    #[arg(long)]
    pid: u32,

    /// Override the target module name
    #[arg(long)]
    module: Option<String>,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Also probe backend capabilities against this process
    #[arg(long)]
    pid: Option<u32>,
}

fn main() {
    let cli = Cli::parse();

    let log_config = LogConfig::from_flags(
        cli.global.log_format,
        cli.global.verbose,
        cli.global.quiet,
        cli.global.no_color,
    );
    init_logging(&log_config);

    let code = match &cli.command {
        Commands::Run(args) => cmd_run(&cli.global, args),
        Commands::Scan(args) => cmd_scan(&cli.global, args),
        Commands::Check(args) => cmd_check(&cli.global, args),
        Commands::Version => cmd_version(),
    };
    code.exit();
}

// ============================================================================
// Configuration loading
// ============================================================================

fn load_configuration(global: &GlobalOpts) -> Result<(EngineSettings, RuleSet), ExitCode> {
    // An explicitly named file that does not exist is an operator error,
    // not a fall-through to defaults.
    for (path, what) in [(&global.config, "settings"), (&global.rules, "rule table")] {
        if let Some(path) = path {
            if !path.exists() {
                error!(path = %path.display(), "{} file not found", what);
                return Err(ExitCode::ConfigError);
            }
        }
    }

    let paths = resolve_config(global.config.as_deref(), global.rules.as_deref());
    paths.load().map_err(|e| {
        error!(error = %e, "configuration invalid");
        ExitCode::from_error(&e)
    })
}

#[cfg(target_os = "linux")]
fn attach_backend(pid: u32) -> kt_common::Result<Arc<dyn kt_core::backend::Backend>> {
    let backend = kt_core::backend::procfs::ProcfsBackend::attach(pid)?;
    Ok(Arc::new(backend))
}

#[cfg(not(target_os = "linux"))]
fn attach_backend(_pid: u32) -> kt_common::Result<Arc<dyn kt_core::backend::Backend>> {
    Err(kt_common::Error::UnsupportedPlatform(
        "the procfs backend requires Linux".into(),
    ))
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_run(global: &GlobalOpts, args: &RunArgs) -> ExitCode {
    let (mut settings, rules) = match load_configuration(global) {
        Ok(pair) => pair,
        Err(code) => return code,
    };

    if let Some(module) = &args.module {
        settings.module_name = module.clone();
    }
    if let Some(output) = &args.output {
        settings.output_dir = output.clone();
    }
    if let Some(interval) = args.interval_ms {
        settings.poll_interval_ms = interval;
    }
    if let Some(max) = args.max_attempts {
        settings.max_attempts = Some(max);
    }
    if let Some(settle) = args.settle_ms {
        settings.settle_delay_ms = settle;
    }
    if args.capture_unidentified {
        settings.capture_unidentified = true;
    }
    if let Err(e) = settings.validate() {
        error!(error = %e, "invalid settings");
        return ExitCode::from_error(&e);
    }

    let backend = match attach_backend(args.pid) {
        Ok(backend) => backend,
        Err(e) => {
            error!(pid = args.pid, error = %e, "attach failed");
            return ExitCode::from_error(&e);
        }
    };

    let run_id = RunId::new();
    print_banner(&run_id, &settings.module_name, args.pid);

    let mut engine = match Engine::new(backend, settings, &rules, run_id) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, "engine setup failed");
            return ExitCode::from_error(&e);
        }
    };

    match engine.run() {
        Ok(status) => {
            if !status.module_found {
                ExitCode::ModuleNotFound
            } else if status.hooked_symbols == 0 {
                ExitCode::NoSymbolsMatched
            } else {
                ExitCode::Clean
            }
        }
        Err(e) => {
            error!(error = %e, "engine failed");
            ExitCode::from_error(&e)
        }
    }
}

#[derive(Serialize)]
struct ScanReport {
    module: Option<kt_common::TargetModule>,
    export_count: usize,
    matched: Vec<kt_common::ExportSymbol>,
}

fn cmd_scan(global: &GlobalOpts, args: &ScanArgs) -> ExitCode {
    let (mut settings, rules) = match load_configuration(global) {
        Ok(pair) => pair,
        Err(code) => return code,
    };
    if let Some(module) = &args.module {
        settings.module_name = module.clone();
    }
    let compiled = match rules.compile() {
        Ok(compiled) => compiled,
        Err(e) => {
            error!(error = %e, "rule table invalid");
            return ExitCode::from_error(&e);
        }
    };

    let backend = match attach_backend(args.pid) {
        Ok(backend) => backend,
        Err(e) => {
            error!(pid = args.pid, error = %e, "attach failed");
            return ExitCode::from_error(&e);
        }
    };

    let mut locator = ModuleLocator::new(backend, settings.module_name.clone());
    let module = match locator.locate() {
        Ok(module) => module.cloned(),
        Err(e) => {
            error!(error = %e, "locate failed");
            return ExitCode::from_error(&e);
        }
    };

    let Some(module) = module else {
        let report = ScanReport {
            module: None,
            export_count: 0,
            matched: Vec::new(),
        };
        emit_report(global.format, &report, || {
            println!(
                "module '{}' not present in pid {}",
                settings.module_name, args.pid
            );
        });
        return ExitCode::ModuleNotFound;
    };

    let exports = match locator.exports() {
        Ok(exports) => exports,
        Err(e) => {
            error!(error = %e, "export enumeration failed");
            return ExitCode::from_error(&e);
        }
    };
    let matched = match_symbols(&exports, &compiled);

    let report = ScanReport {
        module: Some(module.clone()),
        export_count: exports.len(),
        matched: matched.clone(),
    };
    emit_report(global.format, &report, || {
        println!("{}", module);
        println!("exports: {}", exports.len());
        println!("matched: {}", matched.len());
        for sym in &matched {
            println!("  {}", sym);
        }
    });

    if matched.is_empty() {
        ExitCode::NoSymbolsMatched
    } else {
        ExitCode::Clean
    }
}

#[derive(Serialize)]
struct BackendReport {
    pid: u32,
    memory_read: bool,
    interception: bool,
    load_watch: bool,
}

#[derive(Serialize)]
struct CheckReport {
    settings_source: String,
    rules_source: String,
    module_name: String,
    poll_interval_ms: u64,
    max_attempts: Option<u32>,
    rules: usize,
    output_dir: PathBuf,
    backend: Option<BackendReport>,
}

fn cmd_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    // Resolve first so sources can be reported even on load failure.
    for (path, what) in [(&global.config, "settings"), (&global.rules, "rule table")] {
        if let Some(path) = path {
            if !path.exists() {
                error!(path = %path.display(), "{} file not found", what);
                return ExitCode::ConfigError;
            }
        }
    }
    let paths = resolve_config(global.config.as_deref(), global.rules.as_deref());
    let (settings, rules) = match paths.load() {
        Ok(pair) => pair,
        Err(e) => {
            error!(error = %e, "configuration invalid");
            return ExitCode::from_error(&e);
        }
    };
    if let Err(e) = rules.compile() {
        error!(error = %e, "rule table invalid");
        return ExitCode::from_error(&e);
    }

    let backend = match args.pid {
        Some(pid) => match attach_backend(pid) {
            Ok(backend) => {
                let caps = backend.capabilities();
                Some(BackendReport {
                    pid,
                    memory_read: caps.memory_read,
                    interception: caps.interception,
                    load_watch: caps.load_watch,
                })
            }
            Err(e) => {
                error!(pid, error = %e, "attach failed");
                return ExitCode::from_error(&e);
            }
        },
        None => None,
    };

    let report = CheckReport {
        settings_source: paths.settings_source.to_string(),
        rules_source: paths.rules_source.to_string(),
        module_name: settings.module_name.clone(),
        poll_interval_ms: settings.poll_interval_ms,
        max_attempts: settings.max_attempts,
        rules: rules.len(),
        output_dir: settings.output_dir.clone(),
        backend,
    };
    emit_report(global.format, &report, || {
        println!("settings : {}", report.settings_source);
        println!("rules    : {} ({} patterns)", report.rules_source, report.rules);
        println!("module   : {}", report.module_name);
        println!("interval : {} ms", report.poll_interval_ms);
        match report.max_attempts {
            Some(max) => println!("attempts : up to {}", max),
            None => println!("attempts : unbounded"),
        }
        println!("output   : {}", report.output_dir.display());
        if let Some(b) = &report.backend {
            println!(
                "backend  : pid {} (memory_read={}, interception={}, load_watch={})",
                b.pid, b.memory_read, b.interception, b.load_watch
            );
        }
    });
    ExitCode::Clean
}

fn cmd_version() -> ExitCode {
    println!("keytrace {}", kt_core::VERSION);
    ExitCode::Clean
}

/// Print a payload as JSON or via the provided text renderer.
fn emit_report<T: Serialize>(format: OutputFormat, report: &T, text: impl FnOnce()) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => error!(error = %e, "report serialization failed"),
        },
        OutputFormat::Text => text(),
    }
}
