//! Thin CLI layer: parse args, styled output, and call into ordmap-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod demo;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::env;
use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

use ordmap_core::{load_config, Config, DelayRange, FailurePolicy};

const LOG_ENV: &str = "ORDMAP_LOG";

// ---- UI helpers (no-op when stdout isn't a TTY) ----

fn use_color() -> bool {
    std::io::stdout().is_terminal()
        && env::var("NO_COLOR").unwrap_or_default().is_empty()
}

fn success(msg: &str) {
    if use_color() {
        println!("{}", msg.green());
    } else {
        println!("{}", msg);
    }
}

fn error(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.red());
    } else {
        eprintln!("{}", msg);
    }
}

fn warning(msg: &str) {
    if use_color() {
        eprintln!("{}", msg.yellow());
    } else {
        eprintln!("{}", msg);
    }
}

fn info(msg: &str) {
    if use_color() {
        println!("{}", msg.cyan());
    } else {
        println!("{}", msg);
    }
}

fn dim(msg: &str) {
    if use_color() {
        println!("{}", msg.dimmed());
    } else {
        println!("{}", msg);
    }
}

/// Flags win over ORDMAP_LOG; ORDMAP_LOG wins over the default.
fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn format_values<T: std::fmt::Display>(values: &[T]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

fn format_slots(slots: &[Option<i64>]) -> String {
    let parts: Vec<String> = slots
        .iter()
        .map(|s| s.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string()))
        .collect();
    format!("[{}]", parts.join(", "))
}

/// Config file + env, then CLI flags on top.
fn resolve_config(sub_m: &ArgMatches) -> Result<Config, String> {
    let cwd = env::current_dir().map_err(|e| format!("Cannot read current directory: {}", e))?;
    let mut cfg = load_config(&cwd).map_err(|e| e.to_string())?;
    if let Some(workers) = sub_m.get_one::<usize>("workers") {
        cfg.max_workers = Some(*workers);
    }
    if let Some(delay) = sub_m.get_one::<String>("delay-ms") {
        cfg.delay_ms = Some(delay.parse::<DelayRange>().map_err(|e| e.to_string())?);
    }
    if let Ok(Some(policy)) = sub_m.try_get_one::<String>("policy") {
        cfg.failure_policy = Some(policy.parse::<FailurePolicy>()?);
    }
    cfg.mapper_config().validate().map_err(|e| e.to_string())?;
    Ok(cfg)
}

fn demo_options(sub_m: &ArgMatches) -> Result<demo::DemoOptions, String> {
    let values: Vec<i64> = sub_m
        .get_many::<i64>("values")
        .map(|vals| vals.copied().collect())
        .unwrap_or_else(demo::default_values);
    let quiet = sub_m.get_flag("quiet");
    let json_out = sub_m.get_flag("json");
    Ok(demo::DemoOptions {
        values,
        config: resolve_config(sub_m)?,
        progress: !quiet && !json_out && std::io::stderr().is_terminal(),
    })
}

fn mapper_args() -> Vec<Arg> {
    vec![
        Arg::new("values")
            .required(false)
            .num_args(0..)
            .allow_negative_numbers(true)
            .value_parser(value_parser!(i64))
            .help("Integers to double; omit to use 0..=9"),
        Arg::new("workers")
            .short('w')
            .long("workers")
            .value_parser(value_parser!(usize))
            .help("Max worker threads (default: one per value up to 64, or ORDMAP_MAX_WORKERS)"),
        Arg::new("delay-ms")
            .short('d')
            .long("delay-ms")
            .value_name("MIN..MAX")
            .help("Per-value blocking delay in ms, e.g. 1000..2000 or 50 (or ORDMAP_DELAY_MS)"),
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print a JSON report instead of text"),
        Arg::new("quiet")
            .short('q')
            .long("quiet")
            .action(ArgAction::SetTrue)
            .help("Minimal output; no progress bar"),
    ]
}

fn run() -> Result<(), String> {
    let matches = Command::new("ordmap")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ordered concurrent map: slow per-value work on many workers, results in input order")
        .after_help(
            "Examples:\n  ordmap run\n  ordmap run 3 1 4 1 5 --delay-ms 100..300\n  ordmap run --workers 2 --json\n  ordmap compare --delay-ms 200\n  ordmap config",
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging to stderr (or set ORDMAP_LOG)"),
        )
        .subcommand(
            Command::new("run")
                .about("Double each value concurrently; output keeps input order")
                .args(mapper_args())
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_parser(["fail-fast", "collect-all"])
                        .help("On failure: stop with the first error, or report every failure"),
                ),
        )
        .subcommand(
            Command::new("compare")
                .about("Time the sequential baseline against the concurrent mapper")
                .args(mapper_args()),
        )
        .subcommand(Command::new("config").about("Print the effective configuration as JSON"))
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let quiet = matches
        .subcommand()
        .and_then(|(_, sub_m)| sub_m.try_get_one::<bool>("quiet").ok().flatten().copied())
        .unwrap_or(false);
    init_tracing(verbose, quiet);

    match matches.subcommand() {
        Some(("run", sub_m)) => {
            let json_out = sub_m.get_flag("json");
            let opts = demo_options(sub_m)?;
            if !json_out && !quiet {
                let delay = opts.config.delay();
                dim(&format!(
                    "Doubling {} values, {}..{} ms each…",
                    opts.values.len(),
                    delay.min,
                    delay.max
                ));
            }
            let report = demo::run_concurrent(&opts)?;
            if json_out {
                println!("{}", report.to_json());
            } else {
                if !quiet {
                    info(&format!("Input:  {}", format_values(&report.input)));
                }
                println!("Output: {}", format_slots(&report.output));
                for (index, reason) in &report.failures {
                    warning(&format!("  failed at {}: {}", index, reason));
                }
                if !quiet {
                    dim(&format!(
                        "Took {:.3}s on {} workers.",
                        report.elapsed.as_secs_f64(),
                        report.workers
                    ));
                }
            }
            if !report.failures.is_empty() {
                return Err(format!("{} value(s) failed.", report.failures.len()));
            }
        }
        Some(("compare", sub_m)) => {
            let json_out = sub_m.get_flag("json");
            let opts = demo_options(sub_m)?;
            let report = demo::compare(&opts)?;
            if json_out {
                println!("{}", report.to_json());
            } else {
                println!("Output: {}", format_values(&report.output));
                if !quiet {
                    info(&format!("Sequential: {:.3}s", report.sequential.as_secs_f64()));
                    info(&format!(
                        "Concurrent: {:.3}s on {} workers",
                        report.concurrent.as_secs_f64(),
                        report.workers
                    ));
                }
                success(&format!("Same output, {:.1}x faster.", report.speedup()));
            }
        }
        Some(("config", _)) => {
            let cwd = env::current_dir().map_err(|e| e.to_string())?;
            let cfg = load_config(&cwd).map_err(|e| e.to_string())?;
            let value = serde_json::json!({
                "file": cfg,
                "effective": {
                    "mapper": cfg.mapper_config(),
                    "delayMs": cfg.delay(),
                },
                "cpus": ordmap_core::config::default_worker_hint(),
            });
            let out = serde_json::to_string_pretty(&value).map_err(|e| e.to_string())?;
            println!("{}", out);
        }
        _ => {
            if use_color() {
                println!("{}", "ordmap".bright_cyan().bold());
                dim("Ordered concurrent map: slow work on many workers, results in input order.");
            } else {
                println!("ordmap — Ordered concurrent map");
            }
            dim("\nRun `ordmap --help` for details.");
        }
    }

    Ok(())
}

fn main() {
    if !use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            error(&e);
            1
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
