//! rebound CLI

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use rebound::{config, DebugConfig, Value, Vm};

#[derive(Parser, Debug)]
#[command(name = "rebound")]
#[command(version, about = "Evaluate source with the stackless trampoline evaluator")]
struct Args {
    /// Source file to evaluate (stdin when neither FILE nor --eval is given)
    file: Option<PathBuf>,

    /// Evaluate an expression instead of a file
    #[arg(short, long, conflicts_with = "file")]
    eval: Option<String>,

    /// Path to a rebound.toml (default: nearest one upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore rebound.toml configuration
    #[arg(long, conflicts_with = "config")]
    no_config: bool,

    /// Log every trampoline step
    #[arg(long)]
    steps: bool,

    /// Log every step with the level stack
    #[arg(long)]
    trace: bool,

    /// Override the step limit
    #[arg(long)]
    max_steps: Option<u64>,

    /// Override the level depth limit
    #[arg(long)]
    max_depth: Option<usize>,

    /// Output format: text, json
    #[arg(long, default_value = "text")]
    output_format: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp(None)
        .try_init()
        .ok();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{}: {:#}", "error".red().bold(), err);
            ExitCode::from(2)
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut config = if args.no_config {
        config::Config::default()
    } else {
        // EvalError holds Rc-backed symbols, so it is not Send for anyhow.
        config::load_config(args.config.as_deref()).map_err(|e| anyhow::anyhow!("{}", e))?
    };
    if let Some(limit) = args.max_steps {
        config.eval.max_steps = Some(limit);
    }
    if let Some(limit) = args.max_depth {
        config.eval.max_depth = limit;
    }
    if args.trace {
        config.debug = DebugConfig::trace();
    } else if args.steps {
        config.debug = DebugConfig::steps();
    }
    log::debug!("effective configuration: {:?}", config);

    let source = read_source(args)?;
    let json = args.output_format == "json";

    let mut vm = Vm::with_config(config);
    vm.set_echo(!json);
    let result = vm.eval_str(&source);

    if json {
        let body = match &result {
            Ok(value) => serde_json::json!({
                "result": value.to_json(),
                "output": vm.output(),
            }),
            Err(err) => serde_json::json!({
                "error": err.to_string(),
                "output": vm.output(),
            }),
        };
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(exit_code(&result));
    }

    match &result {
        Ok(Value::Void) => {}
        Ok(value) => println!("{} {}", "==".dimmed(), value),
        Err(err) => eprintln!("{}: {}", "error".red().bold(), err),
    }
    Ok(exit_code(&result))
}

fn exit_code<E>(result: &std::result::Result<Value, E>) -> ExitCode {
    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn read_source(args: &Args) -> Result<String> {
    if let Some(expr) = &args.eval {
        return Ok(expr.clone());
    }
    match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            std::io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok(source)
        }
    }
}
