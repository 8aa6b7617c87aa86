mod logging;

use std::env;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use tracing::info;

use runalloc_core::io::{read_tables, write_report};
use runalloc_core::optimize::solvers::new_solver;
use runalloc_core::{run_allocation, Configuration};

const USAGE: &str = "\
Usage: runalloc [--data-dir DIR] [--output-prefix PREFIX] [--solution-pool] [--time-limit SECONDS] [--config FILE]

Options:
  --data-dir       Directory holding the input tables as .csv or .xlsx (default: data)
  --output-prefix  Prefix of the allocation and slack CSV reports (default: outputs/allocation)
  --solution-pool  Ask the solver for a pool of alternative allocations
  --time-limit     Solve time limit in seconds
  --config         JSON configuration file, unspecified fields take defaults
  --help           Print this message";

#[derive(Debug, Clone, PartialEq)]
struct CliArgs {
    data_dir: PathBuf,
    output_prefix: PathBuf,
    solution_pool: bool,
    time_limit: Option<f64>,
    config: Option<PathBuf>,
}

impl Default for CliArgs {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_prefix: PathBuf::from("outputs/allocation"),
            solution_pool: false,
            time_limit: None,
            config: None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(CliArgs),
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut parsed = CliArgs::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", flag))
        };
        match flag {
            "--help" | "-h" => return Ok(Command::Help),
            "--data-dir" => parsed.data_dir = PathBuf::from(value()?),
            "--output-prefix" => parsed.output_prefix = PathBuf::from(value()?),
            "--config" => parsed.config = Some(PathBuf::from(value()?)),
            "--solution-pool" => parsed.solution_pool = true,
            "--time-limit" => {
                let raw = value()?;
                let seconds: f64 = raw
                    .parse()
                    .map_err(|_| format!("--time-limit requires a number of seconds, got {}", raw))?;
                if seconds.is_nan() || seconds <= 0.0 {
                    return Err(format!("--time-limit must be positive, got {}", raw));
                }
                parsed.time_limit = Some(seconds);
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(Command::Run(parsed))
}

/// Command line flags override the configuration file
fn configuration(args: &CliArgs) -> anyhow::Result<Configuration> {
    let mut configuration = match &args.config {
        Some(path) => Configuration::read_json(path)
            .with_context(|| format!("Unable to load configuration {}", path.display()))?,
        None => Configuration::default(),
    };
    if args.solution_pool {
        configuration.use_solution_pool = true;
    }
    if args.time_limit.is_some() {
        configuration.time_limit = args.time_limit;
    }
    Ok(configuration)
}

fn run(args: &CliArgs) -> anyhow::Result<(PathBuf, PathBuf)> {
    let configuration = configuration(args)?;
    info!(
        data_dir = %args.data_dir.display(),
        solver = %configuration.solver,
        "Starting allocation"
    );
    let tables = read_tables(&args.data_dir)
        .with_context(|| format!("Unable to read input tables from {}", args.data_dir.display()))?;
    let mut solver = new_solver(configuration.solver)?;
    let report = run_allocation(&tables, &configuration, solver.as_mut())?;
    let paths = write_report(&report, &args.output_prefix).with_context(|| {
        format!(
            "Unable to write reports with prefix {}",
            args.output_prefix.display()
        )
    })?;
    Ok(paths)
}

fn print_written(allocations: &Path, slacks: &Path) {
    println!("Wrote allocations to {}", allocations.display());
    println!("Wrote constraint slacks to {}", slacks.display());
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            println!("{}", USAGE);
            return;
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            eprintln!();
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    logging::init();
    match run(&args) {
        Ok((allocations, slacks)) => print_written(&allocations, &slacks),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
