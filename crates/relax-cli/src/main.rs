//! Command-line driver for the relax model checker.

use clap::{Parser, Subcommand};
use relax_rt::{CheckSummary, Params};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod programs;

#[derive(Debug, Error)]
enum CliError {
    #[error("unknown program '{0}'; run `relax list` for the available programs")]
    UnknownProgram(String),
}

#[derive(Parser)]
#[command(name = "relax", version)]
#[command(about = "Stateless model checker for C11-style relaxed atomics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a built-in litmus program under the checker
    Run {
        /// Program name (see `relax list`)
        #[arg(value_name = "PROGRAM")]
        program: String,

        /// Max consecutive stale-read selections before infeasibility (0 = unlimited)
        #[arg(long, default_value = "0", help_heading = "Exploration")]
        maxreads: u32,

        /// Promise expiration horizon in sequence numbers
        #[arg(long, default_value = "100", help_heading = "Exploration")]
        maxfuturedelay: u64,

        /// Cap on distinct future values sent to one read (0 disables promises)
        #[arg(long, default_value = "2", help_heading = "Exploration")]
        maxfuturevalues: u32,

        /// Only record a future value whose expiration beats an existing one by more than this
        #[arg(long, default_value = "4", help_heading = "Exploration")]
        expireslop: u64,

        /// Maximum sequence number per execution (0 = unlimited)
        #[arg(long, default_value = "0", help_heading = "Exploration")]
        bound: u64,

        /// Fairness window in scheduler decisions (0 = fairness off)
        #[arg(long, default_value = "0", help_heading = "Fairness")]
        fairwindow: u32,

        /// Force a thread enabled-but-unchosen this many times inside the window
        #[arg(long, default_value = "1", help_heading = "Fairness")]
        enabledcount: u32,

        /// Report level (-v counts, -vv full trace)
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,
    },

    /// List the built-in litmus programs
    List,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "relax_mc=info,relax_rt=info,relax=info",
        _ => "relax_mc=debug,relax_rt=debug,relax=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_summary(summary: &CheckSummary) {
    println!("{}", summary.stats);

    if !summary.outcomes.is_empty() {
        let mut seen: Vec<&Vec<u64>> = summary.outcomes.iter().collect();
        seen.sort();
        seen.dedup();
        println!("observed outcomes:");
        for o in seen {
            println!("  {:?}", o);
        }
    }

    if summary.found_bugs() {
        println!("bugs found:");
        for bug in &summary.bugs {
            println!("  {bug}");
        }
        if let Some(trace) = &summary.buggy_trace {
            println!("trace of first buggy execution:");
            for act in trace {
                println!("  {act}");
            }
        }
    }
}

fn run(cli: Cli) -> Result<bool, CliError> {
    match cli.command {
        Commands::List => {
            for (name, about) in programs::PROGRAMS {
                println!("{name:10} {about}");
            }
            Ok(false)
        }
        Commands::Run {
            program,
            maxreads,
            maxfuturedelay,
            maxfuturevalues,
            expireslop,
            bound,
            fairwindow,
            enabledcount,
            verbose,
        } => {
            init_tracing(verbose);
            let params = Params {
                maxreads,
                maxfuturedelay,
                maxfuturevalues,
                expireslop,
                fairwindow,
                enabledcount,
                bound,
                verbose,
            };
            let summary = programs::run(&program, params)
                .ok_or_else(|| CliError::UnknownProgram(program.clone()))?;
            print_summary(&summary);
            Ok(summary.found_bugs())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(false) => 0,
        Ok(true) => 1,
        Err(e) => {
            eprintln!("error: {e}");
            2
        }
    };
    std::process::exit(code);
}
