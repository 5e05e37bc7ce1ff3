use anyhow::Result;
use cfg_synth::arithmetic::Arithmetic;
use cfg_synth::Language;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::path::PathBuf;

use harness::{serve, Outcome, Searcher, Session, Strategy, Worker};

#[derive(Parser, Debug)]
#[command(name = "cfg-synth", version, about = "Grammar-driven program synthesis")]
struct Cli {
    /// Log every attempt and worker run
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search for a program reproducing a session's examples
    Search {
        /// Path to the .toml session
        session: PathBuf,
        /// Number of candidates to try
        #[arg(short, long)]
        attempts: Option<usize>,
        /// Seconds before a single run is killed
        #[arg(short, long)]
        timeout: Option<f64>,
        /// How candidates are drawn
        #[arg(short, long, value_enum)]
        strategy: Option<Strategy>,
        /// Seed for a reproducible search
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Interpret one job file and print its outputs
    #[command(hide = true)]
    Worker { job: PathBuf },
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let language = Arithmetic::new()?;

    match cli.command {
        // stdout belongs to the parent; no logging here
        Command::Worker { job } => {
            print!("{}", serve(&language, &job)?);
            Ok(())
        }
        Command::Search {
            session,
            attempts,
            timeout,
            strategy,
            seed,
        } => {
            init_logging(cli.verbose);
            let session = Session::load(&session)?;

            // flags override the session file
            let mut config = session.search.clone();
            if let Some(attempts) = attempts {
                config.attempts = attempts;
            }
            if let Some(timeout) = timeout {
                config.timeout = timeout;
            }
            if let Some(strategy) = strategy {
                config.strategy = strategy;
            }
            if seed.is_some() {
                config.seed = seed;
            }

            let mut program = session.program()?;
            let examples = session.examples()?;
            let mut searcher = Searcher::new(&language, config, Worker::current_exe()?)?;

            match searcher.search(&mut program, &examples)? {
                Outcome::Found { block, attempts } => {
                    println!(
                        "{} after {} attempt{}",
                        "found".green().bold(),
                        attempts,
                        if attempts == 1 { "" } else { "s" }
                    );
                    println!("{}", language.to_str(&block, &program));
                    println!("{}", language.pretty(&block, &program));
                }
                Outcome::Exhausted { attempts } => {
                    println!(
                        "{} no program matched in {} attempts",
                        "exhausted".red().bold(),
                        attempts
                    );
                }
            }
            Ok(())
        }
    }
}
