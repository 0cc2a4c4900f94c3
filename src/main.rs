use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use jobmint::scan::{self, output, JobReport};
use jobmint::{ConfigQueryEngine, Intent, Outcome};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const EXIT_USAGE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "jobmint")]
#[command(about = "Query and rewrite build-job XML configurations", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MINT_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Print the config path next to each matching job
    #[arg(short, long, global = true, env = "MINT_VERBOSE", default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find jobs whose configuration matches an XPath query
    Find(FindArgs),

    /// Print the version
    Version,
}

#[derive(ClapArgs, Debug)]
struct FindArgs {
    /// XPath 1.0 query, evaluated with the root element as context
    #[arg(long, env = "MINT_XPATH")]
    xpath: String,

    /// Replace the value of every matched node and write the rewritten config
    #[arg(long)]
    set: Option<String>,

    /// Overwrite the source files instead of writing new ones
    #[arg(long, requires = "set")]
    in_place: bool,

    /// Where rewritten configs are written; ignored with --in-place
    #[arg(long, env = "MINT_OUTPUT_FOLDER", default_value = ".")]
    output_folder: PathBuf,

    /// Evaluate jobs on all cores
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Config files, or directories holding them
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Logging goes to stderr; stdout carries the job list
    let lvl = args.log_level.parse::<Level>().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(lvl)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.cmd {
        Command::Find(find) => cmd_find(&find, args.verbose),
        Command::Version => {
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_find(args: &FindArgs, verbose: bool) -> Result<ExitCode> {
    if args.xpath.trim().is_empty() {
        eprintln!("error: --xpath must not be empty");
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    let sources = scan::discover(&args.paths).context("failed to collect job configs")?;
    if sources.is_empty() {
        eprintln!("error: no job configs found");
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    let engine = ConfigQueryEngine::new();
    // Fail fast on a broken query instead of once per job
    engine
        .compile(&args.xpath)
        .with_context(|| format!("invalid query {:?}", args.xpath))?;

    let intent = match &args.set {
        Some(value) => Intent::MatchAndMutate(value.clone()),
        None => Intent::MatchOnly,
    };

    let reports = scan::run(&engine, &sources, &args.xpath, &intent, args.parallel);
    for report in reports {
        let JobReport { source, result } = report;
        let Ok(outcome) = result else {
            continue;
        };
        if !outcome.is_match() {
            continue;
        }

        if verbose {
            println!("{} - {}", source.job, source.path.display());
        } else {
            println!("{}", source.job);
        }

        if let Outcome::Rewritten(doc) = outcome {
            if let Err(err) = store(args, &source.job, &source.path, &doc) {
                warn!(job = %source.job, "error writing config: {err}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn store(args: &FindArgs, job: &str, path: &Path, doc: &str) -> Result<()> {
    if args.in_place {
        output::overwrite(path, doc)?;
        info!(job, path = %path.display(), "rewrote config in place");
    } else {
        let written = output::write_config(&args.output_folder, job, doc)?;
        info!(job, path = %written.display(), "wrote config");
    }
    Ok(())
}
