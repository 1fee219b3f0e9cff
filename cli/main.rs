#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use fcclass::config::AnalysisConfig;
use fcclass::loader::DatasetDir;
use fcclass::pipeline::run_analysis;
use fcclass::report::{MultiReporter, SvgReporter, TsvReporter};

#[derive(Parser)]
#[command(
    name = "fcclass",
    about = "Group classification and learning curves for functional-connectivity datasets",
    long_about = "Extracts lower-triangle connectivity features per subject and compares SVC, \
                 LDA and ridge classifiers: learning curves across all groups and \
                 accuracy-vs-train-size curves for every pair of groups."
)]
struct Cli {
    /// Log per-split detail
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct RunArgs {
    /// Dataset directory holding subjects.tsv, regions.tsv and connectivity/
    #[arg(value_name = "DATASET_DIR")]
    dataset: PathBuf,

    /// TOML file overriding the default analysis settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output directory for figures, curves.tsv and report.toml
    #[arg(long, value_name = "DIR", default_value = "fcclass_out")]
    out: PathBuf,

    /// Skip SVG rendering
    #[arg(long)]
    no_plots: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis on a dataset directory
    #[command(about = "Run the analysis (outputs: <slug>.svg, curves.tsv, report.toml)")]
    Run(RunArgs),

    /// Print the default configuration
    #[command(about = "Print the default configuration as TOML")]
    Config,
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path.display());
            AnalysisConfig::load(path)?
        }
        None => AnalysisConfig::default(),
    };
    let dataset = DatasetDir::open(&args.dataset)?;

    fs::create_dir_all(&args.out)?;
    let mut reporter = MultiReporter::new().with(TsvReporter::create(args.out.join("curves.tsv"))?);
    if !args.no_plots {
        reporter = reporter.with(SvgReporter::new(&args.out)?);
    }

    let report = run_analysis(&dataset, &config, &mut reporter)?;
    let report_path = args.out.join("report.toml");
    report.save(&report_path)?;
    log::info!(
        "Wrote {} figure(s); summary in {}",
        report.figures.len(),
        report_path.display()
    );
    Ok(())
}

fn print_config() -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", AnalysisConfig::default().to_toml_string()?);
    Ok(())
}

fn main() {
    let Cli { verbose, command } = Cli::parse();

    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let result = match command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Config) => print_config(),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error>),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
