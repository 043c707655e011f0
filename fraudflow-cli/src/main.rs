mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use commands::{list, plan, run, show, validate};

/// Environment variable holding the log filter
const LOG_ENV: &str = "FRAUDFLOW_LOG";

/// Run layered fraud detection pipelines over transaction files
#[derive(Parser, Debug)]
#[command(name = "fraudflow", version, about)]
struct Cli {
    /// Show debug logs (overridden by FRAUDFLOW_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline once over any new input
    Run(run::RunArgs),

    /// Check a pipeline definition without running it
    Validate(validate::ValidateArgs),

    /// Print the execution order grouped into levels
    Plan(plan::PlanArgs),

    /// List datasets and their materialized state
    List(list::ListArgs),

    /// Print rows of a materialized dataset as JSON lines
    Show(show::ShowArgs),
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => run::execute(args).await,
        Command::Validate(args) => validate::execute(args),
        Command::Plan(args) => plan::execute(args),
        Command::List(args) => list::execute(args),
        Command::Show(args) => show::execute(args),
    }
}
