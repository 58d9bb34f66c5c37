use crate::demo::{run_demo, DemoArgs};
use crate::infra::run_seed_check;
use crate::server;
use clap::{Args, Parser, Subcommand};
use mentorhub::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "mentorhub",
    about = "Run the mentorship membership service or exercise its workflow from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Validate a catalog seed file against an empty store and print what it would create
    Seed(SeedArgs),
    /// Walk through apply, accept, remove and re-apply against an in-memory store
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Seed the catalog from this JSON file instead of APP_SEED_PATH
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct SeedArgs {
    /// JSON seed document to validate
    pub(crate) path: PathBuf,
    /// Print the summary as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seed(args) => run_seed_check(&args.path, args.json),
        Command::Demo(args) => run_demo(args),
    }
}
