use crate::demo::{run_demo, run_reconcile, DemoArgs, ReconcileArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mentorship::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Alumni Mentorship",
    about = "Run the alumni mentorship service or walk through its workflow from the command line",
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
    /// Run an end-to-end demo: publish an offer, apply, approve, and schedule
    Demo(DemoArgs),
    /// Recount applicant counters against stored applications and repair drift
    Reconcile(ReconcileArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override DATABASE_URL (sqlite: URLs only)
    #[arg(long)]
    pub(crate) database_url: Option<String>,
    /// Load the demo member roster into the sqlite directory (always loaded in memory)
    #[arg(long)]
    pub(crate) seed_members: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Reconcile(args) => run_reconcile(args).await,
    }
}
