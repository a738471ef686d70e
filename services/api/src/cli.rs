use crate::demo::{run_audit_export, run_demo, run_schema_check, AuditExportArgs, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use listing_intake::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Listing Intake",
    about = "Run the listing intake wizard and moderation service from the command line",
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
    /// Walk one listing through the wizard and moderation end to end
    Demo(DemoArgs),
    /// Inspect the shipped step schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Work with the moderation audit log
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Validate both schemas and print their step tables
    Check,
}

#[derive(Subcommand, Debug)]
enum AuditCommand {
    /// Export admin decisions from a snapshot file as CSV
    Export(AuditExportArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Mirror submissions to this JSON snapshot file
    #[arg(long)]
    pub(crate) data_path: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::Schema {
            command: SchemaCommand::Check,
        } => run_schema_check(),
        Command::Audit {
            command: AuditCommand::Export(args),
        } => run_audit_export(args),
    }
}
