use clap::{Parser, Subcommand};
use grocerai::config::Config;
use grocerai::db::Database;
use grocerai::{logging, runtime};
use tracing::info;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "grocerai",
    version = VERSION,
    about = "GrocerAI grocery assistant API server"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<MainCommand>,
}

#[derive(Debug, Subcommand)]
enum MainCommand {
    /// Start the API server
    Start,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(MainCommand::Start) {
        MainCommand::Version => {
            println!("grocerai {VERSION}");
            Ok(())
        }
        MainCommand::Start => {
            let config = Config::load()?;
            let _log_guard = logging::init_logging(&config.data_dir)?;

            if !config.api_key_configured() {
                info!("GEMINI_API_KEY not configured; chat endpoints will return errors until it is set");
            }

            let db = Database::new(&config.data_dir)?;
            info!("grocerai {VERSION} starting");
            runtime::run(config, db).await
        }
    }
}
