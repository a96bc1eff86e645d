mod cli;

use clap::Parser;
use cli::{Cli, Commands, LaunchArgs};
use tracing::info;

use hubdeck::config::Config;
use hubdeck::{api, observability, supervisor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    observability::init_tracing("info");

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };

    match cli.command.unwrap_or(Commands::Launch(LaunchArgs::default())) {
        Commands::Launch(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }
            if args.no_browser {
                config.supervisor.open_browser = false;
            }

            let outcome = supervisor::run(&config, cli.config).await?;
            info!(?outcome, "Supervisor finished");
            std::process::exit(outcome.exit_code());
        }
        Commands::Serve(args) => {
            if let Some(address) = args.address {
                config.server.bind_addr = address;
            }

            let signal = api::run(config).await?;
            info!(%signal, code = signal.code(), "Worker exiting");
            std::process::exit(signal.code());
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
