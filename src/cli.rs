use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "hubdeck")]
#[command(about = "Local dashboard for remote AI applications", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $HUBDECK_CONFIG or config/hubdeck.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Supervise the worker and open the dashboard (default)
    Launch(LaunchArgs),
    /// Run the worker HTTP server in the foreground
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug, Default)]
pub struct LaunchArgs {
    /// Address the worker binds to
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Do not open the dashboard in a browser
    #[arg(long)]
    pub no_browser: bool,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_is_the_default() {
        let cli = Cli::parse_from(["hubdeck"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn serve_with_global_config() {
        let cli = Cli::parse_from([
            "hubdeck",
            "--config",
            "conf/hubdeck.toml",
            "serve",
            "--address",
            "127.0.0.1:9000",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("conf/hubdeck.toml")));
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.address, Some("127.0.0.1:9000".parse().unwrap()));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn launch_flags() {
        let cli = Cli::parse_from(["hubdeck", "launch", "--no-browser"]);
        match cli.command {
            Some(Commands::Launch(args)) => {
                assert!(args.no_browser);
                assert!(args.address.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
