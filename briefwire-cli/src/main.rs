//! Main entry point for the Briefwire CLI.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::server::Config;
use std::{error::Error, path::PathBuf};

mod commands;

/// Briefwire CLI
#[derive(Parser)]
#[command(name = "briefwire")]
#[command(about = "Command-line client for Briefwire messaging and notifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Briefwire CLI
#[derive(Subcommand)]
enum Commands {
    /// Start the backend server
    Serve {
        /// The port number to bind the server to (e.g., 8080)
        #[arg(long, short)]
        port: u16,

        /// Path to the configuration file (optional)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },

    /// Manage the stored session token
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// List notifications and unread counts
    Inbox(commands::inbox::InboxArgs),

    /// Follow the live notification stream
    Watch(commands::watch::WatchArgs),

    /// Send a message into a conversation
    Send(commands::send::SendArgs),

    /// Advance a conversation read cursor
    Read(commands::send::ReadArgs),

    /// Mark notifications read or unread
    Mark(commands::mark::MarkArgs),
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Store the server origin and session token
    Login(commands::session::LoginArgs),
    /// Print the stored session
    Show,
    /// Remove the stored session
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    // The server installs its own subscriber from config.
    if !matches!(cli.command, Commands::Serve { .. }) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }

    match cli.command {
        Commands::Serve { port, config } => {
            let resolved_config = Config::load_config(config, Some(port))?;
            server::server::run(resolved_config).await?;
        }
        Commands::Session { command } => match command {
            SessionCommands::Login(args) => commands::session::login(&args)?,
            SessionCommands::Show => commands::session::show()?,
            SessionCommands::Logout => commands::session::logout()?,
        },
        Commands::Inbox(args) => commands::inbox::handle_inbox(args).await?,
        Commands::Watch(args) => commands::watch::handle_watch(args).await?,
        Commands::Send(args) => commands::send::handle_send(args).await?,
        Commands::Read(args) => commands::send::handle_read(args).await?,
        Commands::Mark(args) => commands::mark::handle_mark(args).await?,
    }

    Ok(())
}
