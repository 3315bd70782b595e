use std::process::ExitCode;

use board::config::Config;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count a leggy for a user from a Discord message link
    Register { user: String, message_url: String },

    /// Remove a leggy by its index
    Unregister { index: u64 },

    /// Load `count,user_id` rows from a CSV file or URL
    Seed { source: String },

    /// Post the leaderboard to a Discord channel
    Leaderboard {
        #[arg(long)]
        channel: Option<String>,

        /// Print the messages instead of sending them
        #[arg(long)]
        dry_run: bool,
    },
}

async fn run(args: Args) -> anyhow::Result<String> {
    let config = Config::load()?;
    let store = process::open_store(&config).await?;

    match args.command {
        Command::Register { user, message_url } => {
            process::register(&store, &user, &message_url).await
        }
        Command::Unregister { index } => process::unregister(&store, index).await,
        Command::Seed { source } => process::seed(&store, &source).await,
        Command::Leaderboard { channel, dry_run } => {
            process::leaderboard(&store, &config, channel, dry_run).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();

    match run(args).await {
        Ok(reply) => {
            println!("{reply}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
