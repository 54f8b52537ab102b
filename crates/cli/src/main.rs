//! Prizey CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! prizey-cli migrate
//!
//! # Create a credential user
//! prizey-cli user create -e ana@example.com -p 'correct horse' -n "Ana"
//!
//! # Run a marketplace search and save the results
//! prizey-cli search "electric kettle"
//! ```
//!
//! # Environment Variables
//!
//! - `PRIZEY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `APIFY_TOKEN` and the other `APIFY_*` settings - for `search`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "prizey-cli")]
#[command(author, version, about = "Prizey CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Search the marketplace and save what is found
    Search {
        /// Search terms
        query: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user with email and password
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::User { action } => match action {
            UserAction::Create {
                email,
                password,
                name,
            } => {
                commands::user::create(&email, &password, name).await?;
            }
        },
        Commands::Search { query } => commands::search::run(&query).await?,
    }
    Ok(())
}
