//! Rigshop CLI - migrations, accounts and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run Postgres migrations (RIGSHOP_STORAGE=postgres)
//! rigshop-cli migrate
//!
//! # Create a back-office account
//! rigshop-cli users create -e admin@example.com -n "Shop Admin" -p 'long passphrase' -r admin
//!
//! # Load products, skipping names already in the catalog
//! rigshop-cli seed products -f crates/cli/seed/products.yaml
//! ```
//!
//! Every command works against the backend selected by `RIGSHOP_STORAGE`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rigshop-cli")]
#[command(author, version, about = "Rigshop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run Postgres migrations
    Migrate,
    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Load data into the store
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new account
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        name: String,

        /// Password (at least 8 characters)
        #[arg(short, long)]
        password: String,

        /// Role (`user`, `manager`, `admin`)
        #[arg(short, long, default_value = "user")]
        role: String,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Seed products from a YAML file
    Products {
        /// Path to the YAML file
        #[arg(short, long, default_value = "crates/cli/seed/products.yaml")]
        file: PathBuf,
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
        Commands::Users { action } => match action {
            UserAction::Create {
                email,
                name,
                password,
                role,
            } => {
                commands::users::create(&email, &name, &password, &role).await?;
            }
        },
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(&file).await?;
            }
        },
    }
    Ok(())
}
