//! Arcade CLI - command-line front end for the game storefront.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (the session is kept under ARCADE_STATE_DIR for 24 hours)
//! arcade auth login -e player@arcade.io -p hunter22
//!
//! # Browse and buy
//! arcade catalog list --search rally --category Racing
//! arcade cart add 3
//! arcade checkout
//!
//! # Interactive session with idle sign-out
//! arcade shell
//! ```
//!
//! # Commands
//!
//! - `auth` - Sign in, register, sign out, show the session
//! - `catalog` - Browse and manage catalog entries
//! - `cart` / `checkout` / `library` - Shopping
//! - `wallet` / `purchases` / `account` / `rate` - Account management
//! - `functions` - Serverless checkout and catalog sync
//! - `shell` - Interactive session

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arcade_storefront::{NoticeLog, Storefront, StorefrontConfig};

mod commands;
mod output;

use commands::{
    AccountAction, AuthAction, CartAction, CatalogAction, FunctionsAction, PurchasesAction,
    WalletAction,
};

#[derive(Parser)]
#[command(name = "arcade")]
#[command(author, version, about = "Arcade game storefront")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, register, sign out
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Browse and manage the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Buy everything in the cart
    Checkout,
    /// List owned games
    Library,
    /// Show or top up the wallet
    Wallet {
        #[command(subcommand)]
        action: WalletAction,
    },
    /// Purchase history and refunds
    Purchases {
        #[command(subcommand)]
        action: PurchasesAction,
    },
    /// Profile and password
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Rate an owned game from 0 to 5
    Rate {
        /// Game ID
        item: arcade_core::ItemId,
        /// Score, 0 to 5
        score: u8,
        /// Optional comment
        #[arg(short, long, default_value = "")]
        comment: String,
    },
    /// Serverless functions
    Functions {
        #[command(subcommand)]
        action: FunctionsAction,
    },
    /// Interactive session; signs out after the idle window
    Shell,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            output::failure(&format!("Invalid configuration: {e}"));
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arcade_storefront=info,arcade_cli=info".into());

    // ARCADE_LOG_JSON switches stderr logging to one JSON object per line
    let json_logs = std::env::var_os("ARCADE_LOG_JSON").is_some();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        output::failure(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let notices = Arc::new(NoticeLog::new());
    let store = Storefront::new(config, notices.clone())?;
    store.start().await;

    let result = match cli.command {
        Commands::Auth { action } => commands::auth(&store, action).await,
        Commands::Catalog { action } => commands::catalog(&store, action).await,
        Commands::Cart { action } => commands::cart(&store, action).await,
        Commands::Checkout => commands::checkout(&store).await,
        Commands::Library => commands::library(&store).await,
        Commands::Wallet { action } => commands::wallet(&store, action).await,
        Commands::Purchases { action } => commands::purchases(&store, action).await,
        Commands::Account { action } => commands::account(&store, action).await,
        Commands::Rate {
            item,
            score,
            comment,
        } => commands::rate(&store, item, score, &comment).await,
        Commands::Functions { action } => commands::functions(&store, action).await,
        Commands::Shell => commands::shell::run(&store, &notices).await,
    };

    output::notices(&notices.drain());
    result
}
