//! PickPack CLI - drive the storefront library against a live API.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! pickpack categories
//! pickpack products --keyword tea --limit 8
//!
//! # Work with the cart (guest cart until you log in)
//! pickpack cart add 42 --quantity 2 --check-stock
//! pickpack cart list
//!
//! # Log in; the guest cart is merged into your account cart
//! PICKPACK_PASSWORD=... pickpack login -e nimal@example.lk
//! pickpack wishlist add 42
//!
//! # Prepare a DirectPay checkout for the cart subtotal
//! pickpack pay prepare --email nimal@example.lk
//! ```
//!
//! State is kept under `PICKPACK_STORAGE_DIR` (default `.pickpack`):
//! `session/` for the login and `local/` for carts.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pickpack_storefront::Storefront;
use pickpack_storefront::config::StorefrontConfig;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[allow(clippy::print_stdout)]
mod commands;

#[derive(Parser)]
#[command(name = "pickpack")]
#[command(author, version, about = "PickPack storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List categories
    Categories,
    /// List products
    Products {
        /// Number of products to skip
        #[arg(long, default_value_t = 0)]
        offset: u32,

        /// Page size
        #[arg(short, long, default_value_t = 12)]
        limit: u32,

        /// Only products in this category
        #[arg(short, long)]
        category: Option<String>,

        /// Search keyword
        #[arg(short, long)]
        keyword: Option<String>,
    },
    /// Show one product
    Product {
        /// Product ID
        id: String,
    },
    /// Show stock levels
    Stock {
        /// Only this product
        id: Option<String>,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Manage the wishlist (requires login)
    Wishlist {
        #[command(subcommand)]
        action: commands::wishlist::WishlistAction,
    },
    /// Register a new customer
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(long, env = "PICKPACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log in
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(long, env = "PICKPACK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out (carts are kept)
    Logout,
    /// Show the logged-in user
    Whoami,
    /// DirectPay checkout
    Pay {
        #[command(subcommand)]
        action: commands::pay::PayAction,
    },
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
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pickpack_storefront=info,pickpack_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Storefront::open(config)?;

    match cli.command {
        Commands::Categories => commands::catalog::categories(&store).await,
        Commands::Products {
            offset,
            limit,
            category,
            keyword,
        } => {
            commands::catalog::products(&store, offset, limit, category, keyword.as_deref()).await
        }
        Commands::Product { id } => commands::catalog::product(&store, &id).await,
        Commands::Stock { id } => commands::catalog::stock(&store, id.as_deref()).await,
        Commands::Cart { action } => commands::cart::run(&store, action).await,
        Commands::Wishlist { action } => commands::wishlist::run(&store, action).await,
        Commands::Register {
            first_name,
            last_name,
            email,
            password,
        } => commands::account::register(&store, first_name, last_name, email, password).await,
        Commands::Login { email, password } => {
            commands::account::login(&store, &email, password).await
        }
        Commands::Logout => {
            commands::account::logout(&store).await;
            Ok(())
        }
        Commands::Whoami => {
            commands::account::whoami(&store);
            Ok(())
        }
        Commands::Pay { action } => commands::pay::run(&store, action),
    }
}
