//! Retail cart CLI - Drive a cart session from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show (or create) the cart for a shopper
//! retail-cart --username alice show
//!
//! # Add two units of a product
//! retail-cart --username alice add p1 --price 19.99 --quantity 2 --name "Trail Runner"
//!
//! # Attribute the add to a recommendation experiment
//! retail-cart add p1 --price 19.99 --feature home_product_recs --experiment exp-7 --variant B
//!
//! # Change or remove a line
//! retail-cart set-quantity p1 5
//! retail-cart remove p1
//!
//! # Forget the stored cart ID
//! retail-cart reset
//! ```
//!
//! # Environment Variables
//!
//! - `CARTS_SERVICE_URL` - Base URL of the carts service (required)
//! - `CARTS_API_TOKEN` - Bearer token for the carts service
//! - `ANALYTICS_ENDPOINT` / `ANALYTICS_WRITE_KEY` - Event collector
//! - `CART_STATE_FILE` - Where the cart ID is kept between runs
//! - `SENTRY_DSN` / `SENTRY_ENVIRONMENT` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use retail_cart_client::CartSession;
use retail_cart_client::config::CartConfig;
use retail_cart_core::{Experiment, Product, ProductId, User};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "retail-cart")]
#[command(author, version, about = "Retail storefront cart session")]
struct Cli {
    /// Shopper user ID
    #[arg(long, global = true, default_value = "guest")]
    user_id: String,

    /// Shopper username sent to the carts service
    #[arg(long, global = true, default_value = "guest")]
    username: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current cart, creating one if needed
    Show,
    /// Add a product to the cart
    Add {
        /// Product ID
        product: String,

        /// Unit price
        #[arg(long)]
        price: Decimal,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Product display name
        #[arg(long)]
        name: Option<String>,

        /// UI feature the add came from
        #[arg(long)]
        feature: Option<String>,

        /// Experiment ID for attribution
        #[arg(long, requires = "variant")]
        experiment: Option<String>,

        /// Experiment variant
        #[arg(long, requires = "experiment")]
        variant: Option<String>,

        /// Skip the confirmation dialog
        #[arg(short, long)]
        yes: bool,
    },
    /// Set a product's quantity (0 removes it)
    SetQuantity {
        /// Product ID
        product: String,
        /// New quantity
        quantity: u32,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        product: String,
    },
    /// Forget the stored cart ID
    Reset,
}

/// Initialize Sentry error tracking when a DSN is configured.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
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

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "retail_cart_client=info,retail_cart_cli=info".into());

    let config = match CartConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(env_filter).init();
            tracing::error!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the subscriber
    let _sentry_guard = init_sentry(&config);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    let user = User::new(cli.user_id, cli.username);
    let interactive = !matches!(cli.command, Commands::Add { yes: true, .. });
    let mut session = commands::cart::session(config, interactive)?;

    let result = dispatch(cli.command, &mut session, &user).await;
    session.flush_analytics().await;
    result
}

async fn dispatch(
    command: Commands,
    session: &mut CartSession,
    user: &User,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Show => commands::cart::show(session, user).await?,
        Commands::Add {
            product,
            price,
            quantity,
            name,
            feature,
            experiment,
            variant,
            yes: _,
        } => {
            let mut product = Product::new(product, price);
            if let Some(name) = name {
                product = product.with_name(name);
            }
            let experiment = experiment
                .zip(variant)
                .map(|(id, variant)| Experiment { id, variant });

            commands::cart::add(
                session,
                user,
                &product,
                quantity,
                feature.as_deref(),
                experiment.as_ref(),
            )
            .await?;
        }
        Commands::SetQuantity { product, quantity } => {
            commands::cart::set_quantity(session, user, &ProductId::new(product), quantity)
                .await?;
        }
        Commands::Remove { product } => {
            commands::cart::remove(session, user, &ProductId::new(product)).await?;
        }
        Commands::Reset => commands::cart::reset(session).await?,
    }
    Ok(())
}
