//! Stablepay CLI
//!
//! A terminal checkout counter for accepting stablecoin payments.

mod config;

use clap::Parser;
use config::{ConfigLoader, RecordConfig};
use rust_decimal::Decimal;
use stablepay_core::entities::PaymentStage;
use stablepay_core::entities::checkout::{CheckoutRequest, CustomerDetails, PaymentReceipt};
use stablepay_core::events::{CheckoutEvent, CheckoutState};
use stablepay_core::order::{Cart, LineItem, OrderSummary};
use stablepay_core::processors::{
    CheckoutHandle, CheckoutOrchestrator, CheckoutTiming, TokenConfig,
};
use stablepay_core::utils::format::{basescan_tx_url, short_hash};
use stablepay_sdk::client::{ClientError, IntegrationClient, RecordClient};
use stablepay_sdk::objects::record::{RecordMetadata, RecordPaymentRequest};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use uuid::Uuid;

/// Stablepay - stablecoin checkout counter for the terminal
#[derive(Parser, Debug)]
#[command(name = "stablepay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./stablepay.toml")]
    config: PathBuf,

    /// Override the payment service base URL
    #[arg(long, env = "STABLEPAY_API_BASE_URL")]
    api_base_url: Option<Url>,

    /// Charge a fixed USD amount instead of building an order
    #[arg(long, conflicts_with = "item")]
    amount: Option<Decimal>,

    /// Order line in NAME:PRICE[:QUANTITY] form; repeatable
    #[arg(long)]
    item: Vec<String>,

    /// Customer name
    #[arg(long)]
    name: String,

    /// Customer email
    #[arg(long)]
    email: String,

    /// Customer shipping address
    #[arg(long)]
    address: String,

    /// Payment intent identifier; generated when omitted
    #[arg(long)]
    payment_intent_id: Option<String>,

    /// Automatic retries after a failed payment session
    #[arg(long, default_value = "0")]
    retry_attempts: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting stablepay v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(&args.config, args.api_base_url.clone());
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Work out what the customer owes
    let (amount, summary) = order_total(&args)?;
    if let Some(summary) = &summary {
        println!("Subtotal  ${:.2}", summary.subtotal);
        println!("Shipping  ${:.2}", summary.shipping);
        println!("Tax       ${:.2}", summary.tax);
    }
    println!("Total     ${:.2}", amount);

    let payment_intent_id = args
        .payment_intent_id
        .clone()
        .unwrap_or_else(|| format!("pi_{}", Uuid::new_v4().simple()));

    let request = CheckoutRequest {
        amount,
        integration_id: config.api.integration_id.clone(),
        payment_intent_id,
        customer: CustomerDetails {
            name: args.name.clone(),
            email: args.email.clone(),
            address: args.address.clone(),
        },
    };

    // Start the checkout
    let gateway = Arc::new(IntegrationClient::new(config.api.base_url.clone()));
    let (orchestrator, handle) = CheckoutOrchestrator::with_config(
        gateway,
        request,
        TokenConfig::from(config.token.clone()),
        CheckoutTiming::default(),
    );
    let run = tokio::spawn(orchestrator.run());

    // Drive it from the terminal until it closes
    let receipt = drive_checkout(handle, args.retry_attempts).await;

    match receipt {
        Some(receipt) => {
            print_receipt(&receipt);
            if let Some(record) = &config.record {
                if let Err(e) = record_payment(record, &receipt).await {
                    tracing::error!("Failed to record settled payment: {}", e);
                }
            }
            run.await?;
            Ok(())
        }
        None => {
            run.await?;
            anyhow::bail!("checkout closed without settlement")
        }
    }
}

/// Work out the checkout total from the command line.
///
/// `--amount` charges a fixed total; `--item` lines build a cart whose
/// total includes flat shipping and tax.
fn order_total(args: &Args) -> anyhow::Result<(Decimal, Option<OrderSummary>)> {
    if let Some(amount) = args.amount {
        return Ok((amount, None));
    }
    if args.item.is_empty() {
        anyhow::bail!("either --amount or at least one --item is required");
    }

    let mut cart = Cart::new();
    for (index, raw) in args.item.iter().enumerate() {
        let (name, unit_price, quantity) = parse_item(raw).map_err(anyhow::Error::msg)?;
        let item = LineItem {
            id: format!("item-{index}"),
            name,
            unit_price,
        };
        cart.add(item, None, quantity);
    }

    let summary = OrderSummary::from_cart(&cart);
    Ok((summary.total, Some(summary)))
}

/// Parse one `--item` argument in NAME:PRICE[:QUANTITY] form.
fn parse_item(raw: &str) -> Result<(String, Decimal, u32), String> {
    let mut parts = raw.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(format!("item {raw:?} is missing a name"));
    }
    let price = parts
        .next()
        .ok_or_else(|| format!("item {raw:?} is missing a price"))?;
    let unit_price: Decimal = price
        .trim()
        .parse()
        .map_err(|_| format!("item {raw:?} has an unparseable price"))?;
    let quantity = match parts.next() {
        Some(quantity) => quantity
            .trim()
            .parse()
            .map_err(|_| format!("item {raw:?} has an unparseable quantity"))?,
        None => 1,
    };
    Ok((name.to_string(), unit_price, quantity))
}

/// Drive a running checkout from the terminal.
///
/// Renders state snapshots as they change, retries failed sessions while
/// attempts remain, and returns the receipt if the payment settled.
async fn drive_checkout(
    mut handle: CheckoutHandle,
    retry_attempts: u32,
) -> Option<PaymentReceipt> {
    let mut receipt = None;
    let mut retries_left = retry_attempts;
    let mut rendered = CheckoutState::default();
    let mut closing = false;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown, if !closing => {
                closing = true;
                handle.close().await;
            }

            event = handle.events.recv() => match event {
                Some(CheckoutEvent::PaymentCompleted(settled)) => receipt = Some(settled),
                Some(CheckoutEvent::Closed) | None => break,
            },

            changed = handle.state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = handle.state.borrow_and_update().clone();
                render_state(&rendered, &state);
                let failed = state.stage == PaymentStage::Failed;
                rendered = state;

                // A failed checkout publishes nothing further on its own, so
                // every observed Failed snapshot is a fresh failure to act on.
                if failed && !closing {
                    if retries_left > 0 {
                        retries_left -= 1;
                        tracing::info!("Retrying payment ({} attempts left)", retries_left);
                        handle.retry().await;
                    } else {
                        closing = true;
                        handle.close().await;
                    }
                }
            }
        }
    }

    receipt
}

/// Print the parts of the state that changed since the last snapshot.
fn render_state(previous: &CheckoutState, state: &CheckoutState) {
    if state.deposit_address != previous.deposit_address {
        if let Some(address) = &state.deposit_address {
            println!("Pay to {address}");
        }
    }
    if state.payment_uri != previous.payment_uri {
        if let Some(uri) = &state.payment_uri {
            println!("Transfer URI: {uri}");
        }
    }
    if state.stage != previous.stage {
        match state.stage {
            PaymentStage::Loading => {}
            PaymentStage::Pending => println!("Waiting for payment..."),
            PaymentStage::Processing => match &state.transaction_hash {
                Some(hash) => println!("Transaction {} is confirming...", short_hash(hash)),
                None => println!("Transaction submitted, confirming..."),
            },
            PaymentStage::Completed => println!("Payment confirmed"),
            PaymentStage::Failed => {
                let message = state.error.as_deref().unwrap_or("Payment failed.");
                println!("{message}");
            }
        }
    }
    if state.auto_close_in != previous.auto_close_in {
        if let Some(seconds) = state.auto_close_in {
            if seconds > 0 {
                println!("Closing in {seconds}s");
            }
        }
    }
}

/// Print the settled payment receipt.
fn print_receipt(receipt: &PaymentReceipt) {
    println!();
    println!("Payment settled");
    println!("  Amount       ${:.2}", receipt.amount);
    println!("  Transaction  {}", short_hash(&receipt.transaction_hash));
    println!("  Explorer     {}", basescan_tx_url(&receipt.transaction_hash));
}

/// Report a settled payment to the order backend.
async fn record_payment(
    config: &RecordConfig,
    receipt: &PaymentReceipt,
) -> Result<(), ClientError> {
    let client = RecordClient::new(config.base_url.clone());
    let request = RecordPaymentRequest {
        cpm_id: config.cpm_id.clone(),
        hash: receipt.transaction_hash.clone(),
        amount: receipt.amount,
        metadata: RecordMetadata {
            customer_name: receipt.customer.name.clone(),
            customer_email: receipt.customer.email.clone(),
            customer_address: receipt.customer.address.clone(),
            product_name: config.product_name.clone(),
        },
    };
    client.record_payment(&request).await?;
    tracing::info!("Settled payment recorded with {}", config.base_url);
    Ok(())
}

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_item_full_form() {
        let (name, price, quantity) = parse_item("Canvas Tote:29.99:2").unwrap();
        assert_eq!(name, "Canvas Tote");
        assert_eq!(price, Decimal::new(2999, 2));
        assert_eq!(quantity, 2);
    }

    #[test]
    fn test_parse_item_defaults_quantity_to_one() {
        let (_, _, quantity) = parse_item("Sticker Pack:4.99").unwrap();
        assert_eq!(quantity, 1);
    }

    #[test]
    fn test_parse_item_rejects_bad_lines() {
        assert!(parse_item("Tote:abc").is_err());
        assert!(parse_item("Tote").is_err());
        assert!(parse_item(":4.99").is_err());
        assert!(parse_item("Tote:29.99:many").is_err());
    }
}
