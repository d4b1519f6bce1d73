use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use invocr::{config, poster::InvoicePoster};

#[derive(Parser)]
#[command(
    name = "invoice-post",
    about = "Submit a generated XML invoice to the CCC claims API"
)]
struct Cli {
    /// Estimate identifier the invoice attaches to.
    #[arg(long)]
    estimate_id: String,
    /// Path to the XML invoice payload.
    #[arg(long)]
    xml: PathBuf,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    config::init_config();

    let payload = std::fs::read_to_string(&cli.xml)
        .with_context(|| format!("failed to read invoice XML at {}", cli.xml.display()))?;

    let poster = InvoicePoster::new().context("failed to build CCC poster")?;
    poster
        .post_invoice(&cli.estimate_id, payload)
        .await
        .with_context(|| format!("failed to post invoice for estimate {}", cli.estimate_id))?;

    println!("Invoice for estimate {} accepted", cli.estimate_id);
    Ok(())
}
