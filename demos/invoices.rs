//! Invoice walkthrough against a real organisation
//!
//! Reads `XERO_*` variables (or `.env`), creates a draft invoice, fetches it
//! back, saves its PDF and marks it deleted.
//!
//!     RUST_LOG=info cargo run --example invoices

use serde_json::json;
use xero_accounting::api::ResilienceProfile;
use xero_accounting::{AccountingApiClient, ClientConfig, Filter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = ClientConfig::from_env()?.with_resilience(ResilienceProfile::Conservative);
    let client = AccountingApiClient::new(config)?;

    let created = client
        .invoices
        .create(&[json!({
            "Type": "ACCREC",
            "Contact": { "Name": "Demo Customer" },
            "LineItems": [{
                "Description": "Consulting",
                "Quantity": 2,
                "UnitAmount": 150.0,
                "AccountCode": "200"
            }]
        })])
        .await?;

    for (index, record) in created.rejected() {
        for error in record.validation_errors() {
            eprintln!("invoice {} rejected: {}", index, error.message);
        }
    }
    let Some(invoice_id) = created
        .first()
        .filter(|record| !record.has_errors())
        .and_then(|record| record.entity.get_str("InvoiceID"))
        .map(str::to_string)
    else {
        anyhow::bail!("invoice was not created");
    };
    println!("Created invoice {}", invoice_id);

    let fetched = client.invoices.get(&Filter::by_id(&invoice_id)).await?;
    if let Some(record) = fetched.first() {
        println!(
            "{} is {}",
            record.entity.get_str("InvoiceNumber").unwrap_or("?"),
            record.entity.get_str("Status").unwrap_or("?")
        );
    }

    let destination = std::env::temp_dir().join(format!("{}.pdf", invoice_id));
    client.invoices.save_pdf(&Filter::by_id(&invoice_id), &destination).await?;
    println!("PDF saved to {}", destination.display());

    client
        .invoices
        .update_multiple(&[json!({ "InvoiceID": invoice_id, "Status": "DELETED" })])
        .await?;
    println!("Invoice marked deleted");

    let stats = client.rate_limiter_stats();
    println!("{} requests sent, {} waited for the rate limiter", stats.requests_made, stats.requests_delayed);

    Ok(())
}
