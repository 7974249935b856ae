//! Transaction commands, including CSV import and export.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use std::path::Path;
use tally_api::{Id, NewTransaction, Transaction};

/// List transactions, newest first, optionally only the last `limit`.
pub async fn transactions_list(
    ctx: &Context,
    limit: Option<usize>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let mut transactions = ctx.client.list_transactions().await?;
    transactions.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
    if let Some(limit) = limit {
        transactions.truncate(limit);
    }

    match format {
        OutputFormat::Text => print_table(&transactions),
        OutputFormat::Json => output::print_json(&transactions)?,
    }
    Ok(())
}

pub(super) fn print_table(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions found");
        return;
    }
    println!("{:<6} {:<10} {:>12} {:<20} {}", "ID", "Date", "Amount", "Category", "Notes");
    output::print_divider(80);
    for tx in transactions {
        println!(
            "{:<6} {:<10} {:>12} {:<20} {}",
            tx.id,
            tx.date,
            tx.amount,
            output::truncate(tx.category_name.as_deref().unwrap_or("-"), 20),
            output::truncate(&tx.notes, 30)
        );
    }
}

/// Record a transaction. Negative amounts are expenses.
pub async fn transactions_add(
    ctx: &Context,
    account: Id,
    amount: String,
    category: Option<Id>,
    date: Option<NaiveDate>,
    notes: String,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let date = date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let tx = ctx
        .client
        .create_transaction(&NewTransaction {
            account,
            category,
            amount,
            date,
            notes,
        })
        .await?;

    match format {
        OutputFormat::Text => output::print_success(
            &format!("Transaction recorded: {} ({} on {})", tx.id, tx.amount, tx.date),
            format,
        ),
        OutputFormat::Json => output::print_json(&tx)?,
    }
    Ok(())
}

/// Upload a CSV file of transactions.
pub async fn transactions_import(ctx: &Context, path: &Path, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let csv = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("transactions.csv");

    let result = ctx.client.import_transactions_csv(file_name, csv).await?;

    match format {
        OutputFormat::Text => {
            output::print_success(&format!("Imported {}", path.display()), format)
        }
        OutputFormat::Json => output::print_json(&result)?,
    }
    Ok(())
}

/// Download all transactions as CSV to `path`, or stdout when absent.
pub async fn transactions_export(
    ctx: &Context,
    path: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let csv = ctx.client.export_transactions_csv().await?;

    match path {
        Some(path) => {
            std::fs::write(path, csv.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::print_success(&format!("Exported to {}", path.display()), format);
        }
        None => print!("{}", csv),
    }
    Ok(())
}
