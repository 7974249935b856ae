//! Recurring transaction commands.

use super::{confirm, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::NaiveDate;
use tally_api::{Id, NewRecurringTransaction};

pub async fn recurring_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let items = ctx.client.list_recurring().await?;

    match format {
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No recurring transactions found");
                return Ok(());
            }
            println!("{:<6} {:>12} {:<10} {:<10} {}", "ID", "Amount", "Next", "Every", "Notes");
            output::print_divider(66);
            for item in &items {
                println!(
                    "{:<6} {:>12} {:<10} {:<10} {}",
                    item.id,
                    item.amount,
                    item.next_date,
                    item.frequency,
                    output::truncate(&item.notes, 30)
                );
            }
        }
        OutputFormat::Json => output::print_json(&items)?,
    }
    Ok(())
}

pub async fn recurring_create(
    ctx: &Context,
    account: Id,
    category: Id,
    amount: String,
    start_date: NaiveDate,
    notes: String,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let item = ctx
        .client
        .create_recurring(&NewRecurringTransaction {
            account,
            category,
            amount,
            notes,
            start_date,
        })
        .await?;

    match format {
        OutputFormat::Text => output::print_success(
            &format!("Recurring transaction created: {} (next {})", item.id, item.next_date),
            format,
        ),
        OutputFormat::Json => output::print_json(&item)?,
    }
    Ok(())
}

pub async fn recurring_delete(ctx: &Context, id: Id, yes: bool, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    if !yes && !confirm(&format!("Delete recurring transaction {}?", id)) {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    ctx.client.delete_recurring(id).await?;
    output::print_success(&format!("Recurring transaction {} deleted", id), format);
    Ok(())
}
