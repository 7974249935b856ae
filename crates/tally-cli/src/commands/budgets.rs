//! Budget commands.

use super::{confirm, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use chrono::NaiveDate;
use tally_api::{BudgetInput, Id};

pub async fn budgets_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let budgets = ctx.client.list_budgets().await?;

    match format {
        OutputFormat::Text => {
            if budgets.is_empty() {
                println!("No budgets found");
                return Ok(());
            }
            println!("{:<6} {:<24} {:>12} {:<10} {:<10}", "ID", "Category", "Amount", "From", "To");
            output::print_divider(66);
            for budget in &budgets {
                let category = budget
                    .category_details
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| budget.category.to_string());
                println!(
                    "{:<6} {:<24} {:>12} {:<10} {:<10}",
                    budget.id,
                    output::truncate(&category, 24),
                    budget.amount,
                    budget.start_date,
                    budget.end_date
                );
            }
        }
        OutputFormat::Json => output::print_json(&budgets)?,
    }
    Ok(())
}

pub async fn budgets_create(
    ctx: &Context,
    category: Id,
    amount: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let budget = ctx
        .client
        .create_budget(&BudgetInput {
            category,
            amount,
            start_date,
            end_date,
        })
        .await?;

    match format {
        OutputFormat::Text => {
            output::print_success(&format!("Budget created: {}", budget.id), format)
        }
        OutputFormat::Json => output::print_json(&budget)?,
    }
    Ok(())
}

pub async fn budgets_delete(ctx: &Context, id: Id, yes: bool, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    if !yes && !confirm(&format!("Delete budget {}?", id)) {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    ctx.client.delete_budget(id).await?;
    output::print_success(&format!("Budget {} deleted", id), format);
    Ok(())
}
