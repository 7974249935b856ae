//! Dashboard commands.

use super::{resolve_period, transactions, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// Balance plus income and expenses for one month.
pub async fn summary(
    ctx: &Context,
    year: Option<i32>,
    month: Option<u32>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let (year, month) = resolve_period(year, month);
    let summary = ctx.client.dashboard_summary(year, month).await?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Summary for {}-{:02}", year, month));
            output::print_row("Total balance", &summary.total_balance);
            output::print_row("Income", &summary.monthly_income);
            output::print_row("Expenses", &summary.monthly_expenses);
        }
        OutputFormat::Json => output::print_json(&summary)?,
    }
    Ok(())
}

pub async fn spending(
    ctx: &Context,
    year: Option<i32>,
    month: Option<u32>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let (year, month) = resolve_period(year, month);
    let slices = ctx.client.spending_by_category(year, month).await?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Spending by category, {}-{:02}", year, month));
            if slices.is_empty() {
                println!("No spending recorded");
            }
            for slice in &slices {
                output::print_row(&output::truncate(&slice.name, 16), &slice.amount);
            }
        }
        OutputFormat::Json => output::print_json(&slices)?,
    }
    Ok(())
}

pub async fn budget_progress(
    ctx: &Context,
    year: Option<i32>,
    month: Option<u32>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let (year, month) = resolve_period(year, month);
    let budgets = ctx.client.budget_progress(year, month).await?;

    match format {
        OutputFormat::Text => {
            output::print_heading(&format!("Budget progress, {}-{:02}", year, month));
            if budgets.is_empty() {
                println!("No budgets for this month");
            }
            for budget in &budgets {
                let name = budget
                    .category_details
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| budget.category.to_string());
                let spent = budget.spent.as_deref().unwrap_or("0");
                output::print_row(
                    &output::truncate(&name, 16),
                    &format!("{} of {}", spent, budget.amount),
                );
            }
        }
        OutputFormat::Json => output::print_json(&budgets)?,
    }
    Ok(())
}

pub async fn recent(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let recent = ctx.client.recent_transactions().await?;

    match format {
        OutputFormat::Text => transactions::print_table(&recent),
        OutputFormat::Json => output::print_json(&recent)?,
    }
    Ok(())
}
