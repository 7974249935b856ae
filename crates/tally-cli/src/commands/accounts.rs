//! Account commands.

use super::{confirm, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use tally_api::{AccountType, AccountUpdate, Id, NewAccount};

/// List accounts with their balances.
pub async fn accounts_list(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let accounts = ctx.client.list_accounts().await?;

    match format {
        OutputFormat::Text => {
            if accounts.is_empty() {
                println!("No accounts found");
                return Ok(());
            }
            println!("{:<6} {:<28} {:<8} {:>14} {}", "ID", "Name", "Type", "Balance", "Currency");
            output::print_divider(66);
            for account in &accounts {
                println!(
                    "{:<6} {:<28} {:<8} {:>14} {}",
                    account.id,
                    output::truncate(&account.name, 28),
                    account.account_type,
                    account.balance,
                    account.currency.as_deref().unwrap_or("-")
                );
            }
        }
        OutputFormat::Json => output::print_json(&accounts)?,
    }
    Ok(())
}

pub async fn accounts_create(
    ctx: &Context,
    name: String,
    account_type: AccountType,
    currency: Option<String>,
    balance: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let account = ctx
        .client
        .create_account(&NewAccount {
            name,
            account_type,
            currency,
            balance,
        })
        .await?;

    match format {
        OutputFormat::Text => output::print_success(
            &format!("Account created: {} ({})", account.name, account.id),
            format,
        ),
        OutputFormat::Json => output::print_json(&account)?,
    }
    Ok(())
}

pub async fn accounts_rename(ctx: &Context, id: Id, name: String, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let account = ctx
        .client
        .update_account(
            id,
            &AccountUpdate {
                name: Some(name),
                ..Default::default()
            },
        )
        .await?;

    output::print_success(&format!("Account {} renamed to {}", account.id, account.name), format);
    Ok(())
}

pub async fn accounts_delete(ctx: &Context, id: Id, yes: bool, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    if !yes && !confirm(&format!("Delete account {} and its transactions?", id)) {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    ctx.client.delete_account(id).await?;
    output::print_success(&format!("Account {} deleted", id), format);
    Ok(())
}
