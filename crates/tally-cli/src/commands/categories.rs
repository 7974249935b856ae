//! Category commands.

use super::{confirm, Context};
use crate::output::{self, OutputFormat};
use anyhow::Result;
use tally_api::{CategoryKind, Id, NewCategory};

/// List categories; `mine` limits the list to the user's own.
pub async fn categories_list(ctx: &Context, mine: bool, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    let categories = if mine {
        ctx.client.list_user_categories().await?
    } else {
        ctx.client.list_categories().await?
    };

    match format {
        OutputFormat::Text => {
            if categories.is_empty() {
                println!("No categories found");
                return Ok(());
            }
            println!("{:<6} {:<28} {:<8} {}", "ID", "Name", "Type", "Color");
            output::print_divider(56);
            for category in &categories {
                println!(
                    "{:<6} {:<28} {:<8} {}",
                    category.id,
                    output::truncate(&category.name, 28),
                    category.kind,
                    category.color
                );
            }
        }
        OutputFormat::Json => output::print_json(&categories)?,
    }
    Ok(())
}

pub async fn categories_create(
    ctx: &Context,
    name: String,
    kind: CategoryKind,
    color: String,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;
    let category = ctx
        .client
        .create_category(&NewCategory { name, kind, color })
        .await?;

    match format {
        OutputFormat::Text => output::print_success(
            &format!("Category created: {} ({})", category.name, category.id),
            format,
        ),
        OutputFormat::Json => output::print_json(&category)?,
    }
    Ok(())
}

pub async fn categories_delete(ctx: &Context, id: Id, yes: bool, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;
    if !yes && !confirm(&format!("Delete category {}?", id)) {
        output::print_success("Cancelled", format);
        return Ok(());
    }

    ctx.client.delete_category(id).await?;
    output::print_success(&format!("Category {} deleted", id), format);
    Ok(())
}
