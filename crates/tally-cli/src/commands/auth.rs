//! Authentication and profile commands.

use super::{prompt, read_password, value_or_prompt, Context};
use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use std::path::Path;
use tally_api::{AvatarUpload, ChangePassword, ProfileUpdate};
use tally_auth::AuthError;

/// Login with username and password.
pub async fn login(ctx: &Context, username: Option<String>, format: &OutputFormat) -> Result<()> {
    if let Some(user) = ctx.bootstrap().await? {
        if username.as_deref().map_or(true, |u| u == user.username) {
            output::print_success(&format!("Already logged in as {}", user.username), format);
            return Ok(());
        }
        // Switching accounts.
        ctx.session.sign_out().await?;
    }

    let username = value_or_prompt(username, "Username: ", "Username")?;
    let password = read_password("Password: ")?;

    match ctx.session.sign_in(&username, &password).await {
        Ok(user) => {
            output::print_success(&format!("Logged in as {}", user.username), format);
            Ok(())
        }
        Err(AuthError::InvalidCredentials) => {
            anyhow::bail!("Login failed: invalid username or password")
        }
        Err(e) => Err(e).context("Login failed"),
    }
}

/// Create an account and log in to it.
pub async fn register(
    ctx: &Context,
    username: Option<String>,
    email: Option<String>,
    format: &OutputFormat,
) -> Result<()> {
    if let Some(user) = ctx.bootstrap().await? {
        anyhow::bail!(
            "Logged in as {}. Run 'tally logout' before registering",
            user.username
        );
    }

    let username = value_or_prompt(username, "Username: ", "Username")?;
    let email = value_or_prompt(email, "Email: ", "Email")?;
    let password = read_password("Password: ")?;
    let confirm = read_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }

    match ctx.session.register(&username, &email, &password).await {
        Ok(user) => {
            output::print_success(
                &format!("Registered and logged in as {}", user.username),
                format,
            );
            Ok(())
        }
        Err(AuthError::Validation { body, .. }) => {
            anyhow::bail!("Registration rejected: {}", field_errors(&body))
        }
        Err(e) => Err(e).context("Registration failed"),
    }
}

/// Logout and clear the stored session.
pub async fn logout(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.bootstrap().await?;
    ctx.session.sign_out().await?;
    output::print_success("Logged out successfully", format);
    Ok(())
}

/// Show who is logged in.
pub async fn status(ctx: &Context, format: &OutputFormat) -> Result<()> {
    let user = ctx.bootstrap().await?;

    match format {
        OutputFormat::Text => match &user {
            Some(user) => {
                println!("Auth:     logged in");
                println!("Username: {}", user.username);
                if !user.email.is_empty() {
                    println!("Email:    {}", user.email);
                }
                if let Some(avatar) = &user.avatar {
                    println!("Avatar:   {}", avatar);
                }
            }
            None => println!("Auth:     not logged in"),
        },
        OutputFormat::Json => {
            output::print_json(&serde_json::json!({
                "logged_in": user.is_some(),
                "user": user,
            }))?;
        }
    }

    Ok(())
}

/// Change the password of the logged-in user.
pub async fn change_password(ctx: &Context, format: &OutputFormat) -> Result<()> {
    ctx.require_user().await?;

    let change = ChangePassword {
        old_password: read_password("Current password: ")?,
        new_password: read_password("New password: ")?,
        new_password_confirm: read_password("Confirm new password: ")?,
    };
    ctx.client.change_password(&change).await?;

    output::print_success("Password changed", format);
    Ok(())
}

/// Update username and/or avatar.
pub async fn profile_update(
    ctx: &Context,
    username: Option<String>,
    avatar: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    ctx.require_user().await?;

    let avatar = match avatar {
        Some(path) => Some(read_avatar(path)?),
        None => None,
    };
    let username = match username {
        Some(name) => Some(name),
        None if avatar.is_none() => Some(prompt("New username: ")?).filter(|s| !s.is_empty()),
        None => None,
    };

    let profile = ctx
        .client
        .update_profile(&ProfileUpdate { username, avatar })
        .await?;

    match format {
        OutputFormat::Text => {
            output::print_success(&format!("Profile updated: {}", profile.username), format)
        }
        OutputFormat::Json => output::print_json(&profile)?,
    }
    Ok(())
}

fn read_avatar(path: &Path) -> Result<AvatarUpload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("avatar")
        .to_string();
    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    Ok(AvatarUpload {
        file_name,
        mime: mime.to_string(),
        bytes,
    })
}

/// Flatten `{"field": ["message", ...]}` into one line.
fn field_errors(body: &serde_json::Value) -> String {
    match body.as_object() {
        Some(fields) if !fields.is_empty() => fields
            .iter()
            .map(|(field, messages)| {
                let text = match messages {
                    serde_json::Value::Array(items) => items
                        .iter()
                        .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
                        .collect::<Vec<_>>()
                        .join(" "),
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("{}: {}", field, text)
            })
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.to_string(),
    }
}
