//! CLI command implementations.

mod accounts;
mod analytics;
mod auth;
mod budgets;
mod categories;
mod recurring;
mod transactions;

pub use accounts::{accounts_create, accounts_delete, accounts_list, accounts_rename};
pub use analytics::{budget_progress, recent, spending, summary};
pub use auth::{change_password, login, logout, profile_update, register, status};
pub use budgets::{budgets_create, budgets_delete, budgets_list};
pub use categories::{categories_create, categories_delete, categories_list};
pub use recurring::{recurring_create, recurring_delete, recurring_list};
pub use transactions::{transactions_add, transactions_export, transactions_import, transactions_list};

use anyhow::Result;
use chrono::Datelike;
use std::io::{self, Write};
use std::sync::Arc;
use tally_api::FinanceClient;
use tally_auth::{AuthGateway, DataCache, QueryCache, SessionManager, UserProfile};
use tally_config_and_utils::{Config, Paths};
use tally_storage::{create_secret_store, SecretBackend};
use tracing::debug;

/// Everything a command needs: the session and the finance client, both
/// sharing one gateway and one cache.
pub struct Context {
    pub session: SessionManager,
    pub client: FinanceClient,
}

impl Context {
    pub fn new(config: &Config, paths: &Paths, backend: SecretBackend) -> Result<Self> {
        let store = create_secret_store(backend, paths)?;
        let gateway = Arc::new(AuthGateway::from_config(config, store)?);
        let cache: Arc<dyn DataCache> = Arc::new(QueryCache::new(config.cache_ttl()));

        Ok(Self {
            session: SessionManager::new(gateway.clone(), cache.clone()),
            client: FinanceClient::new(gateway, cache),
        })
    }

    /// Restore the stored session, if any.
    pub async fn bootstrap(&self) -> Result<Option<UserProfile>> {
        let session = self.session.bootstrap().await?;
        debug!(authenticated = session.is_authenticated(), "Session restored");
        Ok(session.user)
    }

    /// Restore the stored session or fail with a hint to log in.
    pub async fn require_user(&self) -> Result<UserProfile> {
        match self.bootstrap().await? {
            Some(user) => Ok(user),
            None => anyhow::bail!("Not logged in. Run 'tally login' first"),
        }
    }
}

/// Read one trimmed line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Use `given` if present, otherwise prompt for it. Empty input is an error.
fn value_or_prompt(given: Option<String>, label: &str, field: &str) -> Result<String> {
    let value = match given {
        Some(value) => value,
        None => prompt(label)?,
    };
    if value.is_empty() {
        anyhow::bail!("{} is required", field);
    }
    Ok(value)
}

fn read_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(label)?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Ask user for confirmation.
fn confirm(prompt_text: &str) -> bool {
    print!("{} [y/N] ", prompt_text);
    io::stdout().flush().ok();

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Year and month to report on, defaulting to the current month.
pub fn resolve_period(year: Option<i32>, month: Option<u32>) -> (i32, u32) {
    let today = chrono::Local::now().date_naive();
    (
        year.unwrap_or_else(|| today.year()),
        month.unwrap_or_else(|| today.month()),
    )
}
