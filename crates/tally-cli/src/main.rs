//! Tally CLI - Command-line interface for the Tally finance API.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tally_api::{AccountType, ApiError, CategoryKind, Id};
use tally_auth::AuthError;
use tally_config_and_utils::{init_logging, Config, LogConfig, Paths};
use tally_storage::SecretBackend;
use tracing::debug;

/// Tally CLI - Track accounts, transactions and budgets.
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Tally CLI for personal finance")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Where tokens are kept
    #[arg(long, default_value = "platform", global = true, env = "TALLY_SECRET_BACKEND")]
    secrets: SecretsArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SecretsArg {
    /// OS keychain, falling back to the credentials file
    Platform,
    /// Credentials file under the Tally home directory
    File,
    /// Nothing persisted between runs
    Memory,
}

impl From<SecretsArg> for SecretBackend {
    fn from(arg: SecretsArg) -> Self {
        match arg {
            SecretsArg::Platform => SecretBackend::Platform,
            SecretsArg::File => SecretBackend::File,
            SecretsArg::Memory => SecretBackend::Memory,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username and password
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Logout and clear stored tokens
    Logout,

    /// Check authentication status
    Status,

    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Manage accounts
    Accounts {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Manage transactions
    Transactions {
        #[command(subcommand)]
        command: TransactionCommands,
    },

    /// Manage categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Manage budgets
    Budgets {
        #[command(subcommand)]
        command: BudgetCommands,
    },

    /// Manage recurring transactions
    Recurring {
        #[command(subcommand)]
        command: RecurringCommands,
    },

    /// Monthly balance, income and expenses
    Summary {
        #[command(flatten)]
        period: Period,
    },

    /// Monthly spending per category
    Spending {
        #[command(flatten)]
        period: Period,
    },

    /// Budget usage for a month
    Progress {
        #[command(flatten)]
        period: Period,
    },

    /// Most recent transactions
    Recent,
}

/// Month to report on; defaults to the current one.
#[derive(clap::Args)]
struct Period {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Change username and/or avatar
    Update {
        #[arg(short, long)]
        username: Option<String>,
        /// Image file to use as avatar
        #[arg(short, long)]
        avatar: Option<PathBuf>,
    },
    /// Change password
    Password,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List accounts
    List,
    /// Create an account
    Create {
        name: String,
        #[arg(short = 't', long = "type", value_enum, default_value = "bank")]
        account_type: AccountTypeArg,
        #[arg(short, long)]
        currency: Option<String>,
        /// Opening balance
        #[arg(short, long)]
        balance: Option<String>,
    },
    /// Rename an account
    Rename { id: Id, name: String },
    /// Delete an account
    Delete {
        id: Id,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AccountTypeArg {
    Bank,
    Cash,
    Credit,
}

impl From<AccountTypeArg> for AccountType {
    fn from(arg: AccountTypeArg) -> Self {
        match arg {
            AccountTypeArg::Bank => AccountType::Bank,
            AccountTypeArg::Cash => AccountType::Cash,
            AccountTypeArg::Credit => AccountType::Credit,
        }
    }
}

#[derive(Subcommand)]
enum TransactionCommands {
    /// List transactions, newest first
    List {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Record a transaction (negative amount for an expense)
    Add {
        #[arg(short, long)]
        account: Id,
        #[arg(allow_negative_numbers = true)]
        amount: String,
        #[arg(short, long)]
        category: Option<Id>,
        /// YYYY-MM-DD, defaults to today
        #[arg(short, long)]
        date: Option<chrono::NaiveDate>,
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Import transactions from a CSV file
    Import { path: PathBuf },
    /// Export all transactions as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// List categories
    List {
        /// Only categories you created
        #[arg(long)]
        mine: bool,
    },
    /// Create a category
    Create {
        name: String,
        #[arg(short = 't', long = "type", value_enum)]
        kind: CategoryKindArg,
        #[arg(short, long, default_value = "#9e9e9e")]
        color: String,
    },
    /// Delete a category
    Delete {
        id: Id,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryKindArg {
    Income,
    Expense,
}

impl From<CategoryKindArg> for CategoryKind {
    fn from(arg: CategoryKindArg) -> Self {
        match arg {
            CategoryKindArg::Income => CategoryKind::Income,
            CategoryKindArg::Expense => CategoryKind::Expense,
        }
    }
}

#[derive(Subcommand)]
enum BudgetCommands {
    /// List budgets
    List,
    /// Create a budget for a category and date range
    Create {
        #[arg(short, long)]
        category: Id,
        amount: String,
        #[arg(long)]
        from: chrono::NaiveDate,
        #[arg(long)]
        to: chrono::NaiveDate,
    },
    /// Delete a budget
    Delete {
        id: Id,
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum RecurringCommands {
    /// List recurring transactions
    List,
    /// Create a monthly recurring transaction
    Create {
        #[arg(short, long)]
        account: Id,
        #[arg(short, long)]
        category: Id,
        #[arg(allow_negative_numbers = true)]
        amount: String,
        /// First occurrence, YYYY-MM-DD
        #[arg(short, long)]
        start: chrono::NaiveDate,
        #[arg(short, long, default_value = "")]
        notes: String,
    },
    /// Delete a recurring transaction
    Delete {
        id: Id,
        #[arg(short, long)]
        yes: bool,
    },
}

async fn run(cli: Cli, ctx: &commands::Context) -> anyhow::Result<()> {
    let format = &cli.format;
    match cli.command {
        Commands::Login { username } => commands::login(ctx, username, format).await,
        Commands::Register { username, email } => {
            commands::register(ctx, username, email, format).await
        }
        Commands::Logout => commands::logout(ctx, format).await,
        Commands::Status => commands::status(ctx, format).await,
        Commands::Profile { command } => match command {
            ProfileCommands::Update { username, avatar } => {
                commands::profile_update(ctx, username, avatar.as_deref(), format).await
            }
            ProfileCommands::Password => commands::change_password(ctx, format).await,
        },
        Commands::Accounts { command } => match command {
            AccountCommands::List => commands::accounts_list(ctx, format).await,
            AccountCommands::Create {
                name,
                account_type,
                currency,
                balance,
            } => {
                commands::accounts_create(ctx, name, account_type.into(), currency, balance, format)
                    .await
            }
            AccountCommands::Rename { id, name } => {
                commands::accounts_rename(ctx, id, name, format).await
            }
            AccountCommands::Delete { id, yes } => {
                commands::accounts_delete(ctx, id, yes, format).await
            }
        },
        Commands::Transactions { command } => match command {
            TransactionCommands::List { limit } => {
                commands::transactions_list(ctx, limit, format).await
            }
            TransactionCommands::Add {
                account,
                amount,
                category,
                date,
                notes,
            } => commands::transactions_add(ctx, account, amount, category, date, notes, format).await,
            TransactionCommands::Import { path } => {
                commands::transactions_import(ctx, &path, format).await
            }
            TransactionCommands::Export { output } => {
                commands::transactions_export(ctx, output.as_deref(), format).await
            }
        },
        Commands::Categories { command } => match command {
            CategoryCommands::List { mine } => commands::categories_list(ctx, mine, format).await,
            CategoryCommands::Create { name, kind, color } => {
                commands::categories_create(ctx, name, kind.into(), color, format).await
            }
            CategoryCommands::Delete { id, yes } => {
                commands::categories_delete(ctx, id, yes, format).await
            }
        },
        Commands::Budgets { command } => match command {
            BudgetCommands::List => commands::budgets_list(ctx, format).await,
            BudgetCommands::Create {
                category,
                amount,
                from,
                to,
            } => commands::budgets_create(ctx, category, amount, from, to, format).await,
            BudgetCommands::Delete { id, yes } => {
                commands::budgets_delete(ctx, id, yes, format).await
            }
        },
        Commands::Recurring { command } => match command {
            RecurringCommands::List => commands::recurring_list(ctx, format).await,
            RecurringCommands::Create {
                account,
                category,
                amount,
                start,
                notes,
            } => {
                commands::recurring_create(ctx, account, category, amount, start, notes, format)
                    .await
            }
            RecurringCommands::Delete { id, yes } => {
                commands::recurring_delete(ctx, id, yes, format).await
            }
        },
        Commands::Summary { period } => {
            commands::summary(ctx, period.year, period.month, format).await
        }
        Commands::Spending { period } => {
            commands::spending(ctx, period.year, period.month, format).await
        }
        Commands::Progress { period } => {
            commands::budget_progress(ctx, period.year, period.month, format).await
        }
        Commands::Recent => commands::recent(ctx, format).await,
    }
}

/// Turn an error into the message shown to the user.
fn describe_error(err: &anyhow::Error) -> String {
    let needs_login = err
        .downcast_ref::<ApiError>()
        .map(ApiError::requires_sign_in)
        .or_else(|| err.downcast_ref::<AuthError>().map(AuthError::requires_sign_in))
        .unwrap_or(false);
    if needs_login {
        return "Session expired. Run 'tally login' to sign in again".to_string();
    }
    format!("{:#}", err)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    let paths = match Paths::new() {
        Ok(paths) => paths,
        Err(e) => {
            output::print_error(&e.to_string(), &format);
            std::process::exit(1);
        }
    };
    let config = match Config::load(&paths) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("Invalid configuration: {}", e), &format);
            std::process::exit(1);
        }
    };

    init_logging(&LogConfig {
        service_name: "cli".into(),
        default_level: cli.log_level.clone().unwrap_or_else(|| config.log_level.clone()),
        log_path: Some(paths.log_file()),
        also_stderr: false,
    });
    debug!(api = %config.api_base_url, "Starting");

    let result = match commands::Context::new(&config, &paths, cli.secrets.into()) {
        Ok(ctx) => run(cli, &ctx).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&describe_error(&e), &format);
        std::process::exit(1);
    }
}
