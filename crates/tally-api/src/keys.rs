//! Cache keys for finance queries.
//!
//! Keys are hierarchical: invalidating `summary` also drops every
//! `summary/<year>/<month>` entry.

use tally_auth::QueryKey;

pub const ACCOUNTS: &str = "accounts";
pub const TRANSACTIONS: &str = "transactions";
pub const CATEGORIES: &str = "categories";
pub const BUDGETS: &str = "budgets";
pub const RECURRING: &str = "recurringTransactions";
pub const SUMMARY: &str = "summary";
pub const SPENDING_BY_CATEGORY: &str = "spendingByCategory";
pub const RECENT_TRANSACTIONS: &str = "recentTransactions";
pub const BUDGET_PROGRESS: &str = "budgetProgress";
pub const PROFILE: &str = "profile";

pub fn accounts() -> QueryKey {
    QueryKey::from([ACCOUNTS])
}

pub fn transactions() -> QueryKey {
    QueryKey::from([TRANSACTIONS])
}

pub fn all_transactions() -> QueryKey {
    QueryKey::from([TRANSACTIONS, "all"])
}

pub fn all_categories() -> QueryKey {
    QueryKey::from([CATEGORIES, "all"])
}

pub fn user_categories() -> QueryKey {
    QueryKey::from([CATEGORIES, "user"])
}

pub fn budgets() -> QueryKey {
    QueryKey::from([BUDGETS])
}

pub fn recurring() -> QueryKey {
    QueryKey::from([RECURRING])
}

pub fn summary() -> QueryKey {
    QueryKey::from([SUMMARY])
}

pub fn summary_for(year: i32, month: u32) -> QueryKey {
    summary().with(year).with(month)
}

pub fn spending_by_category() -> QueryKey {
    QueryKey::from([SPENDING_BY_CATEGORY])
}

pub fn spending_by_category_for(year: i32, month: u32) -> QueryKey {
    spending_by_category().with(year).with(month)
}

pub fn recent_transactions() -> QueryKey {
    QueryKey::from([RECENT_TRANSACTIONS])
}

pub fn budget_progress() -> QueryKey {
    QueryKey::from([BUDGET_PROGRESS])
}

pub fn budget_progress_for(year: i32, month: u32) -> QueryKey {
    budget_progress().with(year).with(month)
}

pub fn profile() -> QueryKey {
    QueryKey::from([PROFILE])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_keys_nest_under_prefix() {
        assert!(summary_for(2024, 5).starts_with(&summary()));
        assert_eq!(summary_for(2024, 5).to_string(), "summary/2024/5");
        assert!(all_transactions().starts_with(&transactions()));
        assert!(!user_categories().starts_with(&all_categories()));
    }
}
