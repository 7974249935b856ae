//! Finance resources as exchanged with the backend.

use crate::amount;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Id = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Cash,
    Credit,
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            AccountType::Bank => "bank",
            AccountType::Cash => "cash",
            AccountType::Credit => "credit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(deserialize_with = "amount::deserialize")]
    pub balance: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    pub name: String,
    pub account_type: AccountType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<String>,
}

/// Fields sent with `PATCH /accounts/<id>/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<AccountType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Income,
    Expense,
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            CategoryKind::Income => "income",
            CategoryKind::Expense => "expense",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Id,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Id,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
    pub account: Id,
    #[serde(default)]
    pub category: Option<Id>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub category_type: Option<CategoryKind>,
    #[serde(default)]
    pub account_details: Option<Account>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTransaction {
    pub account: Id,
    pub category: Option<Id>,
    pub amount: String,
    pub date: NaiveDate,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Id,
    pub category: Id,
    #[serde(default)]
    pub category_details: Option<Category>,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "amount::deserialize_optional")]
    pub spent: Option<String>,
}

/// Body of `POST /budgets/` and `PUT /budgets/<id>/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetInput {
    pub category: Id,
    pub amount: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Monthly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Frequency::Monthly => "monthly",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: Id,
    #[serde(default)]
    pub notes: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: String,
    pub account: Id,
    pub category: Id,
    pub start_date: NaiveDate,
    pub next_date: NaiveDate,
    pub frequency: Frequency,
    #[serde(default)]
    pub account_details: Option<Account>,
    #[serde(default)]
    pub category_details: Option<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRecurringTransaction {
    pub account: Id,
    pub category: Id,
    pub amount: String,
    pub notes: String,
    pub start_date: NaiveDate,
}

/// Fields sent with `PATCH /recurring-transactions/<id>/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecurringUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// Dashboard totals for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    #[serde(deserialize_with = "amount::deserialize")]
    pub total_balance: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub monthly_income: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub monthly_expenses: String,
}

/// One slice of the spending-by-category breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpending {
    pub name: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Image uploaded as the new avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub avatar: Option<AvatarUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangePassword {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_accepts_string_or_number_balance() {
        let from_string: Account = serde_json::from_value(json!({
            "id": 1, "name": "Checking", "account_type": "bank", "balance": "120.50"
        }))
        .unwrap();
        let from_number: Account = serde_json::from_value(json!({
            "id": 2, "name": "Wallet", "account_type": "cash", "balance": 12.5
        }))
        .unwrap();

        assert_eq!(from_string.balance, "120.50");
        assert_eq!(from_number.balance, "12.5");
        assert_eq!(from_number.account_type, AccountType::Cash);
    }

    #[test]
    fn test_category_kind_uses_type_field() {
        let category: Category = serde_json::from_value(json!({
            "id": 3, "name": "Salary", "type": "income", "color": "#00ff00"
        }))
        .unwrap();
        assert_eq!(category.kind, CategoryKind::Income);

        let body = serde_json::to_value(NewCategory {
            name: "Food".into(),
            kind: CategoryKind::Expense,
            color: "#ff0000".into(),
        })
        .unwrap();
        assert_eq!(body["type"], "expense");
    }

    #[test]
    fn test_transaction_without_category() {
        let tx: Transaction = serde_json::from_value(json!({
            "id": 10,
            "amount": "-4.20",
            "date": "2024-05-03",
            "account": 1,
            "category": null,
            "notes": "",
            "category_name": "Uncategorized",
            "category_type": "expense"
        }))
        .unwrap();
        assert_eq!(tx.category, None);
        assert_eq!(tx.date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_budget_spent_may_be_missing_or_null() {
        let base = json!({
            "id": 1, "category": 2, "amount": "300.00",
            "start_date": "2024-05-01", "end_date": "2024-05-31"
        });
        let missing: Budget = serde_json::from_value(base.clone()).unwrap();
        assert_eq!(missing.spent, None);

        let mut with_spent = base;
        with_spent["spent"] = json!(120);
        let budget: Budget = serde_json::from_value(with_spent).unwrap();
        assert_eq!(budget.spent.as_deref(), Some("120"));
    }

    #[test]
    fn test_partial_updates_skip_unset_fields() {
        let body = serde_json::to_value(AccountUpdate {
            name: Some("Savings".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({"name": "Savings"}));
    }
}
