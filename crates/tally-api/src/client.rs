//! Finance API client.

use crate::keys;
use crate::models::*;
use crate::{ApiError, ApiResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tally_auth::{endpoints, ApiRequest, AuthGateway, DataCache, FormPart, QueryKey};
use tracing::{debug, trace};

/// Typed operations over the authenticated gateway.
///
/// Queries are served from the cache while fresh. Mutations invalidate the
/// queries whose results they change, so the next read refetches.
#[derive(Clone)]
pub struct FinanceClient {
    gateway: Arc<AuthGateway>,
    cache: Arc<dyn DataCache>,
}

impl FinanceClient {
    pub fn new(gateway: Arc<AuthGateway>, cache: Arc<dyn DataCache>) -> Self {
        Self { gateway, cache }
    }

    pub fn cache(&self) -> &Arc<dyn DataCache> {
        &self.cache
    }

    async fn query<T: DeserializeOwned>(&self, key: QueryKey, request: ApiRequest) -> ApiResult<T> {
        if let Some(value) = self.cache.get(&key) {
            trace!(key = %key, "Cache hit");
            return Ok(serde_json::from_value(value)?);
        }

        // Sign-out or a mutation while this is in flight makes the result unfit to cache.
        let epoch = self.cache.epoch();
        let value = self.gateway.send_checked(request).await?.value()?;
        let decoded = serde_json::from_value(value.clone())?;
        self.cache.put_if_epoch(key, value, epoch);
        Ok(decoded)
    }

    async fn mutate<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        invalidates: &[QueryKey],
    ) -> ApiResult<T> {
        let value = self.gateway.send_checked(request).await?.value()?;
        for key in invalidates {
            self.cache.invalidate(key);
        }
        Ok(serde_json::from_value(value)?)
    }

    async fn mutate_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        body: &impl Serialize,
        invalidates: &[QueryKey],
    ) -> ApiResult<T> {
        let request = request.json(serde_json::to_value(body)?);
        self.mutate(request, invalidates).await
    }

    // Accounts

    pub async fn list_accounts(&self) -> ApiResult<Vec<Account>> {
        self.query(keys::accounts(), ApiRequest::get("/accounts/"))
            .await
    }

    pub async fn create_account(&self, account: &NewAccount) -> ApiResult<Account> {
        self.mutate_json(
            ApiRequest::post("/accounts/"),
            account,
            &[keys::accounts(), keys::summary()],
        )
        .await
    }

    pub async fn update_account(&self, id: Id, update: &AccountUpdate) -> ApiResult<Account> {
        self.mutate_json(
            ApiRequest::patch(format!("/accounts/{}/", id)),
            update,
            &[keys::accounts(), keys::summary()],
        )
        .await
    }

    pub async fn delete_account(&self, id: Id) -> ApiResult<()> {
        self.mutate(
            ApiRequest::delete(format!("/accounts/{}/", id)),
            &[keys::accounts(), keys::summary()],
        )
        .await
    }

    // Transactions

    pub async fn list_transactions(&self) -> ApiResult<Vec<Transaction>> {
        self.query(keys::all_transactions(), ApiRequest::get("/transactions/"))
            .await
    }

    /// Record a transaction. Balances, monthly totals and budget usage all
    /// change, so those queries are invalidated too.
    pub async fn create_transaction(&self, transaction: &NewTransaction) -> ApiResult<Transaction> {
        self.mutate_json(
            ApiRequest::post("/transactions/"),
            transaction,
            &[
                keys::transactions(),
                keys::summary(),
                keys::accounts(),
                keys::spending_by_category(),
                keys::budgets(),
            ],
        )
        .await
    }

    // Categories

    pub async fn list_categories(&self) -> ApiResult<Vec<Category>> {
        self.query(keys::all_categories(), ApiRequest::get("/categories/"))
            .await
    }

    /// Categories created by the signed-in user (no shared defaults).
    pub async fn list_user_categories(&self) -> ApiResult<Vec<Category>> {
        self.query(keys::user_categories(), ApiRequest::get("/categories/mine/"))
            .await
    }

    pub async fn create_category(&self, category: &NewCategory) -> ApiResult<Category> {
        self.mutate_json(
            ApiRequest::post("/categories/"),
            category,
            &[keys::all_categories(), keys::user_categories()],
        )
        .await
    }

    pub async fn update_category(&self, id: Id, category: &NewCategory) -> ApiResult<Category> {
        self.mutate_json(
            ApiRequest::put(format!("/categories/{}/", id)),
            category,
            &[keys::all_categories(), keys::user_categories()],
        )
        .await
    }

    pub async fn delete_category(&self, id: Id) -> ApiResult<()> {
        self.mutate(
            ApiRequest::delete(format!("/categories/{}/", id)),
            &[keys::all_categories(), keys::user_categories()],
        )
        .await
    }

    // Budgets

    pub async fn list_budgets(&self) -> ApiResult<Vec<Budget>> {
        self.query(keys::budgets(), ApiRequest::get("/budgets/"))
            .await
    }

    pub async fn create_budget(&self, budget: &BudgetInput) -> ApiResult<Budget> {
        check_budget_dates(budget)?;
        self.mutate_json(
            ApiRequest::post("/budgets/"),
            budget,
            &[keys::budgets(), keys::budget_progress()],
        )
        .await
    }

    pub async fn update_budget(&self, id: Id, budget: &BudgetInput) -> ApiResult<Budget> {
        check_budget_dates(budget)?;
        self.mutate_json(
            ApiRequest::put(format!("/budgets/{}/", id)),
            budget,
            &[keys::budgets(), keys::budget_progress()],
        )
        .await
    }

    pub async fn delete_budget(&self, id: Id) -> ApiResult<()> {
        self.mutate(
            ApiRequest::delete(format!("/budgets/{}/", id)),
            &[keys::budgets(), keys::budget_progress()],
        )
        .await
    }

    // Recurring transactions

    pub async fn list_recurring(&self) -> ApiResult<Vec<RecurringTransaction>> {
        self.query(keys::recurring(), ApiRequest::get("/recurring-transactions/"))
            .await
    }

    pub async fn create_recurring(
        &self,
        recurring: &NewRecurringTransaction,
    ) -> ApiResult<RecurringTransaction> {
        self.mutate_json(
            ApiRequest::post("/recurring-transactions/"),
            recurring,
            &[keys::recurring()],
        )
        .await
    }

    pub async fn update_recurring(
        &self,
        id: Id,
        update: &RecurringUpdate,
    ) -> ApiResult<RecurringTransaction> {
        self.mutate_json(
            ApiRequest::patch(format!("/recurring-transactions/{}/", id)),
            update,
            &[keys::recurring()],
        )
        .await
    }

    pub async fn delete_recurring(&self, id: Id) -> ApiResult<()> {
        self.mutate(
            ApiRequest::delete(format!("/recurring-transactions/{}/", id)),
            &[keys::recurring()],
        )
        .await
    }

    // Analytics

    pub async fn dashboard_summary(&self, year: i32, month: u32) -> ApiResult<DashboardSummary> {
        check_month(month)?;
        self.query(
            keys::summary_for(year, month),
            ApiRequest::get("/analytics/summary/")
                .query("year", year)
                .query("month", month),
        )
        .await
    }

    pub async fn spending_by_category(
        &self,
        year: i32,
        month: u32,
    ) -> ApiResult<Vec<CategorySpending>> {
        check_month(month)?;
        self.query(
            keys::spending_by_category_for(year, month),
            ApiRequest::get("/analytics/spending-by-category/")
                .query("year", year)
                .query("month", month),
        )
        .await
    }

    pub async fn recent_transactions(&self) -> ApiResult<Vec<Transaction>> {
        self.query(
            keys::recent_transactions(),
            ApiRequest::get("/analytics/recent-transactions/"),
        )
        .await
    }

    pub async fn budget_progress(&self, year: i32, month: u32) -> ApiResult<Vec<Budget>> {
        check_month(month)?;
        self.query(
            keys::budget_progress_for(year, month),
            ApiRequest::get("/analytics/budget-progress/")
                .query("year", year)
                .query("month", month),
        )
        .await
    }

    // Profile

    pub async fn profile(&self) -> ApiResult<Profile> {
        self.query(keys::profile(), ApiRequest::get(endpoints::ME))
            .await
    }

    /// Change the username and/or avatar; sent as a multipart form.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<Profile> {
        let mut parts = Vec::new();
        if let Some(username) = &update.username {
            parts.push(FormPart::Text {
                name: "username".to_string(),
                value: username.clone(),
            });
        }
        if let Some(avatar) = &update.avatar {
            parts.push(FormPart::File {
                name: "avatar".to_string(),
                file_name: avatar.file_name.clone(),
                mime: avatar.mime.clone(),
                bytes: avatar.bytes.clone(),
            });
        }
        if parts.is_empty() {
            return Err(ApiError::InvalidInput("nothing to update".to_string()));
        }

        self.mutate(
            ApiRequest::patch(endpoints::ME).multipart(parts),
            &[keys::profile()],
        )
        .await
    }

    pub async fn change_password(&self, change: &ChangePassword) -> ApiResult<()> {
        if change.new_password != change.new_password_confirm {
            return Err(ApiError::InvalidInput(
                "new password and confirmation do not match".to_string(),
            ));
        }
        let _: Value = self
            .mutate_json(ApiRequest::post(endpoints::CHANGE_PASSWORD), change, &[])
            .await?;
        debug!("Password changed");
        Ok(())
    }

    // Import / export

    /// Upload a CSV of transactions.
    pub async fn import_transactions_csv(
        &self,
        file_name: &str,
        csv: Vec<u8>,
    ) -> ApiResult<Value> {
        let parts = vec![FormPart::File {
            name: "file".to_string(),
            file_name: file_name.to_string(),
            mime: "text/csv".to_string(),
            bytes: csv,
        }];
        self.mutate(
            ApiRequest::post("/transactions/import_csv/").multipart(parts),
            &[keys::transactions(), keys::accounts(), keys::summary()],
        )
        .await
    }

    /// Download all transactions as CSV. Never cached.
    pub async fn export_transactions_csv(&self) -> ApiResult<String> {
        let response = self
            .gateway
            .send_checked(ApiRequest::get("/transactions/export_csv/"))
            .await?;

        // Either a JSON string (possibly enveloped) or the raw CSV body.
        match response.value() {
            Ok(Value::String(csv)) => Ok(csv),
            _ => Ok(response.text()),
        }
    }
}

fn check_month(month: u32) -> ApiResult<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("month out of range: {}", month)))
    }
}

fn check_budget_dates(budget: &BudgetInput) -> ApiResult<()> {
    if budget.end_date < budget.start_date {
        return Err(ApiError::InvalidInput(
            "budget end date is before its start date".to_string(),
        ));
    }
    Ok(())
}
