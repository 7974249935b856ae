//! Cached reads.

use super::harness::ClientHarness;
use crate::{keys, AccountType, ApiError};
use serde_json::json;
use std::time::Duration;
use tally_auth::{AuthError, DataCache};

#[tokio::test]
async fn list_accounts_is_served_from_cache_second_time() {
    let harness = ClientHarness::new();
    harness.backend.serve(
        "GET",
        "/accounts/",
        json!([{"id": 1, "name": "Checking", "account_type": "bank", "balance": "10.00"}]),
    );

    let first = harness.client.list_accounts().await.unwrap();
    let second = harness.client.list_accounts().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].account_type, AccountType::Bank);
    assert_eq!(harness.backend.hits("GET", "/accounts/"), 1);

    let seen = harness.backend.seen();
    assert_eq!(seen[0].authorization.as_deref(), Some("Bearer A1"));
}

#[tokio::test]
async fn monthly_queries_send_year_and_month() {
    let harness = ClientHarness::new();
    harness.backend.serve(
        "GET",
        "/analytics/summary/",
        json!({"total_balance": "100.00", "monthly_income": 50, "monthly_expenses": "20.5"}),
    );

    let summary = harness.client.dashboard_summary(2024, 5).await.unwrap();

    assert_eq!(summary.total_balance, "100.00");
    assert_eq!(summary.monthly_income, "50");
    let seen = harness.backend.seen();
    assert_eq!(
        seen[0].query,
        vec![
            ("year".to_string(), "2024".to_string()),
            ("month".to_string(), "5".to_string())
        ]
    );
    assert!(harness.cache.get(&keys::summary_for(2024, 5)).is_some());
}

#[tokio::test]
async fn different_months_are_cached_separately() {
    let harness = ClientHarness::new();
    harness.backend.serve(
        "GET",
        "/analytics/spending-by-category/",
        json!([{"name": "Food", "amount": "12.00", "color": "#f00"}]),
    );

    harness.client.spending_by_category(2024, 5).await.unwrap();
    harness.client.spending_by_category(2024, 6).await.unwrap();
    harness.client.spending_by_category(2024, 5).await.unwrap();

    assert_eq!(
        harness
            .backend
            .hits("GET", "/analytics/spending-by-category/"),
        2
    );
}

#[tokio::test]
async fn month_out_of_range_is_rejected_locally() {
    let harness = ClientHarness::new();

    let err = harness.client.budget_progress(2024, 13).await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidInput(_)));
    assert!(harness.backend.seen().is_empty());
}

#[tokio::test]
async fn failed_query_is_not_cached() {
    let harness = ClientHarness::new();
    harness
        .backend
        .serve_raw("GET", "/budgets/", 500, r#"{"detail": "boom"}"#);

    let err = harness.client.list_budgets().await.unwrap_err();

    assert!(matches!(
        err,
        ApiError::Auth(AuthError::Api { status: 500, .. })
    ));
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn result_arriving_after_clear_is_not_cached() {
    let harness = ClientHarness::new();
    harness.backend.serve(
        "GET",
        "/accounts/",
        json!([{"id": 1, "name": "Checking", "account_type": "bank", "balance": "10.00"}]),
    );
    harness.backend.set_delay(Duration::from_millis(100));

    let pending = {
        let client = harness.client.clone();
        tokio::spawn(async move { client.list_accounts().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Sign-out empties the cache while the read is in flight.
    harness.cache.clear();

    let accounts = pending.await.unwrap().unwrap();

    assert_eq!(accounts.len(), 1);
    assert!(harness.cache.is_empty());
    assert!(harness.cache.get(&keys::accounts()).is_none());
}

#[tokio::test]
async fn profile_reads_me_endpoint() {
    let harness = ClientHarness::new();
    harness.backend.serve(
        "GET",
        tally_auth::endpoints::ME,
        json!({"username": "alice", "email": "alice@example.com", "avatar": null}),
    );

    let profile = harness.client.profile().await.unwrap();

    assert_eq!(profile.username, "alice");
    assert_eq!(profile.avatar, None);
}

#[tokio::test]
async fn export_returns_raw_csv() {
    let harness = ClientHarness::new();
    let csv = "date,amount,notes\n2024-05-01,-4.20,Coffee\n";
    harness
        .backend
        .serve_raw("GET", "/transactions/export_csv/", 200, csv);

    let exported = harness.client.export_transactions_csv().await.unwrap();
    harness.client.export_transactions_csv().await.unwrap();

    assert_eq!(exported, csv);
    assert_eq!(harness.backend.hits("GET", "/transactions/export_csv/"), 2);
}

#[tokio::test]
async fn export_accepts_enveloped_string() {
    let harness = ClientHarness::new();
    harness
        .backend
        .serve("GET", "/transactions/export_csv/", json!("a,b\n1,2\n"));

    let exported = harness.client.export_transactions_csv().await.unwrap();

    assert_eq!(exported, "a,b\n1,2\n");
}
