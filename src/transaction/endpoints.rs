//! JSON endpoints for listing, creating, updating and deleting transactions.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::Date;

use crate::{
    AppState, Error,
    database_id::TransactionId,
    session::SessionContext,
    timezone::local_today,
    transaction::{
        NewTransaction, RECENT_TRANSACTION_COUNT, Transaction, TransactionKind, TransactionTotals,
    },
};

/// The state needed to fill in the defaults of a new transaction.
#[derive(Debug, Clone)]
pub struct TransactionEndpointState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for TransactionEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The request body for creating or updating a transaction.
///
/// Every field is optional so that a missing field is reported as [Error::MissingFields]
/// rather than a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionForm {
    /// Income or expense, defaults to the user's preferred kind for new transactions.
    #[serde(default, alias = "type")]
    pub kind: Option<TransactionKind>,
    /// The category label.
    #[serde(default)]
    pub category: Option<String>,
    /// Text detailing the transaction.
    #[serde(default)]
    pub description: Option<String>,
    /// The value of the transaction.
    #[serde(default)]
    pub amount: Option<f64>,
    /// The date when the transaction ocurred, defaults to today for new transactions.
    #[serde(default)]
    pub date: Option<Date>,
}

/// The income, expense and balance totals with the most recent transactions.
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    /// The totals over every transaction.
    #[serde(flatten)]
    pub totals: TransactionTotals,
    /// The most recently recorded transactions.
    pub recent: Vec<Transaction>,
}

/// A route handler listing the signed-in user's transactions, newest first.
pub async fn get_transactions(
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let data = context.user_data()?;

    Ok(Json(data.transactions.transactions()))
}

/// A route handler for recording a transaction, responds with the new ID.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionEndpointState>,
    Extension(context): Extension<Arc<SessionContext>>,
    Json(form): Json<TransactionForm>,
) -> Result<Response, Error> {
    let data = context.user_data()?;

    let date = match form.date {
        Some(date) => date,
        None => local_today(&state.local_timezone)?,
    };
    let transaction = NewTransaction {
        category: form.category.unwrap_or_default(),
        description: form.description.unwrap_or_default(),
        amount: form.amount.unwrap_or_default(),
        kind: form
            .kind
            .unwrap_or(data.settings.get().default_transaction_kind),
        date,
    };

    let id = data.transactions.add(&transaction).inspect_err(|error| {
        tracing::debug!("could not create transaction: {error}");
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

/// A route handler for updating a transaction.
///
/// Fields missing from the request keep their current value.
pub async fn update_transaction_endpoint(
    Extension(context): Extension<Arc<SessionContext>>,
    Path(transaction_id): Path<TransactionId>,
    Json(form): Json<TransactionForm>,
) -> Result<StatusCode, Error> {
    let data = context.user_data()?;
    let current = data
        .transactions
        .get(transaction_id)
        .ok_or(Error::UpdateMissingTransaction)?;

    let transaction = Transaction {
        kind: form.kind.unwrap_or(current.kind),
        category: form
            .category
            .unwrap_or_else(|| current.category.clone()),
        description: form
            .description
            .unwrap_or_else(|| current.description.clone()),
        amount: form.amount.unwrap_or(current.amount),
        date: form.date.unwrap_or(current.date),
        ..current
    };

    data.transactions.update(&transaction)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for deleting a transaction.
pub async fn delete_transaction_endpoint(
    Extension(context): Extension<Arc<SessionContext>>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    context.user_data()?.transactions.remove(transaction_id)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for the income, expense and balance totals.
pub async fn get_transaction_totals(
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<TotalsResponse>, Error> {
    let data = context.user_data()?;

    Ok(Json(TotalsResponse {
        totals: data.transactions.totals(),
        recent: data.transactions.recent(RECENT_TRANSACTION_COUNT),
    }))
}

#[cfg(test)]
mod transaction_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        endpoints::{self, format_endpoint},
        routing::test_utils::get_signed_in_server,
        settings::Settings,
        transaction::TransactionKind,
    };

    #[tokio::test]
    async fn create_then_list() {
        let (server, cookie) = get_signed_in_server().await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({
                "type": "income",
                "category": "Salary",
                "description": "October",
                "amount": 1000.0,
                "date": "2025-10-01",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);

        let transactions: Value = server
            .get(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(transactions[0]["category"], "Salary");
        assert_eq!(transactions[0]["kind"], "income");
        assert_eq!(transactions[0]["amount"], 1000.0);
    }

    #[tokio::test]
    async fn create_with_negative_amount_is_rejected() {
        let (server, cookie) = get_signed_in_server().await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .json(&json!({
                "category": "Food",
                "description": "Nothing",
                "amount": -5.0,
            }))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({"error": "amount must be greater than zero"}));
    }

    #[tokio::test]
    async fn create_without_fields_is_rejected() {
        let (server, cookie) = get_signed_in_server().await;

        let response = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .json(&json!({}))
            .await;

        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn create_uses_default_kind_from_settings() {
        let (server, cookie) = get_signed_in_server().await;
        server
            .put(endpoints::SETTINGS)
            .add_cookie(cookie.clone())
            .json(&Settings {
                default_transaction_kind: TransactionKind::Income,
                ..Settings::default()
            })
            .await
            .assert_status_ok();

        server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({"category": "Gift", "description": "Birthday", "amount": 20.0}))
            .await
            .assert_status(StatusCode::CREATED);

        let transactions: Value = server
            .get(endpoints::TRANSACTIONS)
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(transactions[0]["kind"], "income");
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (server, cookie) = get_signed_in_server().await;
        let created: Value = server
            .post(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .json(&json!({"category": "Food", "description": "Lunch", "amount": 12.0}))
            .await
            .json();
        let id = created["id"].as_i64().unwrap();
        let path = format_endpoint(endpoints::TRANSACTION, id);

        server
            .put(&path)
            .add_cookie(cookie.clone())
            .json(&json!({"amount": 15.5}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let transactions: Value = server
            .get(endpoints::TRANSACTIONS)
            .add_cookie(cookie.clone())
            .await
            .json();
        assert_eq!(transactions[0]["amount"], 15.5);
        assert_eq!(transactions[0]["description"], "Lunch");

        server
            .delete(&path)
            .add_cookie(cookie.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&path)
            .add_cookie(cookie)
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn update_missing_transaction_is_not_found() {
        let (server, cookie) = get_signed_in_server().await;

        server
            .put(&format_endpoint(endpoints::TRANSACTION, 999))
            .add_cookie(cookie)
            .json(&json!({"amount": 1.0}))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn totals_include_balance_and_recent() {
        let (server, cookie) = get_signed_in_server().await;
        for (kind, amount) in [("income", 1000.0), ("expense", 50.0), ("expense", 30.0)] {
            server
                .post(endpoints::TRANSACTIONS)
                .add_cookie(cookie.clone())
                .json(&json!({
                    "kind": kind,
                    "category": "Misc",
                    "description": "Test",
                    "amount": amount,
                }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let totals: Value = server
            .get(endpoints::TRANSACTION_TOTALS)
            .add_cookie(cookie)
            .await
            .json();

        assert_eq!(totals["income"], 1000.0);
        assert_eq!(totals["expense"], 80.0);
        assert_eq!(totals["balance"], 920.0);
        assert_eq!(totals["recent"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn signed_out_is_redirected() {
        let (server, _cookie) = get_signed_in_server().await;

        let response = server.get(endpoints::TRANSACTIONS).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN);
    }
}
