//! The dashboard route: an overview of the signed-in user's money.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use serde::Serialize;

use crate::{
    AppState, Error,
    format::{format_currency, format_date, format_percentage},
    session::SessionContext,
    statistics::{BudgetStatus, budget_status, month_totals, monthly_trend, top_categories},
    timezone::local_today,
    transaction::{RECENT_TRANSACTION_COUNT, Transaction, TransactionTotals},
};

/// The state needed by the dashboard route handler.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A category and how much was spent in it.
#[derive(Debug, Serialize)]
struct CategorySpending {
    category: String,
    total: f64,
    formatted: String,
}

/// A recent transaction with its amount and date formatted for display.
#[derive(Debug, Serialize)]
struct RecentTransaction {
    #[serde(flatten)]
    transaction: Transaction,
    formatted_amount: String,
    formatted_date: String,
}

/// Amounts formatted with the user's currency.
#[derive(Debug, Serialize)]
struct FormattedTotals {
    income: String,
    expense: String,
    balance: String,
}

/// Everything the dashboard shows.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    /// Totals over every transaction.
    totals: TransactionTotals,
    /// Totals over the transactions dated this month.
    month_totals: TransactionTotals,
    budget_status: BudgetStatus,
    /// Percentage change in spending from last month.
    monthly_trend: f64,
    top_categories: Vec<CategorySpending>,
    recent: Vec<RecentTransaction>,
    formatted_totals: FormattedTotals,
    formatted_trend: String,
    formatted_budget_percentage: String,
}

/// A route handler for the dashboard summary.
pub async fn get_dashboard(
    State(state): State<DashboardState>,
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<Dashboard>, Error> {
    let data = context.user_data()?;
    let today = local_today(&state.local_timezone)?;
    let settings = data.settings.get();
    let transactions = data.transactions.transactions();
    let currency = settings.currency.as_str();

    let totals = data.transactions.totals();
    let trend = monthly_trend(&transactions, today);
    let budget = budget_status(&transactions, settings.monthly_budget, today);

    let top_categories = top_categories(&transactions)
        .into_iter()
        .map(|(category, total)| CategorySpending {
            formatted: format_currency(total, currency),
            category,
            total,
        })
        .collect();

    let recent = data
        .transactions
        .recent(RECENT_TRANSACTION_COUNT)
        .into_iter()
        .map(|transaction| RecentTransaction {
            formatted_amount: format_currency(transaction.amount, currency),
            formatted_date: format_date(transaction.date, &settings.date_format),
            transaction,
        })
        .collect();

    Ok(Json(Dashboard {
        formatted_totals: FormattedTotals {
            income: format_currency(totals.income, currency),
            expense: format_currency(totals.expense, currency),
            balance: format_currency(totals.balance, currency),
        },
        formatted_trend: format_percentage(trend),
        formatted_budget_percentage: format_percentage(budget.percentage),
        month_totals: month_totals(&transactions, today),
        totals,
        budget_status: budget,
        monthly_trend: trend,
        top_categories,
        recent,
    }))
}
