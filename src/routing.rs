//! Application router configuration.
//!
//! Every route sits behind the route guard, which decides from the session state whether a
//! request may reach its handler.

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::{
    AppState, Error,
    auth_endpoints::{get_home, log_in, log_in_federated, log_out, register},
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories,
        update_category_endpoint,
    },
    dashboard::get_dashboard,
    endpoints,
    route_guard::route_guard,
    settings::{get_settings, get_settings_options, reset_settings, update_settings},
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_totals,
        get_transactions, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_home))
        .route(endpoints::REGISTER, post(register))
        .route(endpoints::LOG_IN, post(log_in))
        .route(endpoints::FEDERATED_LOG_IN, post(log_in_federated))
        .route(endpoints::LOG_OUT, post(log_out))
        .route(endpoints::DASHBOARD, get(get_dashboard))
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions).post(create_transaction_endpoint),
        )
        .route(endpoints::TRANSACTION_TOTALS, get(get_transaction_totals))
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(endpoints::SETTINGS, get(get_settings).put(update_settings))
        .route(endpoints::SETTINGS_RESET, post(reset_settings))
        .route(endpoints::SETTINGS_OPTIONS, get(get_settings_options))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
