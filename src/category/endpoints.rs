//! JSON endpoints for managing categories.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    Error,
    category::Category,
    database_id::CategoryId,
    session::SessionContext,
    transaction::TransactionKind,
};

/// The request body for creating or updating a category.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryForm {
    /// The display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Whether the category labels income or expenses.
    #[serde(default, alias = "type")]
    pub kind: Option<TransactionKind>,
    /// A CSS color.
    #[serde(default)]
    pub color: Option<String>,
}

/// A route handler listing the signed-in user's categories in creation order.
pub async fn get_categories(
    Extension(context): Extension<Arc<SessionContext>>,
) -> Result<Json<Vec<Category>>, Error> {
    Ok(Json(context.user_data()?.categories.categories()))
}

/// A route handler for creating a category, responds with the new ID.
pub async fn create_category_endpoint(
    Extension(context): Extension<Arc<SessionContext>>,
    Json(form): Json<CategoryForm>,
) -> Result<Response, Error> {
    let data = context.user_data()?;

    let id = data.categories.add(
        form.name.as_deref().unwrap_or_default(),
        form.kind,
        form.color.as_deref(),
    )?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))).into_response())
}

/// A route handler for updating a category. Fields missing from the request keep their
/// current value.
pub async fn update_category_endpoint(
    Extension(context): Extension<Arc<SessionContext>>,
    Path(category_id): Path<CategoryId>,
    Json(form): Json<CategoryForm>,
) -> Result<StatusCode, Error> {
    let data = context.user_data()?;
    let current = data
        .categories
        .get(category_id)
        .ok_or(Error::UpdateMissingCategory)?;

    let category = Category {
        name: form.name.unwrap_or_else(|| current.name.clone()),
        kind: form.kind.unwrap_or(current.kind),
        color: form.color.unwrap_or_else(|| current.color.clone()),
        ..current
    };
    data.categories.update(&category)?;

    Ok(StatusCode::NO_CONTENT)
}

/// A route handler for deleting a category.
pub async fn delete_category_endpoint(
    Extension(context): Extension<Arc<SessionContext>>,
    Path(category_id): Path<CategoryId>,
) -> Result<StatusCode, Error> {
    context.user_data()?.categories.remove(category_id)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod category_endpoint_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        category::DEFAULT_CATEGORY_COLOR,
        endpoints::{self, format_endpoint},
        routing::test_utils::get_signed_in_server,
    };

    #[tokio::test]
    async fn create_then_list_with_default_color() {
        let (server, cookie) = get_signed_in_server().await;

        server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie.clone())
            .json(&json!({"name": "Food", "kind": "expense"}))
            .await
            .assert_status(StatusCode::CREATED);

        let categories: Value = server
            .get(endpoints::CATEGORIES)
            .add_cookie(cookie)
            .await
            .json();
        assert_eq!(categories[0]["name"], "Food");
        assert_eq!(categories[0]["color"], DEFAULT_CATEGORY_COLOR);
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let (server, cookie) = get_signed_in_server().await;
        server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie.clone())
            .json(&json!({"name": "Food", "kind": "expense"}))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie)
            .json(&json!({"name": "FOOD", "type": "expense"}))
            .await;

        response.assert_status_bad_request();
        response.assert_json(&json!({"error": "a category named \"FOOD\" already exists"}));
    }

    #[tokio::test]
    async fn missing_kind_is_rejected() {
        let (server, cookie) = get_signed_in_server().await;

        server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie)
            .json(&json!({"name": "Food"}))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn update_and_delete() {
        let (server, cookie) = get_signed_in_server().await;
        let created: Value = server
            .post(endpoints::CATEGORIES)
            .add_cookie(cookie.clone())
            .json(&json!({"name": "Food", "kind": "expense"}))
            .await
            .json();
        let path = format_endpoint(endpoints::CATEGORY, created["id"].as_i64().unwrap());

        server
            .put(&path)
            .add_cookie(cookie.clone())
            .json(&json!({"color": "#ef4444"}))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let categories: Value = server
            .get(endpoints::CATEGORIES)
            .add_cookie(cookie.clone())
            .await
            .json();
        assert_eq!(categories[0]["color"], "#ef4444");
        assert_eq!(categories[0]["name"], "Food");

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
}
