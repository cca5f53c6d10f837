//! User-defined labels for income and expenses.

mod endpoints;
mod store;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use endpoints::{
    create_category_endpoint, delete_category_endpoint, get_categories, update_category_endpoint,
};
pub use store::CategoryStore;

use crate::{database_id::CategoryId, identity::UserId, transaction::TransactionKind};

/// The color given to categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#3b82f6";

/// A named label for transactions of one kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The identity that owns the category.
    pub user_id: UserId,
    /// The display name, unique per kind regardless of case.
    pub name: String,
    /// Whether the category labels income or expenses.
    pub kind: TransactionKind,
    /// A CSS color used when displaying the category.
    pub color: String,
    /// When the category was created.
    pub created_at: OffsetDateTime,
}

impl Category {
    /// Whether `name` names this category, ignoring case and surrounding whitespace.
    pub fn has_name(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

/// The fields stored when a category is created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    /// The display name.
    pub name: String,
    /// Whether the category labels income or expenses.
    pub kind: TransactionKind,
    /// A CSS color.
    pub color: String,
}
