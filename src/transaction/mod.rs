//! Income and expense transactions.

mod endpoints;
mod store;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_transaction_totals,
    get_transactions, update_transaction_endpoint,
};
pub use store::TransactionStore;

use crate::{Error, database_id::TransactionId, identity::UserId};

/// How many transactions count as "recent".
pub const RECENT_TRANSACTION_COUNT: usize = 5;

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money earned.
    Income,
    /// Money spent.
    #[default]
    Expense,
}

impl TransactionKind {
    /// The lowercase name used for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl ToSql for TransactionKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(FromSqlError::Other(
                format!("invalid transaction kind \"{other}\"").into(),
            )),
        }
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The identity that owns the transaction.
    pub user_id: UserId,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// The category label, e.g. "Food".
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned, always positive.
    pub amount: f64,
    /// When the transaction happened.
    pub date: Date,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
}

/// The fields a user supplies to record a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// The category label.
    pub category: String,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned, must be greater than zero.
    pub amount: f64,
    /// Whether the transaction is income or an expense.
    pub kind: TransactionKind,
    /// When the transaction happened.
    pub date: Date,
}

impl NewTransaction {
    /// Check the required fields and the amount.
    ///
    /// # Errors
    /// Returns [Error::MissingFields] if the category, description or amount is missing and
    /// [Error::NonPositiveAmount] if the amount is negative.
    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(&self.category, &self.description, self.amount)
    }
}

impl Transaction {
    /// Check the editable fields in the same way as [NewTransaction::validate].
    pub fn validate(&self) -> Result<(), Error> {
        validate_fields(&self.category, &self.description, self.amount)
    }
}

/// A zero or NaN amount counts as missing, like an empty text field.
fn validate_fields(category: &str, description: &str, amount: f64) -> Result<(), Error> {
    if category.trim().is_empty()
        || description.trim().is_empty()
        || amount == 0.0
        || amount.is_nan()
    {
        return Err(Error::MissingFields);
    }

    if amount <= 0.0 {
        return Err(Error::NonPositiveAmount);
    }

    Ok(())
}

/// Income, expense and their difference over a list of transactions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TransactionTotals {
    /// The sum of all income.
    pub income: f64,
    /// The sum of all expenses.
    pub expense: f64,
    /// Income minus expenses.
    pub balance: f64,
}

impl TransactionTotals {
    /// Sum `transactions` by kind.
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let income = sum_of_kind(transactions, TransactionKind::Income);
        let expense = sum_of_kind(transactions, TransactionKind::Expense);

        Self {
            income,
            expense,
            balance: income - expense,
        }
    }
}

/// Sum the amounts of the transactions of `kind`.
pub fn sum_of_kind(transactions: &[Transaction], kind: TransactionKind) -> f64 {
    transactions
        .iter()
        .filter(|transaction| transaction.kind == kind)
        .map(|transaction| transaction.amount)
        .sum()
}


#[cfg(test)]
mod validation_tests {
    use time::macros::date;

    use crate::{
        Error,
        transaction::{NewTransaction, TransactionKind},
    };

    fn new_transaction(category: &str, description: &str, amount: f64) -> NewTransaction {
        NewTransaction {
            category: category.to_owned(),
            description: description.to_owned(),
            amount,
            kind: TransactionKind::Expense,
            date: date!(2025 - 10 - 05),
        }
    }

    #[test]
    fn accepts_complete_transaction() {
        assert_eq!(new_transaction("Food", "Lunch", 12.5).validate(), Ok(()));
    }

    #[test]
    fn rejects_missing_category() {
        assert_eq!(
            new_transaction("", "Lunch", 12.5).validate(),
            Err(Error::MissingFields)
        );
    }

    #[test]
    fn rejects_blank_description() {
        assert_eq!(
            new_transaction("Food", " \t", 12.5).validate(),
            Err(Error::MissingFields)
        );
    }

    #[test]
    fn zero_amount_counts_as_missing() {
        assert_eq!(
            new_transaction("Food", "Lunch", 0.0).validate(),
            Err(Error::MissingFields)
        );
    }

    #[test]
    fn rejects_negative_amount() {
        assert_eq!(
            new_transaction("Food", "Lunch", -3.0).validate(),
            Err(Error::NonPositiveAmount)
        );
    }

    #[test]
    fn rejects_nan_amount() {
        assert_eq!(
            new_transaction("Food", "Lunch", f64::NAN).validate(),
            Err(Error::MissingFields)
        );
    }
}
