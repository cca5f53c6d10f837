//! Budget, trend and category statistics computed from a list of transactions.
//!
//! All month bucketing uses [Transaction::date], the day the money moved, never the time the
//! transaction was recorded.

use std::collections::HashMap;

use serde::Serialize;
use time::{Date, Month};

use crate::transaction::{Transaction, TransactionKind, TransactionTotals};

/// How many categories [top_categories] returns at most.
pub const TOP_CATEGORY_COUNT: usize = 5;

/// Spending in the current month measured against the monthly budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStatus {
    /// Expenses dated in the current month.
    pub spent: f64,
    /// The configured monthly budget.
    pub budget: f64,
    /// `spent` as a percentage of `budget`, zero when there is no budget.
    pub percentage: f64,
}

/// Compare this month's expenses against `monthly_budget`.
pub fn budget_status(
    transactions: &[Transaction],
    monthly_budget: f64,
    today: Date,
) -> BudgetStatus {
    let spent = expense_in_month(transactions, today.year(), today.month());
    let percentage = if monthly_budget > 0.0 {
        spent / monthly_budget * 100.0
    } else {
        0.0
    };

    BudgetStatus {
        spent,
        budget: monthly_budget,
        percentage,
    }
}

/// The percentage change in expenses from last month to this month.
///
/// Returns zero if nothing was spent last month.
pub fn monthly_trend(transactions: &[Transaction], today: Date) -> f64 {
    let current = expense_in_month(transactions, today.year(), today.month());
    let (previous_year, previous_month) = previous_month(today.year(), today.month());
    let previous = expense_in_month(transactions, previous_year, previous_month);

    if previous == 0.0 {
        return 0.0;
    }

    (current - previous) / previous * 100.0
}

/// The categories with the most spending, largest first.
///
/// Income is ignored. Categories with equal totals are ordered by name so the result is
/// stable between calls.
pub fn top_categories(transactions: &[Transaction]) -> Vec<(String, f64)> {
    let mut totals: HashMap<&str, f64> = HashMap::new();

    for transaction in transactions
        .iter()
        .filter(|transaction| transaction.kind == TransactionKind::Expense)
    {
        *totals.entry(transaction.category.as_str()).or_default() += transaction.amount;
    }

    let mut totals: Vec<(String, f64)> = totals
        .into_iter()
        .map(|(category, total)| (category.to_owned(), total))
        .collect();
    totals.sort_by(|(a_name, a_total), (b_name, b_total)| {
        b_total.total_cmp(a_total).then_with(|| a_name.cmp(b_name))
    });
    totals.truncate(TOP_CATEGORY_COUNT);

    totals
}

/// Income, expense and balance for the transactions dated in the month containing `today`.
pub fn month_totals(transactions: &[Transaction], today: Date) -> TransactionTotals {
    let this_month: Vec<Transaction> = transactions
        .iter()
        .filter(|transaction| in_month(transaction, today.year(), today.month()))
        .cloned()
        .collect();

    TransactionTotals::from_transactions(&this_month)
}

/// The month before `month`, in the previous year for January.
pub fn previous_month(year: i32, month: Month) -> (i32, Month) {
    match month {
        Month::January => (year - 1, Month::December),
        month => (year, month.previous()),
    }
}

fn in_month(transaction: &Transaction, year: i32, month: Month) -> bool {
    transaction.date.year() == year && transaction.date.month() == month
}

fn expense_in_month(transactions: &[Transaction], year: i32, month: Month) -> f64 {
    transactions
        .iter()
        .filter(|transaction| {
            transaction.kind == TransactionKind::Expense && in_month(transaction, year, month)
        })
        .map(|transaction| transaction.amount)
        .sum()
}

#[cfg(test)]
mod budget_status_tests {
    use time::macros::date;

    use crate::{
        statistics::budget_status,
        transaction::{
            TransactionKind::{Expense, Income},
            test_utils::transaction,
        },
    };

    #[test]
    fn percentage_is_zero_without_budget() {
        let transactions = [transaction(1, Expense, "Food", 500.0, date!(2025 - 10 - 01))];

        let status = budget_status(&transactions, 0.0, date!(2025 - 10 - 18));

        assert_eq!(status.spent, 500.0);
        assert_eq!(status.percentage, 0.0);
    }

    #[test]
    fn negative_budget_is_treated_as_no_budget() {
        let transactions = [transaction(1, Expense, "Food", 10.0, date!(2025 - 10 - 01))];

        let status = budget_status(&transactions, -100.0, date!(2025 - 10 - 18));

        assert_eq!(status.budget, -100.0);
        assert_eq!(status.percentage, 0.0);
    }

    #[test]
    fn only_counts_this_months_expenses() {
        let transactions = [
            transaction(1, Expense, "Food", 50.0, date!(2025 - 10 - 01)),
            transaction(2, Expense, "Food", 30.0, date!(2025 - 09 - 30)),
            transaction(3, Expense, "Food", 20.0, date!(2024 - 10 - 15)),
            transaction(4, Income, "Salary", 1000.0, date!(2025 - 10 - 02)),
        ];

        let status = budget_status(&transactions, 100.0, date!(2025 - 10 - 18));

        assert_eq!(status.spent, 50.0);
        assert_eq!(status.percentage, 50.0);
    }
}



#[cfg(test)]
mod dashboard_scenario_tests {
    use time::macros::date;

    use crate::{
        statistics::{budget_status, month_totals, monthly_trend, top_categories},
        transaction::{
            TransactionKind::{Expense, Income},
            TransactionTotals,
            test_utils::transaction,
        },
    };

    #[test]
    fn food_and_salary_across_two_months() {
        let today = date!(2025 - 10 - 18);
        let transactions = [
            transaction(1, Expense, "Food", 50.0, date!(2025 - 10 - 03)),
            transaction(2, Expense, "Food", 30.0, date!(2025 - 09 - 20)),
            transaction(3, Income, "Salary", 1000.0, date!(2025 - 10 - 01)),
        ];

        let this_month = month_totals(&transactions, today);
        assert_eq!(this_month.income, 1000.0);
        assert_eq!(this_month.expense, 50.0);
        assert_eq!(this_month.balance, 950.0);

        let status = budget_status(&transactions, 200.0, today);
        assert_eq!(status.spent, 50.0);
        assert_eq!(status.budget, 200.0);
        assert_eq!(status.percentage, 25.0);

        let trend = monthly_trend(&transactions, today);
        assert!((trend - 66.666_666).abs() < 1e-3, "got {trend}");

        let this_months_transactions = [transactions[0].clone(), transactions[2].clone()];
        assert_eq!(
            top_categories(&this_months_transactions),
            vec![("Food".to_owned(), 50.0)]
        );

        // Totals over the whole history include last month's expense.
        let all_time = TransactionTotals::from_transactions(&transactions);
        assert_eq!(all_time.expense, 80.0);
        assert_eq!(all_time.balance, 920.0);
    }
}
