//! Transaction documents.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    identity::UserId,
    transaction::{NewTransaction, Transaction},
};

use super::SqliteBackend;

impl SqliteBackend {
    pub(super) fn notify_transactions(&self, owner: UserId) -> Result<(), Error> {
        if !self.transaction_listeners.has_listeners(&owner) {
            return Ok(());
        }

        let transactions = {
            let connection = self.lock()?;
            get_transactions(&connection, owner)?
        };

        self.transaction_listeners.notify(&owner, transactions);

        Ok(())
    }
}

pub(super) fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_user_created
            ON \"transaction\"(user_id, created_at);",
    )?;

    Ok(())
}

pub(super) fn insert_transaction(
    connection: &Connection,
    owner: UserId,
    transaction: &NewTransaction,
    created_at: OffsetDateTime,
) -> Result<TransactionId, Error> {
    connection.execute(
        "INSERT INTO \"transaction\" (user_id, kind, category, description, amount, date, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        (
            owner.as_i64(),
            transaction.kind,
            &transaction.category,
            &transaction.description,
            transaction.amount,
            transaction.date,
            created_at,
        ),
    )?;

    Ok(connection.last_insert_rowid())
}

/// Get `owner`'s transactions, most recently recorded first.
pub(super) fn get_transactions(
    connection: &Connection,
    owner: UserId,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, kind, category, description, amount, date, created_at
            FROM \"transaction\"
            WHERE user_id = ?1
            ORDER BY created_at DESC, id DESC",
        )?
        .query_map([owner.as_i64()], map_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(|error| error.into()))
        .collect()
}

pub(super) fn update_transaction(
    connection: &Connection,
    owner: UserId,
    transaction: &Transaction,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\"
        SET kind = ?1, category = ?2, description = ?3, amount = ?4, date = ?5
        WHERE id = ?6 AND user_id = ?7",
        (
            transaction.kind,
            &transaction.category,
            &transaction.description,
            transaction.amount,
            transaction.date,
            transaction.id,
            owner.as_i64(),
        ),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

pub(super) fn delete_transaction(
    connection: &Connection,
    owner: UserId,
    id: TransactionId,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1 AND user_id = ?2",
        (id, owner.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::DeleteMissingTransaction);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        user_id: UserId::new(row.get(1)?),
        kind: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        amount: row.get(5)?,
        date: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod transaction_document_tests {
    use std::sync::{Arc, Mutex};

    use time::macros::date;

    use crate::{
        Error,
        backend::{DocumentBackend, Listener, sqlite::test_utils::get_test_backend},
        identity::UserId,
        transaction::{NewTransaction, Transaction, TransactionKind},
    };

    fn lunch(amount: f64) -> NewTransaction {
        NewTransaction {
            category: "Food".to_owned(),
            description: "Lunch".to_owned(),
            amount,
            kind: TransactionKind::Expense,
            date: date!(2025 - 10 - 05),
        }
    }

    fn recording_listener() -> (Listener<Vec<Transaction>>, Arc<Mutex<Vec<Vec<Transaction>>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener: Listener<Vec<Transaction>> =
            Arc::new(move |transactions| sink.lock().unwrap().push(transactions));

        (listener, received)
    }

    #[test]
    fn watch_delivers_initial_snapshot() {
        let backend = get_test_backend();
        let owner = UserId::new(1);
        backend.add_transaction(owner, &lunch(12.5)).unwrap();
        let (listener, received) = recording_listener();

        let _subscription = backend.watch_transactions(owner, listener).unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 1);
        assert_eq!(received[0][0].amount, 12.5);
    }

    #[test]
    fn add_delivers_newest_first() {
        let backend = get_test_backend();
        let owner = UserId::new(1);
        let (listener, received) = recording_listener();
        let _subscription = backend.watch_transactions(owner, listener).unwrap();

        let first = backend.add_transaction(owner, &lunch(1.0)).unwrap();
        let second = backend.add_transaction(owner, &lunch(2.0)).unwrap();

        let received = received.lock().unwrap();
        let ids: Vec<_> = received
            .last()
            .unwrap()
            .iter()
            .map(|transaction| transaction.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn owners_only_see_their_own_transactions() {
        let backend = get_test_backend();
        let alice = UserId::new(1);
        let bob = UserId::new(2);
        let (listener, received) = recording_listener();
        let _subscription = backend.watch_transactions(bob, listener).unwrap();

        backend.add_transaction(alice, &lunch(1.0)).unwrap();

        // Only the initial, empty snapshot.
        assert_eq!(*received.lock().unwrap(), vec![Vec::new()]);
    }

    #[test]
    fn update_overwrites_fields() {
        let backend = get_test_backend();
        let owner = UserId::new(1);
        backend.add_transaction(owner, &lunch(1.0)).unwrap();
        let (listener, received) = recording_listener();
        let _subscription = backend.watch_transactions(owner, listener).unwrap();
        let mut transaction = received.lock().unwrap()[0][0].clone();

        transaction.amount = 99.0;
        transaction.kind = TransactionKind::Income;
        backend.update_transaction(owner, &transaction).unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.last().unwrap(), &vec![transaction]);
    }

    #[test]
    fn update_of_another_owners_transaction_fails() {
        let backend = get_test_backend();
        let alice = UserId::new(1);
        backend.add_transaction(alice, &lunch(1.0)).unwrap();
        let (listener, received) = recording_listener();
        let _subscription = backend.watch_transactions(alice, listener).unwrap();
        let transaction = received.lock().unwrap()[0][0].clone();

        let result = backend.update_transaction(UserId::new(2), &transaction);

        assert_eq!(result, Err(Error::UpdateMissingTransaction));
    }

    #[test]
    fn delete_removes_transaction() {
        let backend = get_test_backend();
        let owner = UserId::new(1);
        let id = backend.add_transaction(owner, &lunch(1.0)).unwrap();
        let (listener, received) = recording_listener();
        let _subscription = backend.watch_transactions(owner, listener).unwrap();

        backend.delete_transaction(owner, id).unwrap();

        assert_eq!(received.lock().unwrap().last().unwrap(), &Vec::new());
    }

    #[test]
    fn delete_missing_transaction_fails() {
        let backend = get_test_backend();

        let result = backend.delete_transaction(UserId::new(1), 1337);

        assert_eq!(result, Err(Error::DeleteMissingTransaction));
    }

    #[test]
    fn cancelled_watch_receives_nothing() {
        let backend = get_test_backend();
        let owner = UserId::new(1);
        let (listener, received) = recording_listener();
        let subscription = backend.watch_transactions(owner, listener).unwrap();

        subscription.cancel();
        backend.add_transaction(owner, &lunch(1.0)).unwrap();

        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_writers_deliver_snapshots_in_write_order() {
        const WRITERS: usize = 8;

        for _ in 0..50 {
            let backend = get_test_backend();
            let owner = UserId::new(1);
            let (listener, received) = recording_listener();
            let _subscription = backend.watch_transactions(owner, listener).unwrap();

            std::thread::scope(|scope| {
                for _ in 0..WRITERS {
                    scope.spawn(|| backend.add_transaction(owner, &lunch(1.0)).unwrap());
                }
            });

            let lengths: Vec<usize> = received.lock().unwrap().iter().map(Vec::len).collect();
            assert_eq!(lengths, (0..=WRITERS).collect::<Vec<_>>());
        }
    }
}
