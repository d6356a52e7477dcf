//! Database layer for medlink: the user record store.
//!
//! Each user is one row; embedded collections live in JSON columns. Writers go
//! through per-field primitives so a background rewrite of one field never
//! races a request-path append on another.

mod schema;
mod users;
mod medicines;
mod access;
mod otps;
mod reports;

pub use schema::*;

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Store handle shared between request handling and background loops.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// An embedded collection of a user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    CurrentMedicines,
    SavedMedicines,
    Reports,
    Otps,
    AccessRequests,
    AuthorizedPatients,
}

impl UserField {
    fn column(&self) -> &'static str {
        match self {
            UserField::CurrentMedicines => "current_medicines",
            UserField::SavedMedicines => "saved_medicines",
            UserField::Reports => "reports",
            UserField::Otps => "otps",
            UserField::AccessRequests => "access_requests",
            UserField::AuthorizedPatients => "authorized_patients",
        }
    }

    /// Weak-reference fields skip entries they cannot decode instead of failing.
    fn is_lenient(&self) -> bool {
        matches!(self, UserField::AccessRequests | UserField::AuthorizedPatients)
    }
}

/// How a single user document is addressed.
#[derive(Debug, Clone, Copy)]
pub enum UserKey<'a> {
    Id(&'a str),
    Email(&'a str),
}

impl<'a> UserKey<'a> {
    fn column(&self) -> &'static str {
        match self {
            UserKey::Id(_) => "user_id",
            UserKey::Email(_) => "email",
        }
    }

    fn value(&self) -> &'a str {
        match self {
            UserKey::Id(v) | UserKey::Email(v) => v,
        }
    }
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Wrap into the shared handle used across tasks.
    pub fn into_shared(self) -> SharedDatabase {
        Arc::new(Mutex::new(self))
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Append one element to a field in a single statement, without reading it first.
    ///
    /// Returns false when no document matched the key.
    pub fn push_to_field<T: Serialize>(
        &self,
        key: UserKey<'_>,
        field: UserField,
        value: &T,
    ) -> DbResult<bool> {
        let json = serde_json::to_string(value)?;
        let sql = format!(
            "UPDATE users SET {col} = json_insert(COALESCE({col}, '[]'), '$[#]', json(?1)), \
             updated_at = datetime('now') WHERE {key} = ?2",
            col = field.column(),
            key = key.column(),
        );
        let rows_affected = self.conn.execute(&sql, rusqlite::params![json, key.value()])?;
        Ok(rows_affected > 0)
    }

    /// Read-modify-write one field inside an immediate transaction.
    ///
    /// Returns None when no document matched the key.
    pub fn update_field<T, R, F>(&self, key: UserKey<'_>, field: UserField, f: F) -> DbResult<Option<R>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let Some(mut items) = read_field::<T>(&tx, key, field)? else {
            return Ok(None);
        };
        let result = f(&mut items);
        write_field(&tx, key, field, &items)?;
        tx.commit()?;
        Ok(Some(result))
    }

    /// Read one field of a document. None when the document does not exist.
    pub fn get_field<T: DeserializeOwned>(&self, key: UserKey<'_>, field: UserField) -> DbResult<Option<Vec<T>>> {
        read_field(&self.conn, key, field)
    }
}

fn read_field<T: DeserializeOwned>(
    conn: &Connection,
    key: UserKey<'_>,
    field: UserField,
) -> DbResult<Option<Vec<T>>> {
    let sql = format!(
        "SELECT {col} FROM users WHERE {key} = ?1",
        col = field.column(),
        key = key.column(),
    );
    let raw: Option<Option<String>> = conn
        .query_row(&sql, [key.value()], |row| row.get(0))
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(decode_field(field, raw.as_deref())?)),
        None => Ok(None),
    }
}

fn write_field<T: Serialize>(
    conn: &Connection,
    key: UserKey<'_>,
    field: UserField,
    items: &[T],
) -> DbResult<()> {
    let encoded = serde_json::to_string(items)?;
    let sql = format!(
        "UPDATE users SET {col} = ?1, updated_at = datetime('now') WHERE {key} = ?2",
        col = field.column(),
        key = key.column(),
    );
    conn.execute(&sql, rusqlite::params![encoded, key.value()])?;
    Ok(())
}

/// Decode a JSON column into typed items.
pub(crate) fn decode_field<T: DeserializeOwned>(field: UserField, raw: Option<&str>) -> DbResult<Vec<T>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    if !field.is_lenient() {
        return Ok(serde_json::from_str(raw)?);
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(entries)) => Ok(entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect()),
        _ => {
            tracing::warn!(field = field.column(), "Malformed collection, treating as empty");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Role, User};

    fn setup_db() -> (Database, User) {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("Dr. Rao".into(), "rao@example.com".into(), "h".into(), Role::Doctor);
        db.insert_user(&user).unwrap();
        (db, user)
    }

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_open_file_reopens_existing_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medlink.db");

        let user = User::new("Asha".into(), "asha@example.com".into(), "h".into(), Role::Patient);
        {
            let db = Database::open(&path).unwrap();
            db.insert_user(&user).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert!(db.get_user(&user.user_id).unwrap().is_some());
    }

    #[test]
    fn test_push_and_get_field() {
        let (db, user) = setup_db();

        assert!(db
            .push_to_field(UserKey::Id(&user.user_id), UserField::AuthorizedPatients, &"p-1")
            .unwrap());
        assert!(db
            .push_to_field(UserKey::Id(&user.user_id), UserField::AuthorizedPatients, &"p-2")
            .unwrap());

        let ids: Vec<String> = db
            .get_field(UserKey::Id(&user.user_id), UserField::AuthorizedPatients)
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec!["p-1".to_string(), "p-2".to_string()]);
    }

    #[test]
    fn test_push_to_missing_user() {
        let (db, _) = setup_db();
        let pushed = db
            .push_to_field(UserKey::Id("nobody"), UserField::AuthorizedPatients, &"p-1")
            .unwrap();
        assert!(!pushed);
    }

    #[test]
    fn test_update_field_by_email() {
        let (db, user) = setup_db();
        db.push_to_field(UserKey::Id(&user.user_id), UserField::AuthorizedPatients, &"p-1")
            .unwrap();

        let removed = db
            .update_field(UserKey::Email("rao@example.com"), UserField::AuthorizedPatients, |ids: &mut Vec<String>| {
                let before = ids.len();
                ids.retain(|id| id != "p-1");
                before - ids.len()
            })
            .unwrap();
        assert_eq!(removed, Some(1));

        let missing = db
            .update_field(UserKey::Email("nobody@example.com"), UserField::AuthorizedPatients, |ids: &mut Vec<String>| ids.len())
            .unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_lenient_field_skips_bad_entries() {
        let (db, user) = setup_db();
        db.conn()
            .execute(
                "UPDATE users SET authorized_patients = '[\"p-1\", 42, \"p-2\"]' WHERE user_id = ?1",
                [&user.user_id],
            )
            .unwrap();

        let ids: Vec<String> = db
            .get_field(UserKey::Id(&user.user_id), UserField::AuthorizedPatients)
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec!["p-1".to_string(), "p-2".to_string()]);
    }

    #[test]
    fn test_strict_field_surfaces_decode_error() {
        let (db, user) = setup_db();
        db.conn()
            .execute("UPDATE users SET reports = 'not json' WHERE user_id = ?1", [&user.user_id])
            .unwrap();

        let result = db.get_field::<crate::models::Report>(UserKey::Id(&user.user_id), UserField::Reports);
        assert!(matches!(result, Err(DbError::Json(_))));
    }
}
