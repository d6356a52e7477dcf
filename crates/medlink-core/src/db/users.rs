//! User document operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{decode_field, Database, DbError, DbResult, UserField, UserKey};
use crate::models::{Role, User};

const USER_COLUMNS: &str = r#"
    user_id, name, email, password_hash, role,
    current_medicines, saved_medicines, reports, otps,
    access_requests, authorized_patients, notification_token,
    created_at, updated_at
"#;

impl Database {
    /// Insert a new user document.
    pub fn insert_user(&self, user: &User) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO users (
                user_id, name, email, password_hash, role,
                current_medicines, saved_medicines, reports, otps,
                access_requests, authorized_patients, notification_token,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
            params![
                user.user_id,
                user.name,
                user.email,
                user.password_hash,
                user.role.as_str(),
                serde_json::to_string(&user.current_medicines)?,
                serde_json::to_string(&user.saved_medicines)?,
                serde_json::to_string(&user.reports)?,
                serde_json::to_string(&user.otps)?,
                serde_json::to_string(&user.access_requests)?,
                serde_json::to_string(&user.authorized_patients)?,
                user.notification_token,
                user.created_at,
                user.updated_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Constraint(format!("User already exists: {}", user.email)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: &str) -> DbResult<Option<User>> {
        self.find_user(UserKey::Id(user_id))
    }

    /// Get a user by email.
    pub fn get_user_by_email(&self, email: &str) -> DbResult<Option<User>> {
        self.find_user(UserKey::Email(email))
    }

    fn find_user(&self, key: UserKey<'_>) -> DbResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, key.column());
        self.conn
            .query_row(&sql, [key.value()], UserRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// IDs of every user, in creation order.
    pub fn list_user_ids(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM users ORDER BY created_at, user_id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// List all user documents.
    pub fn list_users(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at, user_id", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.try_into()?);
        }
        Ok(users)
    }

    /// List users holding a role, ordered by name.
    pub fn list_users_by_role(&self, role: Role) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users WHERE role = ?1 ORDER BY name", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([role.as_str()], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?.try_into()?);
        }
        Ok(users)
    }

    /// Store or replace the device push token.
    pub fn set_notification_token(&self, user_id: &str, token: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE users SET notification_token = ?1, updated_at = datetime('now') WHERE user_id = ?2",
            [token, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Replace the stored password hash.
    pub fn set_password_hash(&self, key: UserKey<'_>, password_hash: &str) -> DbResult<bool> {
        let sql = format!(
            "UPDATE users SET password_hash = ?1, updated_at = datetime('now') WHERE {} = ?2",
            key.column()
        );
        let rows_affected = self.conn.execute(&sql, [password_hash, key.value()])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct UserRow {
    user_id: String,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    current_medicines: String,
    saved_medicines: String,
    reports: String,
    otps: String,
    access_requests: Option<String>,
    authorized_patients: String,
    notification_token: Option<String>,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(UserRow {
            user_id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            role: row.get(4)?,
            current_medicines: row.get(5)?,
            saved_medicines: row.get(6)?,
            reports: row.get(7)?,
            otps: row.get(8)?,
            access_requests: row.get(9)?,
            authorized_patients: row.get(10)?,
            notification_token: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = DbError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<Role>().map_err(DbError::Constraint)?;

        Ok(User {
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            current_medicines: decode_field(UserField::CurrentMedicines, Some(&row.current_medicines))?,
            saved_medicines: decode_field(UserField::SavedMedicines, Some(&row.saved_medicines))?,
            reports: decode_field(UserField::Reports, Some(&row.reports))?,
            otps: decode_field(UserField::Otps, Some(&row.otps))?,
            access_requests: decode_field(UserField::AccessRequests, row.access_requests.as_deref())?,
            authorized_patients: decode_field(UserField::AuthorizedPatients, Some(&row.authorized_patients))?,
            notification_token: row.notification_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
