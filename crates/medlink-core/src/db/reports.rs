//! Report operations.

use super::{Database, DbResult, UserField, UserKey};
use crate::models::Report;

impl Database {
    /// Append a report. Reports are never rewritten.
    pub fn push_report(&self, user_id: &str, report: &Report) -> DbResult<bool> {
        self.push_to_field(UserKey::Id(user_id), UserField::Reports, report)
    }

    /// Reports of a user, None when the user is missing.
    pub fn reports(&self, user_id: &str) -> DbResult<Option<Vec<Report>>> {
        self.get_field(UserKey::Id(user_id), UserField::Reports)
    }
}
