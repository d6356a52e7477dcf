//! Access request and authorization operations on doctor documents.

use rusqlite::TransactionBehavior;

use super::{read_field, write_field, Database, DbResult, UserField, UserKey};
use crate::models::AccessRequest;

impl Database {
    /// Reset `access_requests` to an empty array when it is absent or not an array.
    ///
    /// Returns true when a reset happened.
    pub fn ensure_access_requests(&self, doctor_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE users SET access_requests = '[]', updated_at = datetime('now')
            WHERE user_id = ?1 AND CASE
                WHEN access_requests IS NULL THEN 1
                WHEN json_valid(access_requests) = 0 THEN 1
                WHEN json_type(access_requests) <> 'array' THEN 1
                ELSE 0
            END = 1
            "#,
            [doctor_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Append an access request to the doctor's document.
    pub fn push_access_request(&self, doctor_id: &str, request: &AccessRequest) -> DbResult<bool> {
        self.push_to_field(UserKey::Id(doctor_id), UserField::AccessRequests, request)
    }

    /// Drop every request from `patient_id` and add the patient to the authorized set.
    ///
    /// Both fields change in one transaction. Returns how many requests were
    /// consumed, or None when the doctor document is missing.
    pub fn accept_access_request(&self, doctor_id: &str, patient_id: &str) -> DbResult<Option<usize>> {
        let key = UserKey::Id(doctor_id);
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let Some(mut requests) = read_field::<AccessRequest>(&tx, key, UserField::AccessRequests)? else {
            return Ok(None);
        };
        let mut authorized = read_field::<String>(&tx, key, UserField::AuthorizedPatients)?
            .unwrap_or_default();

        let before = requests.len();
        requests.retain(|r| r.patient_id != patient_id);
        let consumed = before - requests.len();

        if !authorized.iter().any(|id| id == patient_id) {
            authorized.push(patient_id.to_string());
        }

        write_field(&tx, key, UserField::AccessRequests, &requests)?;
        write_field(&tx, key, UserField::AuthorizedPatients, &authorized)?;
        tx.commit()?;
        Ok(Some(consumed))
    }

    /// Pending requests on a doctor document, None when the doctor is missing.
    pub fn access_requests(&self, doctor_id: &str) -> DbResult<Option<Vec<AccessRequest>>> {
        self.get_field(UserKey::Id(doctor_id), UserField::AccessRequests)
    }

    /// Patient ids a doctor may read, None when the doctor is missing.
    pub fn authorized_patients(&self, doctor_id: &str) -> DbResult<Option<Vec<String>>> {
        self.get_field(UserKey::Id(doctor_id), UserField::AuthorizedPatients)
    }
}
