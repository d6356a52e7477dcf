//! Medicine collection operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, TransactionBehavior};

use super::{decode_field, read_field, write_field, Database, DbResult, UserField, UserKey};
use crate::models::{Medicine, MedicineSchedule, SavedMedicine};

impl Database {
    /// Append a regimen to both current and saved medicines in one statement.
    pub fn push_medicine(&self, user_id: &str, medicine: &Medicine) -> DbResult<bool> {
        let current = serde_json::to_string(medicine)?;
        let saved = serde_json::to_string(&SavedMedicine::Regimen(medicine.clone()))?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE users SET
                current_medicines = json_insert(current_medicines, '$[#]', json(?1)),
                saved_medicines = json_insert(saved_medicines, '$[#]', json(?2)),
                updated_at = datetime('now')
            WHERE user_id = ?3
            "#,
            params![current, saved, user_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Remove every regimen called `name` from current and saved medicines.
    ///
    /// Returns the number of entries removed, or None when the user is missing.
    pub fn remove_medicine_by_name(&self, user_id: &str, name: &str) -> DbResult<Option<usize>> {
        let key = UserKey::Id(user_id);
        let tx = rusqlite::Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;

        let Some(mut current) = read_field::<Medicine>(&tx, key, UserField::CurrentMedicines)? else {
            return Ok(None);
        };
        let mut saved = read_field::<SavedMedicine>(&tx, key, UserField::SavedMedicines)?
            .unwrap_or_default();

        let before = current.len() + saved.len();
        current.retain(|m| m.name != name);
        saved.retain(|m| m.regimen_name() != Some(name));
        let removed = before - current.len() - saved.len();

        write_field(&tx, key, UserField::CurrentMedicines, &current)?;
        write_field(&tx, key, UserField::SavedMedicines, &saved)?;
        tx.commit()?;
        Ok(Some(removed))
    }

    /// Rewrite current medicines keeping only those still active at `now`.
    ///
    /// The field is always rewritten, even when nothing expired. Returns the
    /// number of medicines dropped, or None when the user is missing.
    pub fn retain_active_medicines(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<Option<usize>> {
        self.update_field(UserKey::Id(user_id), UserField::CurrentMedicines, |meds: &mut Vec<Medicine>| {
            let before = meds.len();
            meds.retain(|m| m.is_active(now));
            before - meds.len()
        })
    }

    /// Append an entry to saved medicines only.
    pub fn push_saved_medicine(&self, user_id: &str, entry: &SavedMedicine) -> DbResult<bool> {
        self.push_to_field(UserKey::Id(user_id), UserField::SavedMedicines, entry)
    }

    /// Current medicines, None when the user is missing.
    pub fn current_medicines(&self, user_id: &str) -> DbResult<Option<Vec<Medicine>>> {
        self.get_field(UserKey::Id(user_id), UserField::CurrentMedicines)
    }

    /// Token and current medicines of every user, for building reminder triggers.
    pub fn medicine_schedules(&self) -> DbResult<Vec<MedicineSchedule>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, notification_token, current_medicines FROM users ORDER BY created_at, user_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut schedules = Vec::new();
        for row in rows {
            let (user_id, notification_token, raw) = row?;
            schedules.push(MedicineSchedule {
                user_id,
                notification_token,
                medicines: decode_field(UserField::CurrentMedicines, Some(&raw))?,
            });
        }
        Ok(schedules)
    }

    /// Saved medicines, None when the user is missing.
    pub fn saved_medicines(&self, user_id: &str) -> DbResult<Option<Vec<SavedMedicine>>> {
        self.get_field(UserKey::Id(user_id), UserField::SavedMedicines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MedicineDetails, Role, User};
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("Asha".into(), "asha@example.com".into(), "h".into(), Role::Patient);
        db.insert_user(&user).unwrap();
        (db, user.user_id)
    }

    fn medicine(name: &str, start: (i32, u32, u32), days: u32) -> Medicine {
        Medicine {
            name: name.into(),
            consulting_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            dosage_period: days,
            num_medicines: 1,
            interval: 12,
            times: vec![NaiveTime::from_hms_opt(8, 0, 0).unwrap()],
            created_at: Utc.with_ymd_and_hms(start.0, start.1, start.2, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_push_medicine_writes_both_lists() {
        let (db, user_id) = setup_db();
        db.push_medicine(&user_id, &medicine("Aspirin", (2024, 1, 1), 7)).unwrap();

        let current = db.current_medicines(&user_id).unwrap().unwrap();
        let saved = db.saved_medicines(&user_id).unwrap().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].regimen_name(), Some("Aspirin"));
    }

    #[test]
    fn test_remove_by_name_spares_details() {
        let (db, user_id) = setup_db();
        db.push_medicine(&user_id, &medicine("Aspirin", (2024, 1, 1), 7)).unwrap();
        db.push_medicine(&user_id, &medicine("Aspirin", (2024, 2, 1), 7)).unwrap();
        db.push_medicine(&user_id, &medicine("Metformin", (2024, 1, 1), 30)).unwrap();
        db.push_saved_medicine(
            &user_id,
            &SavedMedicine::Details(MedicineDetails {
                brand_name: Some("Aspirin".into()),
                ..Default::default()
            }),
        )
        .unwrap();

        let removed = db.remove_medicine_by_name(&user_id, "Aspirin").unwrap();
        assert_eq!(removed, Some(4));

        let current = db.current_medicines(&user_id).unwrap().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "Metformin");
        let saved = db.saved_medicines(&user_id).unwrap().unwrap();
        assert_eq!(saved.len(), 2);
    }

    #[test]
    fn test_retain_active_keeps_history() {
        let (db, user_id) = setup_db();
        db.push_medicine(&user_id, &medicine("Aspirin", (2024, 1, 1), 7)).unwrap();
        db.push_medicine(&user_id, &medicine("Metformin", (2024, 1, 1), 30)).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();
        let dropped = db.retain_active_medicines(&user_id, now).unwrap();
        assert_eq!(dropped, Some(1));

        let current = db.current_medicines(&user_id).unwrap().unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].name, "Metformin");
        assert_eq!(db.saved_medicines(&user_id).unwrap().unwrap().len(), 2);
    }

    #[test]
    fn test_medicine_schedules_include_token() {
        let (db, user_id) = setup_db();
        db.push_medicine(&user_id, &medicine("Aspirin", (2024, 1, 1), 7)).unwrap();
        db.set_notification_token(&user_id, "tok").unwrap();

        let schedules = db.medicine_schedules().unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].notification_token.as_deref(), Some("tok"));
        assert_eq!(schedules[0].medicines[0].name, "Aspirin");
    }

    #[test]
    fn test_missing_user() {
        let (db, _) = setup_db();
        assert!(db.current_medicines("nobody").unwrap().is_none());
        assert!(!db.push_medicine("nobody", &medicine("A", (2024, 1, 1), 1)).unwrap());
        assert_eq!(db.remove_medicine_by_name("nobody", "A").unwrap(), None);
        assert_eq!(db.retain_active_medicines("nobody", Utc::now()).unwrap(), None);
    }
}
