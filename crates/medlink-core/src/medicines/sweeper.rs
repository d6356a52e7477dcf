//! Expiry sweep: drop finished courses from current medicines.

use chrono::{DateTime, Utc};

use crate::db::{Database, DbResult};

/// Outcome of one sweep over every user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub users_swept: usize,
    pub medicines_expired: usize,
}

/// Sweep one user's current medicines. Saved medicines are untouched.
///
/// Returns the number of medicines expired; 0 when the user vanished.
pub fn sweep_user(db: &Database, user_id: &str, now: DateTime<Utc>) -> DbResult<usize> {
    Ok(db.retain_active_medicines(user_id, now)?.unwrap_or(0))
}

/// Sweep every user in one pass.
pub fn sweep_expired(db: &Database, now: DateTime<Utc>) -> DbResult<SweepStats> {
    let mut stats = SweepStats::default();
    for user_id in db.list_user_ids()? {
        stats.medicines_expired += sweep_user(db, &user_id, now)?;
        stats.users_swept += 1;
    }
    tracing::info!(
        users = stats.users_swept,
        expired = stats.medicines_expired,
        "Expiry sweep complete"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::medicines::MedicineManager;
    use crate::models::{NewMedicine, Role, User};
    use chrono::TimeZone;

    fn aspirin() -> NewMedicine {
        NewMedicine {
            name: "Aspirin".into(),
            consulting_date: "2024-01-01".into(),
            dosage_period: 7u32.into(),
            num_medicines: 1u32.into(),
            interval: 24u32.into(),
            times: vec!["08:00".into()],
        }
    }

    fn setup() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let user = User::new("U".into(), "u@example.com".into(), "h".into(), Role::Patient);
        db.insert_user(&user).unwrap();
        MedicineManager::new(&db).add_medicine(&user.user_id, aspirin()).unwrap();
        (db, user.user_id)
    }

    #[test]
    fn test_sweep_after_course_removes_from_current_only() {
        let (db, user_id) = setup();
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();

        let stats = sweep_expired(&db, now).unwrap();
        assert_eq!(stats, SweepStats { users_swept: 1, medicines_expired: 1 });

        let user = db.get_user(&user_id).unwrap().unwrap();
        assert!(user.current_medicines.is_empty());
        assert_eq!(user.saved_medicines.len(), 1);
        assert_eq!(user.saved_medicines[0].regimen_name(), Some("Aspirin"));
    }

    #[test]
    fn test_sweep_during_course_retains() {
        let (db, user_id) = setup();
        let now = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();

        let stats = sweep_expired(&db, now).unwrap();
        assert_eq!(stats.medicines_expired, 0);

        let user = db.get_user(&user_id).unwrap().unwrap();
        assert_eq!(user.current_medicines.len(), 1);
    }

    #[test]
    fn test_sweep_user_missing() {
        let (db, _) = setup();
        assert_eq!(sweep_user(&db, "nobody", Utc::now()).unwrap(), 0);
    }
}
