//! Medicine lifecycle: add, list, delete, save, and expiry.

mod sweeper;

pub use sweeper::*;

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::db::Database;
use crate::error::{CareError, CareResult};
use crate::models::{
    parse_time_of_day, DoseQuantity, Medicine, MedicineDetails, NewMedicine, SavedMedicine,
};

/// Manages a user's current and saved medicines.
pub struct MedicineManager<'a> {
    db: &'a Database,
}

impl<'a> MedicineManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Validate the input and append the regimen to current and saved medicines.
    pub fn add_medicine(&self, user_id: &str, input: NewMedicine) -> CareResult<Medicine> {
        let medicine = build_medicine(input, Utc::now())?;
        if !self.db.push_medicine(user_id, &medicine)? {
            return Err(CareError::NotFound(format!("user {}", user_id)));
        }

        tracing::info!(user_id, medicine = %medicine.name, times = ?medicine.time_labels(), "Medicine added");
        Ok(medicine)
    }

    /// Active medicines; empty when the user does not exist.
    pub fn list_current(&self, user_id: &str) -> CareResult<Vec<Medicine>> {
        Ok(self.db.current_medicines(user_id)?.unwrap_or_default())
    }

    /// Saved medicines history; empty when the user does not exist.
    pub fn list_saved(&self, user_id: &str) -> CareResult<Vec<SavedMedicine>> {
        Ok(self.db.saved_medicines(user_id)?.unwrap_or_default())
    }

    /// Remove every regimen with this name. Not an error when nothing matches.
    pub fn delete_medicine(&self, user_id: &str, name: &str) -> CareResult<usize> {
        let removed = self.db.remove_medicine_by_name(user_id, name)?.unwrap_or(0);
        tracing::debug!(user_id, medicine = name, removed, "Medicine deleted");
        Ok(removed)
    }

    /// Bookmark drug details in saved medicines. No de-duplication.
    pub fn save_medicine(&self, user_id: &str, details: MedicineDetails) -> CareResult<()> {
        if details.is_empty() {
            return Err(CareError::Validation("Missing medicine details".into()));
        }
        if !self
            .db
            .push_saved_medicine(user_id, &SavedMedicine::Details(details))?
        {
            return Err(CareError::NotFound(format!("user {}", user_id)));
        }
        Ok(())
    }
}

/// Turn raw client input into a validated regimen.
pub fn build_medicine(input: NewMedicine, now: DateTime<Utc>) -> CareResult<Medicine> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CareError::Validation("name is required".into()));
    }

    let consulting_date = NaiveDate::parse_from_str(input.consulting_date.trim(), "%Y-%m-%d")
        .map_err(|_| {
            CareError::Validation(format!(
                "consulting_date must be YYYY-MM-DD, got '{}'",
                input.consulting_date
            ))
        })?;

    let dosage_period = positive_quantity("dosage_period", &input.dosage_period)?;
    if consulting_date
        .checked_add_days(Days::new(u64::from(dosage_period)))
        .is_none()
    {
        return Err(CareError::Validation(format!(
            "dosage_period of {} days runs past the supported date range",
            dosage_period
        )));
    }
    let num_medicines = positive_quantity("num_medicines", &input.num_medicines)?;
    let interval = positive_quantity("interval", &input.interval)?;

    let mut times = Vec::with_capacity(input.times.len());
    for raw in &input.times {
        let time = parse_time_of_day(raw)
            .ok_or_else(|| CareError::Validation(format!("times entries must be HH:MM, got '{}'", raw)))?;
        if !times.contains(&time) {
            times.push(time);
        }
    }
    if times.is_empty() {
        return Err(CareError::Validation("at least one reminder time is required".into()));
    }

    Ok(Medicine {
        name,
        consulting_date,
        dosage_period,
        num_medicines,
        interval,
        times,
        created_at: now,
    })
}

fn positive_quantity(field: &str, quantity: &DoseQuantity) -> CareResult<u32> {
    match quantity.value() {
        Some(n) if n >= 1 => Ok(n),
        _ => Err(CareError::Validation(format!(
            "{} must contain a positive number, got {:?}",
            field, quantity
        ))),
    }
}
