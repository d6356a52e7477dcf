//! MedLink Core Library
//!
//! Medicine reminders and doctor/patient record sharing over a local user
//! record store.
//!
//! # Architecture
//!
//! ```text
//!  Patient app ──► add_medicine ──► users.current_medicines ◄── Expiry Sweeper (00:00 daily)
//!       │                              │
//!       │                              └──► Reminder table ──► NotificationTransport
//!       │                                   (rebuilt each tick)
//!       └──► request_access ──► doctor.access_requests
//!                                      │
//!                         Doctor accepts (atomic move)
//!                                      │
//!                              doctor.authorized_patients ──► patient data reads
//! ```
//!
//! # Modules
//!
//! - [`db`]: SQLite user record store with atomic per-field primitives
//! - [`models`]: Domain types (User, Medicine, AccessRequest, etc.)
//! - [`access`]: Access-grant workflow
//! - [`medicines`]: Medicine lifecycle and expiry sweep
//! - [`reminders`]: Reminder trigger table and notification delivery
//! - [`accounts`]: Accounts, OTP password reset, push tokens and reports
//! - [`schedule`]: Daily wall-clock job bookkeeping

pub mod access;
pub mod accounts;
pub mod auth;
pub mod db;
pub mod error;
pub mod medicines;
pub mod models;
pub mod reminders;
pub mod schedule;

// Re-export commonly used types
pub use access::AccessWorkflow;
pub use accounts::AccountService;
pub use auth::{Authenticator, SessionRegistry};
pub use db::{Database, DbError, SharedDatabase};
pub use error::{CareError, CareResult};
pub use medicines::{sweep_expired, sweep_user, MedicineManager, SweepStats};
pub use models::{
    AccessRequest, AuthorizedPatientData, DoctorSummary, DoseQuantity, GrantState, Medicine,
    MedicineDetails, MedicineSchedule, NewMedicine, PendingRequest, Report, Role, SavedMedicine,
    User, UserProfile,
};
pub use reminders::{
    deliver, deliver_all, DeliveryOutcome, MockTransport, NotificationTransport, Reminder,
    ReminderTable, TickReport, TransportError,
};
pub use schedule::DailyJob;

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::Utc;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum MedLinkError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,
}

impl From<db::DbError> for MedLinkError {
    fn from(e: db::DbError) -> Self {
        CareError::from(e).into()
    }
}

impl From<CareError> for MedLinkError {
    fn from(e: CareError) -> Self {
        match e {
            CareError::Validation(msg) => MedLinkError::InvalidInput(msg),
            CareError::NotFound(what) => MedLinkError::NotFound(what),
            CareError::Unauthorized => MedLinkError::Unauthorized,
            CareError::Forbidden => MedLinkError::Forbidden,
            CareError::Conflict(what) => MedLinkError::Conflict(what),
            CareError::Store(e) => MedLinkError::DatabaseError(e.to_string()),
            CareError::LockPoisoned => MedLinkError::DatabaseError("Lock poisoned".into()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MedLinkError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        MedLinkError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<MedLinkCore>, MedLinkError> {
    let db = Database::open(&path)?;
    Ok(Arc::new(MedLinkCore::new(db.into_shared())))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<MedLinkCore>, MedLinkError> {
    let db = Database::open_in_memory()?;
    Ok(Arc::new(MedLinkCore::new(db.into_shared())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe facade for FFI callers.
#[derive(uniffi::Object)]
pub struct MedLinkCore {
    db: SharedDatabase,
    sessions: SessionRegistry,
}

impl MedLinkCore {
    /// Wrap a store that may also be shared with background jobs.
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            db,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn shared_database(&self) -> SharedDatabase {
        Arc::clone(&self.db)
    }

    /// Resolve a session token to the caller's user id.
    fn authenticate(&self, session_token: &str) -> Result<String, MedLinkError> {
        let authenticator: &dyn Authenticator = &self.sessions;
        authenticator
            .verify(session_token)
            .ok_or(MedLinkError::Unauthorized)
    }
}

#[uniffi::export]
impl MedLinkCore {
    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Open a session for a user whose credentials the host already checked.
    pub fn open_session(&self, user_id: String) -> Result<String, MedLinkError> {
        {
            let db = self.db.lock()?;
            if db.get_user(&user_id)?.is_none() {
                return Err(MedLinkError::NotFound(format!("user {}", user_id)));
            }
        }
        Ok(self.sessions.issue(&user_id)?)
    }

    /// Returns false if the session was unknown.
    pub fn close_session(&self, session_token: String) -> Result<bool, MedLinkError> {
        Ok(self.sessions.revoke(&session_token)?)
    }

    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Register a user. The password must already be hashed.
    pub fn create_user(
        &self,
        name: String,
        email: String,
        password_hash: String,
        role: String,
    ) -> Result<FfiUserProfile, MedLinkError> {
        let db = self.db.lock()?;
        let user = AccountService::new(&db).create_user(&name, &email, &password_hash, &role)?;
        Ok(user.redacted().into())
    }

    /// Own profile, credentials removed.
    pub fn user_details(&self, user_id: String) -> Result<FfiUserProfile, MedLinkError> {
        let db = self.db.lock()?;
        Ok(AccountService::new(&db).user_details(&user_id)?.into())
    }

    /// Look up a user id by email.
    pub fn find_user_id(&self, email: String) -> Result<Option<String>, MedLinkError> {
        let db = self.db.lock()?;
        let user = AccountService::new(&db).get_user_by_email(&email)?;
        Ok(user.map(|u| u.user_id))
    }

    pub fn search_doctors(&self, query: String) -> Result<Vec<FfiDoctorSummary>, MedLinkError> {
        let db = self.db.lock()?;
        let doctors = AccountService::new(&db).search_doctors(&query)?;
        Ok(doctors.into_iter().map(|d| d.into()).collect())
    }

    pub fn save_notification_token(&self, user_id: String, token: String) -> Result<(), MedLinkError> {
        let db = self.db.lock()?;
        AccountService::new(&db).save_notification_token(&user_id, &token)?;
        Ok(())
    }

    /// Issue a password reset code. Delivering it is up to the caller.
    pub fn issue_otp(&self, email: String) -> Result<String, MedLinkError> {
        let db = self.db.lock()?;
        Ok(AccountService::new(&db).issue_otp(&email)?)
    }

    pub fn verify_otp(&self, email: String, code: String) -> Result<bool, MedLinkError> {
        let db = self.db.lock()?;
        Ok(AccountService::new(&db).verify_otp(&email, &code)?)
    }

    pub fn reset_password(
        &self,
        email: String,
        code: String,
        new_password_hash: String,
    ) -> Result<(), MedLinkError> {
        let db = self.db.lock()?;
        AccountService::new(&db).reset_password(&email, &code, &new_password_hash)?;
        Ok(())
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    pub fn save_report(
        &self,
        user_id: String,
        summary: String,
        extracted_text: String,
    ) -> Result<FfiReport, MedLinkError> {
        let db = self.db.lock()?;
        let report = AccountService::new(&db).save_report(&user_id, &summary, &extracted_text)?;
        Ok(report.into())
    }

    pub fn list_reports(&self, user_id: String) -> Result<Vec<FfiReport>, MedLinkError> {
        let db = self.db.lock()?;
        let reports = AccountService::new(&db).list_reports(&user_id)?;
        Ok(reports.into_iter().map(|r| r.into()).collect())
    }

    // =========================================================================
    // Medicine Operations
    // =========================================================================

    /// Add a dosing regimen. Quantities accept text like "7 days".
    pub fn add_medicine(&self, user_id: String, input: FfiNewMedicine) -> Result<FfiMedicine, MedLinkError> {
        let db = self.db.lock()?;
        let medicine = MedicineManager::new(&db).add_medicine(&user_id, input.into())?;
        Ok(medicine.into())
    }

    pub fn list_current_medicines(&self, user_id: String) -> Result<Vec<FfiMedicine>, MedLinkError> {
        let db = self.db.lock()?;
        let medicines = MedicineManager::new(&db).list_current(&user_id)?;
        Ok(medicines.into_iter().map(|m| m.into()).collect())
    }

    pub fn list_saved_medicines(&self, user_id: String) -> Result<Vec<FfiSavedMedicine>, MedLinkError> {
        let db = self.db.lock()?;
        let saved = MedicineManager::new(&db).list_saved(&user_id)?;
        Ok(saved.into_iter().map(|s| s.into()).collect())
    }

    /// Remove a regimen by name. Returns how many entries were removed.
    pub fn delete_medicine(&self, user_id: String, name: String) -> Result<u32, MedLinkError> {
        let db = self.db.lock()?;
        let removed = MedicineManager::new(&db).delete_medicine(&user_id, &name)?;
        Ok(removed as u32)
    }

    pub fn save_medicine(&self, user_id: String, details: FfiMedicineDetails) -> Result<(), MedLinkError> {
        let db = self.db.lock()?;
        MedicineManager::new(&db).save_medicine(&user_id, details.into())?;
        Ok(())
    }

    /// Run the expiry sweep now instead of waiting for midnight.
    pub fn sweep_expired_medicines(&self) -> Result<FfiSweepStats, MedLinkError> {
        let db = self.db.lock()?;
        let stats = sweep_expired(&db, Utc::now())?;
        Ok(stats.into())
    }

    // =========================================================================
    // Access Grant Operations
    // =========================================================================

    pub fn request_access(&self, patient_id: String, doctor_id: String) -> Result<(), MedLinkError> {
        let db = self.db.lock()?;
        AccessWorkflow::new(&db).request_access(&patient_id, &doctor_id)?;
        Ok(())
    }

    /// Pending requests, visible only to the doctor's own session.
    pub fn list_requests(
        &self,
        doctor_id: String,
        session_token: String,
    ) -> Result<Vec<FfiPendingRequest>, MedLinkError> {
        let requester_id = self.authenticate(&session_token)?;
        let db = self.db.lock()?;
        let pending = AccessWorkflow::new(&db).list_requests(&doctor_id, &requester_id)?;
        Ok(pending.into_iter().map(|p| p.into()).collect())
    }

    /// Returns the number of pending requests consumed.
    pub fn accept_request(&self, doctor_id: String, patient_id: String) -> Result<u32, MedLinkError> {
        let db = self.db.lock()?;
        let consumed = AccessWorkflow::new(&db).accept_request(&doctor_id, &patient_id)?;
        Ok(consumed as u32)
    }

    /// Records of every authorized patient, visible only to the doctor's own session.
    pub fn get_authorized_patient_data(
        &self,
        doctor_id: String,
        session_token: String,
    ) -> Result<Vec<FfiAuthorizedPatient>, MedLinkError> {
        let requester_id = self.authenticate(&session_token)?;
        let db = self.db.lock()?;
        let patients = AccessWorkflow::new(&db).get_authorized_patient_data(&doctor_id, &requester_id)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn get_patient_details(
        &self,
        doctor_id: String,
        patient_id: String,
    ) -> Result<FfiUserProfile, MedLinkError> {
        let db = self.db.lock()?;
        Ok(AccessWorkflow::new(&db).get_patient_details(&doctor_id, &patient_id)?.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe medicine regimen.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub name: String,
    pub consulting_date: String,
    pub dosage_period: u32,
    pub num_medicines: u32,
    pub interval: u32,
    pub times: Vec<String>,
    pub created_at: String,
    /// None when the course never ends within the supported date range
    pub expires_at: Option<String>,
}

impl From<Medicine> for FfiMedicine {
    fn from(medicine: Medicine) -> Self {
        Self {
            times: medicine.time_labels(),
            expires_at: medicine.expires_at().map(|t| t.to_rfc3339()),
            consulting_date: medicine.consulting_date.format("%Y-%m-%d").to_string(),
            created_at: medicine.created_at.to_rfc3339(),
            name: medicine.name,
            dosage_period: medicine.dosage_period,
            num_medicines: medicine.num_medicines,
            interval: medicine.interval,
        }
    }
}

/// FFI-safe medicine input. Quantities are free text.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewMedicine {
    pub name: String,
    pub consulting_date: String,
    pub dosage_period: String,
    pub num_medicines: String,
    pub interval: String,
    pub times: Vec<String>,
}

impl From<FfiNewMedicine> for NewMedicine {
    fn from(input: FfiNewMedicine) -> Self {
        NewMedicine {
            name: input.name,
            consulting_date: input.consulting_date,
            dosage_period: input.dosage_period.into(),
            num_medicines: input.num_medicines.into(),
            interval: input.interval.into(),
            times: input.times,
        }
    }
}

/// FFI-safe drug details.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicineDetails {
    pub brand_name: Option<String>,
    pub generic_name: Option<String>,
    pub purpose: Option<String>,
    pub active_ingredient: Option<String>,
    pub dosage_and_administration: Option<String>,
    pub image_url: Option<String>,
    pub do_not_use: Option<String>,
    pub when_using: Option<String>,
    pub indications_and_usage: Option<String>,
}

impl From<FfiMedicineDetails> for MedicineDetails {
    fn from(d: FfiMedicineDetails) -> Self {
        MedicineDetails {
            brand_name: d.brand_name,
            generic_name: d.generic_name,
            purpose: d.purpose,
            active_ingredient: d.active_ingredient,
            dosage_and_administration: d.dosage_and_administration,
            image_url: d.image_url,
            do_not_use: d.do_not_use,
            when_using: d.when_using,
            indications_and_usage: d.indications_and_usage,
        }
    }
}

impl From<MedicineDetails> for FfiMedicineDetails {
    fn from(d: MedicineDetails) -> Self {
        Self {
            brand_name: d.brand_name,
            generic_name: d.generic_name,
            purpose: d.purpose,
            active_ingredient: d.active_ingredient,
            dosage_and_administration: d.dosage_and_administration,
            image_url: d.image_url,
            do_not_use: d.do_not_use,
            when_using: d.when_using,
            indications_and_usage: d.indications_and_usage,
        }
    }
}

/// FFI-safe saved medicine entry. Exactly one of `regimen` or `details` is set.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSavedMedicine {
    pub regimen: Option<FfiMedicine>,
    pub details: Option<FfiMedicineDetails>,
}

impl From<SavedMedicine> for FfiSavedMedicine {
    fn from(saved: SavedMedicine) -> Self {
        match saved {
            SavedMedicine::Regimen(m) => Self {
                regimen: Some(m.into()),
                details: None,
            },
            SavedMedicine::Details(d) => Self {
                regimen: None,
                details: Some(d.into()),
            },
        }
    }
}

/// FFI-safe report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReport {
    pub summary: String,
    pub extracted_text: String,
    pub files: Vec<String>,
    pub created_at: String,
}

impl From<Report> for FfiReport {
    fn from(report: Report) -> Self {
        Self {
            summary: report.summary,
            extracted_text: report.extracted_text,
            files: report.files,
            created_at: report.created_at.to_rfc3339(),
        }
    }
}

/// FFI-safe user profile (no credentials).
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiUserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub current_medicines: Vec<FfiMedicine>,
    pub saved_medicines: Vec<FfiSavedMedicine>,
    pub reports: Vec<FfiReport>,
    pub created_at: String,
}

impl From<UserProfile> for FfiUserProfile {
    fn from(profile: UserProfile) -> Self {
        Self {
            user_id: profile.user_id,
            name: profile.name,
            email: profile.email,
            role: profile.role.to_string(),
            current_medicines: profile.current_medicines.into_iter().map(|m| m.into()).collect(),
            saved_medicines: profile.saved_medicines.into_iter().map(|s| s.into()).collect(),
            reports: profile.reports.into_iter().map(|r| r.into()).collect(),
            created_at: profile.created_at,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDoctorSummary {
    pub doctor_id: String,
    pub name: String,
    pub email: String,
}

impl From<DoctorSummary> for FfiDoctorSummary {
    fn from(d: DoctorSummary) -> Self {
        Self {
            doctor_id: d.doctor_id,
            name: d.name,
            email: d.email,
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPendingRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub patient_email: String,
}

impl From<PendingRequest> for FfiPendingRequest {
    fn from(p: PendingRequest) -> Self {
        Self {
            patient_id: p.patient_id,
            patient_name: p.patient_name,
            patient_email: p.patient_email,
        }
    }
}

/// FFI-safe records of one authorized patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuthorizedPatient {
    pub patient_id: String,
    pub name: String,
    pub current_medicines: Vec<FfiMedicine>,
    pub saved_medicines: Vec<FfiSavedMedicine>,
    pub reports: Vec<FfiReport>,
}

impl From<AuthorizedPatientData> for FfiAuthorizedPatient {
    fn from(p: AuthorizedPatientData) -> Self {
        Self {
            patient_id: p.patient_id,
            name: p.name,
            current_medicines: p.current_medicines.into_iter().map(|m| m.into()).collect(),
            saved_medicines: p.saved_medicines.into_iter().map(|s| s.into()).collect(),
            reports: p.reports.into_iter().map(|r| r.into()).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSweepStats {
    pub users_swept: u32,
    pub medicines_expired: u32,
}

impl From<SweepStats> for FfiSweepStats {
    fn from(stats: SweepStats) -> Self {
        Self {
            users_swept: stats.users_swept as u32,
            medicines_expired: stats.medicines_expired as u32,
        }
    }
}
