//! Accounts, password reset OTPs, push tokens and reports.

use crate::db::{Database, UserKey};
use crate::error::{CareError, CareResult};
use crate::models::{DoctorSummary, OtpEntry, Report, Role, User, UserProfile};

/// Minimum Jaro-Winkler similarity for a fuzzy doctor-name hit.
const DOCTOR_MATCH_THRESHOLD: f64 = 0.85;

pub struct AccountService<'a> {
    db: &'a Database,
}

impl<'a> AccountService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Register a user. `password_hash` must already be hashed by the caller.
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str, role: &str) -> CareResult<User> {
        let role: Role = role.parse().map_err(CareError::Validation)?;
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() || email.is_empty() {
            return Err(CareError::Validation("name and email are required".into()));
        }
        if password_hash.is_empty() {
            return Err(CareError::Validation("password is required".into()));
        }

        let user = User::new(name.to_string(), email, password_hash.to_string(), role);
        self.db.insert_user(&user)?;

        tracing::info!(user_id = %user.user_id, role = %user.role, "User created");
        Ok(user)
    }

    pub fn get_user(&self, user_id: &str) -> CareResult<Option<User>> {
        Ok(self.db.get_user(user_id)?)
    }

    pub fn get_user_by_email(&self, email: &str) -> CareResult<Option<User>> {
        Ok(self.db.get_user_by_email(&email.trim().to_lowercase())?)
    }

    /// The caller's own profile, password hash and OTPs removed.
    pub fn user_details(&self, user_id: &str) -> CareResult<UserProfile> {
        self.db
            .get_user(user_id)?
            .map(|user| user.redacted())
            .ok_or_else(|| CareError::NotFound(format!("user {}", user_id)))
    }

    /// Doctors whose name contains the query or is a close fuzzy match.
    pub fn search_doctors(&self, query: &str) -> CareResult<Vec<DoctorSummary>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Err(CareError::Validation("search query is required".into()));
        }

        let doctors = self.db.list_users_by_role(Role::Doctor)?;
        Ok(doctors
            .into_iter()
            .filter(|doctor| name_matches(&doctor.name, &query))
            .map(|doctor| DoctorSummary {
                doctor_id: doctor.user_id,
                name: doctor.name,
                email: doctor.email,
            })
            .collect())
    }

    pub fn save_notification_token(&self, user_id: &str, token: &str) -> CareResult<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CareError::Validation("notification token is required".into()));
        }
        if !self.db.set_notification_token(user_id, token)? {
            return Err(CareError::NotFound(format!("user {}", user_id)));
        }
        tracing::debug!(user_id, "Notification token saved");
        Ok(())
    }

    /// Append a fresh OTP for the email and return its code.
    ///
    /// Earlier entries are kept; the list grows with every reset request.
    pub fn issue_otp(&self, email: &str) -> CareResult<String> {
        let email = email.trim().to_lowercase();
        let entry = OtpEntry::generate();
        if !self.db.push_otp(&email, &entry)? {
            return Err(CareError::NotFound(format!("user with email {}", email)));
        }
        tracing::info!(email = %email, "OTP issued");
        Ok(entry.code)
    }

    /// Redeem a code. Returns whether an unverified matching entry existed.
    pub fn verify_otp(&self, email: &str, code: &str) -> CareResult<bool> {
        let email = email.trim().to_lowercase();
        Ok(self.db.mark_otp_verified(&email, code.trim())?)
    }

    pub fn reset_password(&self, email: &str, code: &str, new_password_hash: &str) -> CareResult<()> {
        if new_password_hash.is_empty() {
            return Err(CareError::Validation("password is required".into()));
        }
        if !self.verify_otp(email, code)? {
            return Err(CareError::Unauthorized);
        }

        let email = email.trim().to_lowercase();
        if !self.db.set_password_hash(UserKey::Email(&email), new_password_hash)? {
            return Err(CareError::NotFound(format!("user with email {}", email)));
        }
        tracing::info!(email = %email, "Password reset");
        Ok(())
    }

    pub fn save_report(&self, user_id: &str, summary: &str, extracted_text: &str) -> CareResult<Report> {
        if summary.trim().is_empty() || extracted_text.trim().is_empty() {
            return Err(CareError::Validation("summary and extracted text are required".into()));
        }
        let report = Report::new(summary.to_string(), extracted_text.to_string());
        if !self.db.push_report(user_id, &report)? {
            return Err(CareError::NotFound(format!("user {}", user_id)));
        }
        Ok(report)
    }

    /// Reports in insertion order; empty when the user does not exist.
    pub fn list_reports(&self, user_id: &str) -> CareResult<Vec<Report>> {
        Ok(self.db.reports(user_id)?.unwrap_or_default())
    }
}

fn name_matches(name: &str, query: &str) -> bool {
    let name = name.to_lowercase();
    if name.contains(query) {
        return true;
    }
    name.split_whitespace()
        .chain(std::iter::once(name.as_str()))
        .any(|part| strsim::jaro_winkler(part, query) >= DOCTOR_MATCH_THRESHOLD)
}
