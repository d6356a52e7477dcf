//! User document models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{AccessRequest, Medicine, OtpEntry, Report, SavedMedicine};

/// Account role. Access grants only make sense on doctor documents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Doctor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            other => Err(format!("Role must be either 'patient' or 'doctor', got '{}'", other)),
        }
    }
}

/// A user document: profile, credentials and every embedded collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    /// UUID, generated on creation
    pub user_id: String,
    pub name: String,
    pub email: String,
    /// Already-hashed password; hashing happens outside this crate
    pub password_hash: String,
    pub role: Role,
    /// Active dosing regimens
    pub current_medicines: Vec<Medicine>,
    /// History and favorites, never swept
    pub saved_medicines: Vec<SavedMedicine>,
    pub reports: Vec<Report>,
    pub otps: Vec<OtpEntry>,
    /// Pending patient requests (doctor documents only)
    pub access_requests: Vec<AccessRequest>,
    /// Patient ids this doctor may read (doctor documents only)
    pub authorized_patients: Vec<String>,
    /// Push token registered by the user's device
    pub notification_token: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Create a new user with empty collections.
    pub fn new(name: String, email: String, password_hash: String, role: Role) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            user_id: uuid::Uuid::new_v4().to_string(),
            name,
            email,
            password_hash,
            role,
            current_medicines: Vec::new(),
            saved_medicines: Vec::new(),
            reports: Vec::new(),
            otps: Vec::new(),
            access_requests: Vec::new(),
            authorized_patients: Vec::new(),
            notification_token: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    /// Check whether this doctor has been granted access to a patient.
    pub fn has_authorized(&self, patient_id: &str) -> bool {
        self.is_doctor() && self.authorized_patients.iter().any(|id| id == patient_id)
    }

    /// Profile with credential and OTP fields removed.
    pub fn redacted(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            current_medicines: self.current_medicines.clone(),
            saved_medicines: self.saved_medicines.clone(),
            reports: self.reports.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// A user profile safe to hand to another party.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub current_medicines: Vec<Medicine>,
    pub saved_medicines: Vec<SavedMedicine>,
    pub reports: Vec<Report>,
    pub created_at: String,
}

/// Search hit when a patient looks for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorSummary {
    pub doctor_id: String,
    pub name: String,
    pub email: String,
}
