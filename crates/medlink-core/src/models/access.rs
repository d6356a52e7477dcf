//! Access grant models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Medicine, Report, SavedMedicine};

/// A patient's request to share their records with a doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessRequest {
    pub patient_id: String,
    pub doctor_id: String,
    pub requested_at: DateTime<Utc>,
}

impl AccessRequest {
    pub fn new(patient_id: String, doctor_id: String) -> Self {
        Self {
            patient_id,
            doctor_id,
            requested_at: Utc::now(),
        }
    }
}

/// Where a (patient, doctor) pair sits in the grant workflow.
///
/// There is no rejected or revoked state: once authorized, access stays.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum GrantState {
    None,
    Requested,
    Authorized,
}

/// A pending request as shown to the doctor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRequest {
    pub patient_id: String,
    pub patient_name: String,
    pub patient_email: String,
}

/// Records of one authorized patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizedPatientData {
    pub patient_id: String,
    pub name: String,
    pub current_medicines: Vec<Medicine>,
    pub saved_medicines: Vec<SavedMedicine>,
    pub reports: Vec<Report>,
}
