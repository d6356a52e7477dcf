//! Doctor/patient access grant workflow.
//!
//! Per (patient, doctor) pair: `None -> Requested -> Authorized`. Requests
//! never expire and cannot be rejected; acceptance is unconditional and
//! permanent.

use crate::db::Database;
use crate::error::{CareError, CareResult};
use crate::models::{
    AccessRequest, AuthorizedPatientData, GrantState, PendingRequest, User, UserProfile,
};

/// Coordinates access requests and authorized reads against the store.
pub struct AccessWorkflow<'a> {
    db: &'a Database,
}

impl<'a> AccessWorkflow<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a patient's request on the doctor's document.
    ///
    /// Duplicate requests are kept as separate entries.
    pub fn request_access(&self, patient_id: &str, doctor_id: &str) -> CareResult<AccessRequest> {
        self.load_doctor(doctor_id)?;

        self.db.ensure_access_requests(doctor_id)?;
        let request = AccessRequest::new(patient_id.to_string(), doctor_id.to_string());
        if !self.db.push_access_request(doctor_id, &request)? {
            return Err(CareError::NotFound(format!("doctor {}", doctor_id)));
        }

        tracing::info!(patient_id, doctor_id, "Access requested");
        Ok(request)
    }

    /// Pending requests with patient contact details, for the doctor only.
    ///
    /// Requests whose patient no longer exists are skipped.
    pub fn list_requests(&self, doctor_id: &str, requester_id: &str) -> CareResult<Vec<PendingRequest>> {
        if requester_id != doctor_id {
            return Err(CareError::Unauthorized);
        }
        let doctor = self.load_doctor(doctor_id)?;

        let mut pending = Vec::with_capacity(doctor.access_requests.len());
        for request in &doctor.access_requests {
            match self.db.get_user(&request.patient_id)? {
                Some(patient) => pending.push(PendingRequest {
                    patient_id: patient.user_id,
                    patient_name: patient.name,
                    patient_email: patient.email,
                }),
                None => {
                    tracing::debug!(patient_id = %request.patient_id, "Skipping request from missing patient")
                }
            }
        }
        Ok(pending)
    }

    /// Grant a patient's data to the doctor and consume their pending requests.
    ///
    /// Succeeds even when no request was pending. Returns the number of
    /// requests consumed.
    pub fn accept_request(&self, doctor_id: &str, patient_id: &str) -> CareResult<usize> {
        self.load_doctor(doctor_id)?;

        let consumed = self
            .db
            .accept_access_request(doctor_id, patient_id)?
            .ok_or_else(|| CareError::NotFound(format!("doctor {}", doctor_id)))?;

        tracing::info!(doctor_id, patient_id, consumed, "Access granted");
        Ok(consumed)
    }

    /// Medicines and reports of every authorized patient, for the doctor only.
    pub fn get_authorized_patient_data(
        &self,
        doctor_id: &str,
        requester_id: &str,
    ) -> CareResult<Vec<AuthorizedPatientData>> {
        if requester_id != doctor_id {
            return Err(CareError::Unauthorized);
        }
        let doctor = self.load_doctor(doctor_id)?;

        let mut data = Vec::with_capacity(doctor.authorized_patients.len());
        for patient_id in &doctor.authorized_patients {
            if let Some(patient) = self.db.get_user(patient_id)? {
                data.push(AuthorizedPatientData {
                    patient_id: patient.user_id,
                    name: patient.name,
                    current_medicines: patient.current_medicines,
                    saved_medicines: patient.saved_medicines,
                    reports: patient.reports,
                });
            }
        }
        Ok(data)
    }

    /// Redacted profile of a patient the doctor has been granted.
    pub fn get_patient_details(&self, doctor_id: &str, patient_id: &str) -> CareResult<UserProfile> {
        let authorized = self
            .db
            .get_user(doctor_id)?
            .is_some_and(|doctor| doctor.has_authorized(patient_id));
        if !authorized {
            return Err(CareError::Forbidden);
        }

        self.db
            .get_user(patient_id)?
            .map(|patient| patient.redacted())
            .ok_or_else(|| CareError::NotFound(format!("patient {}", patient_id)))
    }

    /// Current workflow state of a (patient, doctor) pair.
    pub fn grant_state(&self, doctor_id: &str, patient_id: &str) -> CareResult<GrantState> {
        let doctor = self.load_doctor(doctor_id)?;
        if doctor.has_authorized(patient_id) {
            Ok(GrantState::Authorized)
        } else if doctor.access_requests.iter().any(|r| r.patient_id == patient_id) {
            Ok(GrantState::Requested)
        } else {
            Ok(GrantState::None)
        }
    }

    fn load_doctor(&self, doctor_id: &str) -> CareResult<User> {
        self.db
            .get_user(doctor_id)?
            .filter(User::is_doctor)
            .ok_or_else(|| CareError::NotFound(format!("doctor {}", doctor_id)))
    }
}
