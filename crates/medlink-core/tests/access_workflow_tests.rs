//! Access-grant workflow integration tests.

use medlink_core::access::AccessWorkflow;
use medlink_core::db::Database;
use medlink_core::error::CareError;
use medlink_core::models::{GrantState, Role, User};
use proptest::prelude::*;

fn add_user(db: &Database, name: &str, role: Role) -> String {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    let user = User::new(name.to_string(), email, "hash".to_string(), role);
    db.insert_user(&user).unwrap();
    user.user_id
}

fn setup() -> (Database, String, String) {
    let db = Database::open_in_memory().unwrap();
    let patient = add_user(&db, "Asha", Role::Patient);
    let doctor = add_user(&db, "Meera Rao", Role::Doctor);
    (db, patient, doctor)
}

#[test]
fn test_request_then_accept_moves_patient() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);

    workflow.request_access(&patient, &doctor).unwrap();
    workflow.accept_request(&doctor, &patient).unwrap();

    let requests = db.access_requests(&doctor).unwrap().unwrap();
    assert!(requests.iter().all(|r| r.patient_id != patient));

    let authorized = db.authorized_patients(&doctor).unwrap().unwrap();
    assert_eq!(authorized, vec![patient]);
}

#[test]
fn test_request_on_doctor_without_requests_field() {
    let (db, patient, doctor) = setup();
    db.conn()
        .execute("UPDATE users SET access_requests = NULL WHERE user_id = ?1", [&doctor])
        .unwrap();

    let request = AccessWorkflow::new(&db).request_access(&patient, &doctor).unwrap();

    let requests = db.access_requests(&doctor).unwrap().unwrap();
    assert_eq!(requests, vec![request]);
    assert_eq!(requests[0].patient_id, patient);
    assert_eq!(requests[0].doctor_id, doctor);
}

#[test]
fn test_request_on_malformed_requests_field() {
    let (db, patient, doctor) = setup();
    db.conn()
        .execute("UPDATE users SET access_requests = '{\"oops\": 1}' WHERE user_id = ?1", [&doctor])
        .unwrap();

    AccessWorkflow::new(&db).request_access(&patient, &doctor).unwrap();

    let requests = db.access_requests(&doctor).unwrap().unwrap();
    assert_eq!(requests.len(), 1);
}

#[test]
fn test_duplicate_requests_are_kept() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);

    workflow.request_access(&patient, &doctor).unwrap();
    workflow.request_access(&patient, &doctor).unwrap();
    assert_eq!(db.access_requests(&doctor).unwrap().unwrap().len(), 2);

    // Accepting consumes both
    assert_eq!(workflow.accept_request(&doctor, &patient).unwrap(), 2);
}

#[test]
fn test_request_to_non_doctor_is_not_found() {
    let (db, patient, _doctor) = setup();
    let other_patient = add_user(&db, "Ravi", Role::Patient);
    let workflow = AccessWorkflow::new(&db);

    assert!(matches!(
        workflow.request_access(&patient, &other_patient),
        Err(CareError::NotFound(_))
    ));
    assert!(matches!(
        workflow.request_access(&patient, "no-such-doctor"),
        Err(CareError::NotFound(_))
    ));
}

#[test]
fn test_accept_without_pending_request() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);

    assert_eq!(workflow.accept_request(&doctor, &patient).unwrap(), 0);
    assert_eq!(workflow.grant_state(&doctor, &patient).unwrap(), GrantState::Authorized);
}

#[test]
fn test_details_forbidden_while_pending() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);

    workflow.request_access(&patient, &doctor).unwrap();
    assert_eq!(workflow.grant_state(&doctor, &patient).unwrap(), GrantState::Requested);
    assert!(matches!(
        workflow.get_patient_details(&doctor, &patient),
        Err(CareError::Forbidden)
    ));
}

#[test]
fn test_details_forbidden_for_missing_or_non_doctor() {
    let (db, patient, _doctor) = setup();
    let other_patient = add_user(&db, "Ravi", Role::Patient);
    let workflow = AccessWorkflow::new(&db);

    assert!(matches!(
        workflow.get_patient_details("no-such-doctor", &patient),
        Err(CareError::Forbidden)
    ));

    // A patient document listing the id does not make it a doctor
    db.conn()
        .execute(
            "UPDATE users SET authorized_patients = json_array(?1) WHERE user_id = ?2",
            [&patient, &other_patient],
        )
        .unwrap();
    assert!(matches!(
        workflow.get_patient_details(&other_patient, &patient),
        Err(CareError::Forbidden)
    ));
}

#[test]
fn test_listing_requires_doctor_identity() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);
    workflow.request_access(&patient, &doctor).unwrap();

    assert!(matches!(
        workflow.list_requests(&doctor, &patient),
        Err(CareError::Unauthorized)
    ));
    assert!(matches!(
        workflow.get_authorized_patient_data(&doctor, &patient),
        Err(CareError::Unauthorized)
    ));

    let pending = workflow.list_requests(&doctor, &doctor).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].patient_name, "Asha");
    assert_eq!(pending[0].patient_email, "asha@example.com");
}

#[test]
fn test_dangling_patients_are_skipped() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);

    workflow.request_access("deleted-patient", &doctor).unwrap();
    workflow.request_access(&patient, &doctor).unwrap();
    let pending = workflow.list_requests(&doctor, &doctor).unwrap();
    assert_eq!(pending.len(), 1);

    workflow.accept_request(&doctor, "deleted-patient").unwrap();
    workflow.accept_request(&doctor, &patient).unwrap();
    let data = workflow.get_authorized_patient_data(&doctor, &doctor).unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].patient_id, patient);
}

#[test]
fn test_patient_details_are_redacted() {
    let (db, patient, doctor) = setup();
    let workflow = AccessWorkflow::new(&db);
    workflow.accept_request(&doctor, &patient).unwrap();

    let profile = workflow.get_patient_details(&doctor, &patient).unwrap();
    assert_eq!(profile.user_id, patient);

    let json = serde_json::to_value(&profile).unwrap();
    assert!(json.get("password_hash").is_none());
    assert!(json.get("otps").is_none());
}

proptest! {
    #[test]
    fn prop_accept_is_idempotent(accepts in 1usize..6, requests in 0usize..4) {
        let (db, patient, doctor) = setup();
        let workflow = AccessWorkflow::new(&db);

        for _ in 0..requests {
            workflow.request_access(&patient, &doctor).unwrap();
        }
        for _ in 0..accepts {
            workflow.accept_request(&doctor, &patient).unwrap();
        }

        let authorized = db.authorized_patients(&doctor).unwrap().unwrap();
        prop_assert_eq!(authorized.iter().filter(|id| **id == patient).count(), 1);
        prop_assert!(db.access_requests(&doctor).unwrap().unwrap().is_empty());
    }
}
