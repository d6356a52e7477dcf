//! Background loop integration tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone, Utc};
use medlink_core::db::{Database, SharedDatabase};
use medlink_core::medicines::MedicineManager;
use medlink_core::models::{NewMedicine, Role, User};
use medlink_core::reminders::{MockTransport, NotificationTransport};
use medlink_scheduler::{sweep_once, BackgroundTasks, SchedulerConfig};

fn add_patient(db: &Database, email: &str, token: Option<&str>) -> String {
    let user = User::new("Asha".into(), email.into(), "h".into(), Role::Patient);
    db.insert_user(&user).unwrap();
    if let Some(token) = token {
        db.set_notification_token(&user.user_id, token).unwrap();
    }
    user.user_id
}

fn medicine(name: &str, consulting_date: &str, times: Vec<String>) -> NewMedicine {
    NewMedicine {
        name: name.into(),
        consulting_date: consulting_date.into(),
        dosage_period: "7".into(),
        num_medicines: 1u32.into(),
        interval: 24u32.into(),
        times,
    }
}

fn fast_config(dir: &tempfile::TempDir) -> SchedulerConfig {
    SchedulerConfig {
        database_path: dir.path().join("medlink.db"),
        poll_interval: Duration::from_millis(25),
        ..SchedulerConfig::default()
    }
}

#[tokio::test]
async fn test_dispatcher_sends_current_minute_reminder_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(&dir);
    let db = Database::open(&config.database_path).unwrap();

    let now = Local::now();
    let patient = add_patient(&db, "asha@example.com", Some("ExponentPushToken[abc]"));
    MedicineManager::new(&db)
        .add_medicine(
            &patient,
            medicine(
                "Aspirin",
                &now.format("%Y-%m-%d").to_string(),
                vec![now.format("%H:%M").to_string()],
            ),
        )
        .unwrap();
    let store: SharedDatabase = db.into_shared();

    let mock = Arc::new(MockTransport::new());
    let transport: Arc<dyn NotificationTransport> = mock.clone();
    let tasks = BackgroundTasks::start(store, transport, config);

    for _ in 0..80 {
        if !mock.sent().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    // Several more ticks must not resend
    tokio::time::sleep(Duration::from_millis(150)).await;
    tasks.shutdown().await;

    let sent = mock.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].token, "ExponentPushToken[abc]");
    assert!(sent[0].body.contains("Aspirin"));
}

#[tokio::test]
async fn test_dispatcher_skips_missing_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = fast_config(&dir);
    let db = Database::open(&config.database_path).unwrap();

    let now = Local::now();
    let patient = add_patient(&db, "asha@example.com", None);
    MedicineManager::new(&db)
        .add_medicine(
            &patient,
            medicine(
                "Aspirin",
                &now.format("%Y-%m-%d").to_string(),
                vec![now.format("%H:%M").to_string()],
            ),
        )
        .unwrap();

    let mock = Arc::new(MockTransport::new());
    let transport: Arc<dyn NotificationTransport> = mock.clone();
    let tasks = BackgroundTasks::start(db.into_shared(), transport, config);

    tokio::time::sleep(Duration::from_millis(200)).await;
    tasks.shutdown().await;

    assert!(mock.sent().is_empty());
}

#[tokio::test]
async fn test_shutdown_is_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fast_config(&dir);
    config.poll_interval = Duration::from_secs(3600);
    let db = Database::open(&config.database_path).unwrap();

    let transport: Arc<dyn NotificationTransport> = Arc::new(MockTransport::new());
    let tasks = BackgroundTasks::start(db.into_shared(), transport, config);
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(5), tasks.shutdown())
        .await
        .expect("background tasks did not stop");
}

#[test]
fn test_sweep_once_expires_per_user() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("medlink.db")).unwrap();
    let first = add_patient(&db, "asha@example.com", None);
    let second = add_patient(&db, "ravi@example.com", None);

    let manager = MedicineManager::new(&db);
    manager
        .add_medicine(&first, medicine("Aspirin", "2024-01-01", vec!["08:00".into()]))
        .unwrap();
    manager
        .add_medicine(&second, medicine("Metformin", "2024-01-04", vec!["09:00".into()]))
        .unwrap();

    let store = db.into_shared();
    let stats = sweep_once(&store, Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap()).unwrap();
    assert_eq!(stats.users_swept, 2);
    assert_eq!(stats.medicines_expired, 1);

    let db = store.lock().unwrap();
    assert!(db.current_medicines(&first).unwrap().unwrap().is_empty());
    assert_eq!(db.current_medicines(&second).unwrap().unwrap().len(), 1);
    assert_eq!(db.saved_medicines(&first).unwrap().unwrap().len(), 1);
}

#[test]
fn test_sweep_alongside_adds_keeps_new_medicines() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("medlink.db")).unwrap();
    let patient = add_patient(&db, "asha@example.com", None);
    MedicineManager::new(&db)
        .add_medicine(&patient, medicine("Expired", "2024-01-01", vec!["07:00".into()]))
        .unwrap();
    let store = db.into_shared();

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let adder = {
        let store = store.clone();
        let patient = patient.clone();
        std::thread::spawn(move || {
            for i in 0..40 {
                let db = store.lock().unwrap();
                MedicineManager::new(&db)
                    .add_medicine(&patient, medicine(&format!("Course {}", i), &today, vec!["08:00".into()]))
                    .unwrap();
            }
        })
    };

    let mut sweeps = 0;
    while !adder.is_finished() || sweeps == 0 {
        sweep_once(&store, Utc::now()).unwrap();
        sweeps += 1;
    }
    adder.join().unwrap();
    sweep_once(&store, Utc::now()).unwrap();

    let db = store.lock().unwrap();
    let current = db.current_medicines(&patient).unwrap().unwrap();
    let names: Vec<_> = current.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(current.len(), 40, "current medicines: {:?}", names);
    for i in 0..40 {
        assert!(names.contains(&format!("Course {}", i).as_str()));
    }
    assert!(!names.contains(&"Expired"));
    assert_eq!(db.saved_medicines(&patient).unwrap().unwrap().len(), 41);
}
