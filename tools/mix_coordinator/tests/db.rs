use tempfile::TempDir;

use mix_coordinator::db::{JsonFileDb, SessionDb, SessionUpdate, Transition};
use mix_coordinator::state::{MixSession, MixStatus};

fn sample_session(id: &str) -> MixSession {
    MixSession::new(
        id.to_string(),
        "user-wallet".to_string(),
        1.5,
        format!("deposit-{id}"),
        vec![9u8; 64],
        1_700_000_000,
        1_800,
    )
}

#[test]
fn create_then_get_round_trips() {
    let temp = TempDir::new().expect("tempdir");
    let db = JsonFileDb::new(temp.path()).expect("db");

    let session = sample_session("a");
    db.create(&session).expect("create");

    let loaded = db.get("a").expect("get").expect("present");
    assert_eq!(loaded.id, session.id);
    assert_eq!(loaded.status, MixStatus::AwaitingDeposit);
    assert_eq!(loaded.deposit_secret_encrypted, session.deposit_secret_encrypted);
    assert_eq!(loaded.expires_at, session.expires_at);

    assert!(db.get("missing").expect("get").is_none());
}

#[test]
fn duplicate_create_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let db = JsonFileDb::new(temp.path()).expect("db");

    let session = sample_session("a");
    db.create(&session).expect("create");
    assert!(db.create(&session).is_err());
}

#[test]
fn transition_applies_only_from_expected_status() {
    let temp = TempDir::new().expect("tempdir");
    let db = JsonFileDb::new(temp.path()).expect("db");
    db.create(&sample_session("a")).expect("create");

    let update = SessionUpdate {
        tx_signature_in: Some("sig-in".to_string()),
        deposit_detected_at: Some(1_700_000_100),
        ..SessionUpdate::default()
    };
    let applied = db
        .transition("a", MixStatus::AwaitingDeposit, MixStatus::DepositDetected, update)
        .expect("transition");
    let Transition::Applied(session) = applied else {
        panic!("expected applied transition");
    };
    assert_eq!(session.status, MixStatus::DepositDetected);
    assert_eq!(session.tx_signature_in.as_deref(), Some("sig-in"));

    // A second caller expecting the old status observes the updated record
    // instead of re-applying.
    let conflict = db
        .transition(
            "a",
            MixStatus::AwaitingDeposit,
            MixStatus::DepositDetected,
            SessionUpdate::default(),
        )
        .expect("transition");
    let Transition::Conflict(current) = conflict else {
        panic!("expected conflict");
    };
    assert_eq!(current.status, MixStatus::DepositDetected);
    assert_eq!(current.tx_signature_in.as_deref(), Some("sig-in"));
}

#[test]
fn find_by_signature_locates_owner() {
    let temp = TempDir::new().expect("tempdir");
    let db = JsonFileDb::new(temp.path()).expect("db");
    db.create(&sample_session("a")).expect("create");
    db.create(&sample_session("b")).expect("create");

    let update = SessionUpdate {
        tx_signature_in: Some("shared-sig".to_string()),
        ..SessionUpdate::default()
    };
    db.transition("b", MixStatus::AwaitingDeposit, MixStatus::DepositDetected, update)
        .expect("transition");

    let owner = db
        .find_by_signature("shared-sig")
        .expect("find")
        .expect("present");
    assert_eq!(owner.id, "b");

    assert!(db.find_by_signature("unknown").expect("find").is_none());
}

#[test]
fn completed_fields_are_set_together() {
    let temp = TempDir::new().expect("tempdir");
    let db = JsonFileDb::new(temp.path()).expect("db");
    db.create(&sample_session("a")).expect("create");

    db.transition(
        "a",
        MixStatus::AwaitingDeposit,
        MixStatus::DepositDetected,
        SessionUpdate {
            tx_signature_in: Some("in".to_string()),
            ..SessionUpdate::default()
        },
    )
    .expect("detect");
    db.transition(
        "a",
        MixStatus::DepositDetected,
        MixStatus::Processing,
        SessionUpdate::default(),
    )
    .expect("processing");
    db.transition(
        "a",
        MixStatus::Processing,
        MixStatus::Completed,
        SessionUpdate {
            output_address: Some("out-addr".to_string()),
            output_secret: Some(vec![1u8; 64]),
            tx_signature_out: Some("out-sig".to_string()),
            completed_at: Some(1_700_000_500),
            ..SessionUpdate::default()
        },
    )
    .expect("complete");

    let session = db.get("a").expect("get").expect("present");
    assert_eq!(session.status, MixStatus::Completed);
    assert_eq!(session.output_address.as_deref(), Some("out-addr"));
    assert_eq!(session.tx_signature_out.as_deref(), Some("out-sig"));
    assert_eq!(session.completed_at, Some(1_700_000_500));
    // Earlier fields survive the later transitions.
    assert_eq!(session.tx_signature_in.as_deref(), Some("in"));
}
