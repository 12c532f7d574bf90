use chrono::{Duration, Utc};
use keygrid_registry::{
    ActivationDecision, DenialReason, LicenseRecord, LicenseType, MAX_MACHINES_PER_LICENSE,
};
use keygrid_types::{MachineId, UserId};
use std::str::FromStr;

fn machine(n: usize) -> MachineId {
    MachineId::new(format!("machine-{n}"))
}

// ── Activation decision ───────────────────────────────────────────

#[test]
fn fresh_record_binds_first_machine() {
    let record = LicenseRecord::new(LicenseType::Pro, None);
    let decision = record.evaluate_activation(UserId::new(1), &machine(1), Utc::now());
    assert_eq!(decision, ActivationDecision::Bind);
}

#[test]
fn owner_mismatch_is_refused() {
    let mut record = LicenseRecord::new(LicenseType::Pro, None);
    record.bind(UserId::new(1), machine(1), Utc::now());

    let decision = record.evaluate_activation(UserId::new(2), &machine(2), Utc::now());
    assert_eq!(
        decision,
        ActivationDecision::Refused(DenialReason::OwnedByAnotherUser)
    );
}

#[test]
fn ownership_conflict_wins_over_expiry() {
    // Expired and owned by someone else: the mismatch fires first.
    let expires_at = Utc::now() - Duration::days(1);
    let mut record = LicenseRecord::new(LicenseType::Trial, Some(expires_at));
    record.owner_user_id = Some(UserId::new(1));

    let decision = record.evaluate_activation(UserId::new(2), &machine(1), Utc::now());
    assert_eq!(
        decision,
        ActivationDecision::Refused(DenialReason::OwnedByAnotherUser)
    );
}

#[test]
fn expired_refused_for_owner() {
    let expires_at = Utc::now() - Duration::days(1);
    let mut record = LicenseRecord::new(LicenseType::Trial, Some(expires_at));
    record.owner_user_id = Some(UserId::new(1));

    let decision = record.evaluate_activation(UserId::new(1), &machine(1), Utc::now());
    assert_eq!(
        decision,
        ActivationDecision::Refused(DenialReason::Expired { expires_at })
    );
}

#[test]
fn expiry_checked_before_already_bound() {
    // An expired license reports expiry even from a machine that is bound.
    let expires_at = Utc::now() - Duration::days(1);
    let mut record = LicenseRecord::new(LicenseType::Trial, Some(expires_at));
    record.owner_user_id = Some(UserId::new(1));
    record.bound_machine_ids.push(machine(1));

    let decision = record.evaluate_activation(UserId::new(1), &machine(1), Utc::now());
    assert_eq!(
        decision,
        ActivationDecision::Refused(DenialReason::Expired { expires_at })
    );
}

#[test]
fn already_bound_machine_is_idempotent() {
    let mut record = LicenseRecord::new(LicenseType::Pro, None);
    record.bind(UserId::new(1), machine(1), Utc::now());

    let decision = record.evaluate_activation(UserId::new(1), &machine(1), Utc::now());
    assert_eq!(decision, ActivationDecision::AlreadyBound);
}

#[test]
fn full_license_refuses_new_machine() {
    let mut record = LicenseRecord::new(LicenseType::Enterprise, None);
    for n in 0..MAX_MACHINES_PER_LICENSE {
        record.bind(UserId::new(1), machine(n), Utc::now());
    }

    let decision = record.evaluate_activation(UserId::new(1), &machine(99), Utc::now());
    assert_eq!(
        decision,
        ActivationDecision::Refused(DenialReason::MachineLimitReached)
    );
}

#[test]
fn full_license_still_accepts_bound_machine() {
    let mut record = LicenseRecord::new(LicenseType::Enterprise, None);
    for n in 0..MAX_MACHINES_PER_LICENSE {
        record.bind(UserId::new(1), machine(n), Utc::now());
    }

    let decision = record.evaluate_activation(UserId::new(1), &machine(0), Utc::now());
    assert_eq!(decision, ActivationDecision::AlreadyBound);
}

#[test]
fn bind_claims_owner_and_appends_in_order() {
    let now = Utc::now();
    let mut record = LicenseRecord::new(LicenseType::Pro, None);
    record.bind(UserId::new(7), machine(1), now);
    record.bind(UserId::new(7), machine(2), now);

    assert_eq!(record.owner_user_id, Some(UserId::new(7)));
    assert_eq!(record.bound_machine_ids, vec![machine(1), machine(2)]);
    assert_eq!(record.starts_at, now);
}

// ── Expiry and check coverage ─────────────────────────────────────

#[test]
fn expiry_is_strictly_after() {
    let now = Utc::now();
    let record = LicenseRecord::new(LicenseType::Trial, Some(now));
    // now == expires_at is not yet expired
    assert!(!record.is_expired(now));
    assert!(record.is_expired(now + Duration::seconds(1)));
}

#[test]
fn perpetual_record_never_expires() {
    let record = LicenseRecord::new(LicenseType::Pro, None);
    assert!(!record.is_expired(Utc::now() + Duration::days(365 * 100)));
}

#[test]
fn empty_machine_list_covers_any_machine() {
    let record = LicenseRecord::new(LicenseType::Free, None);
    assert!(record.covers_machine(&machine(1)));
    assert!(record.covers_machine(&machine(2)));
}

#[test]
fn nonempty_machine_list_covers_only_bound_machines() {
    let mut record = LicenseRecord::new(LicenseType::Pro, None);
    record.bind(UserId::new(1), machine(1), Utc::now());
    assert!(record.covers_machine(&machine(1)));
    assert!(!record.covers_machine(&machine(2)));
}

// ── LicenseType ───────────────────────────────────────────────────

#[test]
fn license_type_parses_all_tiers() {
    assert_eq!(LicenseType::from_str("free").unwrap(), LicenseType::Free);
    assert_eq!(LicenseType::from_str("trial").unwrap(), LicenseType::Trial);
    assert_eq!(LicenseType::from_str("pro").unwrap(), LicenseType::Pro);
    assert_eq!(
        LicenseType::from_str("enterprise").unwrap(),
        LicenseType::Enterprise
    );
    assert_eq!(LicenseType::from_str("PRO").unwrap(), LicenseType::Pro);
}

#[test]
fn license_type_rejects_unknown() {
    assert!(LicenseType::from_str("platinum").is_err());
}

#[test]
fn license_type_display_roundtrip() {
    for tier in [
        LicenseType::Free,
        LicenseType::Trial,
        LicenseType::Pro,
        LicenseType::Enterprise,
    ] {
        assert_eq!(LicenseType::from_str(&tier.to_string()).unwrap(), tier);
    }
}

// ── Denial messages ───────────────────────────────────────────────

#[test]
fn denial_messages_match_wire_contract() {
    assert_eq!(DenialReason::UnknownKey.to_string(), "Invalid license key");
    assert_eq!(
        DenialReason::OwnedByAnotherUser.to_string(),
        "License already assigned to another user"
    );
    assert_eq!(
        DenialReason::Expired {
            expires_at: Utc::now()
        }
        .to_string(),
        "License expired"
    );
    assert_eq!(
        DenialReason::MachineLimitReached.to_string(),
        "Maximum 5 machines per license"
    );
    assert_eq!(
        DenialReason::NoLicenseForMachine.to_string(),
        "No valid license for this machine"
    );
}
