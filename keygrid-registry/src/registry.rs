//! The License Registry: the three lifecycle operations.

use crate::error::RegistryResult;
use crate::key::LicenseKey;
use crate::record::{
    ActivationDecision, DenialReason, LicenseRecord, LicenseStatus, LicenseType,
};
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use keygrid_types::{MachineId, UserId};
use tracing::{debug, info};

/// License key lifecycle: creation, activation, validity checks.
///
/// Cheap to clone; clones share the underlying store.
#[derive(Clone)]
pub struct LicenseRegistry {
    store: LicenseStore,
}

impl LicenseRegistry {
    /// Creates a registry over the given store.
    #[must_use]
    pub fn new(store: LicenseStore) -> Self {
        Self { store }
    }

    /// Mints a new unowned, unbound license record and returns its key.
    ///
    /// Administrative operation; end users never call this.
    pub fn create(
        &self,
        license_type: LicenseType,
        expires_at: Option<DateTime<Utc>>,
    ) -> RegistryResult<LicenseKey> {
        let record = LicenseRecord::new(license_type, expires_at);
        self.store.insert_record(&record)?;
        info!(key = %record.license_key, license_type = %license_type, "minted license");
        Ok(record.license_key)
    }

    /// Activates `license_key` for `user_id` on `machine_id`.
    ///
    /// Idempotent per (key, machine): re-activating from an already-bound
    /// machine succeeds without mutation, so clients may retry freely.
    /// The whole decision runs as one atomic read-modify-write against the
    /// store.
    pub fn activate(
        &self,
        license_key: &LicenseKey,
        user_id: UserId,
        machine_id: &MachineId,
    ) -> RegistryResult<LicenseStatus> {
        let now = Utc::now();
        let status = self.store.modify_record(license_key, |record| {
            let Some(record) = record else {
                return (LicenseStatus::invalid(DenialReason::UnknownKey), false);
            };
            match record.evaluate_activation(user_id, machine_id, now) {
                ActivationDecision::AlreadyBound => (LicenseStatus::valid_for(record), false),
                ActivationDecision::Refused(reason) => (LicenseStatus::invalid(reason), false),
                ActivationDecision::Bind => {
                    record.bind(user_id, machine_id.clone(), now);
                    (LicenseStatus::valid_for(record), true)
                }
            }
        })?;
        debug!(
            key = %license_key,
            user = %user_id,
            machine = %machine_id,
            valid = status.is_valid(),
            "activation attempt"
        );
        Ok(status)
    }

    /// Checks whether `user_id` holds a license covering `machine_id`.
    ///
    /// Scans the caller's records in storage order, skipping expired ones.
    /// A record with an empty machine list counts as covering any machine
    /// (claimed but not yet bound anywhere).
    pub fn check(
        &self,
        user_id: UserId,
        machine_id: &MachineId,
    ) -> RegistryResult<LicenseStatus> {
        let now = Utc::now();
        for record in self.store.records_owned_by(user_id)? {
            if record.is_expired(now) {
                continue;
            }
            if record.covers_machine(machine_id) {
                return Ok(LicenseStatus::valid_for(&record));
            }
        }
        Ok(LicenseStatus::invalid(DenialReason::NoLicenseForMachine))
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &LicenseStore {
        &self.store
    }
}
