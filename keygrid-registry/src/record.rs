//! License records and the activation decision rules.
//!
//! [`LicenseRecord`] is the sole persisted entity. The activation state
//! machine is a pure function over a record ([`LicenseRecord::evaluate_activation`])
//! so it can be tested without a database; the store supplies atomicity.

use crate::key::LicenseKey;
use chrono::{DateTime, Utc};
use keygrid_types::{LicenseId, MachineId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum number of machines that may be bound to a single license.
pub const MAX_MACHINES_PER_LICENSE: usize = 5;

/// The license tier, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseType {
    Free,
    Trial,
    Pro,
    Enterprise,
}

impl LicenseType {
    /// Returns the lowercase wire name of this tier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Trial => "trial",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for LicenseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LicenseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "trial" => Ok(Self::Trial),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(format!("unknown license type: {other}")),
        }
    }
}

/// Why a license was refused, carried inside [`LicenseStatus::Invalid`].
///
/// The `Display` strings are the user-facing error messages returned over
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// No record exists for the presented key.
    UnknownKey,
    /// The license is already owned by a different user.
    OwnedByAnotherUser,
    /// The license is past its expiry timestamp.
    Expired {
        /// Carried for display at the boundary.
        expires_at: DateTime<Utc>,
    },
    /// All machine slots are consumed.
    MachineLimitReached,
    /// No owned license covers the requesting machine.
    NoLicenseForMachine,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKey => f.write_str("Invalid license key"),
            Self::OwnedByAnotherUser => {
                f.write_str("License already assigned to another user")
            }
            Self::Expired { .. } => f.write_str("License expired"),
            Self::MachineLimitReached => {
                write!(f, "Maximum {MAX_MACHINES_PER_LICENSE} machines per license")
            }
            Self::NoLicenseForMachine => f.write_str("No valid license for this machine"),
        }
    }
}

/// Outcome of an `activate` or `check` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LicenseStatus {
    /// The license covers the requesting machine.
    Valid {
        license_type: LicenseType,
        expires_at: Option<DateTime<Utc>>,
    },
    /// The license does not cover the requesting machine.
    Invalid { reason: DenialReason },
}

impl LicenseStatus {
    /// Builds the valid outcome for a record.
    #[must_use]
    pub fn valid_for(record: &LicenseRecord) -> Self {
        Self::Valid {
            license_type: record.license_type,
            expires_at: record.expires_at,
        }
    }

    /// Builds an invalid outcome from a denial reason.
    #[must_use]
    pub fn invalid(reason: DenialReason) -> Self {
        Self::Invalid { reason }
    }

    /// Returns true for the `Valid` variant.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// What an activation attempt should do to the record, decided before any
/// write happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationDecision {
    /// Machine already bound: succeed without mutation.
    AlreadyBound,
    /// Free slot available: bind the machine (and the owner, on first touch).
    Bind,
    /// Terminal refusal; the record must not be mutated.
    Refused(DenialReason),
}

/// The persisted license entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Surrogate id, assigned at creation, immutable.
    pub id: LicenseId,
    /// High-entropy unique token, immutable once created.
    pub license_key: LicenseKey,
    /// Tier, fixed at creation.
    pub license_type: LicenseType,
    /// Set by the first successful activation; never re-assigned.
    pub owner_user_id: Option<UserId>,
    /// Creation time, refreshed by activations that change the binding.
    pub starts_at: DateTime<Utc>,
    /// Absolute expiry; `None` means perpetual.
    pub expires_at: Option<DateTime<Utc>>,
    /// Bound machines in activation order, at most [`MAX_MACHINES_PER_LICENSE`].
    pub bound_machine_ids: Vec<MachineId>,
    /// Immutable creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl LicenseRecord {
    /// Creates a fresh, unowned, unbound record with a generated key.
    #[must_use]
    pub fn new(license_type: LicenseType, expires_at: Option<DateTime<Utc>>) -> Self {
        let now = Utc::now();
        Self {
            id: LicenseId::new(),
            license_key: LicenseKey::generate(),
            license_type,
            owner_user_id: None,
            starts_at: now,
            expires_at,
            bound_machine_ids: Vec::new(),
            created_at: now,
        }
    }

    /// Returns true if the record has an expiry in the past.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Returns true if `check` should accept this record for `machine_id`:
    /// either the machine is bound, or nothing is bound yet (a claimed but
    /// unbound license validates for any machine the owner tries).
    #[must_use]
    pub fn covers_machine(&self, machine_id: &MachineId) -> bool {
        self.bound_machine_ids.contains(machine_id) || self.bound_machine_ids.is_empty()
    }

    /// Decides what an activation attempt by `user_id` from `machine_id`
    /// should do, first match wins:
    ///
    /// 1. owned by a different user → refused
    /// 2. expired → refused (carrying the expiry for display)
    /// 3. machine already bound → succeed without mutation
    /// 4. all slots consumed → refused
    /// 5. otherwise → bind
    ///
    /// The ownership check precedes expiry, so an expired license owned by
    /// someone else reports the ownership conflict only on mismatch; for
    /// the owner it reports expiry.
    #[must_use]
    pub fn evaluate_activation(
        &self,
        user_id: UserId,
        machine_id: &MachineId,
        now: DateTime<Utc>,
    ) -> ActivationDecision {
        if self
            .owner_user_id
            .is_some_and(|owner| owner != user_id)
        {
            return ActivationDecision::Refused(DenialReason::OwnedByAnotherUser);
        }
        if let Some(expires_at) = self.expires_at {
            if now > expires_at {
                return ActivationDecision::Refused(DenialReason::Expired { expires_at });
            }
        }
        if self.bound_machine_ids.contains(machine_id) {
            return ActivationDecision::AlreadyBound;
        }
        if self.bound_machine_ids.len() >= MAX_MACHINES_PER_LICENSE {
            return ActivationDecision::Refused(DenialReason::MachineLimitReached);
        }
        ActivationDecision::Bind
    }

    /// Applies a [`ActivationDecision::Bind`]: appends the machine, claims
    /// the owner slot (idempotent if already equal) and refreshes
    /// `starts_at`.
    pub fn bind(&mut self, user_id: UserId, machine_id: MachineId, now: DateTime<Utc>) {
        debug_assert!(self.bound_machine_ids.len() < MAX_MACHINES_PER_LICENSE);
        self.bound_machine_ids.push(machine_id);
        self.owner_user_id = Some(user_id);
        self.starts_at = now;
    }
}
