//! License registry for Keygrid.
//!
//! This crate owns the license key lifecycle:
//! - Minting new license records (admin operation)
//! - Per-user, per-machine activation with seat limits
//! - Validity checks for already-activated machines
//!
//! # Design Principles
//!
//! - **Single owner**: a license key binds to the first user who activates
//!   it and is never re-assigned
//! - **Idempotent activation**: re-activating from an already-bound
//!   machine succeeds without consuming a seat, so clients may retry on
//!   every application start
//! - **Bounded seats**: at most [`MAX_MACHINES_PER_LICENSE`] machines per
//!   license, enforced atomically against the store
//!
//! Expected negative outcomes (unknown key, ownership conflict, expiry,
//! seat exhaustion) are values, not errors; only storage failures surface
//! as [`RegistryError`].

mod error;
mod key;
mod record;
mod registry;
mod store;

pub use error::{RegistryError, RegistryResult};
pub use key::LicenseKey;
pub use record::{
    ActivationDecision, DenialReason, LicenseRecord, LicenseStatus, LicenseType,
    MAX_MACHINES_PER_LICENSE,
};
pub use registry::LicenseRegistry;
pub use store::{format_timestamp, LicenseStore};
