//! Core type definitions for Keygrid.
//!
//! This crate defines the fundamental identifier types shared by the
//! registry and the HTTP boundary:
//! - License record identifiers (UUID v7)
//! - User identifiers supplied by the identity collaborator
//! - Machine identifiers reported by activating clients
//!
//! Domain logic (records, activation rules, persistence) lives in
//! `keygrid-registry`, not here.

mod ids;

pub use ids::{LicenseId, MachineId, UserId};
