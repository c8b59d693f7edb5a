//! Primary Zone Management
//!
//! This module provides the core of an authoritative DNSSEC primary:
//! * Record storage with atomic RRset replacement
//! * DNSSEC key storage and the key lifecycle state machine
//! * Zone signing (RRSIG production and refresh)
//! * NSEC/NSEC3 denial chain construction and repair
//! * The SOA-serialised zone change journal
//! * Periodic per-zone maintenance
//!
//! # Module Structure
//!
//! * `protocol` - record and RDATA definitions
//! * `buffer` - canonical wire-format buffer operations
//! * `store` - the per-owner RRset store
//! * `keys` - private key material and the key store
//! * `signer` - RRSIG production under the signing policy
//! * `denial` - NSEC and NSEC3 chain maintenance
//! * `key_lifecycle` - the key state machine
//! * `maintenance` - the periodic per-zone driver
//! * `journal` - commit journaling and serial arithmetic
//! * `zone` - the primary zone facade
//! * `persist` - versioned binary zone persistence
//! * `context` - consumed collaborator interfaces
//! * `errors` - error kinds surfaced to callers

/// Canonical wire-format buffer operations
pub mod buffer;

/// Consumed collaborator interfaces (resolver, notifier, persistence)
pub mod context;

/// NSEC and NSEC3 denial chain maintenance
pub mod denial;

/// Error kinds surfaced to callers
pub mod errors;

/// Commit journaling and SOA serial arithmetic
pub mod journal;

/// The DNSSEC key lifecycle state machine
pub mod key_lifecycle;

/// Private key material and the key store
pub mod keys;

/// The periodic per-zone maintenance driver
pub mod maintenance;

/// Versioned binary zone persistence
pub mod persist;

/// Record and RDATA definitions
pub mod protocol;

/// RRSIG production under the signing policy
pub mod signer;

/// The per-owner RRset store
pub mod store;

/// The primary zone facade
pub mod zone;

/// Owner-name helpers (normalisation, canonical ordering)
mod names;
